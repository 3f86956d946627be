use super::{Auth, RestClient};
use crate::error::DataError;
use reqwest::Method;
use serde::{Deserialize, Serialize, de::IgnoredAny};
use smol_str::SmolStr;
use tracing::{debug, info};

/// Role granting access to user administration.
pub const ADMIN_ROLE: &str = "ADMIN";

/// Role assigned to new users unless specified.
pub const DEFAULT_ROLE: &str = "USER";

/// User record from `/users/all`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub role: SmolStr,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>, role: impl Into<SmolStr>) -> Self {
        Self {
            id,
            username: username.into(),
            role: role.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

#[derive(Debug, Clone)]
pub struct UserGateway {
    client: RestClient,
}

impl UserGateway {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    pub async fn all(&self) -> Result<Vec<User>, DataError> {
        self.client.get("/users/all", &[], Auth::Bearer).await
    }

    pub async fn add(&self, username: &str, password: &str, role: &str) -> Result<User, DataError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(DataError::InvalidInput(
                "username and password must not be empty".to_string(),
            ));
        }

        let user = self
            .client
            .request::<User>(
                Method::POST,
                "/users/add",
                &[("username", username), ("password", password), ("role", role)],
                None,
                Auth::Bearer,
            )
            .await?;

        info!(id = user.id, username = %user.username, role = %user.role, "user added");
        Ok(user)
    }

    pub async fn delete(&self, id: i64) -> Result<(), DataError> {
        self.client
            .request::<IgnoredAny>(
                Method::DELETE,
                &format!("/users/delete/{id}"),
                &[],
                None,
                Auth::Bearer,
            )
            .await?;

        info!(id, "user deleted");
        Ok(())
    }

    pub async fn update_password(&self, id: i64, new_password: &str) -> Result<(), DataError> {
        if new_password.is_empty() {
            return Err(DataError::InvalidInput(
                "new password must not be empty".to_string(),
            ));
        }

        self.client
            .request::<IgnoredAny>(
                Method::PUT,
                &format!("/users/update-password/{id}"),
                &[("newPassword", new_password)],
                None,
                Auth::Bearer,
            )
            .await?;

        info!(id, "user password updated");
        Ok(())
    }

    /// Look the session's user up in `/users/all` and cache the record if it is an admin.
    ///
    /// Returns whether the current user is an admin. Any failure counts as "not an admin".
    pub async fn refresh_admin_status(&self) -> bool {
        let session = self.client.session();
        let Some(username) = session.username() else {
            return false;
        };

        let admin = match self.all().await {
            Ok(users) => find_admin(users, &username),
            Err(error) => {
                debug!(%error, "failed to fetch users for admin check");
                None
            }
        };

        let is_admin = admin.is_some();
        if let Err(error) = session.set_current_user(admin) {
            debug!(%error, "failed to persist current user");
        }
        is_admin
    }
}

fn find_admin(users: Vec<User>, username: &str) -> Option<User> {
    users
        .into_iter()
        .find(|user| user.username == username)
        .filter(User::is_admin)
}
