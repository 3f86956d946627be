use super::{Auth, RestClient};
use crate::error::DataError;
use reqwest::Method;
use serde::{Deserialize, Serialize, de::IgnoredAny};
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Clone)]
pub struct AuthGateway {
    client: RestClient,
}

impl AuthGateway {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Exchange credentials for a token and start a session with it.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), DataError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(DataError::InvalidInput(
                "username and password must not be empty".to_string(),
            ));
        }

        let body = serde_json::to_value(LoginRequest { username, password })?;
        let response = self
            .client
            .request::<LoginResponse>(Method::POST, "/v1/auth/login", &[], Some(body), Auth::Public)
            .await
            .inspect_err(|error| warn!(username, %error, "login failed"))?;

        self.client.session().login(response.token, username)
    }

    /// Check the session token is still accepted, ending the session if it is not.
    pub async fn validate(&self) -> Result<(), DataError> {
        let session = self.client.session();
        if !session.is_authenticated() {
            return Err(DataError::NotAuthenticated);
        }

        match self
            .client
            .get::<IgnoredAny>("/v1/auth/validate", &[], Auth::Bearer)
            .await
        {
            Ok(_) => {
                info!(username = ?session.username(), "session token validated");
                Ok(())
            }
            Err(error) => {
                if !matches!(error, DataError::Unauthorised) {
                    session.invalidate();
                }
                Err(error)
            }
        }
    }

    pub fn logout(&self) -> Result<(), DataError> {
        self.client.session().logout()
    }
}
