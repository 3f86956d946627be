//! Thin request wrappers around the backend REST API.
//!
//! Every gateway shares one [`RestClient`], which owns the HTTP connection pool, the base URL
//! and the [`Session`] supplying bearer tokens. A `403 Forbidden` from any endpoint ends the
//! session.

use crate::{config::ClientConfig, error::DataError, session::Session};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Login, token validation & logout.
pub mod auth;

/// Instrument catalog, klines & depth.
pub mod market;

/// Market-data subscription bookkeeping.
pub mod subscription;

/// User administration.
pub mod user;

#[cfg(test)]
pub(crate) mod mock;

/// Whether a request carries the session's bearer token.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Auth {
    Public,
    Bearer,
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    session: Arc<Session>,
}

impl RestClient {
    pub fn new(config: &ClientConfig, session: Arc<Session>) -> Result<Self, DataError> {
        let base = Url::parse(&config.api_url)?;
        if base.cannot_be_a_base() {
            return Err(DataError::Config(format!(
                "api url cannot be a base: {}",
                config.api_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base,
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Join `path` onto the base URL and append `query`.
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        url.set_path(&format!("{}{}", self.base.path().trim_end_matches('/'), path));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// Send a request and decode its (possibly enveloped) JSON response body.
    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
        auth: Auth,
    ) -> Result<T, DataError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path, query);
        let mut request = self.http.request(method.clone(), url);

        if auth == Auth::Bearer {
            let token = self.session.token().ok_or(DataError::NotAuthenticated)?;
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, path, %status, bytes = text.len(), "received response");

        if status == StatusCode::FORBIDDEN {
            warn!(%method, path, "request forbidden, invalidating session");
            self.session.invalidate();
            return Err(DataError::Unauthorised);
        }

        if !status.is_success() {
            return Err(error_from_body(status, &text));
        }

        decode_body(&text)
    }

    pub async fn get<T>(&self, path: &str, query: &[(&str, &str)], auth: Auth) -> Result<T, DataError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, query, None, auth).await
    }
}

/// Backend response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ApiResponse {
    fn is_success(&self) -> bool {
        self.code == 0 || (200..300).contains(&self.code)
    }
}

/// Decode a response body that is either raw JSON or wrapped as `{code, message, data}`.
pub(crate) fn decode_body<T>(body: &str) -> Result<T, DataError>
where
    T: DeserializeOwned,
{
    let value = if body.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str::<serde_json::Value>(body)?
    };

    let payload = match value {
        serde_json::Value::Object(object) if object.contains_key("code") => {
            let envelope =
                serde_json::from_value::<ApiResponse>(serde_json::Value::Object(object))?;
            if !envelope.is_success() {
                return Err(DataError::Api {
                    code: envelope.code,
                    message: envelope.message,
                });
            }
            envelope.data
        }
        raw => raw,
    };

    Ok(serde_json::from_value(payload)?)
}

/// Error body shapes the backend uses for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub(crate) fn error_from_body(status: StatusCode, body: &str) -> DataError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error.or(body.message))
        .filter(|message| !message.trim().is_empty());

    match message {
        Some(message) => DataError::from_status(status, &message),
        None => DataError::from_status(status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{MockResponse, serve_once};

    #[test]
    fn test_decode_body() {
        struct TestCase {
            input: &'static str,
            expected: Result<Vec<i64>, DataError>,
        }

        let tests = vec![
            TestCase {
                // TC0: raw payload
                input: "[1,2,3]",
                expected: Ok(vec![1, 2, 3]),
            },
            TestCase {
                // TC1: enveloped payload
                input: r#"{"code":200,"message":"Success","data":[4]}"#,
                expected: Ok(vec![4]),
            },
            TestCase {
                // TC2: code zero is success
                input: r#"{"code":0,"data":[]}"#,
                expected: Ok(vec![]),
            },
            TestCase {
                // TC3: non-success code
                input: r#"{"code":400,"message":"symbol missing","data":null}"#,
                expected: Err(DataError::Api {
                    code: 400,
                    message: "symbol missing".to_string(),
                }),
            },
            TestCase {
                // TC4: malformed json
                input: "[1,",
                expected: Err(DataError::Deserialise(String::new())),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = decode_body::<Vec<i64>>(test.input);
            match (actual, test.expected) {
                (Ok(actual), Ok(expected)) => assert_eq!(actual, expected, "TC{} failed", index),
                (Err(DataError::Deserialise(_)), Err(DataError::Deserialise(_))) => {}
                (Err(actual), Err(expected)) => assert_eq!(actual, expected, "TC{} failed", index),
                (actual, expected) => panic!(
                    "TC{index} failed because actual != expected. \nActual: {actual:?}\nExpected: {expected:?}\n"
                ),
            }
        }
    }

    #[test]
    fn test_decode_empty_body_as_unit() {
        assert_eq!(decode_body::<()>("  "), Ok(()));
        assert_eq!(decode_body::<Option<i64>>(""), Ok(None));
    }

    #[test]
    fn test_error_from_body() {
        assert_eq!(
            error_from_body(StatusCode::UNAUTHORIZED, r#"{"error":"Invalid credentials"}"#),
            DataError::Http {
                status: 401,
                message: "Invalid credentials".to_string()
            }
        );
        assert_eq!(
            error_from_body(StatusCode::BAD_REQUEST, r#"{"message":"bad symbol"}"#),
            DataError::Http {
                status: 400,
                message: "bad symbol".to_string()
            }
        );
        assert_eq!(
            error_from_body(StatusCode::BAD_GATEWAY, "upstream down"),
            DataError::Http {
                status: 502,
                message: "upstream down".to_string()
            }
        );
    }

    #[test]
    fn test_url_joins_base_path() {
        let config = ClientConfig::new("http://localhost:8080/api/", "ws://localhost:8080/ws");
        let client = RestClient::new(&config, Arc::new(Session::default())).unwrap();

        let url = client.url(
            "/v1/market/kline",
            &[("symbol", "BTC-USDT SWAP"), ("timeframe", "1h")],
        );

        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v1/market/kline?symbol=BTC-USDT+SWAP&timeframe=1h"
        );
    }

    #[test]
    fn test_rest_client_rejects_invalid_base() {
        let config = ClientConfig::new("not a url", "ws://localhost:8080/ws");
        assert!(matches!(
            RestClient::new(&config, Arc::new(Session::default())),
            Err(DataError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_bearer_request_requires_session() {
        let config = ClientConfig::new("http://127.0.0.1:9/api", "ws://127.0.0.1:9/ws");
        let client = RestClient::new(&config, Arc::new(Session::default())).unwrap();

        let actual = client
            .get::<serde_json::Value>("/v1/auth/validate", &[], Auth::Bearer)
            .await;

        assert_eq!(actual, Err(DataError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_forbidden_invalidates_session() {
        let server = serve_once(MockResponse::new(403, r#"{"error":"Forbidden"}"#)).await;
        let session = Arc::new(Session::default());
        session.login("stale-token", "alice").unwrap();
        let client = RestClient::new(&server.config(), session.clone()).unwrap();

        let actual = client
            .get::<serde_json::Value>("/v1/market/depth", &[("symbol", "BTC-USDT")], Auth::Bearer)
            .await;

        assert_eq!(actual, Err(DataError::Unauthorised));
        assert!(!session.is_authenticated());

        let request = server.request().await;
        assert!(request.starts_with("GET /api/v1/market/depth?symbol=BTC-USDT "));
        assert!(request.to_lowercase().contains("authorization: bearer stale-token"));
    }
}
