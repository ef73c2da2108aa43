//! HTTP client for the roomdesk API.
//!
//! Credentials are attached per request from the [`Credentials`] the client
//! was configured with; there is no process-wide default header.

mod rooms;
mod session;

pub use rooms::{Confirm, FormMode, RoomFields, RoomsView};
pub use session::{Landing, SessionError, SessionState, SessionStore};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::db::{Room, UserResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Message suitable for showing inline above a form
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Network(_) => "Network error. Please try again later.".to_string(),
            ClientError::Unauthorized(message)
            | ClientError::NotFound(message)
            | ClientError::Validation { message, .. }
            | ClientError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Bearer credential injected into each request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// Envelope as returned by the API, for both success and error bodies
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: String,
    data: Option<T>,
    #[serde(default)]
    errors: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    token: String,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
        })
    }

    /// A client sharing this one's connection pool that sends `credentials`
    pub fn with_credentials(&self, credentials: Credentials) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            credentials: Some(credentials),
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header(reqwest::header::ACCEPT, "application/json");

        match &self.credentials {
            Some(credentials) => builder.bearer_auth(credentials.token()),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ClientError> {
        Self::send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn error_from(response: Response) -> ClientError {
        let status = response.status();
        let body: Option<Envelope<serde_json::Value>> = response.json().await.ok();
        let message = body
            .as_ref()
            .map(|b| b.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });

        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation {
                message,
                errors: body.and_then(|b| b.errors).unwrap_or_default(),
            },
            _ => ClientError::Server {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ClientError> {
        let envelope: Envelope<TokenData> = Self::send_json(
            self.request(Method::POST, "/api/login")
                .json(&LoginBody { email, password }),
        )
        .await?;

        envelope
            .data
            .map(|d| d.token)
            .ok_or_else(|| ClientError::Decode("login response carried no token".to_string()))
    }

    /// Revoke the token this client is configured with
    pub async fn logout(&self) -> Result<(), ClientError> {
        Self::send(self.request(Method::POST, "/api/logout")).await?;
        Ok(())
    }

    pub async fn current_user(&self) -> Result<UserResponse, ClientError> {
        Self::send_json(self.request(Method::GET, "/api/user")).await
    }

    pub async fn get_room(&self, id: i64) -> Result<Room, ClientError> {
        Self::send_json(self.request(Method::GET, &format!("/api/rooms/{}", id))).await
    }
}

/// Room operations the rooms view drives. Implemented over HTTP by
/// [`ApiClient`]; tests substitute an in-memory fake.
#[async_trait]
pub trait RoomsApi: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<Room>, ClientError>;
    async fn create_room(&self, fields: &RoomFields) -> Result<Room, ClientError>;
    async fn update_room(&self, id: i64, fields: &RoomFields) -> Result<Room, ClientError>;
    async fn delete_room(&self, id: i64) -> Result<(), ClientError>;
}

#[async_trait]
impl RoomsApi for ApiClient {
    async fn list_rooms(&self) -> Result<Vec<Room>, ClientError> {
        Self::send_json(self.request(Method::GET, "/api/rooms")).await
    }

    async fn create_room(&self, fields: &RoomFields) -> Result<Room, ClientError> {
        Self::send_json(self.request(Method::POST, "/api/rooms").json(fields)).await
    }

    async fn update_room(&self, id: i64, fields: &RoomFields) -> Result<Room, ClientError> {
        Self::send_json(
            self.request(Method::PUT, &format!("/api/rooms/{}", id))
                .json(fields),
        )
        .await
    }

    async fn delete_room(&self, id: i64) -> Result<(), ClientError> {
        Self::send(self.request(Method::DELETE, &format!("/api/rooms/{}", id))).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::sync::Arc;

    use crate::config::Config;
    use crate::db::Role;
    use crate::AppState;

    pub const EMAIL: &str = "manager@hotel.test";
    pub const PASSWORD: &str = "night-audit";

    /// Serve the API on an ephemeral port with one seeded user of `role`.
    pub async fn spawn(role: Role) -> String {
        let pool = crate::db::test_pool().await;
        crate::auth::create_user(&pool, EMAIL, PASSWORD, "Manager", role)
            .await
            .unwrap();
        let state = Arc::new(AppState::new(Config::default(), pool));
        let app = crate::api::create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
