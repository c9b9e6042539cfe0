//! REST transport for the user collection.
//!
//! | Call              | Request               | Success body  |
//! |-------------------|-----------------------|---------------|
//! | [`UsersApi::list`]   | `GET /users/`       | `[User]`      |
//! | [`UsersApi::create`] | `POST /users/`      | ignored       |
//! | [`UsersApi::update`] | `PUT /users/{id}`   | ignored       |
//! | [`UsersApi::delete`] | `DELETE /users/{id}`| ignored       |
//!
//! Mutation responses are not read back into the replica; the
//! push channel reports the result.

use reqwest::{Client, RequestBuilder, StatusCode};
use thiserror::Error;

use crate::config::ClientConfig;
use crate::model::{NewUser, User, UserId, UserPatch};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request could not be sent: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected the request with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

impl TransportError {
    /// HTTP status of a rejected request.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Rejected { status, .. } => Some(*status),
            TransportError::Http(e) => e.status(),
        }
    }
}

/// HTTP client bound to one collection endpoint.
#[derive(Debug, Clone)]
pub struct UsersApi {
    client: Client,
    config: ClientConfig,
}

impl UsersApi {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch the full collection.
    pub async fn list(&self) -> Result<Vec<User>, TransportError> {
        let response = send(self.client.get(self.config.collection_url())).await?;
        Ok(response.json().await?)
    }

    pub async fn create(&self, user: &NewUser) -> Result<(), TransportError> {
        send(self.client.post(self.config.collection_url()).json(user)).await?;
        Ok(())
    }

    pub async fn update(&self, id: UserId, patch: &UserPatch) -> Result<(), TransportError> {
        send(self.client.put(self.config.user_url(id)).json(patch)).await?;
        Ok(())
    }

    pub async fn delete(&self, id: UserId) -> Result<(), TransportError> {
        send(self.client.delete(self.config.user_url(id))).await?;
        Ok(())
    }
}

/// Send and turn any non-2xx status into [`TransportError::Rejected`].
async fn send(request: RequestBuilder) -> Result<reqwest::Response, TransportError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Rejected { status, body })
}
