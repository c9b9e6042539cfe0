//! Initial full-collection fetch.
//!
//! Runs once per push-channel connection. Retry policy belongs to the
//! caller; a failed load leaves the replica untouched.

use thiserror::Error;

use crate::api::{TransportError, UsersApi};
use crate::model::{ModelError, User, UserId};
use crate::store::Replica;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("collection read failed: {0}")]
    Transport(#[from] TransportError),
    #[error("collection contains an invalid user {id}: {source}")]
    InvalidUser { id: UserId, source: ModelError },
}

/// Loads the collection that seeds the replica.
#[derive(Debug, Clone)]
pub struct BootstrapLoader {
    api: UsersApi,
}

impl BootstrapLoader {
    pub fn new(api: UsersApi) -> Self {
        Self { api }
    }

    /// One `GET` of the collection endpoint.
    pub async fn load(&self) -> Result<Vec<User>, BootstrapError> {
        let users = self.api.list().await?;
        for user in &users {
            user.validate().map_err(|source| BootstrapError::InvalidUser {
                id: user.id,
                source,
            })?;
        }
        Ok(users)
    }

    /// Load and replace the replica contents. Returns the number of users.
    pub async fn seed(&self, replica: &Replica) -> Result<usize, BootstrapError> {
        let users = self.load().await?;
        let count = users.len();
        replica.seed(users).await;
        log::info!("Bootstrapped replica with {count} users");
        Ok(count)
    }
}
