//! Mutation dispatcher: user intent in, one REST call out.
//!
//! A successful dispatch only means the server accepted the request. The
//! replica changes later, when the matching push event arrives; nothing in
//! here touches it.
//!
//! On success the edit session is cleared right away. On failure it is left
//! as is so the user can fix the input and retry.

use std::fmt;

use thiserror::Error;

use crate::api::{TransportError, UsersApi};
use crate::model::{ModelError, NewUser, UserId, UserPatch};
use crate::session::EditState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Create => write!(f, "create"),
            MutationKind::Update => write!(f, "update"),
            MutationKind::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Error, Debug)]
pub enum MutationCause {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("draft is incomplete: {0}")]
    IncompleteDraft(#[from] ModelError),
    #[error("no edit session is active")]
    NoSession,
}

#[derive(Error, Debug)]
#[error("{operation} failed: {cause}")]
pub struct MutationError {
    pub operation: MutationKind,
    #[source]
    pub cause: MutationCause,
}

impl MutationError {
    fn new(operation: MutationKind, cause: impl Into<MutationCause>) -> Self {
        Self {
            operation,
            cause: cause.into(),
        }
    }
}

/// Sends create/update/delete requests on behalf of the user.
#[derive(Debug, Clone)]
pub struct MutationDispatcher {
    api: UsersApi,
    edit: EditState,
}

impl MutationDispatcher {
    pub fn new(api: UsersApi, edit: EditState) -> Self {
        Self { api, edit }
    }

    pub async fn create(&self, user: &NewUser) -> Result<(), MutationError> {
        self.api
            .create(user)
            .await
            .map_err(|e| self.failed(MutationKind::Create, e))?;
        self.edit.clear().await;
        Ok(())
    }

    pub async fn update(&self, id: UserId, patch: &UserPatch) -> Result<(), MutationError> {
        self.api
            .update(id, patch)
            .await
            .map_err(|e| self.failed(MutationKind::Update, e))?;
        self.edit.clear().await;
        Ok(())
    }

    /// Delete user `id`. Only a session editing that same user is cleared.
    pub async fn delete(&self, id: UserId) -> Result<(), MutationError> {
        self.api
            .delete(id)
            .await
            .map_err(|e| self.failed(MutationKind::Delete, e))?;
        self.edit.invalidate_target(id).await;
        Ok(())
    }

    /// Submit the active edit session: create when it has no target,
    /// update otherwise.
    pub async fn submit(&self) -> Result<MutationKind, MutationError> {
        let session = self
            .edit
            .current()
            .await
            .ok_or_else(|| MutationError::new(MutationKind::Create, MutationCause::NoSession))?;

        let kind = match session.target {
            None => {
                let user = session
                    .draft
                    .to_new_user()
                    .map_err(|e| MutationError::new(MutationKind::Create, e))?;
                self.api
                    .create(&user)
                    .await
                    .map_err(|e| self.failed(MutationKind::Create, e))?;
                MutationKind::Create
            }
            Some(id) => {
                self.api
                    .update(id, &session.draft)
                    .await
                    .map_err(|e| self.failed(MutationKind::Update, e))?;
                MutationKind::Update
            }
        };

        self.edit.clear_if(&session).await;
        Ok(kind)
    }

    fn failed(&self, operation: MutationKind, cause: TransportError) -> MutationError {
        log::warn!("{operation} request failed: {cause}");
        MutationError::new(operation, cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::model::User;

    async fn unreachable_dispatcher() -> (MutationDispatcher, EditState) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let api = UsersApi::new(ClientConfig::new(
            format!("http://127.0.0.1:{port}"),
            "ws://127.0.0.1:1",
        ))
        .unwrap();
        let edit = EditState::new();
        (MutationDispatcher::new(api, edit.clone()), edit)
    }

    fn user(id: UserId) -> User {
        User {
            id,
            firstname: "A".into(),
            lastname: "B".into(),
            nickname: None,
            email: "a@b.com".into(),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_draft() {
        let (dispatcher, edit) = unreachable_dispatcher().await;
        edit.start_edit(&user(3)).await;
        edit.update_draft(|d| d.firstname = Some("Z".into())).await;
        let before = edit.current().await;

        let err = dispatcher.submit().await.unwrap_err();
        assert_eq!(err.operation, MutationKind::Update);
        assert!(matches!(err.cause, MutationCause::Transport(_)));
        assert_eq!(edit.current().await, before);
    }

    #[tokio::test]
    async fn test_direct_calls_report_operation() {
        let (dispatcher, edit) = unreachable_dispatcher().await;
        edit.start_create().await;

        let err = dispatcher.create(&NewUser::new("A", "B", "a@b.com")).await.unwrap_err();
        assert_eq!(err.operation, MutationKind::Create);

        let err = dispatcher.delete(1).await.unwrap_err();
        assert_eq!(err.operation, MutationKind::Delete);
        assert!(err.to_string().starts_with("delete failed"));

        assert!(edit.is_active().await);
    }

    #[tokio::test]
    async fn test_incomplete_create_draft_is_not_sent() {
        let (dispatcher, edit) = unreachable_dispatcher().await;
        edit.start_create().await;
        edit.update_draft(|d| d.firstname = Some("Only".into())).await;

        let err = dispatcher.submit().await.unwrap_err();
        assert_eq!(err.operation, MutationKind::Create);
        assert!(matches!(
            err.cause,
            MutationCause::IncompleteDraft(ModelError::MissingField("lastname"))
        ));
        assert!(edit.is_active().await);
    }

    #[tokio::test]
    async fn test_submit_without_session() {
        let (dispatcher, _edit) = unreachable_dispatcher().await;
        let err = dispatcher.submit().await.unwrap_err();
        assert!(matches!(err.cause, MutationCause::NoSession));
    }
}
