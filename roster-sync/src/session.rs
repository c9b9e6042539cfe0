//! Edit-session state: the in-progress form.
//!
//! At most one session is active. `target == None` means the draft will
//! create a new user; `Some(id)` means it edits user `id`. The draft is
//! never authoritative and the replica never reads it.
//!
//! Lifecycle:
//! ```text
//!   start_create / start_edit ──► active ──► cleared
//!                                  │  ▲       (submit ok, cancel,
//!                       update_draft  │        target deleted remotely)
//!                                  └──┘
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::model::{User, UserId, UserPatch};

/// One in-progress form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSession {
    pub target: Option<UserId>,
    pub draft: UserPatch,
}

impl EditSession {
    pub fn is_create(&self) -> bool {
        self.target.is_none()
    }
}

/// Shared handle to the current edit session.
#[derive(Debug, Clone, Default)]
pub struct EditState {
    inner: Arc<Mutex<Option<EditSession>>>,
}

impl EditState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh creation form, discarding any current session.
    pub async fn start_create(&self) {
        *self.inner.lock().await = Some(EditSession::default());
    }

    /// Start editing `user`, prefilling the draft with its current fields.
    pub async fn start_edit(&self, user: &User) {
        *self.inner.lock().await = Some(EditSession {
            target: Some(user.id),
            draft: user.to_patch(),
        });
    }

    /// Mutate the active draft. Returns `false` if no session is active.
    pub async fn update_draft(&self, f: impl FnOnce(&mut UserPatch)) -> bool {
        match self.inner.lock().await.as_mut() {
            Some(session) => {
                f(&mut session.draft);
                true
            }
            None => false,
        }
    }

    pub async fn current(&self) -> Option<EditSession> {
        self.inner.lock().await.clone()
    }

    pub async fn target(&self) -> Option<UserId> {
        self.inner.lock().await.as_ref().and_then(|s| s.target)
    }

    pub async fn is_active(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Explicit cancellation by the user.
    pub async fn cancel(&self) {
        self.clear().await;
    }

    pub(crate) async fn clear(&self) {
        self.inner.lock().await.take();
    }

    /// Clear the session only if it is still the one that was submitted.
    ///
    /// A session started while the request was in flight survives.
    pub(crate) async fn clear_if(&self, submitted: &EditSession) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.as_ref() == Some(submitted) {
            guard.take();
            return true;
        }
        false
    }

    /// Drop the session if it targets `id`. Returns `true` if one was dropped.
    pub(crate) async fn invalidate_target(&self, id: UserId) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.as_ref().and_then(|s| s.target) == Some(id) {
            guard.take();
            return true;
        }
        false
    }
}
