//! In-memory replica of the server's user collection.
//!
//! ```text
//!   BootstrapLoader ── seed() ──┐
//!                               ▼
//!                        ┌──────────────┐      snapshot()      ┌──────────────┐
//!                        │ ReplicaStore │ ───────────────────► │ presentation │
//!                        └──────────────┘                      └──────────────┘
//!                               ▲
//!   EventChannel ─── apply() ───┘
//! ```
//!
//! Entries are keyed by id and kept in insertion order. Replacing an entry
//! keeps its position; removing one keeps the relative order of the rest.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::model::{User, UserId};
use crate::protocol::ReplicaEvent;

/// What a single [`ReplicaStore::apply`] did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new entry was appended.
    Inserted(UserId),
    /// An existing entry was replaced in place.
    Replaced(UserId),
    /// An entry was removed.
    Removed(UserId),
    /// Delete of an id that was not present.
    Ignored(UserId),
}

impl ApplyOutcome {
    pub fn user_id(&self) -> UserId {
        match *self {
            ApplyOutcome::Inserted(id)
            | ApplyOutcome::Replaced(id)
            | ApplyOutcome::Removed(id)
            | ApplyOutcome::Ignored(id) => id,
        }
    }

    /// Whether the snapshot changed.
    pub fn changed(&self) -> bool {
        !matches!(self, ApplyOutcome::Ignored(_))
    }
}

/// Ordered, id-keyed collection of users.
///
/// `Created` and `Updated` are both upserts: a create for a known id
/// replaces it (bootstrap and event raced), an update for an unknown id
/// appends it (a create was missed).
#[derive(Debug, Default, Clone)]
pub struct ReplicaStore {
    users: IndexMap<UserId, User>,
}

impl ReplicaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection.
    ///
    /// Duplicate ids in `users` collapse onto the first position with the
    /// last payload.
    pub fn seed(&mut self, users: impl IntoIterator<Item = User>) {
        self.users.clear();
        for user in users {
            self.users.insert(user.id, user);
        }
    }

    /// Apply one push-channel event.
    pub fn apply(&mut self, event: ReplicaEvent) -> ApplyOutcome {
        match event {
            ReplicaEvent::Created(user) | ReplicaEvent::Updated(user) => {
                let id = user.id;
                // IndexMap::insert keeps the slot of an existing key.
                match self.users.insert(id, user) {
                    Some(_) => ApplyOutcome::Replaced(id),
                    None => ApplyOutcome::Inserted(id),
                }
            }
            ReplicaEvent::Deleted(id) => match self.users.shift_remove(&id) {
                Some(_) => ApplyOutcome::Removed(id),
                None => ApplyOutcome::Ignored(id),
            },
        }
    }

    /// Users in display order.
    pub fn snapshot(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }

    pub fn get(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    /// Ids in display order.
    pub fn ids(&self) -> Vec<UserId> {
        self.users.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Shared handle to the replica.
///
/// Cloning is cheap. Outside this crate the handle is read-only: only the
/// bootstrap path and the event channel reader mutate the store.
#[derive(Debug, Clone, Default)]
pub struct Replica {
    inner: Arc<RwLock<ReplicaStore>>,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<User> {
        self.inner.read().await.snapshot()
    }

    pub async fn get(&self, id: UserId) -> Option<User> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: UserId) -> bool {
        self.inner.read().await.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub(crate) async fn seed(&self, users: Vec<User>) {
        self.inner.write().await.seed(users);
    }

    pub(crate) async fn apply(&self, event: ReplicaEvent) -> ApplyOutcome {
        self.inner.write().await.apply(event)
    }
}
