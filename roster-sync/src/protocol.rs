//! JSON wire protocol of the push channel.
//!
//! Every text frame is one object tagged by `action`:
//! ```text
//! {"action": "create", "user": {id, firstname, lastname, nickname, email}}
//! {"action": "update", "user": {id, firstname, lastname, nickname, email}}
//! {"action": "delete", "user_id": 42}
//! ```
//!
//! Any other shape is malformed. Malformed frames are a per-message failure:
//! the channel logs and drops them, the connection stays up.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ModelError, User, UserId};

/// The `action` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// Raw frame shape, before the action/field pairing is checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireMessage {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// A decoded push-channel event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaEvent {
    Created(User),
    /// Full replacement of the user with the same id.
    Updated(User),
    Deleted(UserId),
}

impl ReplicaEvent {
    /// Id of the user this event is about.
    pub fn user_id(&self) -> UserId {
        match self {
            ReplicaEvent::Created(u) | ReplicaEvent::Updated(u) => u.id,
            ReplicaEvent::Deleted(id) => *id,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            ReplicaEvent::Created(_) => Action::Create,
            ReplicaEvent::Updated(_) => Action::Update,
            ReplicaEvent::Deleted(_) => Action::Delete,
        }
    }

    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, MalformedEventError> {
        let wire: WireMessage = serde_json::from_str(text)?;
        Self::try_from(wire)
    }

    /// Encode to the frame shape the server publishes.
    pub fn encode(&self) -> Result<String, MalformedEventError> {
        Ok(serde_json::to_string(&WireMessage::from(self.clone()))?)
    }
}

impl TryFrom<WireMessage> for ReplicaEvent {
    type Error = MalformedEventError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let action = wire.action;
        match action {
            Action::Create | Action::Update => {
                let user = wire.user.ok_or(MalformedEventError::MissingField {
                    action,
                    field: "user",
                })?;
                if wire.user_id.is_some() {
                    return Err(MalformedEventError::UnexpectedField {
                        action,
                        field: "user_id",
                    });
                }
                user.validate()?;
                Ok(if action == Action::Create {
                    ReplicaEvent::Created(user)
                } else {
                    ReplicaEvent::Updated(user)
                })
            }
            Action::Delete => {
                let id = wire.user_id.ok_or(MalformedEventError::MissingField {
                    action,
                    field: "user_id",
                })?;
                if wire.user.is_some() {
                    return Err(MalformedEventError::UnexpectedField {
                        action,
                        field: "user",
                    });
                }
                Ok(ReplicaEvent::Deleted(id))
            }
        }
    }
}

impl From<ReplicaEvent> for WireMessage {
    fn from(event: ReplicaEvent) -> Self {
        let action = event.action();
        match event {
            ReplicaEvent::Created(user) | ReplicaEvent::Updated(user) => WireMessage {
                action,
                user: Some(user),
                user_id: None,
            },
            ReplicaEvent::Deleted(id) => WireMessage {
                action,
                user: None,
                user_id: Some(id),
            },
        }
    }
}

/// A push-channel frame that could not be turned into a [`ReplicaEvent`].
#[derive(Error, Debug)]
pub enum MalformedEventError {
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{}` message without `{field}`", .action.as_str())]
    MissingField { action: Action, field: &'static str },
    #[error("`{}` message with unexpected `{field}`", .action.as_str())]
    UnexpectedField { action: Action, field: &'static str },
    #[error("invalid user: {0}")]
    InvalidUser(#[from] ModelError),
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),
}
