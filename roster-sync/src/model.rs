//! Entity model for the user roster.
//!
//! Three shapes travel over the wire:
//! - [`User`]: a persisted record, `id` assigned by the server
//! - [`NewUser`]: the body of a create request (no `id`)
//! - [`UserPatch`]: a partial body for update requests, also used as the
//!   in-progress form draft
//!
//! The server validates email syntax; the client only requires it to be
//! present and non-empty.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server-assigned user identifier.
pub type UserId = i64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),
}

/// One managed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub firstname: String,
    pub lastname: String,
    /// `null` and absent both decode to `None`.
    #[serde(default)]
    pub nickname: Option<String>,
    pub email: String,
}

impl User {
    /// Check that every required field carries a value.
    ///
    /// Serde already rejects a missing field or a non-integer `id`; this
    /// catches the empty strings serde lets through.
    pub fn validate(&self) -> Result<(), ModelError> {
        require("firstname", &self.firstname)?;
        require("lastname", &self.lastname)?;
        require("email", &self.email)?;
        Ok(())
    }

    /// The mutable fields of this user, as a fully populated draft.
    pub fn to_patch(&self) -> UserPatch {
        UserPatch {
            firstname: Some(self.firstname.clone()),
            lastname: Some(self.lastname.clone()),
            nickname: self.nickname.clone(),
            email: Some(self.email.clone()),
        }
    }
}

/// Body of `POST /users/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub firstname: String,
    pub lastname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub email: String,
}

impl NewUser {
    pub fn new(
        firstname: impl Into<String>,
        lastname: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            firstname: firstname.into(),
            lastname: lastname.into(),
            nickname: None,
            email: email.into(),
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }
}

/// Partial set of mutable fields.
///
/// Only the fields that are `Some` are serialized, so the same type serves
/// as an update body and as the draft held by an edit session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.firstname.is_none()
            && self.lastname.is_none()
            && self.nickname.is_none()
            && self.email.is_none()
    }

    /// Turn a draft into a creation body.
    ///
    /// Fails on the first required field that is missing or empty. An empty
    /// nickname is dropped rather than sent.
    pub fn to_new_user(&self) -> Result<NewUser, ModelError> {
        Ok(NewUser {
            firstname: take_required("firstname", &self.firstname)?,
            lastname: take_required("lastname", &self.lastname)?,
            nickname: self.nickname.clone().filter(|n| !n.is_empty()),
            email: take_required("email", &self.email)?,
        })
    }
}

impl From<NewUser> for UserPatch {
    fn from(user: NewUser) -> Self {
        Self {
            firstname: Some(user.firstname),
            lastname: Some(user.lastname),
            nickname: user.nickname,
            email: Some(user.email),
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(ModelError::EmptyField(field));
    }
    Ok(())
}

fn take_required(field: &'static str, value: &Option<String>) -> Result<String, ModelError> {
    match value {
        None => Err(ModelError::MissingField(field)),
        Some(v) => {
            require(field, v)?;
            Ok(v.clone())
        }
    }
}
