//! # roster-sync: client-side replica of a server-owned user collection
//!
//! Mutations go out over REST; results come back only over the push
//! channel. One code path (the channel reader) applies every state change.
//!
//! ## Architecture
//!
//! ```text
//!                     ┌──────────────────┐   POST/PUT/DELETE   ┌──────────┐
//!   form ───────────► │MutationDispatcher│ ──────────────────► │          │
//!     ▲               └──────────────────┘                     │          │
//!     │ clears                                                 │  server  │
//! ┌───┴───────┐       ┌──────────────────┐   GET /users/       │          │
//! │ EditState │       │ BootstrapLoader  │ ◄─────────────────► │          │
//! └───▲───────┘       └────────┬─────────┘                     │          │
//!     │ invalidate             │ seed                          │          │
//!     │               ┌────────▼─────────┐                     │          │
//!     │               │   ReplicaStore   │                     │          │
//!     │               └────────▲─────────┘                     │          │
//!     │                        │ apply        WebSocket        │          │
//!     │               ┌────────┴─────────┐   create/update/    │          │
//!     └────────────── │   EventChannel   │ ◄──── delete ────── │          │
//!                     └──────────────────┘                     └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`model`]: `User`, creation and update payloads
//! - [`protocol`]: push-channel JSON codec (`ReplicaEvent`)
//! - [`store`]: ordered, id-keyed replica
//! - [`api`]: REST transport
//! - [`bootstrap`]: initial collection fetch
//! - [`channel`]: WebSocket lifecycle and event application
//! - [`session`]: in-progress form state
//! - [`dispatcher`]: create/update/delete requests
//! - [`client`]: `RosterClient`, wiring and reconnection
//! - [`config`]: endpoint locations and backoff

pub mod api;
pub mod bootstrap;
pub mod channel;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod model;
pub mod protocol;
pub mod session;
pub mod store;

// Re-exports for convenience
pub use api::{TransportError, UsersApi};
pub use bootstrap::{BootstrapError, BootstrapLoader};
pub use channel::{ChannelError, ChannelEvent, ChannelInput, ChannelState, EventChannel};
pub use client::{RosterClient, SyncError};
pub use config::{ClientConfig, ReconnectPolicy};
pub use dispatcher::{MutationCause, MutationDispatcher, MutationError, MutationKind};
pub use model::{ModelError, NewUser, User, UserId, UserPatch};
pub use protocol::{Action, MalformedEventError, ReplicaEvent, WireMessage};
pub use session::{EditSession, EditState};
pub use store::{ApplyOutcome, Replica, ReplicaStore};
