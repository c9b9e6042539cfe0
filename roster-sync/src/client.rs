//! Roster client: wires the replica, the push channel, the bootstrap
//! loader and the mutation dispatcher together.
//!
//! Provides:
//! - Connect: handshake, bootstrap, then live event application
//! - Reconnect with backoff, re-bootstrapping every time
//! - Read-only replica access for the presentation layer
//! - Edit-session and mutation access for the form
//!
//! Connecting runs in this order:
//! ```text
//!  dial WebSocket ──► GET /users/ ──► seed replica ──► start reader
//!  (server queues        (snapshot)     drop a form      (queued frames
//!   events for us)                      whose user is     applied in order)
//!                                       gone
//! ```

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::api::{TransportError, UsersApi};
use crate::bootstrap::{BootstrapError, BootstrapLoader};
use crate::channel::{ChannelError, ChannelEvent, ChannelState, EventChannel, Reconciler};
use crate::config::ClientConfig;
use crate::dispatcher::MutationDispatcher;
use crate::session::EditState;
use crate::store::Replica;

/// Notification queue depth; overflow is dropped, never blocks the reader.
const EVENT_QUEUE_CAPACITY: usize = 1024;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("HTTP client setup failed: {0}")]
    Setup(#[from] TransportError),
    #[error("gave up reconnecting after {attempts} attempts: {last}")]
    ReconnectExhausted {
        attempts: u32,
        #[source]
        last: Box<SyncError>,
    },
}

/// Client-side replica of the server's user collection.
pub struct RosterClient {
    config: ClientConfig,
    replica: Replica,
    edit: EditState,
    loader: BootstrapLoader,
    dispatcher: MutationDispatcher,
    channel: EventChannel,
    event_rx: Option<mpsc::Receiver<ChannelEvent>>,
}

impl RosterClient {
    pub fn new(config: ClientConfig) -> Result<Self, SyncError> {
        let api = UsersApi::new(config.clone())?;
        let replica = Replica::new();
        let edit = EditState::new();
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let reconciler = Reconciler::new(replica.clone(), edit.clone(), event_tx);
        let channel = EventChannel::new(config.ws_url.clone(), config.request_timeout, reconciler);

        Ok(Self {
            loader: BootstrapLoader::new(api.clone()),
            dispatcher: MutationDispatcher::new(api, edit.clone()),
            config,
            replica,
            edit,
            channel,
            event_rx: Some(event_rx),
        })
    }

    /// Take the notification receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ChannelEvent>> {
        self.event_rx.take()
    }

    /// Open the push channel and seed the replica.
    ///
    /// Closes any current connection first. On a bootstrap failure the
    /// fresh socket is released and the channel ends `Disconnected`.
    /// An edit session whose target is missing from the fresh snapshot is
    /// discarded, with [`ChannelEvent::EditInvalidated`].
    pub async fn connect(&mut self) -> Result<(), SyncError> {
        let ws = self.channel.dial().await?;
        if let Err(e) = self.loader.seed(&self.replica).await {
            log::warn!("Bootstrap failed, closing push channel: {e}");
            drop(ws);
            self.channel.close().await;
            return Err(e.into());
        }
        self.channel.drop_stale_edit().await;
        self.channel.attach(ws).await;
        Ok(())
    }

    /// Reconnect using the configured backoff policy.
    ///
    /// Every attempt is a full [`connect`](Self::connect), so the replica is
    /// re-seeded before any new event is applied.
    pub async fn reconnect(&mut self) -> Result<(), SyncError> {
        let policy = self.config.reconnect.clone();
        let mut attempt = 0u32;
        loop {
            let delay = policy.delay_for(attempt);
            log::info!("Reconnecting in {delay:?} (attempt {})", attempt + 1);
            tokio::time::sleep(delay).await;

            match self.connect().await {
                Ok(()) => {
                    log::info!("Reconnected after {} attempt(s)", attempt + 1);
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    log::warn!("Reconnect attempt {attempt} failed: {e}");
                    if !policy.allows(attempt) {
                        return Err(SyncError::ReconnectExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                }
            }
        }
    }

    /// Tear down the push channel. Safe to call in any state.
    pub async fn close(&mut self) {
        self.channel.close().await;
    }

    pub async fn state(&self) -> ChannelState {
        self.channel.state().await
    }

    /// Lifecycle state as a `watch` receiver. Unlike [`ChannelEvent`]s,
    /// state changes are never dropped.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.channel.watch_state()
    }

    /// Read-only replica handle.
    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    pub fn edit(&self) -> &EditState {
        &self.edit
    }

    pub fn dispatcher(&self) -> &MutationDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
