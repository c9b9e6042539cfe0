//! Push-channel adapter: owns the WebSocket and feeds the replica.
//!
//! State machine:
//! ```text
//!                 Dial               Established
//!  Disconnected ───────► Connecting ─────────────► Connected
//!       ▲                    │                         │
//!       │      Closed        │                         │ Dial (reconnect)
//!       ├────────────────────┘                         ▼
//!       │                                          Connecting
//!       │                 Closed                       │
//!       └──────────────────────────────────────────────┘ (from Connected too)
//! ```
//!
//! Opening is split in two so the caller can bootstrap in between:
//! [`EventChannel::dial`] completes the handshake (the server now queues
//! events for us), [`EventChannel::attach`] starts the reader. Frames that
//! arrive between the two wait in the socket and are applied afterwards, in
//! arrival order.
//!
//! The reader task is the only thing that applies events. It is stopped by
//! [`EventChannel::close`] (graceful, awaited) or by dropping the channel
//! (aborted), so no apply runs after teardown.
//!
//! [`ChannelEvent`]s are best effort and are dropped when the consumer falls
//! behind. The lifecycle state is published on a `watch` channel instead
//! ([`EventChannel::watch_state`]), which always holds the latest state.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::model::UserId;
use crate::protocol::{MalformedEventError, ReplicaEvent};
use crate::session::EditState;
use crate::store::{ApplyOutcome, Replica};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// Inputs that drive [`ChannelState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelInput {
    /// Start a handshake
    Dial,
    /// Handshake done and reader running
    Established,
    /// Handshake failed, server closed, or local teardown
    Closed,
}

impl ChannelState {
    /// Next state, or `None` if `input` is not valid in this state.
    pub fn next(self, input: ChannelInput) -> Option<ChannelState> {
        use ChannelInput::*;
        use ChannelState::*;
        match (self, input) {
            (Disconnected, Dial) | (Connected, Dial) => Some(Connecting),
            (Connecting, Established) => Some(Connected),
            (Connecting, Closed) | (Connected, Closed) => Some(Disconnected),
            _ => None,
        }
    }
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Reader started; the replica is live
    Connected,
    /// Push channel is gone; the replica is frozen until a reconnect.
    /// Watch [`EventChannel::watch_state`] to react to it reliably.
    Disconnected,
    /// An event was applied to the replica
    Applied(ApplyOutcome),
    /// The user being edited was deleted remotely; the draft was dropped
    EditInvalidated(UserId),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("push channel handshake failed: {0}")]
    Handshake(#[from] Box<tokio_tungstenite::tungstenite::Error>),
    #[error("push channel handshake timed out after {0:?}")]
    Timeout(Duration),
}

/// Applies decoded frames to the replica and the edit session.
#[derive(Debug, Clone)]
pub(crate) struct Reconciler {
    replica: Replica,
    edit: EditState,
    events: mpsc::Sender<ChannelEvent>,
}

impl Reconciler {
    pub(crate) fn new(replica: Replica, edit: EditState, events: mpsc::Sender<ChannelEvent>) -> Self {
        Self {
            replica,
            edit,
            events,
        }
    }

    /// Drop an edit session whose target is no longer in the replica.
    ///
    /// Run after a (re)seed: a delete published while no socket was open
    /// only shows up as a missing row.
    pub(crate) async fn drop_stale_edit(&self) -> Option<UserId> {
        let id = self.edit.target().await?;
        if self.replica.contains(id).await || !self.edit.invalidate_target(id).await {
            return None;
        }
        log::info!("User {id} is gone after bootstrap; draft discarded");
        self.notify(ChannelEvent::EditInvalidated(id));
        Some(id)
    }

    /// Decode and apply one text frame. A malformed frame changes nothing.
    pub(crate) async fn handle_text(&self, text: &str) -> Result<ApplyOutcome, MalformedEventError> {
        let event = ReplicaEvent::decode(text)?;
        let deleted = match event {
            ReplicaEvent::Deleted(id) => Some(id),
            _ => None,
        };

        let outcome = self.replica.apply(event).await;
        log::debug!("Applied push event: {outcome:?}");
        self.notify(ChannelEvent::Applied(outcome));

        if let Some(id) = deleted {
            if self.edit.invalidate_target(id).await {
                log::info!("User {id} was deleted while being edited; draft discarded");
                self.notify(ChannelEvent::EditInvalidated(id));
            }
        }
        Ok(outcome)
    }

    fn notify(&self, event: ChannelEvent) {
        // Never block the reader on a slow or absent consumer.
        if let Err(e) = self.events.try_send(event) {
            log::debug!("Dropped channel notification: {e}");
        }
    }
}

struct ReaderTask {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// Owned push-channel connection.
pub struct EventChannel {
    url: String,
    connect_timeout: Duration,
    state: Arc<watch::Sender<ChannelState>>,
    reconciler: Reconciler,
    reader: Option<ReaderTask>,
}

impl EventChannel {
    pub(crate) fn new(url: impl Into<String>, connect_timeout: Duration, reconciler: Reconciler) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            state: Arc::new(watch::Sender::new(ChannelState::Disconnected)),
            reconciler,
            reader: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Receiver that always sees the latest [`ChannelState`].
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    pub(crate) async fn drop_stale_edit(&self) -> Option<UserId> {
        self.reconciler.drop_stale_edit().await
    }

    /// Open the WebSocket. Any previous connection is closed first.
    ///
    /// Leaves the channel `Connecting` on success; follow with
    /// [`attach`](Self::attach) or [`close`](Self::close).
    pub async fn dial(&mut self) -> Result<WsStream, ChannelError> {
        self.close().await;
        transition(&self.state, ChannelInput::Dial);

        let handshake = tokio_tungstenite::connect_async(self.url.as_str());
        let result = match tokio::time::timeout(self.connect_timeout, handshake).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(e)) => Err(ChannelError::from(Box::new(e))),
            Err(_) => Err(ChannelError::Timeout(self.connect_timeout)),
        };

        if let Err(e) = &result {
            log::warn!("Push channel {} unavailable: {e}", self.url);
            transition(&self.state, ChannelInput::Closed);
        }
        result
    }

    /// Start applying frames from a dialed connection.
    pub async fn attach(&mut self, ws: WsStream) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        transition(&self.state, ChannelInput::Established);
        self.reconciler.notify(ChannelEvent::Connected);

        let handle = tokio::spawn(read_loop(
            ws,
            shutdown_rx,
            self.reconciler.clone(),
            self.state.clone(),
        ));
        self.reader = Some(ReaderTask {
            shutdown: Some(shutdown_tx),
            handle,
        });
    }

    /// Stop the reader and release the socket. Safe in any state.
    ///
    /// When this returns no further event will be applied.
    pub async fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            if let Some(tx) = reader.shutdown.take() {
                let _ = tx.send(());
            }
            if let Err(e) = reader.handle.await {
                log::debug!("Push channel reader ended abnormally: {e}");
            }
        }
        let current = *self.state.borrow();
        if current != ChannelState::Disconnected {
            transition(&self.state, ChannelInput::Closed);
        }
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.handle.abort();
        }
    }
}

fn transition(state: &watch::Sender<ChannelState>, input: ChannelInput) {
    state.send_if_modified(|current| match current.next(input) {
        Some(next) if next != *current => {
            log::info!("Push channel {current:?} -> {next:?}");
            *current = next;
            true
        }
        Some(_) => false,
        None => {
            log::debug!("Ignoring {input:?} while {current:?}");
            false
        }
    });
}

async fn read_loop(
    mut ws: WsStream,
    mut shutdown: oneshot::Receiver<()>,
    reconciler: Reconciler,
    state: Arc<watch::Sender<ChannelState>>,
) {
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                let _ = ws.close(None).await;
                break;
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = reconciler.handle_text(text.as_str()).await {
                        log::warn!("Dropping malformed push message: {e}");
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    log::warn!(
                        "Dropping malformed push message: {}",
                        MalformedEventError::UnexpectedFrame("binary")
                    );
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::warn!("Push channel read failed: {e}");
                    break;
                }
            },
        }
    }

    transition(&state, ChannelInput::Closed);
    reconciler.notify(ChannelEvent::Disconnected);
}
