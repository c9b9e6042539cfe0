//! In-process users server for integration tests.
//!
//! Mirrors the real backend: REST CRUD on `/users/`, and every successful
//! mutation is broadcast on `/ws/users` as an `action` frame. Tests can also
//! push raw frames, drop every socket, write or delete without broadcasting, or make
//! the collection read fail.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, put};
use axum::{Json, Router};
use roster_sync::{
    ChannelEvent, ClientConfig, NewUser, ReplicaEvent, RosterClient, User, UserId, UserPatch,
};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone)]
enum Push {
    Frame(String),
    Kick,
}

struct ServerState {
    users: Mutex<Vec<User>>,
    next_id: AtomicI64,
    push: broadcast::Sender<Push>,
    sockets: AtomicUsize,
    fail_list: AtomicBool,
}

type ApiError = (StatusCode, Json<Value>);

fn not_found() -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "User not found" })))
}

impl ServerState {
    fn publish(&self, event: ReplicaEvent) {
        let frame = event.encode().expect("encode event");
        let _ = self.push.send(Push::Frame(frame));
    }

    async fn insert(&self, new_user: NewUser) -> User {
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            firstname: new_user.firstname,
            lastname: new_user.lastname,
            nickname: new_user.nickname,
            email: new_user.email,
        };
        self.users.lock().await.push(user.clone());
        user
    }
}

async fn list_users(State(state): State<Arc<ServerState>>) -> Result<Json<Vec<User>>, ApiError> {
    if state.fail_list.load(Ordering::SeqCst) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "database unavailable" })),
        ));
    }
    Ok(Json(state.users.lock().await.clone()))
}

async fn create_user(
    State(state): State<Arc<ServerState>>,
    Json(new_user): Json<NewUser>,
) -> Json<User> {
    let user = state.insert(new_user).await;
    state.publish(ReplicaEvent::Created(user.clone()));
    Json(user)
}

async fn update_user(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<UserId>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    let updated = {
        let mut users = state.users.lock().await;
        let user = users.iter_mut().find(|u| u.id == id).ok_or_else(not_found)?;
        if let Some(v) = patch.firstname {
            user.firstname = v;
        }
        if let Some(v) = patch.lastname {
            user.lastname = v;
        }
        if let Some(v) = patch.nickname {
            user.nickname = Some(v);
        }
        if let Some(v) = patch.email {
            user.email = v;
        }
        user.clone()
    };
    state.publish(ReplicaEvent::Updated(updated.clone()));
    Ok(Json(updated))
}

async fn delete_user(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<UserId>,
) -> Result<Json<Value>, ApiError> {
    {
        let mut users = state.users.lock().await;
        let index = users.iter().position(|u| u.id == id).ok_or_else(not_found)?;
        users.remove(index);
    }
    state.publish(ReplicaEvent::Deleted(id));
    Ok(Json(json!({ "ok": true })))
}

async fn ws_users(State(state): State<Arc<ServerState>>, ws: WebSocketUpgrade) -> Response {
    // Subscribe before the handshake completes so nothing published after
    // the client sees 101 is missed.
    let rx = state.push.subscribe();
    ws.on_upgrade(move |socket| serve_socket(socket, rx, state))
}

async fn serve_socket(mut socket: WebSocket, mut rx: broadcast::Receiver<Push>, state: Arc<ServerState>) {
    state.sockets.fetch_add(1, Ordering::SeqCst);
    loop {
        tokio::select! {
            push = rx.recv() => match push {
                Ok(Push::Frame(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(Push::Kick) | Err(_) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    state.sockets.fetch_sub(1, Ordering::SeqCst);
}

/// Handle to a running test server.
#[derive(Clone)]
pub struct TestServer {
    pub port: u16,
    state: Arc<ServerState>,
}

impl TestServer {
    pub async fn start(initial: Vec<User>) -> Self {
        let next_id = initial.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let (push, _) = broadcast::channel(4096);
        let state = Arc::new(ServerState {
            users: Mutex::new(initial),
            next_id: AtomicI64::new(next_id),
            push,
            sockets: AtomicUsize::new(0),
            fail_list: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/users/", get(list_users).post(create_user))
            .route("/users/{id}", put(update_user).delete(delete_user))
            .route("/ws/users", get(ws_users))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { port, state }
    }

    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(
            format!("http://127.0.0.1:{}", self.port),
            format!("ws://127.0.0.1:{}/ws/users", self.port),
        );
        config.request_timeout = Duration::from_secs(2);
        config.reconnect.initial_delay = Duration::from_millis(10);
        config.reconnect.max_delay = Duration::from_millis(50);
        config.reconnect.max_attempts = Some(20);
        config
    }

    /// Create a user and broadcast it, as if another client had posted it.
    pub async fn create(&self, new_user: NewUser) -> User {
        let user = self.state.insert(new_user).await;
        self.state.publish(ReplicaEvent::Created(user.clone()));
        user
    }

    /// Create a user without telling any connected client.
    pub async fn create_silently(&self, new_user: NewUser) -> User {
        self.state.insert(new_user).await
    }

    /// Remove a user without telling any connected client.
    pub async fn delete_silently(&self, id: UserId) -> bool {
        let mut users = self.state.users.lock().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        users.len() != before
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.state.push.send(Push::Frame(text.to_string()));
    }

    /// Close every open push socket.
    pub fn kick_all(&self) {
        let _ = self.state.push.send(Push::Kick);
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn open_sockets(&self) -> usize {
        self.state.sockets.load(Ordering::SeqCst)
    }

    /// Wait until exactly `n` push sockets are open.
    pub async fn wait_for_sockets(&self, n: usize) {
        timeout(Duration::from_secs(2), async {
            while self.open_sockets() != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {n} open sockets, have {}", self.open_sockets()));
    }
}

pub fn user(id: UserId, firstname: &str) -> User {
    User {
        id,
        firstname: firstname.to_string(),
        lastname: "B".to_string(),
        nickname: None,
        email: format!("{}@b.com", firstname.to_lowercase()),
    }
}

/// Build a client for `server`, connect it, and drain the `Connected` event.
pub async fn connected_client(server: &TestServer) -> (RosterClient, mpsc::Receiver<ChannelEvent>) {
    let mut client = RosterClient::new(server.config()).unwrap();
    let mut events = client.take_event_rx().unwrap();
    client.connect().await.unwrap();
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    (client, events)
}

pub async fn next_event(events: &mut mpsc::Receiver<ChannelEvent>) -> ChannelEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for a channel event")
        .expect("event channel closed")
}

/// Skip events until one equal to `wanted` arrives.
pub async fn wait_for(events: &mut mpsc::Receiver<ChannelEvent>, wanted: ChannelEvent) {
    loop {
        if next_event(events).await == wanted {
            return;
        }
    }
}
