//! Shared harness for the integration tests: a real server on an ephemeral
//! port, backed by the in-memory store.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use notecollab_core::{Note, NoteId, ServerFrame, UserId};
use notecollab_server::auth::create_session;
use notecollab_server::collab::{Notifier, PersistHandle, PersistenceWorker};
use notecollab_server::{AppState, ServerConfig, build_app};
use notecollab_store::{GrantStore, MemoryStore, NoteStore};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub const SECRET: &str = "integration-test-secret";
pub const OWNER: UserId = UserId(1);
pub const NOTE: NoteId = NoteId(7);
pub const OTHER_NOTE: NoteId = NoteId(8);

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    pub persist: PersistHandle,
    pub client: reqwest::Client,
    shutdown_tx: watch::Sender<bool>,
    _worker: PersistenceWorker,
}

/// Config with short timers so persistence is observable in tests.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        session_secret: SECRET.to_string(),
        persist_quiescence: Duration::from_millis(100),
        persist_max_delay: Duration::from_secs(2),
        leave_timeout: Duration::from_millis(500),
        ..ServerConfig::default()
    }
}

pub async fn spawn() -> TestServer {
    spawn_with(test_config(), None).await
}

/// Start a server. `notes` overrides the note store (grants always live in
/// the memory store).
pub async fn spawn_with(config: ServerConfig, notes: Option<Arc<dyn NoteStore>>) -> TestServer {
    spawn_inner(config, notes, None).await
}

/// Start a server whose invitations go through `notifier`.
pub async fn spawn_with_notifier(notifier: Arc<dyn Notifier>) -> TestServer {
    spawn_inner(test_config(), None, Some(notifier)).await
}

async fn spawn_inner(
    config: ServerConfig,
    notes: Option<Arc<dyn NoteStore>>,
    notifier: Option<Arc<dyn Notifier>>,
) -> TestServer {
    let store = Arc::new(MemoryStore::new());
    store.insert_note(Note::new(NOTE, OWNER, "Plans", "")).await;
    store
        .insert_note(Note::new(OTHER_NOTE, OWNER, "Other", ""))
        .await;

    let notes: Arc<dyn NoteStore> = notes.unwrap_or_else(|| store.clone());
    let grants: Arc<dyn GrantStore> = store.clone();

    let mut worker =
        PersistenceWorker::new(notes.clone(), config.persist_quiescence, config.persist_max_delay);
    worker.start().unwrap();
    let persist = worker.handle();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut state = AppState::new(config, notes, grants, persist.clone(), shutdown_rx);
    if let Some(notifier) = notifier {
        state = state.with_notifier(notifier);
    }
    let app = build_app(state).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        store,
        persist,
        client: reqwest::Client::new(),
        shutdown_tx,
        _worker: worker,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, note: NoteId, query: &str) -> String {
        format!("ws://{}/collaborate/{}?{}", self.addr, note, query)
    }

    /// Ask the server to close every WebSocket as on shutdown.
    pub fn signal_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Issue a share token through the HTTP API as the owner.
    pub async fn issue_token(&self, note: NoteId, permission: &str) -> String {
        let response = self
            .client
            .post(self.url(&format!("/notes/{}/share-token", note)))
            .bearer_auth(session(OWNER))
            .json(&serde_json::json!({ "permission": permission }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn connect_token(&self, note: NoteId, token: &str) -> Socket {
        self.connect(&self.ws_url(note, &format!("token={}", token)))
            .await
    }

    pub async fn connect_session(&self, note: NoteId, user: UserId) -> Socket {
        self.connect(&self.ws_url(note, &format!("session={}", session(user))))
            .await
    }

    pub async fn connect(&self, url: &str) -> Socket {
        let (socket, _) = connect_async(url).await.unwrap();
        socket
    }

    /// Poll the health endpoint until the room count matches.
    pub async fn wait_for_rooms(&self, expected: u64) {
        for _ in 0..100 {
            let health: Value = self
                .client
                .get(self.url("/health"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if health["rooms"].as_u64() == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("room count never reached {}", expected);
    }
}

pub fn session(user: UserId) -> String {
    create_session(user, SECRET, 1).unwrap()
}

/// Next JSON frame from the server, skipping control messages.
pub async fn next_frame(socket: &mut Socket) -> ServerFrame {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(frame) => panic!("unexpected close: {:?}", frame),
            _ => continue,
        }
    }
}

/// Assert no data frame arrives within `window`.
pub async fn expect_silence(socket: &mut Socket, window: Duration) {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        match tokio::time::timeout_at(deadline, socket.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected frame: {}", text.as_str()),
            Ok(Some(Ok(Message::Close(frame)))) => panic!("unexpected close: {:?}", frame),
            Ok(Some(Ok(_))) => continue,
            Ok(other) => panic!("socket ended: {:?}", other.map(|r| r.is_ok())),
        }
    }
}

/// Wait for the close frame and return its code and reason.
pub async fn expect_close(socket: &mut Socket) -> (u16, String) {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for close")
            .expect("socket ended without close frame")
            .expect("socket error");
        match message {
            Message::Close(Some(frame)) => {
                return (u16::from(frame.code), frame.reason.as_str().to_string());
            }
            Message::Close(None) => panic!("close frame without code"),
            _ => continue,
        }
    }
}

pub async fn send_edit(socket: &mut Socket, payload: Value) {
    let frame = serde_json::json!({ "type": "edit", "payload": payload });
    socket
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

pub async fn send_raw(socket: &mut Socket, text: &str) {
    socket
        .send(Message::Text(text.to_string().into()))
        .await
        .unwrap();
}

/// Consume the `joined` frame every admitted connection receives first.
pub async fn expect_joined(socket: &mut Socket) -> notecollab_core::JoinedFrame {
    match next_frame(socket).await {
        ServerFrame::Joined(joined) => joined,
        other => panic!("expected joined frame, got {:?}", other),
    }
}
