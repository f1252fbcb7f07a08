use crate::error::{ConnectionError, DecodeError};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored(String),
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "IDLE",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "CONNECTED",
            ConnectionState::Closed => "CLOSED",
            ConnectionState::Errored(_) => "ERROR",
        }
    }
}

/// What the socket reader hands to the single consumer, in arrival order.
#[derive(Debug)]
pub enum ConnectionEvent {
    Frame(String),
    /// Terminal. Nothing follows it.
    Failed(ConnectionError),
}

/// Owns the one snapshot socket of a dashboard.
///
/// Shared behind an `Arc` between the dashboard and the task that connects.
/// Dropping the last handle stops the reader task, which closes the socket.
pub struct ConnectionManager {
    url: String,
    state: Arc<Mutex<ConnectionState>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

/// Puts the state back to `Idle` when a connect is dropped mid-handshake.
struct PendingConnect {
    state: Arc<Mutex<ConnectionState>>,
}

impl Drop for PendingConnect {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Idle;
            }
        }
    }
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            shutdown: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().unwrap().clone()
    }

    /// Opens the socket and starts forwarding frames to `events`.
    ///
    /// Returns `Ok(false)` without touching anything when a socket is already
    /// connecting or open.
    pub async fn connect(
        &self,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<bool, ConnectionError> {
        {
            let mut state = self.state.lock().unwrap();
            if matches!(*state, ConnectionState::Connecting | ConnectionState::Open) {
                debug!("Connect skipped, socket is {}", state.label());
                return Ok(false);
            }
            *state = ConnectionState::Connecting;
        }
        let _pending = PendingConnect {
            state: self.state.clone(),
        };

        let request = match self.url.as_str().into_client_request() {
            Ok(request) => request,
            Err(e) => return Err(self.fail(invalid_url(&self.url, e))),
        };

        info!("Connecting to alert WebSocket: {}", self.url);

        let socket = match connect_async(request).await {
            Ok((socket, _)) => socket,
            Err(tungstenite::Error::Url(e)) => {
                return Err(self.fail(ConnectionError::InvalidUrl {
                    url: self.url.clone(),
                    reason: e.to_string(),
                }))
            }
            Err(e) => {
                return Err(self.fail(ConnectionError::Handshake {
                    url: self.url.clone(),
                    source: e,
                }))
            }
        };

        info!("Successfully connected to WebSocket");
        *self.state.lock().unwrap() = ConnectionState::Open;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader = tokio::spawn(pump(socket, self.state.clone(), events, shutdown_rx));
        *self.shutdown.lock().unwrap() = Some(shutdown_tx);
        *self.reader.lock().unwrap() = Some(reader);
        Ok(true)
    }

    /// Closes the socket if it is open and waits for the reader to finish.
    pub async fn close(&self) {
        let shutdown = self.shutdown.lock().unwrap().take();
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        let reader = self.reader.lock().unwrap().take();
        if let Some(reader) = reader {
            if let Err(e) = reader.await {
                warn!("WebSocket reader ended abnormally: {}", e);
            }
        }
    }

    fn fail(&self, err: ConnectionError) -> ConnectionError {
        error!("Connection error: {}", err);
        *self.state.lock().unwrap() = ConnectionState::Errored(err.to_string());
        err
    }
}

fn invalid_url(url: &str, err: tungstenite::Error) -> ConnectionError {
    ConnectionError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

async fn pump(
    mut socket: Socket,
    state: Arc<Mutex<ConnectionState>>,
    events: mpsc::Sender<ConnectionEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            // Fires on an explicit close and when the manager is dropped.
            _ = &mut shutdown => {
                if let Err(e) = socket.close(None).await {
                    debug!("Close handshake failed: {}", e);
                }
                info!("WebSocket connection closed");
                *state.lock().unwrap() = ConnectionState::Closed;
                return;
            }
            message = socket.next() => {
                let frame = match message {
                    Some(Ok(tungstenite::Message::Text(text))) => text,
                    Some(Ok(tungstenite::Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!("Dropping snapshot frame: {}", DecodeError::NotUtf8);
                            continue;
                        }
                    },
                    Some(Ok(tungstenite::Message::Close(_))) | None => {
                        info!("WebSocket connection closed by server");
                        *state.lock().unwrap() = ConnectionState::Closed;
                        let _ = events.send(ConnectionEvent::Failed(ConnectionError::Closed)).await;
                        return;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        *state.lock().unwrap() = ConnectionState::Errored(e.to_string());
                        let _ = events.send(ConnectionEvent::Failed(e.into())).await;
                        return;
                    }
                };

                if events.send(ConnectionEvent::Frame(frame)).await.is_err() {
                    debug!("Frame consumer gone, closing socket");
                    let _ = socket.close(None).await;
                    *state.lock().unwrap() = ConnectionState::Closed;
                    return;
                }
            }
        }
    }
}
