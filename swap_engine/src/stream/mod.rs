//! Streaming collaborator: pushes single-currency price updates into the
//! catalog over a WebSocket and reconnects on its own.

use crate::catalog::{InvalidPriceRow, PriceCatalog, TokenPrice};
use crate::logs::{DEBUG, INFO};
use futures::{SinkExt, StreamExt};
use crate::log;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use swap_api_client::TokenPriceResponse;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;


type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// `{"type": ..., "data": ...}` frames sent by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamMessage {
    PriceUpdate(TokenPriceResponse),
    QuoteUpdate(Value),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("invalid stream URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("undecodable stream message: {0}")]
    Decode(String),
    #[error("invalid price update: {0}")]
    InvalidPriceRow(#[from] InvalidPriceRow),
}

/// Latest `quote_update` payload, kept apart from the prices.
///
/// Nothing in the engine reads it; it is exposed for callers that do.
#[derive(Clone, Debug, Default)]
pub struct QuoteCache {
    latest: Arc<RwLock<Option<Value>>>,
}

impl QuoteCache {
    pub fn store(&self, quote: Value) {
        *self
            .latest
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(quote);
    }

    pub fn latest(&self) -> Option<Value> {
        self.latest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Decodes one text frame and applies it. Price updates arriving before the
/// first fetch are dropped by the catalog.
pub fn handle_message(
    text: &str,
    catalog: &PriceCatalog,
    quotes: &QuoteCache,
) -> Result<(), StreamError> {
    let message: StreamMessage =
        serde_json::from_str(text).map_err(|e| StreamError::Decode(e.to_string()))?;
    match message {
        StreamMessage::PriceUpdate(row) => {
            let update = TokenPrice::try_from(row)?;
            catalog.apply_push(update);
        }
        StreamMessage::QuoteUpdate(quote) => {
            log!(DEBUG, "[price_stream]: Stored quote update");
            quotes.store(quote);
        }
    }
    Ok(())
}

pub fn parse_stream_url(url: &str) -> Result<Url, StreamError> {
    let parsed = Url::parse(url).map_err(|e| StreamError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        scheme => Err(StreamError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {scheme}"),
        }),
    }
}

/// Handle on the background connection task.
///
/// Dropping the handle stops the task, like [`PriceStream::shutdown`] does,
/// without waiting for it.
#[derive(Debug)]
pub struct PriceStream {
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PriceStream {
    /// Starts connecting to `url` in the background. Must be called from
    /// within a tokio runtime.
    pub fn spawn(
        url: &str,
        catalog: PriceCatalog,
        quotes: QuoteCache,
        reconnect_delay: Duration,
    ) -> Result<Self, StreamError> {
        let url = parse_stream_url(url)?;
        let connected = Arc::new(AtomicBool::new(false));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(
            StreamTask {
                url,
                catalog,
                quotes,
                reconnect_delay,
                connected: connected.clone(),
                outbound: outbound_rx,
                shutdown: shutdown_rx,
            }
            .run(),
        );
        Ok(Self {
            connected,
            outbound,
            shutdown,
            task,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queues `message` as a JSON text frame. Returns `false`, and drops the
    /// message, when the socket is not connected.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        if !self.is_connected() {
            log!(DEBUG, "[price_stream]: Not connected, dropping outbound message");
            return false;
        }
        match serde_json::to_string(message) {
            Ok(text) => self.outbound.send(text).is_ok(),
            Err(e) => {
                log!(DEBUG, "[price_stream]: Failed to encode outbound message: {e}");
                false
            }
        }
    }

    /// Closes the socket, cancels a pending reconnect and waits for the
    /// task to end.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            log!(INFO, "[price_stream]: Stream task ended abnormally: {e}");
        }
    }
}

async fn connect(url: &Url) -> Result<Socket, StreamError> {
    let (socket, _response) =
        connect_async(url.as_str())
            .await
            .map_err(|e| StreamError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
    log!(INFO, "[price_stream]: Connected to {url}");
    Ok(socket)
}

enum Disconnect {
    Lost,
    Shutdown,
}

struct StreamTask {
    url: Url,
    catalog: PriceCatalog,
    quotes: QuoteCache,
    reconnect_delay: Duration,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedReceiver<String>,
    // Also fires when the handle is dropped.
    shutdown: oneshot::Receiver<()>,
}

impl StreamTask {
    async fn run(mut self) {
        loop {
            let connection = tokio::select! {
                _ = &mut self.shutdown => return,
                connection = connect(&self.url) => connection,
            };
            match connection {
                Ok(socket) => {
                    if let Disconnect::Shutdown = self.pump(socket).await {
                        log!(INFO, "[price_stream]: Closed {}", self.url);
                        return;
                    }
                }
                Err(e) => log!(INFO, "[price_stream]: {e}"),
            }
            log!(
                DEBUG,
                "[price_stream]: Reconnecting in {:?}",
                self.reconnect_delay
            );
            tokio::select! {
                _ = &mut self.shutdown => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    async fn pump(&mut self, socket: Socket) -> Disconnect {
        // Anything queued for a previous connection is stale.
        while self.outbound.try_recv().is_ok() {}

        self.connected.store(true, Ordering::SeqCst);
        let _connected = scopeguard::guard(self.connected.clone(), |connected| {
            connected.store(false, Ordering::SeqCst);
        });

        let (mut write, mut read) = socket.split();
        loop {
            tokio::select! {
                biased;
                _ = &mut self.shutdown => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        log!(DEBUG, "[price_stream]: Failed to close cleanly: {e}");
                    }
                    return Disconnect::Shutdown;
                }
                Some(text) = self.outbound.recv() => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        log!(INFO, "[price_stream]: Failed to send: {e}");
                        return Disconnect::Lost;
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_message(&text, &self.catalog, &self.quotes) {
                            log!(DEBUG, "[price_stream]: Ignoring message: {e}");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        log!(INFO, "[price_stream]: Connection closed by peer");
                        return Disconnect::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log!(INFO, "[price_stream]: Connection lost: {e}");
                        return Disconnect::Lost;
                    }
                },
            }
        }
    }
}
