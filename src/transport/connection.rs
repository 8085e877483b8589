//! WebSocket client transport and event loop.
//!
//! Connects to a relay that bridges the streaming client's custom event
//! channel and lifecycle callbacks onto a WebSocket.
//!
//! # Event Loop
//!
//! The transport spawns a tokio task that handles:
//!
//! - Incoming text frames (custom events and lifecycle events)
//! - Outgoing frames queued by [`Transport::send`]
//! - Shutdown on [`Transport::close`]
//!
//! When the socket ends for any reason the loop emits [`Inbound::Closed`].

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, info, trace};
use url::Url;

use crate::error::{Error, Result, duration_ms};

use super::options::StreamOptions;
use super::{Inbound, InboundReceiver, InboundSender, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Timeout for the WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write a text frame.
    Send(String),
    /// Close the socket.
    Shutdown,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// WebSocket transport to a streaming relay.
///
/// # Thread Safety
///
/// `WebSocketTransport` is `Send + Sync`. All operations are non-blocking.
pub struct WebSocketTransport {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Inbound frames, handed over once to the session.
    inbound: Mutex<Option<InboundReceiver>>,
}

impl WebSocketTransport {
    /// Connects to `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds 30s
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn connect(url: &Url) -> Result<Self> {
        let (ws_stream, _response) = timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| Error::connection_timeout(duration_ms(CONNECT_TIMEOUT)))??;

        info!(url = %url, "WebSocket connection established");

        Ok(Self::from_stream(ws_stream))
    }

    /// Connects to the relay at `base` with the stream parameters appended.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect), plus [`Error::Url`] and
    /// [`Error::Config`] from building the URL.
    pub async fn connect_with(base: &str, options: &StreamOptions) -> Result<Self> {
        let url = options.relay_url(base)?;
        Self::connect(&url).await
    }

    /// Wraps an established WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_event_loop(ws_stream, command_rx, inbound_tx));

        Self {
            command_tx,
            inbound: Mutex::new(Some(inbound_rx)),
        }
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        inbound_tx: InboundSender,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the relay
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(frame) = Inbound::parse(&text)
                                && inbound_tx.send(frame).is_err()
                            {
                                debug!("Inbound receiver dropped");
                            }
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Frames queued by the session
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(text)) => {
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                error!(error = %e, "Failed to write frame");
                                break;
                            }
                            trace!("Frame sent");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        let _ = inbound_tx.send(Inbound::Closed);
        debug!("Event loop terminated");
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, text: String) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Send(text))
            .map_err(|_| Error::send("WebSocket connection closed"))
    }

    fn take_inbound(&self) -> Option<InboundReceiver> {
        self.inbound.lock().take()
    }

    fn close(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }
}

// ============================================================================
// Tests
// ============================================================================
