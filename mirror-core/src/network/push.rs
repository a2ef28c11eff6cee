//! Push channel.
//!
//! One persistent WebSocket shared by every session. The connection task
//! owns the socket and reconnects with exponential backoff; callers only
//! see a stream of [`PushEvent`]s and a non-blocking `send`.
//!
//! ```text
//!  connect ──► Connected ──► (Binary | Message)* ──► Disconnected ─┐
//!     ▲                                                           │
//!     └──────────────────── backoff sleep ◄───────────────────────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::MirrorError;
use crate::protocol::push::{ClientMessage, ServerMessage};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(500);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(10);

// ── PushEvent ────────────────────────────────────────────────────

/// Something that happened on the push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Connected,
    Disconnected,
    /// Raw encoded image bytes.
    Binary(Bytes),
    Message(ServerMessage),
}

// ── PushChannel ──────────────────────────────────────────────────

/// The shared push connection as seen by the client.
pub trait PushChannel: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Queue `msg` for sending. Fails when the channel is down.
    fn send(&self, msg: &ClientMessage) -> Result<(), MirrorError>;

    /// Take the event stream. Only the first caller gets it.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PushEvent>>;
}

// ── WebSocketPush ────────────────────────────────────────────────

/// [`PushChannel`] over `tokio-tungstenite` with auto-reconnect.
#[derive(Debug)]
pub struct WebSocketPush {
    connected: Arc<AtomicBool>,
    outgoing: mpsc::UnboundedSender<String>,
    events: Mutex<Option<mpsc::UnboundedReceiver<PushEvent>>>,
    cancel: CancellationToken,
}

impl WebSocketPush {
    /// Start the connection task for `url`. Returns immediately; the
    /// first [`PushEvent::Connected`] reports success.
    pub fn spawn(url: impl Into<String>) -> Arc<Self> {
        let url = url.into();
        let connected = Arc::new(AtomicBool::new(false));
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(connection_loop(
            url,
            Arc::clone(&connected),
            out_rx,
            ev_tx,
            cancel.clone(),
        ));

        Arc::new(Self {
            connected,
            outgoing: out_tx,
            events: Mutex::new(Some(ev_rx)),
            cancel,
        })
    }

    /// Close the socket and stop reconnecting.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for WebSocketPush {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl PushChannel for WebSocketPush {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, msg: &ClientMessage) -> Result<(), MirrorError> {
        if !self.is_connected() {
            return Err(MirrorError::NotConnected);
        }
        self.outgoing.send(msg.to_json()?)?;
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PushEvent>> {
        self.events.lock().take()
    }
}

/// Double the delay up to the cap.
fn next_delay(current: Duration) -> Duration {
    (current * 2).min(MAX_RECONNECT_DELAY)
}

async fn connection_loop(
    url: String,
    connected: Arc<AtomicBool>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<PushEvent>,
    cancel: CancellationToken,
) {
    let mut delay = INITIAL_RECONNECT_DELAY;

    loop {
        let attempt = tokio::select! {
            _ = cancel.cancelled() => break,
            r = connect_async(url.as_str()) => r,
        };

        match attempt {
            Ok((ws, _)) => {
                delay = INITIAL_RECONNECT_DELAY;
                // Messages queued against the previous socket are stale.
                while outgoing.try_recv().is_ok() {}

                connected.store(true, Ordering::Release);
                info!(%url, "push channel connected");
                if events.send(PushEvent::Connected).is_err() {
                    break;
                }

                let (mut write, mut read) = ws.split();
                let reason = loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = write.send(Message::Close(None)).await;
                            break "closed by client";
                        }
                        out = outgoing.recv() => {
                            let Some(text) = out else { break "sender dropped" };
                            if let Err(e) = write.send(Message::Text(text.into())).await {
                                warn!("push write failed: {e}");
                                break "write error";
                            }
                        }
                        msg = read.next() => match msg {
                            Some(Ok(Message::Binary(data))) => {
                                trace!(len = data.len(), "binary frame");
                                let _ = events.send(PushEvent::Binary(data));
                            }
                            Some(Ok(Message::Text(text))) => match ServerMessage::from_json(text.as_str()) {
                                Ok(ServerMessage::Unknown) => {
                                    trace!("ignoring unknown push message");
                                }
                                Ok(msg) => {
                                    let _ = events.send(PushEvent::Message(msg));
                                }
                                Err(e) => debug!("unparseable push message: {e}"),
                            },
                            Some(Ok(Message::Close(_))) | None => break "closed by server",
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("push read failed: {e}");
                                break "read error";
                            }
                        }
                    }
                };

                connected.store(false, Ordering::Release);
                info!(%url, reason, "push channel disconnected");
                if events.send(PushEvent::Disconnected).is_err() || cancel.is_cancelled() {
                    break;
                }
            }
            Err(e) => {
                debug!(%url, "push connect failed: {e}");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = next_delay(delay);
    }

    connected.store(false, Ordering::Release);
}

// ── Tests ────────────────────────────────────────────────────────
