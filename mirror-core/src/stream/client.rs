//! Mirror client: the public entry point.
//!
//! Owns the current [`SessionContext`] and the tasks working for it
//! (render loop, poller), routes push-channel events into the session,
//! and exposes input forwarding and observers.
//!
//! # Usage
//!
//! ```ignore
//! let api = Arc::new(HttpLiveApi::new("http://localhost:8080/api", Duration::from_secs(5))?);
//! let push = WebSocketPush::spawn("ws://localhost:8080/ws");
//! let (client, mut events) = MirrorClient::builder(api).push(push).build();
//! client.set_session(Some("abc".into()));
//! while let Some(ev) = events.recv().await { /* … */ }
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::error::MirrorError;
use crate::geometry::{FrameDimensions, Rect, Viewport};
use crate::network::http::LiveApi;
use crate::network::push::{PushChannel, PushEvent};
use crate::protocol::http::PageMetadata;
use crate::protocol::push::{ClientMessage, ServerMessage};
use crate::state::{ConnectionState, EventSender, SessionContext, StreamEvent};
use crate::stats::{ClientFrameStats, ServerFrameStats, ServerStatsRegistry};
use crate::stream::canvas::{Canvas, SoftwareCanvas};
use crate::stream::decoder::{FrameDecoder, ImageFrameDecoder};
use crate::stream::input::{InputEvent, InputForwarder, InputRoute, deliver};
use crate::stream::pipeline::RenderPipeline;
use crate::stream::poller::PollingLoop;
use crate::stream::types::Frame;

// ── Builder ──────────────────────────────────────────────────────

/// Builder for [`MirrorClient`].
pub struct MirrorClientBuilder<C: Canvas + 'static = SoftwareCanvas> {
    api: Arc<dyn LiveApi>,
    push: Option<Arc<dyn PushChannel>>,
    decoder: Arc<dyn FrameDecoder>,
    canvas: C,
    config: StreamConfig,
    viewport: Option<Viewport>,
    container: Rect,
}

impl MirrorClientBuilder<SoftwareCanvas> {
    fn new(api: Arc<dyn LiveApi>) -> Self {
        Self {
            api,
            push: None,
            decoder: Arc::new(ImageFrameDecoder::new()),
            canvas: SoftwareCanvas::new(),
            config: StreamConfig::default(),
            viewport: None,
            container: Rect::default(),
        }
    }
}

impl<C: Canvas + 'static> MirrorClientBuilder<C> {
    pub fn push(mut self, push: Arc<dyn PushChannel>) -> Self {
        self.push = Some(push);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn container(mut self, container: Rect) -> Self {
        self.container = container;
        self
    }

    /// Draw into a different canvas.
    pub fn canvas<D: Canvas + 'static>(self, canvas: D) -> MirrorClientBuilder<D> {
        MirrorClientBuilder {
            api: self.api,
            push: self.push,
            decoder: self.decoder,
            canvas,
            config: self.config,
            viewport: self.viewport,
            container: self.container,
        }
    }

    /// Build the client. Must be called inside a Tokio runtime when a
    /// push channel is attached, since its listener task starts here.
    pub fn build(self) -> (MirrorClient<C>, mpsc::UnboundedReceiver<StreamEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let input = InputForwarder::new(self.viewport, self.container, self.config.move_throttle());
        let inner = Arc::new(Inner {
            api: self.api,
            push: self.push,
            decoder: self.decoder,
            canvas: Arc::new(Mutex::new(self.canvas)),
            config: self.config,
            session: Mutex::new(None),
            visible: watch::Sender::new(true),
            input,
            server_stats: Mutex::new(ServerStatsRegistry::new()),
            events,
            shutdown: CancellationToken::new(),
        });

        if let Some(push) = &inner.push {
            match push.take_events() {
                Some(stream) => {
                    tokio::spawn(push_listener(
                        Arc::downgrade(&inner),
                        inner.shutdown.clone(),
                        stream,
                    ));
                }
                None => warn!("push channel events already taken; push frames will be ignored"),
            }
        }

        (MirrorClient { inner }, rx)
    }
}

// ── MirrorClient ─────────────────────────────────────────────────

struct Inner<C: Canvas> {
    api: Arc<dyn LiveApi>,
    push: Option<Arc<dyn PushChannel>>,
    decoder: Arc<dyn FrameDecoder>,
    canvas: Arc<Mutex<C>>,
    config: StreamConfig,
    session: Mutex<Option<Arc<SessionContext>>>,
    visible: watch::Sender<bool>,
    input: InputForwarder,
    server_stats: Mutex<ServerStatsRegistry>,
    events: EventSender,
    shutdown: CancellationToken,
}

/// Live viewport mirror for one view.
///
/// Dropping the last handle tears the current session down, the same
/// as [`MirrorClient::shutdown`].
pub struct MirrorClient<C: Canvas + 'static = SoftwareCanvas> {
    inner: Arc<Inner<C>>,
}

impl<C: Canvas + 'static> Clone for MirrorClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl MirrorClient<SoftwareCanvas> {
    pub fn builder(api: Arc<dyn LiveApi>) -> MirrorClientBuilder<SoftwareCanvas> {
        MirrorClientBuilder::new(api)
    }
}

impl<C: Canvas + 'static> MirrorClient<C> {
    // ── Session lifecycle ────────────────────────────────────────

    /// Switch to `session_id`, or to no session with `None`.
    ///
    /// The previous session is torn down first: its tasks and requests
    /// are cancelled and its subscription withdrawn. Setting the session
    /// that is already current is a no-op.
    pub fn set_session(&self, session_id: Option<String>) {
        let session_id = session_id.filter(|s| !s.is_empty());
        let mut current = self.inner.session.lock();
        if current.as_ref().map(|c| c.id()) == session_id.as_deref() {
            return;
        }

        if let Some(old) = current.take() {
            self.inner.retire(&old);
            // The old render task is cancelled and re-checks under this lock.
            self.inner.canvas.lock().clear();
        }
        self.inner.input.reset();

        let Some(id) = session_id else {
            info!("session cleared");
            return;
        };
        if self.inner.shutdown.is_cancelled() {
            return;
        }

        info!(session = %id, "session started");
        let ctx = Arc::new(SessionContext::new(id, self.inner.events.clone()));
        *current = Some(Arc::clone(&ctx));
        drop(current);

        let pipeline = RenderPipeline::new(
            Arc::clone(&ctx),
            Arc::clone(&self.inner.decoder),
            Arc::clone(&self.inner.canvas),
            self.inner.config.refresh_interval(),
        );
        tokio::spawn(pipeline.run());
        self.inner.start_polling(&ctx);
        self.inner.try_subscribe(&ctx);
    }

    /// Stop everything. The client cannot be restarted.
    pub fn shutdown(&self) {
        self.set_session(None);
        self.inner.shutdown.cancel();
    }

    // ── View state ───────────────────────────────────────────────

    /// Pause (`false`) or resume (`true`) polling.
    pub fn set_visible(&self, visible: bool) {
        self.inner.visible.send_replace(visible);
    }

    pub fn is_visible(&self) -> bool {
        *self.inner.visible.borrow()
    }

    /// Logical viewport of the remote browser.
    pub fn set_viewport(&self, viewport: Option<Viewport>) {
        self.inner.input.set_viewport(viewport);
    }

    /// On-screen rectangle the canvas is displayed in.
    pub fn set_container(&self, container: Rect) {
        self.inner.input.set_container(container);
    }

    // ── Input ────────────────────────────────────────────────────

    /// Forward a local input event.
    ///
    /// Returns `Ok(None)` when the event was dropped (no session, no
    /// frame yet, throttled).
    pub async fn send_input(&self, event: InputEvent) -> Result<Option<InputRoute>, MirrorError> {
        let Some(ctx) = self.session() else {
            return Ok(None);
        };
        let frame = ctx.frame_dimensions().map(|d| d.size());
        let Some(payload) = self.inner.input.translate(event, frame, Instant::now()) else {
            return Ok(None);
        };
        let route = deliver(&ctx, self.inner.push.as_deref(), self.inner.api.as_ref(), payload).await?;
        Ok(Some(route))
    }

    // ── Observers ────────────────────────────────────────────────

    fn session(&self) -> Option<Arc<SessionContext>> {
        self.inner.session.lock().clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session().map(|c| c.id().to_string())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session()
            .map(|c| c.connection_state())
            .unwrap_or_default()
    }

    /// Dimensions of the last rendered frame of the current session.
    pub fn frame_dimensions(&self) -> Option<FrameDimensions> {
        self.session().and_then(|c| c.frame_dimensions())
    }

    pub fn stats(&self) -> ClientFrameStats {
        self.session().map(|c| c.stats()).unwrap_or_default()
    }

    pub fn page(&self) -> Option<PageMetadata> {
        self.session().and_then(|c| c.page())
    }

    pub fn server_stats(&self) -> Option<ServerFrameStats> {
        let ctx = self.session()?;
        self.inner.server_stats.lock().get(ctx.id()).cloned()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.inner.input.viewport()
    }

    /// Shared canvas. Lock briefly; the render loop draws through it.
    pub fn canvas(&self) -> Arc<Mutex<C>> {
        Arc::clone(&self.inner.canvas)
    }

    /// Frames replaced before rendering in the current session.
    pub fn dropped_frames(&self) -> u64 {
        self.session().map(|c| c.slot().dropped()).unwrap_or(0)
    }
}

// ── Internals ────────────────────────────────────────────────────

impl<C: Canvas> Inner<C> {
    fn current(&self) -> Option<Arc<SessionContext>> {
        self.session.lock().clone()
    }

    /// Cancel `old` and withdraw its subscription.
    fn retire(&self, old: &SessionContext) {
        if old.teardown().is_some() {
            self.send_push(&ClientMessage::UnsubscribeRecording {});
        }
        self.server_stats.lock().remove(old.id());
    }

    fn send_push(&self, msg: &ClientMessage) -> bool {
        let Some(push) = &self.push else { return false };
        match push.send(msg) {
            Ok(()) => true,
            Err(e) => {
                debug!("push send failed: {e}");
                false
            }
        }
    }

    fn start_polling(&self, ctx: &Arc<SessionContext>) {
        let Some(cancel) = ctx.restart_polling() else { return };
        let poller = PollingLoop::new(
            Arc::clone(ctx),
            Arc::clone(&self.api),
            self.config.clamped_quality(),
            self.config.poll_interval(),
            self.visible.subscribe(),
            cancel,
        );
        tokio::spawn(poller.run());
    }

    fn try_subscribe(&self, ctx: &SessionContext) {
        let Some(push) = &self.push else { return };
        match ctx.begin_subscribe(push.is_connected()) {
            Ok(true) => {
                let msg = ClientMessage::SubscribeRecording {
                    session_id: ctx.id().to_string(),
                };
                if self.send_push(&msg) {
                    debug!(session = %ctx.id(), "subscribe sent");
                } else {
                    ctx.subscribe_failed();
                }
            }
            Ok(false) => {}
            Err(e) => trace!(session = %ctx.id(), "not subscribing: {e}"),
        }
    }

    fn handle_push_event(&self, event: PushEvent) {
        let ctx = self.current();
        match event {
            PushEvent::Connected => {
                if let Some(ctx) = ctx {
                    self.try_subscribe(&ctx);
                }
            }
            PushEvent::Disconnected => {
                if let Some(ctx) = ctx {
                    if ctx.channel_lost() {
                        info!(session = %ctx.id(), "push lost; resuming polling");
                        self.start_polling(&ctx);
                    }
                }
            }
            PushEvent::Binary(bytes) => match ctx {
                Some(ctx) if ctx.is_subscribed() => {
                    ctx.ingest(Frame::binary(bytes));
                }
                _ => trace!("binary frame without subscription ignored"),
            },
            PushEvent::Message(msg) => self.handle_server_message(ctx, msg),
        }
    }

    fn handle_server_message(&self, ctx: Option<Arc<SessionContext>>, msg: ServerMessage) {
        let Some(ctx) = ctx.filter(|c| msg.session_id() == Some(c.id())) else {
            trace!("push message for another session ignored");
            return;
        };

        match msg {
            ServerMessage::RecordingSubscribed { .. } => {
                ctx.confirm_push();
            }
            ServerMessage::RecordingFrame(payload) => match payload.into_frame() {
                Ok(frame) => {
                    ctx.ingest(frame);
                }
                Err(e) => {
                    warn!(session = %ctx.id(), "bad push frame: {e}");
                    ctx.emit(StreamEvent::StreamError(e.to_string()));
                }
            },
            ServerMessage::RecordingStats { session_id, stats } => {
                let severity = self.server_stats.lock().ingest(&session_id, stats.clone());
                ctx.emit(StreamEvent::ServerStats {
                    session_id,
                    stats,
                    severity,
                });
            }
            ServerMessage::Unknown => {}
        }
    }
}

impl<C: Canvas> Drop for Inner<C> {
    fn drop(&mut self) {
        if let Some(old) = self.session.get_mut().take() {
            self.retire(&old);
        }
        self.shutdown.cancel();
    }
}

/// Routes push events into the client. Holds only a weak handle so the
/// client can be dropped while the channel is still open.
async fn push_listener<C: Canvas>(
    inner: Weak<Inner<C>>,
    shutdown: CancellationToken,
    mut stream: mpsc::UnboundedReceiver<PushEvent>,
) {
    loop {
        let ev = tokio::select! {
            _ = shutdown.cancelled() => break,
            ev = stream.recv() => ev,
        };
        let Some(ev) = ev else { break };
        let Some(client) = inner.upgrade() else { break };
        client.handle_push_event(ev);
    }
    debug!("push listener stopped");
}
