//! Per-session state.
//!
//! Everything that belongs to one live session (pending frame slot,
//! transport state, statistics, ETag and content-hash memos, rendered
//! dimensions) hangs off one [`SessionContext`]. A session change throws
//! the whole object away and builds a new one, which both zeroes the
//! state and, through its cancellation token, aborts every request and
//! task still working for the old session.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::MirrorError;
use crate::geometry::{FrameDimensions, Size};
use crate::protocol::http::PageMetadata;
use crate::state::transport::{ConnectionState, TransportSelector};
use crate::stats::{ClientFrameStats, ServerFrameStats, Severity, StatsAggregator};
use crate::stream::slot::FrameSlot;
use crate::stream::types::{Frame, FrameSource};

// ── StreamEvent ──────────────────────────────────────────────────

/// Notifications for the embedding application.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A frame reached the canvas.
    FrameRendered {
        session_id: String,
        frame_id: u64,
        size: Size,
        byte_len: usize,
    },
    /// The rendered bitmap size changed (first frame included).
    DimensionsChanged(FrameDimensions),
    /// Client statistics after a rendered frame.
    Stats(ClientFrameStats),
    ConnectionChanged {
        session_id: String,
        state: ConnectionState,
    },
    PageMetadata(PageMetadata),
    ServerStats {
        session_id: String,
        stats: ServerFrameStats,
        severity: Severity,
    },
    /// A frame could not be decoded or drawn. The stream continues.
    StreamError(String),
    /// An input event could not be delivered. Not retried.
    InputError(String),
}

pub type EventSender = mpsc::UnboundedSender<StreamEvent>;

// ── SessionContext ───────────────────────────────────────────────

/// State scoped to one session identifier.
#[derive(Debug)]
pub struct SessionContext {
    id: String,
    cancel: CancellationToken,
    /// Child of `cancel`; fired when push delivery takes over.
    poll_cancel: Mutex<CancellationToken>,
    slot: FrameSlot,
    selector: Mutex<TransportSelector>,
    stats: Mutex<StatsAggregator>,
    etag: Mutex<Option<String>>,
    last_hash: Mutex<Option<String>>,
    page: Mutex<Option<PageMetadata>>,
    last_rendered: AtomicU64,
    dimensions: watch::Sender<Option<FrameDimensions>>,
    connection: watch::Sender<ConnectionState>,
    events: EventSender,
}

impl SessionContext {
    pub fn new(id: impl Into<String>, events: EventSender) -> Self {
        let cancel = CancellationToken::new();
        let poll_cancel = cancel.child_token();
        Self {
            id: id.into(),
            poll_cancel: Mutex::new(poll_cancel),
            cancel,
            slot: FrameSlot::new(),
            selector: Mutex::new(TransportSelector::new()),
            stats: Mutex::new(StatsAggregator::new()),
            etag: Mutex::new(None),
            last_hash: Mutex::new(None),
            page: Mutex::new(None),
            last_rendered: AtomicU64::new(0),
            dimensions: watch::Sender::new(None),
            connection: watch::Sender::new(ConnectionState::Polling),
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn slot(&self) -> &FrameSlot {
        &self.slot
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Token fired when the session ends.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// End the session: cancel all its work and return the session whose
    /// subscription must be withdrawn, if one was active.
    pub fn teardown(&self) -> Option<String> {
        self.cancel.cancel();
        let unsubscribe = self.selector.lock().teardown();
        self.connection.send_replace(ConnectionState::Polling);
        info!(session = %self.id, "session torn down");
        unsubscribe
    }

    /// Publish an event unless the session has already ended.
    pub fn emit(&self, event: StreamEvent) {
        if !self.is_cancelled() {
            let _ = self.events.send(event);
        }
    }

    // ── Ingest ───────────────────────────────────────────────────

    /// Hand a received frame to the render pipeline.
    ///
    /// Frames whose content hash repeats the previous one are dropped.
    /// Binary push frames are fingerprinted here since the wire carries
    /// no hash for them. Returns the ingest id of an accepted frame.
    pub fn ingest(&self, mut frame: Frame) -> Option<u64> {
        if self.is_cancelled() {
            return None;
        }
        if frame.content_hash.is_none() && frame.source == FrameSource::BinaryPush {
            frame.content_hash = Some(blake3::hash(&frame.bytes).to_hex().to_string());
        }
        if !self.accept_content_hash(frame.content_hash.as_deref()) {
            trace!(session = %self.id, source = %frame.source, "duplicate frame dropped");
            return None;
        }
        Some(self.slot.submit(frame))
    }

    // ── Memos ────────────────────────────────────────────────────

    pub fn etag(&self) -> Option<String> {
        self.etag.lock().clone()
    }

    pub fn set_etag(&self, etag: Option<String>) {
        if etag.is_some() {
            *self.etag.lock() = etag;
        }
    }

    /// Record `hash` as the latest content hash. Returns `false` when it
    /// equals the previous one, i.e. the frame shows nothing new.
    /// Frames without a hash are always accepted.
    pub fn accept_content_hash(&self, hash: Option<&str>) -> bool {
        let Some(hash) = hash else { return true };
        let mut last = self.last_hash.lock();
        if last.as_deref() == Some(hash) {
            return false;
        }
        *last = Some(hash.to_string());
        true
    }

    /// Store page metadata, emitting an event when it changed.
    pub fn update_page(&self, meta: PageMetadata) {
        let mut page = self.page.lock();
        if page.as_ref() != Some(&meta) {
            *page = Some(meta.clone());
            drop(page);
            self.emit(StreamEvent::PageMetadata(meta));
        }
    }

    pub fn page(&self) -> Option<PageMetadata> {
        self.page.lock().clone()
    }

    // ── Transport ────────────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    /// Whether input should prefer the push channel.
    pub fn is_subscribed(&self) -> bool {
        self.selector.lock().is_subscribed()
    }

    /// See [`TransportSelector::begin_subscribe`].
    pub fn begin_subscribe(&self, channel_connected: bool) -> Result<bool, MirrorError> {
        let sent = self
            .selector
            .lock()
            .begin_subscribe(&self.id, channel_connected)?;
        if sent {
            self.publish_state();
        }
        Ok(sent)
    }

    pub fn subscribe_failed(&self) {
        if self.selector.lock().subscribe_failed().is_ok() {
            self.publish_state();
        }
    }

    /// Push delivery confirmed. Stops the poller on the first call.
    pub fn confirm_push(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let changed = self.selector.lock().confirm(&self.id);
        if changed {
            self.poll_cancel.lock().cancel();
            info!(session = %self.id, "push delivery active; polling suspended");
            self.publish_state();
        }
        changed
    }

    /// The push channel dropped. Returns `true` when polling had been
    /// suspended and must be restarted.
    pub fn channel_lost(&self) -> bool {
        let previous = self.selector.lock().channel_lost();
        if previous != ConnectionState::Polling {
            self.publish_state();
        }
        previous == ConnectionState::PushActive
    }

    /// Cancel any running poller and hand out a token for a new one.
    /// Returns `None` once the session has ended.
    pub fn restart_polling(&self) -> Option<CancellationToken> {
        if self.is_cancelled() {
            return None;
        }
        let fresh = self.cancel.child_token();
        let old = std::mem::replace(&mut *self.poll_cancel.lock(), fresh.clone());
        old.cancel();
        Some(fresh)
    }

    fn publish_state(&self) {
        let state = self.selector.lock().state();
        self.connection.send_replace(state);
        debug!(session = %self.id, %state, "connection state");
        self.emit(StreamEvent::ConnectionChanged {
            session_id: self.id.clone(),
            state,
        });
    }

    // ── Rendering ────────────────────────────────────────────────

    /// Dimensions of the last rendered frame; `None` before the first.
    pub fn frame_dimensions(&self) -> Option<FrameDimensions> {
        self.dimensions.borrow().clone()
    }

    pub fn has_frame(&self) -> bool {
        self.dimensions.borrow().is_some()
    }

    pub fn last_rendered_id(&self) -> u64 {
        self.last_rendered.load(Ordering::Acquire)
    }

    /// Bookkeeping after a frame reached the canvas.
    pub fn record_rendered(&self, frame_id: u64, frame: &Frame, size: Size) {
        self.last_rendered.store(frame_id, Ordering::Release);

        let dims = FrameDimensions {
            width: size.width,
            height: size.height,
            captured_at: frame.captured_at.clone(),
        };
        let mut resized = false;
        self.dimensions.send_modify(|current| {
            resized = current.as_ref().map(FrameDimensions::size) != Some(size);
            *current = Some(dims.clone());
        });
        if resized {
            info!(session = %self.id, %size, "frame dimensions changed");
            self.emit(StreamEvent::DimensionsChanged(dims));
        }

        let stats = self.stats.lock().record_frame(frame.byte_len() as u64).clone();
        self.emit(StreamEvent::FrameRendered {
            session_id: self.id.clone(),
            frame_id,
            size,
            byte_len: frame.byte_len(),
        });
        self.emit(StreamEvent::Stats(stats));
    }

    pub fn stats(&self) -> ClientFrameStats {
        self.stats.lock().snapshot()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn ctx() -> (SessionContext, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionContext::new("sess", tx), rx)
    }

    #[test]
    fn content_hash_memo() {
        let (ctx, _rx) = ctx();
        assert!(ctx.accept_content_hash(None));
        assert!(ctx.accept_content_hash(Some("a")));
        assert!(!ctx.accept_content_hash(Some("a")));
        assert!(ctx.accept_content_hash(Some("b")));
        assert!(ctx.accept_content_hash(None));
    }

    #[test]
    fn identical_binary_frames_are_deduplicated() {
        let (ctx, _rx) = ctx();
        assert_eq!(ctx.ingest(Frame::binary(Bytes::from_static(b"jpeg-a"))), Some(1));
        assert_eq!(ctx.ingest(Frame::binary(Bytes::from_static(b"jpeg-a"))), None);
        assert_eq!(ctx.ingest(Frame::binary(Bytes::from_static(b"jpeg-b"))), Some(2));
        assert_eq!(ctx.slot().dropped(), 1);
    }

    #[test]
    fn ingest_after_teardown_is_ignored() {
        let (ctx, _rx) = ctx();
        ctx.teardown();
        assert_eq!(ctx.ingest(Frame::binary(Bytes::from_static(b"x"))), None);
        assert!(!ctx.slot().has_pending());
    }

    #[test]
    fn etag_is_kept_when_response_has_none() {
        let (ctx, _rx) = ctx();
        ctx.set_etag(Some("\"v1\"".into()));
        ctx.set_etag(None);
        assert_eq!(ctx.etag().as_deref(), Some("\"v1\""));
    }

    #[test]
    fn page_metadata_emits_on_change_only() {
        let (ctx, mut rx) = ctx();
        let meta = PageMetadata {
            title: Some("A".into()),
            url: None,
        };
        ctx.update_page(meta.clone());
        ctx.update_page(meta.clone());
        assert_eq!(rx.try_recv().unwrap(), StreamEvent::PageMetadata(meta));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn confirm_push_cancels_poller_once() {
        let (ctx, _rx) = ctx();
        let poll = ctx.restart_polling().unwrap();
        assert!(ctx.confirm_push());
        assert!(poll.is_cancelled());
        assert!(!ctx.confirm_push());
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.connection_state(), ConnectionState::PushActive);
    }

    #[test]
    fn channel_loss_after_push_requests_restart() {
        let (ctx, _rx) = ctx();
        ctx.begin_subscribe(true).unwrap();
        assert!(!ctx.channel_lost(), "still polling while subscribing");

        ctx.begin_subscribe(true).unwrap();
        ctx.confirm_push();
        assert!(ctx.channel_lost());
        assert_eq!(ctx.connection_state(), ConnectionState::Polling);
        assert!(!ctx.is_subscribed());
    }

    #[test]
    fn teardown_cancels_everything() {
        let (ctx, _rx) = ctx();
        let poll = ctx.restart_polling().unwrap();
        ctx.begin_subscribe(true).unwrap();
        assert_eq!(ctx.teardown().as_deref(), Some("sess"));
        assert!(ctx.is_cancelled());
        assert!(poll.is_cancelled());
        assert!(ctx.restart_polling().is_none());
    }

    #[test]
    fn rendered_frames_update_dimensions_and_stats() {
        let (ctx, mut rx) = ctx();
        assert!(!ctx.has_frame());

        let frame = Frame::binary(Bytes::from_static(&[1, 2, 3, 4]));
        ctx.record_rendered(1, &frame, Size::new(800, 600));
        ctx.record_rendered(2, &frame, Size::new(800, 600));

        assert!(ctx.has_frame());
        assert_eq!(ctx.frame_dimensions().unwrap().size(), Size::new(800, 600));
        assert_eq!(ctx.stats().total_frames, 2);
        assert_eq!(ctx.last_rendered_id(), 2);

        let resizes = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, StreamEvent::DimensionsChanged(_)))
            .count();
        assert_eq!(resizes, 1);
    }

    #[test]
    fn no_events_after_teardown() {
        let (ctx, mut rx) = ctx();
        ctx.teardown();
        ctx.emit(StreamEvent::StreamError("late".into()));
        assert!(rx.try_recv().is_err());
    }
}
