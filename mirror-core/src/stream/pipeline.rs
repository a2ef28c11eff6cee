//! Decode & render loop.
//!
//! One task per session. It sleeps until the frame slot schedules a
//! wake-up, optionally waits for the next refresh tick, then decodes and
//! draws the freshest pending frame. Only one decode is ever in flight.
//!
//! ```text
//!  slot.scheduled() ─► [vsync tick] ─► take() ─► decode ─┬─ superseded ─► discard
//!                                                       └─ current ────► resize? ─► draw
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::state::{SessionContext, StreamEvent};
use crate::stream::canvas::Canvas;
use crate::stream::decoder::FrameDecoder;
use crate::stream::slot::PendingFrame;

/// Render loop for one session.
pub struct RenderPipeline<C: Canvas> {
    ctx: Arc<SessionContext>,
    decoder: Arc<dyn FrameDecoder>,
    canvas: Arc<Mutex<C>>,
    refresh: Option<Duration>,
}

/// What happened to a frame taken from the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    /// A newer frame arrived while this one was decoding.
    Superseded,
    Failed,
    Cancelled,
}

impl<C: Canvas> RenderPipeline<C> {
    pub fn new(
        ctx: Arc<SessionContext>,
        decoder: Arc<dyn FrameDecoder>,
        canvas: Arc<Mutex<C>>,
        refresh: Option<Duration>,
    ) -> Self {
        Self {
            ctx,
            decoder,
            canvas,
            refresh,
        }
    }

    /// Run until the session is cancelled.
    pub async fn run(self) {
        let cancel = self.ctx.cancel_token().clone();
        let mut ticker = self.refresh.map(|period| {
            let mut t: Interval = tokio::time::interval(period);
            t.set_missed_tick_behavior(MissedTickBehavior::Skip);
            t
        });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.ctx.slot().scheduled() => {}
            }
            if let Some(t) = ticker.as_mut() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = t.tick() => {}
                }
            }
            let Some(pending) = self.ctx.slot().take() else {
                continue;
            };
            if self.render(pending).await == RenderOutcome::Cancelled {
                break;
            }
        }
        debug!(session = %self.ctx.id(), "render loop stopped");
    }

    /// Decode and draw one frame.
    pub async fn render(&self, pending: PendingFrame) -> RenderOutcome {
        let PendingFrame { id, frame } = pending;
        let decoded = tokio::select! {
            _ = self.ctx.cancel_token().cancelled() => return RenderOutcome::Cancelled,
            r = self.decoder.decode(frame.bytes.clone()) => r,
        };
        if self.ctx.is_cancelled() {
            return RenderOutcome::Cancelled;
        }

        let bitmap = match decoded {
            Ok(bitmap) => bitmap,
            Err(e) => {
                warn!(session = %self.ctx.id(), frame = id, source = %frame.source, "frame decode failed: {e}");
                self.ctx.emit(StreamEvent::StreamError(e.to_string()));
                return RenderOutcome::Failed;
            }
        };

        if frame.source.is_push() {
            self.ctx.confirm_push();
        }

        if self.ctx.slot().is_superseded(id) {
            debug!(session = %self.ctx.id(), frame = id, latest = self.ctx.slot().latest_id(), "decoded frame superseded");
            return RenderOutcome::Superseded;
        }

        let size = bitmap.size();
        let drawn = {
            let mut canvas = self.canvas.lock();
            // A session switch cancels before clearing the shared canvas.
            if self.ctx.is_cancelled() {
                return RenderOutcome::Cancelled;
            }
            if canvas.size() != size {
                debug!(from = %canvas.size(), to = %size, "resizing canvas");
                canvas.resize(size);
            }
            canvas.draw(&bitmap)
        };
        if let Err(e) = drawn {
            warn!(session = %self.ctx.id(), frame = id, "frame draw failed: {e}");
            self.ctx.emit(StreamEvent::StreamError(e.to_string()));
            return RenderOutcome::Failed;
        }

        self.ctx.record_rendered(id, &frame, size);
        RenderOutcome::Rendered
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;
    use crate::state::ConnectionState;
    use crate::stream::canvas::SoftwareCanvas;
    use crate::stream::types::{DecodedFrame, Frame, FrameSource};
    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    /// Decodes `[w, h, fill]` into a solid bitmap; `b"bad"` fails.
    struct TinyDecoder;

    #[async_trait]
    impl FrameDecoder for TinyDecoder {
        async fn decode(&self, bytes: Bytes) -> Result<DecodedFrame, MirrorError> {
            match &bytes[..] {
                [w, h, fill] => Ok(DecodedFrame {
                    width: u32::from(*w),
                    height: u32::from(*h),
                    pixels: vec![*fill; usize::from(*w) * usize::from(*h) * 4],
                }),
                _ => Err(MirrorError::Decode("not a tiny frame".into())),
            }
        }
    }

    fn setup() -> (
        RenderPipeline<SoftwareCanvas>,
        Arc<SessionContext>,
        Arc<Mutex<SoftwareCanvas>>,
        mpsc::UnboundedReceiver<StreamEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(SessionContext::new("s", tx));
        let canvas = Arc::new(Mutex::new(SoftwareCanvas::new()));
        let p = RenderPipeline::new(ctx.clone(), Arc::new(TinyDecoder), canvas.clone(), None);
        (p, ctx, canvas, rx)
    }

    fn poll_frame(bytes: &'static [u8]) -> Frame {
        Frame {
            source: FrameSource::Poll,
            ..Frame::binary(Bytes::from_static(bytes))
        }
    }

    #[tokio::test]
    async fn renders_and_resizes_once() {
        let (p, ctx, canvas, _rx) = setup();

        ctx.slot().submit(poll_frame(&[2, 2, 9]));
        let out = p.render(ctx.slot().take().unwrap()).await;
        assert_eq!(out, RenderOutcome::Rendered);

        ctx.slot().submit(poll_frame(&[2, 2, 5]));
        p.render(ctx.slot().take().unwrap()).await;

        let c = canvas.lock();
        assert_eq!(c.resize_count(), 1);
        assert_eq!(c.draw_count(), 2);
        assert_eq!(c.pixel(0, 0), Some([5, 5, 5, 5]));
        assert_eq!(ctx.stats().total_frames, 2);
    }

    #[tokio::test]
    async fn superseded_frame_is_not_drawn() {
        let (p, ctx, canvas, _rx) = setup();
        ctx.slot().submit(poll_frame(&[1, 1, 1]));
        let first = ctx.slot().take().unwrap();
        ctx.slot().submit(poll_frame(&[1, 1, 2]));

        assert_eq!(p.render(first).await, RenderOutcome::Superseded);
        assert_eq!(canvas.lock().draw_count(), 0);
        assert!(!ctx.has_frame());
    }

    #[tokio::test]
    async fn decode_failure_is_reported() {
        let (p, ctx, _canvas, mut rx) = setup();
        ctx.slot().submit(poll_frame(b"bad!"));
        assert_eq!(p.render(ctx.slot().take().unwrap()).await, RenderOutcome::Failed);
        assert!(matches!(rx.try_recv(), Ok(StreamEvent::StreamError(_))));
        assert_eq!(ctx.stats().total_frames, 0);
    }

    #[tokio::test]
    async fn push_frame_confirms_subscription() {
        let (p, ctx, _canvas, _rx) = setup();
        let poll = ctx.restart_polling().unwrap();
        ctx.begin_subscribe(true).unwrap();

        ctx.slot().submit(Frame::binary(Bytes::from_static(&[1, 1, 0])));
        p.render(ctx.slot().take().unwrap()).await;

        assert_eq!(ctx.connection_state(), ConnectionState::PushActive);
        assert!(poll.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_session_never_draws() {
        let (p, ctx, canvas, mut rx) = setup();
        ctx.slot().submit(poll_frame(&[2, 2, 9]));
        let pending = ctx.slot().take().unwrap();
        ctx.teardown();

        assert_eq!(p.render(pending).await, RenderOutcome::Cancelled);
        let c = canvas.lock();
        assert_eq!(c.draw_count(), 0);
        assert!(c.size().is_empty());
        assert!(!ctx.has_frame());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_loop_stops_on_cancel() {
        let (p, ctx, canvas, _rx) = setup();
        let handle = tokio::spawn(p.run());
        ctx.ingest(poll_frame(&[3, 1, 7]));

        for _ in 0..50 {
            if ctx.has_frame() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(ctx.has_frame());
        assert_eq!(canvas.lock().size(), crate::geometry::Size::new(3, 1));

        ctx.teardown();
        handle.await.unwrap();
    }
}
