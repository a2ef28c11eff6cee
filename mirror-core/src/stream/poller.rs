//! HTTP polling fallback.
//!
//! Fetches the latest frame with a conditional GET until cancelled,
//! backing off when the server is slow. The loop pauses (but keeps its
//! ETag and interval) while the view is hidden.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::MirrorError;
use crate::network::http::{FetchOutcome, LiveApi};
use crate::state::{SessionContext, StreamEvent};

/// Floor of the interval once the loop has backed off.
pub const MIN_BACKOFF_INTERVAL: Duration = Duration::from_millis(400);

/// Round trips longer than this count as this long.
pub const MAX_OBSERVED_ROUND_TRIP: Duration = Duration::from_millis(1500);

// ── Backoff ──────────────────────────────────────────────────────

/// Adaptive poll interval. Never decreases.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    interval: Duration,
}

impl Backoff {
    pub fn new(initial: Duration) -> Self {
        Self { interval: initial }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record a round trip and return how long to sleep before the next
    /// fetch.
    pub fn observe(&mut self, elapsed: Duration) -> Duration {
        if elapsed <= self.interval {
            return self.interval - elapsed;
        }
        let capped_ms = elapsed.min(MAX_OBSERVED_ROUND_TRIP).as_millis().max(1) as f64;
        let dampened_fps = (1000.0 / capped_ms).round().max(1.0);
        let next = Duration::from_millis((1000.0 / dampened_fps) as u64).max(MIN_BACKOFF_INTERVAL);
        if next > self.interval {
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                interval_ms = next.as_millis() as u64,
                "poll backing off"
            );
            self.interval = next;
        }
        self.interval
    }
}

// ── PollingLoop ──────────────────────────────────────────────────

/// Polling task for one session.
pub struct PollingLoop {
    ctx: Arc<SessionContext>,
    api: Arc<dyn LiveApi>,
    quality: u8,
    backoff: Backoff,
    visible: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl PollingLoop {
    pub fn new(
        ctx: Arc<SessionContext>,
        api: Arc<dyn LiveApi>,
        quality: u8,
        interval: Duration,
        visible: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx,
            api,
            quality,
            backoff: Backoff::new(interval),
            visible,
            cancel,
        }
    }

    /// Run until cancelled (push took over or the session ended).
    pub async fn run(mut self) {
        info!(session = %self.ctx.id(), interval_ms = self.backoff.interval().as_millis() as u64, "polling started");
        while self.wait_visible().await {
            let started = Instant::now();
            let etag = self.ctx.etag();
            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => break,
                r = self.api.fetch_frame(self.ctx.id(), self.quality, etag.as_deref()) => r,
            };
            self.handle(fetched);

            let delay = self.backoff.observe(started.elapsed());
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        info!(session = %self.ctx.id(), "polling stopped");
    }

    /// Block while hidden. Returns `false` when the loop should exit.
    async fn wait_visible(&mut self) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            if *self.visible.borrow_and_update() {
                return true;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                changed = self.visible.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    fn handle(&self, fetched: Result<FetchOutcome, MirrorError>) {
        match fetched {
            Ok(FetchOutcome::NotModified) => {}
            Ok(FetchOutcome::Frame { response, etag }) => {
                self.ctx.set_etag(etag);
                if let Some(meta) = response.page_metadata() {
                    self.ctx.update_page(meta);
                }
                match response.into_frame() {
                    Ok(frame) => {
                        self.ctx.ingest(frame);
                    }
                    Err(e) => {
                        warn!(session = %self.ctx.id(), "bad poll frame: {e}");
                        self.ctx.emit(StreamEvent::StreamError(e.to_string()));
                    }
                }
            }
            Err(e) => warn!(session = %self.ctx.id(), "frame poll failed: {e}"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
