//! Client-side frame statistics.
//!
//! Tracks rendered frames over a rolling window and derives frame rate
//! and throughput. Only rendered frames are recorded: a `304` poll or a
//! superseded decode never reaches [`StatsAggregator::record_frame`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Window used for `avg_fps` and `bytes_per_second`.
pub const STATS_WINDOW: Duration = Duration::from_secs(5);

const FPS_WINDOW: Duration = Duration::from_secs(1);

// ── ClientFrameStats ─────────────────────────────────────────────

/// Rolling counters exposed to observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientFrameStats {
    pub total_frames: u64,
    pub total_bytes: u64,
    /// Frames rendered during the last second.
    pub current_fps: f64,
    /// Average frame rate over the rolling window.
    pub avg_fps: f64,
    pub last_frame_size: u64,
    pub avg_frame_size: u64,
    /// Encoded bytes per second over the rolling window.
    pub bytes_per_second: u64,
}

// ── StatsAggregator ──────────────────────────────────────────────

/// Rolling-window frame statistics.
///
/// Records `(timestamp, bytes)` samples for rendered frames and keeps
/// the most recent [`STATS_WINDOW`] of them.
#[derive(Debug)]
pub struct StatsAggregator {
    /// Samples: `(when, bytes)`.
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    /// Running total of bytes in the window.
    window_bytes: u64,
    /// When the first frame of the session was recorded.
    first_frame_at: Option<Instant>,
    stats: ClientFrameStats,
}

impl StatsAggregator {
    /// Create an aggregator with the standard 5-second window.
    pub fn new() -> Self {
        Self::with_window(STATS_WINDOW)
    }

    /// Create an aggregator with a custom window duration.
    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(128),
            window,
            window_bytes: 0,
            first_frame_at: None,
            stats: ClientFrameStats::default(),
        }
    }

    /// Record one rendered frame of `byte_size` encoded bytes.
    pub fn record_frame(&mut self, byte_size: u64) -> &ClientFrameStats {
        self.record_frame_at(Instant::now(), byte_size)
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_frame_at(&mut self, now: Instant, byte_size: u64) -> &ClientFrameStats {
        self.first_frame_at.get_or_insert(now);
        self.samples.push_back((now, byte_size));
        self.window_bytes += byte_size;
        self.evict(now);

        let s = &mut self.stats;
        s.total_frames += 1;
        s.total_bytes += byte_size;
        s.last_frame_size = byte_size;
        s.avg_frame_size = s.total_bytes / s.total_frames;

        s.current_fps = self
            .samples
            .iter()
            .rev()
            .take_while(|(ts, _)| now.duration_since(*ts) < FPS_WINDOW)
            .count() as f64;

        // Until a full window has elapsed, average over the time actually
        // observed, but never less than one second.
        let observed = self
            .first_frame_at
            .map(|first| now.duration_since(first))
            .unwrap_or_default();
        let span = observed.clamp(FPS_WINDOW, self.window.max(FPS_WINDOW)).as_secs_f64();
        s.avg_fps = self.samples.len() as f64 / span;
        s.bytes_per_second = (self.window_bytes as f64 / span) as u64;

        &self.stats
    }

    /// Current statistics.
    pub fn snapshot(&self) -> ClientFrameStats {
        self.stats.clone()
    }

    /// Number of samples currently in the window.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Zero everything (session change).
    pub fn reset(&mut self) {
        *self = Self::with_window(self.window);
    }

    // ── Internal ─────────────────────────────────────────────────

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, bytes)) = self.samples.front() {
            if now.duration_since(ts) > self.window {
                self.samples.pop_front();
                self.window_bytes = self.window_bytes.saturating_sub(bytes);
            } else {
                break;
            }
        }
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
