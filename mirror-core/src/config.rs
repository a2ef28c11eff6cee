//! Stream tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lower bound on the polling interval, whatever the fps.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Configuration for a [`MirrorClient`](crate::stream::MirrorClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Target frames per second for HTTP polling.
    pub fps: u32,
    /// JPEG quality requested from the frame endpoint (1..=100).
    pub quality: u8,
    /// Pace rendering on a refresh interval.
    pub vsync: bool,
    /// Refresh rate used when `vsync` is on.
    pub refresh_hz: u32,
    /// Minimum gap between forwarded pointer moves.
    pub move_throttle_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            quality: 70,
            vsync: true,
            refresh_hz: 60,
            move_throttle_ms: 100,
        }
    }
}

impl StreamConfig {
    /// Initial polling interval: `max(300ms, 1000/fps)`.
    pub fn poll_interval(&self) -> Duration {
        let per_frame = Duration::from_millis(1000 / u64::from(self.fps.max(1)));
        per_frame.max(MIN_POLL_INTERVAL)
    }

    /// Refresh tick length, or `None` when vsync is off.
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.vsync
            .then(|| Duration::from_secs_f64(1.0 / f64::from(self.refresh_hz.max(1))))
    }

    pub fn move_throttle(&self) -> Duration {
        Duration::from_millis(self.move_throttle_ms)
    }

    /// `quality` clamped to the accepted range.
    pub fn clamped_quality(&self) -> u8 {
        self.quality.clamp(1, 100)
    }
}
