//! Server-pushed pipeline statistics.
//!
//! The capture server computes percentiles and a bottleneck guess for
//! each live session and pushes them as `recording_stats` messages.
//! They are kept per session for display and never steer transport
//! decisions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Bottleneck ───────────────────────────────────────────────────

/// Stage the server believes limits the frame rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Bottleneck {
    Capture,
    Encode,
    Network,
    Decode,
    Draw,
    #[default]
    None,
}

impl Bottleneck {
    pub fn severity(self) -> Severity {
        match self {
            Bottleneck::None => Severity::None,
            Bottleneck::Encode | Bottleneck::Decode | Bottleneck::Draw => Severity::Warning,
            Bottleneck::Capture | Bottleneck::Network => Severity::Critical,
        }
    }
}

/// Display severity derived from a bottleneck.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::None => write!(f, "none"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

// ── ServerFrameStats ─────────────────────────────────────────────

/// Statistics as computed by the capture server. Read-only here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerFrameStats {
    pub capture_p50_ms: f64,
    pub capture_p95_ms: f64,
    pub capture_p99_ms: f64,
    pub e2e_p50_ms: f64,
    pub e2e_p95_ms: f64,
    pub e2e_p99_ms: f64,
    pub actual_fps: f64,
    pub target_fps: f64,
    pub primary_bottleneck: Bottleneck,
}

impl ServerFrameStats {
    pub fn severity(&self) -> Severity {
        self.primary_bottleneck.severity()
    }
}

// ── ServerStatsRegistry ──────────────────────────────────────────

/// Latest server statistics per session.
#[derive(Debug, Default)]
pub struct ServerStatsRegistry {
    by_session: HashMap<String, ServerFrameStats>,
}

impl ServerStatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the latest stats for `session_id`, returning their severity.
    pub fn ingest(&mut self, session_id: &str, stats: ServerFrameStats) -> Severity {
        let severity = stats.severity();
        self.by_session.insert(session_id.to_string(), stats);
        severity
    }

    pub fn get(&self, session_id: &str) -> Option<&ServerFrameStats> {
        self.by_session.get(session_id)
    }

    pub fn remove(&mut self, session_id: &str) {
        self.by_session.remove(session_id);
    }
}
