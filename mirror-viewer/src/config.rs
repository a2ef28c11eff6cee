//! Viewer configuration.

use std::path::{Path, PathBuf};

use mirror_core::{Rect, StreamConfig, Viewport};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Server endpoints.
    pub network: NetworkConfig,
    /// Frame streaming.
    pub stream: StreamConfig,
    /// Simulated on-screen layout.
    pub display: DisplayConfig,
    /// Input forwarding settings.
    pub input: InputConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Base URL of the HTTP API (`/recordings/live/...` is appended).
    pub api_base_url: String,
    /// WebSocket URL of the push channel. Empty disables push.
    pub push_url: String,
    /// HTTP request timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Container rectangle the mirror is shown in (document coords).
    pub container_left: f64,
    pub container_top: f64,
    pub container_width: f64,
    pub container_height: f64,
    /// Logical viewport of the remote browser. 0 means unknown.
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Where `snapshot` writes the canvas.
    pub snapshot_path: PathBuf,
}

/// Input forwarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Forward pointer and wheel events.
    pub capture_mouse: bool,
    /// Forward keyboard and text events.
    pub capture_keyboard: bool,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/api".into(),
            push_url: "ws://127.0.0.1:8080/ws".into(),
            timeout_ms: 5000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            container_left: 0.0,
            container_top: 0.0,
            container_width: 1280.0,
            container_height: 720.0,
            viewport_width: 1280,
            viewport_height: 720,
            snapshot_path: PathBuf::from("mirror-snapshot.png"),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            capture_mouse: true,
            capture_keyboard: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl DisplayConfig {
    pub fn container(&self) -> Rect {
        Rect::new(
            self.container_left,
            self.container_top,
            self.container_width,
            self.container_height,
        )
    }

    /// Configured viewport, or `None` when left at 0×0.
    pub fn viewport(&self) -> Option<Viewport> {
        let v = Viewport::new(self.viewport_width, self.viewport_height);
        (!v.is_empty()).then_some(v)
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ViewerConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
