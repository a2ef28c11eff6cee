//! # mirror-core
//!
//! Live mirroring of a remote browser viewport into a local canvas, with
//! input forwarded back to the remote.
//!
//! This crate contains:
//! - **Geometry / coords**: `Rect`, `Viewport`, and the letterbox-aware
//!   screen → viewport mapper
//! - **Protocol**: push-channel messages and HTTP payloads (`serde`)
//! - **Network**: `WebSocketPush` (auto-reconnect) and `HttpLiveApi`
//! - **State**: `SessionContext` and the `Polling → Subscribing → PushActive`
//!   transport selector
//! - **Stream**: single-slot frame ingest, decode/render loop, polling
//!   fallback with adaptive backoff, input forwarding, and `MirrorClient`
//! - **Stats**: client frame statistics and server bottleneck reports
//! - **Error**: `MirrorError` — typed, `thiserror`-based error hierarchy

pub mod config;
pub mod coords;
pub mod error;
pub mod geometry;
pub mod network;
pub mod protocol;
pub mod state;
pub mod stats;
pub mod stream;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use config::StreamConfig;
pub use coords::{CoordinateMapper, MappingMode, map_to_viewport};
pub use error::MirrorError;
pub use geometry::{FrameDimensions, Point, Rect, Size, Viewport};
pub use network::{FetchOutcome, HttpLiveApi, LiveApi, PushChannel, PushEvent, WebSocketPush};
pub use protocol::{
    ClientMessage, InputPayload, LiveFrameResponse, Modifiers, MouseButton, PageMetadata,
    PointerAction, ServerMessage,
};
pub use state::{ConnectionState, SessionContext, StreamEvent};
pub use stats::{ClientFrameStats, ServerFrameStats, Severity, StatsAggregator};
pub use stream::{
    Canvas, FrameDecoder, ImageFrameDecoder, InputEvent, InputRoute, MirrorClient, SoftwareCanvas,
};
