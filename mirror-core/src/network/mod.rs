//! Transports to the recording server.
//!
//! - [`push`]: the shared WebSocket channel (frames in, input out).
//! - [`http`]: the polling frame endpoint and the input endpoint.

pub mod http;
pub mod push;

pub use http::{FetchOutcome, HttpLiveApi, LiveApi};
pub use push::{PushChannel, PushEvent, WebSocketPush};
