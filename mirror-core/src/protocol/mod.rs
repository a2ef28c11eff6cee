//! Wire payload definitions.
//!
//! Each sub-module defines the JSON shapes for one surface: push channel
//! messages, HTTP fallback responses, and the input payload shared by
//! both. Payloads are serialized with `serde` + `serde_json`.

pub mod http;
pub mod input;
pub mod push;

// Re-export the most commonly used types at the protocol level.
pub use http::{LiveFrameResponse, PageMetadata};
pub use input::{InputPayload, Modifiers, MouseButton, PointerAction};
pub use push::{ClientMessage, FramePayload, ServerMessage};
