//! Frame streaming: ingest, decode, render, polling and input.

pub mod canvas;
pub mod client;
pub mod decoder;
pub mod input;
pub mod pipeline;
pub mod poller;
pub mod slot;
pub mod types;

pub use canvas::{Canvas, SoftwareCanvas};
pub use client::{MirrorClient, MirrorClientBuilder};
pub use decoder::{FrameDecoder, ImageFrameDecoder};
pub use input::{InputEvent, InputForwarder, InputRoute};
pub use pipeline::{RenderOutcome, RenderPipeline};
pub use poller::{Backoff, PollingLoop};
pub use slot::{FrameSlot, PendingFrame};
pub use types::{DecodedFrame, Frame, FrameSource};
