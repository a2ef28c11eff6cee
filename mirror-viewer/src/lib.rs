//! # mirror-viewer — headless live viewport viewer
//!
//! Mirrors a remote browser session into an in-memory canvas, reads an
//! input script from stdin and forwards it to the remote, and writes PNG
//! snapshots of the mirrored frame on request.

pub mod commands;
pub mod config;
pub mod display;
