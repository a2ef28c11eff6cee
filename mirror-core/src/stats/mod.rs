//! Frame statistics: rolling client-side counters and server-pushed
//! percentile/bottleneck reports.

pub mod client;
pub mod server;

pub use client::{ClientFrameStats, STATS_WINDOW, StatsAggregator};
pub use server::{Bottleneck, ServerFrameStats, ServerStatsRegistry, Severity};
