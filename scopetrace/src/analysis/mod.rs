//! Analysis logic for loaded profiles
//!
//! Pure aggregation over a `LoadedProfile`, separate from any presentation.

pub mod block_stats;

pub use block_stats::{analyze_blocks, BlockStats, BlockStatsAggregator};
