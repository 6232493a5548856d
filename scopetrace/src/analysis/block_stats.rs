//! Per-descriptor block statistics.
//!
//! Aggregates a loaded profile by descriptor to show where recorded time went:
//! how often each block ran, its total and self time, and which threads ran it.
//!
//! # Architecture
//!
//! - **`BlockStatsAggregator`** - Incremental aggregation, one node at a time
//! - **`analyze_blocks()`** - Batch analysis over a `LoadedProfile`'s trees
//!
//! ## Data Flow
//!
//! ```text
//! LoadedProfile.trees
//!     │  pre-order walk
//!     ▼
//! BlockStatsAggregator.record_node()
//!     │
//!     ▼
//! to_stats() ──► Vec<BlockStats> sorted by total time
//! ```
//!
//! # Performance
//!
//! - `record_node()`: O(children) for self time, O(1) amortized otherwise
//! - `to_stats()`: O(n log n) where n = descriptors seen
//!
//! Events are counted but contribute no time.

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use std::collections::HashMap;

use crate::domain::{BlockType, DescriptorId, Duration, ThreadId};
use crate::loader::LoadedProfile;
use crate::tree::BlockNode;

// =============================================================================
// BLOCK STATS (OUTPUT TYPE)
// =============================================================================

/// Aggregated statistics for one descriptor.
///
/// ```text
/// BLOCK                 COUNT     TOTAL      SELF   SHARE
/// parse_frame            1200   412.20ms   380.01ms  61.3%
/// decode_header          1200    32.19ms    32.19ms   4.8%
/// ```
#[derive(Debug, Clone)]
pub struct BlockStats {
    pub descriptor_id: DescriptorId,

    /// Descriptor name (instance overrides are folded into their descriptor).
    pub name: String,

    pub file: String,
    pub line: u32,
    pub block_type: BlockType,

    /// Number of recorded instances.
    pub count: u64,

    /// Sum of instance durations.
    pub total: Duration,

    /// Sum of instance durations minus their direct children.
    pub self_time: Duration,

    /// Shortest instance, zero when `count == 0`.
    pub min: Duration,

    pub max: Duration,

    /// Share of all recorded root time (0.0 - 100.0).
    ///
    /// Nested blocks are measured against the same denominator, so shares
    /// across descriptors can sum past 100.
    pub percentage: f64,

    /// Per-thread breakdown: thread → instance count.
    pub threads: HashMap<ThreadId, u64>,
}

impl BlockStats {
    /// Mean instance duration
    #[must_use]
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration(0)
        } else {
            Duration(self.total.0 / self.count)
        }
    }
}

// =============================================================================
// AGGREGATOR
// =============================================================================

/// Incremental statistics aggregator.
///
/// Feed nodes with [`record_node`](Self::record_node); call
/// [`record_root_time`](Self::record_root_time) for each root so percentages
/// have a denominator.
#[derive(Debug, Default)]
pub struct BlockStatsAggregator {
    descriptors: HashMap<DescriptorId, Accumulator>,

    /// Total duration of root blocks, the percentage denominator.
    root_time: u64,
}

#[derive(Debug, Clone)]
struct Accumulator {
    block_type: BlockType,
    count: u64,
    total: u64,
    self_time: u64,
    min: u64,
    max: u64,
    threads: HashMap<ThreadId, u64>,
}

impl Accumulator {
    fn new(block_type: BlockType) -> Self {
        Self {
            block_type,
            count: 0,
            total: 0,
            self_time: 0,
            min: u64::MAX,
            max: 0,
            threads: HashMap::new(),
        }
    }
}

impl BlockStatsAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one node (not its children)
    pub fn record_node(&mut self, node: &BlockNode) {
        let block = &node.block;
        let duration = node.duration().0;
        let acc = self
            .descriptors
            .entry(block.descriptor_id)
            .or_insert_with(|| Accumulator::new(block.block_type));

        acc.count += 1;
        acc.total = acc.total.saturating_add(duration);
        acc.self_time = acc.self_time.saturating_add(node.self_duration().0);
        acc.min = acc.min.min(duration);
        acc.max = acc.max.max(duration);
        *acc.threads.entry(block.thread_id).or_insert(0) += 1;
    }

    pub fn record_root_time(&mut self, duration: Duration) {
        self.root_time = self.root_time.saturating_add(duration.0);
    }

    /// Record a whole forest: every node plus the roots' time
    pub fn record_tree(&mut self, roots: &[BlockNode]) {
        for root in roots {
            self.record_root_time(root.duration());
            for (_, node) in root.walk() {
                self.record_node(node);
            }
        }
    }

    #[must_use]
    pub fn root_time(&self) -> Duration {
        Duration(self.root_time)
    }

    /// Convert to a list sorted by total time (largest first), then count
    ///
    /// Names and locations are resolved through `profile`.
    #[must_use]
    pub fn to_stats(&self, profile: &LoadedProfile) -> Vec<BlockStats> {
        let mut stats: Vec<BlockStats> = self
            .descriptors
            .iter()
            .map(|(&descriptor_id, acc)| {
                let (name, file, line) = match profile.descriptor(descriptor_id) {
                    Some(d) => (
                        profile.descriptor_name(d).to_string(),
                        profile.descriptor_file(d).to_string(),
                        d.line,
                    ),
                    None => (descriptor_id.to_string(), String::new(), 0),
                };
                let percentage = if self.root_time > 0 {
                    (acc.total as f64 / self.root_time as f64) * 100.0
                } else {
                    0.0
                };

                BlockStats {
                    descriptor_id,
                    name,
                    file,
                    line,
                    block_type: acc.block_type,
                    count: acc.count,
                    total: Duration(acc.total),
                    self_time: Duration(acc.self_time),
                    min: Duration(if acc.count == 0 { 0 } else { acc.min }),
                    max: Duration(acc.max),
                    percentage,
                    threads: acc.threads.clone(),
                }
            })
            .collect();

        stats.sort_unstable_by(|a, b| {
            b.total.cmp(&a.total).then(b.count.cmp(&a.count)).then(a.descriptor_id.cmp(&b.descriptor_id))
        });
        stats
    }
}

/// Analyze a loaded profile by descriptor (batch analysis).
///
/// # Returns
/// One entry per descriptor that recorded at least one block, sorted by
/// total time (largest first)
#[must_use]
pub fn analyze_blocks(profile: &LoadedProfile) -> Vec<BlockStats> {
    let mut aggregator = BlockStatsAggregator::new();
    for roots in profile.trees().values() {
        aggregator.record_tree(roots);
    }
    aggregator.to_stats(profile)
}
