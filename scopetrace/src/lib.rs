//! # scopetrace - Scoped Block Profiler
//!
//! scopetrace records named, nested time intervals ("blocks") and instant
//! events from any number of instrumented threads with low overhead, persists
//! them as a compact binary stream, and loads that stream back into
//! per-thread call trees for analysis.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Instrumented Threads                        │
//! │          scope_block!("parse")   scope_event!("tick")           │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ begin / end
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Recorder                                                       │
//! │  open stacks (per thread) ──► encoded store (completion order)  │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ flush / shutdown()
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Writer ──► preamble | descriptors | blocks  (profile file)     │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ProfileLoader (background thread, progress, cancel)            │
//! │     decode ──► arenas + records ──► tree builder                │
//! │                                         │                       │
//! │              ┌──────────────┐   ┌──────────────┐                │
//! │              │   Analysis   │   │    Export    │                │
//! │              │ (BlockStats) │   │ (trace.json) │                │
//! │              └──────────────┘   └──────────────┘                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Recording
//!
//! - [`recording`]: the concurrent [`Recorder`], RAII [`BlockGuard`], clock,
//!   thread identity and configuration
//! - [`descriptor`]: call-site descriptors, written once and read without locks
//! - [`codec`]: byte-exact block and descriptor encoding plus record framing
//! - [`writer`]: sequential profile stream writer
//!
//! ### Loading and Analysis
//!
//! - [`loader`]: background, cancellable [`ProfileLoader`] and the
//!   [`LoadedProfile`] it produces
//! - [`tree`]: per-thread call tree reconstruction
//! - [`analysis`]: per-descriptor statistics
//! - [`export`]: Chrome Trace Event Format JSON
//!
//! ### Shared
//!
//! - [`domain`]: newtypes (`ThreadId`, `DescriptorId`, `Timestamp`, `Duration`)
//!   and error enums
//! - [`cli`]: command-line arguments, demo workload and text reports
//!
//! ## Typical Usage
//!
//! ```no_run
//! fn handle_request() {
//!     scopetrace::scope_block!("handle_request");
//!     // ...
//! }
//!
//! handle_request();
//! // At controlled shutdown, write SCOPETRACE_OUTPUT (default profile.prof)
//! scopetrace::shutdown().ok();
//! ```
//!
//! ```bash
//! scopetrace inspect profile.prof --tree
//! scopetrace inspect profile.prof --export trace.json
//! ```

pub mod analysis;
pub mod cli;
pub mod codec;
pub mod descriptor;
pub mod domain;
pub mod export;
pub mod loader;
pub mod recording;
pub mod tree;
pub mod writer;

pub use descriptor::{BlockDescriptor, DescriptorSpec};
pub use domain::{BlockType, DescriptorId, Duration, ThreadId, Timestamp};
pub use loader::{LoadState, LoadedProfile, ProfileLoader};
pub use recording::{Block, BlockGuard, Recorder, RecorderConfig, RecorderStats};
pub use writer::WriteSummary;

/// Flush the global recorder to its configured output path
///
/// The single teardown hook for processes instrumented through the global
/// recorder. Does nothing if the global recorder was never used. A failed
/// write is logged and returned; recorded blocks are lost either way.
///
/// # Errors
/// Returns the write failure
pub fn shutdown() -> Result<Option<WriteSummary>, domain::WriteError> {
    let Some(recorder) = Recorder::try_global() else {
        return Ok(None);
    };

    let stats = recorder.stats();
    if stats.open_blocks > 0 {
        log::warn!("{} blocks still open at shutdown are not written", stats.open_blocks);
    }
    if stats.unmatched_ends > 0 {
        log::warn!("{} unmatched end_block calls were ignored", stats.unmatched_ends);
    }
    if stats.unknown_descriptors > 0 {
        log::warn!("{} blocks of unregistered descriptors were dropped", stats.unknown_descriptors);
    }

    recorder.set_enabled(false);
    match recorder.flush() {
        Ok(summary) => Ok(Some(summary)),
        Err(e) => {
            log::warn!("failed to write profile at shutdown: {e}");
            Err(e)
        }
    }
}
