//! # Recording Engine
//!
//! Tracks open blocks per thread and collects finished blocks, encoded, in a
//! shared store.
//!
//! ## Locking
//!
//! ```text
//! begin ──► [enabled?] ──► lock(open_stacks) push        (Block)
//!                      └─► encode ─► lock(store) append  (Event)
//!
//! end   ──► [enabled?] ──► lock(open_stacks) pop ─► unlock
//!                                    └─► encode ─► lock(store) append
//! ```
//!
//! The enable flag is an atomic load. The stack-map lock and the store lock
//! are never held together, so threads only serialize on the short append.
//!
//! Nothing here returns an error or panics into instrumented code: poisoned
//! locks are recovered, and unmatched ends and blocks of unregistered
//! descriptors are counted, not reported.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::codec::EncodedBlock;
use crate::descriptor::{DescriptorSpec, DescriptorTable};
use crate::domain::{BlockType, DescriptorId, ThreadId, WriteError};
use crate::writer::{self, WriteSummary};

use super::block::Block;
use super::clock;
use super::config::RecorderConfig;

/// Snapshot of recorder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Encoded blocks waiting in the store
    pub stored_blocks: usize,
    /// Blocks begun but not yet ended, over all threads
    pub open_blocks: usize,
    /// `end_block` calls that found an empty stack
    pub unmatched_ends: u64,
    /// Finished blocks dropped because their descriptor is not registered here
    pub unknown_descriptors: u64,
    /// Registered descriptors
    pub descriptors: usize,
}

/// Concurrent block recorder
///
/// Construct independent instances with [`Recorder::new`], or use the lazily
/// initialised process-wide instance from [`Recorder::global`].
pub struct Recorder {
    config: RecorderConfig,
    enabled: AtomicBool,
    descriptors: DescriptorTable,
    open_stacks: Mutex<HashMap<ThreadId, Vec<Block>>>,
    store: Mutex<Vec<EncodedBlock>>,
    unmatched_ends: AtomicU64,
    unknown_descriptors: AtomicU64,
}

static GLOBAL: OnceLock<Recorder> = OnceLock::new();

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default())
    }
}

impl Recorder {
    #[must_use]
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            descriptors: DescriptorTable::new(),
            open_stacks: Mutex::new(HashMap::new()),
            store: Mutex::new(Vec::with_capacity(config.store_capacity)),
            unmatched_ends: AtomicU64::new(0),
            unknown_descriptors: AtomicU64::new(0),
            config,
        }
    }

    /// Process-wide recorder
    ///
    /// Created on first access from [`RecorderConfig::from_env`]. Drain it at
    /// controlled shutdown with [`crate::shutdown`].
    pub fn global() -> &'static Recorder {
        GLOBAL.get_or_init(|| {
            let config = RecorderConfig::from_env();
            log::debug!("initialising global recorder ({config:?})");
            Recorder::new(config)
        })
    }

    /// The global recorder, if anything has touched it yet
    pub fn try_global() -> Option<&'static Recorder> {
        GLOBAL.get()
    }

    #[must_use]
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    #[must_use]
    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    /// Register a call site; see [`DescriptorTable::register`]
    pub fn register(&self, spec: DescriptorSpec) -> Option<DescriptorId> {
        self.descriptors.register(spec)
    }

    /// Toggle recording for subsequently entered blocks
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    // =========================================================================
    // HOT PATH
    // =========================================================================

    /// Begin a block on the calling thread
    ///
    /// Scoped blocks go on the thread's open stack; events are stored
    /// immediately. No-op while disabled.
    pub fn begin_block(&self, block: Block) {
        if !self.is_enabled() {
            return;
        }
        match block.block_type() {
            BlockType::Block => {
                self.lock_stacks().entry(block.thread_id()).or_default().push(block);
            }
            BlockType::Event => {
                let mut block = block;
                block.finish_at(block.begin());
                self.store_block(&block);
            }
        }
    }

    /// End the innermost open block of the calling thread
    ///
    /// No-op while disabled. An end without a matching begin is ignored and
    /// counted in [`RecorderStats::unmatched_ends`].
    pub fn end_block(&self) {
        if !self.is_enabled() {
            return;
        }
        self.close_innermost(clock::current_thread_id());
    }

    fn close_innermost(&self, thread_id: ThreadId) {
        let popped = {
            let mut stacks = self.lock_stacks();
            let popped = stacks.get_mut(&thread_id).and_then(Vec::pop);
            if stacks.get(&thread_id).is_some_and(Vec::is_empty) {
                stacks.remove(&thread_id);
            }
            popped
        };

        let Some(mut block) = popped else {
            self.unmatched_ends.fetch_add(1, Ordering::Relaxed);
            return;
        };
        block.finish();
        self.store_block(&block);
    }

    fn store_block(&self, block: &Block) {
        match self.descriptors.get(block.descriptor_id()) {
            Some(descriptor) if descriptor.is_enabled => {}
            Some(_) => return,
            None => {
                self.unknown_descriptors.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        let encoded = EncodedBlock::encode(block);
        self.lock_store().push(encoded);
    }

    fn lock_stacks(&self) -> MutexGuard<'_, HashMap<ThreadId, Vec<Block>>> {
        self.open_stacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_store(&self) -> MutexGuard<'_, Vec<EncodedBlock>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // SCOPED HELPERS
    // =========================================================================

    /// Begin a scoped block that ends when the guard drops
    #[must_use = "the block ends when the guard is dropped"]
    pub fn scope(&self, descriptor_id: DescriptorId) -> BlockGuard<'_> {
        self.scope_block(|| Block::new(descriptor_id, BlockType::Block))
    }

    /// Like [`scope`](Self::scope) with a per-instance name
    #[must_use = "the block ends when the guard is dropped"]
    pub fn scope_named(&self, descriptor_id: DescriptorId, name: impl Into<String>) -> BlockGuard<'_> {
        self.scope_block(|| Block::new(descriptor_id, BlockType::Block).with_name(name))
    }

    fn scope_block(&self, make: impl FnOnce() -> Block) -> BlockGuard<'_> {
        if !self.is_enabled() {
            return BlockGuard::disarmed(self);
        }
        let block = make();
        let thread_id = block.thread_id();
        // Push directly: the guard is armed, so the block must be on the stack
        self.lock_stacks().entry(thread_id).or_default().push(block);
        BlockGuard { recorder: self, thread_id: Some(thread_id) }
    }

    /// Record an instant event
    pub fn event(&self, descriptor_id: DescriptorId) {
        if !self.is_enabled() {
            return;
        }
        self.begin_block(Block::new(descriptor_id, BlockType::Event));
    }

    /// Record an instant event with a per-instance name
    pub fn event_named(&self, descriptor_id: DescriptorId, name: impl Into<String>) {
        if !self.is_enabled() {
            return;
        }
        self.begin_block(Block::new(descriptor_id, BlockType::Event).with_name(name));
    }

    // =========================================================================
    // DRAINING
    // =========================================================================

    /// Number of encoded blocks in the store
    #[must_use]
    pub fn stored_len(&self) -> usize {
        self.lock_store().len()
    }

    /// Take every stored block, leaving the store empty
    #[must_use]
    pub fn drain(&self) -> Vec<EncodedBlock> {
        std::mem::take(&mut *self.lock_store())
    }

    #[must_use]
    pub fn stats(&self) -> RecorderStats {
        let open_blocks = self.lock_stacks().values().map(Vec::len).sum();
        RecorderStats {
            stored_blocks: self.stored_len(),
            open_blocks,
            unmatched_ends: self.unmatched_ends.load(Ordering::Relaxed),
            unknown_descriptors: self.unknown_descriptors.load(Ordering::Relaxed),
            descriptors: self.descriptors.len(),
        }
    }

    /// Drain the store and write a complete profile to `out`
    ///
    /// Blocks still open are not included.
    ///
    /// # Errors
    /// Returns an error if writing fails; the drained blocks are lost.
    pub fn write_to<W: Write>(&self, out: W) -> Result<WriteSummary, WriteError> {
        let blocks = self.drain();
        let descriptors: Vec<_> = self.descriptors.iter().collect();
        writer::write_profile(out, descriptors, &blocks)
    }

    /// Drain the store into a profile file at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written
    pub fn flush_to(&self, path: impl AsRef<Path>) -> Result<WriteSummary, WriteError> {
        let blocks = self.drain();
        let descriptors: Vec<_> = self.descriptors.iter().collect();
        writer::write_profile_file(path, descriptors, &blocks)
    }

    /// Drain the store into the configured output path
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written
    pub fn flush(&self) -> Result<WriteSummary, WriteError> {
        self.flush_to(&self.config.output_path)
    }
}

/// Ends its block when dropped
///
/// A guard created while the recorder was disabled is disarmed and does
/// nothing. An armed guard always closes its block, even if recording has
/// been disabled in the meantime.
#[must_use = "the block ends when the guard is dropped"]
pub struct BlockGuard<'a> {
    recorder: &'a Recorder,
    thread_id: Option<ThreadId>,
}

impl<'a> BlockGuard<'a> {
    /// A guard that records nothing
    pub fn disarmed(recorder: &'a Recorder) -> Self {
        Self { recorder, thread_id: None }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.thread_id.is_some()
    }
}

impl Drop for BlockGuard<'_> {
    fn drop(&mut self) {
        if let Some(thread_id) = self.thread_id.take() {
            self.recorder.close_innermost(thread_id);
        }
    }
}
