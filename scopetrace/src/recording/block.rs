//! In-flight block
//!
//! A `Block` is created on begin with the current thread and timestamp, sits
//! on its thread's open stack while running and is finished exactly once.

use crate::codec::until_nul;
use crate::domain::{BlockType, DescriptorId, ThreadId, Timestamp};

use super::clock;

/// One recorded interval (or instant, for events)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    descriptor_id: DescriptorId,
    thread_id: ThreadId,
    begin: Timestamp,
    end: Option<Timestamp>,
    name: Option<String>,
    block_type: BlockType,
}

impl Block {
    /// Start a block on the calling thread, stamped now
    #[must_use]
    pub fn new(descriptor_id: DescriptorId, block_type: BlockType) -> Self {
        Self::from_parts(descriptor_id, clock::current_thread_id(), clock::now(), None, block_type)
    }

    /// Build a block from explicit fields
    #[must_use]
    pub fn from_parts(
        descriptor_id: DescriptorId,
        thread_id: ThreadId,
        begin: Timestamp,
        end: Option<Timestamp>,
        block_type: BlockType,
    ) -> Self {
        Self { descriptor_id, thread_id, begin, end, name: None, block_type }
    }

    /// Override the descriptor's display name for this instance
    ///
    /// The name is cut at its first NUL, as it would be on the wire.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let mut name = name.into();
        name.truncate(until_nul(&name).len());
        self.name = Some(name);
        self
    }

    /// Stamp the end time now; no-op if already finished
    pub fn finish(&mut self) {
        if self.end.is_none() {
            self.finish_at(clock::now());
        }
    }

    /// Stamp an explicit end time; no-op if already finished
    ///
    /// The end is clamped so that `end >= begin` always holds.
    pub fn finish_at(&mut self, end: Timestamp) {
        if self.end.is_none() {
            self.end = Some(end.max(self.begin));
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }

    #[must_use]
    pub fn descriptor_id(&self) -> DescriptorId {
        self.descriptor_id
    }

    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    #[must_use]
    pub fn begin(&self) -> Timestamp {
        self.begin
    }

    #[must_use]
    pub fn end(&self) -> Option<Timestamp> {
        self.end
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn block_type(&self) -> BlockType {
        self.block_type
    }
}
