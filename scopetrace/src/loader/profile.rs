//! Loaded profile model
//!
//! Records here are `Copy` headers plus arena views; strings are resolved
//! through the owning [`LoadedProfile`].

use std::path::{Path, PathBuf};

use scopetrace_common::{BlockHeader, DescriptorHeader};

use super::arena::{ArenaSlice, SerializedData};
use crate::codec::{BlockView, DescriptorView};
use crate::domain::{BlockType, DescriptorId, Duration, ThreadId, Timestamp};
use crate::tree::{BlockNode, ThreadTrees};

/// One block as loaded from a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    pub descriptor_id: DescriptorId,
    pub thread_id: ThreadId,
    pub begin: Timestamp,
    pub end: Timestamp,
    pub block_type: BlockType,

    /// Per-instance name override in the block arena
    pub name: Option<ArenaSlice>,
}

impl BlockRecord {
    /// Build from a decoded view whose bytes sit at `record` in the arena
    pub(crate) fn from_view(view: &BlockView<'_>, record: ArenaSlice) -> Self {
        Self {
            descriptor_id: view.descriptor_id,
            thread_id: view.thread_id,
            begin: view.begin,
            end: view.end,
            block_type: view.block_type,
            name: view.name.map(|name| record.sub(BlockHeader::SIZE, name.len())),
        }
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end.since(self.begin)
    }

    /// Non-strict interval containment
    #[must_use]
    pub fn contains(&self, other: &BlockRecord) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }
}

/// One descriptor as loaded from a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRecord {
    pub id: DescriptorId,
    pub name: ArenaSlice,
    pub source_file: ArenaSlice,
    pub line: u32,
    pub color: u32,
    pub category_id: u32,
    pub is_enabled: bool,
    pub block_type: BlockType,
}

impl DescriptorRecord {
    pub(crate) fn from_view(view: &DescriptorView<'_>, record: ArenaSlice) -> Self {
        let name = record.sub(DescriptorHeader::SIZE, view.name.len());
        Self {
            id: view.id,
            name,
            source_file: record.sub(DescriptorHeader::SIZE + name.len + 1, view.source_file.len()),
            line: view.line,
            color: view.color,
            category_id: view.category_id,
            is_enabled: view.is_enabled,
            block_type: view.block_type,
        }
    }
}

/// Result of a successful load
///
/// Owns both arenas; every record view resolves against them.
#[derive(Debug)]
pub struct LoadedProfile {
    pub(crate) source: Option<PathBuf>,
    pub(crate) descriptor_data: SerializedData,
    pub(crate) block_data: SerializedData,
    pub(crate) descriptors: Vec<DescriptorRecord>,
    pub(crate) blocks: Vec<BlockRecord>,
    pub(crate) trees: ThreadTrees,
}

impl LoadedProfile {
    /// File the profile was read from, if any
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn descriptors(&self) -> &[DescriptorRecord] {
        &self.descriptors
    }

    #[must_use]
    pub fn descriptor(&self, id: DescriptorId) -> Option<&DescriptorRecord> {
        self.descriptors.get(id.index())
    }

    #[must_use]
    pub fn descriptor_name(&self, descriptor: &DescriptorRecord) -> &str {
        self.descriptor_data.str(descriptor.name)
    }

    #[must_use]
    pub fn descriptor_file(&self, descriptor: &DescriptorRecord) -> &str {
        self.descriptor_data.str(descriptor.source_file)
    }

    /// Blocks in stream order
    #[must_use]
    pub fn blocks(&self) -> &[BlockRecord] {
        &self.blocks
    }

    /// Display name: the instance override, else the descriptor name
    #[must_use]
    pub fn block_name(&self, block: &BlockRecord) -> &str {
        match block.name {
            Some(name) => self.block_data.str(name),
            None => self
                .descriptor(block.descriptor_id)
                .map_or("<unknown>", |d| self.descriptor_name(d)),
        }
    }

    #[must_use]
    pub fn trees(&self) -> &ThreadTrees {
        &self.trees
    }

    /// Root nodes for one thread, empty if the thread recorded nothing
    #[must_use]
    pub fn tree(&self, thread: ThreadId) -> &[BlockNode] {
        self.trees.get(&thread).map_or(&[], Vec::as_slice)
    }

    pub fn threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.trees.keys().copied()
    }

    /// Earliest begin and latest end over all blocks
    #[must_use]
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        let begin = self.blocks.iter().map(|b| b.begin).min()?;
        let end = self.blocks.iter().map(|b| b.end).max()?;
        Some((begin, end))
    }

    #[must_use]
    pub fn descriptor_data(&self) -> &SerializedData {
        &self.descriptor_data
    }

    #[must_use]
    pub fn block_data(&self) -> &SerializedData {
        &self.block_data
    }
}
