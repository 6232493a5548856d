//! # Block Descriptor Table
//!
//! Process-wide (per recorder) registry of static call-site metadata.
//!
//! Registration takes a mutex and happens once per call site. Lookups by id
//! never lock: descriptors live in geometrically growing segments of
//! write-once slots, so a published descriptor never moves and readers only
//! touch `OnceLock`s.
//!
//! ```text
//! segment 0: ids [0, 64)        64 slots
//! segment 1: ids [64, 192)     128 slots
//! segment 2: ids [192, 448)    256 slots
//! ...
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::codec::until_nul;
use crate::domain::{BlockType, DescriptorId};

/// Slots in the first segment; each following segment doubles
const FIRST_SEGMENT_LEN: u64 = 64;

/// Number of segments, enough for ~67M descriptors
const SEGMENT_COUNT: usize = 20;

/// Default display color (opaque light grey)
pub const DEFAULT_COLOR: u32 = 0xFFD3_D3D3;

/// Immutable metadata shared by every instance of a call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub id: DescriptorId,
    pub name: String,
    pub source_file: String,
    pub line: u32,

    /// Display color as `0xAARRGGBB`
    pub color: u32,
    pub category_id: u32,

    /// Blocks of a disabled descriptor are not recorded
    pub is_enabled: bool,
    pub block_type: BlockType,
}

/// Registration request for a call site
///
/// Built with `DescriptorSpec::new(name, file, line)` and optional setters.
#[derive(Debug, Clone)]
pub struct DescriptorSpec {
    name: Cow<'static, str>,
    source_file: Cow<'static, str>,
    line: u32,
    color: u32,
    category_id: u32,
    is_enabled: bool,
    block_type: BlockType,
}

impl DescriptorSpec {
    #[must_use]
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        source_file: impl Into<Cow<'static, str>>,
        line: u32,
    ) -> Self {
        Self {
            name: name.into(),
            source_file: source_file.into(),
            line,
            color: DEFAULT_COLOR,
            category_id: 0,
            is_enabled: true,
            block_type: BlockType::Block,
        }
    }

    #[must_use]
    pub fn color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn category(mut self, category_id: u32) -> Self {
        self.category_id = category_id;
        self
    }

    #[must_use]
    pub fn enabled(mut self, is_enabled: bool) -> Self {
        self.is_enabled = is_enabled;
        self
    }

    #[must_use]
    pub fn block_type(mut self, block_type: BlockType) -> Self {
        self.block_type = block_type;
        self
    }

    /// Shorthand for `block_type(BlockType::Event)`
    #[must_use]
    pub fn event(self) -> Self {
        self.block_type(BlockType::Event)
    }
}

type Segment = Box<[OnceLock<BlockDescriptor>]>;

#[derive(Default)]
struct Registration {
    by_site: HashMap<(String, String, u32), DescriptorId>,
}

/// Write-once descriptor registry with lock-free lookups
pub struct DescriptorTable {
    segments: [OnceLock<Segment>; SEGMENT_COUNT],
    /// Number of published descriptors; every id below it is readable
    published: AtomicU32,
    registration: Mutex<Registration>,
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            segments: std::array::from_fn(|_| OnceLock::new()),
            published: AtomicU32::new(0),
            registration: Mutex::new(Registration::default()),
        }
    }

    /// Register a call site, returning its id
    ///
    /// Registering the same (name, file, line) again returns the existing id
    /// and ignores the other fields of `spec`. Returns `None` only when the
    /// table is full.
    pub fn register(&self, spec: DescriptorSpec) -> Option<DescriptorId> {
        let mut reg = self.registration.lock().unwrap_or_else(PoisonError::into_inner);

        let key = (
            until_nul(&spec.name).to_owned(),
            until_nul(&spec.source_file).to_owned(),
            spec.line,
        );
        if let Some(&id) = reg.by_site.get(&key) {
            return Some(id);
        }

        let id = DescriptorId(self.published.load(Ordering::Relaxed));
        let (segment, offset) = locate(id)?;
        let slots = self.segments[segment].get_or_init(|| new_segment(segment));

        let (name, source_file, line) = key.clone();
        let descriptor = BlockDescriptor {
            id,
            name,
            source_file,
            line,
            color: spec.color,
            category_id: spec.category_id,
            is_enabled: spec.is_enabled,
            block_type: spec.block_type,
        };
        // Slot is fresh: ids are handed out under the registration lock
        let _ = slots[offset].set(descriptor);

        reg.by_site.insert(key, id);
        self.published.store(id.0 + 1, Ordering::Release);
        log::debug!("registered descriptor {id}");
        Some(id)
    }

    /// Look up a published descriptor without locking
    #[must_use]
    pub fn get(&self, id: DescriptorId) -> Option<&BlockDescriptor> {
        if id.0 >= self.published.load(Ordering::Acquire) {
            return None;
        }
        let (segment, offset) = locate(id)?;
        self.segments[segment].get()?.get(offset)?.get()
    }

    /// Whether blocks of `id` should be recorded
    ///
    /// Unknown ids are not: the loader would reject them as corrupt data.
    #[must_use]
    pub fn is_enabled(&self, id: DescriptorId) -> bool {
        self.get(id).is_some_and(|d| d.is_enabled)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.published.load(Ordering::Acquire) as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate published descriptors in id order
    pub fn iter(&self) -> impl Iterator<Item = &BlockDescriptor> + '_ {
        let published = self.published.load(Ordering::Acquire);
        (0..published).filter_map(move |id| self.get(DescriptorId(id)))
    }
}

/// Map an id to (segment, offset within segment)
fn locate(id: DescriptorId) -> Option<(usize, usize)> {
    let index = u64::from(id.0);
    let bucket = index / FIRST_SEGMENT_LEN + 1;
    let segment = (63 - bucket.leading_zeros()) as usize;
    if segment >= SEGMENT_COUNT {
        return None;
    }
    let segment_start = FIRST_SEGMENT_LEN * ((1u64 << segment) - 1);
    usize::try_from(index - segment_start).ok().map(|offset| (segment, offset))
}

fn new_segment(segment: usize) -> Segment {
    let len = (FIRST_SEGMENT_LEN as usize) << segment;
    (0..len).map(|_| OnceLock::new()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_locate_segment_boundaries() {
        assert_eq!(locate(DescriptorId(0)), Some((0, 0)));
        assert_eq!(locate(DescriptorId(63)), Some((0, 63)));
        assert_eq!(locate(DescriptorId(64)), Some((1, 0)));
        assert_eq!(locate(DescriptorId(191)), Some((1, 127)));
        assert_eq!(locate(DescriptorId(192)), Some((2, 0)));
    }

    #[test]
    fn test_register_assigns_dense_ids() {
        let table = DescriptorTable::new();
        let a = table.register(DescriptorSpec::new("a", "lib.rs", 1)).unwrap();
        let b = table.register(DescriptorSpec::new("b", "lib.rs", 2).event()).unwrap();

        assert_eq!(a, DescriptorId(0));
        assert_eq!(b, DescriptorId(1));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b).unwrap().block_type, BlockType::Event);
        assert!(table.get(DescriptorId(2)).is_none());
    }

    #[test]
    fn test_register_same_site_is_idempotent() {
        let table = DescriptorTable::new();
        let first = table.register(DescriptorSpec::new("work", "main.rs", 10)).unwrap();
        let again =
            table.register(DescriptorSpec::new("work", "main.rs", 10).color(0xFF00_0000)).unwrap();

        assert_eq!(first, again);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(first).unwrap().color, DEFAULT_COLOR);
    }

    #[test]
    fn test_lookups_across_segments() {
        let table = DescriptorTable::new();
        for line in 0..300 {
            table.register(DescriptorSpec::new("site", "many.rs", line)).unwrap();
        }
        assert_eq!(table.len(), 300);
        assert_eq!(table.get(DescriptorId(250)).unwrap().line, 250);
        assert_eq!(table.iter().count(), 300);
    }

    #[test]
    fn test_concurrent_registration_and_lookup() {
        let table = Arc::new(DescriptorTable::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for line in 0..100 {
                        let id = table.register(DescriptorSpec::new("site", "mt.rs", line)).unwrap();
                        assert_eq!(table.get(id).unwrap().line, line);
                    }
                    t
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.len(), 100);
    }

    #[test]
    fn test_disabled_descriptor() {
        let table = DescriptorTable::new();
        let id = table.register(DescriptorSpec::new("off", "x.rs", 1).enabled(false)).unwrap();
        assert!(!table.is_enabled(id));
        assert!(!table.is_enabled(DescriptorId(99)));
    }

    #[test]
    fn test_register_cuts_names_at_nul() {
        let table = DescriptorTable::new();
        let id = table.register(DescriptorSpec::new("a\0b", "main.rs\0x", 3)).unwrap();
        let descriptor = table.get(id).unwrap();
        assert_eq!(descriptor.name, "a");
        assert_eq!(descriptor.source_file, "main.rs");
        assert_eq!(table.register(DescriptorSpec::new("a", "main.rs", 3)), Some(id));
    }
}
