//! # Shared Wire Format (Recorder ↔ Loader)
//!
//! Defines the byte layout of a scopetrace profile stream. Everything here is
//! `no_std` so that any producer of the stream (an instrumented process, a live
//! capture forwarder) can share the exact same framing as the loader.
//!
//! ## Stream Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Preamble: magic "SCPT" | version u16 | n u32 │  10 bytes
//! ├──────────────────────────────────────────────┤
//! │ n × [len u16][DescriptorHeader name\0 file\0]│  descriptor section
//! ├──────────────────────────────────────────────┤
//! │ * × [len u16][BlockHeader (name\0)?]         │  block section, until EOF
//! └──────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Headers are encoded field by field rather
//! than by reinterpreting a `#[repr(C)]` struct, so the layout does not depend
//! on the host's padding or endianness.
//!
//! ## Key Types
//!
//! - [`BlockHeader`] - Fixed 25-byte prefix of every block record
//! - [`DescriptorHeader`] - Fixed 18-byte prefix of every descriptor record
//! - [`Preamble`] - Stream header announcing the descriptor count

#![no_std]

// ============================================================================
// Stream Constants
// ============================================================================

/// Magic bytes at the start of every profile stream
pub const STREAM_MAGIC: [u8; 4] = *b"SCPT";

/// Current format version
///
/// Bumped whenever a header layout changes. The loader rejects other versions.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the length prefix in front of each record
pub const RECORD_LEN_SIZE: usize = 2;

/// Largest record payload expressible by the `u16` length prefix
pub const MAX_RECORD_SIZE: usize = u16::MAX as usize;

/// Terminator appended after every string in a record
pub const NAME_TERMINATOR: u8 = 0;

// ============================================================================
// Block Type Tags
// ============================================================================

/// **Scoped block**: has an open phase between begin and end
pub const BLOCK_TYPE_BLOCK: u8 = 0;

/// **Instant event**: no duration, recorded at begin
pub const BLOCK_TYPE_EVENT: u8 = 1;

// ============================================================================
// Preamble
// ============================================================================

/// Stream preamble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    /// Format version the stream was written with
    pub version: u16,

    /// Number of descriptor records that follow before the block section
    pub descriptor_count: u32,
}

impl Preamble {
    /// Encoded size in bytes
    pub const SIZE: usize = 10;

    #[must_use]
    pub fn new(descriptor_count: u32) -> Self {
        Self { version: FORMAT_VERSION, descriptor_count }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&STREAM_MAGIC);
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6..10].copy_from_slice(&self.descriptor_count.to_le_bytes());
        out
    }

    /// Parse a preamble, returning `None` if the magic does not match
    #[must_use]
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Option<Self> {
        if bytes[0..4] != STREAM_MAGIC {
            return None;
        }
        Some(Self {
            version: u16::from_le_bytes([bytes[4], bytes[5]]),
            descriptor_count: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        })
    }
}

// ============================================================================
// Block Header
// ============================================================================

/// Fixed-size prefix of an encoded block
///
/// **Layout**: `descriptor_id u32 | thread_id u32 | begin_ns u64 | end_ns u64 | block_type u8`
///
/// A record longer than [`BlockHeader::SIZE`] carries a NUL-terminated name
/// overriding the descriptor's default name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Descriptor this block is an instance of
    pub descriptor_id: u32,

    /// Opaque id of the thread that recorded the block
    pub thread_id: u32,

    /// Monotonic begin timestamp (nanoseconds)
    pub begin_ns: u64,

    /// Monotonic end timestamp (nanoseconds)
    ///
    /// Equal to `begin_ns` for events.
    pub end_ns: u64,

    /// [`BLOCK_TYPE_BLOCK`] or [`BLOCK_TYPE_EVENT`]
    pub block_type: u8,
}

impl BlockHeader {
    /// Encoded size in bytes
    pub const SIZE: usize = 25;

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.descriptor_id.to_le_bytes());
        out[4..8].copy_from_slice(&self.thread_id.to_le_bytes());
        out[8..16].copy_from_slice(&self.begin_ns.to_le_bytes());
        out[16..24].copy_from_slice(&self.end_ns.to_le_bytes());
        out[24] = self.block_type;
        out
    }

    /// Parse the header from the front of `bytes`
    ///
    /// Returns `None` if fewer than [`BlockHeader::SIZE`] bytes are available.
    #[must_use]
    pub fn read(bytes: &[u8]) -> Option<Self> {
        let h = bytes.get(..Self::SIZE)?;
        Some(Self {
            descriptor_id: read_u32(h, 0),
            thread_id: read_u32(h, 4),
            begin_ns: read_u64(h, 8),
            end_ns: read_u64(h, 16),
            block_type: h[24],
        })
    }
}

// ============================================================================
// Descriptor Header
// ============================================================================

/// Fixed-size prefix of an encoded descriptor
///
/// **Layout**: `id u32 | line u32 | color u32 | category_id u32 | enabled u8 | block_type u8`
///
/// Followed by `name\0file\0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHeader {
    pub id: u32,
    pub line: u32,

    /// Display color as `0xAARRGGBB`
    pub color: u32,
    pub category_id: u32,

    /// 1 if enabled, 0 if disabled
    pub enabled: u8,
    pub block_type: u8,
}

impl DescriptorHeader {
    /// Encoded size in bytes
    pub const SIZE: usize = 18;

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.id.to_le_bytes());
        out[4..8].copy_from_slice(&self.line.to_le_bytes());
        out[8..12].copy_from_slice(&self.color.to_le_bytes());
        out[12..16].copy_from_slice(&self.category_id.to_le_bytes());
        out[16] = self.enabled;
        out[17] = self.block_type;
        out
    }

    #[must_use]
    pub fn read(bytes: &[u8]) -> Option<Self> {
        let h = bytes.get(..Self::SIZE)?;
        Some(Self {
            id: read_u32(h, 0),
            line: read_u32(h, 4),
            color: read_u32(h, 8),
            category_id: read_u32(h, 12),
            enabled: h[16],
            block_type: h[17],
        })
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}
