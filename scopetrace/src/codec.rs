//! # Block Codec
//!
//! Byte-exact encoding of finished blocks and descriptors, plus the
//! `[u16 LE length][payload]` record framing shared by the writer, the
//! loader and any live capture path.
//!
//! Decoding never copies: [`BlockView`] and [`DescriptorView`] borrow their
//! strings from the record bytes they were decoded from.

use std::io::{self, Read, Write};

use scopetrace_common::{
    BlockHeader, DescriptorHeader, MAX_RECORD_SIZE, NAME_TERMINATOR, RECORD_LEN_SIZE,
};

use crate::descriptor::BlockDescriptor;
use crate::domain::{BlockType, CodecError, DescriptorId, ThreadId, Timestamp};
use crate::recording::Block;

/// Longest override name that still fits a block record
pub const MAX_BLOCK_NAME_LEN: usize = MAX_RECORD_SIZE - BlockHeader::SIZE - 1;

// =============================================================================
// ENCODED BLOCK
// =============================================================================

/// Immutable serialized form of a finished block
///
/// Cloning duplicates the bytes. Moving transfers the buffer; [`take`]
/// moves the bytes out and leaves an empty (zero-length) instance behind.
///
/// [`take`]: EncodedBlock::take
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedBlock {
    data: Box<[u8]>,
}

impl EncodedBlock {
    /// Encode a block
    ///
    /// An unfinished block is encoded as if it ended at its begin time.
    #[must_use]
    pub fn encode(block: &Block) -> Self {
        let header = BlockHeader {
            descriptor_id: block.descriptor_id().0,
            thread_id: block.thread_id().0,
            begin_ns: block.begin().0,
            end_ns: block.end().unwrap_or(block.begin()).0,
            block_type: block.block_type().tag(),
        };

        let name = block.name().map(|n| truncate_utf8(until_nul(n), MAX_BLOCK_NAME_LEN));
        let name_len = name.map_or(0, |n| n.len() + 1);

        let mut data = Vec::with_capacity(BlockHeader::SIZE + name_len);
        data.extend_from_slice(&header.to_bytes());
        if let Some(name) = name {
            data.extend_from_slice(name.as_bytes());
            data.push(NAME_TERMINATOR);
        }
        Self { data: data.into_boxed_slice() }
    }

    /// Wrap raw record bytes received from elsewhere
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { data: bytes.into() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Move the bytes out, leaving `self` empty
    #[must_use]
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Decode a view over this block's bytes
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid block record
    pub fn decode(&self) -> Result<BlockView<'_>, CodecError> {
        decode_block(&self.data)
    }
}

// =============================================================================
// BLOCK DECODING
// =============================================================================

/// Borrowed view over one encoded block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockView<'a> {
    pub descriptor_id: DescriptorId,
    pub thread_id: ThreadId,
    pub begin: Timestamp,
    pub end: Timestamp,
    pub block_type: BlockType,

    /// Override name, borrowed from just past the header
    pub name: Option<&'a str>,
}

impl BlockView<'_> {
    /// Rebuild an owned, finished block
    #[must_use]
    pub fn to_block(&self) -> Block {
        let block = Block::from_parts(
            self.descriptor_id,
            self.thread_id,
            self.begin,
            Some(self.end),
            self.block_type,
        );
        match self.name {
            Some(name) => block.with_name(name),
            None => block,
        }
    }
}

/// Decode one block record (without its length prefix)
///
/// # Errors
/// Fails on a short header, unknown type tag, inverted interval, or a
/// malformed name.
pub fn decode_block(bytes: &[u8]) -> Result<BlockView<'_>, CodecError> {
    let header = BlockHeader::read(bytes)
        .ok_or(CodecError::TooShort { len: bytes.len(), needed: BlockHeader::SIZE })?;
    let block_type =
        BlockType::from_tag(header.block_type).ok_or(CodecError::UnknownBlockType(header.block_type))?;
    if header.end_ns < header.begin_ns {
        return Err(CodecError::InvertedInterval { begin: header.begin_ns, end: header.end_ns });
    }

    let tail = &bytes[BlockHeader::SIZE..];
    let name = if tail.is_empty() {
        None
    } else {
        let (name, _) = split_terminated(tail)?;
        Some(name)
    };

    Ok(BlockView {
        descriptor_id: DescriptorId(header.descriptor_id),
        thread_id: ThreadId(header.thread_id),
        begin: Timestamp(header.begin_ns),
        end: Timestamp(header.end_ns),
        block_type,
        name,
    })
}

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// Borrowed view over one encoded descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorView<'a> {
    pub id: DescriptorId,
    pub line: u32,
    pub color: u32,
    pub category_id: u32,
    pub is_enabled: bool,
    pub block_type: BlockType,
    pub name: &'a str,
    pub source_file: &'a str,
}

/// Encode a descriptor as `header name\0 file\0`
///
/// Strings that would overflow the record limit are truncated, name first.
#[must_use]
pub fn encode_descriptor(descriptor: &BlockDescriptor) -> Vec<u8> {
    let header = DescriptorHeader {
        id: descriptor.id.0,
        line: descriptor.line,
        color: descriptor.color,
        category_id: descriptor.category_id,
        enabled: u8::from(descriptor.is_enabled),
        block_type: descriptor.block_type.tag(),
    };

    let budget = MAX_RECORD_SIZE - DescriptorHeader::SIZE - 2;
    let name = truncate_utf8(until_nul(&descriptor.name), budget);
    let file = truncate_utf8(until_nul(&descriptor.source_file), budget - name.len());

    let mut data = Vec::with_capacity(DescriptorHeader::SIZE + name.len() + file.len() + 2);
    data.extend_from_slice(&header.to_bytes());
    data.extend_from_slice(name.as_bytes());
    data.push(NAME_TERMINATOR);
    data.extend_from_slice(file.as_bytes());
    data.push(NAME_TERMINATOR);
    data
}

/// Decode one descriptor record (without its length prefix)
///
/// # Errors
/// Fails on a short header, unknown type tag or malformed strings.
pub fn decode_descriptor(bytes: &[u8]) -> Result<DescriptorView<'_>, CodecError> {
    let header = DescriptorHeader::read(bytes)
        .ok_or(CodecError::TooShort { len: bytes.len(), needed: DescriptorHeader::SIZE })?;
    let block_type =
        BlockType::from_tag(header.block_type).ok_or(CodecError::UnknownBlockType(header.block_type))?;

    let (name, rest) = split_terminated(&bytes[DescriptorHeader::SIZE..])?;
    let (source_file, _) = split_terminated(rest)?;

    Ok(DescriptorView {
        id: DescriptorId(header.id),
        line: header.line,
        color: header.color,
        category_id: header.category_id,
        is_enabled: header.enabled != 0,
        block_type,
        name,
        source_file,
    })
}

// =============================================================================
// FRAMING
// =============================================================================

/// Write one `[u16 LE length][payload]` record
///
/// # Errors
/// Returns `InvalidInput` for payloads longer than the length prefix allows,
/// otherwise any error from the writer.
pub fn write_record<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u16::try_from(payload.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("record of {} bytes", payload.len()))
    })?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)
}

/// Read a record length prefix
///
/// Returns `Ok(None)` on a clean end of stream (no bytes at all) and
/// `UnexpectedEof` if the stream ends inside the prefix.
///
/// # Errors
/// Any I/O error from the reader.
pub fn read_record_len<R: Read>(reader: &mut R) -> io::Result<Option<u16>> {
    let mut prefix = [0u8; RECORD_LEN_SIZE];
    let first = loop {
        match reader.read(&mut prefix[..1]) {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    };
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut prefix[1..])?;
    Ok(Some(u16::from_le_bytes(prefix)))
}

// =============================================================================
// HELPERS
// =============================================================================

/// Split a NUL-terminated UTF-8 string off the front of `bytes`
fn split_terminated(bytes: &[u8]) -> Result<(&str, &[u8]), CodecError> {
    let end =
        bytes.iter().position(|&b| b == NAME_TERMINATOR).ok_or(CodecError::MissingTerminator)?;
    let s = std::str::from_utf8(&bytes[..end]).map_err(|_| CodecError::InvalidUtf8)?;
    Ok((s, &bytes[end + 1..]))
}

/// Prefix of `s` before its first NUL, which would end the string on the wire
pub(crate) fn until_nul(s: &str) -> &str {
    s.find('\0').map_or(s, |end| &s[..end])
}

/// Longest prefix of `s` that fits `max` bytes without splitting a character
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(name: Option<&str>) -> Block {
        let block = Block::from_parts(
            DescriptorId(7),
            ThreadId(4242),
            Timestamp(1_000),
            Some(Timestamp(5_000)),
            BlockType::Block,
        );
        match name {
            Some(n) => block.with_name(n),
            None => block,
        }
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let block = finished(Some("parse_header"));
        let encoded = EncodedBlock::encode(&block);
        let view = encoded.decode().unwrap();

        assert_eq!(view.descriptor_id, DescriptorId(7));
        assert_eq!(view.thread_id, ThreadId(4242));
        assert_eq!(view.begin, Timestamp(1_000));
        assert_eq!(view.end, Timestamp(5_000));
        assert_eq!(view.name, Some("parse_header"));
        assert_eq!(view.to_block(), block);
    }

    #[test]
    fn test_encoded_length() {
        assert_eq!(EncodedBlock::encode(&finished(None)).len(), BlockHeader::SIZE);
        assert_eq!(EncodedBlock::encode(&finished(Some("abc"))).len(), BlockHeader::SIZE + 4);
    }

    #[test]
    fn test_unfinished_block_encodes_zero_duration() {
        let block =
            Block::from_parts(DescriptorId(0), ThreadId(1), Timestamp(9), None, BlockType::Event);
        let encoded = EncodedBlock::encode(&block);
        let view = encoded.decode().unwrap();
        assert_eq!(view.begin, view.end);
        assert_eq!(view.block_type, BlockType::Event);
    }

    #[test]
    fn test_take_leaves_source_empty() {
        let mut encoded = EncodedBlock::encode(&finished(Some("x")));
        let copy = encoded.clone();
        let moved = encoded.take();

        assert!(encoded.is_empty());
        assert_eq!(moved, copy);
        assert!(encoded.decode().is_err());
    }

    #[test]
    fn test_long_names_are_truncated_on_char_boundary() {
        let long = "é".repeat(MAX_RECORD_SIZE);
        let encoded = EncodedBlock::encode(&finished(Some(&long)));
        assert!(encoded.len() <= MAX_RECORD_SIZE);
        let name = encoded.decode().unwrap().name.unwrap();
        assert!(long.starts_with(name));
    }

    #[test]
    fn test_names_with_nul_round_trip_cut() {
        let block = finished(Some("a\0b"));
        assert_eq!(block.name(), Some("a"));
        let encoded = EncodedBlock::encode(&block);
        assert_eq!(encoded.decode().unwrap().to_block(), block);

        let descriptor = BlockDescriptor {
            id: DescriptorId(0),
            name: "a\0b".to_string(),
            source_file: "main.rs".to_string(),
            line: 1,
            color: 0,
            category_id: 0,
            is_enabled: true,
            block_type: BlockType::Block,
        };
        let bytes = encode_descriptor(&descriptor);
        let view = decode_descriptor(&bytes).unwrap();
        assert_eq!(view.name, "a");
        assert_eq!(view.source_file, "main.rs");
    }

    #[test]
    fn test_decode_rejects_malformed_records() {
        assert_eq!(
            decode_block(&[0u8; 4]),
            Err(CodecError::TooShort { len: 4, needed: BlockHeader::SIZE })
        );

        let mut bytes = EncodedBlock::encode(&finished(Some("abc"))).as_bytes().to_vec();
        bytes.pop();
        assert_eq!(decode_block(&bytes), Err(CodecError::MissingTerminator));

        let mut bytes = EncodedBlock::encode(&finished(None)).as_bytes().to_vec();
        bytes[24] = 77;
        assert_eq!(decode_block(&bytes), Err(CodecError::UnknownBlockType(77)));

        let inverted = BlockHeader {
            descriptor_id: 0,
            thread_id: 0,
            begin_ns: 10,
            end_ns: 5,
            block_type: 0,
        };
        assert_eq!(
            decode_block(&inverted.to_bytes()),
            Err(CodecError::InvertedInterval { begin: 10, end: 5 })
        );
    }

    #[test]
    fn test_descriptor_round_trip() {
        let descriptor = BlockDescriptor {
            id: DescriptorId(3),
            name: "load_assets".to_string(),
            source_file: "src/assets.rs".to_string(),
            line: 88,
            color: 0xFF11_2233,
            category_id: 2,
            is_enabled: false,
            block_type: BlockType::Event,
        };
        let bytes = encode_descriptor(&descriptor);
        let view = decode_descriptor(&bytes).unwrap();

        assert_eq!(view.id, descriptor.id);
        assert_eq!(view.name, "load_assets");
        assert_eq!(view.source_file, "src/assets.rs");
        assert_eq!(view.line, 88);
        assert_eq!(view.color, 0xFF11_2233);
        assert_eq!(view.category_id, 2);
        assert!(!view.is_enabled);
        assert_eq!(view.block_type, BlockType::Event);
    }

    #[test]
    fn test_framing_distinguishes_clean_eof_from_truncation() {
        let mut stream = Vec::new();
        write_record(&mut stream, b"hello").unwrap();
        assert_eq!(&stream[..2], &[5, 0]);

        let mut cursor = io::Cursor::new(&stream);
        assert_eq!(read_record_len(&mut cursor).unwrap(), Some(5));
        let mut payload = [0u8; 5];
        cursor.read_exact(&mut payload).unwrap();
        assert_eq!(read_record_len(&mut cursor).unwrap(), None);

        let mut half = io::Cursor::new(vec![5u8]);
        let err = read_record_len(&mut half).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_oversized_record_is_rejected() {
        let mut sink = Vec::new();
        let err = write_record(&mut sink, &vec![0u8; MAX_RECORD_SIZE + 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(sink.is_empty());
    }
}
