//! Contiguous byte arenas for loaded records
//!
//! Every record read from a stream is appended to one growing buffer; parsed
//! records keep `(offset, len)` views into it instead of owning copies.

use std::io::{self, Read};

/// Offset/length view into a [`SerializedData`] buffer
///
/// Views are plain indices, so they stay valid while the arena grows and can
/// be copied freely. They are only meaningful for the arena that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaSlice {
    pub offset: usize,
    pub len: usize,
}

impl ArenaSlice {
    #[must_use]
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Sub-view starting `skip` bytes in, `len` bytes long
    #[must_use]
    pub fn sub(self, skip: usize, len: usize) -> Self {
        Self { offset: self.offset + skip, len }
    }

    #[must_use]
    pub fn end(self) -> usize {
        self.offset + self.len
    }
}

/// Growable byte buffer owning raw record bytes
///
/// Not `Clone`: a loaded profile hands its arenas over by move.
#[derive(Debug, Default)]
pub struct SerializedData {
    bytes: Vec<u8>,
}

impl SerializedData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read exactly `len` bytes from `reader` onto the end of the arena
    ///
    /// On failure the arena is left as it was.
    ///
    /// # Errors
    /// `UnexpectedEof` if the reader runs dry, or any other read error
    pub fn append_from<R: Read>(&mut self, reader: &mut R, len: usize) -> io::Result<ArenaSlice> {
        let start = self.bytes.len();
        self.bytes.resize(start + len, 0);
        if let Err(e) = reader.read_exact(&mut self.bytes[start..]) {
            self.bytes.truncate(start);
            return Err(e);
        }
        Ok(ArenaSlice::new(start, len))
    }

    /// Copy `data` onto the end of the arena
    pub fn push(&mut self, data: &[u8]) -> ArenaSlice {
        let start = self.bytes.len();
        self.bytes.extend_from_slice(data);
        ArenaSlice::new(start, data.len())
    }

    /// Bytes behind a view, empty if the view is out of range
    #[must_use]
    pub fn bytes(&self, slice: ArenaSlice) -> &[u8] {
        self.bytes.get(slice.offset..slice.end()).unwrap_or(&[])
    }

    /// String behind a view, empty if out of range or not UTF-8
    #[must_use]
    pub fn str(&self, slice: ArenaSlice) -> &str {
        std::str::from_utf8(self.bytes(slice)).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_views_survive_growth() {
        let mut arena = SerializedData::new();
        let first = arena.push(b"alpha");
        for _ in 0..1000 {
            arena.push(b"filler");
        }
        assert_eq!(arena.str(first), "alpha");
        assert_eq!(arena.str(first.sub(1, 3)), "lph");
    }

    #[test]
    fn test_failed_append_leaves_arena_unchanged() {
        let mut arena = SerializedData::new();
        arena.push(b"ok");
        let err = arena.append_from(&mut Cursor::new(b"abc".to_vec()), 10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_out_of_range_view_is_empty() {
        let arena = SerializedData::new();
        assert!(arena.bytes(ArenaSlice::new(5, 5)).is_empty());
        assert_eq!(arena.str(ArenaSlice::new(0, 1)), "");
    }
}
