//! Stream decoding
//!
//! Reads a whole profile stream into arenas, checking the interrupt flag at
//! every record boundary and publishing progress as bytes are consumed.

use std::io::{self, Read};

use scopetrace_common::{Preamble, FORMAT_VERSION, RECORD_LEN_SIZE};

use super::arena::SerializedData;
use super::profile::{BlockRecord, DescriptorRecord, LoadedProfile};
use super::status::LoadStatus;
use crate::codec::{decode_block, decode_descriptor, read_record_len};
use crate::domain::LoadError;
use crate::tree::{build_thread_tree, group_by_thread, ThreadTrees};

/// Cap on up-front descriptor allocation; the preamble count is untrusted
const MAX_PREALLOCATED_DESCRIPTORS: usize = 1 << 16;

/// Reader that counts consumed bytes
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Map a short read to `Truncated`, anything else to `Io`
fn short_read(err: io::Error, offset: u64, expected: usize) -> LoadError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        LoadError::Truncated { offset, expected }
    } else {
        LoadError::Io(err)
    }
}

/// Decode a complete stream
///
/// # Errors
/// `Cancelled` if the interrupt flag was raised, otherwise the first
/// integrity or I/O failure
pub(crate) fn decode_stream<R: Read>(reader: R, status: &LoadStatus) -> Result<LoadedProfile, LoadError> {
    let mut input = CountingReader::new(reader);

    let mut preamble = [0u8; Preamble::SIZE];
    input.read_exact(&mut preamble).map_err(|e| short_read(e, 0, Preamble::SIZE))?;
    let preamble = Preamble::from_bytes(&preamble).ok_or(LoadError::BadMagic)?;
    if preamble.version != FORMAT_VERSION {
        return Err(LoadError::UnsupportedVersion(preamble.version));
    }
    status.set_progress(input.count);

    let declared = preamble.descriptor_count as usize;
    let mut descriptor_data = SerializedData::new();
    let mut descriptors = Vec::with_capacity(declared.min(MAX_PREALLOCATED_DESCRIPTORS));

    for index in 0..declared {
        status.check_interrupt()?;
        let offset = input.count;
        let len = read_record_len(&mut input)
            .map_err(|e| short_read(e, offset, RECORD_LEN_SIZE))?
            .ok_or(LoadError::Truncated { offset, expected: RECORD_LEN_SIZE })?;
        let record = descriptor_data
            .append_from(&mut input, usize::from(len))
            .map_err(|e| short_read(e, offset, usize::from(len)))?;

        let view = decode_descriptor(descriptor_data.bytes(record))
            .map_err(|source| LoadError::Decode { index, offset, source })?;
        if view.id.index() != index {
            return Err(LoadError::DescriptorOutOfOrder {
                index,
                expected: u32::try_from(index).unwrap_or(u32::MAX),
                found: view.id.0,
            });
        }
        descriptors.push(DescriptorRecord::from_view(&view, record));
        status.set_progress(input.count);
    }

    let mut block_data = SerializedData::new();
    let mut blocks = Vec::new();

    loop {
        status.check_interrupt()?;
        let offset = input.count;
        let Some(len) =
            read_record_len(&mut input).map_err(|e| short_read(e, offset, RECORD_LEN_SIZE))?
        else {
            break;
        };
        let record = block_data
            .append_from(&mut input, usize::from(len))
            .map_err(|e| short_read(e, offset, usize::from(len)))?;

        let index = blocks.len();
        let view = decode_block(block_data.bytes(record))
            .map_err(|source| LoadError::Decode { index, offset, source })?;
        if view.descriptor_id.index() >= descriptors.len() {
            return Err(LoadError::UnknownDescriptor { index, id: view.descriptor_id });
        }
        blocks.push(BlockRecord::from_view(&view, record));
        status.set_progress(input.count);
    }

    let trees = build_trees_interruptible(&blocks, status)?;
    log::debug!(
        "decoded {} descriptors, {} blocks on {} threads ({} bytes)",
        descriptors.len(),
        blocks.len(),
        trees.len(),
        input.count
    );

    Ok(LoadedProfile { source: None, descriptor_data, block_data, descriptors, blocks, trees })
}

/// Rebuild trees, checking the interrupt flag before each thread
fn build_trees_interruptible(
    blocks: &[BlockRecord],
    status: &LoadStatus,
) -> Result<ThreadTrees, LoadError> {
    let mut trees = ThreadTrees::new();
    for (thread, thread_blocks) in group_by_thread(blocks) {
        status.check_interrupt()?;
        trees.insert(thread, build_thread_tree(thread, thread_blocks)?);
    }
    Ok(trees)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_descriptor, write_record, EncodedBlock};
    use crate::descriptor::BlockDescriptor;
    use crate::domain::{BlockType, CodecError, DescriptorId, ThreadId, Timestamp};
    use crate::recording::Block;
    use crate::writer::write_profile;
    use std::io::Cursor;

    fn descriptor(id: u32, name: &str) -> BlockDescriptor {
        BlockDescriptor {
            id: DescriptorId(id),
            name: name.to_string(),
            source_file: "src/work.rs".to_string(),
            line: 10 + id,
            color: 0xFF00_FF00,
            category_id: 0,
            is_enabled: true,
            block_type: BlockType::Block,
        }
    }

    fn block(id: u32, tid: u32, begin: u64, end: u64) -> EncodedBlock {
        EncodedBlock::encode(&Block::from_parts(
            DescriptorId(id),
            ThreadId(tid),
            Timestamp(begin),
            Some(Timestamp(end)),
            BlockType::Block,
        ))
    }

    fn sample_stream() -> Vec<u8> {
        let descriptors = vec![descriptor(0, "outer"), descriptor(1, "inner")];
        let named = EncodedBlock::encode(
            &Block::from_parts(DescriptorId(1), ThreadId(7), Timestamp(20), Some(Timestamp(30)), BlockType::Block)
                .with_name("inner#2"),
        );
        let blocks = vec![block(1, 7, 12, 18), named, block(0, 7, 10, 40)];
        let mut out = Vec::new();
        write_profile(&mut out, &descriptors, &blocks).unwrap();
        out
    }

    #[test]
    fn test_decodes_names_through_arenas() {
        let status = LoadStatus::new();
        let profile = decode_stream(Cursor::new(sample_stream()), &status).unwrap();

        assert_eq!(profile.descriptors().len(), 2);
        let inner = profile.descriptor(DescriptorId(1)).unwrap();
        assert_eq!(profile.descriptor_name(inner), "inner");
        assert_eq!(profile.descriptor_file(inner), "src/work.rs");
        assert_eq!(inner.line, 11);

        let names: Vec<_> = profile.blocks().iter().map(|b| profile.block_name(b)).collect();
        assert_eq!(names, vec!["inner", "inner#2", "outer"]);

        let roots = profile.tree(ThreadId(7));
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].children.len(), 2);
    }

    #[test]
    fn test_progress_reaches_stream_length() {
        let stream = sample_stream();
        let status = LoadStatus::new();
        status.begin(Some(stream.len() as u64));
        decode_stream(Cursor::new(stream.clone()), &status).unwrap();
        assert_eq!(status.progress(), stream.len() as u64);
    }

    #[test]
    fn test_bad_magic() {
        let mut stream = sample_stream();
        stream[0] = b'X';
        let err = decode_stream(Cursor::new(stream), &LoadStatus::new()).unwrap_err();
        assert!(matches!(err, LoadError::BadMagic));
    }

    #[test]
    fn test_unsupported_version() {
        let mut stream = sample_stream();
        stream[4] = 9;
        let err = decode_stream(Cursor::new(stream), &LoadStatus::new()).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedVersion(9)));
    }

    #[test]
    fn test_truncated_record_is_reported() {
        let mut stream = sample_stream();
        stream.truncate(stream.len() - 3);
        let err = decode_stream(Cursor::new(stream), &LoadStatus::new()).unwrap_err();
        assert!(matches!(err, LoadError::Truncated { .. }));
        assert!(err.is_corrupt_data());
    }

    #[test]
    fn test_missing_descriptor_section_is_truncated() {
        let stream = Preamble::new(3).to_bytes().to_vec();
        let err = decode_stream(Cursor::new(stream), &LoadStatus::new()).unwrap_err();
        assert!(matches!(err, LoadError::Truncated { offset: 10, .. }));
    }

    #[test]
    fn test_empty_stream_is_truncated() {
        let err = decode_stream(Cursor::new(Vec::new()), &LoadStatus::new()).unwrap_err();
        assert!(matches!(err, LoadError::Truncated { offset: 0, .. }));
    }

    #[test]
    fn test_block_with_unknown_descriptor() {
        let mut out = Vec::new();
        write_profile(&mut out, &vec![descriptor(0, "only")], &[block(5, 1, 0, 1)]).unwrap();
        let err = decode_stream(Cursor::new(out), &LoadStatus::new()).unwrap_err();
        assert!(matches!(err, LoadError::UnknownDescriptor { index: 0, .. }));
    }

    #[test]
    fn test_descriptor_ids_must_be_dense() {
        let mut out = Preamble::new(1).to_bytes().to_vec();
        write_record(&mut out, &encode_descriptor(&descriptor(4, "gap"))).unwrap();
        let err = decode_stream(Cursor::new(out), &LoadStatus::new()).unwrap_err();
        assert!(matches!(err, LoadError::DescriptorOutOfOrder { found: 4, .. }));
    }

    #[test]
    fn test_undecodable_block_reports_index() {
        let mut out = Vec::new();
        write_profile(&mut out, &vec![descriptor(0, "a")], &[block(0, 1, 0, 1)]).unwrap();
        write_record(&mut out, &[1, 2, 3]).unwrap();
        let err = decode_stream(Cursor::new(out), &LoadStatus::new()).unwrap_err();
        match err {
            LoadError::Decode { index, source, .. } => {
                assert_eq!(index, 1);
                assert!(matches!(source, CodecError::TooShort { len: 3, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_overlapping_blocks_fail_tree_build() {
        let mut out = Vec::new();
        let blocks = vec![block(0, 1, 0, 10), block(0, 1, 5, 15)];
        write_profile(&mut out, &vec![descriptor(0, "a")], &blocks).unwrap();
        let err = decode_stream(Cursor::new(out), &LoadStatus::new()).unwrap_err();
        assert!(matches!(err, LoadError::Tree(_)));
    }

    #[test]
    fn test_interrupt_before_start_cancels() {
        let status = LoadStatus::new();
        status.interrupt();
        let err = decode_stream(Cursor::new(sample_stream()), &status).unwrap_err();
        assert!(matches!(err, LoadError::Cancelled));
    }

    #[test]
    fn test_tree_rebuild_honours_interrupt() {
        let profile = decode_stream(Cursor::new(sample_stream()), &LoadStatus::new()).unwrap();

        let status = LoadStatus::new();
        let trees = build_trees_interruptible(profile.blocks(), &status).unwrap();
        assert_eq!(&trees, profile.trees());

        status.interrupt();
        let err = build_trees_interruptible(profile.blocks(), &status).unwrap_err();
        assert!(matches!(err, LoadError::Cancelled));
    }
}
