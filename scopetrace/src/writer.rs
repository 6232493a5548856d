//! # Persistence Writer
//!
//! Writes a complete profile stream: preamble, descriptor section, then one
//! framed record per encoded block in emission order.
//!
//! Writing is purely sequential and never retried. Losing profile data is not
//! fatal to the host, so callers on the teardown path log the error and move on.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use scopetrace_common::{Preamble, RECORD_LEN_SIZE};

use crate::codec::{encode_descriptor, write_record, EncodedBlock};
use crate::descriptor::BlockDescriptor;
use crate::domain::WriteError;

/// What a completed write produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub descriptors: usize,
    pub blocks: usize,
    pub bytes: u64,
}

/// Sequential writer for one profile stream
pub struct ProfileWriter<W: Write> {
    out: W,
    summary: WriteSummary,
}

impl<W: Write> ProfileWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, summary: WriteSummary::default() }
    }

    /// Write the stream preamble announcing `descriptor_count` descriptors
    ///
    /// # Errors
    /// Fails if the count does not fit the preamble or the write fails
    pub fn write_preamble(&mut self, descriptor_count: usize) -> Result<(), WriteError> {
        let count = u32::try_from(descriptor_count)
            .map_err(|_| WriteError::TooManyDescriptors(descriptor_count))?;
        let bytes = Preamble::new(count).to_bytes();
        self.out.write_all(&bytes)?;
        self.summary.bytes += bytes.len() as u64;
        Ok(())
    }

    /// # Errors
    /// Returns any error from the underlying writer
    pub fn write_descriptor(&mut self, descriptor: &BlockDescriptor) -> Result<(), WriteError> {
        let record = encode_descriptor(descriptor);
        write_record(&mut self.out, &record)?;
        self.summary.descriptors += 1;
        self.summary.bytes += (RECORD_LEN_SIZE + record.len()) as u64;
        Ok(())
    }

    /// # Errors
    /// Returns any error from the underlying writer
    pub fn write_block(&mut self, block: &EncodedBlock) -> Result<(), WriteError> {
        write_record(&mut self.out, block.as_bytes())?;
        self.summary.blocks += 1;
        self.summary.bytes += (RECORD_LEN_SIZE + block.len()) as u64;
        Ok(())
    }

    /// Flush and return what was written
    ///
    /// # Errors
    /// Returns any error from flushing the underlying writer
    pub fn finish(mut self) -> Result<WriteSummary, WriteError> {
        self.out.flush()?;
        Ok(self.summary)
    }
}

/// Write a full profile to `out`
///
/// # Errors
/// Returns the first write error; nothing is retried
pub fn write_profile<'a, W, I>(
    out: W,
    descriptors: I,
    blocks: &[EncodedBlock],
) -> Result<WriteSummary, WriteError>
where
    W: Write,
    I: IntoIterator<Item = &'a BlockDescriptor>,
    I::IntoIter: ExactSizeIterator,
{
    let descriptors = descriptors.into_iter();
    let mut writer = ProfileWriter::new(out);
    writer.write_preamble(descriptors.len())?;
    for descriptor in descriptors {
        writer.write_descriptor(descriptor)?;
    }
    for block in blocks {
        writer.write_block(block)?;
    }
    writer.finish()
}

/// Create (or truncate) `path` and write a full profile to it
///
/// # Errors
/// Returns `WriteError::Create` if the file cannot be created, otherwise the
/// first write error
pub fn write_profile_file<'a, I>(
    path: impl AsRef<Path>,
    descriptors: I,
    blocks: &[EncodedBlock],
) -> Result<WriteSummary, WriteError>
where
    I: IntoIterator<Item = &'a BlockDescriptor>,
    I::IntoIter: ExactSizeIterator,
{
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|source| WriteError::Create { path: path.display().to_string(), source })?;
    let summary = write_profile(BufWriter::new(file), descriptors, blocks)?;
    log::info!(
        "wrote profile {} ({} descriptors, {} blocks, {} bytes)",
        path.display(),
        summary.descriptors,
        summary.blocks,
        summary.bytes
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockType, DescriptorId, ThreadId, Timestamp};
    use crate::recording::Block;

    fn descriptor(id: u32, name: &str) -> BlockDescriptor {
        BlockDescriptor {
            id: DescriptorId(id),
            name: name.to_string(),
            source_file: "w.rs".to_string(),
            line: id,
            color: 0,
            category_id: 0,
            is_enabled: true,
            block_type: BlockType::Block,
        }
    }

    #[test]
    fn test_stream_layout() {
        let descriptors = vec![descriptor(0, "a")];
        let block = Block::from_parts(
            DescriptorId(0),
            ThreadId(1),
            Timestamp(1),
            Some(Timestamp(2)),
            BlockType::Block,
        );
        let blocks = vec![EncodedBlock::encode(&block)];

        let mut out = Vec::new();
        let summary = write_profile(&mut out, &descriptors, &blocks).unwrap();

        assert_eq!(summary.descriptors, 1);
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.bytes, out.len() as u64);
        assert_eq!(&out[..4], b"SCPT");

        // Last record: length prefix then the block bytes verbatim
        let tail = &out[out.len() - blocks[0].len() - 2..];
        assert_eq!(u16::from_le_bytes([tail[0], tail[1]]) as usize, blocks[0].len());
        assert_eq!(&tail[2..], blocks[0].as_bytes());
    }

    #[test]
    fn test_unwritable_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.prof");
        let err = write_profile_file(&path, &Vec::<BlockDescriptor>::new(), &[]).unwrap_err();
        assert!(matches!(err, WriteError::Create { .. }));
    }

    #[test]
    fn test_failing_sink_is_reported() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let err = write_profile(Broken, &vec![descriptor(0, "a")], &[]).unwrap_err();
        assert!(matches!(err, WriteError::Io(_)));
    }
}
