//! Compressed archive of raw telemetry blocks.
//!
//! The archive is the gzip compression of every block written as a 4-byte
//! little-endian length followed by the block bytes, in order. Storing the
//! raw blocks rather than decoded values means a later decoder (say, one
//! with a different accelerometer scale) can reinterpret old files.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

const LENGTH_PREFIX: usize = 4;

/// Default gzip level.
pub const DEFAULT_LEVEL: u32 = 6;

/// Encodes and decodes telemetry archives.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveCodec {
    level: Compression,
}

impl Default for ArchiveCodec {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

impl ArchiveCodec {
    /// Create a codec with the given gzip level (0-9).
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    /// Encode an ordered sequence of blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if a block is larger than a `u32` length can express,
    /// or if compression fails.
    pub fn encode<B: AsRef<[u8]>>(&self, blocks: &[B]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        for block in blocks {
            let block = block.as_ref();
            let len = u32::try_from(block.len())
                .map_err(|_| Error::internal(format!("block of {} bytes", block.len())))?;
            encoder.write_all(&len.to_le_bytes())?;
            encoder.write_all(block)?;
        }
        Ok(encoder.finish()?)
    }

    /// Decode an archive back into its blocks, in their original order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedArchive`] if a length prefix promises more
    /// bytes than remain, or an I/O error if the compressed stream is corrupt.
    pub fn decode(&self, archive: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut plain = Vec::new();
        GzDecoder::new(archive).read_to_end(&mut plain)?;
        split_blocks(&plain)
    }
}

fn split_blocks(mut rest: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut blocks = Vec::new();
    while !rest.is_empty() {
        if rest.len() < LENGTH_PREFIX {
            return Err(Error::TruncatedArchive {
                expected: LENGTH_PREFIX,
                available: rest.len(),
            });
        }
        let (prefix, tail) = rest.split_at(LENGTH_PREFIX);
        let mut len_bytes = [0u8; LENGTH_PREFIX];
        len_bytes.copy_from_slice(prefix);
        let len = usize::try_from(u32::from_le_bytes(len_bytes))
            .map_err(|_| Error::internal("block length exceeds address space"))?;

        if tail.len() < len {
            return Err(Error::TruncatedArchive {
                expected: len,
                available: tail.len(),
            });
        }
        let (block, tail) = tail.split_at(len);
        blocks.push(block.to_vec());
        rest = tail;
    }
    Ok(blocks)
}

/// Encode with the default codec.
///
/// # Errors
///
/// See [`ArchiveCodec::encode`].
pub fn encode<B: AsRef<[u8]>>(blocks: &[B]) -> Result<Vec<u8>> {
    ArchiveCodec::default().encode(blocks)
}

/// Decode with the default codec.
///
/// # Errors
///
/// See [`ArchiveCodec::decode`].
pub fn decode(archive: &[u8]) -> Result<Vec<Vec<u8>>> {
    ArchiveCodec::default().decode(archive)
}
