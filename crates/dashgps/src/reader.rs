//! Bounded random-access reads over a container.
//!
//! [`AtomReader`] wraps any `Read + Seek` source whose length is known up
//! front. Every read and seek is checked against that length before touching
//! the source, so running off the end surfaces as [`Error::EndOfData`] or
//! [`Error::OutOfRange`] rather than a short read.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};

/// Block size used when streaming through the whole source.
const SCAN_BLOCK_SIZE: usize = 64 * 1024;

/// A read-only, finite-length byte source with an explicit cursor.
#[derive(Debug)]
pub struct AtomReader<R> {
    source: R,
    len: u64,
    position: u64,
}

impl AtomReader<BufReader<File>> {
    /// Open a file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its length read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(BufReader::new(file))
    }
}

impl<T: AsRef<[u8]>> AtomReader<Cursor<T>> {
    /// Wrap an in-memory buffer.
    #[must_use]
    pub fn from_bytes(bytes: T) -> Self {
        let len = bytes.as_ref().len() as u64;
        Self {
            source: Cursor::new(bytes),
            len,
            position: 0,
        }
    }
}

impl<R: Read + Seek> AtomReader<R> {
    /// Wrap a seekable source, measuring its length.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be seeked.
    pub fn new(mut source: R) -> Result<Self> {
        let len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;
        Ok(Self {
            source,
            len,
            position: 0,
        })
    }

    /// Total length of the container in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the container has no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current absolute position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left between the cursor and the end of the container.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.len - self.position
    }

    /// Move the cursor to an absolute offset.
    ///
    /// Seeking exactly to the end is allowed; anything past it is not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `offset` exceeds the container length.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.len {
            return Err(Error::OutOfRange {
                offset,
                len: self.len,
            });
        }
        self.source.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }

    /// Read exactly `n` bytes from the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfData`] if fewer than `n` bytes remain.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let requested = n as u64;
        if requested > self.remaining() {
            return Err(Error::EndOfData {
                requested,
                remaining: self.remaining(),
            });
        }
        let mut buf = vec![0u8; n];
        self.source.read_exact(&mut buf)?;
        self.position += requested;
        Ok(buf)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let requested = N as u64;
        if requested > self.remaining() {
            return Err(Error::EndOfData {
                requested,
                remaining: self.remaining(),
            });
        }
        let mut buf = [0u8; N];
        self.source.read_exact(&mut buf)?;
        self.position += requested;
        Ok(buf)
    }

    /// Read a big-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfData`] if fewer than 4 bytes remain.
    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Read a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfData`] if fewer than 4 bytes remain.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Read a 4-byte type tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfData`] if fewer than 4 bytes remain.
    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        self.read_array()
    }

    /// Find every offset at which `signature` occurs in the container.
    ///
    /// Streams the source block by block, so the whole container never has
    /// to be in memory at once. Overlapping matches are all reported. The
    /// cursor is restored afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source fails to read.
    pub fn find_all(&mut self, signature: &[u8]) -> Result<Vec<u64>> {
        let mut matches = Vec::new();
        if signature.is_empty() || (signature.len() as u64) > self.len {
            return Ok(matches);
        }

        let saved = self.position;
        self.source.seek(SeekFrom::Start(0))?;

        let overlap = signature.len() - 1;
        let mut window: Vec<u8> = Vec::with_capacity(SCAN_BLOCK_SIZE + overlap);
        let mut block = vec![0u8; SCAN_BLOCK_SIZE];
        // Absolute offset of window[0].
        let mut window_start = 0u64;
        let mut consumed = 0u64;

        while consumed < self.len {
            let want = usize::try_from((self.len - consumed).min(SCAN_BLOCK_SIZE as u64))
                .unwrap_or(SCAN_BLOCK_SIZE);
            self.source.read_exact(&mut block[..want])?;
            consumed += want as u64;
            window.extend_from_slice(&block[..want]);

            matches.extend(
                window
                    .windows(signature.len())
                    .enumerate()
                    .filter(|(_, w)| *w == signature)
                    .map(|(i, _)| window_start + i as u64),
            );

            // Keep the tail so matches straddling blocks are found once.
            let keep = overlap.min(window.len());
            let drop = window.len() - keep;
            window.drain(..drop);
            window_start += drop as u64;
        }

        self.source.seek(SeekFrom::Start(saved))?;
        self.position = saved;
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_exact_advances() {
        let mut reader = AtomReader::from_bytes(vec![1u8, 2, 3, 4, 5]);
        assert_eq!(reader.read_exact(2).unwrap(), vec![1, 2]);
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.remaining(), 3);
        assert_eq!(reader.read_exact(3).unwrap(), vec![3, 4, 5]);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_exact_past_end_fails_without_moving() {
        let mut reader = AtomReader::from_bytes(vec![0u8; 4]);
        reader.seek(2).unwrap();
        let err = reader.read_exact(3).unwrap_err();
        assert!(matches!(
            err,
            Error::EndOfData {
                requested: 3,
                remaining: 2
            }
        ));
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn test_read_zero_at_end() {
        let mut reader = AtomReader::from_bytes(vec![0u8; 4]);
        reader.seek(4).unwrap();
        assert!(reader.read_exact(0).unwrap().is_empty());
    }

    #[test]
    fn test_seek_bounds() {
        let mut reader = AtomReader::from_bytes(vec![0u8; 10]);
        assert!(reader.seek(10).is_ok());
        let err = reader.seek(11).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { offset: 11, len: 10 }));
        assert_eq!(reader.position(), 10);
    }

    #[test]
    fn test_integer_reads() {
        let mut reader = AtomReader::from_bytes(vec![0, 0, 1, 0, 0x10, 0, 0, 0, b'm', b'o', b'o', b'v']);
        assert_eq!(reader.read_u32_be().unwrap(), 256);
        assert_eq!(reader.read_u32_le().unwrap(), 16);
        assert_eq!(&reader.read_tag().unwrap(), b"moov");
        assert!(reader.read_u32_be().is_err());
    }

    #[test]
    fn test_new_measures_length() {
        let reader = AtomReader::new(Cursor::new(vec![0u8; 33])).unwrap();
        assert_eq!(reader.len(), 33);
        assert_eq!(reader.position(), 0);
        assert!(!reader.is_empty());
    }

    #[test]
    fn test_find_all() {
        let mut data = vec![0u8; 20];
        data[3..7].copy_from_slice(b"moov");
        data[15..19].copy_from_slice(b"moov");
        let mut reader = AtomReader::from_bytes(data);
        reader.seek(5).unwrap();
        assert_eq!(reader.find_all(b"moov").unwrap(), vec![3, 15]);
        assert_eq!(reader.position(), 5);
    }

    #[test]
    fn test_find_all_across_block_boundary() {
        let mut data = vec![0u8; SCAN_BLOCK_SIZE * 2 + 10];
        let at = SCAN_BLOCK_SIZE - 2;
        data[at..at + 4].copy_from_slice(b"moov");
        let last = data.len() - 4;
        data[last..].copy_from_slice(b"moov");
        let mut reader = AtomReader::from_bytes(data);
        assert_eq!(
            reader.find_all(b"moov").unwrap(),
            vec![at as u64, last as u64]
        );
    }

    #[test]
    fn test_find_all_short_source() {
        let mut reader = AtomReader::from_bytes(b"moo".to_vec());
        assert!(reader.find_all(b"moov").unwrap().is_empty());
    }

    #[test]
    fn test_open_missing_file() {
        let err = AtomReader::open("/nonexistent/dashcam/FILE0001.MP4").unwrap_err();
        assert!(matches!(err, Error::FileOpen { .. }));
    }
}
