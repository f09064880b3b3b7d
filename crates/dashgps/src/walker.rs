//! Atom-tree traversal for dashcam containers.
//!
//! The camera writes an MP4-style file: a sequence of top-level atoms, each
//! a big-endian `u32` size (header included) and a four-byte tag. Inside the
//! `moov` atom sits a `gps ` directory whose body lists `(offset, length)`
//! pairs pointing at `free` atoms scattered through the file. Each of those
//! starts with the magic `GPS `, a little-endian payload length, and the
//! payload XOR-ed with `0xAA`.
//!
//! The walk is a small state machine:
//!
//! ```text
//! Scanning ──target tag──▶ InsideTarget ──▶ Scanning ──end──▶ Done / NotThisFormat
//!    │
//!    └──size < 8──▶ Recovering ──first candidate with records──▶ Done
//!                       └──no candidate──▶ NotThisFormat
//! ```
//!
//! Files whose atom sizes are inconsistent (typically a recording cut short
//! by power loss) go through the recovery scan, which searches the raw bytes
//! for the target tag and retries the walk from every hit.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::reader::AtomReader;
use crate::record::{self, DecodeOptions, TelemetryRecord};

/// Size of an atom header: `u32` size plus four-byte tag.
pub const HEADER_LEN: u64 = 8;

/// Tags and constants that locate telemetry inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerLayout {
    /// Top-level atom holding the directory.
    pub target_tag: [u8; 4],
    /// Child atom listing the telemetry chunks.
    pub directory_tag: [u8; 4],
    /// Tag every telemetry chunk must carry.
    pub free_tag: [u8; 4],
    /// Literal that opens every telemetry chunk body.
    pub magic: [u8; 4],
    /// Distance from the directory's header to its first entry.
    pub directory_header_skip: u64,
    /// Byte every payload byte is XOR-ed with.
    pub xor_key: u8,
}

impl Default for ContainerLayout {
    fn default() -> Self {
        Self {
            target_tag: *b"moov",
            directory_tag: *b"gps ",
            free_tag: *b"free",
            magic: *b"GPS ",
            directory_header_skip: 16,
            xor_key: 0xAA,
        }
    }
}

/// A parsed atom header and where it sits in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    /// Absolute offset of the header.
    pub offset: u64,
    /// Declared size, header included.
    pub size: u32,
    /// Type tag.
    pub tag: [u8; 4],
}

impl AtomHeader {
    /// Offset one past the atom's last byte.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.size)
    }

    /// Whether the declared size can hold the header itself.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        u64::from(self.size) >= HEADER_LEN
    }
}

/// Printable form of a tag, escaping anything that isn't ASCII.
#[must_use]
pub fn display_tag(tag: &[u8; 4]) -> String {
    tag.escape_ascii().to_string()
}

/// One accepted telemetry chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The decoded record.
    pub record: TelemetryRecord,
    /// The de-obfuscated block the record was decoded from.
    pub payload: Vec<u8>,
}

/// Everything a successful walk produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Accepted samples in directory order.
    pub samples: Vec<Sample>,
    /// Whether the samples came from the recovery scan.
    pub recovered: bool,
}

impl Extraction {
    /// Number of accepted samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over the decoded records.
    pub fn records(&self) -> impl Iterator<Item = &TelemetryRecord> {
        self.samples.iter().map(|sample| &sample.record)
    }

    /// Iterate over the raw blocks, in the same order as [`Self::records`].
    pub fn payloads(&self) -> impl Iterator<Item = &[u8]> {
        self.samples.iter().map(|sample| sample.payload.as_slice())
    }

    /// Split into records and raw blocks.
    #[must_use]
    pub fn into_parts(self) -> (Vec<TelemetryRecord>, Vec<Vec<u8>>) {
        self.samples
            .into_iter()
            .map(|sample| (sample.record, sample.payload))
            .unzip()
    }
}

/// Why a directory entry was skipped.
#[derive(Debug)]
enum Rejection {
    NotFree([u8; 4]),
    BadMagic([u8; 4]),
    Unparsed(usize),
    OutOfBounds(Error),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFree(tag) => write!(f, "atom type is '{}'", display_tag(tag)),
            Self::BadMagic(magic) => write!(f, "data starts with '{}'", display_tag(magic)),
            Self::Unparsed(len) => write!(f, "payload is {len} bytes"),
            Self::OutOfBounds(err) => write!(f, "{err}"),
        }
    }
}

enum State {
    Scanning { offset: u64 },
    InsideTarget { header: AtomHeader },
    Recovering,
}

/// Result of walking one target atom.
#[derive(Default)]
struct TargetWalk {
    directory_found: bool,
    samples: Vec<Sample>,
}

/// Walks one container and extracts its telemetry.
#[derive(Debug)]
pub struct ContainerWalker<R> {
    reader: AtomReader<R>,
    layout: ContainerLayout,
    options: DecodeOptions,
}

impl<R: Read + Seek> ContainerWalker<R> {
    /// Create a walker that owns `reader` for the duration of the walk.
    #[must_use]
    pub fn new(reader: AtomReader<R>, layout: ContainerLayout, options: DecodeOptions) -> Self {
        Self {
            reader,
            layout,
            options,
        }
    }

    /// Walk the container.
    ///
    /// Every target atom found at the top level contributes its samples, in
    /// file order. If a top-level header is corrupt before any sample was
    /// found, the recovery scan takes over.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotThisFormat`] if no target atom with a directory
    /// was found (even after recovery), and propagates bounds errors hit
    /// while walking a target atom found by the regular walk.
    pub fn walk(mut self) -> Result<Extraction> {
        let mut state = State::Scanning { offset: 0 };
        let mut found_target = false;
        let mut found_directory = false;
        let mut samples = Vec::new();

        loop {
            state = match state {
                State::Scanning { offset } => match self.top_level_header(offset)? {
                    None => break,
                    Some(header) if !header.is_well_formed() => {
                        if !samples.is_empty() {
                            warn!(
                                "Atom at {} declares size {}, stopping after the target atom",
                                header.offset, header.size
                            );
                            break;
                        }
                        warn!(
                            "Atom at {} declares size {}, too small for a well formed file",
                            header.offset, header.size
                        );
                        State::Recovering
                    }
                    Some(header) if header.tag == self.layout.target_tag => {
                        State::InsideTarget { header }
                    }
                    Some(header) => State::Scanning {
                        offset: header.end(),
                    },
                },
                State::InsideTarget { header } => {
                    debug!(
                        "'{}' atom found at offset {}",
                        display_tag(&header.tag),
                        header.offset
                    );
                    found_target = true;
                    let target = self.walk_target(&header)?;
                    found_directory |= target.directory_found;
                    samples.extend(target.samples);
                    State::Scanning {
                        offset: header.end(),
                    }
                }
                State::Recovering => return self.recover(),
            };
        }

        if !found_target {
            return Err(Error::not_this_format(format!(
                "no '{}' atom",
                display_tag(&self.layout.target_tag)
            )));
        }
        if !found_directory {
            return Err(Error::not_this_format(format!(
                "'{}' atom has no '{}' directory",
                display_tag(&self.layout.target_tag),
                display_tag(&self.layout.directory_tag)
            )));
        }
        Ok(Extraction {
            samples,
            recovered: false,
        })
    }

    /// Read the header at `offset`, or `None` if a full header doesn't fit.
    fn top_level_header(&mut self, offset: u64) -> Result<Option<AtomHeader>> {
        if offset.saturating_add(HEADER_LEN) > self.reader.len() {
            debug!("End of container at offset {}", offset);
            return Ok(None);
        }
        self.reader.seek(offset)?;
        self.read_header().map(Some)
    }

    fn read_header(&mut self) -> Result<AtomHeader> {
        let offset = self.reader.position();
        let size = self.reader.read_u32_be()?;
        let tag = self.reader.read_tag()?;
        Ok(AtomHeader { offset, size, tag })
    }

    fn walk_target(&mut self, target: &AtomHeader) -> Result<TargetWalk> {
        let end = target.end().min(self.reader.len());
        let mut walk = TargetWalk::default();
        let mut offset = target.offset + HEADER_LEN;

        while offset + HEADER_LEN <= end {
            self.reader.seek(offset)?;
            let child = self.read_header()?;
            if !child.is_well_formed() {
                debug!(
                    "Child atom at {} declares size {}, ending child walk",
                    child.offset, child.size
                );
                break;
            }
            if child.tag == self.layout.directory_tag {
                debug!(
                    "Directory atom found at offset {} ({} bytes)",
                    child.offset, child.size
                );
                walk.directory_found = true;
                self.walk_directory(&child, &mut walk.samples)?;
            }
            offset = child.end();
        }

        Ok(walk)
    }

    fn walk_directory(&mut self, directory: &AtomHeader, samples: &mut Vec<Sample>) -> Result<()> {
        let end = directory.end().min(self.reader.len());
        let Some(mut offset) = directory
            .offset
            .checked_add(self.layout.directory_header_skip)
        else {
            debug!("Directory header skip overflows, no entries read");
            return Ok(());
        };

        while offset.saturating_add(8) <= end {
            self.reader.seek(offset)?;
            let chunk_offset = self.reader.read_u32_be()?;
            let chunk_len = self.reader.read_u32_be()?;

            let rejection = match self.read_chunk(u64::from(chunk_offset)) {
                Ok(Ok(sample)) => {
                    samples.push(sample);
                    None
                }
                Ok(Err(rejection)) => Some(rejection),
                Err(err) if err.is_bounds_error() => Some(Rejection::OutOfBounds(err)),
                Err(err) => return Err(err),
            };
            if let Some(rejection) = rejection {
                debug!(
                    "Skipping chunk at {} ({} bytes): {}",
                    chunk_offset, chunk_len, rejection
                );
            }
            offset += 8;
        }
        Ok(())
    }

    /// Read and decode the telemetry chunk at `offset`.
    ///
    /// The outer `Result` carries reader errors, including a chunk that runs
    /// past the end; the inner one is a soft rejection of a chunk that isn't
    /// telemetry.
    fn read_chunk(&mut self, offset: u64) -> Result<std::result::Result<Sample, Rejection>> {
        self.reader.seek(offset)?;
        let header = self.read_header()?;
        if header.tag != self.layout.free_tag {
            return Ok(Err(Rejection::NotFree(header.tag)));
        }

        let magic = self.reader.read_tag()?;
        if magic != self.layout.magic {
            return Ok(Err(Rejection::BadMagic(magic)));
        }

        let len = self.reader.read_u32_le()?;
        let len = usize::try_from(len).map_err(|_| Error::EndOfData {
            requested: u64::from(len),
            remaining: self.reader.remaining(),
        })?;
        let mut payload = self.reader.read_exact(len)?;
        deobfuscate(&mut payload, self.layout.xor_key);

        let record = record::decode(&payload, &self.options);
        if !record.is_parsed() {
            return Ok(Err(Rejection::Unparsed(payload.len())));
        }
        Ok(Ok(Sample { record, payload }))
    }

    fn recover(mut self) -> Result<Extraction> {
        let candidates = self.reader.find_all(&self.layout.target_tag)?;
        warn!(
            "Recovery scan: {} candidate '{}' signatures",
            candidates.len(),
            display_tag(&self.layout.target_tag)
        );

        for position in candidates {
            let Some(offset) = position.checked_sub(4) else {
                continue;
            };
            match self.walk_candidate(offset) {
                Ok(walk) if !walk.samples.is_empty() => {
                    info!(
                        "Recovered {} samples from candidate at offset {}",
                        walk.samples.len(),
                        offset
                    );
                    return Ok(Extraction {
                        samples: walk.samples,
                        recovered: true,
                    });
                }
                Ok(_) => debug!("Candidate at {} yielded no samples", offset),
                Err(err) => debug!("Candidate at {} failed: {}", offset, err),
            }
        }

        Err(Error::not_this_format(format!(
            "recovery scan found no usable '{}' atom",
            display_tag(&self.layout.target_tag)
        )))
    }

    fn walk_candidate(&mut self, offset: u64) -> Result<TargetWalk> {
        self.reader.seek(offset)?;
        let header = self.read_header()?;
        if !header.is_well_formed() {
            return Ok(TargetWalk::default());
        }
        self.walk_target(&header)
    }
}

/// Undo the payload obfuscation in place.
pub fn deobfuscate(payload: &mut [u8], key: u8) {
    for byte in payload {
        *byte ^= key;
    }
}

/// Walk a file on disk.
///
/// # Errors
///
/// See [`ContainerWalker::walk`]; also fails if the file cannot be opened.
pub fn extract_file(
    path: impl AsRef<Path>,
    layout: ContainerLayout,
    options: DecodeOptions,
) -> Result<Extraction> {
    let reader: AtomReader<BufReader<File>> = AtomReader::open(path)?;
    ContainerWalker::new(reader, layout, options).walk()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_block;

    fn atom(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let size = u32::try_from(body.len() + 8).unwrap();
        [&size.to_be_bytes()[..], tag, body].concat()
    }

    fn chunk(tag: &[u8; 4], magic: &[u8; 4], plain: &[u8]) -> Vec<u8> {
        let mut payload = plain.to_vec();
        deobfuscate(&mut payload, 0xAA);
        let len = u32::try_from(payload.len()).unwrap();
        let body = [&magic[..], &len.to_le_bytes(), &payload].concat();
        atom(tag, &body)
    }

    fn directory(entries: &[(u32, u32)]) -> Vec<u8> {
        // Eight bytes of version/flags/count before the first entry.
        let mut body = vec![0u8; 8];
        for (offset, len) in entries {
            body.extend_from_slice(&offset.to_be_bytes());
            body.extend_from_slice(&len.to_be_bytes());
        }
        atom(b"gps ", &body)
    }

    /// ftyp, then the chunks as top-level atoms, then moov with the directory.
    fn container_with_prefix(prefix: &[u8], chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut file = prefix.to_vec();
        file.extend(atom(b"ftyp", b"isomavc1"));
        let mut entries = Vec::new();
        for chunk in chunks {
            let offset = u32::try_from(file.len()).unwrap();
            let len = u32::try_from(chunk.len()).unwrap();
            entries.push((offset, len));
            file.extend_from_slice(chunk);
        }
        let moov_body = [atom(b"mvhd", &[0u8; 12]), directory(&entries)].concat();
        file.extend(atom(b"moov", &moov_body));
        file
    }

    fn container(chunks: &[Vec<u8>]) -> Vec<u8> {
        container_with_prefix(&[], chunks)
    }

    fn walk(bytes: Vec<u8>) -> Result<Extraction> {
        crate::logging::init_test_logging();
        ContainerWalker::new(
            AtomReader::from_bytes(bytes),
            ContainerLayout::default(),
            DecodeOptions::default(),
        )
        .walk()
    }

    fn other_block() -> Vec<u8> {
        let mut block = sample_block();
        block[25..34].copy_from_slice(b"ZZ999ZZ  ");
        block
    }

    #[test]
    fn test_single_record() {
        let file = container(&[chunk(b"free", b"GPS ", &sample_block())]);
        let extraction = walk(file).unwrap();

        assert_eq!(extraction.len(), 1);
        assert!(!extraction.recovered);
        let expected = record::decode(&sample_block(), &DecodeOptions::default());
        assert_eq!(extraction.samples[0].record, expected);
        assert_eq!(extraction.samples[0].payload, sample_block());
    }

    #[test]
    fn test_records_follow_directory_order() {
        let file = container(&[
            chunk(b"free", b"GPS ", &sample_block()),
            chunk(b"free", b"GPS ", &other_block()),
        ]);
        let extraction = walk(file).unwrap();
        let plates: Vec<_> = extraction
            .records()
            .map(|r| r.plate.clone().unwrap())
            .collect();
        assert_eq!(plates, vec!["AB123CD", "ZZ999ZZ"]);

        let (records, payloads) = extraction.into_parts();
        assert_eq!(records.len(), 2);
        assert_eq!(payloads, vec![sample_block(), other_block()]);
    }

    #[test]
    fn test_non_free_chunk_is_skipped() {
        let file = container(&[
            chunk(b"skip", b"GPS ", &sample_block()),
            chunk(b"free", b"GPS ", &other_block()),
        ]);
        let extraction = walk(file).unwrap();
        assert_eq!(extraction.len(), 1);
        assert_eq!(extraction.samples[0].payload, other_block());
    }

    #[test]
    fn test_bad_magic_is_skipped() {
        let file = container(&[
            chunk(b"free", b"JPEG", &sample_block()),
            chunk(b"free", b"GPS ", &other_block()),
        ]);
        let extraction = walk(file).unwrap();
        assert_eq!(extraction.len(), 1);
        assert_eq!(extraction.samples[0].payload, other_block());
    }

    #[test]
    fn test_wrong_length_payload_is_skipped() {
        let file = container(&[
            chunk(b"free", b"GPS ", &[b'0'; 100]),
            chunk(b"free", b"GPS ", &sample_block()),
        ]);
        assert_eq!(walk(file).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_entry_points_at_ftyp() {
        let mut file = atom(b"ftyp", b"isomavc1");
        let moov = atom(b"moov", &directory(&[(0, 0)]));
        file.extend(moov);
        let extraction = walk(file).unwrap();
        assert!(extraction.is_empty());
        assert!(!extraction.recovered);
    }

    #[test]
    fn test_no_target_is_not_this_format() {
        let mut file = atom(b"ftyp", b"isomavc1");
        file.extend(atom(b"mdat", &[0u8; 32]));
        assert!(walk(file).unwrap_err().is_not_this_format());
    }

    #[test]
    fn test_empty_input_is_not_this_format() {
        assert!(walk(Vec::new()).unwrap_err().is_not_this_format());
    }

    #[test]
    fn test_target_without_directory_is_not_this_format() {
        let mut file = atom(b"ftyp", b"isomavc1");
        file.extend(atom(b"moov", &atom(b"mvhd", &[0u8; 12])));
        let err = walk(file).unwrap_err();
        assert!(err.is_not_this_format());
        assert!(err.to_string().contains("gps "));
    }

    #[test]
    fn test_undersized_header_triggers_recovery() {
        let prefix = [0u8, 0, 0, 4, b'j', b'u', b'n', b'k'];
        let file = container_with_prefix(&prefix, &[chunk(b"free", b"GPS ", &sample_block())]);
        let extraction = walk(file).unwrap();
        assert!(extraction.recovered);
        assert_eq!(extraction.len(), 1);
        assert_eq!(extraction.samples[0].payload, sample_block());
    }

    #[test]
    fn test_recovery_skips_decoy_signatures() {
        let mut prefix = vec![0u8, 0, 0, 4, b'j', b'u', b'n', b'k'];
        // A stray "moov" whose body is garbage.
        prefix.extend_from_slice(&16u32.to_be_bytes());
        prefix.extend_from_slice(b"moov");
        prefix.extend_from_slice(&[0, 0, 0, 0, b'a', b'b', b'c', b'd']);
        let file = container_with_prefix(&prefix, &[chunk(b"free", b"GPS ", &sample_block())]);

        let extraction = walk(file).unwrap();
        assert!(extraction.recovered);
        assert_eq!(extraction.len(), 1);
    }

    #[test]
    fn test_recovery_discards_failing_candidate() {
        let mut prefix = vec![0u8, 0, 0, 4, b'j', b'u', b'n', b'k'];
        // A stale "moov" whose directory points past the end of the file.
        prefix.extend(atom(b"moov", &directory(&[(1_000_000, 8)])));
        let file = container_with_prefix(&prefix, &[chunk(b"free", b"GPS ", &sample_block())]);

        let extraction = walk(file).unwrap();
        assert!(extraction.recovered);
        assert_eq!(extraction.samples[0].payload, sample_block());
    }

    #[test]
    fn test_recovery_without_signature_fails() {
        let mut file = vec![0u8, 0, 0, 2, b'j', b'u', b'n', b'k'];
        file.extend(atom(b"mdat", &[0u8; 64]));
        let err = walk(file).unwrap_err();
        assert!(err.is_not_this_format());
        assert!(err.to_string().contains("recovery"));
    }

    #[test]
    fn test_corruption_after_target_keeps_records() {
        let mut file = container(&[chunk(b"free", b"GPS ", &sample_block())]);
        file.extend_from_slice(&[0, 0, 0, 1, b'b', b'a', b'd', b'!']);
        let extraction = walk(file).unwrap();
        assert!(!extraction.recovered);
        assert_eq!(extraction.len(), 1);
    }

    #[test]
    fn test_truncated_trailing_atom_ends_walk() {
        let mut file = container(&[chunk(b"free", b"GPS ", &sample_block())]);
        file.extend_from_slice(&1_000_000u32.to_be_bytes());
        file.extend_from_slice(b"mdat");
        file.extend_from_slice(&[0u8; 16]);
        assert_eq!(walk(file).unwrap().len(), 1);
    }

    #[test]
    fn test_entry_past_end_is_skipped() {
        let mut file = atom(b"ftyp", b"isomavc1");
        let good_offset = u32::try_from(file.len()).unwrap();
        let good = chunk(b"free", b"GPS ", &sample_block());
        let good_len = u32::try_from(good.len()).unwrap();
        file.extend(good);
        let entries = [(9_999_999, 8), (good_offset, good_len)];
        file.extend(atom(b"moov", &directory(&entries)));

        let extraction = walk(file).unwrap();
        assert_eq!(extraction.len(), 1);
        assert_eq!(extraction.samples[0].payload, sample_block());
    }

    #[test]
    fn test_payload_past_end_is_skipped() {
        let mut file = atom(b"ftyp", b"isomavc1");
        let good_offset = u32::try_from(file.len()).unwrap();
        file.extend(chunk(b"free", b"GPS ", &sample_block()));
        let short_offset = u32::try_from(file.len()).unwrap();
        // Claims 261 bytes of payload but carries none.
        let body = [&b"GPS "[..], &261u32.to_le_bytes()].concat();
        file.extend(atom(b"free", &body));
        let entries = [(short_offset, 16), (good_offset, 8)];
        file.extend(atom(b"moov", &directory(&entries)));

        let extraction = walk(file).unwrap();
        assert_eq!(extraction.len(), 1);
    }

    #[test]
    fn test_huge_directory_skip_reads_no_entries() {
        let file = container(&[chunk(b"free", b"GPS ", &sample_block())]);
        let layout = ContainerLayout {
            directory_header_skip: u64::MAX,
            ..ContainerLayout::default()
        };
        let extraction = ContainerWalker::new(
            AtomReader::from_bytes(file),
            layout,
            DecodeOptions::default(),
        )
        .walk()
        .unwrap();
        assert!(extraction.is_empty());
    }

    #[test]
    fn test_empty_target_then_corruption_triggers_recovery() {
        let mut prefix = atom(b"moov", &directory(&[]));
        prefix.extend_from_slice(&[0, 0, 0, 4, b'j', b'u', b'n', b'k']);
        let file = container_with_prefix(&prefix, &[chunk(b"free", b"GPS ", &sample_block())]);

        let extraction = walk(file).unwrap();
        assert!(extraction.recovered);
        assert_eq!(extraction.len(), 1);
    }

    #[test]
    fn test_custom_layout() {
        let layout = ContainerLayout {
            xor_key: 0x00,
            magic: *b"GPS2",
            ..ContainerLayout::default()
        };
        let mut file = atom(b"ftyp", b"isomavc1");
        let chunk_offset = u32::try_from(file.len()).unwrap();
        let body = [&b"GPS2"[..], &261u32.to_le_bytes(), &sample_block()].concat();
        file.extend(atom(b"free", &body));
        file.extend(atom(b"moov", &directory(&[(chunk_offset, 0)])));

        let extraction = ContainerWalker::new(
            AtomReader::from_bytes(file),
            layout,
            DecodeOptions::default(),
        )
        .walk()
        .unwrap();
        assert_eq!(extraction.len(), 1);
        assert_eq!(extraction.samples[0].payload, sample_block());
    }

    #[test]
    fn test_deobfuscate() {
        let mut bytes = vec![0x00, 0xAA, 0xFF];
        deobfuscate(&mut bytes, 0xAA);
        assert_eq!(bytes, vec![0xAA, 0x00, 0x55]);
    }

    #[test]
    fn test_display_tag() {
        assert_eq!(display_tag(b"gps "), "gps ");
        assert_eq!(display_tag(&[0, b'a', 0xff, b'b']), "\\x00a\\xffb");
    }

    #[test]
    fn test_extract_file() {
        let path =
            std::env::temp_dir().join(format!("dashgps_walker_{}.MP4", std::process::id()));
        std::fs::write(&path, container(&[chunk(b"free", b"GPS ", &sample_block())])).unwrap();

        let extraction =
            extract_file(&path, ContainerLayout::default(), DecodeOptions::default()).unwrap();
        assert_eq!(extraction.len(), 1);

        let _ = std::fs::remove_file(&path);
    }
}
