//! Block walker for tar streams.
//!
//! The stream is consumed strictly forward: a 512-byte header, the entry
//! data padded to a block boundary, the next header, and so on until an
//! all-zero block or the end of input. GNU long-name records and pax
//! extended headers are folded into the entry that follows them.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, Read};

use super::memory::{Step, read_full};
use super::{EngineError, ErrorCode};
use crate::codec::BoxedReader;
use crate::entry::{Entry, EntryType, PERMISSION_MASK};
use crate::format::detect::{TAR_BLOCK_SIZE, tar_checksum_matches};
use crate::timestamp::Timestamp;

/// Largest long-name or pax record accepted.
const MAX_METADATA_SIZE: u64 = 1 << 20;

/// Pax keywords mapped to their values.
#[derive(Debug, Default, Clone)]
struct PaxRecords(HashMap<String, String>);

impl PaxRecords {
    /// Merges `length keyword=value\n` records. Returns false on malformed input.
    fn merge(&mut self, data: &[u8]) -> bool {
        let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        for record in tar::PaxExtensions::new(&data[..end]) {
            let Ok(record) = record else {
                return false;
            };
            let Ok(key) = record.key() else {
                return false;
            };
            let value = String::from_utf8_lossy(record.value_bytes());
            if value.is_empty() {
                self.0.remove(key);
            } else {
                self.0.insert(key.to_owned(), value.into_owned());
            }
        }
        true
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

pub(super) struct TarReader {
    input: BoxedReader,
    /// Readable bytes left in the current entry.
    remaining: u64,
    /// Bytes to discard after `remaining`: unreadable payload and padding.
    skip: u64,
    global: PaxRecords,
    finished: bool,
}

impl TarReader {
    pub(super) fn new(input: BoxedReader) -> Self {
        Self {
            input,
            remaining: 0,
            skip: 0,
            global: PaxRecords::default(),
            finished: false,
        }
    }

    pub(super) fn next_header(&mut self, entry: &mut Entry) -> Result<Step, EngineError> {
        if self.finished {
            return Ok(Step::Eof);
        }
        self.discard_rest()?;

        let mut long_name: Option<Vec<u8>> = None;
        let mut long_link: Option<Vec<u8>> = None;
        let mut local = PaxRecords::default();
        let mut pending_metadata = false;
        let mut warning = None;

        loop {
            let mut block = [0u8; TAR_BLOCK_SIZE];
            let filled = read_full(&mut self.input, &mut block).map_err(stream_error)?;
            if filled == 0 && !pending_metadata {
                self.finished = true;
                return Ok(Step::Eof);
            }
            if filled < TAR_BLOCK_SIZE {
                return Err(truncated());
            }
            if block.iter().all(|&b| b == 0) {
                if pending_metadata {
                    return Err(truncated());
                }
                self.finished = true;
                return Ok(Step::Eof);
            }
            if !tar_checksum_matches(&block) {
                return Err(EngineError::new(
                    ErrorCode::FileFormat,
                    "Damaged tar archive (bad header checksum)",
                ));
            }

            let header = tar::Header::from_byte_slice(&block);
            let header_size = header.entry_size().map_err(|e| {
                EngineError::new(ErrorCode::FileFormat, format!("Invalid tar header size: {e}"))
            })?;

            match header.entry_type() {
                tar::EntryType::GNULongName => {
                    long_name = Some(trim_nul(self.read_metadata(header_size)?));
                    pending_metadata = true;
                    continue;
                }
                tar::EntryType::GNULongLink => {
                    long_link = Some(trim_nul(self.read_metadata(header_size)?));
                    pending_metadata = true;
                    continue;
                }
                tar::EntryType::XHeader => {
                    let data = self.read_metadata(header_size)?;
                    if !local.merge(&data) {
                        warning = Some("Ignoring malformed pax extended header".to_string());
                    }
                    pending_metadata = true;
                    continue;
                }
                tar::EntryType::XGlobalHeader => {
                    let data = self.read_metadata(header_size)?;
                    if !self.global.merge(&data) {
                        warning = Some("Ignoring malformed pax global header".to_string());
                    }
                    continue;
                }
                tar::EntryType::GNUSparse => {
                    return Err(EngineError::new(
                        ErrorCode::Misc,
                        "GNU sparse tar entries are not supported",
                    ));
                }
                _ => {}
            }

            let pax = |key: &str| local.get(key).or_else(|| self.global.get(key));

            let path: Cow<'_, [u8]> = match (pax("path"), &long_name) {
                (Some(path), _) => Cow::Borrowed(path.as_bytes()),
                (None, Some(name)) => Cow::Borrowed(name.as_slice()),
                (None, None) => header.path_bytes(),
            };
            entry.path = String::from_utf8_lossy(&path).into_owned();

            let entry_type = match header.entry_type() {
                tar::EntryType::Regular | tar::EntryType::Continuous => {
                    if entry.path.ends_with('/') {
                        EntryType::Directory
                    } else {
                        EntryType::File
                    }
                }
                tar::EntryType::Directory => EntryType::Directory,
                tar::EntryType::Link => EntryType::HardLink,
                tar::EntryType::Symlink => EntryType::Symlink,
                tar::EntryType::Char => EntryType::CharDevice,
                tar::EntryType::Block => EntryType::BlockDevice,
                tar::EntryType::Fifo => EntryType::Fifo,
                other => {
                    warning = Some(format!(
                        "Unknown tar entry type '{}', reading as a regular file",
                        char::from(other.as_byte())
                    ));
                    EntryType::File
                }
            };
            entry.entry_type = Some(entry_type);

            let link: Option<Cow<'_, [u8]>> = match (pax("linkpath"), &long_link) {
                (Some(link), _) => Some(Cow::Borrowed(link.as_bytes())),
                (None, Some(link)) => Some(Cow::Borrowed(link.as_slice())),
                (None, None) => header.link_name_bytes(),
            };
            let link = link.map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
            match entry_type {
                EntryType::Symlink => entry.symlink = link,
                EntryType::HardLink => entry.hardlink = link,
                _ => {}
            }

            let size = match pax("size") {
                Some(size) => size.trim().parse::<u64>().map_err(|_| {
                    EngineError::new(ErrorCode::FileFormat, "Invalid pax size record")
                })?,
                None => header_size,
            };
            let readable = if entry_type == EntryType::File { size } else { 0 };
            entry.size = Some(readable);
            self.remaining = readable;
            self.skip = padded(size) - readable;

            entry.permissions = header.mode().unwrap_or(0) & PERMISSION_MASK;
            entry.uid = pax_u64(pax("uid")).or_else(|| header.uid().ok());
            entry.gid = pax_u64(pax("gid")).or_else(|| header.gid().ok());
            entry.modified = pax_time(pax("mtime")).or_else(|| {
                header
                    .mtime()
                    .ok()
                    .and_then(|secs| i64::try_from(secs).ok())
                    .map(Timestamp::from_unix_secs)
            });
            let gnu = header.as_gnu();
            entry.accessed = pax_time(pax("atime")).or_else(|| {
                gnu.and_then(|gnu| gnu.atime().ok())
                    .filter(|&secs| secs != 0)
                    .and_then(|secs| i64::try_from(secs).ok())
                    .map(Timestamp::from_unix_secs)
            });
            entry.changed = pax_time(pax("ctime")).or_else(|| {
                gnu.and_then(|gnu| gnu.ctime().ok())
                    .filter(|&secs| secs != 0)
                    .and_then(|secs| i64::try_from(secs).ok())
                    .map(Timestamp::from_unix_secs)
            });
            entry.created = pax_time(pax("LIBARCHIVE.creationtime"));

            return Ok(warning.map_or(Step::Ok, Step::Warn));
        }
    }

    pub(super) fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = usize::try_from(self.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let got = read_full(&mut self.input, &mut buf[..want]).map_err(stream_error)?;
        if got < want {
            self.remaining = 0;
            return Err(truncated());
        }
        self.remaining -= got as u64;
        Ok(got)
    }

    /// Skips whatever is left of the current entry, padding included.
    fn discard_rest(&mut self) -> Result<(), EngineError> {
        let pending = self.remaining + self.skip;
        self.remaining = 0;
        self.skip = 0;
        if pending == 0 {
            return Ok(());
        }
        let copied = io::copy(&mut (&mut self.input).take(pending), &mut io::sink())
            .map_err(stream_error)?;
        if copied < pending {
            return Err(truncated());
        }
        Ok(())
    }

    /// Reads a metadata record body of `size` bytes and its padding.
    fn read_metadata(&mut self, size: u64) -> Result<Vec<u8>, EngineError> {
        if size > MAX_METADATA_SIZE {
            return Err(EngineError::new(
                ErrorCode::FileFormat,
                format!("Tar metadata record of {size} bytes is too large"),
            ));
        }
        let padded_len = padded(size) as usize;
        let mut data = vec![0u8; padded_len];
        let got = read_full(&mut self.input, &mut data).map_err(stream_error)?;
        if got < padded_len {
            return Err(truncated());
        }
        data.truncate(size as usize);
        Ok(data)
    }
}

fn padded(size: u64) -> u64 {
    let block = TAR_BLOCK_SIZE as u64;
    size.div_ceil(block).saturating_mul(block)
}

fn trim_nul(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes
}

fn pax_u64(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}

fn pax_time(value: Option<&str>) -> Option<Timestamp> {
    value.and_then(Timestamp::parse_decimal)
}

fn truncated() -> EngineError {
    EngineError::new(ErrorCode::FileFormat, "Truncated tar archive")
}

fn stream_error(err: io::Error) -> EngineError {
    EngineError::new(ErrorCode::Io, format!("Failed to read tar stream: {err}"))
}
