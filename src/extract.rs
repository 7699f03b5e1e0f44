//! Whole-entry extraction.
//!
//! [`extract`] drives a [`Session`] and yields every entry together with its
//! fully decoded data, turning failure statuses into [`Error`]s. With
//! [`ExtractOptions::recursive`] set, file entries that are archives
//! themselves are opened in place and their entries are yielded instead,
//! with paths joined as `outer/inner`.
//!
//! # Example
//!
//! ```rust
//! use archive_bridge::{extract_all, ExtractOptions};
//!
//! let mut builder = tar::Builder::new(Vec::new());
//! let mut header = tar::Header::new_ustar();
//! header.set_size(5);
//! header.set_mode(0o644);
//! builder.append_data(&mut header, "hello.txt", &b"hello"[..]).unwrap();
//! let archive = builder.into_inner().unwrap();
//!
//! let entries = extract_all(archive, ExtractOptions::default()).unwrap();
//! assert_eq!(entries.len(), 1);
//! assert_eq!(entries[0].path(), "hello.txt");
//! assert_eq!(entries[0].data, b"hello");
//! ```

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use crate::engine::ErrorCode;
use crate::entry::Entry;
use crate::passphrase::Passphrase;
use crate::safety::{LimitedReader, PathSafety, ResourceLimits};
use crate::session::{Advance, Session, SessionConfig};
use crate::{Error, Result};

/// Default nesting depth for recursive extraction.
pub const DEFAULT_RECURSION_LIMIT: usize = 8;

/// Options for [`extract`] and [`extract_all`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Passphrase for encrypted entries.
    pub passphrase: Option<Passphrase>,
    /// Expand entries that are archives themselves.
    pub recursive: bool,
    /// How many archives deep recursive extraction may go.
    pub recursion_limit: usize,
    /// Skip the `.` directory entry some archivers emit for the root.
    pub ignore_dot_dir: bool,
    /// Size and count limits.
    pub limits: ResourceLimits,
    /// Path policy for [`fs::extract_to`](crate::fs::extract_to).
    pub path_safety: PathSafety,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            passphrase: None,
            recursive: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            ignore_dot_dir: true,
            limits: ResourceLimits::default(),
            path_safety: PathSafety::default(),
        }
    }
}

impl ExtractOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the passphrase.
    pub fn passphrase(mut self, passphrase: impl Into<Passphrase>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Enables or disables recursive extraction.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Sets the recursion limit.
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Sets whether the `.` root entry is skipped.
    pub fn ignore_dot_dir(mut self, ignore: bool) -> Self {
        self.ignore_dot_dir = ignore;
        self
    }

    /// Sets the resource limits.
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the path policy used when writing to disk.
    pub fn path_safety(mut self, policy: PathSafety) -> Self {
        self.path_safety = policy;
        self
    }

    fn session_config(&self, recursive: bool) -> SessionConfig {
        SessionConfig {
            passphrase: self.passphrase.clone(),
            recursive,
            buffer_limit: self.limits.max_entry_size,
        }
    }
}

/// An entry with its decoded data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    /// Entry metadata. For entries of nested archives the path is prefixed
    /// with the path of the enclosing entry.
    pub entry: Entry,
    /// Decoded data; empty for anything but regular files.
    pub data: Vec<u8>,
}

impl ExtractedEntry {
    /// Returns the entry path.
    pub fn path(&self) -> &str {
        &self.entry.path
    }
}

struct Frame {
    session: Session,
    prefix: Option<String>,
}

/// Iterator returned by [`extract`].
///
/// Stops after the first error.
pub struct Extractor {
    options: ExtractOptions,
    frames: Vec<Frame>,
    total: Arc<AtomicU64>,
    entries: usize,
    done: bool,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("depth", &self.frames.len())
            .field("entries", &self.entries)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Opens `data` and returns an iterator over its entries.
///
/// Failing to open the archive is reported immediately.
pub fn extract(data: impl Into<Arc<[u8]>>, options: ExtractOptions) -> Result<Extractor> {
    let session = Session::open(data, &options.session_config(false));
    if let Some(err) = session.status().to_error() {
        return Err(err);
    }
    Ok(Extractor {
        options,
        frames: vec![Frame {
            session,
            prefix: None,
        }],
        total: Arc::new(AtomicU64::new(0)),
        entries: 0,
        done: false,
    })
}

/// Extracts every entry of `data` into memory.
pub fn extract_all(data: impl Into<Arc<[u8]>>, options: ExtractOptions) -> Result<Vec<ExtractedEntry>> {
    extract(data, options)?.collect()
}

impl Extractor {
    fn step(&mut self) -> Result<Option<ExtractedEntry>> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(None);
            };
            let mut entry = match frame.session.advance() {
                Advance::Entry(entry) => entry.clone(),
                Advance::End => {
                    self.frames.pop();
                    continue;
                }
                Advance::Aborted => {
                    return Err(frame.session.status().to_error().unwrap_or_else(|| {
                        Error::Archive {
                            code: ErrorCode::Misc,
                            message: "next header failed".to_string(),
                        }
                    }));
                }
            };

            if self.options.ignore_dot_dir && entry.is_dot_dir() {
                log::debug!("skipping root entry {:?}", entry.path);
                continue;
            }
            self.entries += 1;
            if self.entries > self.options.limits.max_entries {
                return Err(Error::ResourceLimitExceeded(format!(
                    "Entry count exceeds limit {}",
                    self.options.limits.max_entries
                )));
            }

            let data = if entry.is_file() {
                read_entry(
                    &mut frame.session,
                    &self.options.limits,
                    Arc::clone(&self.total),
                )
                .map_err(|err| err.with_entry_name(&entry.path))?
            } else {
                Vec::new()
            };

            if let Some(prefix) = &frame.prefix {
                entry.path = format!("{prefix}/{}", entry.path);
            }

            if self.options.recursive && entry.is_file() && !data.is_empty() {
                let nested = Session::open(data.clone(), &self.options.session_config(true));
                if !nested.status().is_failure() {
                    if self.frames.len() > self.options.recursion_limit {
                        return Err(Error::ResourceLimitExceeded(format!(
                            "Nested archive {} exceeds recursion limit {}",
                            entry.path, self.options.recursion_limit
                        )));
                    }
                    log::debug!("descending into nested archive {}", entry.path);
                    self.frames.push(Frame {
                        session: nested,
                        prefix: Some(entry.path),
                    });
                    continue;
                }
                log::debug!("{} is not a nested archive: {}", entry.path, nested.status());
            }

            return Ok(Some(ExtractedEntry { entry, data }));
        }
    }
}

impl Iterator for Extractor {
    type Item = Result<ExtractedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                self.frames.clear();
                Some(Err(err))
            }
        }
    }
}

fn read_entry(session: &mut Session, limits: &ResourceLimits, total: Arc<AtomicU64>) -> Result<Vec<u8>> {
    let declared = session.entry().and_then(|entry| entry.size);
    if let Some(size) = declared {
        if size > limits.max_entry_size {
            return Err(Error::ResourceLimitExceeded(format!(
                "Entry size {size} exceeds limit {}",
                limits.max_entry_size
            )));
        }
    }

    let mut data = Vec::new();
    if let Some(size) = declared {
        let capacity = usize::try_from(size)
            .map_err(|_| Error::AllocationFailure(format!("Entry size {size} exceeds address space")))?;
        data.try_reserve_exact(capacity).map_err(|err| {
            Error::AllocationFailure(format!("Failed to allocate {capacity} bytes: {err}"))
        })?;
    }

    let mut reader = LimitedReader::new(session.data_reader()).limits(limits, total);
    reader.read_to_end(&mut data).map_err(Error::from_io)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryType;

    fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in entries {
            let mut header = tar::Header::new_ustar();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_extract_all() {
        let data = tar_bytes(&[("a.txt", b"alpha"), ("b.txt", b"beta")]);
        let entries = extract_all(data, ExtractOptions::default()).unwrap();
        let names: Vec<_> = entries.iter().map(ExtractedEntry::path).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(entries[1].data, b"beta");
    }

    #[test]
    fn test_open_failure_is_immediate() {
        let err = extract(Vec::new(), ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(msg) if msg == "Unrecognized archive format"));
    }

    #[test]
    fn test_dot_dir_is_skipped() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_ustar();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        builder.append_data(&mut header, "./", std::io::empty()).unwrap();
        let mut header = tar::Header::new_ustar();
        header.set_size(1);
        header.set_mode(0o644);
        builder.append_data(&mut header, "./x", &b"x"[..]).unwrap();
        let data = builder.into_inner().unwrap();

        let entries = extract_all(data.clone(), ExtractOptions::default()).unwrap();
        assert_eq!(entries.len(), 1);

        let entries = extract_all(data, ExtractOptions::default().ignore_dot_dir(false)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry.entry_type, Some(EntryType::Directory));
    }

    #[test]
    fn test_entry_size_limit() {
        let data = tar_bytes(&[("big", &[0u8; 4096])]);
        let options = ExtractOptions::default().limits(ResourceLimits::default().max_entry_size(1024));
        let err = extract_all(data, options).unwrap_err();
        assert!(matches!(err, Error::ResourceLimitExceeded(_)));
    }

    #[test]
    fn test_total_size_limit() {
        let data = tar_bytes(&[("a", &[1u8; 600]), ("b", &[2u8; 600])]);
        let options = ExtractOptions::default().limits(ResourceLimits::default().max_total_size(1000));
        let mut iter = extract(data, options).unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(matches!(iter.next(), Some(Err(Error::ResourceLimitExceeded(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_entry_count_limit() {
        let data = tar_bytes(&[("a", b"1"), ("b", b"2"), ("c", b"3")]);
        let options = ExtractOptions::default().limits(ResourceLimits::default().max_entries(2));
        let results: Vec<_> = extract(data, options).unwrap().collect();
        assert_eq!(results.len(), 3);
        assert!(results[2].is_err());
    }

    #[test]
    fn test_recursive_expands_nested_tar() {
        let inner = tar_bytes(&[("inner.txt", b"deep")]);
        let outer = tar_bytes(&[("plain.txt", b"top"), ("nested.tar", &inner)]);

        let flat = extract_all(outer.clone(), ExtractOptions::default()).unwrap();
        assert_eq!(flat.len(), 2);

        let entries = extract_all(outer, ExtractOptions::default().recursive(true)).unwrap();
        let names: Vec<_> = entries.iter().map(ExtractedEntry::path).collect();
        assert_eq!(names, ["plain.txt", "nested.tar/inner.txt"]);
        assert_eq!(entries[1].data, b"deep");
    }

    #[test]
    fn test_recursion_limit() {
        let mut data = tar_bytes(&[("leaf.txt", b"leaf")]);
        for level in 0..3 {
            data = tar_bytes(&[(&format!("level{level}.tar"), &data)]);
        }
        let options = ExtractOptions::default().recursive(true).recursion_limit(1);
        let err = extract_all(data.clone(), options).unwrap_err();
        assert!(matches!(err, Error::ResourceLimitExceeded(_)));

        let entries = extract_all(data, ExtractOptions::default().recursive(true)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].path(),
            "level2.tar/level1.tar/level0.tar/leaf.txt"
        );
    }
}
