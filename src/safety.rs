//! Safety and resource limit utilities.
//!
//! This module provides utilities for safe extraction including path
//! validation, resource limit enforcement, and compression bomb protection.

use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Error, Result};

/// Policy for validating extraction paths.
///
/// This enum controls how strictly entry paths are validated before they are
/// written below a destination directory. The default is `Strict`.
///
/// # Security
///
/// Path traversal attacks occur when an archive contains entries with paths
/// like `../../../etc/passwd` that could escape the intended extraction
/// directory. Always use `Strict` mode when extracting untrusted archives.
///
/// # Examples
///
/// ```rust
/// use archive_bridge::safety::PathSafety;
///
/// let policy = PathSafety::default();
/// assert_eq!(policy, PathSafety::Strict);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathSafety {
    /// Strict validation: block any potential path traversal.
    ///
    /// - Rejects paths containing `..` components
    /// - Rejects absolute paths
    /// - Verifies that resolved paths stay within the destination directory,
    ///   following symbolic links already on disk
    /// - Rejects symbolic links whose target leaves the destination
    #[default]
    Strict,
    /// Rejects `..` components and absolute paths without touching the
    /// filesystem. Symbolic link targets are not checked.
    Relaxed,
}

/// Validates an extraction path against the given safety policy.
///
/// # Arguments
///
/// * `entry_path` - The path stored in the archive entry
/// * `dest_root` - The destination directory for extraction
/// * `policy` - The path safety policy to enforce
/// * `entry_index` - The index of the entry being validated (for error reporting)
///
/// # Returns
///
/// The full path to extract to, or an error if validation fails.
pub fn validate_extract_path(
    entry_path: &str,
    dest_root: &Path,
    policy: PathSafety,
    entry_index: usize,
) -> Result<PathBuf> {
    let traversal = || Error::PathTraversal {
        entry_index,
        path: entry_path.to_string(),
    };

    let relative = Path::new(entry_path);
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(traversal());
            }
        }
    }
    // Windows-style separators are not split by `components` on unix.
    if entry_path.split(['/', '\\']).any(|part| part == "..") {
        return Err(traversal());
    }

    let full_path = dest_root.join(relative);
    if full_path == dest_root {
        return Err(traversal());
    }

    match policy {
        PathSafety::Relaxed => Ok(full_path),
        PathSafety::Strict => {
            // The destination root must be canonicalizable; propagate the IO error if not.
            let canonical_dest = dest_root.canonicalize()?;
            let resolved = resolve_existing_prefix(&full_path)?;
            if !resolved.starts_with(&canonical_dest) || resolved == canonical_dest {
                return Err(traversal());
            }
            Ok(full_path)
        }
    }
}

/// Validates that a symbolic link target stays inside the destination.
///
/// The target is interpreted relative to the directory holding the link.
/// Absolute targets are always rejected.
pub fn validate_symlink_target(
    link_path: &Path,
    target: &str,
    dest_root: &Path,
    entry_index: usize,
) -> Result<()> {
    let escape = || Error::SymlinkTargetEscape {
        entry_index,
        path: link_path.display().to_string(),
        target: target.to_string(),
    };

    let target = Path::new(target);
    if target.is_absolute() {
        return Err(escape());
    }
    let relative = link_path.strip_prefix(dest_root).map_err(|_| escape())?;

    // Depth below dest_root of the directory holding the link.
    let mut depth = relative.components().count().saturating_sub(1) as isize;
    for component in target.components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
        if depth < 0 {
            return Err(escape());
        }
    }
    Ok(())
}

/// Canonicalizes the deepest existing ancestor of `path` and appends the
/// components that do not exist yet.
fn resolve_existing_prefix(path: &Path) -> io::Result<PathBuf> {
    let mut ancestor = path;
    let mut missing = Vec::new();
    while !ancestor.exists() {
        match (ancestor.file_name(), ancestor.parent()) {
            (Some(name), Some(parent)) if !parent.as_os_str().is_empty() => {
                missing.push(name.to_os_string());
                ancestor = parent;
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no existing ancestor for {}", path.display()),
                ));
            }
        }
    }
    let mut resolved = ancestor.canonicalize()?;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Limits applied while decoding an archive.
///
/// # Examples
///
/// ```rust
/// use archive_bridge::ResourceLimits;
///
/// let limits = ResourceLimits::default()
///     .max_entries(1_000)
///     .max_entry_size(16 * 1024 * 1024);
/// assert_eq!(limits.max_entries, 1_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum number of entries, nested archives included.
    pub max_entries: usize,
    /// Maximum decoded size of a single entry.
    pub max_entry_size: u64,
    /// Maximum decoded size of all entries together.
    pub max_total_size: u64,
}

impl Default for ResourceLimits {
    /// Creates resource limits with the following default values:
    ///
    /// | Limit | Default Value |
    /// |-------|---------------|
    /// | `max_entries` | 1,000,000 |
    /// | `max_entry_size` | 1 GiB |
    /// | `max_total_size` | 4 GiB |
    fn default() -> Self {
        Self {
            max_entries: 1_000_000,
            max_entry_size: 1 << 30,
            max_total_size: 4 << 30,
        }
    }
}

impl ResourceLimits {
    /// Creates new resource limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates resource limits with no restrictions.
    pub fn unlimited() -> Self {
        Self {
            max_entries: usize::MAX,
            max_entry_size: u64::MAX,
            max_total_size: u64::MAX,
        }
    }

    /// Sets the maximum number of entries.
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Sets the maximum size of a single entry.
    pub fn max_entry_size(mut self, max: u64) -> Self {
        self.max_entry_size = max;
        self
    }

    /// Sets the maximum total size.
    pub fn max_total_size(mut self, max: u64) -> Self {
        self.max_total_size = max;
        self
    }
}

/// A reader wrapper that enforces resource limits during extraction.
///
/// This wrapper tracks bytes read and checks against configured limits,
/// providing protection against compression bombs and runaway extractions.
pub struct LimitedReader<R> {
    inner: R,
    /// Maximum bytes this entry can produce.
    max_entry_bytes: u64,
    /// Bytes read from this entry so far.
    bytes_read: u64,
    /// Shared counter for total bytes across all entries.
    total_tracker: Option<Arc<AtomicU64>>,
    /// Maximum total bytes.
    max_total_bytes: u64,
}

impl<R> LimitedReader<R> {
    /// Creates a new limited reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_entry_bytes: u64::MAX,
            bytes_read: 0,
            total_tracker: None,
            max_total_bytes: u64::MAX,
        }
    }

    /// Sets the maximum bytes for this entry.
    pub fn max_entry_bytes(mut self, max: u64) -> Self {
        self.max_entry_bytes = max;
        self
    }

    /// Sets a shared tracker for total bytes.
    pub fn total_tracker(mut self, tracker: Arc<AtomicU64>, max_total: u64) -> Self {
        self.total_tracker = Some(tracker);
        self.max_total_bytes = max_total;
        self
    }

    /// Applies both limits of a [`ResourceLimits`].
    pub fn limits(self, limits: &ResourceLimits, tracker: Arc<AtomicU64>) -> Self {
        self.max_entry_bytes(limits.max_entry_size)
            .total_tracker(tracker, limits.max_total_size)
    }

    /// Returns the number of bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Returns the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            return Ok(0);
        }

        self.bytes_read += n as u64;

        if self.bytes_read > self.max_entry_bytes {
            return Err(io::Error::other(Error::ResourceLimitExceeded(format!(
                "Entry size {} exceeds limit {}",
                self.bytes_read, self.max_entry_bytes
            ))));
        }

        if let Some(ref tracker) = self.total_tracker {
            let total = tracker.fetch_add(n as u64, Ordering::Relaxed) + n as u64;
            if total > self.max_total_bytes {
                return Err(io::Error::other(Error::ResourceLimitExceeded(format!(
                    "Total extracted size {} exceeds limit {}",
                    total, self.max_total_bytes
                ))));
            }
        }

        Ok(n)
    }
}

impl<R> std::fmt::Debug for LimitedReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitedReader")
            .field("max_entry_bytes", &self.max_entry_bytes)
            .field("bytes_read", &self.bytes_read)
            .field("max_total_bytes", &self.max_total_bytes)
            .finish_non_exhaustive()
    }
}
