//! Extraction to the filesystem.
//!
//! [`extract_to`] writes every entry of an in-memory archive below a
//! destination directory:
//!
//! - directories are created, their permissions and times applied last
//! - files are created with `create_new`, so existing files are never
//!   overwritten
//! - symbolic links are created as-is (Unix only)
//! - hard links are created after everything else, pointing at entries
//!   extracted earlier
//!
//! Entries whose path would leave the destination, symbolic links whose
//! target would, and entry types that cannot be represented (devices, FIFOs,
//! sockets) are skipped with a warning.
//!
//! # Example
//!
//! ```rust,no_run
//! use archive_bridge::ExtractOptions;
//! use archive_bridge::fs::extract_to;
//!
//! # fn main() -> archive_bridge::Result<()> {
//! let bytes = std::fs::read("archive.tar.gz")?;
//! let summary = extract_to(bytes, "out", &ExtractOptions::default())?;
//! println!("{} files written", summary.files);
//! # Ok(())
//! # }
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filetime::FileTime;

use crate::entry::{Entry, EntryType};
use crate::extract::{ExtractOptions, extract};
use crate::safety::{PathSafety, validate_extract_path, validate_symlink_target};
use crate::{Error, Result};

/// What [`extract_to`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Regular files written.
    pub files: usize,
    /// Directories created.
    pub directories: usize,
    /// Symbolic links created.
    pub symlinks: usize,
    /// Hard links created.
    pub hardlinks: usize,
    /// Entries skipped with a warning.
    pub skipped: usize,
    /// Bytes of file data written.
    pub bytes_written: u64,
}

struct PendingLink {
    index: usize,
    path: PathBuf,
    entry: Entry,
}

/// Extracts `data` below `dest`, which must be an existing directory.
pub fn extract_to(
    data: impl Into<Arc<[u8]>>,
    dest: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    let dest = dest.as_ref();
    if !dest.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Output path isn't a valid directory: {}", dest.display()),
        )));
    }

    let mut summary = ExtractSummary::default();
    let mut directories = Vec::new();
    let mut hardlinks = Vec::new();

    for (index, extracted) in extract(data, options.clone())?.enumerate() {
        let extracted = extracted?;
        let entry = extracted.entry;
        let path = match validate_extract_path(&entry.path, dest, options.path_safety, index) {
            Ok(path) => path,
            Err(err) if err.is_security_error() => {
                log::warn!("Entry has a path that goes outside the destination: {}, skipping", entry.path);
                summary.skipped += 1;
                continue;
            }
            Err(err) => return Err(err),
        };

        match entry.entry_type {
            Some(EntryType::Directory) => {
                fs::create_dir_all(&path)?;
                summary.directories += 1;
                directories.push((path, entry));
            }
            Some(EntryType::File) => {
                create_parent(&path)?;
                let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
                file.write_all(&extracted.data)?;
                drop(file);
                apply_permissions(&path, entry.permissions);
                apply_times(&path, &entry);
                summary.files += 1;
                summary.bytes_written += extracted.data.len() as u64;
            }
            Some(EntryType::Symlink) => {
                if create_symlink(&path, &entry, dest, options.path_safety, index)? {
                    summary.symlinks += 1;
                } else {
                    summary.skipped += 1;
                }
            }
            Some(EntryType::HardLink) => hardlinks.push(PendingLink { index, path, entry }),
            None if entry.hardlink.is_some() => hardlinks.push(PendingLink { index, path, entry }),
            other => {
                log::warn!(
                    "Unsupported entry type {} for {}, skipping",
                    other.map_or("unknown", EntryType::name),
                    entry.path
                );
                summary.skipped += 1;
            }
        }
    }

    for link in hardlinks {
        if create_hardlink(&link, dest, options.path_safety)? {
            summary.hardlinks += 1;
        } else {
            summary.skipped += 1;
        }
    }

    // Deepest first, so restoring a parent's mtime comes after its children.
    for (path, entry) in directories.iter().rev() {
        apply_permissions(path, entry.permissions);
        apply_times(path, entry);
    }

    log::debug!("extracted to {}: {:?}", dest.display(), summary);
    Ok(summary)
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

fn create_symlink(
    path: &Path,
    entry: &Entry,
    dest: &Path,
    policy: PathSafety,
    index: usize,
) -> Result<bool> {
    let Some(target) = entry.symlink.as_deref().filter(|target| !target.is_empty()) else {
        log::warn!("Invalid symlink: {}, skipping", entry.path);
        return Ok(false);
    };
    if policy == PathSafety::Strict {
        if let Err(err) = validate_symlink_target(path, target, dest, index) {
            log::warn!("{err}, skipping");
            return Ok(false);
        }
    }
    create_parent(path)?;
    symlink(target, path)?;
    if let Some(mtime) = entry.modified {
        let atime = entry.accessed.unwrap_or(mtime);
        if let Err(e) = filetime::set_symlink_file_times(path, atime.as_file_time(), mtime.as_file_time()) {
            log::warn!("Failed to set times on '{}': {}", path.display(), e);
        }
    }
    Ok(true)
}

#[cfg(unix)]
fn symlink(target: &str, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(not(unix))]
fn symlink(_target: &str, path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("symbolic links are not supported here: {}", path.display()),
    ))
}

fn create_hardlink(link: &PendingLink, dest: &Path, policy: PathSafety) -> Result<bool> {
    let Some(target) = link.entry.hardlink.as_deref().filter(|target| !target.is_empty()) else {
        log::warn!("Invalid hardlink: {}, skipping", link.entry.path);
        return Ok(false);
    };
    let target_path = match validate_extract_path(target, dest, policy, link.index) {
        Ok(path) => path,
        Err(err) if err.is_security_error() => {
            log::warn!("Hardlink {} points outside the destination, skipping", link.entry.path);
            return Ok(false);
        }
        Err(err) => return Err(err),
    };
    if !target_path.is_file() {
        return Err(Error::EntryNotFound {
            path: target.to_string(),
        });
    }
    create_parent(&link.path)?;
    fs::hard_link(&target_path, &link.path)?;
    apply_permissions(&link.path, link.entry.permissions);
    apply_times(&link.path, &link.entry);
    Ok(true)
}

#[cfg(unix)]
fn apply_permissions(path: &Path, permissions: u32) {
    use std::os::unix::fs::PermissionsExt;

    if permissions == 0 {
        return;
    }
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(permissions)) {
        log::warn!("Failed to set permissions on '{}': {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn apply_permissions(path: &Path, permissions: u32) {
    if permissions != 0 && permissions & 0o222 == 0 {
        if let Ok(metadata) = fs::metadata(path) {
            let mut perms = metadata.permissions();
            perms.set_readonly(true);
            if let Err(e) = fs::set_permissions(path, perms) {
                log::warn!("Failed to set read-only attribute on '{}': {}", path.display(), e);
            }
        }
    }
}

fn apply_times(path: &Path, entry: &Entry) {
    let Some(mtime) = entry.modified else {
        return;
    };
    let atime: FileTime = entry.accessed.unwrap_or(mtime).as_file_time();
    if let Err(e) = filetime::set_file_times(path, atime, mtime.as_file_time()) {
        log::warn!("Failed to set times on '{}': {}", path.display(), e);
    }
}
