//! Entry metadata.

use std::fmt;

use crate::timestamp::Timestamp;

/// Mask selecting the file-type bits of a Unix mode.
pub const FILE_TYPE_MASK: u32 = 0o170_000;

/// Mask selecting the permission bits of a Unix mode.
pub const PERMISSION_MASK: u32 = 0o7777;

/// Kind of filesystem object an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link; see [`Entry::symlink`].
    Symlink,
    /// Hard link to an earlier entry; see [`Entry::hardlink`].
    HardLink,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
    /// Named pipe.
    Fifo,
    /// Unix domain socket.
    Socket,
}

impl EntryType {
    /// Decodes the file-type bits of a Unix mode.
    ///
    /// Hard links have no mode representation and are never returned.
    pub const fn from_mode(mode: u32) -> Option<Self> {
        match mode & FILE_TYPE_MASK {
            0o100_000 => Some(Self::File),
            0o040_000 => Some(Self::Directory),
            0o120_000 => Some(Self::Symlink),
            0o020_000 => Some(Self::CharDevice),
            0o060_000 => Some(Self::BlockDevice),
            0o010_000 => Some(Self::Fifo),
            0o140_000 => Some(Self::Socket),
            _ => None,
        }
    }

    /// Returns the file-type bits of a Unix mode.
    ///
    /// Hard links report the bits of a regular file.
    pub const fn mode_bits(self) -> u32 {
        match self {
            Self::File | Self::HardLink => 0o100_000,
            Self::Directory => 0o040_000,
            Self::Symlink => 0o120_000,
            Self::CharDevice => 0o020_000,
            Self::BlockDevice => 0o060_000,
            Self::Fifo => 0o010_000,
            Self::Socket => 0o140_000,
        }
    }

    /// Returns the conventional upper-case name (`FILE`, `DIR`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            Self::File => "FILE",
            Self::Directory => "DIR",
            Self::Symlink => "SYMBOLIC_LINK",
            Self::HardLink => "HARD_LINK",
            Self::CharDevice => "CHARACTER_DEVICE",
            Self::BlockDevice => "BLOCK_DEVICE",
            Self::Fifo => "NAMED_PIPE",
            Self::Socket => "SOCKET",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata of one archive member.
///
/// A session owns a single `Entry` slot that every successful advance
/// overwrites; the cursor hands out borrowed views of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Entry {
    /// Path inside the archive, `/`-separated.
    pub path: String,
    /// Declared size of the data, if the format records one.
    pub size: Option<u64>,
    /// Kind of object, if known.
    pub entry_type: Option<EntryType>,
    /// Permission bits (`mode & 0o7777`).
    pub permissions: u32,
    /// Target of a symbolic link.
    pub symlink: Option<String>,
    /// Target of a hard link.
    pub hardlink: Option<String>,
    /// Owner user id.
    pub uid: Option<u64>,
    /// Owner group id.
    pub gid: Option<u64>,
    /// Last access time.
    pub accessed: Option<Timestamp>,
    /// Last modification time.
    pub modified: Option<Timestamp>,
    /// Last status change time.
    pub changed: Option<Timestamp>,
    /// Creation time.
    pub created: Option<Timestamp>,
    /// Whether the entry data is encrypted.
    pub encrypted: bool,
}

impl Entry {
    /// Creates an entry with only a path set.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Resets every field.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns the full Unix mode (file-type bits and permissions).
    pub fn mode(&self) -> u32 {
        let type_bits = self.entry_type.map_or(0, EntryType::mode_bits);
        type_bits | (self.permissions & PERMISSION_MASK)
    }

    /// Returns true if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.entry_type == Some(EntryType::Directory)
    }

    /// Returns true if this entry is a regular file.
    pub fn is_file(&self) -> bool {
        self.entry_type == Some(EntryType::File)
    }

    /// Returns the symlink or hardlink target, whichever is set.
    pub fn link(&self) -> Option<&str> {
        self.symlink.as_deref().or(self.hardlink.as_deref())
    }

    /// Returns true for the `.` root entry some archivers emit.
    pub fn is_dot_dir(&self) -> bool {
        self.is_dir() && matches!(self.path.as_str(), "." | "./")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_from_mode() {
        assert_eq!(EntryType::from_mode(0o100_644), Some(EntryType::File));
        assert_eq!(EntryType::from_mode(0o040_755), Some(EntryType::Directory));
        assert_eq!(EntryType::from_mode(0o120_777), Some(EntryType::Symlink));
        assert_eq!(EntryType::from_mode(0o644), None);
    }

    #[test]
    fn test_mode_combines_type_and_permissions() {
        let mut entry = Entry::new("bin/tool");
        entry.entry_type = Some(EntryType::File);
        entry.permissions = 0o755;
        assert_eq!(entry.mode(), 0o100_755);

        entry.entry_type = None;
        assert_eq!(entry.mode(), 0o755);
    }

    #[test]
    fn test_entry_type_names() {
        assert_eq!(EntryType::File.to_string(), "FILE");
        assert_eq!(EntryType::Directory.to_string(), "DIR");
        assert_eq!(EntryType::Symlink.to_string(), "SYMBOLIC_LINK");
    }

    #[test]
    fn test_dot_dir() {
        let mut entry = Entry::new("./");
        entry.entry_type = Some(EntryType::Directory);
        assert!(entry.is_dot_dir());

        entry.path = "docs/".into();
        assert!(!entry.is_dot_dir());

        let file = Entry::new(".");
        assert!(!file.is_dot_dir());
    }

    #[test]
    fn test_clear() {
        let mut entry = Entry::new("a.txt");
        entry.size = Some(10);
        entry.encrypted = true;
        entry.clear();
        assert_eq!(entry, Entry::default());
    }

    #[test]
    fn test_link_prefers_symlink() {
        let mut entry = Entry::new("link");
        entry.hardlink = Some("target".into());
        assert_eq!(entry.link(), Some("target"));
        entry.symlink = Some("other".into());
        assert_eq!(entry.link(), Some("other"));
    }
}
