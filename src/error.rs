//! Error types for archive decoding.
//!
//! The session layer never returns `Result`: it records a
//! [`Status`](crate::Status) after every call. This module provides the
//! [`Error`] enum that the higher-level APIs ([`extract`](crate::extract),
//! [`fs::extract_to`](crate::fs::extract_to)) use instead, along with a
//! convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! ```rust,no_run
//! use archive_bridge::{extract_all, Error, ExtractOptions};
//!
//! fn list(bytes: Vec<u8>) -> archive_bridge::Result<()> {
//!     match extract_all(bytes, ExtractOptions::default()) {
//!         Ok(entries) => {
//!             for entry in entries {
//!                 println!("{} ({} bytes)", entry.path(), entry.data.len());
//!             }
//!             Ok(())
//!         }
//!         Err(Error::PasswordRequired) => {
//!             eprintln!("This archive is encrypted. Please provide a passphrase.");
//!             Err(Error::PasswordRequired)
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use std::io;

use crate::engine::ErrorCode;

/// Helper struct for formatting WrongPassword error messages.
struct WrongPasswordDisplay<'a> {
    entry_name: Option<&'a str>,
}

impl std::fmt::Display for WrongPasswordDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Incorrect passphrase")?;
        match self.entry_name {
            Some(name) => write!(f, " for entry '{}'", name),
            None => Ok(()),
        }
    }
}

/// The main error type for archive decoding.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | File system operations |
/// | Format | [`InvalidFormat`][Self::InvalidFormat], [`Archive`][Self::Archive] | Invalid archive data |
/// | Encryption | [`PasswordRequired`][Self::PasswordRequired], [`WrongPassword`][Self::WrongPassword] | Missing or wrong passphrase |
/// | Security | [`PathTraversal`][Self::PathTraversal], [`SymlinkTargetEscape`][Self::SymlinkTargetEscape] | Hostile entry paths |
/// | Resources | [`AllocationFailure`][Self::AllocationFailure], [`ResourceLimitExceeded`][Self::ResourceLimitExceeded] | Memory and safety limits |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    ///
    /// Returned by [`fs::extract_to`](crate::fs::extract_to) when writing
    /// below the destination directory fails.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not a valid instance of any enabled format.
    ///
    /// The string carries the engine's description, e.g.
    /// `Unrecognized archive format` for an empty or unknown buffer.
    #[error("Invalid archive format: {0}")]
    InvalidFormat(String),

    /// The engine failed for a reason not covered by a dedicated variant.
    #[error("Archive error ({code}): {message}")]
    Archive {
        /// The engine's error category.
        code: ErrorCode,
        /// The engine's message.
        message: String,
    },

    /// The archive holds encrypted entries and no passphrase was provided.
    ///
    /// # Recovery
    ///
    /// ```rust,no_run
    /// use archive_bridge::{extract_all, Error, ExtractOptions};
    ///
    /// fn open(bytes: Vec<u8>) -> archive_bridge::Result<usize> {
    ///     match extract_all(bytes.clone(), ExtractOptions::default()) {
    ///         Err(Error::PasswordRequired) => {
    ///             let options = ExtractOptions::default().passphrase("secret");
    ///             Ok(extract_all(bytes, options)?.len())
    ///         }
    ///         other => Ok(other?.len()),
    ///     }
    /// }
    /// ```
    #[error("password required for encrypted archive")]
    PasswordRequired,

    /// The supplied passphrase does not decrypt an entry.
    ///
    /// **Note:** If no passphrase was provided at all,
    /// [`Error::PasswordRequired`] is returned instead.
    #[error("{}", WrongPasswordDisplay { entry_name: entry_name.as_deref() })]
    WrongPassword {
        /// The entry the passphrase was rejected for (if known).
        entry_name: Option<String>,
    },

    /// A read buffer could not be allocated.
    ///
    /// Either the requested size exceeds what the platform can address or
    /// the allocator refused the request.
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    /// A resource limit was exceeded.
    ///
    /// This error protects against malicious archives (e.g., "zip bombs")
    /// that decompress to extremely large sizes, and against unbounded
    /// nesting when extracting recursively.
    ///
    /// ```rust
    /// use archive_bridge::ResourceLimits;
    ///
    /// let limits = ResourceLimits::default()
    ///     .max_entries(10_000)
    ///     .max_total_size(256 * 1024 * 1024);
    /// ```
    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// Path traversal attack detected in an archive entry.
    ///
    /// This is a **security error** indicating the archive contains paths
    /// designed to escape the extraction directory (e.g., `../../etc/passwd`).
    #[error("Path traversal detected in entry {entry_index}: {path}")]
    PathTraversal {
        /// The entry index with path traversal.
        entry_index: usize,
        /// The path that contains traversal.
        path: String,
    },

    /// A symbolic link target escapes the extraction directory.
    #[error(
        "Symbolic link target escapes extraction directory at entry {entry_index}: {path} -> {target}"
    )]
    SymlinkTargetEscape {
        /// The entry index containing the symlink.
        entry_index: usize,
        /// The path of the symlink entry.
        path: String,
        /// The target path that escapes the extraction directory.
        target: String,
    },

    /// A hard link points at an entry that was never extracted.
    #[error("Entry not found: {path}")]
    EntryNotFound {
        /// The path that was not found.
        path: String,
    },
}

impl Error {
    /// Returns `true` if this error indicates a security issue.
    pub fn is_security_error(&self) -> bool {
        matches!(
            self,
            Error::PathTraversal { .. } | Error::SymlinkTargetEscape { .. }
        )
    }

    /// Returns `true` if this error might be recoverable.
    ///
    /// - `WrongPassword` / `PasswordRequired`: retry with a (different) passphrase
    /// - `AllocationFailure`: retry with a smaller read size
    /// - `Io` (transient kinds only): retry may succeed for `WouldBlock`, `Interrupted`, `TimedOut`
    ///
    /// `ResourceLimitExceeded` is not recoverable: the archive is likely a
    /// compression bomb or exceeds user-defined limits.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::WrongPassword { .. } => true,
            Error::PasswordRequired => true,
            Error::AllocationFailure(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if this is an encryption-related error.
    pub fn is_encryption_error(&self) -> bool {
        matches!(
            self,
            Error::WrongPassword { .. } | Error::PasswordRequired
        )
    }

    /// Returns the entry index associated with this error, if any.
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            Error::PathTraversal { entry_index, .. } => Some(*entry_index),
            Error::SymlinkTargetEscape { entry_index, .. } => Some(*entry_index),
            _ => None,
        }
    }

    /// Returns the entry name/path associated with this error, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Error::WrongPassword { entry_name, .. } => entry_name.as_deref(),
            Error::PathTraversal { path, .. } => Some(path.as_str()),
            Error::SymlinkTargetEscape { path, .. } => Some(path.as_str()),
            Error::EntryNotFound { path } => Some(path.as_str()),
            _ => None,
        }
    }

    /// Attaches an entry name to errors that carry one but do not know it yet.
    pub(crate) fn with_entry_name(mut self, name: &str) -> Self {
        if let Error::WrongPassword { entry_name } = &mut self {
            if entry_name.is_none() {
                *entry_name = Some(name.to_string());
            }
        }
        self
    }

    /// Recovers an [`Error`] that travelled through an [`io::Error`].
    pub(crate) fn from_io(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(err) = inner.downcast::<Error>() {
                    return *err;
                }
            }
            return Error::Archive {
                code: ErrorCode::Io,
                message: "I/O error lost its payload".into(),
            };
        }
        Error::Io(err)
    }
}

/// A specialized Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
