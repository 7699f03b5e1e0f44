//! The capability surface a session drives.
//!
//! A session never decodes anything itself. It talks to an [`Engine`]
//! through a small, C-flavoured protocol: every call reports a
//! [`ReturnCode`], and failures leave an [`EngineError`] behind that the
//! caller may inspect, replace or clear. [`MemoryEngine`] is the engine this
//! crate ships; tests and embedders can supply their own.
//!
//! # Protocol
//!
//! | Call | Success | Failure |
//! |------|---------|---------|
//! | [`Engine::open_memory`] | `Ok` / `Warn` | `Retry` / `Fatal` |
//! | [`Engine::next_header`] | `Ok` / `Warn` / `Eof` | `Retry` / `Fatal` |
//! | [`Engine::read_data`] | `Ok(n)`, `n == 0` at end of entry | `Err(code)` |
//!
//! Once an engine has returned `Fatal` it is expected to keep returning
//! `Fatal` from every further call.

pub mod memory;
mod raw;
mod tar;
#[cfg(feature = "zip")]
mod zip;

use std::fmt;
use std::sync::Arc;

use crate::entry::Entry;
use crate::format::{FilterKind, FormatKind};
use crate::passphrase::Passphrase;

pub use memory::MemoryEngine;

/// Result of a single engine call.
///
/// The numeric values match the classic libarchive codes so that they can be
/// passed through a C boundary unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    /// The call succeeded.
    Ok,
    /// No more entries.
    Eof,
    /// A transient condition; the same call may succeed if repeated.
    Retry,
    /// The call succeeded, but something worth reporting happened.
    Warn,
    /// The current operation failed; the engine may still be usable.
    Failed,
    /// The engine is unusable from now on.
    Fatal,
}

impl ReturnCode {
    /// Returns the raw integer code.
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Eof => 1,
            Self::Retry => -10,
            Self::Warn => -20,
            Self::Failed => -25,
            Self::Fatal => -30,
        }
    }

    /// Parses a raw integer code.
    pub const fn from_raw(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Eof),
            -10 => Some(Self::Retry),
            -20 => Some(Self::Warn),
            -25 => Some(Self::Failed),
            -30 => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Returns `true` for `Ok` and `Warn`.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Warn)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::Eof => "eof",
            Self::Retry => "retry",
            Self::Warn => "warn",
            Self::Failed => "failed",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Category of the error an engine recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Unclassified failure.
    Misc,
    /// The input is not a valid instance of any enabled format.
    FileFormat,
    /// The engine was driven out of protocol order.
    Programmer,
    /// A passphrase is missing or wrong.
    Passphrase,
    /// A buffer could not be allocated.
    OutOfMemory,
    /// Reading the underlying stream failed.
    Io,
}

impl ErrorCode {
    /// Returns the errno-style integer exposed at the C boundary.
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Misc => -1,
            Self::FileFormat => 84,
            Self::Programmer => 22,
            Self::Passphrase => -1,
            Self::OutOfMemory => 12,
            Self::Io => 5,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Misc => "misc",
            Self::FileFormat => "file format",
            Self::Programmer => "programmer",
            Self::Passphrase => "passphrase",
            Self::OutOfMemory => "out of memory",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

/// The error an engine leaves behind after a failing or warning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// Error category.
    pub code: ErrorCode,
    /// Human-readable description; may be empty.
    pub message: String,
}

impl EngineError {
    /// Creates an engine error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Decoding engine driven by a [`Session`](crate::Session).
///
/// Dropping the engine releases everything it holds.
pub trait Engine {
    /// Enables a container format. Must be called before [`open_memory`](Self::open_memory).
    fn enable_format(&mut self, format: FormatKind) -> ReturnCode;

    /// Enables a compression filter. Must be called before [`open_memory`](Self::open_memory).
    fn enable_filter(&mut self, filter: FilterKind) -> ReturnCode;

    /// Registers a passphrase to try on encrypted entries.
    fn add_passphrase(&mut self, passphrase: &Passphrase) -> ReturnCode;

    /// Reports whether the opened input holds encrypted entries.
    ///
    /// Engines that cannot know yet return `false`.
    fn has_encrypted_entries(&self) -> bool;

    /// Opens the engine over an in-memory buffer.
    fn open_memory(&mut self, data: Arc<[u8]>) -> ReturnCode;

    /// Advances to the next entry, overwriting `entry` with its metadata.
    fn next_header(&mut self, entry: &mut Entry) -> ReturnCode;

    /// Copies decoded bytes of the current entry into `buf`.
    ///
    /// Returns the number of bytes produced; `Ok(0)` marks the end of the
    /// entry's data.
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, ReturnCode>;

    /// Returns the last recorded error, if any.
    fn error(&self) -> Option<&EngineError>;

    /// Forgets the last recorded error.
    fn clear_error(&mut self);

    /// Replaces the last recorded error.
    fn set_error(&mut self, code: ErrorCode, message: String);

    /// Returns the last error message if there is a non-empty one.
    fn error_message(&self) -> Option<&str> {
        self.error()
            .map(|err| err.message.as_str())
            .filter(|message| !message.is_empty())
    }
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn enable_format(&mut self, format: FormatKind) -> ReturnCode {
        (**self).enable_format(format)
    }

    fn enable_filter(&mut self, filter: FilterKind) -> ReturnCode {
        (**self).enable_filter(filter)
    }

    fn add_passphrase(&mut self, passphrase: &Passphrase) -> ReturnCode {
        (**self).add_passphrase(passphrase)
    }

    fn has_encrypted_entries(&self) -> bool {
        (**self).has_encrypted_entries()
    }

    fn open_memory(&mut self, data: Arc<[u8]>) -> ReturnCode {
        (**self).open_memory(data)
    }

    fn next_header(&mut self, entry: &mut Entry) -> ReturnCode {
        (**self).next_header(entry)
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, ReturnCode> {
        (**self).read_data(buf)
    }

    fn error(&self) -> Option<&EngineError> {
        (**self).error()
    }

    fn clear_error(&mut self) {
        (**self).clear_error()
    }

    fn set_error(&mut self, code: ErrorCode, message: String) {
        (**self).set_error(code, message)
    }
}
