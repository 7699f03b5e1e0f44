//! The status channel.
//!
//! Every session operation overwrites a single [`Status`] record instead of
//! returning an error. The record holds the outcome kind, an optional
//! message, and an optional integer side value (the byte count of the last
//! successful read), so a caller that can only receive one return value per
//! call still learns everything it needs by querying the status afterwards.

use std::fmt;

use crate::engine::ErrorCode;
use crate::error::Error;

/// Outcome of the last session operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// The operation succeeded.
    Ok,
    /// The operation succeeded after the engine reported (and the session
    /// logged and cleared) a warning.
    Warned,
    /// The archive is encrypted and no passphrase was supplied. Sticky.
    PassphraseRequired,
    /// A read buffer could not be allocated. The session stays usable.
    OutOfMemory,
    /// The engine failed unrecoverably. Sticky.
    Fatal,
    /// There are no more entries.
    EndOfStream,
}

impl StatusKind {
    /// Returns the integer exposed at the C boundary.
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Warned => 1,
            Self::PassphraseRequired => 2,
            Self::OutOfMemory => 3,
            Self::Fatal => 4,
            Self::EndOfStream => 5,
        }
    }

    /// Returns a short lower-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warned => "warned",
            Self::PassphraseRequired => "passphrase required",
            Self::OutOfMemory => "out of memory",
            Self::Fatal => "fatal",
            Self::EndOfStream => "end of stream",
        }
    }

    /// Returns true for kinds that report a failed operation.
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::PassphraseRequired | Self::OutOfMemory | Self::Fatal)
    }

    /// Returns true for kinds after which the session refuses further work.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::PassphraseRequired | Self::Fatal)
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The status record a session keeps about its last operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    kind: StatusKind,
    message: Option<String>,
    value: Option<u64>,
    code: Option<ErrorCode>,
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl Status {
    /// Plain success.
    pub const fn ok() -> Self {
        Self {
            kind: StatusKind::Ok,
            message: None,
            value: None,
            code: None,
        }
    }

    /// Success after an absorbed warning.
    pub const fn warned() -> Self {
        Self {
            kind: StatusKind::Warned,
            message: None,
            value: None,
            code: None,
        }
    }

    /// No more entries.
    pub const fn end_of_stream() -> Self {
        Self {
            kind: StatusKind::EndOfStream,
            message: None,
            value: None,
            code: None,
        }
    }

    /// A successful read that produced `count` bytes.
    pub const fn bytes_read(count: u64) -> Self {
        Self {
            kind: StatusKind::Ok,
            message: None,
            value: Some(count),
            code: None,
        }
    }

    /// A failed buffer allocation.
    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::OutOfMemory,
            message: Some(message.into()),
            value: None,
            code: Some(ErrorCode::OutOfMemory),
        }
    }

    /// A failure carrying the engine's error category and message.
    pub fn failure(kind: StatusKind, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            value: None,
            code: Some(code),
        }
    }

    /// Returns the outcome kind.
    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    /// Returns the message, if the outcome carries one.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the side value, if the outcome carries one.
    pub fn value(&self) -> Option<u64> {
        self.value
    }

    /// Returns the engine error category behind a failure.
    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    /// Returns true for `Ok` and `Warned`.
    pub fn is_ok(&self) -> bool {
        matches!(self.kind, StatusKind::Ok | StatusKind::Warned)
    }

    /// Returns true if the last operation failed.
    pub fn is_failure(&self) -> bool {
        self.kind.is_failure()
    }

    /// Converts a failure status into an [`Error`].
    ///
    /// Returns `None` for success and end-of-stream.
    pub fn to_error(&self) -> Option<Error> {
        let message = self.message.clone().unwrap_or_default();
        match self.kind {
            StatusKind::Ok | StatusKind::Warned | StatusKind::EndOfStream => None,
            StatusKind::PassphraseRequired => Some(Error::PasswordRequired),
            StatusKind::OutOfMemory => Some(Error::AllocationFailure(message)),
            StatusKind::Fatal => Some(match self.code {
                Some(ErrorCode::Passphrase) => Error::WrongPassword { entry_name: None },
                Some(ErrorCode::FileFormat) => Error::InvalidFormat(message),
                Some(ErrorCode::OutOfMemory) => Error::AllocationFailure(message),
                Some(code) => Error::Archive { code, message },
                None => Error::Archive {
                    code: ErrorCode::Misc,
                    message,
                },
            }),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(value) = self.value {
            write!(f, " ({value})")?;
        }
        Ok(())
    }
}
