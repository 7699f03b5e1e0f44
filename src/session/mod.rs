//! Decoding sessions.
//!
//! A [`Session`] wraps one [`Engine`] opened over one in-memory buffer and
//! turns the engine's return-code protocol into three operations that never
//! fail loudly:
//!
//! - [`Session::advance`] moves to the next entry ([`cursor`](self::Advance))
//! - [`Session::read_data`] pulls decoded bytes of the current entry
//! - [`Session::status`] reports how the last operation went
//!
//! Every operation overwrites the session's [`Status`]. A transient `Retry`
//! from the engine is absorbed once, warnings are logged and cleared, and a
//! fatal result leaves the session permanently failed.
//!
//! # Example
//!
//! ```rust
//! use archive_bridge::{Session, SessionConfig, StatusKind};
//!
//! let session = Session::open(Vec::new(), &SessionConfig::default());
//! assert_eq!(session.status().kind(), StatusKind::Fatal);
//! assert_eq!(session.status().message(), Some("Unrecognized archive format"));
//! ```

mod cursor;
mod reader;
pub(crate) mod retry;

use std::sync::Arc;

pub use cursor::Advance;
pub use reader::DataReader;

use crate::engine::memory::DEFAULT_BUFFER_LIMIT;
use crate::engine::{Engine, ErrorCode, MemoryEngine, ReturnCode};
use crate::entry::Entry;
use crate::format::{FilterKind, FormatKind};
use crate::passphrase::Passphrase;
use crate::status::{Status, StatusKind};
use retry::retry_once;

/// Options applied when a session is opened.
///
/// # Example
///
/// ```rust
/// use archive_bridge::SessionConfig;
///
/// let config = SessionConfig::new()
///     .passphrase("secret")
///     .recursive(true)
///     .buffer_limit(64 * 1024 * 1024);
/// assert!(config.recursive);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Passphrase for encrypted entries. An empty passphrase counts as none.
    pub passphrase: Option<Passphrase>,
    /// Leave out formats prone to false-positive detection.
    ///
    /// Set this when the buffer is itself an entry of an outer archive.
    pub recursive: bool,
    /// Largest entry the engine may decode into memory at once.
    pub buffer_limit: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            passphrase: None,
            recursive: false,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
        }
    }
}

impl SessionConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the passphrase.
    pub fn passphrase(mut self, passphrase: impl Into<Passphrase>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Sets recursive mode.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Sets the in-memory entry limit.
    pub fn buffer_limit(mut self, limit: u64) -> Self {
        self.buffer_limit = limit;
        self
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The input was opened; entries may be iterated.
    Opened,
    /// Iteration reached the end of the archive.
    Exhausted,
    /// A fatal or passphrase-required failure occurred. Terminal.
    Failed,
}

/// A stateful decoding session over an in-memory archive.
pub struct Session<E: Engine = MemoryEngine> {
    engine: E,
    state: SessionState,
    status: Status,
    entry: Option<Entry>,
}

impl<E: Engine> std::fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("status", &self.status)
            .field("entry", &self.entry.as_ref().map(|entry| entry.path.as_str()))
            .finish_non_exhaustive()
    }
}

impl Session<MemoryEngine> {
    /// Opens a session over `data` with the bundled [`MemoryEngine`].
    ///
    /// A session is returned even when opening fails; inspect
    /// [`status`](Self::status) to find out.
    pub fn open(data: impl Into<Arc<[u8]>>, config: &SessionConfig) -> Self {
        let engine = MemoryEngine::new().with_buffer_limit(config.buffer_limit);
        Self::with_engine(engine, data, config)
    }

    /// Returns the detected container format.
    pub fn format(&self) -> Option<FormatKind> {
        self.engine.format()
    }

    /// Returns the compression filters that were peeled off the input.
    pub fn filter_chain(&self) -> &[FilterKind] {
        self.engine.filter_chain()
    }

    /// A session that failed before reaching the engine.
    #[cfg_attr(not(feature = "ffi"), allow(dead_code))]
    pub(crate) fn rejected(message: &str) -> Self {
        let mut session = Self {
            engine: MemoryEngine::new(),
            state: SessionState::Opened,
            status: Status::ok(),
            entry: None,
        };
        session
            .engine
            .set_error(ErrorCode::Programmer, message.to_string());
        session.fail(StatusKind::Fatal, "open");
        session
    }
}

impl<E: Engine> Session<E> {
    /// Opens a session over `data` driving the given engine.
    ///
    /// The engine must be fresh: every filter and the formats allowed by
    /// `config.recursive` are enabled on it before opening.
    pub fn with_engine(engine: E, data: impl Into<Arc<[u8]>>, config: &SessionConfig) -> Self {
        let mut session = Self {
            engine,
            state: SessionState::Opened,
            status: Status::ok(),
            entry: None,
        };
        session.enable_capabilities(config.recursive);
        session.start(data.into(), config.passphrase.as_ref());
        log::debug!("session opened: {}", session.status);
        session
    }

    fn enable_capabilities(&mut self, recursive: bool) {
        for filter in FilterKind::ALL {
            let code = self.engine.enable_filter(filter);
            self.discard_registration_error(code, filter.name());
        }
        for format in FormatKind::enabled_set(recursive) {
            let code = self.engine.enable_format(format);
            self.discard_registration_error(code, format.name());
        }
    }

    fn discard_registration_error(&mut self, code: ReturnCode, name: &str) {
        if code != ReturnCode::Ok {
            match self.engine.error_message() {
                Some(message) => log::debug!("enabling {name} returned {code}: {message}"),
                None => log::debug!("enabling {name} returned {code}"),
            }
        }
        self.engine.clear_error();
    }

    fn start(&mut self, data: Arc<[u8]>, passphrase: Option<&Passphrase>) {
        let passphrase = passphrase.filter(|passphrase| !passphrase.is_empty());
        if let Some(passphrase) = passphrase {
            if self.engine.add_passphrase(passphrase) != ReturnCode::Ok {
                self.fail(StatusKind::Fatal, "add passphrase");
                return;
            }
        }

        let code = retry_once(&mut self.engine, "open", |engine| {
            engine.open_memory(Arc::clone(&data))
        });
        if !code.is_success() {
            self.fail(StatusKind::Fatal, "open");
            return;
        }
        self.status = self.settle(code, "open");

        if passphrase.is_none() && self.engine.has_encrypted_entries() {
            self.engine
                .set_error(ErrorCode::Passphrase, "Archive requires password".to_string());
            self.fail(StatusKind::PassphraseRequired, "open");
        }
    }

    /// Status for a successful engine call, discarding any warning it left.
    fn settle(&mut self, code: ReturnCode, operation: &str) -> Status {
        if code == ReturnCode::Warn {
            self.discard_warning(operation);
            Status::warned()
        } else {
            Status::ok()
        }
    }

    /// Logs the engine's pending warning and forgets it.
    fn discard_warning(&mut self, operation: &str) {
        match self.engine.error_message() {
            Some(message) => log::warn!("{operation}: {message}"),
            None => log::warn!("{operation}: engine reported a warning"),
        }
        self.engine.clear_error();
    }

    /// Moves the session into its terminal state.
    ///
    /// The engine's message is kept; an empty one is replaced by
    /// `{operation} failed`.
    fn fail(&mut self, kind: StatusKind, operation: &str) {
        let code = self.engine.error().map_or(ErrorCode::Misc, |err| err.code);
        let message = match self.engine.error_message() {
            Some(message) => message.to_string(),
            None => {
                let message = format!("{operation} failed");
                self.engine.set_error(code, message.clone());
                message
            }
        };
        log::debug!("{operation} failed: {message} ({code})");
        self.entry = None;
        self.state = SessionState::Failed;
        self.status = Status::failure(kind, code, message);
    }

    /// Returns the status of the last operation.
    ///
    /// Querying never changes the session.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true once the session can no longer be used.
    pub fn is_failed(&self) -> bool {
        self.state == SessionState::Failed
    }

    /// Returns the entry the cursor is positioned on.
    pub fn entry(&self) -> Option<&Entry> {
        self.entry.as_ref()
    }

    /// Returns the engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Closes the session, releasing the engine and everything it holds.
    pub fn close(self) {
        log::debug!("session closed in state {:?}", self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_open_tar() {
        let session = Session::open(tar_bytes(&[("a.txt", b"hello")]), &SessionConfig::default());
        assert_eq!(session.status().kind(), StatusKind::Ok);
        assert_eq!(session.state(), SessionState::Opened);
        assert_eq!(session.format(), Some(FormatKind::Tar));
        assert!(session.entry().is_none());
    }

    #[test]
    fn test_empty_buffer_is_fatal() {
        let session = Session::open(Vec::new(), &SessionConfig::default());
        assert!(session.is_failed());
        assert_eq!(session.status().kind(), StatusKind::Fatal);
        assert_eq!(session.status().code(), Some(ErrorCode::FileFormat));
        assert!(!session.status().message().unwrap_or("").is_empty());
    }

    #[test]
    fn test_empty_passphrase_counts_as_none() {
        let config = SessionConfig::new().passphrase("");
        let session = Session::open(tar_bytes(&[("a.txt", b"hello")]), &config);
        assert_eq!(session.status().kind(), StatusKind::Ok);
    }

    #[test]
    fn test_passphrase_on_plain_archive_is_harmless() {
        let config = SessionConfig::new().passphrase("secret");
        let session = Session::open(tar_bytes(&[("a.txt", b"hello")]), &config);
        assert_eq!(session.status().kind(), StatusKind::Ok);
    }

    #[test]
    fn test_rejected_session() {
        let mut session = Session::rejected("Null buffer");
        assert_eq!(session.status().kind(), StatusKind::Fatal);
        assert_eq!(session.status().message(), Some("Null buffer"));
        assert!(matches!(session.advance(), Advance::Aborted));
        assert_eq!(session.status().message(), Some("Null buffer"));
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::new().passphrase("pw").recursive(true).buffer_limit(10);
        assert_eq!(config.passphrase.as_ref().map(Passphrase::as_str), Some("pw"));
        assert!(config.recursive);
        assert_eq!(config.buffer_limit, 10);
    }
}
