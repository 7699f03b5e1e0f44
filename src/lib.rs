//! # archive-bridge
//!
//! Stateful decoding sessions over in-memory archives.
//!
//! A [`Session`] owns a copy of an archive buffer and walks it one entry at a
//! time. Every operation leaves a [`Status`] behind: a kind, an optional
//! message, and for reads the number of bytes produced. Callers on the far
//! side of a narrow boundary (the C functions in `ffi`, a scripting host)
//! consult that status instead of receiving rich error values.
//!
//! Supported containers are tar (ustar, pax, GNU) and zip (stored, deflate,
//! bzip2, zstd, ZipCrypto and AES), optionally wrapped in gzip, bzip2, xz,
//! lzma or zstd compression. A single compressed stream with no container is
//! exposed as one entry named `data`.
//!
//! ## Quick Start
//!
//! ### Walking a session
//!
//! ```rust,no_run
//! use archive_bridge::{Advance, Session, SessionConfig, StatusKind};
//!
//! let bytes = std::fs::read("archive.tar.gz").unwrap();
//! let mut session = Session::open(bytes, &SessionConfig::default());
//!
//! while let Advance::Entry(entry) = session.advance() {
//!     let size = entry.size.unwrap_or(64 * 1024);
//!     println!("{}", entry.path);
//!     while let Some(chunk) = session.read_data(size) {
//!         if chunk.is_empty() {
//!             break;
//!         }
//!     }
//! }
//!
//! if session.status().kind() != StatusKind::EndOfStream {
//!     eprintln!("{}", session.status());
//! }
//! session.close();
//! ```
//!
//! ### Extracting everything
//!
//! ```rust,no_run
//! use archive_bridge::{ExtractOptions, Result, extract_all};
//!
//! fn main() -> Result<()> {
//!     let bytes = std::fs::read("bundle.zip")?;
//!     let options = ExtractOptions::new().passphrase("secret").recursive(true);
//!     for entry in extract_all(bytes, options)? {
//!         println!("{}: {} bytes", entry.path(), entry.data.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | gzip filter and deflate zip entries |
//! | `bzip2` | Yes | bzip2 filter |
//! | `xz` | Yes | xz and lzma filters |
//! | `zstd` | Yes | zstd filter |
//! | `zip` | Yes | zip container, including encrypted entries |
//! | `ffi` | No | C functions over sessions |
//!
//! ## Error Handling
//!
//! Session operations never return errors; they record a [`Status`].
//! [`Status::to_error`] turns a failure into an [`Error`], which is what the
//! extraction helpers return:
//!
//! ```rust,no_run
//! use archive_bridge::{Error, ExtractOptions, extract_all};
//!
//! fn count(bytes: Vec<u8>) -> archive_bridge::Result<usize> {
//!     match extract_all(bytes, ExtractOptions::default()) {
//!         Ok(entries) => Ok(entries.len()),
//!         Err(Error::PasswordRequired) => {
//!             eprintln!("archive is encrypted");
//!             Ok(0)
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! # fn main() {}
//! ```
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod codec;
pub mod engine;
pub mod entry;
pub mod error;
pub mod extract;
pub mod format;
pub mod fs;
pub mod passphrase;
pub mod safety;
pub mod session;
pub mod status;
pub mod timestamp;

#[cfg(feature = "ffi")]
#[cfg_attr(docsrs, doc(cfg(feature = "ffi")))]
pub mod ffi;

pub use entry::{Entry, EntryType};
pub use error::{Error, Result};
pub use passphrase::Passphrase;
pub use status::{Status, StatusKind};
pub use timestamp::Timestamp;

// Re-export the session API at crate root for convenience
pub use session::{Advance, DataReader, Session, SessionConfig, SessionState};

// Re-export engine types
pub use engine::{Engine, EngineError, ErrorCode, MemoryEngine, ReturnCode};
pub use format::{FilterKind, FormatKind};

// Re-export extraction API
pub use extract::{ExtractOptions, ExtractedEntry, Extractor, extract, extract_all};
pub use fs::{ExtractSummary, extract_to};

// Re-export safety utilities
pub use safety::{LimitedReader, PathSafety, ResourceLimits, validate_extract_path};
