//! C boundary.
//!
//! Exposes sessions through `extern "C"` functions that pass only pointers
//! and integers. Every call that can fail returns null (or a sentinel) and
//! leaves the details in the session status, which the caller queries with
//! the `archive_status_*` functions.
//!
//! # Ownership
//!
//! - `archive_open` returns a session the caller must release with
//!   `archive_close`, exactly once.
//! - `archive_next_entry` returns a view owned by the session, valid until
//!   the next `archive_next_entry` or `archive_close`.
//! - `archive_read_data` returns a buffer owned by the caller, released with
//!   `archive_data_free` and the length from `archive_status_value`.
//! - Strings returned by accessors are owned by the session or entry and
//!   stay valid as long as those do.
//!
//! # Example (C)
//!
//! ```c
//! ArchiveSession *s = archive_open(buf, len, NULL, false);
//! const ArchiveEntry *e;
//! while ((e = archive_next_entry(s)) != NULL) {
//!     uint8_t *data = archive_read_data(s, archive_entry_size(e));
//!     if (data == NULL) break;
//!     size_t n = (size_t)archive_status_value(s);
//!     consume(archive_entry_pathname(e), data, n);
//!     archive_data_free(data, n);
//! }
//! if (archive_status_kind(s) != ARCHIVE_STATUS_END_OF_STREAM)
//!     fprintf(stderr, "%s\n", archive_status_message(s));
//! archive_close(s);
//! ```

use std::ffi::{CStr, CString, c_char};
use std::ptr;
use std::sync::Arc;

use crate::entry::{Entry, FILE_TYPE_MASK};
use crate::session::{Advance, Session, SessionConfig};
use crate::timestamp::Timestamp;

/// Opaque session handle.
pub struct ArchiveSession {
    session: Session,
    entry: Option<ArchiveEntry>,
    message: Option<CString>,
}

impl ArchiveSession {
    fn new(session: Session) -> *mut Self {
        let mut handle = Self {
            session,
            entry: None,
            message: None,
        };
        handle.sync_message();
        Box::into_raw(Box::new(handle))
    }

    fn sync_message(&mut self) {
        self.message = self.session.status().message().map(c_string);
    }
}

/// Opaque entry view.
pub struct ArchiveEntry {
    pathname: CString,
    symlink: Option<CString>,
    hardlink: Option<CString>,
    size: i64,
    mode: u32,
    mtime: i64,
    atime: i64,
    ctime: i64,
    birthtime: i64,
}

impl ArchiveEntry {
    fn new(entry: &Entry) -> Self {
        let secs = |time: Option<Timestamp>| time.map_or(0, |t| t.as_unix_secs());
        Self {
            pathname: c_string(&entry.path),
            symlink: entry.symlink.as_deref().map(c_string),
            hardlink: entry.hardlink.as_deref().map(c_string),
            size: entry
                .size
                .map_or(-1, |size| i64::try_from(size).unwrap_or(i64::MAX)),
            mode: entry.mode(),
            mtime: secs(entry.modified),
            atime: secs(entry.accessed),
            ctime: secs(entry.changed),
            birthtime: secs(entry.created),
        }
    }
}

/// Builds a C string, dropping interior NUL bytes.
fn c_string(text: &str) -> CString {
    CString::new(text.replace('\0', "")).unwrap_or_default()
}

fn opt_ptr(text: &Option<CString>) -> *const c_char {
    text.as_ref().map_or(ptr::null(), |s| s.as_ptr())
}

/// Opens a session over a copy of `size` bytes at `buf`.
///
/// `passphrase` may be null or empty for none. Always returns a session;
/// check `archive_status_kind` before iterating.
///
/// # Safety
///
/// `buf` must point to `size` readable bytes (it may be null if `size` is
/// 0). `passphrase` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn archive_open(
    buf: *const u8,
    size: usize,
    passphrase: *const c_char,
    recursive: bool,
) -> *mut ArchiveSession {
    let data: Arc<[u8]> = if size == 0 {
        Arc::from(Vec::new())
    } else if buf.is_null() {
        return ArchiveSession::new(Session::rejected("Null buffer with non-zero size"));
    } else {
        Arc::from(unsafe { std::slice::from_raw_parts(buf, size) })
    };

    let mut config = SessionConfig::new().recursive(recursive);
    if !passphrase.is_null() {
        match unsafe { CStr::from_ptr(passphrase) }.to_str() {
            Ok(passphrase) => config = config.passphrase(passphrase),
            Err(_) => {
                return ArchiveSession::new(Session::rejected("Passphrase is not valid UTF-8"));
            }
        }
    }
    ArchiveSession::new(Session::open(data, &config))
}

/// Advances to the next entry.
///
/// Returns null at the end of the archive and on failure; the status tells
/// them apart.
///
/// # Safety
///
/// `session` must be null or a live pointer from `archive_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn archive_next_entry(session: *mut ArchiveSession) -> *const ArchiveEntry {
    let Some(handle) = (unsafe { session.as_mut() }) else {
        return ptr::null();
    };
    handle.entry = match handle.session.advance() {
        Advance::Entry(entry) => Some(ArchiveEntry::new(entry)),
        Advance::End | Advance::Aborted => None,
    };
    handle.sync_message();
    handle.entry.as_ref().map_or(ptr::null(), |entry| entry as *const ArchiveEntry)
}

/// Reads up to `max` decoded bytes of the current entry.
///
/// On success returns a buffer whose length is `archive_status_value`
/// (possibly 0, with a non-null pointer). Returns null on failure.
///
/// # Safety
///
/// `session` must be null or a live pointer from `archive_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn archive_read_data(session: *mut ArchiveSession, max: usize) -> *mut u8 {
    let Some(handle) = (unsafe { session.as_mut() }) else {
        return ptr::null_mut();
    };
    let data = handle.session.read_data(max as u64);
    handle.sync_message();
    match data {
        Some(data) => Box::into_raw(data.into_boxed_slice()) as *mut u8,
        None => ptr::null_mut(),
    }
}

/// Releases a buffer returned by `archive_read_data`.
///
/// # Safety
///
/// `data` must be null or a buffer from `archive_read_data` not yet freed,
/// and `len` the length reported for it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn archive_data_free(data: *mut u8, len: usize) {
    if data.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(data, len)) });
}

/// Returns the status kind of the last operation, or -1 for a null session.
///
/// 0 ok, 1 warned, 2 passphrase required, 3 out of memory, 4 fatal,
/// 5 end of stream.
///
/// # Safety
///
/// `session` must be null or a live pointer from `archive_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn archive_status_kind(session: *const ArchiveSession) -> i32 {
    unsafe { session.as_ref() }.map_or(-1, |handle| handle.session.status().kind().as_raw())
}

/// Returns the status message, or null if there is none.
///
/// # Safety
///
/// `session` must be null or a live pointer from `archive_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn archive_status_message(session: *const ArchiveSession) -> *const c_char {
    unsafe { session.as_ref() }.map_or(ptr::null(), |handle| opt_ptr(&handle.message))
}

/// Returns the byte count of the last successful read, or -1.
///
/// # Safety
///
/// `session` must be null or a live pointer from `archive_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn archive_status_value(session: *const ArchiveSession) -> i64 {
    unsafe { session.as_ref() }
        .and_then(|handle| handle.session.status().value())
        .map_or(-1, |value| i64::try_from(value).unwrap_or(i64::MAX))
}

/// Returns the errno-style code behind a failure, or 0.
///
/// # Safety
///
/// `session` must be null or a live pointer from `archive_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn archive_status_code(session: *const ArchiveSession) -> i32 {
    unsafe { session.as_ref() }
        .and_then(|handle| handle.session.status().code())
        .map_or(0, |code| code.as_raw())
}

/// Closes a session and everything it owns.
///
/// # Safety
///
/// `session` must be null or a pointer from `archive_open` that has not
/// been closed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn archive_close(session: *mut ArchiveSession) {
    if session.is_null() {
        return;
    }
    let handle = unsafe { Box::from_raw(session) };
    handle.session.close();
}

macro_rules! entry_accessor {
    ($(#[$doc:meta])* $name:ident -> $ty:ty, $default:expr, |$entry:ident| $body:expr) => {
        $(#[$doc])*
        ///
        /// # Safety
        ///
        /// `entry` must be null or a pointer from `archive_next_entry` that is
        /// still valid.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(entry: *const ArchiveEntry) -> $ty {
            match unsafe { entry.as_ref() } {
                Some($entry) => $body,
                None => $default,
            }
        }
    };
}

entry_accessor!(
    /// Returns the entry path.
    archive_entry_pathname -> *const c_char, ptr::null(), |entry| entry.pathname.as_ptr()
);
entry_accessor!(
    /// Returns the symbolic link target, or null.
    archive_entry_symlink -> *const c_char, ptr::null(), |entry| opt_ptr(&entry.symlink)
);
entry_accessor!(
    /// Returns the hard link target, or null.
    archive_entry_hardlink -> *const c_char, ptr::null(), |entry| opt_ptr(&entry.hardlink)
);
entry_accessor!(
    /// Returns the declared size, or -1 if the format records none.
    archive_entry_size -> i64, -1, |entry| entry.size
);
entry_accessor!(
    /// Returns the full Unix mode.
    archive_entry_mode -> u32, 0, |entry| entry.mode
);
entry_accessor!(
    /// Returns the file-type bits of the mode.
    archive_entry_filetype -> u32, 0, |entry| entry.mode & FILE_TYPE_MASK
);
entry_accessor!(
    /// Returns the modification time in seconds since the epoch, or 0.
    archive_entry_mtime -> i64, 0, |entry| entry.mtime
);
entry_accessor!(
    /// Returns the access time in seconds since the epoch, or 0.
    archive_entry_atime -> i64, 0, |entry| entry.atime
);
entry_accessor!(
    /// Returns the status change time in seconds since the epoch, or 0.
    archive_entry_ctime -> i64, 0, |entry| entry.ctime
);
entry_accessor!(
    /// Returns the creation time in seconds since the epoch, or 0.
    archive_entry_birthtime -> i64, 0, |entry| entry.birthtime
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusKind;

    fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in entries {
            let mut header = tar::Header::new_ustar();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(1_700_000_000);
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn message(session: *const ArchiveSession) -> Option<String> {
        let ptr = unsafe { archive_status_message(session) };
        (!ptr.is_null()).then(|| unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }

    #[test]
    fn test_round_trip_through_boundary() {
        let data = tar_bytes(&[("file.txt", b"0123456789")]);
        unsafe {
            let session = archive_open(data.as_ptr(), data.len(), ptr::null(), false);
            assert_eq!(archive_status_kind(session), StatusKind::Ok.as_raw());

            let entry = archive_next_entry(session);
            assert!(!entry.is_null());
            let name = CStr::from_ptr(archive_entry_pathname(entry));
            assert_eq!(name.to_str().unwrap(), "file.txt");
            assert_eq!(archive_entry_size(entry), 10);
            assert_eq!(archive_entry_filetype(entry), 0o100_000);
            assert_eq!(archive_entry_mode(entry), 0o100_644);
            assert_eq!(archive_entry_mtime(entry), 1_700_000_000);
            assert!(archive_entry_symlink(entry).is_null());

            let buf = archive_read_data(session, 20);
            assert!(!buf.is_null());
            assert_eq!(archive_status_value(session), 10);
            assert_eq!(std::slice::from_raw_parts(buf, 10), b"0123456789");
            archive_data_free(buf, 10);

            let buf = archive_read_data(session, 20);
            assert!(!buf.is_null());
            assert_eq!(archive_status_value(session), 0);
            archive_data_free(buf, 0);

            assert!(archive_next_entry(session).is_null());
            assert_eq!(archive_status_kind(session), StatusKind::EndOfStream.as_raw());
            archive_close(session);
        }
    }

    #[test]
    fn test_empty_buffer_reports_fatal() {
        unsafe {
            let session = archive_open(ptr::null(), 0, ptr::null(), false);
            assert!(!session.is_null());
            assert_eq!(archive_status_kind(session), StatusKind::Fatal.as_raw());
            assert_eq!(message(session).as_deref(), Some("Unrecognized archive format"));
            assert!(archive_next_entry(session).is_null());
            assert!(archive_read_data(session, 4).is_null());
            assert_eq!(message(session).as_deref(), Some("Unrecognized archive format"));
            archive_close(session);
        }
    }

    #[test]
    fn test_null_buffer_with_size_is_rejected() {
        unsafe {
            let session = archive_open(ptr::null(), 16, ptr::null(), false);
            assert_eq!(archive_status_kind(session), StatusKind::Fatal.as_raw());
            assert_eq!(message(session).as_deref(), Some("Null buffer with non-zero size"));
            archive_close(session);
        }
    }

    #[test]
    fn test_null_handles() {
        unsafe {
            assert!(archive_next_entry(ptr::null_mut()).is_null());
            assert!(archive_read_data(ptr::null_mut(), 1).is_null());
            assert_eq!(archive_status_kind(ptr::null()), -1);
            assert_eq!(archive_status_value(ptr::null()), -1);
            assert!(archive_entry_pathname(ptr::null()).is_null());
            assert_eq!(archive_entry_size(ptr::null()), -1);
            archive_data_free(ptr::null_mut(), 0);
            archive_close(ptr::null_mut());
        }
    }
}
