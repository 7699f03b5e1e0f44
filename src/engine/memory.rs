//! The engine shipped with this crate.
//!
//! [`MemoryEngine`] decodes a fully materialized buffer. On open it sniffs
//! the head of the input, peels off up to [`MAX_FILTER_DEPTH`] compression
//! filters, and settles on the first enabled container format that
//! recognizes what is left:
//!
//! 1. **zip**: only on unfiltered input, read through its central directory
//! 2. **tar**: ustar/GNU/pax/v7 headers, streamed block by block
//! 3. **raw**: any filtered stream, exposed as one entry named `data`
//!
//! Anything else fails with `Unrecognized archive format`.

use std::io::{self, Cursor, Read};
use std::sync::Arc;

use super::raw::RawReader;
use super::tar::TarReader;
#[cfg(feature = "zip")]
use super::zip::ZipReader;
use super::{Engine, EngineError, ErrorCode, ReturnCode};
use crate::codec::{self, BoxedReader};
use crate::entry::Entry;
use crate::format::detect::{self, PEEK_LEN};
use crate::format::{FilterKind, FormatKind, MAX_FILTER_DEPTH};
use crate::passphrase::Passphrase;

/// Default cap on a single entry decoded into memory (1 GiB).
pub const DEFAULT_BUFFER_LIMIT: u64 = 1 << 30;

/// Outcome of a backend call that did not fail.
#[derive(Debug)]
pub(super) enum Step {
    Ok,
    Warn(String),
    Eof,
}

/// Reads until `buf` is full or the input ends, returning the bytes read.
pub(super) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Header,
    Data,
    Eof,
    Fatal,
}

enum Backend {
    Tar(TarReader),
    #[cfg(feature = "zip")]
    Zip(Box<ZipReader>),
    Raw(RawReader),
}

impl Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Tar(_) => "tar",
            #[cfg(feature = "zip")]
            Backend::Zip(_) => "zip",
            Backend::Raw(_) => "raw",
        }
    }
}

/// In-memory multi-format decoding engine.
///
/// # Example
///
/// ```rust
/// use archive_bridge::engine::{Engine, MemoryEngine, ReturnCode};
/// use archive_bridge::format::FormatKind;
///
/// let mut engine = MemoryEngine::new();
/// assert_eq!(engine.enable_format(FormatKind::Tar), ReturnCode::Ok);
/// assert_eq!(engine.open_memory(Vec::new().into()), ReturnCode::Fatal);
/// assert_eq!(engine.error_message(), Some("Unrecognized archive format"));
/// ```
pub struct MemoryEngine {
    formats: Vec<FormatKind>,
    filters: Vec<FilterKind>,
    passphrases: Vec<Passphrase>,
    buffer_limit: u64,
    error: Option<EngineError>,
    state: State,
    backend: Option<Backend>,
    filter_chain: Vec<FilterKind>,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("formats", &self.formats)
            .field("filters", &self.filters)
            .field("state", &self.state)
            .field("backend", &self.backend.as_ref().map(Backend::name))
            .field("filter_chain", &self.filter_chain)
            .finish_non_exhaustive()
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Creates an engine with nothing enabled.
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
            filters: Vec::new(),
            passphrases: Vec::new(),
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            error: None,
            state: State::New,
            backend: None,
            filter_chain: Vec::new(),
        }
    }

    /// Sets the largest entry a random-access format may decode into memory.
    pub fn with_buffer_limit(mut self, limit: u64) -> Self {
        self.buffer_limit = limit;
        self
    }

    /// Returns the detected container format once opened.
    pub fn format(&self) -> Option<FormatKind> {
        self.backend.as_ref().map(|backend| match backend {
            Backend::Tar(_) => FormatKind::Tar,
            #[cfg(feature = "zip")]
            Backend::Zip(_) => FormatKind::Zip,
            Backend::Raw(_) => FormatKind::Raw,
        })
    }

    /// Returns the filters peeled off the input, outermost first.
    pub fn filter_chain(&self) -> &[FilterKind] {
        &self.filter_chain
    }

    fn fatal(&mut self, err: EngineError) -> ReturnCode {
        log::debug!("engine fatal: {err}");
        self.error = Some(err);
        self.state = State::Fatal;
        self.backend = None;
        ReturnCode::Fatal
    }

    fn misuse(&mut self, message: &str) -> ReturnCode {
        self.fatal(EngineError::new(ErrorCode::Programmer, message))
    }

    fn open_backend(&mut self, data: Arc<[u8]>) -> Result<Backend, EngineError> {
        let mut reader: BoxedReader = Box::new(Cursor::new(Arc::clone(&data)));
        loop {
            let (head, rest) = peek(reader, PEEK_LEN).map_err(|e| self.stream_error(e))?;

            // Zip needs random access, so it is only read from the unfiltered buffer.
            match detect::detect_format(&head).filter(|f| self.formats.contains(f)) {
                Some(FormatKind::Zip) if self.filter_chain.is_empty() => {
                    return self.open_zip(data);
                }
                Some(FormatKind::Tar) => {
                    return Ok(Backend::Tar(TarReader::new(rejoin(head, rest))));
                }
                _ => {}
            }

            let filter = detect::detect_filter(&head).filter(|f| self.filters.contains(f));
            if let Some(filter) = filter {
                if self.filter_chain.len() >= MAX_FILTER_DEPTH {
                    return Err(EngineError::new(
                        ErrorCode::FileFormat,
                        format!("Input is nested under more than {MAX_FILTER_DEPTH} filters"),
                    ));
                }
                let decoder = codec::build_decoder(rejoin(head, rest), filter).map_err(|e| {
                    EngineError::new(ErrorCode::Misc, format!("Failed to start {filter} decoder: {e}"))
                })?;
                log::debug!("peeled {filter} filter");
                self.filter_chain.push(filter);
                reader = Box::new(decoder);
                continue;
            }

            if self.formats.contains(&FormatKind::Raw) && !self.filter_chain.is_empty() {
                return Ok(Backend::Raw(RawReader::new(rejoin(head, rest))));
            }

            return Err(EngineError::new(
                ErrorCode::FileFormat,
                "Unrecognized archive format",
            ));
        }
    }

    #[cfg(feature = "zip")]
    fn open_zip(&self, data: Arc<[u8]>) -> Result<Backend, EngineError> {
        let reader = ZipReader::open(data, self.passphrases.clone(), self.buffer_limit)?;
        Ok(Backend::Zip(Box::new(reader)))
    }

    #[cfg(not(feature = "zip"))]
    fn open_zip(&self, _data: Arc<[u8]>) -> Result<Backend, EngineError> {
        Err(EngineError::new(
            ErrorCode::FileFormat,
            "zip support is not compiled in",
        ))
    }

    fn stream_error(&self, err: io::Error) -> EngineError {
        match self.filter_chain.last() {
            Some(filter) => EngineError::new(
                ErrorCode::Misc,
                format!("{filter} decompression failed: {err}"),
            ),
            None => EngineError::new(ErrorCode::Io, err.to_string()),
        }
    }
}

/// Reads up to `len` bytes off the front of `reader`.
fn peek(mut reader: BoxedReader, len: usize) -> io::Result<(Vec<u8>, BoxedReader)> {
    let mut head = Vec::with_capacity(len);
    (&mut reader).take(len as u64).read_to_end(&mut head)?;
    Ok((head, reader))
}

/// Puts peeked bytes back in front of the rest of the stream.
fn rejoin(head: Vec<u8>, rest: BoxedReader) -> BoxedReader {
    Box::new(Cursor::new(head).chain(rest))
}

impl Engine for MemoryEngine {
    fn enable_format(&mut self, format: FormatKind) -> ReturnCode {
        if self.state != State::New {
            self.error = Some(EngineError::new(
                ErrorCode::Programmer,
                "Formats must be enabled before opening",
            ));
            return ReturnCode::Failed;
        }
        if format == FormatKind::Zip && !cfg!(feature = "zip") {
            self.error = Some(EngineError::new(ErrorCode::Misc, "zip support is not compiled in"));
            return ReturnCode::Warn;
        }
        if !self.formats.contains(&format) {
            self.formats.push(format);
        }
        ReturnCode::Ok
    }

    fn enable_filter(&mut self, filter: FilterKind) -> ReturnCode {
        if self.state != State::New {
            self.error = Some(EngineError::new(
                ErrorCode::Programmer,
                "Filters must be enabled before opening",
            ));
            return ReturnCode::Failed;
        }
        if !filter.is_supported() {
            self.error = Some(EngineError::new(
                ErrorCode::Misc,
                format!("{filter} support is not compiled in"),
            ));
            return ReturnCode::Warn;
        }
        if !self.filters.contains(&filter) {
            self.filters.push(filter);
        }
        ReturnCode::Ok
    }

    fn add_passphrase(&mut self, passphrase: &Passphrase) -> ReturnCode {
        match self.state {
            State::Fatal => ReturnCode::Fatal,
            State::New => {
                if passphrase.is_empty() {
                    self.error = Some(EngineError::new(ErrorCode::Misc, "Empty passphrase is unacceptable"));
                    return ReturnCode::Failed;
                }
                self.passphrases.push(passphrase.clone());
                ReturnCode::Ok
            }
            _ => {
                self.error = Some(EngineError::new(
                    ErrorCode::Programmer,
                    "Passphrases must be added before opening",
                ));
                ReturnCode::Failed
            }
        }
    }

    fn has_encrypted_entries(&self) -> bool {
        match &self.backend {
            #[cfg(feature = "zip")]
            Some(Backend::Zip(zip)) => zip.has_encrypted_entries(),
            _ => false,
        }
    }

    fn open_memory(&mut self, data: Arc<[u8]>) -> ReturnCode {
        match self.state {
            State::New => {}
            State::Fatal => return ReturnCode::Fatal,
            _ => return self.misuse("Engine is already open"),
        }
        if self.formats.is_empty() {
            return self.fatal(EngineError::new(ErrorCode::Programmer, "No formats registered"));
        }
        match self.open_backend(data) {
            Ok(backend) => {
                log::debug!(
                    "opened {} input under {} filter(s)",
                    backend.name(),
                    self.filter_chain.len()
                );
                self.backend = Some(backend);
                self.state = State::Header;
                ReturnCode::Ok
            }
            Err(err) => self.fatal(err),
        }
    }

    fn next_header(&mut self, entry: &mut Entry) -> ReturnCode {
        match self.state {
            State::Header | State::Data => {}
            State::Eof => return ReturnCode::Eof,
            State::Fatal => return ReturnCode::Fatal,
            State::New => return self.misuse("next_header called before open"),
        }
        entry.clear();
        let step = match self.backend.as_mut() {
            Some(Backend::Tar(tar)) => tar.next_header(entry),
            #[cfg(feature = "zip")]
            Some(Backend::Zip(zip)) => zip.next_header(entry),
            Some(Backend::Raw(raw)) => raw.next_header(entry),
            None => Err(EngineError::new(ErrorCode::Programmer, "Engine has no open input")),
        };
        match step {
            Ok(Step::Ok) => {
                self.state = State::Data;
                ReturnCode::Ok
            }
            Ok(Step::Warn(message)) => {
                self.error = Some(EngineError::new(ErrorCode::Misc, message));
                self.state = State::Data;
                ReturnCode::Warn
            }
            Ok(Step::Eof) => {
                entry.clear();
                self.state = State::Eof;
                ReturnCode::Eof
            }
            Err(err) => {
                entry.clear();
                self.fatal(err)
            }
        }
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, ReturnCode> {
        match self.state {
            State::Data => {}
            State::Fatal => return Err(ReturnCode::Fatal),
            _ => return Err(self.misuse("No current entry to read data from")),
        }
        let result = match self.backend.as_mut() {
            Some(Backend::Tar(tar)) => tar.read(buf),
            #[cfg(feature = "zip")]
            Some(Backend::Zip(zip)) => zip.read(buf),
            Some(Backend::Raw(raw)) => raw.read(buf),
            None => Err(EngineError::new(ErrorCode::Programmer, "Engine has no open input")),
        };
        result.map_err(|err| self.fatal(err))
    }

    fn error(&self) -> Option<&EngineError> {
        self.error.as_ref()
    }

    fn clear_error(&mut self) {
        self.error = None;
    }

    fn set_error(&mut self, code: ErrorCode, message: String) {
        self.error = Some(EngineError::new(code, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> MemoryEngine {
        let mut engine = MemoryEngine::new();
        for format in FormatKind::ALL {
            engine.enable_format(format);
        }
        for filter in FilterKind::ALL {
            engine.enable_filter(filter);
        }
        engine.clear_error();
        engine
    }

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
        let mut engine = engine();
        assert_eq!(engine.open_memory(tar_bytes(&[("a", b"1")]).into()), ReturnCode::Ok);
        assert_eq!(engine.format(), Some(FormatKind::Tar));
        assert!(engine.filter_chain().is_empty());
        assert!(!engine.has_encrypted_entries());
    }

    #[test]
    fn test_empty_input_is_unrecognized() {
        let mut engine = engine();
        assert_eq!(engine.open_memory(Vec::new().into()), ReturnCode::Fatal);
        let err = engine.error().unwrap();
        assert_eq!(err.code, ErrorCode::FileFormat);
        assert_eq!(err.message, "Unrecognized archive format");
    }

    #[test]
    fn test_plain_text_is_unrecognized() {
        let mut engine = engine();
        let code = engine.open_memory(b"just some text".to_vec().into());
        assert_eq!(code, ReturnCode::Fatal);
    }

    #[test]
    fn test_fatal_is_sticky() {
        let mut engine = engine();
        engine.open_memory(Vec::new().into());
        let mut entry = Entry::default();
        assert_eq!(engine.next_header(&mut entry), ReturnCode::Fatal);
        assert_eq!(engine.read_data(&mut [0u8; 4]), Err(ReturnCode::Fatal));
    }

    #[test]
    fn test_read_before_header_is_misuse() {
        let mut engine = engine();
        engine.open_memory(tar_bytes(&[("a", b"1")]).into());
        assert_eq!(engine.read_data(&mut [0u8; 4]), Err(ReturnCode::Fatal));
        assert_eq!(engine.error().unwrap().code, ErrorCode::Programmer);
    }

    #[test]
    fn test_empty_tar_opens_at_end() {
        let mut engine = engine();
        assert_eq!(engine.open_memory(tar_bytes(&[]).into()), ReturnCode::Ok);
        assert_eq!(engine.format(), Some(FormatKind::Tar));
        let mut entry = Entry::default();
        assert_eq!(engine.next_header(&mut entry), ReturnCode::Eof);
        assert_eq!(engine.next_header(&mut entry), ReturnCode::Eof);
        assert!(engine.error().is_none());
    }

    #[test]
    fn test_eof_repeats() {
        let mut engine = engine();
        engine.open_memory(tar_bytes(&[("a", b"1")]).into());
        let mut entry = Entry::default();
        assert_eq!(engine.next_header(&mut entry), ReturnCode::Ok);
        assert_eq!(engine.next_header(&mut entry), ReturnCode::Eof);
        assert_eq!(entry, Entry::default());
        assert_eq!(engine.next_header(&mut entry), ReturnCode::Eof);
        assert_eq!(engine.read_data(&mut [0u8; 4]), Err(ReturnCode::Fatal));
    }

    #[test]
    fn test_enable_after_open_fails() {
        let mut engine = engine();
        engine.open_memory(tar_bytes(&[("a", b"1")]).into());
        assert_eq!(engine.enable_format(FormatKind::Zip), ReturnCode::Failed);
        assert_eq!(engine.enable_filter(FilterKind::Gzip), ReturnCode::Failed);
    }

    #[test]
    fn test_open_without_formats() {
        let mut engine = MemoryEngine::new();
        assert_eq!(engine.open_memory(tar_bytes(&[]).into()), ReturnCode::Fatal);
        assert_eq!(engine.error().unwrap().code, ErrorCode::Programmer);
    }

    #[test]
    fn test_double_open_is_misuse() {
        let mut engine = engine();
        engine.open_memory(tar_bytes(&[("a", b"1")]).into());
        assert_eq!(engine.open_memory(tar_bytes(&[]).into()), ReturnCode::Fatal);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_gzip_text_opens_as_raw() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"plain text inside gzip").unwrap();
        let mut engine = engine();
        assert_eq!(engine.open_memory(encoder.finish().unwrap().into()), ReturnCode::Ok);
        assert_eq!(engine.format(), Some(FormatKind::Raw));
        assert_eq!(engine.filter_chain(), &[FilterKind::Gzip]);

        let mut entry = Entry::default();
        assert_eq!(engine.next_header(&mut entry), ReturnCode::Ok);
        assert_eq!(entry.path, "data");
        let mut buf = [0u8; 64];
        assert_eq!(engine.read_data(&mut buf), Ok(22));
    }

    #[cfg(all(feature = "deflate", feature = "zip"))]
    #[test]
    fn test_zip_only_opens_unfiltered() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("a.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"alpha").unwrap();
        let zipped = writer.finish().unwrap().into_inner();

        let mut plain = engine();
        assert_eq!(plain.open_memory(zipped.clone().into()), ReturnCode::Ok);
        assert_eq!(plain.format(), Some(FormatKind::Zip));

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&zipped).unwrap();
        let mut filtered = engine();
        assert_eq!(filtered.open_memory(encoder.finish().unwrap().into()), ReturnCode::Ok);
        assert_eq!(filtered.format(), Some(FormatKind::Raw));
        assert_eq!(filtered.filter_chain(), &[FilterKind::Gzip]);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_corrupt_gzip_is_fatal() {
        let mut engine = engine();
        // Valid member header followed by a deflate block of reserved type.
        let mut data = vec![0x1F, 0x8B, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03];
        data.extend_from_slice(&[0xFF; 16]);
        assert_eq!(engine.open_memory(data.into()), ReturnCode::Fatal);
        assert!(engine.error_message().unwrap().contains("gzip"));
    }
}
