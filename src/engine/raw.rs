//! Single-entry view of a bare compressed stream.

use super::memory::{Step, read_full};
use super::{EngineError, ErrorCode};
use crate::codec::BoxedReader;
use crate::entry::{Entry, EntryType};

/// Name given to the only entry of a raw stream.
pub(super) const RAW_ENTRY_NAME: &str = "data";

pub(super) struct RawReader {
    input: BoxedReader,
    emitted: bool,
    exhausted: bool,
}

impl RawReader {
    pub(super) fn new(input: BoxedReader) -> Self {
        Self {
            input,
            emitted: false,
            exhausted: false,
        }
    }

    pub(super) fn next_header(&mut self, entry: &mut Entry) -> Result<Step, EngineError> {
        if self.emitted {
            return Ok(Step::Eof);
        }
        self.emitted = true;
        entry.path = RAW_ENTRY_NAME.to_string();
        entry.entry_type = Some(EntryType::File);
        entry.permissions = 0o644;
        entry.size = None;
        Ok(Step::Ok)
    }

    pub(super) fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        if self.exhausted || buf.is_empty() {
            return Ok(0);
        }
        let got = read_full(&mut self.input, buf).map_err(|e| {
            EngineError::new(ErrorCode::Io, format!("Failed to decompress stream: {e}"))
        })?;
        if got < buf.len() {
            self.exhausted = true;
        }
        Ok(got)
    }
}
