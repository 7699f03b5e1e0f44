//! Data reader.

use std::io::{self, Read};

use super::retry::retry_once;
use super::{Session, SessionState};
use crate::engine::{Engine, ErrorCode};
use crate::error::Error;
use crate::status::{Status, StatusKind};

impl<E: Engine> Session<E> {
    /// Reads up to `max_size` decoded bytes of the current entry.
    ///
    /// Returns a buffer holding exactly the bytes produced; an empty buffer
    /// marks the end of the entry. The byte count is also recorded as the
    /// status [`value`](Status::value).
    ///
    /// Returns `None` when the read failed:
    ///
    /// - `max_size` is beyond what the platform can address, or the buffer
    ///   cannot be allocated: status `OutOfMemory`, the session stays usable
    /// - the engine failed: status `Fatal`
    /// - the session had already failed: status unchanged
    pub fn read_data(&mut self, max_size: u64) -> Option<Vec<u8>> {
        if self.state == SessionState::Failed {
            return None;
        }
        let Some(len) = usize::try_from(max_size)
            .ok()
            .filter(|&len| len <= isize::MAX as usize)
        else {
            self.status = Status::out_of_memory(format!(
                "Read size {max_size} exceeds the addressable limit"
            ));
            return None;
        };

        let mut buffer = Vec::new();
        if let Err(err) = buffer.try_reserve_exact(len) {
            self.status =
                Status::out_of_memory(format!("Failed to allocate {len} bytes for entry data: {err}"));
            return None;
        }
        buffer.resize(len, 0);

        let count = self.read_into(&mut buffer)?;
        buffer.truncate(count);
        Some(buffer)
    }

    /// Reads decoded bytes of the current entry into `buf`.
    ///
    /// Same status rules as [`read_data`](Self::read_data), without the
    /// allocation.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Option<usize> {
        if self.state == SessionState::Failed {
            return None;
        }
        let capacity = buf.len();
        match retry_once(&mut self.engine, "read data", |engine| engine.read_data(&mut *buf)) {
            Ok(count) if count <= capacity => {
                self.status = Status::bytes_read(count as u64);
                Some(count)
            }
            Ok(count) => {
                self.engine.set_error(
                    ErrorCode::Programmer,
                    format!("Engine produced {count} bytes into a {capacity}-byte buffer"),
                );
                self.fail(StatusKind::Fatal, "read data");
                None
            }
            Err(code) => {
                log::debug!("read data returned {code}");
                self.fail(StatusKind::Fatal, "read data");
                None
            }
        }
    }

    /// Returns an [`io::Read`] over the current entry's data.
    pub fn data_reader(&mut self) -> DataReader<'_, E> {
        DataReader { session: self }
    }
}

/// Streams the current entry's data through [`io::Read`].
///
/// A failed read surfaces the session's status as an [`io::Error`] wrapping
/// an [`Error`].
#[derive(Debug)]
pub struct DataReader<'a, E: Engine> {
    session: &'a mut Session<E>,
}

impl<E: Engine> Read for DataReader<'_, E> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.session.read_into(buf) {
            Some(count) => Ok(count),
            None => {
                let err = self.session.status().to_error().unwrap_or(Error::Archive {
                    code: ErrorCode::Misc,
                    message: "read data failed".to_string(),
                });
                Err(io::Error::other(err))
            }
        }
    }
}
