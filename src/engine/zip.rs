//! ZIP container backend.
//!
//! The central directory gives random access, so entries are listed from it
//! and each entry's data is decoded into memory on the first read. Encrypted
//! entries are tried against every registered passphrase in order.

use std::io::{Cursor, Read};
use std::sync::Arc;

use zip::ZipArchive;
use zip::result::ZipError;

use super::memory::Step;
use super::{EngineError, ErrorCode};
use crate::entry::{Entry, EntryType, PERMISSION_MASK};
use crate::passphrase::Passphrase;
use crate::timestamp::Timestamp;

type Archive = ZipArchive<Cursor<Arc<[u8]>>>;

struct Current {
    index: usize,
    data: Option<Cursor<Vec<u8>>>,
}

pub(super) struct ZipReader {
    archive: Archive,
    passphrases: Vec<Passphrase>,
    buffer_limit: u64,
    next_index: usize,
    current: Option<Current>,
    encrypted: bool,
}

impl ZipReader {
    pub(super) fn open(
        data: Arc<[u8]>,
        passphrases: Vec<Passphrase>,
        buffer_limit: u64,
    ) -> Result<Self, EngineError> {
        let mut archive = ZipArchive::new(Cursor::new(data)).map_err(zip_error)?;
        let mut encrypted = false;
        for index in 0..archive.len() {
            if archive.by_index_raw(index).map_err(zip_error)?.encrypted() {
                encrypted = true;
                break;
            }
        }
        Ok(Self {
            archive,
            passphrases,
            buffer_limit,
            next_index: 0,
            current: None,
            encrypted,
        })
    }

    pub(super) fn has_encrypted_entries(&self) -> bool {
        self.encrypted
    }

    pub(super) fn next_header(&mut self, entry: &mut Entry) -> Result<Step, EngineError> {
        self.current = None;
        if self.next_index >= self.archive.len() {
            return Ok(Step::Eof);
        }
        let index = self.next_index;
        self.next_index += 1;

        let (name, size, is_dir, mode, modified, encrypted) = {
            let file = self.archive.by_index_raw(index).map_err(zip_error)?;
            (
                file.name().to_string(),
                file.size(),
                file.is_dir(),
                file.unix_mode(),
                file.last_modified(),
                file.encrypted(),
            )
        };

        let fallback = if is_dir {
            EntryType::Directory
        } else {
            EntryType::File
        };
        let entry_type = mode.and_then(EntryType::from_mode).unwrap_or(fallback);
        entry.path = name;
        entry.entry_type = Some(entry_type);
        entry.permissions = mode
            .map(|m| m & PERMISSION_MASK)
            .filter(|&m| m != 0)
            .unwrap_or(if is_dir { 0o755 } else { 0o644 });
        entry.encrypted = encrypted;
        entry.modified = modified.and_then(|dt| {
            Timestamp::from_civil(
                i64::from(dt.year()),
                u32::from(dt.month()),
                u32::from(dt.day()),
                u32::from(dt.hour()),
                u32::from(dt.minute()),
                u32::from(dt.second()),
            )
        });

        let mut current = Current { index, data: None };
        match entry_type {
            EntryType::Symlink => {
                let target = load_entry(
                    &mut self.archive,
                    &self.passphrases,
                    index,
                    self.buffer_limit,
                )?;
                entry.symlink = Some(String::from_utf8_lossy(&target).into_owned());
                entry.size = Some(0);
                current.data = Some(Cursor::new(Vec::new()));
            }
            EntryType::Directory => {
                entry.size = Some(0);
                current.data = Some(Cursor::new(Vec::new()));
            }
            _ => entry.size = Some(size),
        }
        self.current = Some(current);
        Ok(Step::Ok)
    }

    pub(super) fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        let Some(current) = self.current.as_mut() else {
            return Err(EngineError::new(ErrorCode::Programmer, "No current zip entry"));
        };
        if current.data.is_none() {
            let bytes = load_entry(
                &mut self.archive,
                &self.passphrases,
                current.index,
                self.buffer_limit,
            )?;
            current.data = Some(Cursor::new(bytes));
        }
        match current.data.as_mut() {
            Some(data) => data
                .read(buf)
                .map_err(|e| EngineError::new(ErrorCode::Io, e.to_string())),
            None => Ok(0),
        }
    }
}

/// Decodes (and decrypts) one entry into memory.
fn load_entry(
    archive: &mut Archive,
    passphrases: &[Passphrase],
    index: usize,
    limit: u64,
) -> Result<Vec<u8>, EngineError> {
    let (encrypted, size) = {
        let file = archive.by_index_raw(index).map_err(zip_error)?;
        (file.encrypted(), file.size())
    };
    if size > limit {
        return Err(EngineError::new(
            ErrorCode::OutOfMemory,
            format!("Entry of {size} bytes exceeds the {limit}-byte buffer limit"),
        ));
    }
    let capacity = usize::try_from(size).map_err(|_| {
        EngineError::new(ErrorCode::OutOfMemory, "Entry size exceeds address space")
    })?;
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(capacity).map_err(|e| {
        EngineError::new(
            ErrorCode::OutOfMemory,
            format!("Failed to allocate {capacity} bytes for entry data: {e}"),
        )
    })?;

    if !encrypted {
        let file = archive.by_index(index).map_err(zip_error)?;
        read_bounded(file, &mut buffer, limit)?;
        return Ok(buffer);
    }

    if passphrases.is_empty() {
        return Err(EngineError::new(
            ErrorCode::Passphrase,
            "Passphrase required for this entry",
        ));
    }
    for passphrase in passphrases {
        match archive.by_index_decrypt(index, passphrase.as_bytes()) {
            Ok(file) => match read_bounded(file, &mut buffer, limit) {
                Ok(()) => return Ok(buffer),
                Err(err) if err.code == ErrorCode::OutOfMemory => return Err(err),
                // ZipCrypto lets one wrong key in 256 past the header check;
                // the CRC catches it after decoding.
                Err(err) => {
                    log::debug!("passphrase rejected after decoding: {}", err.message);
                    buffer.clear();
                }
            },
            Err(ZipError::InvalidPassword) => {}
            Err(err) => return Err(zip_error(err)),
        }
    }
    Err(EngineError::new(ErrorCode::Passphrase, "Incorrect passphrase"))
}

fn read_bounded<R: Read>(file: R, buffer: &mut Vec<u8>, limit: u64) -> Result<(), EngineError> {
    let read = file
        .take(limit.saturating_add(1))
        .read_to_end(buffer)
        .map_err(|e| EngineError::new(ErrorCode::Misc, format!("Failed to decode zip entry: {e}")))?;
    if read as u64 > limit {
        return Err(EngineError::new(
            ErrorCode::OutOfMemory,
            format!("Entry data exceeds the {limit}-byte buffer limit"),
        ));
    }
    Ok(())
}

fn zip_error(err: ZipError) -> EngineError {
    let code = match &err {
        ZipError::InvalidPassword => return EngineError::new(ErrorCode::Passphrase, "Incorrect passphrase"),
        ZipError::Io(_) => ErrorCode::Io,
        ZipError::InvalidArchive(_) => ErrorCode::FileFormat,
        _ => ErrorCode::Misc,
    };
    EngineError::new(code, err.to_string())
}
