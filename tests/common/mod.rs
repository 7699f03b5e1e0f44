//! Shared fixture builders for integration tests.
//!
//! Every archive is built in memory with the same crates the engine reads
//! with, so tests never depend on files checked into the repository.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::Write;

/// Modification time stamped on every tar entry.
pub const MTIME: u64 = 1_700_000_000;

/// Builds a ustar archive of regular files.
pub fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    tar_with(|builder| {
        for (path, data) in entries {
            append_file(builder, path, data);
        }
    })
}

/// Builds a tar archive with full control over the builder.
pub fn tar_with(build: impl FnOnce(&mut tar::Builder<Vec<u8>>)) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    build(&mut builder);
    builder.into_inner().unwrap()
}

/// Appends a regular file with mode 0644.
pub fn append_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8]) {
    let mut header = tar::Header::new_ustar();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(MTIME);
    builder.append_data(&mut header, path, data).unwrap();
}

/// Appends a directory entry.
pub fn append_dir(builder: &mut tar::Builder<Vec<u8>>, path: &str) {
    let mut header = tar::Header::new_ustar();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    header.set_mtime(MTIME);
    builder.append_data(&mut header, path, std::io::empty()).unwrap();
}

/// Appends a symbolic or hard link.
pub fn append_link(builder: &mut tar::Builder<Vec<u8>>, kind: tar::EntryType, path: &str, target: &str) {
    let mut header = tar::Header::new_ustar();
    header.set_entry_type(kind);
    header.set_size(0);
    header.set_mode(0o644);
    header.set_mtime(MTIME);
    header.set_link_name(target).unwrap();
    builder.append_data(&mut header, path, std::io::empty()).unwrap();
}

/// Appends a file whose name is written verbatim, bypassing the builder's
/// path checks. Used for traversal fixtures such as `../evil.txt`.
pub fn append_raw_name(builder: &mut tar::Builder<Vec<u8>>, name: &str, data: &[u8]) {
    let mut header = tar::Header::new_ustar();
    let slot = &mut header.as_old_mut().name;
    slot[..name.len()].copy_from_slice(name.as_bytes());
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(MTIME);
    header.set_cksum();
    builder.append(&header, data).unwrap();
}

/// Builds a zip archive, encrypting every file with ZipCrypto when a
/// password is given.
#[cfg(feature = "zip")]
pub fn zip_bytes(entries: &[(&str, &[u8])], password: Option<&str>) -> Vec<u8> {
    use zip::unstable::write::FileOptionsExt;
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let mut options = SimpleFileOptions::default().unix_permissions(0o644);
    if let Some(password) = password {
        options = options.with_deprecated_encryption(password.as_bytes());
    }
    for (path, data) in entries {
        writer.start_file(*path, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Builds a zip archive with every file encrypted as AES-256.
#[cfg(feature = "zip")]
pub fn zip_aes_bytes(entries: &[(&str, &[u8])], password: &str) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().with_aes_encryption(zip::AesMode::Aes256, password);
    for (path, data) in entries {
        writer.start_file(*path, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Compresses `data` as a gzip member.
#[cfg(feature = "deflate")]
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Compresses `data` as a bzip2 stream.
#[cfg(feature = "bzip2")]
pub fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Compresses `data` as an xz stream.
#[cfg(feature = "xz")]
pub fn xz(data: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Compresses `data` as a legacy lzma-alone stream.
#[cfg(feature = "xz")]
pub fn lzma(data: &[u8]) -> Vec<u8> {
    let options = xz2::stream::LzmaOptions::new_preset(6).unwrap();
    let stream = xz2::stream::Stream::new_lzma_encoder(&options).unwrap();
    let mut encoder = xz2::write::XzEncoder::new_stream(Vec::new(), stream);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Compresses `data` as a zstd frame.
#[cfg(feature = "zstd")]
pub fn zstd(data: &[u8]) -> Vec<u8> {
    zstd::encode_all(data, 3).unwrap()
}

/// Deterministic payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}
