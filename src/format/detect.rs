//! Signature detection for formats and filters.
//!
//! Detection works on the first [`PEEK_LEN`] bytes of a (possibly already
//! decompressed) stream. Container formats are checked before filters so
//! that a tar archive whose first file name happens to look like a
//! compressed header is still read as tar.

use super::{FilterKind, FormatKind};

/// Number of bytes inspected when detecting a format or filter.
pub const PEEK_LEN: usize = 1024;

/// Size of a tar header block.
pub(crate) const TAR_BLOCK_SIZE: usize = 512;

/// Known filter signatures.
const FILTER_SIGNATURES: &[(&[u8], FilterKind)] = &[
    // gzip: 0x1F 0x8B, deflate method
    (&[0x1F, 0x8B, 0x08], FilterKind::Gzip),
    // XZ: 0xFD '7' 'z' 'X' 'Z' 0x00
    (&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00], FilterKind::Xz),
    // Zstd: 0x28 0xB5 0x2F 0xFD
    (&[0x28, 0xB5, 0x2F, 0xFD], FilterKind::Zstd),
];

/// ZIP signatures: local file header and empty archive.
const ZIP_SIGNATURES: &[&[u8]] = &[&[0x50, 0x4B, 0x03, 0x04], &[0x50, 0x4B, 0x05, 0x06]];

/// TAR USTAR signature at offset 257.
const TAR_USTAR_SIGNATURE: &[u8] = b"ustar";

/// bzip2 block and end-of-stream magics following the `BZh` header.
const BZIP2_BLOCK_MAGIC: [u8; 6] = [0x31, 0x41, 0x59, 0x26, 0x53, 0x59];
const BZIP2_EOS_MAGIC: [u8; 6] = [0x17, 0x72, 0x45, 0x38, 0x50, 0x90];

/// Detects a container format from the head of a stream.
///
/// Only signature-bearing formats are reported; [`FormatKind::Raw`] is a
/// fallback the engine decides on itself.
pub fn detect_format(head: &[u8]) -> Option<FormatKind> {
    if is_zip(head) {
        return Some(FormatKind::Zip);
    }
    if is_tar(head) {
        return Some(FormatKind::Tar);
    }
    None
}

/// Detects a compression filter from the head of a stream.
pub fn detect_filter(head: &[u8]) -> Option<FilterKind> {
    for (signature, filter) in FILTER_SIGNATURES {
        if head.starts_with(signature) {
            return Some(*filter);
        }
    }
    if is_bzip2(head) {
        return Some(FilterKind::Bzip2);
    }
    if is_lzma_alone(head) {
        return Some(FilterKind::Lzma);
    }
    None
}

/// Returns true if `head` starts with a ZIP signature.
pub fn is_zip(head: &[u8]) -> bool {
    ZIP_SIGNATURES.iter().any(|signature| head.starts_with(signature))
}

/// Returns true if `head` starts with a tar header block.
///
/// Accepts ustar/GNU headers by magic, and v7 headers by checksum. An
/// archive holding nothing but its two-block end marker is tar as well.
pub fn is_tar(head: &[u8]) -> bool {
    if head.len() < TAR_BLOCK_SIZE {
        return false;
    }
    let block = &head[..TAR_BLOCK_SIZE];
    if block.iter().all(|&b| b == 0) {
        return head.len() >= 2 * TAR_BLOCK_SIZE
            && head[..2 * TAR_BLOCK_SIZE].iter().all(|&b| b == 0);
    }
    if block[257..262] == *TAR_USTAR_SIGNATURE {
        return true;
    }
    tar_checksum_matches(block)
}

/// Verifies the header checksum of a 512-byte tar block.
///
/// Both the unsigned sum (POSIX) and the signed sum (historic Sun tar) are
/// accepted.
pub(crate) fn tar_checksum_matches(block: &[u8]) -> bool {
    let Some(field) = block.get(148..156) else {
        return false;
    };
    let Some(stored) = parse_octal(field) else {
        return false;
    };
    let mut unsigned: u32 = 0;
    let mut signed: i32 = 0;
    for (i, &byte) in block[..TAR_BLOCK_SIZE].iter().enumerate() {
        let byte = if (148..156).contains(&i) { b' ' } else { byte };
        unsigned += u32::from(byte);
        signed += i32::from(byte as i8);
    }
    stored == unsigned || i64::from(stored) == i64::from(signed)
}

/// Parses a NUL/space terminated octal header field.
fn parse_octal(field: &[u8]) -> Option<u32> {
    let digits: Vec<u8> = field
        .iter()
        .copied()
        .skip_while(|&b| b == b' ')
        .take_while(|&b| b != 0 && b != b' ')
        .collect();
    if digits.is_empty() {
        return None;
    }
    let text = std::str::from_utf8(&digits).ok()?;
    u32::from_str_radix(text, 8).ok()
}

fn is_bzip2(head: &[u8]) -> bool {
    if head.len() < 4 || &head[..3] != b"BZh" || !(b'1'..=b'9').contains(&head[3]) {
        return false;
    }
    match head.get(4..10) {
        Some(magic) => magic == BZIP2_BLOCK_MAGIC || magic == BZIP2_EOS_MAGIC,
        None => false,
    }
}

/// Heuristic check for a legacy `.lzma` header.
///
/// The format has no magic number. The header is 13 bytes: a properties
/// byte, a 32-bit dictionary size and a 64-bit uncompressed size, followed
/// by a range-coder stream whose first byte is always zero.
fn is_lzma_alone(head: &[u8]) -> bool {
    if head.len() < 14 {
        return false;
    }
    // lc + lp * 9 + pb * 45 with lc <= 8, lp <= 4, pb <= 4
    if head[0] > 224 {
        return false;
    }
    let dict_size = u32::from_le_bytes([head[1], head[2], head[3], head[4]]);
    let dict_ok = dict_size == u32::MAX
        || (dict_size >= 1 << 12 && (dict_size.is_power_of_two() || is_three_times_power_of_two(dict_size)));
    if !dict_ok {
        return false;
    }
    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&head[5..13]);
    let uncompressed = u64::from_le_bytes(size_bytes);
    if uncompressed != u64::MAX && uncompressed >= 1 << 48 {
        return false;
    }
    head[13] == 0
}

fn is_three_times_power_of_two(value: u32) -> bool {
    value % 3 == 0 && (value / 3).is_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ustar_block(name: &str) -> Vec<u8> {
        let mut header = tar::Header::new_ustar();
        header.set_path(name).unwrap();
        header.set_size(0);
        header.set_mode(0o644);
        header.set_cksum();
        header.as_bytes().to_vec()
    }

    fn v7_block(name: &str) -> Vec<u8> {
        let mut header = tar::Header::new_old();
        header.set_path(name).unwrap();
        header.set_size(0);
        header.set_mode(0o644);
        header.set_cksum();
        header.as_bytes().to_vec()
    }

    #[test]
    fn test_detect_zip_signature() {
        let data = [0x50, 0x4B, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(detect_format(&data), Some(FormatKind::Zip));
        let empty = [0x50, 0x4B, 0x05, 0x06, 0x00, 0x00];
        assert_eq!(detect_format(&empty), Some(FormatKind::Zip));
    }

    #[test]
    fn test_detect_ustar() {
        assert_eq!(detect_format(&ustar_block("a.txt")), Some(FormatKind::Tar));
    }

    #[test]
    fn test_detect_v7_tar_by_checksum() {
        let block = v7_block("legacy.txt");
        assert_ne!(&block[257..262], TAR_USTAR_SIGNATURE);
        assert_eq!(detect_format(&block), Some(FormatKind::Tar));
    }

    #[test]
    fn test_corrupt_checksum_is_not_tar() {
        let mut block = v7_block("legacy.txt");
        block[0] ^= 0x01;
        assert_eq!(detect_format(&block), None);
    }

    #[test]
    fn test_zero_block_is_not_tar() {
        assert_eq!(detect_format(&[0u8; 512]), None);
    }

    #[test]
    fn test_end_marker_is_empty_tar() {
        assert_eq!(detect_format(&[0u8; 1024]), Some(FormatKind::Tar));
        let mut marker = [0u8; 1024];
        marker[700] = 1;
        assert_eq!(detect_format(&marker), None);
    }

    #[test]
    fn test_short_input_is_not_tar() {
        let block = ustar_block("a.txt");
        assert_eq!(detect_format(&block[..300]), None);
    }

    #[test]
    fn test_detect_gzip_signature() {
        let data = [0x1F, 0x8B, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(detect_filter(&data), Some(FilterKind::Gzip));
    }

    #[test]
    fn test_detect_xz_signature() {
        let data = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, 0x00, 0x00];
        assert_eq!(detect_filter(&data), Some(FilterKind::Xz));
    }

    #[test]
    fn test_detect_bzip2_signature() {
        let data = [0x42, 0x5A, 0x68, 0x39, 0x31, 0x41, 0x59, 0x26, 0x53, 0x59];
        assert_eq!(detect_filter(&data), Some(FilterKind::Bzip2));
        // "BZh9" followed by text is not a bzip2 stream.
        assert_eq!(detect_filter(b"BZh9 is a plain sentence"), None);
    }

    #[test]
    fn test_detect_zstd_signature() {
        let data = [0x28, 0xB5, 0x2F, 0xFD, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(detect_filter(&data), Some(FilterKind::Zstd));
    }

    #[test]
    fn test_detect_lzma_alone() {
        let mut data = vec![0x5D, 0x00, 0x00, 0x10, 0x00];
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        data.push(0x00);
        data.extend_from_slice(&[0x12, 0x34]);
        assert_eq!(detect_filter(&data), Some(FilterKind::Lzma));
    }

    #[test]
    fn test_lzma_rejects_odd_dictionary() {
        let mut data = vec![0x5D, 0x01, 0x23, 0x45, 0x00];
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        data.push(0x00);
        assert_eq!(detect_filter(&data), None);
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_filter(b"hello world, this is text"), None);
        assert_eq!(detect_format(b"hello world, this is text"), None);
        assert_eq!(detect_filter(&[]), None);
        assert_eq!(detect_format(&[]), None);
    }
}
