//! Zstandard filter decoder.

use std::io::{self, BufReader, Read};

use zstd::stream::read::Decoder as FrameDecoder;

use super::Decoder;
use crate::format::FilterKind;

/// ZSTD decoder.
///
/// Consecutive frames are decoded back to back.
pub struct ZstdDecoder<R> {
    inner: FrameDecoder<'static, BufReader<R>>,
}

impl<R> std::fmt::Debug for ZstdDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> ZstdDecoder<R> {
    /// Creates a new ZSTD decoder.
    pub fn new(input: R) -> io::Result<Self> {
        let decoder = FrameDecoder::new(input)?;
        Ok(Self { inner: decoder })
    }
}

impl<R: Read + Send> Read for ZstdDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for ZstdDecoder<R> {
    fn filter(&self) -> FilterKind {
        FilterKind::Zstd
    }
}
