//! xz and lzma-alone filter decoders.

use std::io::{self, Read};

use xz2::read::XzDecoder as XzStreamDecoder;
use xz2::stream::Stream;

use super::Decoder;
use crate::format::FilterKind;

/// xz decoder.
///
/// Concatenated xz streams are decoded as one continuous stream.
pub struct XzDecoder<R: Read> {
    inner: XzStreamDecoder<R>,
}

impl<R: Read> std::fmt::Debug for XzDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XzDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> XzDecoder<R> {
    /// Creates a new xz decoder.
    pub fn new(input: R) -> Self {
        Self {
            inner: XzStreamDecoder::new_multi_decoder(input),
        }
    }
}

impl<R: Read + Send> Read for XzDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for XzDecoder<R> {
    fn filter(&self) -> FilterKind {
        FilterKind::Xz
    }
}

/// Legacy `.lzma` decoder.
pub struct LzmaAloneDecoder<R: Read> {
    inner: XzStreamDecoder<R>,
}

impl<R: Read> std::fmt::Debug for LzmaAloneDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaAloneDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> LzmaAloneDecoder<R> {
    /// Creates a new lzma-alone decoder without a memory limit.
    pub fn new(input: R) -> io::Result<Self> {
        let stream = Stream::new_lzma_decoder(u64::MAX)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        Ok(Self {
            inner: XzStreamDecoder::new_stream(input, stream),
        })
    }
}

impl<R: Read + Send> Read for LzmaAloneDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for LzmaAloneDecoder<R> {
    fn filter(&self) -> FilterKind {
        FilterKind::Lzma
    }
}
