//! gzip filter decoder.

use std::io::{self, Read};

use flate2::read::MultiGzDecoder;

use super::Decoder;
use crate::format::FilterKind;

/// gzip decoder.
///
/// Concatenated gzip members are decoded as one continuous stream, the way
/// `gzip -d` treats them.
pub struct GzipDecoder<R> {
    inner: MultiGzDecoder<R>,
}

impl<R> std::fmt::Debug for GzipDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzipDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> GzipDecoder<R> {
    /// Creates a new gzip decoder.
    ///
    /// # Arguments
    ///
    /// * `input` - The compressed data source
    pub fn new(input: R) -> Self {
        Self {
            inner: MultiGzDecoder::new(input),
        }
    }
}

impl<R: Read + Send> Read for GzipDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for GzipDecoder<R> {
    fn filter(&self) -> FilterKind {
        FilterKind::Gzip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_gzip_decode() {
        let data = b"Hello, World! This is a test of gzip decoding.";
        let mut decoder = GzipDecoder::new(Cursor::new(gzip(data)));
        let mut output = Vec::new();
        decoder.read_to_end(&mut output).unwrap();
        assert_eq!(output, data);
        assert_eq!(decoder.filter(), FilterKind::Gzip);
    }

    #[test]
    fn test_gzip_concatenated_members() {
        let mut stream = gzip(b"first ");
        stream.extend(gzip(b"second"));
        let mut decoder = GzipDecoder::new(Cursor::new(stream));
        let mut output = Vec::new();
        decoder.read_to_end(&mut output).unwrap();
        assert_eq!(output, b"first second");
    }

    #[test]
    fn test_gzip_corrupt_input_errors() {
        let mut stream = gzip(b"some payload that will be damaged");
        let middle = stream.len() / 2;
        stream.truncate(middle);
        let mut decoder = GzipDecoder::new(Cursor::new(stream));
        let mut output = Vec::new();
        assert!(decoder.read_to_end(&mut output).is_err());
    }
}
