//! Streaming decoders for whole-stream compression filters.
//!
//! Every decoder wraps a boxed reader and is itself a reader, so filters can
//! be stacked: the engine feeds the output of one decoder into the detection
//! step for the next.

#[cfg(feature = "deflate")]
pub mod deflate;

#[cfg(feature = "bzip2")]
pub mod bzip2;

#[cfg(feature = "xz")]
pub mod xz;

#[cfg(feature = "zstd")]
pub mod zstd;

use std::io::{self, Read};

use crate::format::FilterKind;

#[cfg(feature = "deflate")]
pub use deflate::GzipDecoder;

#[cfg(feature = "bzip2")]
pub use bzip2::Bzip2Decoder;

#[cfg(feature = "xz")]
pub use xz::{LzmaAloneDecoder, XzDecoder};

#[cfg(feature = "zstd")]
pub use self::zstd::ZstdDecoder;

/// Type-erased byte source every decoder reads from.
pub type BoxedReader = Box<dyn Read + Send>;

/// A decoder that takes compressed data and produces uncompressed output.
pub trait Decoder: Read + Send {
    /// Returns the filter this decoder undoes.
    fn filter(&self) -> FilterKind;
}

/// Builds a decoder for the given filter.
///
/// # Errors
///
/// Returns [`io::ErrorKind::Unsupported`] if the filter was compiled out, or
/// the decoder's own error if it fails to initialize.
pub fn build_decoder(input: BoxedReader, filter: FilterKind) -> io::Result<Box<dyn Decoder>> {
    match filter {
        #[cfg(feature = "deflate")]
        FilterKind::Gzip => Ok(Box::new(deflate::GzipDecoder::new(input))),

        #[cfg(feature = "bzip2")]
        FilterKind::Bzip2 => Ok(Box::new(bzip2::Bzip2Decoder::new(input))),

        #[cfg(feature = "xz")]
        FilterKind::Xz => Ok(Box::new(xz::XzDecoder::new(input))),

        #[cfg(feature = "xz")]
        FilterKind::Lzma => Ok(Box::new(xz::LzmaAloneDecoder::new(input)?)),

        #[cfg(feature = "zstd")]
        FilterKind::Zstd => Ok(Box::new(self::zstd::ZstdDecoder::new(input)?)),

        #[allow(unreachable_patterns)]
        other => {
            drop(input);
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} support is not compiled in", other.name()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn boxed(data: &'static [u8]) -> BoxedReader {
        Box::new(Cursor::new(data))
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_build_gzip_decoder() {
        let decoder = build_decoder(boxed(b""), FilterKind::Gzip).unwrap();
        assert_eq!(decoder.filter(), FilterKind::Gzip);
    }

    #[cfg(feature = "xz")]
    #[test]
    fn test_build_lzma_decoder() {
        let decoder = build_decoder(boxed(b""), FilterKind::Lzma).unwrap();
        assert_eq!(decoder.filter(), FilterKind::Lzma);
    }

    #[cfg(not(feature = "zstd"))]
    #[test]
    fn test_compiled_out_filter_is_unsupported() {
        let err = build_decoder(boxed(b""), FilterKind::Zstd).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
