//! Container formats and compression filters a session can enable.
//!
//! A session's capability set is a list of [`FormatKind`]s (how entries are
//! laid out) and [`FilterKind`]s (how the whole stream is compressed).
//! Filters stack: a `.tar.gz` is the `Tar` format under a `Gzip` filter.

pub mod detect;

use std::fmt;

/// Maximum number of filters the engine will stack on one input.
pub const MAX_FILTER_DEPTH: usize = 4;

/// Container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// POSIX tar: v7, ustar, GNU and pax variants.
    Tar,
    /// ZIP archive.
    Zip,
    /// A bare compressed stream exposed as a single entry named `data`.
    Raw,
}

impl FormatKind {
    /// Every format, strongest signature first.
    pub const ALL: [FormatKind; 3] = [FormatKind::Zip, FormatKind::Tar, FormatKind::Raw];

    /// Returns a human-readable name for this format.
    pub fn name(&self) -> &'static str {
        match self {
            FormatKind::Tar => "tar",
            FormatKind::Zip => "zip",
            FormatKind::Raw => "raw",
        }
    }

    /// Returns the typical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatKind::Tar => "tar",
            FormatKind::Zip => "zip",
            FormatKind::Raw => "",
        }
    }

    /// Returns true for formats that accept almost any input.
    ///
    /// These are left out when probing the contents of an entry for a
    /// nested archive, where a false positive would swallow ordinary files.
    pub fn is_prone_to_false_positives(&self) -> bool {
        matches!(self, FormatKind::Raw)
    }

    /// Returns the formats enabled for a session.
    ///
    /// Recursive sessions get the reduced set without
    /// [false-positive prone](Self::is_prone_to_false_positives) formats.
    pub fn enabled_set(recursive: bool) -> impl Iterator<Item = FormatKind> {
        Self::ALL
            .into_iter()
            .filter(move |format| !recursive || !format.is_prone_to_false_positives())
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whole-stream compression filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// gzip (RFC 1952), including concatenated members.
    Gzip,
    /// bzip2, including concatenated streams.
    Bzip2,
    /// xz container.
    Xz,
    /// Legacy `.lzma` ("lzma-alone") stream.
    Lzma,
    /// Zstandard frames.
    Zstd,
}

impl FilterKind {
    /// Every filter, in detection order.
    pub const ALL: [FilterKind; 5] = [
        FilterKind::Gzip,
        FilterKind::Bzip2,
        FilterKind::Xz,
        FilterKind::Zstd,
        FilterKind::Lzma,
    ];

    /// Returns a human-readable name for this filter.
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Gzip => "gzip",
            FilterKind::Bzip2 => "bzip2",
            FilterKind::Xz => "xz",
            FilterKind::Lzma => "lzma",
            FilterKind::Zstd => "zstd",
        }
    }

    /// Returns the typical file extension for this filter.
    pub fn extension(&self) -> &'static str {
        match self {
            FilterKind::Gzip => "gz",
            FilterKind::Bzip2 => "bz2",
            FilterKind::Xz => "xz",
            FilterKind::Lzma => "lzma",
            FilterKind::Zstd => "zst",
        }
    }

    /// Returns whether this build can decode the filter.
    pub fn is_supported(&self) -> bool {
        match self {
            FilterKind::Gzip => cfg!(feature = "deflate"),
            FilterKind::Bzip2 => cfg!(feature = "bzip2"),
            FilterKind::Xz | FilterKind::Lzma => cfg!(feature = "xz"),
            FilterKind::Zstd => cfg!(feature = "zstd"),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
