//! Entry timestamps.
//!
//! Archive formats disagree about time: tar stores whole seconds (pax adds a
//! decimal fraction), zip stores a local DOS date with two-second
//! resolution. [`Timestamp`] normalizes all of them to seconds and
//! nanoseconds relative to the Unix epoch.
//!
//! # Example
//!
//! ```rust
//! use archive_bridge::Timestamp;
//!
//! let ts = Timestamp::from_unix(1_700_000_000, 250_000_000).unwrap();
//! assert_eq!(ts.as_unix_secs(), 1_700_000_000);
//! assert_eq!(ts.as_unix_millis(), 1_700_000_000_250);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SECOND: u32 = 1_000_000_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// A point in time attached to an archive entry.
///
/// Ordering follows chronological order; pre-epoch times have negative
/// seconds and a non-negative nanosecond part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    /// Unix epoch (January 1, 1970, UTC).
    pub const UNIX_EPOCH: Self = Self { secs: 0, nanos: 0 };

    /// Creates a timestamp from Unix seconds and a sub-second part.
    ///
    /// Returns `None` if `nanos` is not below one second.
    pub const fn from_unix(secs: i64, nanos: u32) -> Option<Self> {
        if nanos >= NANOS_PER_SECOND {
            return None;
        }
        Some(Self { secs, nanos })
    }

    /// Creates a timestamp from whole Unix seconds.
    #[inline]
    pub const fn from_unix_secs(secs: i64) -> Self {
        Self { secs, nanos: 0 }
    }

    /// Creates a timestamp from a UTC calendar date and time of day.
    ///
    /// Returns `None` for out-of-range months, days or times.
    pub fn from_civil(
        year: i64,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Option<Self> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        if hour > 23 || minute > 59 || second > 60 {
            return None;
        }
        let days = days_from_civil(year, month, day);
        let secs = days
            .checked_mul(SECONDS_PER_DAY)?
            .checked_add(i64::from(hour * 3600 + minute * 60 + second))?;
        Some(Self::from_unix_secs(secs))
    }

    /// Parses a pax-style decimal time such as `1700000000.5` or `-12.25`.
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let secs: i64 = whole.parse().ok()?;
        let mut nanos: u32 = 0;
        for (i, digit) in fraction.bytes().take(9).enumerate() {
            nanos += u32::from(digit - b'0') * 10u32.pow(8 - i as u32);
        }
        if !negative {
            return Some(Self { secs, nanos });
        }
        if nanos == 0 {
            Some(Self { secs: -secs, nanos })
        } else {
            Some(Self {
                secs: -secs - 1,
                nanos: NANOS_PER_SECOND - nanos,
            })
        }
    }

    /// Creates a timestamp from a `SystemTime`.
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => {
                let secs = i64::try_from(duration.as_secs()).ok()?;
                Self::from_unix(secs, duration.subsec_nanos())
            }
            Err(e) => {
                let duration = e.duration();
                let secs = i64::try_from(duration.as_secs()).ok()?;
                match duration.subsec_nanos() {
                    0 => Some(Self::from_unix_secs(-secs)),
                    nanos => Self::from_unix(-secs - 1, NANOS_PER_SECOND - nanos),
                }
            }
        }
    }

    /// Returns the timestamp as Unix seconds, rounded towards negative infinity.
    #[inline]
    pub const fn as_unix_secs(&self) -> i64 {
        self.secs
    }

    /// Returns the nanoseconds past [`as_unix_secs`](Self::as_unix_secs).
    #[inline]
    pub const fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// Returns the timestamp as Unix milliseconds.
    pub fn as_unix_millis(&self) -> i64 {
        self.secs
            .saturating_mul(1000)
            .saturating_add(i64::from(self.nanos / 1_000_000))
    }

    /// Converts to `SystemTime`.
    pub fn as_system_time(&self) -> SystemTime {
        if self.secs >= 0 {
            UNIX_EPOCH + Duration::new(self.secs.unsigned_abs(), self.nanos)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.secs.unsigned_abs())
                + Duration::from_nanos(u64::from(self.nanos))
        }
    }

    /// Converts to a [`filetime::FileTime`] for restoring file metadata.
    pub fn as_file_time(&self) -> filetime::FileTime {
        filetime::FileTime::from_unix_time(self.secs, self.nanos)
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year.rem_euclid(400);
    let month = i64::from(month);
    let shifted_month = if month > 2 { month - 3 } else { month + 9 };
    let day_of_year = (153 * shifted_month + 2) / 5 + i64::from(day) - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}
