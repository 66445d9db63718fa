//! Bucketed values for binned chart axes.
//!
//! A [`Bin`] coarsens an integer or a calendar date into a fixed-width
//! inclusive range. Integer buckets are aligned on `floor(value / size) * size`
//! so negative values land in the correct bucket. Date buckets use the same
//! arithmetic over whole days since the Unix epoch, which keeps them free of
//! timezone and DST drift.
//!
//! [`Bin::Empty`] stands for a missing value. It is a real bin, distinct from
//! the absence of a key, and sorts after every non-empty bin.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::value::EMPTY;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const UNIX_EPOCH_FROM_CE: i64 = 719_163;

/// Upper bound on the number of bins [`Bin::fill`] will produce.
pub const MAX_FILLED_BINS: usize = 100_000;

/// A bucketed integer or date range, or the empty sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum Bin {
    /// Inclusive integer range.
    Integer {
        /// First value in the bucket.
        start: i64,
        /// Last value in the bucket.
        end: i64,
    },
    /// Inclusive range of calendar days.
    Date {
        /// First day in the bucket.
        start: NaiveDate,
        /// Last day in the bucket.
        end: NaiveDate,
    },
    /// Missing value.
    Empty,
}

/// Raw input accepted by [`Bin::new_instance`].
#[derive(Debug, Clone, PartialEq)]
pub enum BinSource {
    /// No value.
    Missing,
    /// Integer value.
    Integer(i64),
    /// Calendar date.
    Date(NaiveDate),
    /// Timestamp, truncated to its day.
    DateTime(NaiveDateTime),
    /// Already-bucketed value, passed through.
    Bin(Bin),
    /// Any other kind of value, named for error reporting.
    Unsupported(&'static str),
}

impl From<i64> for BinSource {
    fn from(v: i64) -> Self {
        BinSource::Integer(v)
    }
}

impl From<i32> for BinSource {
    fn from(v: i32) -> Self {
        BinSource::Integer(i64::from(v))
    }
}

impl From<NaiveDate> for BinSource {
    fn from(v: NaiveDate) -> Self {
        BinSource::Date(v)
    }
}

impl From<NaiveDateTime> for BinSource {
    fn from(v: NaiveDateTime) -> Self {
        BinSource::DateTime(v)
    }
}

impl From<Bin> for BinSource {
    fn from(v: Bin) -> Self {
        BinSource::Bin(v)
    }
}

impl<T: Into<BinSource>> From<Option<T>> for BinSource {
    fn from(v: Option<T>) -> Self {
        v.map_or(BinSource::Missing, Into::into)
    }
}

fn day_number(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) - UNIX_EPOCH_FROM_CE
}

fn date_from_day(day: i64) -> NaiveDate {
    i32::try_from(day + UNIX_EPOCH_FROM_CE)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .unwrap_or(if day < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Start and end of the bucket of width `size` holding `value`.
///
/// Buckets at either end of the `i64` range are clipped to it.
fn bucket(value: i64, size: i64) -> (i64, i64) {
    let start = i128::from(value.div_euclid(size)) * i128::from(size);
    let end = start + i128::from(size) - 1;
    (clip(start), clip(end))
}

fn clip(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(if v < 0 { i64::MIN } else { i64::MAX })
}

/// Validate a requested bin size; `None` means a single-value bin.
pub(crate) fn checked_size(bin_size: Option<i64>) -> Result<i64> {
    match bin_size {
        None => Ok(1),
        Some(size) if size > 0 => Ok(size),
        Some(size) => Err(Error::ZeroBinSize(size)),
    }
}

impl Bin {
    /// Bucket `value` into a bin of width `bin_size`.
    ///
    /// A `bin_size` of `None` or `1` produces a single-value bin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroBinSize`] for a size of zero or below and
    /// [`Error::UnsupportedBinType`] for values that cannot be bucketed.
    pub fn new_instance(value: impl Into<BinSource>, bin_size: Option<i64>) -> Result<Self> {
        let size = checked_size(bin_size)?;
        match value.into() {
            BinSource::Missing => Ok(Bin::Empty),
            BinSource::Bin(bin) => Ok(bin),
            BinSource::Integer(v) => {
                let (start, end) = bucket(v, size);
                Ok(Bin::Integer { start, end })
            }
            BinSource::Date(date) => Ok(Self::date_bucket(date, size)),
            BinSource::DateTime(ts) => Ok(Self::date_bucket(ts.date(), size)),
            BinSource::Unsupported(kind) => Err(Error::UnsupportedBinType(kind.to_string())),
        }
    }

    fn date_bucket(date: NaiveDate, size: i64) -> Self {
        let (start, end) = bucket(day_number(date), size);
        Bin::Date {
            start: date_from_day(start),
            end: date_from_day(end),
        }
    }

    /// Whether this is the missing-value bin.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Bin::Empty)
    }

    /// Number of units covered (`end - start + 1`); zero for the empty bin.
    #[must_use]
    pub fn size(&self) -> i64 {
        match self {
            Bin::Integer { start, end } => end.saturating_sub(*start).saturating_add(1),
            Bin::Date { start, end } => day_number(*end) - day_number(*start) + 1,
            Bin::Empty => 0,
        }
    }

    /// Unit name used in error messages.
    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self {
            Bin::Integer { .. } => "integer",
            Bin::Date { .. } => "date",
            Bin::Empty => "empty",
        }
    }

    /// The bin of the same width starting right after this one ends.
    ///
    /// The empty bin and bins ending at the last representable value have
    /// no successor and return themselves.
    #[must_use]
    pub fn next_bin(&self) -> Self {
        match *self {
            Bin::Integer { end: i64::MAX, .. } => *self,
            Bin::Integer { end, .. } => Bin::Integer {
                start: end + 1,
                end: end.saturating_add(self.size()),
            },
            Bin::Date { end, .. } if end == NaiveDate::MAX => *self,
            Bin::Date { start, end } => {
                let (s, e) = (day_number(start), day_number(end));
                Bin::Date {
                    start: date_from_day(e + 1),
                    end: date_from_day(e + (e - s + 1)),
                }
            }
            Bin::Empty => Bin::Empty,
        }
    }

    /// Order two bins; the empty bin is greater than any other.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleBins`] when an integer bin is compared
    /// with a date bin.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering> {
        match (self, other) {
            (Bin::Empty, Bin::Empty) => Ok(Ordering::Equal),
            (Bin::Empty, _) => Ok(Ordering::Greater),
            (_, Bin::Empty) => Ok(Ordering::Less),
            (Bin::Integer { start: a, end: ae }, Bin::Integer { start: b, end: be }) => {
                Ok(a.cmp(b).then(ae.cmp(be)))
            }
            (Bin::Date { start: a, end: ae }, Bin::Date { start: b, end: be }) => {
                Ok(a.cmp(b).then(ae.cmp(be)))
            }
            (left, right) => Err(Error::IncompatibleBins {
                left: left.unit(),
                right: right.unit(),
            }),
        }
    }

    /// The contiguous run of bins spanning the observed non-empty bins.
    ///
    /// Gaps between observed bins are filled with [`Bin::next_bin`] so every
    /// series can be aligned on the same axis. Empty bins are ignored; the
    /// caller decides whether to append one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleBins`] if the input mixes units and
    /// [`Error::TooManyBins`] if the run would exceed [`MAX_FILLED_BINS`].
    pub fn fill<'a>(bins: impl IntoIterator<Item = &'a Bin>) -> Result<Vec<Bin>> {
        let mut min: Option<Bin> = None;
        let mut max: Option<Bin> = None;
        for bin in bins.into_iter().filter(|b| !b.is_empty()) {
            min = Some(match min {
                Some(m) if m.try_cmp(bin)? != Ordering::Greater => m,
                _ => *bin,
            });
            max = Some(match max {
                Some(m) if m.try_cmp(bin)? != Ordering::Less => m,
                _ => *bin,
            });
        }
        let (Some(first), Some(last)) = (min, max) else {
            return Ok(Vec::new());
        };

        let mut filled = vec![first];
        let mut current = first;
        while current.try_cmp(&last)? == Ordering::Less {
            let next = current.next_bin();
            if next == current {
                break;
            }
            if filled.len() >= MAX_FILLED_BINS {
                return Err(Error::TooManyBins {
                    limit: MAX_FILLED_BINS,
                });
            }
            filled.push(next);
            current = next;
        }
        Ok(filled)
    }
}

impl PartialOrd for Bin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other).ok()
    }
}

impl fmt::Display for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bin::Integer { start, end } if start == end => write!(f, "{end}"),
            Bin::Integer { start, end } => write!(f, "{start} - {end}"),
            Bin::Date { start, end } if start == end => write!(f, "{}", end.format("%Y-%m-%d")),
            Bin::Date { start, end } => write!(
                f,
                "{} - {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
            Bin::Empty => f.write_str(EMPTY),
        }
    }
}


// ============================================================================
// Property-based tests with proptest
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Every value lands inside a bucket of exactly the requested width.
        #[test]
        fn prop_bucket_contains_value(value in -1_000_000i64..1_000_000, size in 1i64..500) {
            let bin = Bin::new_instance(value, Some(size)).unwrap();
            let Bin::Integer { start, end } = bin else {
                return Err(TestCaseError::fail("expected integer bin"));
            };
            prop_assert!(start <= value && value <= end);
            prop_assert_eq!(end - start + 1, size);
        }

        /// Buckets anywhere in the `i64` range hold their value.
        #[test]
        fn prop_bucket_full_range(value in any::<i64>(), size in 1i64..i64::MAX) {
            let bin = Bin::new_instance(value, Some(size)).unwrap();
            let Bin::Integer { start, end } = bin else {
                return Err(TestCaseError::fail("expected integer bin"));
            };
            prop_assert!(start <= value && value <= end);
            prop_assert!(bin.size() <= size);
        }

        /// The successor starts exactly one unit after the bin ends.
        #[test]
        fn prop_next_bin_contiguous(value in -100_000i64..100_000, size in 1i64..100) {
            let bin = Bin::new_instance(value, Some(size)).unwrap();
            let (Bin::Integer { end, .. }, Bin::Integer { start: next_start, end: next_end }) =
                (bin, bin.next_bin())
            else {
                return Err(TestCaseError::fail("expected integer bins"));
            };
            prop_assert_eq!(next_start, end + 1);
            prop_assert_eq!(next_end - next_start + 1, size);
        }

        /// Day buckets hold the day and keep their width across the epoch.
        #[test]
        fn prop_date_bucket_contains_day(offset in -20_000i64..20_000, size in 1i64..60) {
            let day = date_from_day(offset);
            let bin = Bin::new_instance(day, Some(size)).unwrap();
            let Bin::Date { start, end } = bin else {
                return Err(TestCaseError::fail("expected date bin"));
            };
            prop_assert!(start <= day && day <= end);
            prop_assert_eq!(bin.size(), size);
        }

        /// The empty bin is greater than any non-empty bin.
        #[test]
        fn prop_empty_is_greatest(value in any::<i32>(), size in 1i64..1000) {
            let bin = Bin::new_instance(value, Some(size)).unwrap();
            prop_assert_eq!(Bin::Empty.try_cmp(&bin).unwrap(), Ordering::Greater);
            prop_assert_eq!(Bin::Empty.try_cmp(&Bin::Empty).unwrap(), Ordering::Equal);
        }
    }
}
