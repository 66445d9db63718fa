//! Attribute values produced by grouping options.
//!
//! Every grouping dimension resolves to an [`AttributeValue`]. Missing data is
//! represented by [`AttributeValue::Empty`] (or [`Bin::Empty`] on binned
//! dimensions), both rendered as the single canonical [`EMPTY`] token.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::binning::{Bin, BinSource};

/// Canonical label of the empty/default category.
pub const EMPTY: &str = "(Empty)";

/// A value in one grouping dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// A missing value.
    Empty,
    /// A text value.
    Text(String),
    /// An integer value.
    Integer(i64),
    /// A calendar date.
    Date(NaiveDate),
    /// A bucketed value.
    Bin(Bin),
    /// A label carrying an explicit sort rank.
    Ranked(Ranked),
    /// A numeric range such as an age group.
    Range(NumericRange),
}

/// A display label with an explicit continuous rank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Ranked {
    /// Display label.
    pub label: String,
    /// Sort rank, ascending.
    pub rank: i64,
}

impl Ranked {
    /// Create a ranked label.
    #[must_use]
    pub fn new(label: impl Into<String>, rank: i64) -> Self {
        Self {
            label: label.into(),
            rank,
        }
    }
}

/// A numeric range with optional bounds, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NumericRange {
    /// Lower bound, `None` if unbounded below.
    pub lower: Option<i64>,
    /// Upper bound, `None` if unbounded above.
    pub upper: Option<i64>,
}

impl NumericRange {
    /// Create a range.
    #[must_use]
    pub const fn new(lower: Option<i64>, upper: Option<i64>) -> Self {
        Self { lower, upper }
    }

    /// Whether `value` falls within the range.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        self.lower.map_or(true, |l| value >= l) && self.upper.map_or(true, |u| value <= u)
    }
}

impl fmt::Display for NumericRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) => write!(f, "{l} - {u}"),
            (Some(l), None) => write!(f, "{l}+"),
            (None, Some(u)) => write!(f, "<= {u}"),
            (None, None) => f.write_str(EMPTY),
        }
    }
}

impl AttributeValue {
    /// Create a text value, mapping blank text to [`AttributeValue::Empty`].
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            AttributeValue::Empty
        } else {
            AttributeValue::Text(s)
        }
    }

    /// Whether this value represents missing data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Empty | AttributeValue::Bin(Bin::Empty) => true,
            AttributeValue::Range(r) => r.lower.is_none() && r.upper.is_none(),
            _ => false,
        }
    }

    /// Get as bin, or None if this is not a bucketed value.
    #[must_use]
    pub fn as_bin(&self) -> Option<&Bin> {
        match self {
            AttributeValue::Bin(b) => Some(b),
            _ => None,
        }
    }

    /// Get as range, or None if this is not a range.
    #[must_use]
    pub fn as_range(&self) -> Option<&NumericRange> {
        match self {
            AttributeValue::Range(r) => Some(r),
            _ => None,
        }
    }

    /// Continuous rank for values that sort along a continuous scale.
    ///
    /// Dates rank by day number and ranked labels by their explicit rank.
    #[must_use]
    pub fn continuous_rank(&self) -> Option<i64> {
        match self {
            AttributeValue::Date(d) => Some(i64::from(d.num_days_from_ce())),
            AttributeValue::Ranked(r) => Some(r.rank),
            _ => None,
        }
    }

    /// Display label of the value.
    #[must_use]
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Empty => f.write_str(EMPTY),
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Integer(v) => write!(f, "{v}"),
            AttributeValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            AttributeValue::Bin(b) => write!(f, "{b}"),
            AttributeValue::Ranked(r) => f.write_str(&r.label),
            AttributeValue::Range(r) => write!(f, "{r}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::text(s)
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::text(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<NaiveDate> for AttributeValue {
    fn from(v: NaiveDate) -> Self {
        AttributeValue::Date(v)
    }
}

impl From<Bin> for AttributeValue {
    fn from(v: Bin) -> Self {
        AttributeValue::Bin(v)
    }
}

impl From<Ranked> for AttributeValue {
    fn from(v: Ranked) -> Self {
        AttributeValue::Ranked(v)
    }
}

impl From<NumericRange> for AttributeValue {
    fn from(v: NumericRange) -> Self {
        AttributeValue::Range(v)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AttributeValue::Empty, Into::into)
    }
}

impl From<&AttributeValue> for BinSource {
    fn from(v: &AttributeValue) -> Self {
        match v {
            AttributeValue::Empty => BinSource::Missing,
            AttributeValue::Integer(i) => BinSource::Integer(*i),
            AttributeValue::Date(d) => BinSource::Date(*d),
            AttributeValue::Bin(b) => BinSource::Bin(*b),
            AttributeValue::Text(_) => BinSource::Unsupported("text"),
            AttributeValue::Ranked(_) => BinSource::Unsupported("ranked"),
            AttributeValue::Range(_) => BinSource::Unsupported("range"),
        }
    }
}

/// What a grouping option yields for one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The event has a single value in this dimension.
    One(AttributeValue),
    /// The event belongs to several categories of this dimension.
    Many(Vec<AttributeValue>),
}

impl Resolved {
    /// A single value.
    pub fn one(value: impl Into<AttributeValue>) -> Self {
        Resolved::One(value.into())
    }

    /// A collection of values.
    pub fn many<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Resolved::Many(values.into_iter().map(Into::into).collect())
    }

    /// Whether the resolver produced a collection.
    #[must_use]
    pub fn is_many(&self) -> bool {
        matches!(self, Resolved::Many(_))
    }

    /// Flatten into the list of values; an empty collection becomes one empty value.
    #[must_use]
    pub fn into_values(self) -> Vec<AttributeValue> {
        match self {
            Resolved::One(v) => vec![v],
            Resolved::Many(vs) if vs.is_empty() => vec![AttributeValue::Empty],
            Resolved::Many(vs) => vs,
        }
    }
}

// ============================================================================
// Label ordering
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut digits: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match digits {
            Some(d) if d != is_digit => {
                out.push(if d { Chunk::Digits(&s[start..i]) } else { Chunk::Text(&s[start..i]) });
                start = i;
            }
            _ => {}
        }
        digits = Some(is_digit);
    }
    if let Some(d) = digits {
        out.push(if d { Chunk::Digits(&s[start..]) } else { Chunk::Text(&s[start..]) });
    }
    out
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Alphanumeric ("natural") comparison: digit runs compare by numeric value,
/// text runs case-insensitively, so `"Grade 2"` sorts before `"Grade 10"`.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (ca, cb) = (chunks(a), chunks(b));
    for (x, y) in ca.iter().zip(cb.iter()) {
        let ord = match (x, y) {
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
            (Chunk::Text(x), Chunk::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ca.len().cmp(&cb.len()).then_with(|| a.cmp(b))
}

/// Natural comparison that always places [`EMPTY`] last.
#[must_use]
pub fn label_cmp(a: &str, b: &str) -> Ordering {
    match (a == EMPTY, b == EMPTY) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => natural_cmp(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_label() {
        assert_eq!(AttributeValue::Empty.to_string(), EMPTY);
        assert_eq!(AttributeValue::Bin(Bin::Empty).to_string(), EMPTY);
        assert!(AttributeValue::Bin(Bin::Empty).is_empty());
    }

    #[test]
    fn test_blank_text_is_empty() {
        assert_eq!(AttributeValue::from("  "), AttributeValue::Empty);
        assert_eq!(AttributeValue::from(Option::<i64>::None), AttributeValue::Empty);
        assert_eq!(AttributeValue::from(Some(3i64)), AttributeValue::Integer(3));
    }

    #[test]
    fn test_range_display() {
        assert_eq!(NumericRange::new(Some(18), Some(64)).to_string(), "18 - 64");
        assert_eq!(NumericRange::new(Some(65), None).to_string(), "65+");
        assert_eq!(NumericRange::new(None, Some(17)).to_string(), "<= 17");
        assert!(AttributeValue::Range(NumericRange::new(None, None)).is_empty());
        assert!(NumericRange::new(Some(18), Some(64)).contains(64));
        assert!(!NumericRange::new(Some(18), Some(64)).contains(65));
    }

    #[test]
    fn test_continuous_rank() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let e = NaiveDate::from_ymd_opt(2020, 1, 3).unwrap();
        let rd = AttributeValue::Date(d).continuous_rank().unwrap();
        let re = AttributeValue::Date(e).continuous_rank().unwrap();
        assert_eq!(re - rd, 1);
        assert_eq!(AttributeValue::Ranked(Ranked::new("Week 4", 28)).continuous_rank(), Some(28));
        assert_eq!(AttributeValue::from("x").continuous_rank(), None);
    }

    #[test]
    fn test_resolved_values() {
        assert_eq!(Resolved::one("A").into_values(), vec![AttributeValue::from("A")]);
        assert_eq!(
            Resolved::many(Vec::<String>::new()).into_values(),
            vec![AttributeValue::Empty]
        );
        assert!(Resolved::many(["a", "b"]).is_many());
    }

    #[test]
    fn test_bin_source_from_value() {
        assert_eq!(BinSource::from(&AttributeValue::Empty), BinSource::Missing);
        assert_eq!(BinSource::from(&AttributeValue::Integer(4)), BinSource::Integer(4));
        assert_eq!(
            BinSource::from(&AttributeValue::from("x")),
            BinSource::Unsupported("text")
        );
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("Grade 2", "Grade 10"), Ordering::Less);
        assert_eq!(natural_cmp("a", "B"), Ordering::Less);
        assert_eq!(natural_cmp("item007", "item7"), Ordering::Less);
        assert_eq!(natural_cmp("10", "9"), Ordering::Greater);
        assert_eq!(natural_cmp("abc", "abc"), Ordering::Equal);
        assert_eq!(natural_cmp("1", "A"), Ordering::Less);
    }

    #[test]
    fn test_label_cmp_empty_last() {
        let mut labels = vec![EMPTY, "Z", "a", "10", "2"];
        labels.sort_by(|a, b| label_cmp(a, b));
        assert_eq!(labels, vec!["2", "10", "a", "Z", EMPTY]);
    }
}
