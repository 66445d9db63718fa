//! Category axis construction and series ordering.
//!
//! The category axis of a panel is derived from the values observed on the
//! x dimension:
//!
//! - **binned**: any value is a [`Bin`]; non-empty bins are filled into a
//!   contiguous run and a trailing empty category is kept if observed
//! - **continuous**: values carry a rank (dates, ranked labels); sorted by
//!   rank, ties by label
//! - **discrete**: sorted by descending count, ties by natural label order
//!
//! The empty category is always last.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::binning::Bin;
use crate::error::Result;
use crate::value::{label_cmp, natural_cmp, AttributeValue};

/// Shape of a computed category axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    /// Contiguous bins with gaps filled.
    Binned,
    /// Ranked values such as dates.
    Continuous,
    /// Unordered labels.
    Discrete,
}

/// Ordering of discrete categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryOrder {
    /// Descending count, ties by natural label order.
    #[default]
    CountDescending,
    /// Natural label order regardless of counts.
    Alphanumeric,
}

/// One category on an axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisCategory {
    /// Display label.
    pub label: String,
    /// 1-based position on the axis.
    pub rank: usize,
    /// Representative value.
    pub value: AttributeValue,
}

/// Observed values and their counts, merged by label.
fn tally(observed: &[(AttributeValue, usize)]) -> Vec<(String, AttributeValue, usize)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<(String, AttributeValue, usize)> = Vec::new();
    for (value, count) in observed {
        let label = value.label();
        match index.get(&label) {
            Some(&i) => out[i].2 += count,
            None => {
                index.insert(label.clone(), out.len());
                out.push((label, value.clone(), *count));
            }
        }
    }
    out
}

/// Ordered categories of one panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAxis {
    kind: AxisKind,
    categories: Vec<AxisCategory>,
}

impl CategoryAxis {
    /// Compute the axis from observed `(value, count)` pairs.
    ///
    /// Counts are only used to order discrete axes.
    ///
    /// # Errors
    ///
    /// Returns bin errors when binned values of different units are mixed or
    /// a non-binnable value appears alongside bins.
    pub fn compute(observed: &[(AttributeValue, usize)], order: CategoryOrder) -> Result<Self> {
        if observed.iter().any(|(v, _)| v.as_bin().is_some()) {
            return Self::binned(observed);
        }

        let mut tallied = tally(observed);
        let kind = if tallied.iter().any(|(_, v, _)| v.continuous_rank().is_some()) {
            tallied.sort_by(|(la, va, _), (lb, vb, _)| {
                va.is_empty()
                    .cmp(&vb.is_empty())
                    .then_with(|| cmp_rank(va.continuous_rank(), vb.continuous_rank()))
                    .then_with(|| natural_cmp(la, lb))
            });
            AxisKind::Continuous
        } else {
            tallied.sort_by(|(la, va, ca), (lb, vb, cb)| {
                let by_count = match order {
                    CategoryOrder::CountDescending => cb.cmp(ca),
                    CategoryOrder::Alphanumeric => Ordering::Equal,
                };
                va.is_empty()
                    .cmp(&vb.is_empty())
                    .then(by_count)
                    .then_with(|| natural_cmp(la, lb))
            });
            AxisKind::Discrete
        };
        Ok(Self::from_values(
            kind,
            tallied.into_iter().map(|(label, value, _)| (label, value)),
        ))
    }

    fn binned(observed: &[(AttributeValue, usize)]) -> Result<Self> {
        let mut bins = Vec::with_capacity(observed.len());
        let mut has_empty = false;
        for (value, _) in observed {
            let bin = match value {
                AttributeValue::Bin(bin) => *bin,
                other => Bin::new_instance(other, None)?,
            };
            if bin.is_empty() {
                has_empty = true;
            } else {
                bins.push(bin);
            }
        }
        let mut filled = Bin::fill(&bins)?;
        if has_empty {
            filled.push(Bin::Empty);
        }
        Ok(Self::from_values(
            AxisKind::Binned,
            filled.into_iter().map(|b| (b.to_string(), AttributeValue::Bin(b))),
        ))
    }

    fn from_values(kind: AxisKind, values: impl Iterator<Item = (String, AttributeValue)>) -> Self {
        let categories = values
            .enumerate()
            .map(|(i, (label, value))| AxisCategory {
                label,
                rank: i + 1,
                value,
            })
            .collect();
        Self { kind, categories }
    }

    /// Axis shape.
    #[must_use]
    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    /// Categories in display order.
    #[must_use]
    pub fn categories(&self) -> &[AxisCategory] {
        &self.categories
    }

    /// Category labels in display order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.label.clone()).collect()
    }

    /// 1-based rank of a label.
    #[must_use]
    pub fn rank_of(&self, label: &str) -> Option<usize> {
        self.categories.iter().find(|c| c.label == label).map(|c| c.rank)
    }

    /// Number of categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether the axis has no categories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

fn cmp_rank(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// How the series of a panel are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeriesOrder {
    /// Natural label order, empty last.
    #[default]
    Alphanumeric,
    /// Numeric ranges by lower bound (unbounded below first), other labels
    /// after them, empty last.
    NumericRange,
    /// Same policy as the category axis.
    CategoryAxis,
}

impl SeriesOrder {
    /// Order observed series values; returns distinct `(label, value)` pairs.
    ///
    /// # Errors
    ///
    /// [`SeriesOrder::CategoryAxis`] propagates axis errors.
    pub fn order(
        self,
        observed: &[(AttributeValue, usize)],
        categories: CategoryOrder,
    ) -> Result<Vec<(String, AttributeValue)>> {
        if self == SeriesOrder::CategoryAxis {
            let axis = CategoryAxis::compute(observed, categories)?;
            return Ok(axis
                .categories
                .into_iter()
                .map(|c| (c.label, c.value))
                .collect());
        }

        let mut tallied = tally(observed);
        match self {
            SeriesOrder::NumericRange => tallied.sort_by(|(la, va, _), (lb, vb, _)| {
                va.is_empty()
                    .cmp(&vb.is_empty())
                    .then_with(|| cmp_range(va, vb))
                    .then_with(|| natural_cmp(la, lb))
            }),
            _ => tallied.sort_by(|(la, _, _), (lb, _, _)| label_cmp(la, lb)),
        }
        Ok(tallied.into_iter().map(|(label, value, _)| (label, value)).collect())
    }
}

fn cmp_range(a: &AttributeValue, b: &AttributeValue) -> Ordering {
    match (a.as_range(), b.as_range()) {
        (Some(a), Some(b)) => a
            .lower
            .unwrap_or(i64::MIN)
            .cmp(&b.lower.unwrap_or(i64::MIN))
            .then_with(|| a.upper.unwrap_or(i64::MAX).cmp(&b.upper.unwrap_or(i64::MAX))),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
