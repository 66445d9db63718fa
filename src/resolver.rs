//! Grouping options and their attribute resolvers.
//!
//! A [`GroupOption`] names one attribute of an event type (severity, treatment
//! arm, onset date, ...) and carries the function that extracts it. Options are
//! parameterised by a typed [`OptionParams`] bag:
//!
//! - [`BinningParams`]: bin size and [`TimestampBasis`] for bucketed options
//! - [`ContextParams`]: an externally precomputed map for options that cannot
//!   derive their value from a single event
//! - a drug name for drug-scoped options
//!
//! Options that need context or a drug name declare it with a capability flag
//! and fail with [`Error::MissingContext`] / [`Error::MissingDrug`] instead of
//! silently returning an empty value.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::binning::{checked_size, Bin};
use crate::error::{Error, Result};
use crate::event::ReferenceDates;
use crate::value::{AttributeValue, Resolved};

// ============================================================================
// Parameters
// ============================================================================

/// Which clock a timestamp option reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampBasis {
    /// Calendar date.
    #[default]
    Date,
    /// Days since the subject's first dose (first dose day is day 0).
    DaysSinceFirstDose,
    /// Days since the subject's randomisation (randomisation day is day 0).
    DaysSinceRandomisation,
}

impl TimestampBasis {
    /// Express `date` on this basis; missing dates or references give
    /// [`AttributeValue::Empty`].
    #[must_use]
    pub fn project(self, date: Option<NaiveDate>, refs: &ReferenceDates) -> AttributeValue {
        let relative = |reference: Option<NaiveDate>| match (date, reference) {
            (Some(d), Some(r)) => AttributeValue::Integer((d - r).num_days()),
            _ => AttributeValue::Empty,
        };
        match self {
            TimestampBasis::Date => date.into(),
            TimestampBasis::DaysSinceFirstDose => relative(refs.first_dose),
            TimestampBasis::DaysSinceRandomisation => relative(refs.randomisation),
        }
    }
}

/// Bucketing parameters for binned options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinningParams {
    bin_size: Option<i64>,
    timestamp: TimestampBasis,
}

impl BinningParams {
    /// Create binning params.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroBinSize`] if `bin_size` is zero or negative.
    pub fn new(bin_size: Option<i64>, timestamp: TimestampBasis) -> Result<Self> {
        checked_size(bin_size)?;
        Ok(Self {
            bin_size,
            timestamp,
        })
    }

    /// Bins of the given width on the calendar-date basis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroBinSize`] if `bin_size` is zero or negative.
    pub fn sized(bin_size: i64) -> Result<Self> {
        Self::new(Some(bin_size), TimestampBasis::Date)
    }

    /// Configured bin size, `None` for single-value bins.
    #[must_use]
    pub fn bin_size(&self) -> Option<i64> {
        self.bin_size
    }

    /// Configured timestamp basis.
    #[must_use]
    pub fn timestamp(&self) -> TimestampBasis {
        self.timestamp
    }
}

/// Externally precomputed values consulted by context-requiring options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextParams {
    values: Arc<HashMap<String, AttributeValue>>,
}

impl ContextParams {
    /// Wrap a precomputed map.
    #[must_use]
    pub fn new(values: HashMap<String, AttributeValue>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    /// Look up a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for ContextParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Runtime parameters of one configured option.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionParams {
    /// Bucketing, for binned options.
    pub binning: Option<BinningParams>,
    /// Precomputed context, for context-requiring options.
    pub context: Option<ContextParams>,
    /// Drug name, for drug-scoped options.
    pub drug: Option<String>,
}

impl OptionParams {
    /// Empty parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set binning parameters.
    #[must_use]
    pub fn binning(mut self, binning: BinningParams) -> Self {
        self.binning = Some(binning);
        self
    }

    /// Set the context map.
    #[must_use]
    pub fn context(mut self, context: ContextParams) -> Self {
        self.context = Some(context);
        self
    }

    /// Set the drug name.
    #[must_use]
    pub fn drug(mut self, drug: impl Into<String>) -> Self {
        self.drug = Some(drug.into());
        self
    }
}

// ============================================================================
// Options
// ============================================================================

/// Dimension space an option belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionScope {
    /// Attribute of the event itself.
    #[default]
    Event,
    /// Attribute of the subject, resolvable on both events and subjects.
    Population,
}

type ResolveFn<E> = dyn Fn(&E, &OptionParams) -> Result<Resolved> + Send + Sync;

/// A named attribute of event type `E` that can drive a chart dimension.
pub struct GroupOption<E> {
    id: Arc<str>,
    resolve: Arc<ResolveFn<E>>,
    scope: OptionScope,
    requires_context: bool,
    requires_drug: bool,
    multi_valued: bool,
    binnable: bool,
}

impl<E> Clone for GroupOption<E> {
    fn clone(&self) -> Self {
        Self {
            id: Arc::clone(&self.id),
            resolve: Arc::clone(&self.resolve),
            scope: self.scope,
            requires_context: self.requires_context,
            requires_drug: self.requires_drug,
            multi_valued: self.multi_valued,
            binnable: self.binnable,
        }
    }
}

impl<E> fmt::Debug for GroupOption<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupOption")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("requires_context", &self.requires_context)
            .field("requires_drug", &self.requires_drug)
            .field("multi_valued", &self.multi_valued)
            .field("binnable", &self.binnable)
            .finish_non_exhaustive()
    }
}

fn bin_value(raw: &AttributeValue, binning: &BinningParams) -> Result<AttributeValue> {
    Ok(AttributeValue::Bin(Bin::new_instance(raw, binning.bin_size())?))
}

impl<E> GroupOption<E> {
    /// An option with full control over parameter handling.
    pub fn custom<F>(id: &str, resolve: F) -> Self
    where
        F: Fn(&E, &OptionParams) -> Result<Resolved> + Send + Sync + 'static,
    {
        Self {
            id: Arc::from(id),
            resolve: Arc::new(resolve),
            scope: OptionScope::Event,
            requires_context: false,
            requires_drug: false,
            multi_valued: false,
            binnable: false,
        }
    }

    /// A single-valued attribute that ignores parameters.
    pub fn new<F>(id: &str, attribute: F) -> Self
    where
        F: Fn(&E) -> AttributeValue + Send + Sync + 'static,
    {
        Self::custom(id, move |e, _| Ok(Resolved::One(attribute(e))))
    }

    /// An attribute under which one event can fall into several categories.
    pub fn multi<F>(id: &str, attribute: F) -> Self
    where
        F: Fn(&E) -> Vec<AttributeValue> + Send + Sync + 'static,
    {
        let mut option = Self::custom(id, move |e, _| Ok(Resolved::Many(attribute(e))));
        option.multi_valued = true;
        option
    }

    /// An integer or date attribute that is bucketed when binning params are set.
    ///
    /// Without binning params the raw value is returned unbinned.
    pub fn binned<F>(id: &str, attribute: F) -> Self
    where
        F: Fn(&E) -> AttributeValue + Send + Sync + 'static,
    {
        let mut option = Self::custom(id, move |e, params| {
            let raw = attribute(e);
            match &params.binning {
                Some(binning) => Ok(Resolved::One(bin_value(&raw, binning)?)),
                None => Ok(Resolved::One(raw)),
            }
        });
        option.binnable = true;
        option
    }

    /// A point-in-time attribute expressed on the configured [`TimestampBasis`].
    pub fn timestamp<F>(id: &str, attribute: F) -> Self
    where
        F: Fn(&E) -> (Option<NaiveDate>, ReferenceDates) + Send + Sync + 'static,
    {
        let mut option = Self::custom(id, move |e, params| {
            let (date, refs) = attribute(e);
            match &params.binning {
                Some(binning) => {
                    let raw = binning.timestamp().project(date, &refs);
                    Ok(Resolved::One(bin_value(&raw, binning)?))
                }
                None => Ok(Resolved::One(TimestampBasis::Date.project(date, &refs))),
            }
        });
        option.binnable = true;
        option
    }

    /// An interval attribute that falls into every bin it overlaps.
    ///
    /// An interval without an end occupies only its start bin. Without binning
    /// params the unbinned start is returned.
    pub fn interval<F>(id: &str, attribute: F) -> Self
    where
        F: Fn(&E) -> (Option<NaiveDate>, Option<NaiveDate>, ReferenceDates) + Send + Sync + 'static,
    {
        let mut option = Self::custom(id, move |e, params| {
            let (start, end, refs) = attribute(e);
            let Some(binning) = &params.binning else {
                return Ok(Resolved::One(TimestampBasis::Date.project(start, &refs)));
            };
            let basis = binning.timestamp();
            let first = Bin::new_instance(&basis.project(start, &refs), binning.bin_size())?;
            if first.is_empty() {
                return Ok(Resolved::One(AttributeValue::Bin(Bin::Empty)));
            }
            let last = match end {
                Some(_) => Bin::new_instance(&basis.project(end, &refs), binning.bin_size())?,
                None => first,
            };
            if last.is_empty() || last.try_cmp(&first)?.is_lt() {
                return Ok(Resolved::Many(vec![AttributeValue::Bin(first)]));
            }
            let bins = Bin::fill([&first, &last])?;
            Ok(Resolved::Many(bins.into_iter().map(AttributeValue::Bin).collect()))
        });
        option.binnable = true;
        option.multi_valued = true;
        option
    }

    /// An attribute that needs an externally precomputed context map.
    pub fn with_context<F>(id: &str, attribute: F) -> Self
    where
        F: Fn(&E, &ContextParams) -> AttributeValue + Send + Sync + 'static,
    {
        let owned: Arc<str> = Arc::from(id);
        let mut option = Self::custom(id, move |e, params| {
            let context = params
                .context
                .as_ref()
                .ok_or_else(|| Error::MissingContext(owned.to_string()))?;
            Ok(Resolved::One(attribute(e, context)))
        });
        option.requires_context = true;
        option
    }

    /// An attribute scoped to a named drug.
    pub fn drug_scoped<F>(id: &str, attribute: F) -> Self
    where
        F: Fn(&E, &str) -> AttributeValue + Send + Sync + 'static,
    {
        let owned: Arc<str> = Arc::from(id);
        let mut option = Self::custom(id, move |e, params| {
            let drug = params
                .drug
                .as_deref()
                .ok_or_else(|| Error::MissingDrug(owned.to_string()))?;
            Ok(Resolved::One(attribute(e, drug)))
        });
        option.requires_drug = true;
        option
    }

    /// Mark the option as a subject-level (population) attribute.
    #[must_use]
    pub fn population(mut self) -> Self {
        self.scope = OptionScope::Population;
        self
    }

    /// Stable identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Dimension space of the option.
    #[must_use]
    pub fn scope(&self) -> OptionScope {
        self.scope
    }

    /// Whether resolving requires a context map.
    #[must_use]
    pub fn requires_context(&self) -> bool {
        self.requires_context
    }

    /// Whether resolving requires a drug name.
    #[must_use]
    pub fn requires_drug(&self) -> bool {
        self.requires_drug
    }

    /// Whether one event may yield several values.
    #[must_use]
    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Whether the option accepts binning params.
    #[must_use]
    pub fn is_binnable(&self) -> bool {
        self.binnable
    }

    /// Resolve the attribute for one event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingContext`] or [`Error::MissingDrug`] when a
    /// required parameter is absent, and bin errors from bucketing.
    pub fn resolve(&self, event: &E, params: &OptionParams) -> Result<Resolved> {
        if self.requires_context && params.context.is_none() {
            return Err(Error::MissingContext(self.id.to_string()));
        }
        if self.requires_drug && params.drug.is_none() {
            return Err(Error::MissingDrug(self.id.to_string()));
        }
        (self.resolve)(event, params)
    }

    /// Resolve with default parameters.
    ///
    /// # Errors
    ///
    /// Fails for options that require context or a drug name.
    pub fn resolve_plain(&self, event: &E) -> Result<Resolved> {
        self.resolve(event, &OptionParams::default())
    }
}
