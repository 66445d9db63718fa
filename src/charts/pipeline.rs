//! Grouped events to ordered trellis panels.
//!
//! The pipeline splits grouped events into one panel per trellis
//! combination, merges buckets into (series, category) cells, orders both
//! axes and reduces every cell with a chart-specific [`CellReducer`].

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::axis::{AxisCategory, AxisKind, CategoryAxis, CategoryOrder, SeriesOrder};
use crate::color::{ColorRegistry, Rgba};
use crate::error::Result;
use crate::event::{Event, EventId};
use crate::grouping::{EventBucket, GroupedEvents};
use crate::key::{ChartRole, GroupByKey};
use crate::settings::{ChartSettings, CountBasis};
use crate::value::AttributeValue;

/// Turns the events of one cell into a chart value.
pub trait CellReducer<E>: Sync {
    /// Value stored in every entry.
    type Output: Clone + Serialize + Send;

    /// Value of a cell with contributing events.
    fn reduce(&self, panel: &GroupByKey, cell: &EventBucket<'_, E>) -> Self::Output;

    /// Value of a gap-filled cell without events.
    fn zero(&self, panel: &GroupByKey) -> Self::Output;
}

/// One category of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry<T> {
    /// Category label.
    pub category: String,
    /// 1-based position of the category in the panel.
    pub rank: usize,
    /// Distinct contributing subjects.
    pub subject_count: usize,
    /// Contributing event records.
    pub event_count: usize,
    /// Ids of the contributing events.
    pub event_ids: Vec<EventId>,
    /// Chart value.
    pub value: T,
}

impl<T> Entry<T> {
    fn from_cell<E>(category: &AxisCategory, cell: &EventBucket<'_, E>, value: T) -> Self {
        Self {
            category: category.label.clone(),
            rank: category.rank,
            subject_count: cell.subject_count(),
            event_count: cell.event_count(),
            event_ids: cell.event_ids().iter().copied().collect(),
            value,
        }
    }

    /// An entry without contributing events.
    #[must_use]
    pub fn placeholder(category: impl Into<String>, rank: usize, value: T) -> Self {
        Self {
            category: category.into(),
            rank,
            subject_count: 0,
            event_count: 0,
            event_ids: Vec::new(),
            value,
        }
    }
}

/// One plotted series of a panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series<T> {
    /// Series label.
    pub name: String,
    /// 1-based display position.
    pub rank: usize,
    /// Assigned color, when a registry is configured.
    pub color: Option<Rgba>,
    /// Entries in category order.
    pub entries: Vec<Entry<T>>,
}

impl<T> Series<T> {
    /// Entry for a category label.
    #[must_use]
    pub fn entry(&self, category: &str) -> Option<&Entry<T>> {
        self.entries.iter().find(|e| e.category == category)
    }
}

/// Chart data for one trellis combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrellisPanel<T> {
    /// Trellis `(option, label)` pairs identifying the panel.
    pub trellis: Vec<(String, String)>,
    /// Shape of the category axis.
    pub axis: AxisKind,
    /// Category labels in display order.
    pub categories: Vec<String>,
    /// Series in display order.
    pub series: Vec<Series<T>>,
    #[serde(skip)]
    key: GroupByKey,
}

impl<T> TrellisPanel<T> {
    /// Trellis-only key of the panel.
    #[must_use]
    pub fn key(&self) -> &GroupByKey {
        &self.key
    }

    /// Series by label.
    #[must_use]
    pub fn series(&self, name: &str) -> Option<&Series<T>> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Series labels in display order.
    #[must_use]
    pub fn series_names(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.name.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
struct SeriesColors {
    registry: Arc<ColorRegistry>,
    dimension: String,
}

/// Configurable panel builder shared by all chart kinds.
#[derive(Debug, Clone)]
pub struct Pipeline {
    series_role: ChartRole,
    category_order: CategoryOrder,
    series_order: SeriesOrder,
    count_basis: CountBasis,
    colors: Option<SeriesColors>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            series_role: ChartRole::ColorBy,
            category_order: CategoryOrder::default(),
            series_order: SeriesOrder::default(),
            count_basis: CountBasis::default(),
            colors: None,
        }
    }
}

impl Pipeline {
    /// Pipeline with color-by series, count-ordered categories and
    /// alphanumeric series.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Role whose values form the series.
    #[must_use]
    pub fn series_role(mut self, role: ChartRole) -> Self {
        self.series_role = role;
        self
    }

    /// Ordering of discrete categories.
    #[must_use]
    pub fn category_order(mut self, order: CategoryOrder) -> Self {
        self.category_order = order;
        self
    }

    /// Ordering of series.
    #[must_use]
    pub fn series_order(mut self, order: SeriesOrder) -> Self {
        self.series_order = order;
        self
    }

    /// Count basis for discrete ordering.
    #[must_use]
    pub fn count_basis(mut self, basis: CountBasis) -> Self {
        self.count_basis = basis;
        self
    }

    /// Color series from `registry` under `dimension`.
    #[must_use]
    pub fn colors(mut self, registry: Arc<ColorRegistry>, dimension: impl Into<String>) -> Self {
        self.colors = Some(SeriesColors {
            registry,
            dimension: dimension.into(),
        });
        self
    }

    /// Take the count basis from `settings` and, given a registry, color
    /// series under the id of the option assigned to the series role.
    #[must_use]
    pub fn configure<E>(
        mut self,
        settings: &ChartSettings<E>,
        registry: Option<&Arc<ColorRegistry>>,
    ) -> Self {
        self.count_basis = settings.count_basis();
        if let (Some(registry), Some(setting)) = (registry, settings.role(self.series_role)) {
            self = self.colors(Arc::clone(registry), setting.option.id());
        }
        self
    }

    /// Build one panel per trellis combination, in panel order.
    ///
    /// # Errors
    ///
    /// Propagates axis errors such as mixed bin units.
    pub fn run<E, R>(
        &self,
        grouped: &GroupedEvents<'_, E>,
        reducer: &R,
    ) -> Result<Vec<TrellisPanel<R::Output>>>
    where
        E: Event,
        R: CellReducer<E>,
    {
        let mut panels: HashMap<GroupByKey, Vec<(&GroupByKey, &EventBucket<'_, E>)>> =
            HashMap::new();
        for (key, bucket) in grouped {
            panels
                .entry(key.limit_to_trellis())
                .or_default()
                .push((key, bucket));
        }
        let mut keys: Vec<GroupByKey> = panels.keys().cloned().collect();
        keys.sort_by(GroupByKey::cmp_trellis);

        let built = keys
            .into_par_iter()
            .map(|key| {
                let members = panels.get(&key).map_or(&[][..], Vec::as_slice);
                self.panel(key, members, reducer)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            panels = built.len(),
            keys = grouped.len(),
            "built trellis panels"
        );
        Ok(built)
    }

    fn panel<'a, E, R>(
        &self,
        key: GroupByKey,
        members: &[(&GroupByKey, &EventBucket<'a, E>)],
        reducer: &R,
    ) -> Result<TrellisPanel<R::Output>>
    where
        E: Event,
        R: CellReducer<E>,
    {
        let mut cells: HashMap<String, HashMap<String, EventBucket<'a, E>>> = HashMap::new();
        let mut by_category: HashMap<String, (AttributeValue, EventBucket<'a, E>)> = HashMap::new();
        let mut by_series: HashMap<String, (AttributeValue, EventBucket<'a, E>)> = HashMap::new();

        for &(member, bucket) in members {
            let category = member
                .value(ChartRole::XAxis)
                .cloned()
                .unwrap_or(AttributeValue::Empty);
            let series = member
                .value(self.series_role)
                .cloned()
                .unwrap_or(AttributeValue::Empty);
            let (category_label, series_label) = (category.label(), series.label());

            cells
                .entry(series_label.clone())
                .or_default()
                .entry(category_label.clone())
                .or_default()
                .merge(bucket);
            by_category
                .entry(category_label)
                .or_insert_with(|| (category, EventBucket::new()))
                .1
                .merge(bucket);
            by_series
                .entry(series_label)
                .or_insert_with(|| (series, EventBucket::new()))
                .1
                .merge(bucket);
        }

        let axis = CategoryAxis::compute(&self.observed(by_category), self.category_order)?;
        let order = self
            .series_order
            .order(&self.observed(by_series), self.category_order)?;

        let series = order
            .into_iter()
            .enumerate()
            .map(|(i, (name, _))| {
                let row = cells.get(&name);
                let entries = axis
                    .categories()
                    .iter()
                    .filter_map(|category| match row.and_then(|r| r.get(&category.label)) {
                        Some(cell) => {
                            Some(Entry::from_cell(category, cell, reducer.reduce(&key, cell)))
                        }
                        None if axis.kind() == AxisKind::Binned => Some(Entry::placeholder(
                            category.label.clone(),
                            category.rank,
                            reducer.zero(&key),
                        )),
                        None => None,
                    })
                    .collect();
                let color = self
                    .colors
                    .as_ref()
                    .map(|c| c.registry.color_for(&c.dimension, &name));
                Series {
                    name,
                    rank: i + 1,
                    color,
                    entries,
                }
            })
            .collect();

        Ok(TrellisPanel {
            trellis: key.trellis_labels(),
            axis: axis.kind(),
            categories: axis.labels(),
            series,
            key,
        })
    }

    fn observed<E>(
        &self,
        merged: HashMap<String, (AttributeValue, EventBucket<'_, E>)>,
    ) -> Vec<(AttributeValue, usize)> {
        merged
            .into_values()
            .map(|(value, bucket)| {
                let count = bucket.count(self.count_basis);
                (value, count)
            })
            .collect()
    }
}
