//! Bar charts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{CellReducer, Chart, Pipeline, TrellisPanel};
use crate::axis::{CategoryOrder, SeriesOrder};
use crate::color::ColorRegistry;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::grouping::{EventBucket, GroupedEvents, PopulationIndex};
use crate::key::GroupByKey;
use crate::settings::ChartSettings;

/// Quantity shown by each bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarValue {
    /// Distinct subjects.
    #[default]
    Subjects,
    /// Event records.
    Events,
    /// Distinct subjects as a percentage of the panel's population.
    PercentOfPopulation,
}

/// Counts per category and series.
#[derive(Debug, Clone, Default)]
pub struct BarChart {
    value: BarValue,
    category_order: CategoryOrder,
    series_order: SeriesOrder,
    colors: Option<Arc<ColorRegistry>>,
    population: Option<Arc<PopulationIndex>>,
}

impl BarChart {
    /// Bar chart showing `value`.
    #[must_use]
    pub fn new(value: BarValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// Ordering of discrete categories.
    #[must_use]
    pub fn category_order(mut self, order: CategoryOrder) -> Self {
        self.category_order = order;
        self
    }

    /// Ordering of series; [`SeriesOrder::NumericRange`] for range-valued
    /// color-by options such as age groups.
    #[must_use]
    pub fn series_order(mut self, order: SeriesOrder) -> Self {
        self.series_order = order;
        self
    }

    /// Color series from a shared registry.
    #[must_use]
    pub fn colors(mut self, registry: Arc<ColorRegistry>) -> Self {
        self.colors = Some(registry);
        self
    }

    /// Subject population used as the percentage denominator.
    #[must_use]
    pub fn population(mut self, index: Arc<PopulationIndex>) -> Self {
        self.population = Some(index);
        self
    }
}

struct BarReducer<'p> {
    value: BarValue,
    population: Option<&'p PopulationIndex>,
}

impl<E> CellReducer<E> for BarReducer<'_> {
    type Output = f64;

    #[allow(clippy::cast_precision_loss)]
    fn reduce(&self, panel: &GroupByKey, cell: &EventBucket<'_, E>) -> f64 {
        match self.value {
            BarValue::Subjects => cell.subject_count() as f64,
            BarValue::Events => cell.event_count() as f64,
            BarValue::PercentOfPopulation => {
                let total = self.population.map_or(0, |p| p.subject_count(panel));
                if total == 0 {
                    0.0
                } else {
                    100.0 * cell.subject_count() as f64 / total as f64
                }
            }
        }
    }

    fn zero(&self, _panel: &GroupByKey) -> f64 {
        0.0
    }
}

impl<E: Event> Chart<E> for BarChart {
    type Value = f64;

    fn panels(
        &self,
        grouped: &GroupedEvents<'_, E>,
        settings: &ChartSettings<E>,
    ) -> Result<Vec<TrellisPanel<f64>>> {
        if self.value == BarValue::PercentOfPopulation && self.population.is_none() {
            return Err(Error::InvalidSettings(
                "percentage bars need a population index".to_string(),
            ));
        }
        let reducer = BarReducer {
            value: self.value,
            population: self.population.as_deref(),
        };
        Pipeline::new()
            .category_order(self.category_order)
            .series_order(self.series_order)
            .configure(settings, self.colors.as_ref())
            .run(grouped, &reducer)
    }
}
