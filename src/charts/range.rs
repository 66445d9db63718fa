//! Mean and confidence interval of a numeric measure.

use std::sync::Arc;

use serde::Serialize;

use super::{CellReducer, Chart, Measure, Pipeline, TrellisPanel};
use crate::axis::SeriesOrder;
use crate::color::ColorRegistry;
use crate::error::Result;
use crate::event::Event;
use crate::grouping::{EventBucket, GroupedEvents};
use crate::key::GroupByKey;
use crate::settings::ChartSettings;

/// Normal quantile of the 95% interval.
const Z_95: f64 = 1.96;

/// Summary of a measure in one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeStats {
    /// Number of values.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (zero for a single value).
    pub std_dev: f64,
    /// Standard error of the mean.
    pub std_err: f64,
    /// Lower bound of the 95% interval.
    pub lower: f64,
    /// Upper bound of the 95% interval.
    pub upper: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
}

impl RangeStats {
    /// Summarise `values`; `None` if there are no finite values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let std_dev = if finite.len() > 1 {
            (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let std_err = std_dev / n.sqrt();
        Some(Self {
            count: finite.len(),
            mean,
            std_dev,
            std_err,
            lower: mean - Z_95 * std_err,
            upper: mean + Z_95 * std_err,
            min: finite.iter().copied().fold(f64::INFINITY, f64::min),
            max: finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Mean of a measure with its 95% interval per category and series.
#[derive(Debug)]
pub struct RangeChart<E> {
    measure: Measure<E>,
    series_order: SeriesOrder,
    colors: Option<Arc<ColorRegistry>>,
}

impl<E> RangeChart<E> {
    /// Range chart of `measure`, series ordered by numeric range.
    #[must_use]
    pub fn new(measure: Measure<E>) -> Self {
        Self {
            measure,
            series_order: SeriesOrder::NumericRange,
            colors: None,
        }
    }

    /// Ordering of series.
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
}

struct RangeReducer<'m, E> {
    measure: &'m Measure<E>,
}

impl<E: Event> CellReducer<E> for RangeReducer<'_, E> {
    type Output = Option<RangeStats>;

    fn reduce(&self, _panel: &GroupByKey, cell: &EventBucket<'_, E>) -> Option<RangeStats> {
        RangeStats::from_values(&self.measure.values(cell.events()))
    }

    fn zero(&self, _panel: &GroupByKey) -> Option<RangeStats> {
        None
    }
}

impl<E: Event> Chart<E> for RangeChart<E> {
    type Value = Option<RangeStats>;

    fn panels(
        &self,
        grouped: &GroupedEvents<'_, E>,
        settings: &ChartSettings<E>,
    ) -> Result<Vec<TrellisPanel<Option<RangeStats>>>> {
        let reducer = RangeReducer {
            measure: &self.measure,
        };
        Pipeline::new()
            .series_order(self.series_order)
            .configure(settings, self.colors.as_ref())
            .run(grouped, &reducer)
    }
}
