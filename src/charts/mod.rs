//! Chart aggregation strategies.
//!
//! Every chart kind groups events with the [`GroupingEngine`](crate::grouping::GroupingEngine),
//! then runs the shared [`Pipeline`] with its own [`CellReducer`]:
//!
//! - [`BarChart`]: subject or event counts, or percentage of the population
//! - [`OvertimeChart`]: counts per time bin, optionally cumulative
//! - [`BoxPlotChart`]: quartiles of a numeric [`Measure`]
//! - [`RangeChart`]: mean and 95% interval of a numeric [`Measure`]
//! - [`ShiftChart`]: subjects per (x, y) category pair

mod bar;
mod boxplot;
mod overtime;
mod pipeline;
mod range;
mod shift;

use std::fmt;
use std::sync::Arc;

pub use bar::{BarChart, BarValue};
pub use boxplot::{BoxPlotChart, BoxStats};
pub use overtime::{OvertimeChart, OvertimePoint};
pub use pipeline::{CellReducer, Entry, Pipeline, Series, TrellisPanel};
pub use range::{RangeChart, RangeStats};
pub use shift::ShiftChart;

use serde::Serialize;

use crate::error::Result;
use crate::event::Event;
use crate::grouping::{GroupedEvents, GroupingEngine};
use crate::settings::ChartSettings;

/// A chart kind turning grouped events into trellis panels.
pub trait Chart<E: Event> {
    /// Value of every entry.
    type Value: Clone + Serialize + Send;

    /// Build panels from already grouped events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`](crate::Error::InvalidSettings) when
    /// the settings do not fit the chart kind, and axis errors.
    fn panels(
        &self,
        grouped: &GroupedEvents<'_, E>,
        settings: &ChartSettings<E>,
    ) -> Result<Vec<TrellisPanel<Self::Value>>>;

    /// Group `events` and build panels.
    ///
    /// # Errors
    ///
    /// Propagates grouping and chart errors.
    fn build(
        &self,
        events: &[E],
        settings: &ChartSettings<E>,
    ) -> Result<Vec<TrellisPanel<Self::Value>>> {
        let grouped = GroupingEngine::new().group(events, settings)?;
        self.panels(&grouped, settings)
    }
}

/// A numeric quantity measured on each event.
pub struct Measure<E> {
    id: Arc<str>,
    value: Arc<dyn Fn(&E) -> Option<f64> + Send + Sync>,
}

impl<E> Measure<E> {
    /// Create a measure; events yielding `None` are skipped.
    pub fn new<F>(id: &str, value: F) -> Self
    where
        F: Fn(&E) -> Option<f64> + Send + Sync + 'static,
    {
        Self {
            id: Arc::from(id),
            value: Arc::new(value),
        }
    }

    /// Measure id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Measured values of `events`, skipping missing and non-finite ones.
    #[must_use]
    pub fn values(&self, events: &[&E]) -> Vec<f64> {
        events
            .iter()
            .filter_map(|e| (self.value)(*e))
            .filter(|v| v.is_finite())
            .collect()
    }
}

impl<E> Clone for Measure<E> {
    fn clone(&self) -> Self {
        Self {
            id: Arc::clone(&self.id),
            value: Arc::clone(&self.value),
        }
    }
}

impl<E> fmt::Debug for Measure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Measure").field("id", &self.id).finish_non_exhaustive()
    }
}
