//! Shift tables: subjects per (x, y) category pair.

use std::sync::Arc;

use super::{CellReducer, Chart, Pipeline, TrellisPanel};
use crate::axis::{CategoryOrder, SeriesOrder};
use crate::color::ColorRegistry;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::grouping::{EventBucket, GroupedEvents};
use crate::key::{ChartRole, GroupByKey};
use crate::settings::ChartSettings;

/// Matrix of the x axis against the y axis, e.g. baseline against current
/// reference-range flag.
///
/// Series are the y-axis values, ordered like a category axis.
#[derive(Debug, Clone, Default)]
pub struct ShiftChart {
    category_order: CategoryOrder,
    colors: Option<Arc<ColorRegistry>>,
}

impl ShiftChart {
    /// Shift chart with count-ordered axes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordering of discrete categories on both axes.
    #[must_use]
    pub fn category_order(mut self, order: CategoryOrder) -> Self {
        self.category_order = order;
        self
    }

    /// Color rows from a shared registry.
    #[must_use]
    pub fn colors(mut self, registry: Arc<ColorRegistry>) -> Self {
        self.colors = Some(registry);
        self
    }
}

struct ShiftReducer;

impl<E> CellReducer<E> for ShiftReducer {
    type Output = usize;

    fn reduce(&self, _panel: &GroupByKey, cell: &EventBucket<'_, E>) -> usize {
        cell.subject_count()
    }

    fn zero(&self, _panel: &GroupByKey) -> usize {
        0
    }
}

impl<E: Event> Chart<E> for ShiftChart {
    type Value = usize;

    fn panels(
        &self,
        grouped: &GroupedEvents<'_, E>,
        settings: &ChartSettings<E>,
    ) -> Result<Vec<TrellisPanel<usize>>> {
        for role in [ChartRole::XAxis, ChartRole::YAxis] {
            if settings.role(role).is_none() {
                return Err(Error::InvalidSettings(format!(
                    "shift charts need an option for {role:?}"
                )));
            }
        }
        Pipeline::new()
            .series_role(ChartRole::YAxis)
            .series_order(SeriesOrder::CategoryAxis)
            .category_order(self.category_order)
            .configure(settings, self.colors.as_ref())
            .run(grouped, &ShiftReducer)
    }
}
