//! Box plots of a numeric measure.

use std::sync::Arc;

use serde::Serialize;

use super::{CellReducer, Chart, Entry, Measure, Pipeline, TrellisPanel};
use crate::axis::SeriesOrder;
use crate::color::ColorRegistry;
use crate::error::Result;
use crate::event::Event;
use crate::grouping::{EventBucket, GroupedEvents};
use crate::key::GroupByKey;
use crate::settings::ChartSettings;
use crate::value::EMPTY;

/// Statistics computed for a box plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    /// Minimum value (excluding outliers)
    pub min: f64,
    /// First quartile (25th percentile)
    pub q1: f64,
    /// Median (50th percentile)
    pub median: f64,
    /// Third quartile (75th percentile)
    pub q3: f64,
    /// Maximum value (excluding outliers)
    pub max: f64,
    /// Interquartile range (Q3 - Q1)
    pub iqr: f64,
    /// Mean of all values
    pub mean: f64,
    /// Number of values
    pub count: usize,
    /// Outlier values
    pub outliers: Vec<f64>,
}

impl BoxStats {
    /// Compute box plot statistics from data.
    ///
    /// Uses the 1.5 * IQR rule for outlier detection. Non-finite values are
    /// ignored; `None` if nothing remains.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_data(data: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let q1 = percentile(&sorted, 25.0);
        let median = percentile(&sorted, 50.0);
        let q3 = percentile(&sorted, 75.0);
        let iqr = q3 - q1;

        // Whisker bounds: 1.5 * IQR from Q1 and Q3
        let lower_fence = q1 - 1.5 * iqr;
        let upper_fence = q3 + 1.5 * iqr;

        let min = sorted
            .iter()
            .copied()
            .find(|&x| x >= lower_fence)
            .unwrap_or(sorted[0]);
        let max = sorted
            .iter()
            .rev()
            .copied()
            .find(|&x| x <= upper_fence)
            .unwrap_or(sorted[n - 1]);

        let outliers = sorted
            .iter()
            .copied()
            .filter(|&x| x < lower_fence || x > upper_fence)
            .collect();

        Some(Self {
            min,
            q1,
            median,
            q3,
            max,
            iqr,
            mean: sorted.iter().sum::<f64>() / n as f64,
            count: n,
            outliers,
        })
    }
}

/// Percentile of sorted data using linear interpolation.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => 0.0,
        [only] => *only,
        _ => {
            let k = (p / 100.0) * (sorted.len() - 1) as f64;
            let f = k.floor() as usize;
            let c = k.ceil() as usize;
            if f == c || c >= sorted.len() {
                sorted[f.min(sorted.len() - 1)]
            } else {
                let d = k - f as f64;
                sorted[f] * (1.0 - d) + sorted[c] * d
            }
        }
    }
}

/// Distribution of a measure per category and series.
#[derive(Debug)]
pub struct BoxPlotChart<E> {
    measure: Measure<E>,
    always_show_empty: bool,
    series_order: SeriesOrder,
    colors: Option<Arc<ColorRegistry>>,
}

impl<E> Clone for BoxPlotChart<E> {
    fn clone(&self) -> Self {
        Self {
            measure: self.measure.clone(),
            always_show_empty: self.always_show_empty,
            series_order: self.series_order,
            colors: self.colors.clone(),
        }
    }
}

impl<E> BoxPlotChart<E> {
    /// Box plot of `measure`, series ordered by numeric range.
    #[must_use]
    pub fn new(measure: Measure<E>) -> Self {
        Self {
            measure,
            always_show_empty: false,
            series_order: SeriesOrder::NumericRange,
            colors: None,
        }
    }

    /// Always end every series with an empty-category entry.
    ///
    /// When no event fell into the empty category the placeholder carries the
    /// statistics of the first non-empty category of the series (or of the
    /// panel), so the renderer always has a box to lay out.
    #[must_use]
    pub fn always_show_empty(mut self, show: bool) -> Self {
        self.always_show_empty = show;
        self
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

struct BoxReducer<'m, E> {
    measure: &'m Measure<E>,
}

impl<E: Event> CellReducer<E> for BoxReducer<'_, E> {
    type Output = Option<BoxStats>;

    fn reduce(&self, _panel: &GroupByKey, cell: &EventBucket<'_, E>) -> Option<BoxStats> {
        BoxStats::from_data(&self.measure.values(cell.events()))
    }

    fn zero(&self, _panel: &GroupByKey) -> Option<BoxStats> {
        None
    }
}

fn show_empty(panel: &mut TrellisPanel<Option<BoxStats>>) {
    let rank = match panel.categories.iter().position(|c| c == EMPTY) {
        Some(i) => i + 1,
        None => {
            panel.categories.push(EMPTY.to_string());
            panel.categories.len()
        }
    };
    let panel_filler = panel
        .series
        .iter()
        .flat_map(|s| s.entries.iter())
        .find_map(|e| e.value.clone());

    for series in &mut panel.series {
        let filler = series
            .entries
            .iter()
            .filter(|e| e.category != EMPTY)
            .find_map(|e| e.value.clone())
            .or_else(|| panel_filler.clone());
        match series.entries.iter_mut().find(|e| e.category == EMPTY) {
            Some(entry) if entry.value.is_some() => {}
            Some(entry) => entry.value = filler,
            None => series.entries.push(Entry::placeholder(EMPTY, rank, filler)),
        }
    }
}

impl<E: Event> Chart<E> for BoxPlotChart<E> {
    type Value = Option<BoxStats>;

    fn panels(
        &self,
        grouped: &GroupedEvents<'_, E>,
        settings: &ChartSettings<E>,
    ) -> Result<Vec<TrellisPanel<Option<BoxStats>>>> {
        let reducer = BoxReducer {
            measure: &self.measure,
        };
        let mut panels = Pipeline::new()
            .series_order(self.series_order)
            .configure(settings, self.colors.as_ref())
            .run(grouped, &reducer)?;
        if self.always_show_empty {
            panels.iter_mut().for_each(show_empty);
        }
        Ok(panels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinical::{lab_options, LabResult, Subject};
    use crate::key::ChartRole;
    use crate::resolver::OptionParams;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_stats_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let stats = BoxStats::from_data(&data).unwrap();

        assert_relative_eq!(stats.median, 5.0);
        assert_relative_eq!(stats.q1, 3.0);
        assert_relative_eq!(stats.q3, 7.0);
        assert_relative_eq!(stats.mean, 5.0);
        assert_eq!(stats.count, 9);
        assert!(stats.outliers.is_empty());
    }

    #[test]
    fn test_box_stats_with_outliers() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        let stats = BoxStats::from_data(&data).unwrap();

        assert_eq!(stats.outliers, vec![100.0]);
        assert_relative_eq!(stats.max, 5.0);
    }

    #[test]
    fn test_box_stats_empty_and_nan() {
        assert!(BoxStats::from_data(&[]).is_none());
        assert!(BoxStats::from_data(&[f64::NAN]).is_none());
    }

    #[test]
    fn test_box_stats_single() {
        let stats = BoxStats::from_data(&[42.0]).unwrap();
        assert_relative_eq!(stats.min, 42.0);
        assert_relative_eq!(stats.max, 42.0);
        assert_relative_eq!(stats.median, 42.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&sorted, 50.0), 2.5);
        assert_relative_eq!(percentile(&sorted, 0.0), 1.0);
        assert_relative_eq!(percentile(&sorted, 100.0), 4.0);
    }

    fn labs() -> Vec<LabResult> {
        let s1 = Arc::new(Subject::new("S1").arm("Placebo"));
        let s2 = Arc::new(Subject::new("S2").arm("Drug"));
        vec![
            LabResult::new(1, Arc::clone(&s1), "ALT").value(10.0),
            LabResult::new(2, Arc::clone(&s1), "ALT").value(20.0),
            LabResult::new(3, Arc::clone(&s2), "ALT").value(30.0),
            LabResult::new(4, Arc::clone(&s2), "AST"),
        ]
    }

    fn settings() -> ChartSettings<LabResult> {
        let catalog = lab_options();
        ChartSettings::builder()
            .role(ChartRole::XAxis, catalog.get("test").unwrap().clone(), OptionParams::new())
            .role(ChartRole::ColorBy, catalog.get("arm").unwrap().clone(), OptionParams::new())
            .build()
            .unwrap()
    }

    fn measure() -> Measure<LabResult> {
        Measure::new("value", |l: &LabResult| l.value)
    }

    #[test]
    fn test_box_per_cell() {
        let panels = BoxPlotChart::new(measure()).build(&labs(), &settings()).unwrap();
        let placebo = panels[0].series("Placebo").unwrap();
        let alt = placebo.entry("ALT").unwrap().value.clone().unwrap();
        assert_relative_eq!(alt.median, 15.0);

        let drug = panels[0].series("Drug").unwrap();
        assert!(drug.entry("AST").unwrap().value.is_none());
        assert!(placebo.entry(EMPTY).is_none());
    }

    #[test]
    fn test_always_show_empty_placeholder() {
        let panels = BoxPlotChart::new(measure())
            .always_show_empty(true)
            .build(&labs(), &settings())
            .unwrap();
        let panel = &panels[0];
        assert_eq!(panel.categories.last().map(String::as_str), Some(EMPTY));

        for series in &panel.series {
            let empty = series.entries.last().unwrap();
            assert_eq!(empty.category, EMPTY);
            assert_eq!(empty.rank, panel.categories.len());
            assert_eq!(empty.event_count, 0);
            assert!(empty.value.is_some());
        }
        let drug = panel.series("Drug").unwrap();
        let filler = drug.entry(EMPTY).unwrap().value.clone().unwrap();
        assert_relative_eq!(filler.median, 30.0);
    }
}
