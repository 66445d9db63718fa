//! Counts over time.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use super::{CellReducer, Chart, Pipeline, TrellisPanel};
use crate::axis::SeriesOrder;
use crate::color::ColorRegistry;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::grouping::{EventBucket, GroupedEvents};
use crate::key::{ChartRole, GroupByKey};
use crate::settings::{ChartSettings, CountBasis};

/// Value of one time bin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OvertimePoint {
    /// Count on the chart's count basis.
    pub count: usize,
    /// Distinct subjects seen in this bin or any earlier bin of the series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_subjects: Option<usize>,
    #[serde(skip)]
    subjects: BTreeSet<String>,
}

/// Subject or event counts per time bin.
///
/// The x axis must be a binned option; every bin between the first and last
/// observed one is present in each series.
#[derive(Debug, Clone, Default)]
pub struct OvertimeChart {
    cumulative: bool,
    series_order: SeriesOrder,
    colors: Option<Arc<ColorRegistry>>,
}

impl OvertimeChart {
    /// Overtime chart without cumulative counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also report cumulative distinct subjects.
    #[must_use]
    pub fn cumulative(mut self, cumulative: bool) -> Self {
        self.cumulative = cumulative;
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

struct OvertimeReducer {
    basis: CountBasis,
    cumulative: bool,
}

impl<E: Event> CellReducer<E> for OvertimeReducer {
    type Output = OvertimePoint;

    fn reduce(&self, _panel: &GroupByKey, cell: &EventBucket<'_, E>) -> OvertimePoint {
        OvertimePoint {
            count: cell.count(self.basis),
            cumulative_subjects: None,
            subjects: if self.cumulative {
                cell.subjects().iter().map(|s| (*s).to_string()).collect()
            } else {
                BTreeSet::new()
            },
        }
    }

    fn zero(&self, _panel: &GroupByKey) -> OvertimePoint {
        OvertimePoint::default()
    }
}

fn accumulate(panel: &mut TrellisPanel<OvertimePoint>) {
    for series in &mut panel.series {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        for entry in &mut series.entries {
            seen.append(&mut entry.value.subjects);
            entry.value.cumulative_subjects = Some(seen.len());
        }
    }
}

impl<E: Event> Chart<E> for OvertimeChart {
    type Value = OvertimePoint;

    fn panels(
        &self,
        grouped: &GroupedEvents<'_, E>,
        settings: &ChartSettings<E>,
    ) -> Result<Vec<TrellisPanel<OvertimePoint>>> {
        let binned = settings
            .role(ChartRole::XAxis)
            .is_some_and(|x| x.option.is_binnable() && x.params.binning.is_some());
        if !binned {
            return Err(Error::InvalidSettings(
                "overtime charts need a binned x axis".to_string(),
            ));
        }

        let reducer = OvertimeReducer {
            basis: settings.count_basis(),
            cumulative: self.cumulative,
        };
        let mut panels = Pipeline::new()
            .series_order(self.series_order)
            .configure(settings, self.colors.as_ref())
            .run(grouped, &reducer)?;
        if self.cumulative {
            panels.iter_mut().for_each(accumulate);
        }
        Ok(panels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisKind;
    use crate::clinical::{adverse_event_options, AdverseEvent, Subject};
    use crate::resolver::{BinningParams, OptionParams, TimestampBasis};
    use crate::value::EMPTY;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn events() -> Vec<AdverseEvent> {
        let s1 = Arc::new(Subject::new("S1").first_dose(day(1)));
        let s2 = Arc::new(Subject::new("S2").first_dose(day(1)));
        vec![
            AdverseEvent::new(1, Arc::clone(&s1), "Rash").period(day(2), None),
            AdverseEvent::new(2, Arc::clone(&s2), "Rash").period(day(3), None),
            AdverseEvent::new(3, Arc::clone(&s1), "Rash").period(day(20), None),
            AdverseEvent::new(4, Arc::clone(&s2), "Rash"),
        ]
    }

    fn onset_settings(binning: Option<BinningParams>) -> ChartSettings<AdverseEvent> {
        let params = binning.map_or_else(OptionParams::new, |b| OptionParams::new().binning(b));
        ChartSettings::builder()
            .role(
                ChartRole::XAxis,
                adverse_event_options().get("onset").unwrap().clone(),
                params,
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_weekly_bins_with_gap() {
        let binning = BinningParams::new(Some(7), TimestampBasis::DaysSinceFirstDose).unwrap();
        let panels = OvertimeChart::new()
            .build(&events(), &onset_settings(Some(binning)))
            .unwrap();
        let panel = &panels[0];
        assert_eq!(panel.axis, AxisKind::Binned);
        assert_eq!(panel.categories, vec!["0 - 6", "7 - 13", "14 - 20", EMPTY]);

        let counts: Vec<usize> = panel.series[0].entries.iter().map(|e| e.value.count).collect();
        assert_eq!(counts, vec![2, 0, 1, 1]);
        assert!(panel.series[0].entries[0].value.cumulative_subjects.is_none());
    }

    #[test]
    fn test_cumulative_subjects() {
        let binning = BinningParams::new(Some(7), TimestampBasis::DaysSinceFirstDose).unwrap();
        let panels = OvertimeChart::new()
            .cumulative(true)
            .build(&events(), &onset_settings(Some(binning)))
            .unwrap();
        let cumulative: Vec<Option<usize>> = panels[0].series[0]
            .entries
            .iter()
            .map(|e| e.value.cumulative_subjects)
            .collect();
        assert_eq!(cumulative, vec![Some(2), Some(2), Some(2), Some(2)]);
    }

    #[test]
    fn test_requires_binned_axis() {
        let result = OvertimeChart::new().build(&events(), &onset_settings(None));
        assert!(matches!(result, Err(Error::InvalidSettings(_))));

        let term = ChartSettings::builder()
            .role(
                ChartRole::XAxis,
                adverse_event_options().get("term").unwrap().clone(),
                OptionParams::new(),
            )
            .build()
            .unwrap();
        assert!(OvertimeChart::new().build(&events(), &term).is_err());
    }

    #[test]
    fn test_calendar_date_bins() {
        let binning = BinningParams::sized(10).unwrap();
        let panels = OvertimeChart::new()
            .build(&events()[..3], &onset_settings(Some(binning)))
            .unwrap();
        // Mar 2 and Mar 3 share a bin, Mar 20 is two bins later.
        let categories = &panels[0].categories;
        assert_eq!(categories.len(), 3);
        assert!(categories.iter().all(|c| c.contains(" - ")));
    }
}
