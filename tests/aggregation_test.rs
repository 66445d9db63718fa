//! End-to-end aggregation tests: records in, ordered trellis panels out.
//!
//! Run: cargo test --test aggregation_test

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::collections::HashMap;
use std::sync::Arc;

use approx::assert_relative_eq;
use chrono::NaiveDate;

use trial_viz::clinical::gene_percentages;
use trial_viz::prelude::*;

fn subjects() -> Vec<Arc<Subject>> {
    let dose = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    vec![
        Arc::new(Subject::new("S1").arm("Placebo").age(34).first_dose(dose)),
        Arc::new(Subject::new("S2").arm("Drug").age(61).first_dose(dose)),
        Arc::new(Subject::new("S3").arm("Drug").age(72).first_dose(dose)),
        Arc::new(Subject::new("S4").arm("Placebo").age(45).first_dose(dose)),
    ]
}

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(offset)
}

// ============================================================================
// Discrete ordering
// ============================================================================

#[test]
fn severity_categories_ordered_by_distinct_subjects() {
    let subjects = subjects();
    let events = vec![
        AdverseEvent::new(1, Arc::clone(&subjects[0]), "Nausea").severity(1),
        AdverseEvent::new(2, Arc::clone(&subjects[1]), "Nausea").severity(2),
        AdverseEvent::new(3, Arc::clone(&subjects[2]), "Rash").severity(2),
        AdverseEvent::new(4, Arc::clone(&subjects[0]), "Fatigue").severity(3),
    ];
    let settings = ChartSettings::builder()
        .role(
            ChartRole::XAxis,
            adverse_event_options().get("severity").unwrap().clone(),
            OptionParams::new(),
        )
        .build()
        .unwrap();

    let panels = BarChart::new(BarValue::Subjects).build(&events, &settings).unwrap();
    assert_eq!(panels.len(), 1);
    assert_eq!(panels[0].axis, AxisKind::Discrete);
    assert_eq!(panels[0].categories, vec!["2", "1", "3"]);

    let entries = &panels[0].series[0].entries;
    let ranks: Vec<usize> = entries.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_relative_eq!(entries[0].value, 2.0);
    assert_eq!(entries[0].event_ids, vec![2, 3]);
}

#[test]
fn upstream_duplicates_are_counted() {
    let subjects = subjects();
    let events = vec![
        AdverseEvent::new(1, Arc::clone(&subjects[0]), "Nausea"),
        AdverseEvent::new(2, Arc::clone(&subjects[0]), "Nausea"),
    ];
    let settings = ChartSettings::builder()
        .role(
            ChartRole::XAxis,
            adverse_event_options().get("term").unwrap().clone(),
            OptionParams::new(),
        )
        .build()
        .unwrap();

    let panels = BarChart::new(BarValue::Events).build(&events, &settings).unwrap();
    let nausea = panels[0].series[0].entry("Nausea").unwrap();
    assert_eq!(nausea.subject_count, 1);
    assert_eq!(nausea.event_count, 2);
    assert_relative_eq!(nausea.value, 2.0);
}

// ============================================================================
// Declarative settings
// ============================================================================

const ONSET_BY_ARM: &str = "\
roles:
  x_axis:
    option: onset
    bin_size: 7
    timestamp: days_since_first_dose
trellis:
  - option: arm
";

#[test]
fn yaml_settings_drive_overtime_panels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("onset.yaml");
    std::fs::write(&path, ONSET_BY_ARM).unwrap();

    let spec = SettingsSpec::load(&path).unwrap();
    let settings = spec.build(&adverse_event_options(), &HashMap::new()).unwrap();

    let subjects = subjects();
    let events = vec![
        AdverseEvent::new(1, Arc::clone(&subjects[0]), "Nausea").period(day(1), None),
        AdverseEvent::new(2, Arc::clone(&subjects[1]), "Rash").period(day(2), None),
        AdverseEvent::new(3, Arc::clone(&subjects[2]), "Rash").period(day(16), Some(day(20))),
        AdverseEvent::new(4, Arc::clone(&subjects[3]), "Headache"),
    ];

    let panels = OvertimeChart::new().build(&events, &settings).unwrap();
    let arms: Vec<&str> = panels.iter().map(|p| p.trellis[0].1.as_str()).collect();
    assert_eq!(arms, vec!["Drug", "Placebo"]);

    let drug = &panels[0];
    assert_eq!(drug.axis, AxisKind::Binned);
    assert_eq!(drug.categories, vec!["0 - 6", "7 - 13", "14 - 20"]);
    let counts: Vec<usize> = drug.series[0].entries.iter().map(|e| e.value.count).collect();
    assert_eq!(counts, vec![1, 0, 1]);

    let placebo = &panels[1];
    assert_eq!(placebo.categories, vec!["0 - 6", EMPTY]);
}

#[test]
fn missing_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = SettingsSpec::load(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(Error::ConfigNotFound(_))));
}

#[test]
fn unreadable_settings_path() {
    let dir = tempfile::tempdir().unwrap();
    let result = SettingsSpec::load(dir.path());
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn unknown_option_in_spec() {
    let spec = SettingsSpec::from_yaml("roles:\n  x_axis:\n    option: colour\n").unwrap();
    let result = spec.build(&adverse_event_options(), &HashMap::new());
    assert!(matches!(result, Err(Error::UnknownOption { .. })));
}

// ============================================================================
// Collection-valued dimensions and context
// ============================================================================

fn biomarkers(subjects: &[Arc<Subject>]) -> Vec<Biomarker> {
    vec![
        Biomarker::new(1, Arc::clone(&subjects[0]), "TP53", ["Missense", "Amplification"]),
        Biomarker::new(2, Arc::clone(&subjects[1]), "TP53", ["Missense"]),
        Biomarker::new(3, Arc::clone(&subjects[2]), "KRAS", ["Missense"]),
    ]
}

#[test]
fn alterations_expand_across_series() {
    let subjects = subjects();
    let markers = biomarkers(&subjects);
    let contexts = HashMap::from([(
        "gene_percentage".to_string(),
        gene_percentages(&markers, subjects.len()),
    )]);
    let spec = SettingsSpec::from_yaml(
        "roles:\n  x_axis:\n    option: gene_percentage\n  color_by:\n    option: alteration\n",
    )
    .unwrap();
    let settings = spec.build(&biomarker_options(), &contexts).unwrap();

    let panels = BarChart::new(BarValue::Subjects).build(&markers, &settings).unwrap();
    let panel = &panels[0];
    assert_eq!(panel.axis, AxisKind::Continuous);
    assert_eq!(panel.categories, vec!["TP53 (50%)", "KRAS (25%)"]);
    assert_eq!(panel.series_names(), vec!["Amplification", "Missense"]);

    let missense = panel.series("Missense").unwrap();
    assert_relative_eq!(missense.entry("TP53 (50%)").unwrap().value, 2.0);
    assert_relative_eq!(missense.entry("KRAS (25%)").unwrap().value, 1.0);
    let amplification = panel.series("Amplification").unwrap();
    assert!(amplification.entry("KRAS (25%)").is_none());
}

#[test]
fn hidden_alteration_role_counts_record_once() {
    let subjects = subjects();
    let markers = vec![Biomarker::new(
        1,
        Arc::clone(&subjects[0]),
        "TP53",
        ["Missense", "Deletion"],
    )];
    let spec = SettingsSpec::from_yaml(
        "roles:\n  x_axis:\n    option: gene\n  y_axis:\n    option: alteration\n",
    )
    .unwrap();
    let settings = spec.build(&biomarker_options(), &HashMap::new()).unwrap();

    let panels = BarChart::new(BarValue::Events).build(&markers, &settings).unwrap();
    let tp53 = panels[0].series[0].entry("TP53").unwrap();
    assert_relative_eq!(tp53.value, 1.0);
    assert_eq!(tp53.event_count, 1);
    assert_eq!(tp53.event_ids, vec![1]);
}

#[test]
fn context_option_without_context_fails() {
    let spec = SettingsSpec::from_yaml("roles:\n  x_axis:\n    option: gene_percentage\n").unwrap();
    let settings = spec.build(&biomarker_options(), &HashMap::new()).unwrap();
    let subjects = subjects();
    let result = BarChart::new(BarValue::Subjects).build(&biomarkers(&subjects), &settings);
    assert!(matches!(result, Err(Error::MissingContext(_))));
}

#[test]
fn collection_valued_trellis_rejected() {
    let spec = SettingsSpec::from_yaml(
        "roles:\n  x_axis:\n    option: gene\ntrellis:\n  - option: alteration\n",
    )
    .unwrap();
    let result = spec.build(&biomarker_options(), &HashMap::new());
    assert!(matches!(result, Err(Error::MultiValuedTrellis(_))));
}

// ============================================================================
// Population and output
// ============================================================================

#[test]
fn percent_of_arm_population() {
    let subjects = subjects();
    let events = vec![
        AdverseEvent::new(1, Arc::clone(&subjects[0]), "Nausea"),
        AdverseEvent::new(2, Arc::clone(&subjects[1]), "Nausea"),
        AdverseEvent::new(3, Arc::clone(&subjects[2]), "Nausea"),
    ];
    let spec = SettingsSpec::from_yaml(
        "roles:\n  x_axis:\n    option: term\n  color_by:\n    option: age_group\ntrellis:\n  - option: arm\n",
    )
    .unwrap();
    let settings = spec.build(&adverse_event_options(), &HashMap::new()).unwrap();

    let records: Vec<Subject> = subjects.iter().map(|s| (**s).clone()).collect();
    let index = GroupingEngine::new()
        .population(&records, &subject_options(), &settings)
        .unwrap();
    assert_eq!(index.total(), 4);

    let panels = BarChart::new(BarValue::PercentOfPopulation)
        .series_order(SeriesOrder::NumericRange)
        .population(Arc::new(index))
        .build(&events, &settings)
        .unwrap();

    let drug = &panels[0];
    assert_eq!(drug.trellis, vec![("arm".to_string(), "Drug".to_string())]);
    assert_eq!(drug.series_names(), vec!["18 - 64", "65+"]);
    for series in &drug.series {
        assert_relative_eq!(series.entry("Nausea").unwrap().value, 50.0);
    }
    let placebo = &panels[1];
    assert_relative_eq!(placebo.series[0].entry("Nausea").unwrap().value, 50.0);
}

#[test]
fn shift_panels_serialize() {
    let subjects = subjects();
    let labs = vec![
        LabResult::new(1, Arc::clone(&subjects[0]), "ALT").shift("Normal", "High"),
        LabResult::new(2, Arc::clone(&subjects[1]), "ALT").shift("Normal", "Normal"),
    ];
    let spec = SettingsSpec::from_yaml(
        "roles:\n  x_axis:\n    option: baseline_flag\n  y_axis:\n    option: flag\n",
    )
    .unwrap();
    let settings = spec.build(&lab_options(), &HashMap::new()).unwrap();
    let registry = Arc::new(ColorRegistry::default());

    let panels = ShiftChart::new()
        .colors(Arc::clone(&registry))
        .build(&labs, &settings)
        .unwrap();
    assert_eq!(panels[0].series_names(), vec!["High", "Normal"]);
    assert_eq!(registry.assigned("flag").len(), 2);

    let yaml = serde_yaml_ng::to_string(&panels).unwrap();
    assert!(yaml.contains("High"));
    assert!(yaml.contains("subject_count"));
    assert!(yaml.contains("color"));
}
