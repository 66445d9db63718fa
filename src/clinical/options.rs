//! Grouping option catalogs for the clinical records.
//!
//! Subject attributes (arm, sex, age, ...) are population-scoped and available
//! on every record type, so event panels can be split by the same dimensions
//! as the subject population they are compared against.

use std::collections::{BTreeSet, HashMap};

use crate::resolver::{ContextParams, GroupOption};
use crate::settings::OptionCatalog;
use crate::value::{AttributeValue, NumericRange, Ranked};

use super::records::{AdverseEvent, Biomarker, HasSubject, LabResult, Subject};

/// Age groups reported by the `age_group` option.
pub const AGE_GROUPS: [NumericRange; 3] = [
    NumericRange::new(None, Some(17)),
    NumericRange::new(Some(18), Some(64)),
    NumericRange::new(Some(65), None),
];

/// Best overall response categories in clinical order.
pub const RESPONSES: [&str; 5] = [
    "Complete response",
    "Partial response",
    "Stable disease",
    "Progressive disease",
    "Not evaluable",
];

fn age_group(age: Option<i64>) -> AttributeValue {
    age.and_then(|a| AGE_GROUPS.iter().find(|g| g.contains(a)))
        .map_or(AttributeValue::Empty, |g| AttributeValue::Range(*g))
}

fn flag(value: Option<bool>) -> AttributeValue {
    match value {
        Some(true) => "Yes".into(),
        Some(false) => "No".into(),
        None => AttributeValue::Empty,
    }
}

fn text(value: Option<&str>) -> AttributeValue {
    value.map_or(AttributeValue::Empty, AttributeValue::text)
}

/// Subject attributes, resolvable on any record joined with its subject.
fn subject_attributes<E: HasSubject + 'static>() -> Vec<GroupOption<E>> {
    vec![
        GroupOption::new("arm", |e: &E| text(e.subject().arm.as_deref())).population(),
        GroupOption::new("sex", |e: &E| text(e.subject().sex.as_deref())).population(),
        GroupOption::binned("age", |e: &E| e.subject().age.into()).population(),
        GroupOption::new("age_group", |e: &E| age_group(e.subject().age)).population(),
        GroupOption::timestamp("randomisation", |e: &E| {
            let subject = e.subject();
            (subject.randomisation, subject.reference_dates())
        })
        .population(),
        GroupOption::with_context("best_overall_response", |e: &E, context| {
            context
                .get(&e.subject().id)
                .cloned()
                .unwrap_or(AttributeValue::Empty)
        })
        .population(),
    ]
}

fn catalog<E: HasSubject + 'static>(entity: &'static str, own: Vec<GroupOption<E>>) -> OptionCatalog<E> {
    subject_attributes()
        .into_iter()
        .chain(own)
        .fold(OptionCatalog::new(entity), OptionCatalog::with)
}

/// Options for subject records.
#[must_use]
pub fn subject_options() -> OptionCatalog<Subject> {
    catalog(
        "subject",
        vec![GroupOption::new("subject", |s: &Subject| AttributeValue::text(&s.id))],
    )
}

/// Options for adverse events.
#[must_use]
pub fn adverse_event_options() -> OptionCatalog<AdverseEvent> {
    catalog(
        "adverse_event",
        vec![
            GroupOption::new("term", |e: &AdverseEvent| AttributeValue::text(&e.term)),
            GroupOption::new("body_system", |e: &AdverseEvent| text(e.body_system.as_deref())),
            GroupOption::binned("severity", |e: &AdverseEvent| e.severity.into()),
            GroupOption::new("serious", |e: &AdverseEvent| flag(e.serious)),
            GroupOption::timestamp("onset", |e: &AdverseEvent| {
                (e.onset, e.subject.reference_dates())
            }),
            GroupOption::interval("duration", |e: &AdverseEvent| {
                (e.onset, e.resolution, e.subject.reference_dates())
            }),
            GroupOption::drug_scoped("action_taken", |e: &AdverseEvent, drug| {
                text(e.actions.get(drug).map(String::as_str))
            }),
        ],
    )
}

/// Options for lab results.
#[must_use]
pub fn lab_options() -> OptionCatalog<LabResult> {
    catalog(
        "lab_result",
        vec![
            GroupOption::new("test", |l: &LabResult| AttributeValue::text(&l.test)),
            GroupOption::new("flag", |l: &LabResult| text(l.flag.as_deref())),
            GroupOption::new("baseline_flag", |l: &LabResult| text(l.baseline_flag.as_deref())),
            GroupOption::timestamp("collected", |l: &LabResult| {
                (l.collected, l.subject.reference_dates())
            }),
        ],
    )
}

/// Options for biomarker records.
#[must_use]
pub fn biomarker_options() -> OptionCatalog<Biomarker> {
    catalog(
        "biomarker",
        vec![
            GroupOption::new("gene", |b: &Biomarker| AttributeValue::text(&b.gene)),
            GroupOption::multi("alteration", |b: &Biomarker| {
                b.alterations
                    .iter()
                    .map(|a| AttributeValue::text(a.as_str()))
                    .collect()
            }),
            GroupOption::with_context("gene_percentage", |b: &Biomarker, context| {
                context.get(&b.gene).cloned().unwrap_or(AttributeValue::Empty)
            }),
        ],
    )
}

/// Share of the population with an alteration in each gene.
///
/// The result is the context of the `gene_percentage` option: each gene maps
/// to a label such as `TP53 (40%)`, ranked so that the most frequently
/// altered gene comes first. A population of zero yields 0%.
#[must_use]
pub fn gene_percentages(biomarkers: &[Biomarker], population: usize) -> ContextParams {
    let mut subjects: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for marker in biomarkers.iter().filter(|b| !b.alterations.is_empty()) {
        subjects
            .entry(marker.gene.as_str())
            .or_default()
            .insert(marker.subject.id.as_str());
    }
    subjects
        .into_iter()
        .map(|(gene, altered)| {
            let percent = if population == 0 {
                0
            } else {
                (altered.len() * 100 + population / 2) / population
            };
            let rank = -i64::try_from(percent).unwrap_or(i64::MAX);
            (gene, Ranked::new(format!("{gene} ({percent}%)"), rank))
        })
        .collect()
}

/// Context of the `best_overall_response` option from per-subject responses.
///
/// Responses outside [`RESPONSES`] keep their label and sort after the known
/// categories.
#[must_use]
pub fn best_overall_responses<'a, I>(responses: I) -> ContextParams
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    responses
        .into_iter()
        .map(|(subject, response)| {
            let rank = RESPONSES
                .iter()
                .position(|r| r.eq_ignore_ascii_case(response))
                .unwrap_or(RESPONSES.len());
            (
                subject,
                Ranked::new(response, i64::try_from(rank + 1).unwrap_or(i64::MAX)),
            )
        })
        .collect()
}
