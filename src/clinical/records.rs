//! Typed clinical-trial records.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventId, ReferenceDates};

/// A trial participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject id.
    pub id: String,
    /// Treatment arm.
    #[serde(default)]
    pub arm: Option<String>,
    /// Sex.
    #[serde(default)]
    pub sex: Option<String>,
    /// Age in years at enrolment.
    #[serde(default)]
    pub age: Option<i64>,
    /// Date of first dose.
    #[serde(default)]
    pub first_dose: Option<NaiveDate>,
    /// Date of randomisation.
    #[serde(default)]
    pub randomisation: Option<NaiveDate>,
}

impl Subject {
    /// Create a subject with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Set the treatment arm.
    #[must_use]
    pub fn arm(mut self, arm: impl Into<String>) -> Self {
        self.arm = Some(arm.into());
        self
    }

    /// Set the sex.
    #[must_use]
    pub fn sex(mut self, sex: impl Into<String>) -> Self {
        self.sex = Some(sex.into());
        self
    }

    /// Set the age.
    #[must_use]
    pub fn age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }

    /// Set the first dose date.
    #[must_use]
    pub fn first_dose(mut self, date: NaiveDate) -> Self {
        self.first_dose = Some(date);
        self
    }

    /// Set the randomisation date.
    #[must_use]
    pub fn randomisation(mut self, date: NaiveDate) -> Self {
        self.randomisation = Some(date);
        self
    }

    /// Reference dates for relative timestamps.
    #[must_use]
    pub fn reference_dates(&self) -> ReferenceDates {
        ReferenceDates::new(self.first_dose, self.randomisation)
    }
}

/// Records joined with the subject they belong to.
pub trait HasSubject {
    /// The owning subject.
    fn subject(&self) -> &Subject;
}

impl HasSubject for Subject {
    fn subject(&self) -> &Subject {
        self
    }
}

impl Event for Subject {
    fn event_id(&self) -> EventId {
        0
    }

    fn subject_id(&self) -> &str {
        &self.id
    }
}

/// An adverse event report.
#[derive(Debug, Clone, PartialEq)]
pub struct AdverseEvent {
    /// Record id.
    pub id: EventId,
    /// Owning subject.
    pub subject: Arc<Subject>,
    /// Reported term.
    pub term: String,
    /// Body system / organ class.
    pub body_system: Option<String>,
    /// Severity grade.
    pub severity: Option<i64>,
    /// Whether the event was serious.
    pub serious: Option<bool>,
    /// Onset date.
    pub onset: Option<NaiveDate>,
    /// Resolution date.
    pub resolution: Option<NaiveDate>,
    /// Action taken with each study drug.
    pub actions: BTreeMap<String, String>,
}

impl AdverseEvent {
    /// Create an event with a term and no other attributes.
    #[must_use]
    pub fn new(id: EventId, subject: Arc<Subject>, term: impl Into<String>) -> Self {
        Self {
            id,
            subject,
            term: term.into(),
            body_system: None,
            severity: None,
            serious: None,
            onset: None,
            resolution: None,
            actions: BTreeMap::new(),
        }
    }

    /// Set the body system.
    #[must_use]
    pub fn body_system(mut self, body_system: impl Into<String>) -> Self {
        self.body_system = Some(body_system.into());
        self
    }

    /// Set the severity grade.
    #[must_use]
    pub fn severity(mut self, grade: i64) -> Self {
        self.severity = Some(grade);
        self
    }

    /// Set the seriousness flag.
    #[must_use]
    pub fn serious(mut self, serious: bool) -> Self {
        self.serious = Some(serious);
        self
    }

    /// Set onset and optional resolution dates.
    #[must_use]
    pub fn period(mut self, onset: NaiveDate, resolution: Option<NaiveDate>) -> Self {
        self.onset = Some(onset);
        self.resolution = resolution;
        self
    }

    /// Record the action taken with a drug.
    #[must_use]
    pub fn action(mut self, drug: impl Into<String>, action: impl Into<String>) -> Self {
        self.actions.insert(drug.into(), action.into());
        self
    }
}

/// A laboratory measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct LabResult {
    /// Record id.
    pub id: EventId,
    /// Owning subject.
    pub subject: Arc<Subject>,
    /// Lab test name.
    pub test: String,
    /// Measured value.
    pub value: Option<f64>,
    /// Reference-range flag of this result (`Low`, `Normal`, `High`).
    pub flag: Option<String>,
    /// Reference-range flag at baseline.
    pub baseline_flag: Option<String>,
    /// Collection date.
    pub collected: Option<NaiveDate>,
}

impl LabResult {
    /// Create a result for a test.
    #[must_use]
    pub fn new(id: EventId, subject: Arc<Subject>, test: impl Into<String>) -> Self {
        Self {
            id,
            subject,
            test: test.into(),
            value: None,
            flag: None,
            baseline_flag: None,
            collected: None,
        }
    }

    /// Set the measured value.
    #[must_use]
    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the baseline and current flags.
    #[must_use]
    pub fn shift(mut self, baseline: impl Into<String>, current: impl Into<String>) -> Self {
        self.baseline_flag = Some(baseline.into());
        self.flag = Some(current.into());
        self
    }

    /// Set the collection date.
    #[must_use]
    pub fn collected(mut self, date: NaiveDate) -> Self {
        self.collected = Some(date);
        self
    }
}

/// Genomic alterations of one gene in one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Biomarker {
    /// Record id.
    pub id: EventId,
    /// Owning subject.
    pub subject: Arc<Subject>,
    /// Gene symbol.
    pub gene: String,
    /// Alteration types found (e.g. `Missense`, `Amplification`).
    pub alterations: Vec<String>,
}

impl Biomarker {
    /// Create a biomarker record.
    #[must_use]
    pub fn new<I, S>(id: EventId, subject: Arc<Subject>, gene: impl Into<String>, alterations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            subject,
            gene: gene.into(),
            alterations: alterations.into_iter().map(Into::into).collect(),
        }
    }
}

macro_rules! joined_record {
    ($($record:ty),+) => {
        $(
            impl HasSubject for $record {
                fn subject(&self) -> &Subject {
                    &self.subject
                }
            }

            impl Event for $record {
                fn event_id(&self) -> EventId {
                    self.id
                }

                fn subject_id(&self) -> &str {
                    &self.subject.id
                }
            }
        )+
    };
}

joined_record!(AdverseEvent, LabResult, Biomarker);
