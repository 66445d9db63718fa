//! The record contract consumed by the grouping engine.

use chrono::NaiveDate;

/// Identifier of a single event record.
pub type EventId = u64;

/// A typed clinical event that can be grouped.
///
/// Records arrive already joined against the subject metadata their options
/// need; the engine only asks for identity.
pub trait Event: Send + Sync {
    /// Unique id of this record.
    fn event_id(&self) -> EventId;

    /// Id of the subject the record belongs to.
    fn subject_id(&self) -> &str;
}

/// Per-subject reference dates used by relative timestamp bases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceDates {
    /// Date of the first dose of study drug.
    pub first_dose: Option<NaiveDate>,
    /// Date of randomisation.
    pub randomisation: Option<NaiveDate>,
}

impl ReferenceDates {
    /// Create reference dates.
    #[must_use]
    pub const fn new(first_dose: Option<NaiveDate>, randomisation: Option<NaiveDate>) -> Self {
        Self {
            first_dose,
            randomisation,
        }
    }
}
