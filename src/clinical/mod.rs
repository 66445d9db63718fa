//! Clinical-trial records and their grouping options.
//!
//! Records are joined with their [`Subject`] before grouping. Each record type
//! has an option catalog; subject-level options are shared by all of them.

mod options;
mod records;

pub use options::{
    adverse_event_options, best_overall_responses, biomarker_options, gene_percentages,
    lab_options, subject_options, AGE_GROUPS, RESPONSES,
};
pub use records::{AdverseEvent, Biomarker, HasSubject, LabResult, Subject};
