//! # Trial-Viz
//!
//! Grouping, binning and trellis aggregation of clinical-trial events into
//! chart-ready data.
//!
//! Events (adverse events, lab results, biomarkers, ...) are resolved against
//! a set of grouping options, one per chart role, and split into trellis
//! panels. Each chart kind reduces the cells of a panel to its own value type;
//! the result is ordered, gap-filled and serializable.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::collections::HashMap;
//! use trial_viz::prelude::*;
//!
//! let spec = SettingsSpec::from_yaml(
//!     "roles:\n  x_axis:\n    option: severity\ntrellis:\n  - option: arm\n",
//! )?;
//! let settings = spec.build(&adverse_event_options(), &HashMap::new())?;
//!
//! let panels = BarChart::new(BarValue::Subjects).build(&events, &settings)?;
//! println!("{}", serde_yaml_ng::to_string(&panels)?);
//! ```
//!
//! ## Layers
//!
//! - [`value`], [`binning`]: attribute values and bins
//! - [`resolver`], [`settings`]: grouping options and chart settings
//! - [`key`], [`grouping`]: group-by keys and the parallel grouping engine
//! - [`axis`], [`color`]: axis ordering and stable series colors
//! - [`charts`]: the aggregation pipeline and chart kinds
//! - [`clinical`]: trial records and their option catalogs

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
// Allow unwrap() in tests only
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Core Modules
// ============================================================================

/// Attribute values and the empty sentinel.
pub mod value;

/// Integer, day and date bins.
pub mod binning;

/// Event records and reference dates.
pub mod event;

// ============================================================================
// Grouping Modules
// ============================================================================

/// Grouping options and their parameters.
pub mod resolver;

/// Chart settings, option catalogs and the YAML settings spec.
pub mod settings;

/// Group-by keys.
pub mod key;

/// Parallel grouping of events by key.
pub mod grouping;

// ============================================================================
// Chart Modules
// ============================================================================

/// Category axes and series ordering.
pub mod axis;

/// Color types and the shared series color registry.
pub mod color;

pub mod charts;

pub mod clinical;

// ============================================================================
// Error Types
// ============================================================================

/// Error types for trial-viz operations.
pub mod error;

pub use error::{Error, Result};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types and traits for convenient imports.
///
/// ```rust,ignore
/// use trial_viz::prelude::*;
/// ```
pub mod prelude {
    pub use crate::axis::{AxisKind, CategoryOrder, SeriesOrder};
    pub use crate::binning::Bin;
    pub use crate::charts::{
        BarChart, BarValue, BoxPlotChart, BoxStats, Chart, Measure, OvertimeChart, RangeChart,
        RangeStats, ShiftChart, TrellisPanel,
    };
    pub use crate::clinical::{
        adverse_event_options, biomarker_options, lab_options, subject_options, AdverseEvent,
        Biomarker, LabResult, Subject,
    };
    pub use crate::color::{ColorRegistry, Hsla, Rgba};
    pub use crate::error::{Error, Result};
    pub use crate::event::{Event, EventId};
    pub use crate::grouping::{GroupingEngine, PopulationIndex};
    pub use crate::key::{ChartRole, GroupByKey};
    pub use crate::resolver::{BinningParams, GroupOption, OptionParams, TimestampBasis};
    pub use crate::settings::{ChartSettings, CountBasis, OptionCatalog, SettingsSpec};
    pub use crate::value::{AttributeValue, EMPTY};
}
