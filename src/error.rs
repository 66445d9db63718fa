//! Error types for trial-viz operations.

use std::io;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while grouping events or building chart data.
///
/// Missing attribute values are not errors: they resolve to the empty
/// sentinel and flow through the normal pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading a settings file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value of this kind cannot be placed into a bin.
    #[error("unsupported bin type: {0}")]
    UnsupportedBinType(String),

    /// Two bins of different units were compared or combined.
    #[error("incompatible bins: cannot compare {left} with {right}")]
    IncompatibleBins {
        /// Unit of the left-hand bin.
        left: &'static str,
        /// Unit of the right-hand bin.
        right: &'static str,
    },

    /// A bin size of zero (or below) was requested.
    #[error("bin size must be positive, got {0}")]
    ZeroBinSize(i64),

    /// Filling the gaps between observed bins would produce too many bins.
    #[error("bin fill would exceed {limit} bins; use a larger bin size")]
    TooManyBins {
        /// Maximum number of filled bins.
        limit: usize,
    },

    /// An option that needs an externally computed context was resolved without one.
    #[error("option '{0}' requires a context map but none was supplied")]
    MissingContext(String),

    /// A drug-scoped option was resolved without a drug name.
    #[error("option '{0}' requires a drug name but none was supplied")]
    MissingDrug(String),

    /// A collection-valued option was used as a trellis dimension.
    #[error("option '{0}' yields multiple values and cannot be used as a trellis")]
    MultiValuedTrellis(String),

    /// The same trellis option was configured twice.
    #[error("trellis option '{0}' is configured more than once")]
    DuplicateTrellis(String),

    /// An option id is not present in the catalog.
    #[error("unknown option '{option}' for {entity}")]
    UnknownOption {
        /// Requested option id.
        option: String,
        /// Entity the catalog describes.
        entity: &'static str,
    },

    /// Settings are inconsistent with the requested chart.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings file could not be parsed.
    #[error("settings parse error at line {line}: {message}")]
    ConfigParse {
        /// Line number where the error occurred (1-indexed, 0 if unknown).
        line: usize,
        /// Parser message.
        message: String,
    },

    /// Settings file does not exist.
    #[error("settings file not found: {0}")]
    ConfigNotFound(String),
}
