mod parallelize_op;
mod cancel;

pub (crate) use parallelize_op::parallelize_op as parallelize_op;
pub use cancel::{CancellationToken, SliceProgress, ProgressFn};

use thiserror::Error;

use crate::data::DimensionsError;
use crate::metrics::FitError;

/// Errors that can occur while computing quality metrics,
/// either from the numbers themselves (degenerate ranges,
/// singular fits), from the requested parameters, or from
/// the image source handing over the data.
#[derive(Error, Debug)]
pub enum QcError {
    #[error("DomainError: {0}")]
    Domain(#[from] DomainError),

    #[error("FitError: {0}")]
    Fit(#[from] FitError),

    #[error("ConfigError: {0}")]
    Config(#[from] ConfigError),

    #[error("DimensionsError: {0}")]
    Dimensions(#[from] DimensionsError),

    /// The image source failed to produce a channel.
    #[error("SourceError: {0}")]
    Source(String),

    /// A caller tripped the `CancellationToken` between slices
    /// or channels. Nothing computed so far is returned.
    #[error("Computation cancelled")]
    Cancelled,
}

/// Numeric preconditions that the input data fails to meet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Input array contains no samples")]
    EmptyInput,

    #[error("Degenerate value range: min ({min}) must be strictly below max ({max})")]
    DegenerateRange{ min : f64, max : f64 },

    #[error("Sample value {value} lies outside the declared range [{min}, {max}]")]
    OutOfRange{ value : f64, min : f64, max : f64 },
}

/// Invalid analysis parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Histogram requires at least one bin (got {0})")]
    InvalidBins(usize),

    #[error("Percentile threshold must lie in (0, 100] (got {0})")]
    InvalidPercentile(f64),

    #[error("Slices per task must be at least 1")]
    InvalidChunkSize,
}

pub type Result<T> = std::result::Result<T, QcError>;
