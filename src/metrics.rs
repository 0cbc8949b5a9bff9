//! `metrics`
//!
//! The numerical engine: one-shot intensity statistics, the
//! per-slice plane-fit background estimator, and the histogram
//! gap detector.

pub mod basic;
pub mod background;
pub mod histogram;

pub use basic::{bit_depth, dynamic_range, saturation_percentage, is_low_bit_depth};
pub use background::{
    Aggregation,
    BackgroundConfig,
    BackgroundEstimate,
    FitError,
    PlaneFitEstimator,
    PlaneModel,
};
pub use histogram::{GapStats, HistogramConfig, HistogramSummary, detect_zero_bins};
