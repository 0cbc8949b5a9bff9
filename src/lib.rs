//! Image-quality metrics for multi-channel volumetric
//! microscopy intensity data: bit depth, dynamic range,
//! saturation, per-slice background non-uniformity, and
//! histogram gaps.
//!
//! Decoding acquisition files is left to the caller, who
//! implements `ImageSource` (or uses `StackSource` on data
//! already in memory) and runs a `MetricsEngine` over it.

use ndarray::prelude::*;
use ndarray::Data;

mod utils;
mod data;
mod metrics;
mod engine;
pub mod logger;

pub use utils::{
    QcError,
    DomainError,
    ConfigError,
    Result,
    CancellationToken,
    SliceProgress,
    ProgressFn,
};

pub use data::{
    Intensity,
    IntensityVolume,
    IntensitySlice,
    ValueRange,
    VolumeDims,
    DimensionsError,
    ImageSource,
    StackSource,
};

pub use metrics::{
    bit_depth,
    dynamic_range,
    saturation_percentage,
    is_low_bit_depth,
    detect_zero_bins,
    Aggregation,
    BackgroundConfig,
    BackgroundEstimate,
    FitError,
    GapStats,
    HistogramConfig,
    HistogramSummary,
    PlaneFitEstimator,
    PlaneModel,
};

pub use engine::{
    Analysis,
    BasicScope,
    MetricsConfig,
    MetricsConfigBuilder,
    MetricsEngine,
    MetricsRecord,
    MetricsSink,
    TracingReporter,
};

/// `flat_plane_deviation(volume)` fits a plane to every Z slice
/// of a (Z, Y, X) volume and returns the fitted background along
/// with the mean over slices of the standard deviation of
/// `|slice - plane|`.
///
/// ## Arguments
///
/// * `volume` - The intensity data, ordered (Z, Y, X)
///
/// ## Example
///
/// ```
/// use ndarray::Array3;
/// use intensity_qc::flat_plane_deviation;
///
/// let volume = Array3::<u16>::from_elem((2, 4, 4), 50);
/// let (background, non_uniformity) = flat_plane_deviation(&volume).unwrap();
/// assert_eq!(background[[1, 3, 3]], 50.0);
/// assert_eq!(non_uniformity, 0.0);
/// ```
pub fn flat_plane_deviation<S, T>(volume : &ArrayBase<S, Ix3>) -> Result<(Array3<f64>, f64)>
    where S : Data<Elem = T>, T : Intensity {
    let estimate = PlaneFitEstimator::default().estimate(volume)?;
    Ok((estimate.background, estimate.non_uniformity))
}

/// `channel_metrics(source, config)` runs a `MetricsEngine` built
/// from `config` over every channel of `source`, logging each
/// record with `TracingReporter`.
///
/// ## Errors
///
/// * `ConfigError` - if `config` is invalid. Per-channel failures
/// are returned in the channel's slot instead.
///
/// ## Example
///
/// ```rust, ignore
/// let source = StackSource::new(stack);
/// for outcome in channel_metrics(&source, MetricsConfig::default())? {
///     println!("{:?}", outcome);
/// }
/// ```
pub fn channel_metrics<S : ImageSource>(source : &S, config : MetricsConfig)
    -> Result<Vec<Result<MetricsRecord>>> {
    let engine = MetricsEngine::new(config)?;
    Ok(engine.run(source, &mut TracingReporter))
}
