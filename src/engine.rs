//! `MetricsEngine`
//!
//! Runs the basic metrics and whichever optional analyses are
//! enabled on each channel an `ImageSource` provides, and hands
//! one `MetricsRecord` per channel to a `MetricsSink`.

mod config;
mod report;

use std::sync::Arc;

use ndarray::prelude::*;
use rayon::prelude::*;
use tracing::{debug, error, info_span, warn};

use crate::data::{ImageSource, Intensity, IntensityVolume};
use crate::metrics::{
    bit_depth,
    detect_zero_bins,
    dynamic_range,
    is_low_bit_depth,
    saturation_percentage,
    PlaneFitEstimator,
};
use crate::utils::{CancellationToken, ProgressFn, QcError, Result};

pub use config::{Analysis, BasicScope, MetricsConfig, MetricsConfigBuilder};
pub use report::{MetricsRecord, MetricsSink, TracingReporter};

/// Computes a `MetricsRecord` per channel.
///
/// ## Example
///
/// ```rust, ignore
/// let config = MetricsConfig::builder()
///     .disable(Analysis::Histogram)
///     .build();
/// let engine = MetricsEngine::new(config)?;
/// let mut records = Vec::new();
/// let outcomes = engine.run(&source, &mut records);
/// ```
pub struct MetricsEngine {
    config : MetricsConfig,
    cancel : CancellationToken,
    progress : Option<Arc<ProgressFn>>,
}

impl MetricsEngine {
    /// Validates `config` and builds an engine around it.
    ///
    /// ## Errors
    ///
    /// * `ConfigError` - if a parameter of an enabled analysis is invalid
    pub fn new(config : MetricsConfig) -> Result<Self> {
        config.validate()?;
        Ok(MetricsEngine {
            config,
            cancel : CancellationToken::new(),
            progress : None,
        })
    }

    /// Calls `progress` after every slice of every plane fit.
    pub fn with_progress(mut self, progress : Arc<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// A handle that aborts the engine's work at the next slice or
    /// channel boundary when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn plane_fit_estimator(&self) -> PlaneFitEstimator {
        let estimator = PlaneFitEstimator::new(self.config.background.clone())
            .with_cancellation(self.cancel.clone());
        match &self.progress {
            Some(progress) => estimator.with_progress(Arc::clone(progress)),
            None => estimator,
        }
    }

    /// Computes every enabled metric for one channel's volume.
    ///
    /// ## Arguments
    ///
    /// * `channel` - Index recorded in the returned `MetricsRecord`
    ///
    /// * `volume` - The channel's (Z, Y, X) intensities and value range
    ///
    /// ## Errors
    ///
    /// Any `QcError` raised by the individual metrics. Nothing is
    /// returned for the channel if any enabled metric fails.
    pub fn evaluate_volume<T : Intensity>(&self, channel : usize, volume : &IntensityVolume<T>)
        -> Result<MetricsRecord> {
        let _span = info_span!("channel", channel).entered();
        if self.cancel.is_cancelled() {
            return Err(QcError::Cancelled);
        }

        let range = volume.range();
        let basic_view : ArrayViewD<T> = match self.config.basic_scope {
            BasicScope::Volume => volume.view().into_dyn(),
            BasicScope::Slice(z) => volume.slice(z)?.into_dyn(),
        };

        let bits = bit_depth(&basic_view);
        let low_bit_depth = is_low_bit_depth(bits, self.config.low_bit_depth_threshold);
        if low_bit_depth {
            warn!(bit_depth = bits, "Low bit depth may limit image quality");
        } else {
            debug!(bit_depth = bits, "Bit depth is adequate");
        }

        let mut record = MetricsRecord {
            channel,
            bit_depth : bits,
            low_bit_depth,
            dynamic_range : dynamic_range(&basic_view, range.min(), range.max())?,
            saturation_percentage : saturation_percentage(&basic_view, range.min(), range.max())?,
            non_uniformity : None,
            slice_deviations : None,
            zero_bins : None,
            zero_bin_ratio : None,
        };

        if self.config.is_enabled(Analysis::PlaneFit) {
            let estimate = self.plane_fit_estimator().estimate(&volume.view())?;
            record.non_uniformity = Some(estimate.non_uniformity);
            record.slice_deviations = Some(estimate.deviations.to_vec());
        }

        if self.config.is_enabled(Analysis::Histogram) {
            let gaps = detect_zero_bins(&volume.view(), &self.config.histogram)?;
            record.zero_bins = Some(gaps.zero_bins);
            record.zero_bin_ratio = Some(gaps.zero_bin_ratio);
        }

        Ok(record)
    }

    /// Fetches `channel` from `source` and evaluates it.
    pub fn evaluate_channel<S : ImageSource>(&self, source : &S, channel : usize)
        -> Result<MetricsRecord> {
        if self.cancel.is_cancelled() {
            return Err(QcError::Cancelled);
        }
        let volume = source.channel_volume(channel)?;
        self.evaluate_volume(channel, &volume)
    }

    /// Evaluates every channel of `source` in order, reporting each
    /// result to `sink`. A failed channel does not stop the others;
    /// its error is passed to `sink.report_failure` and returned in
    /// its slot of the output. Logging failures is left to the sink.
    pub fn run<S : ImageSource, R : MetricsSink>(&self, source : &S, sink : &mut R)
        -> Vec<Result<MetricsRecord>> {
        (0..source.channel_count()).map(|channel| {
            let outcome = self.evaluate_channel(source, channel);
            match &outcome {
                Ok(record) => sink.report(record),
                Err(err) => sink.report_failure(channel, err),
            }
            outcome
        }).collect()
    }

    /// Evaluates every channel of `source` across the rayon pool.
    /// Results come back in channel order.
    pub fn run_parallel<S : ImageSource + Sync>(&self, source : &S) -> Vec<Result<MetricsRecord>> {
        (0..source.channel_count()).into_par_iter()
            .map(|channel| {
                let outcome = self.evaluate_channel(source, channel);
                if let Err(err) = &outcome {
                    error!(channel, %err, "Failed to compute channel metrics");
                }
                outcome
            })
            .collect()
    }
}
