//! The per-channel result bundle and the reporting seam.
//! Formatting for people is left to whoever implements
//! `MetricsSink`.

use tracing::{error, info};

use crate::utils::QcError;

/// Quality metrics for one channel. The optional fields are `None`
/// when the corresponding analysis was not enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub channel : usize,
    pub bit_depth : u32,
    /// `bit_depth` is at or below the configured threshold
    pub low_bit_depth : bool,
    /// Observed spread over representable spread, in [0, 1]
    pub dynamic_range : f64,
    /// Percent of samples at either end of the value range
    pub saturation_percentage : f64,
    pub non_uniformity : Option<f64>,
    /// Per-slice deviations the non-uniformity score was taken from
    pub slice_deviations : Option<Vec<f64>>,
    pub zero_bins : Option<usize>,
    pub zero_bin_ratio : Option<f64>,
}

/// Receives the outcome of each channel as the engine finishes it.
pub trait MetricsSink {
    fn report(&mut self, record : &MetricsRecord);

    /// Called instead of `report` when a channel fails. Ignored
    /// unless overridden; the engine still returns the error.
    fn report_failure(&mut self, _channel : usize, _error : &QcError) {}
}

impl MetricsSink for Vec<MetricsRecord> {
    fn report(&mut self, record : &MetricsRecord) {
        self.push(record.clone());
    }
}

/// Emits one structured `tracing` event per channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl MetricsSink for TracingReporter {
    fn report(&mut self, record : &MetricsRecord) {
        info!(
            channel = record.channel,
            bit_depth = record.bit_depth,
            low_bit_depth = record.low_bit_depth,
            dynamic_range = record.dynamic_range,
            saturation_percentage = record.saturation_percentage,
            non_uniformity = ?record.non_uniformity,
            zero_bins = ?record.zero_bins,
            zero_bin_ratio = ?record.zero_bin_ratio,
            "Channel metrics"
        );
    }

    fn report_failure(&mut self, channel : usize, err : &QcError) {
        error!(channel, %err, "Channel metrics failed");
    }
}
