//! Intensity histograms and the empty-bin check.
//!
//! Banding, clipping and discretization artifacts leave gaps in
//! the intensity distribution. The check counts empty bins between
//! the first populated bin and the bin where the cumulative count
//! crosses a high percentile, so a sparse tail of outliers does not
//! inflate the result.

use itertools::{Itertools, MinMaxResult};
use ndarray::prelude::*;
use ndarray::{Data, Dimension};
use tracing::trace;

use crate::data::Intensity;
use crate::utils::ConfigError;

pub const DEFAULT_BINS : usize = 256;
pub const DEFAULT_PERCENTILE_THRESHOLD : f64 = 99.99;

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramConfig {
    pub bins : usize,
    /// Percentile (in (0, 100]) at which the cumulative
    /// distribution is cut off.
    pub percentile_threshold : f64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        HistogramConfig {
            bins : DEFAULT_BINS,
            percentile_threshold : DEFAULT_PERCENTILE_THRESHOLD,
        }
    }
}

impl HistogramConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bins == 0 {
            return Err(ConfigError::InvalidBins(self.bins));
        }
        validate_percentile(self.percentile_threshold)
    }
}

fn validate_percentile(percentile : f64) -> Result<(), ConfigError> {
    // NaN fails both comparisons
    if percentile > 0.0 && percentile <= 100.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidPercentile(percentile))
    }
}

/// Result of the empty-bin check.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GapStats {
    /// Empty bins in `[first_populated_bin, threshold_index)`.
    pub zero_bins : usize,
    /// `zero_bins` over the width of that range, 0 if the range is empty.
    pub zero_bin_ratio : f64,
    /// `None` if no bin holds any sample.
    pub first_populated_bin : Option<usize>,
    /// First bin whose cumulative count reaches the percentile.
    pub threshold_index : usize,
}

/// Equal-width histogram over the observed intensity range.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSummary {
    pub counts : Array1<u64>,
    /// `bins + 1` edges. Every bin is half-open except the last,
    /// which includes its right edge.
    pub edges : Array1<f64>,
    /// Running sum of `counts`.
    pub cumulative : Array1<u64>,
}

impl HistogramSummary {
    /// Bins `array` (flattened) into `bins` equal-width bins spanning
    /// `[min, max]` of the data. A single-valued input spans
    /// `[v - 0.5, v + 0.5]`, an empty one `[0, 1]`.
    ///
    /// ## Errors
    ///
    /// * `ConfigError::InvalidBins` - if `bins` is 0
    pub fn compute<S, T, D>(array : &ArrayBase<S, D>, bins : usize) -> Result<Self, ConfigError>
        where S : Data<Elem = T>, T : Intensity, D : Dimension {
        if bins == 0 {
            return Err(ConfigError::InvalidBins(bins));
        }

        let observed : Option<(f64, f64)> = match array.iter().minmax() {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(&v) => Some((v.as_(), v.as_())),
            MinMaxResult::MinMax(&lo, &hi) => Some((lo.as_(), hi.as_())),
        };
        let (lo, hi) = match observed {
            None => (0.0, 1.0),
            Some((lo, hi)) if lo == hi => (lo - 0.5, hi + 0.5),
            Some((lo, hi)) => (lo, hi),
        };

        let step = (hi - lo) / bins as f64;
        let edges = Array1::from_shape_fn(bins + 1, |i| {
            if i == bins { hi } else { lo + i as f64 * step }
        });

        let norm = bins as f64 / (hi - lo);
        let mut counts = Array1::<u64>::zeros(bins);
        array.iter().for_each(|&v| {
            let v : f64 = v.as_();
            let mut idx = (((v - lo) * norm) as usize).min(bins - 1);
            // Rounding in `norm` can put a value one bin off from
            // the edges that bracket it
            if v < edges[idx] && idx > 0 {
                idx -= 1;
            } else if idx + 1 < bins && v >= edges[idx + 1] {
                idx += 1;
            }
            counts[idx] += 1;
        });

        let mut cumulative = counts.clone();
        cumulative.accumulate_axis_inplace(Axis(0), |&prev, curr| *curr += prev);

        Ok(HistogramSummary { counts, edges, cumulative })
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Smallest bin index whose cumulative count is at least
    /// `percentile`% of the total (a left-sided search on the
    /// cumulative counts).
    pub fn percentile_index(&self, percentile : f64) -> Result<usize, ConfigError> {
        validate_percentile(percentile)?;
        let target = percentile / 100.0 * self.total() as f64;
        Ok(
            self.cumulative.iter()
            .position(|&c| c as f64 >= target)
            .unwrap_or(self.bins())
        )
    }

    /// Counts empty bins between the first populated bin and the
    /// `percentile` cutoff.
    ///
    /// An empty histogram and a cutoff at or before the first
    /// populated bin both give zero gaps with ratio 0.
    ///
    /// ## Errors
    ///
    /// * `ConfigError::InvalidPercentile` - if `percentile` is outside (0, 100]
    pub fn gap_stats(&self, percentile : f64) -> Result<GapStats, ConfigError> {
        let threshold_index = self.percentile_index(percentile)?;

        let first_populated_bin = match self.counts.iter().position(|&c| c > 0) {
            Some(first) => first,
            None => return Ok(GapStats{ threshold_index, ..GapStats::default() }),
        };

        if threshold_index <= first_populated_bin {
            return Ok(GapStats {
                zero_bins : 0,
                zero_bin_ratio : 0.0,
                first_populated_bin : Some(first_populated_bin),
                threshold_index,
            });
        }

        let zero_bins = self.counts
            .slice(s![first_populated_bin..threshold_index])
            .iter()
            .filter(|&&c| c == 0)
            .count();
        let zero_bin_ratio = zero_bins as f64 / (threshold_index - first_populated_bin) as f64;

        trace!(zero_bins, zero_bin_ratio, first_populated_bin, threshold_index, "Histogram gaps");
        Ok(GapStats {
            zero_bins,
            zero_bin_ratio,
            first_populated_bin : Some(first_populated_bin),
            threshold_index,
        })
    }
}

/// Builds the histogram described by `config` and runs the
/// empty-bin check on it.
///
/// ## Example
///
/// ```rust, ignore
/// let stats = detect_zero_bins(&volume.view(), &HistogramConfig::default())?;
/// if stats.zero_bin_ratio > 0.1 {
///     println!("Sparse intensity distribution");
/// }
/// ```
pub fn detect_zero_bins<S, T, D>(array : &ArrayBase<S, D>, config : &HistogramConfig)
    -> Result<GapStats, ConfigError>
    where S : Data<Elem = T>, T : Intensity, D : Dimension {
    config.validate()?;
    HistogramSummary::compute(array, config.bins)?.gap_stats(config.percentile_threshold)
}
