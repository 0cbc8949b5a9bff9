//! Configuration for `MetricsEngine`.

use std::collections::BTreeSet;

use crate::metrics::{Aggregation, BackgroundConfig, HistogramConfig};
use crate::utils::ConfigError;

/// The optional analyses the engine can run on each channel.
/// Basic metrics always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Analysis {
    /// Per-slice plane fit and the non-uniformity score
    PlaneFit,
    /// Empty-bin check on the intensity histogram
    Histogram,
}

impl Analysis {
    pub fn all() -> BTreeSet<Analysis> {
        BTreeSet::from([Analysis::PlaneFit, Analysis::Histogram])
    }
}

/// Which part of the volume bit depth, dynamic range and
/// saturation are computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BasicScope {
    #[default]
    Volume,
    /// A single representative Z slice
    Slice(usize),
}

/// Per-invocation settings for `MetricsEngine`
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Optional analyses to run
    pub analyses : BTreeSet<Analysis>,
    pub basic_scope : BasicScope,
    pub background : BackgroundConfig,
    pub histogram : HistogramConfig,
    /// Bit depths at or below this are flagged as low
    pub low_bit_depth_threshold : u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            analyses : Analysis::all(),
            basic_scope : BasicScope::Volume,
            background : BackgroundConfig::default(),
            histogram : HistogramConfig::default(),
            low_bit_depth_threshold : 8,
        }
    }
}

impl MetricsConfig {
    pub fn builder() -> MetricsConfigBuilder {
        MetricsConfigBuilder::default()
    }

    pub fn is_enabled(&self, analysis : Analysis) -> bool {
        self.analyses.contains(&analysis)
    }

    /// Checks every parameter the enabled analyses will use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_enabled(Analysis::PlaneFit) {
            self.background.validate()?;
        }
        if self.is_enabled(Analysis::Histogram) {
            self.histogram.validate()?;
        }
        Ok(())
    }
}

/// Builder for MetricsConfig
#[derive(Default)]
pub struct MetricsConfigBuilder {
    analyses : Option<BTreeSet<Analysis>>,
    basic_scope : Option<BasicScope>,
    aggregation : Option<Aggregation>,
    parallel : Option<bool>,
    slices_per_task : Option<usize>,
    bins : Option<usize>,
    percentile_threshold : Option<f64>,
    low_bit_depth_threshold : Option<u32>,
}

impl MetricsConfigBuilder {
    /// Runs exactly `analyses`, nothing else.
    pub fn analyses<I : IntoIterator<Item = Analysis>>(mut self, analyses : I) -> Self {
        self.analyses = Some(analyses.into_iter().collect());
        self
    }

    pub fn enable(mut self, analysis : Analysis) -> Self {
        self.analyses.get_or_insert_with(Analysis::all).insert(analysis);
        self
    }

    pub fn disable(mut self, analysis : Analysis) -> Self {
        self.analyses.get_or_insert_with(Analysis::all).remove(&analysis);
        self
    }

    pub fn basic_scope(mut self, scope : BasicScope) -> Self {
        self.basic_scope = Some(scope);
        self
    }

    pub fn aggregation(mut self, aggregation : Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn parallel(mut self, parallel : bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn slices_per_task(mut self, slices : usize) -> Self {
        self.slices_per_task = Some(slices);
        self
    }

    pub fn bins(mut self, bins : usize) -> Self {
        self.bins = Some(bins);
        self
    }

    pub fn percentile_threshold(mut self, percentile : f64) -> Self {
        self.percentile_threshold = Some(percentile);
        self
    }

    pub fn low_bit_depth_threshold(mut self, bits : u32) -> Self {
        self.low_bit_depth_threshold = Some(bits);
        self
    }

    pub fn build(self) -> MetricsConfig {
        let default = MetricsConfig::default();
        MetricsConfig {
            analyses : self.analyses.unwrap_or(default.analyses),
            basic_scope : self.basic_scope.unwrap_or(default.basic_scope),
            background : BackgroundConfig {
                aggregation : self.aggregation.unwrap_or(default.background.aggregation),
                parallel : self.parallel.unwrap_or(default.background.parallel),
                slices_per_task : self.slices_per_task.unwrap_or(default.background.slices_per_task),
            },
            histogram : HistogramConfig {
                bins : self.bins.unwrap_or(default.histogram.bins),
                percentile_threshold : self.percentile_threshold
                    .unwrap_or(default.histogram.percentile_threshold),
            },
            low_bit_depth_threshold : self.low_bit_depth_threshold
                .unwrap_or(default.low_bit_depth_threshold),
        }
    }
}
