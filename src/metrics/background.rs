//! Methods in this submodule estimate a planar background for
//! every Z slice of a volume and summarize how far each slice
//! deviates from its plane.
//!
//! Slices are fit independently, so they are spread across the
//! rayon pool a few at a time and the per-slice results are
//! gathered back in Z order.

mod plane;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::prelude::*;
use ndarray::Data;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::data::{Intensity, VolumeDims};
use crate::utils::{
    parallelize_op,
    CancellationToken,
    ConfigError,
    DomainError,
    ProgressFn,
    QcError,
    SliceProgress,
};

pub use plane::{PlaneModel, FitError, MIN_PLANE_SAMPLES};
use plane::absolute_deviation_std;

/// How per-slice deviations are collapsed into one
/// non-uniformity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    /// Arithmetic mean across slices. Robust to a single bad slice.
    #[default]
    Mean,
    /// Worst slice.
    Max,
}

impl Aggregation {
    /// Collapses `deviations`. Returns 0 for an empty series.
    pub fn apply(&self, deviations : &ArrayView1<f64>) -> f64 {
        if deviations.is_empty() {
            return 0.0;
        }
        match self {
            Aggregation::Mean => deviations.sum() / deviations.len() as f64,
            Aggregation::Max => deviations.iter().cloned().fold(0.0, f64::max),
        }
    }
}

/// Settings for `PlaneFitEstimator`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundConfig {
    pub aggregation : Aggregation,
    /// Fit slices on the rayon pool rather than the calling thread.
    pub parallel : bool,
    /// Number of consecutive slices handed to each task.
    pub slices_per_task : usize,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        BackgroundConfig {
            aggregation : Aggregation::Mean,
            parallel : true,
            slices_per_task : 1,
        }
    }
}

impl BackgroundConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slices_per_task == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        Ok(())
    }
}

/// Everything the plane fit produces for one volume.
#[derive(Debug, Clone)]
pub struct BackgroundEstimate {
    /// Fitted plane evaluated at every voxel, same shape as the input.
    pub background : Array3<f64>,
    /// One fitted plane per Z slice.
    pub planes : Vec<PlaneModel>,
    /// Standard deviation of `|slice - plane|`, one per Z slice.
    pub deviations : Array1<f64>,
    /// `deviations` collapsed with `aggregation`.
    pub non_uniformity : f64,
    pub aggregation : Aggregation,
}

impl BackgroundEstimate {
    pub fn mean_deviation(&self) -> f64 {
        Aggregation::Mean.apply(&self.deviations.view())
    }

    pub fn max_deviation(&self) -> f64 {
        Aggregation::Max.apply(&self.deviations.view())
    }
}

/// Fits a plane to each Z slice of a volume.
///
/// ## Example
///
/// ```rust, ignore
/// let estimator = PlaneFitEstimator::new(BackgroundConfig::default())
///     .with_cancellation(token.clone());
/// let estimate = estimator.estimate(&volume.view())?;
/// println!("Non-uniformity: {}", estimate.non_uniformity);
/// ```
#[derive(Clone, Default)]
pub struct PlaneFitEstimator {
    config : BackgroundConfig,
    cancel : Option<CancellationToken>,
    progress : Option<Arc<ProgressFn>>,
}

impl std::fmt::Debug for PlaneFitEstimator {
    fn fmt(&self, f : &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaneFitEstimator")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl PlaneFitEstimator {
    pub fn new(config : BackgroundConfig) -> Self {
        PlaneFitEstimator {
            config,
            cancel : None,
            progress : None,
        }
    }

    /// Polls `token` before each slice; once it is cancelled the
    /// estimate fails with `QcError::Cancelled`.
    pub fn with_cancellation(mut self, token : CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Calls `progress` after each slice is fit.
    pub fn with_progress(mut self, progress : Arc<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &BackgroundConfig {
        &self.config
    }

    fn checkpoint(&self) -> Result<(), QcError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(QcError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Fits every slice of `volume` (axes Z, Y, X) and aggregates the
    /// per-slice deviations. Fails as a whole if any slice fails, so a
    /// partially-filled background is never returned.
    ///
    /// ## Arguments
    ///
    /// * `volume` - The intensity data, ordered (Z, Y, X)
    ///
    /// ## Errors
    ///
    /// * `DomainError::EmptyInput` - if any axis has length 0
    ///
    /// * `FitError` - if a slice has fewer than 3 pixels or its fit
    /// is not finite
    ///
    /// * `ConfigError::InvalidChunkSize` - if `slices_per_task` is 0
    ///
    /// * `QcError::Cancelled` - if the cancellation token is tripped
    pub fn estimate<S, T>(&self, volume : &ArrayBase<S, Ix3>) -> Result<BackgroundEstimate, QcError>
        where S : Data<Elem = T>, T : Intensity {
        self.config.validate()?;

        let dims = VolumeDims::from(volume.dim());
        if dims.require_nonempty().is_err() {
            return Err(DomainError::EmptyInput.into());
        }
        if dims.slice_len() < MIN_PLANE_SAMPLES {
            return Err(FitError::InsufficientSamples{ slice : 0, samples : dims.slice_len() }.into());
        }

        let total = dims.depth;
        let completed = AtomicUsize::new(0);
        let mut background = Array3::<f64>::zeros(volume.dim());

        let fit_chunk = |start : usize, input : &ArrayView3<T>, output : &mut ArrayViewMut3<f64>|
            -> Result<Vec<(PlaneModel, f64)>, QcError> {
            input.outer_iter().zip(output.outer_iter_mut()).enumerate()
            .map(|(offset, (slice, mut fitted))| -> Result<(PlaneModel, f64), QcError> {
                let z = start + offset;
                self.checkpoint()?;

                let plane = PlaneModel::fit(&slice, z)?;
                plane.render_into(&mut fitted);
                let deviation = absolute_deviation_std(&slice, &fitted.view());

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(slice = z, completed = done, total, deviation, "Fitted background plane");
                if let Some(progress) = &self.progress {
                    progress(SliceProgress{ slice : z, completed : done, total });
                }
                Ok((plane, deviation))
            }).collect()
        };

        let per_chunk = if self.config.parallel {
            parallelize_op!((volume, background), self.config.slices_per_task, fit_chunk)?
        } else {
            parallelize_op!(serial, (volume, background), self.config.slices_per_task, fit_chunk)?
        };

        let (planes, deviations) : (Vec<PlaneModel>, Vec<f64>) = per_chunk.into_iter().flatten().unzip();
        let deviations = Array1::from(deviations);
        let non_uniformity = self.config.aggregation.apply(&deviations.view());
        trace!(?deviations, non_uniformity, "Aggregated slice deviations");

        Ok(BackgroundEstimate {
            background,
            planes,
            deviations,
            non_uniformity,
            aggregation : self.config.aggregation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 2 x 4 x 4: slice 0 constant 50, slice 1 a ramp 0..15 in
    /// row-major order plus a bump so it isn't exactly planar.
    fn two_slice_volume() -> Array3<u16> {
        let mut volume = Array3::<u16>::from_elem((2, 4, 4), 50);
        volume.index_axis_mut(Axis(0), 1).indexed_iter_mut().for_each(|((y, x), v)| {
            *v = (4 * y + x) as u16;
        });
        volume[[1, 2, 2]] += 7;
        volume
    }

    #[test]
    fn mean_of_flat_and_bumped_slices() {
        let volume = two_slice_volume();
        let estimate = PlaneFitEstimator::default().estimate(&volume).unwrap();

        assert_eq!(estimate.deviations.len(), 2);
        assert_eq!(estimate.deviations[0], 0.0);
        assert!(estimate.deviations[1] > 0.0);
        assert!((estimate.non_uniformity - estimate.deviations[1] / 2.0).abs() < 1e-12);

        // Slice 0 background is exactly the constant plane
        assert!(estimate.background.index_axis(Axis(0), 0).iter().all(|&b| b == 50.0));
        assert_eq!(estimate.planes[0], PlaneModel::new(0.0, 0.0, 50.0));
    }

    #[test]
    fn exact_ramp_has_no_deviation() {
        let volume = Array3::<u8>::from_shape_fn((3, 4, 4), |(z, y, x)| (4 * y + x + z) as u8);
        let estimate = PlaneFitEstimator::default().estimate(&volume).unwrap();
        assert!(estimate.deviations.iter().all(|&d| d < 1e-9));
        for (z, plane) in estimate.planes.iter().enumerate() {
            assert!((plane.p0 - 1.0).abs() < 1e-9);
            assert!((plane.p1 - 4.0).abs() < 1e-9);
            assert!((plane.p2 - z as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn serial_and_parallel_agree() {
        let volume = Array3::<u16>::from_shape_fn((7, 9, 5), |(z, y, x)| ((x * y * 13 + z * 31 + x * x) % 997) as u16);

        let parallel = PlaneFitEstimator::new(BackgroundConfig{ slices_per_task : 2, ..Default::default() })
            .estimate(&volume).unwrap();
        let serial = PlaneFitEstimator::new(BackgroundConfig{ parallel : false, ..Default::default() })
            .estimate(&volume).unwrap();

        assert_eq!(parallel.deviations, serial.deviations);
        assert_eq!(parallel.planes, serial.planes);
        assert_eq!(parallel.background, serial.background);
    }

    #[test]
    fn aggregation_modes() {
        let volume = two_slice_volume();
        let max = PlaneFitEstimator::new(BackgroundConfig{ aggregation : Aggregation::Max, ..Default::default() })
            .estimate(&volume).unwrap();
        assert_eq!(max.non_uniformity, max.deviations[1]);
        assert_eq!(max.max_deviation(), max.deviations[1]);
        assert!((max.mean_deviation() - max.deviations[1] / 2.0).abs() < 1e-12);

        assert_eq!(Aggregation::Mean.apply(&Array1::<f64>::zeros(0).view()), 0.0);
    }

    #[test]
    fn degenerate_volumes_fail() {
        let empty = Array3::<u8>::zeros((0, 4, 4));
        assert!(matches!(
            PlaneFitEstimator::default().estimate(&empty),
            Err(QcError::Domain(DomainError::EmptyInput))
        ));

        let tiny = Array3::<u8>::zeros((3, 1, 2));
        assert!(matches!(
            PlaneFitEstimator::default().estimate(&tiny),
            Err(QcError::Fit(FitError::InsufficientSamples{ samples : 2, .. }))
        ));

        let bad_chunks = PlaneFitEstimator::new(BackgroundConfig{ slices_per_task : 0, ..Default::default() });
        assert!(matches!(
            bad_chunks.estimate(&Array3::<u8>::zeros((1, 3, 3))),
            Err(QcError::Config(ConfigError::InvalidChunkSize))
        ));
    }

    #[test]
    fn cancelled_before_start_returns_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let result = PlaneFitEstimator::default()
            .with_cancellation(token)
            .estimate(&Array3::<u8>::zeros((4, 3, 3)));
        assert!(matches!(result, Err(QcError::Cancelled)));
    }

    #[test]
    fn cancellation_between_slices() {
        let token = CancellationToken::new();
        let trip = token.clone();
        let progress : Arc<ProgressFn> = Arc::new(move |_ : SliceProgress| trip.cancel());

        let result = PlaneFitEstimator::new(BackgroundConfig{ parallel : false, ..Default::default() })
            .with_cancellation(token)
            .with_progress(progress)
            .estimate(&Array3::<u8>::zeros((4, 3, 3)));
        assert!(matches!(result, Err(QcError::Cancelled)));
    }

    #[test]
    fn cancellation_on_the_rayon_pool() {
        // two workers: at most two slices get past the checkpoint
        // before the first one finishes and trips the token
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let token = CancellationToken::new();
        let trip = token.clone();
        let progress : Arc<ProgressFn> = Arc::new(move |_ : SliceProgress| trip.cancel());

        let estimator = PlaneFitEstimator::default()
            .with_cancellation(token)
            .with_progress(progress);
        assert!(estimator.config().parallel);

        let volume = Array3::<u16>::from_shape_fn((64, 8, 8), |(z, y, x)| (z + y * x) as u16);
        let result = pool.install(|| estimator.estimate(&volume));
        assert!(matches!(result, Err(QcError::Cancelled)));
    }

    #[test]
    fn progress_reports_every_slice() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress : Arc<ProgressFn> = Arc::new(move |p : SliceProgress| {
            sink.lock().unwrap().push(p);
        });

        PlaneFitEstimator::new(BackgroundConfig{ parallel : false, ..Default::default() })
            .with_progress(progress)
            .estimate(&Array3::<u8>::zeros((3, 2, 2)))
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            (0..3).map(|z| SliceProgress{ slice : z, completed : z + 1, total : 3 }).collect::<Vec<_>>()
        );
    }
}
