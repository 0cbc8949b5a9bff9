//! Least-squares fit of `intensity ≈ p0·x + p1·y + p2` over the
//! pixel grid of one slice.
//!
//! The normal equations are solved in closed form. On coordinates
//! centred at the grid midpoint the x and y columns of a full
//! rectangular grid are orthogonal to each other and to the
//! constant column, so the 3x3 system is diagonal:
//!
//! ```text
//! p0 = Σ (x - x̄)·z / Σ (x - x̄)²
//! p1 = Σ (y - ȳ)·z / Σ (y - ȳ)²
//! p2 = z̄ - p0·x̄ - p1·ȳ
//! ```

use ndarray::prelude::*;
use ndarray::Data;
use num_traits::AsPrimitive;
use thiserror::Error;

use crate::data::Intensity;

/// Minimum number of samples for three free parameters.
pub const MIN_PLANE_SAMPLES : usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Slice {slice} has {samples} pixels, at least 3 are needed to fit a plane")]
    InsufficientSamples{ slice : usize, samples : usize },

    /// Guard on the float solve. Sums over integer samples are always
    /// finite, so no supported input is expected to produce this.
    #[error("Plane fit of slice {slice} did not produce finite coefficients")]
    NonFinite{ slice : usize },
}

/// `intensity ≈ p0·x + p1·y + p2`, with `x` the column index and
/// `y` the row index of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaneModel {
    pub p0 : f64,
    pub p1 : f64,
    pub p2 : f64,
}

/// Σ (i - mean)² for i in 0..n, along with the mean.
fn centred_sum_of_squares(n : usize) -> (f64, f64) {
    let mean = (n as f64 - 1.0) / 2.0;
    let ss = (0..n).map(|i| {
        let d = i as f64 - mean;
        d * d
    }).sum();
    (mean, ss)
}

impl PlaneModel {
    pub fn new(p0 : f64, p1 : f64, p2 : f64) -> Self {
        PlaneModel { p0, p1, p2 }
    }

    /// Fits the plane to `slice` (rows = y, columns = x).
    ///
    /// A slice that is a single row (or single column) carries no
    /// information about the y (or x) slope; that coefficient stays
    /// at 0 and the remaining two are fitted.
    ///
    /// ## Arguments
    ///
    /// * `slice` - The 2d intensity data
    ///
    /// * `slice_index` - Z index of the slice, only used in errors
    ///
    /// ## Errors
    ///
    /// * `FitError::InsufficientSamples` - fewer than 3 pixels
    ///
    /// * `FitError::NonFinite` - the solve overflowed (not reachable
    /// from integer samples)
    pub fn fit<S, T>(slice : &ArrayBase<S, Ix2>, slice_index : usize) -> Result<Self, FitError>
        where S : Data<Elem = T>, T : Intensity {
        let (height, width) = slice.dim();
        let samples = height * width;
        if samples < MIN_PLANE_SAMPLES {
            return Err(FitError::InsufficientSamples{ slice : slice_index, samples });
        }

        let (x_mean, ss_x_row) = centred_sum_of_squares(width);
        let (y_mean, ss_y_col) = centred_sum_of_squares(height);
        let ss_x = ss_x_row * height as f64;
        let ss_y = ss_y_col * width as f64;

        let mut sum_z = 0.0;
        let mut sum_xz = 0.0;
        let mut sum_yz = 0.0;
        for ((y, x), &z) in slice.indexed_iter() {
            let z : f64 = z.as_();
            sum_z += z;
            sum_xz += (x as f64 - x_mean) * z;
            sum_yz += (y as f64 - y_mean) * z;
        }

        let p0 = if ss_x > 0.0 { sum_xz / ss_x } else { 0.0 };
        let p1 = if ss_y > 0.0 { sum_yz / ss_y } else { 0.0 };
        let p2 = sum_z / samples as f64 - p0 * x_mean - p1 * y_mean;

        if !(p0.is_finite() && p1.is_finite() && p2.is_finite()) {
            return Err(FitError::NonFinite{ slice : slice_index });
        }
        Ok(PlaneModel { p0, p1, p2 })
    }

    pub fn evaluate(&self, x : f64, y : f64) -> f64 {
        self.p0 * x + self.p1 * y + self.p2
    }

    /// Writes the plane's value at every pixel of `out`.
    pub fn render_into(&self, out : &mut ArrayViewMut2<f64>) {
        out.indexed_iter_mut().for_each(|((y, x), value)| {
            *value = self.evaluate(x as f64, y as f64);
        });
    }

    pub fn render(&self, height : usize, width : usize) -> Array2<f64> {
        Array2::from_shape_fn((height, width), |(y, x)| self.evaluate(x as f64, y as f64))
    }
}

/// Population standard deviation (`ddof = 0`) of
/// `|slice - background|`.
pub (crate) fn absolute_deviation_std<S, T>(
    slice : &ArrayBase<S, Ix2>,
    background : &ArrayView2<f64>,
    ) -> f64 where S : Data<Elem = T>, T : Intensity {
    let n = slice.len() as f64;
    let abs_dev = || slice.iter().zip(background.iter())
        .map(|(&z, &b)| (AsPrimitive::<f64>::as_(z) - b).abs());

    let mean = abs_dev().sum::<f64>() / n;
    let var = abs_dev().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL : f64 = 1e-9;

    #[test]
    fn flat_slice_is_exact() {
        let slice = Array2::<u16>::from_elem((5, 7), 1234);
        let plane = PlaneModel::fit(&slice, 0).unwrap();
        assert_eq!(plane, PlaneModel::new(0.0, 0.0, 1234.0));

        let background = plane.render(5, 7);
        assert!(background.iter().all(|&b| b == 1234.0));
        assert_eq!(absolute_deviation_std(&slice, &background.view()), 0.0);
    }

    #[test]
    fn recovers_linear_gradient() {
        let slice = Array2::<u16>::from_shape_fn((6, 9), |(y, x)| (2 * x + 3 * y + 10) as u16);
        let plane = PlaneModel::fit(&slice, 0).unwrap();
        assert!((plane.p0 - 2.0).abs() < TOL);
        assert!((plane.p1 - 3.0).abs() < TOL);
        assert!((plane.p2 - 10.0).abs() < TOL);

        let background = plane.render(6, 9);
        assert!(absolute_deviation_std(&slice, &background.view()) < TOL);
    }

    #[test]
    fn matches_brute_force_normal_equations() {
        // Arbitrary non-planar data
        let slice = Array2::<u8>::from_shape_fn((4, 5), |(y, x)| ((x * x + 7 * y + x * y) % 251) as u8);
        let plane = PlaneModel::fit(&slice, 0).unwrap();

        // The residual must be orthogonal to each column of the design matrix
        let mut r_x = 0.0;
        let mut r_y = 0.0;
        let mut r_1 = 0.0;
        for ((y, x), &z) in slice.indexed_iter() {
            let r = z as f64 - plane.evaluate(x as f64, y as f64);
            r_x += r * x as f64;
            r_y += r * y as f64;
            r_1 += r;
        }
        assert!(r_x.abs() < 1e-8);
        assert!(r_y.abs() < 1e-8);
        assert!(r_1.abs() < 1e-8);
    }

    #[test]
    fn single_row_keeps_y_slope_at_zero() {
        let slice = array![[5u8, 7, 9, 11]];
        let plane = PlaneModel::fit(&slice, 0).unwrap();
        assert!((plane.p0 - 2.0).abs() < TOL);
        assert_eq!(plane.p1, 0.0);
        assert!((plane.p2 - 5.0).abs() < TOL);

        let column = array![[4u8], [4], [4]];
        let plane = PlaneModel::fit(&column, 0).unwrap();
        assert_eq!(plane, PlaneModel::new(0.0, 0.0, 4.0));
    }

    #[test]
    fn too_few_samples() {
        let slice = array![[1u8, 2]];
        assert_eq!(
            PlaneModel::fit(&slice, 3),
            Err(FitError::InsufficientSamples{ slice : 3, samples : 2 })
        );
        let single = array![[1u8]];
        assert!(PlaneModel::fit(&single, 0).is_err());
    }

    #[test]
    fn deviation_of_known_residuals() {
        // |residuals| = [0, 2, 0, 2] -> mean 1, std 1
        let slice = array![[10u8, 12], [10, 12]];
        let background = Array2::<f64>::from_elem((2, 2), 10.0);
        assert!((absolute_deviation_std(&slice, &background.view()) - 1.0).abs() < TOL);
    }
}
