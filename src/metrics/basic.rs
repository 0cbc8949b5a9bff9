//! Stateless intensity statistics: bit depth, dynamic range, and
//! the fraction of clipped pixels. All of these work on arrays of
//! any dimensionality.

use itertools::{Itertools, MinMaxResult};
use ndarray::{ArrayBase, Data, Dimension};
use num_traits::AsPrimitive;

use crate::data::Intensity;
use crate::utils::DomainError;

/// Width of the array's element type in bits.
pub fn bit_depth<S, T, D>(_array : &ArrayBase<S, D>) -> u32
    where S : Data<Elem = T>, T : Intensity, D : Dimension {
    (std::mem::size_of::<T>() * 8) as u32
}

/// Whether `bits` is at or below the threshold past which
/// quantization starts to limit image quality (8 by default
/// in `MetricsConfig`).
pub fn is_low_bit_depth(bits : u32, threshold : u32) -> bool {
    bits <= threshold
}

/// Spread of the observed intensities as a fraction of the
/// representable range:
/// `(observed_max - observed_min) / (type_max - type_min)`.
///
/// ## Arguments
///
/// * `array` - The intensity data, any dimensionality
///
/// * `type_min` - Smallest representable value
///
/// * `type_max` - Largest representable value
///
/// ## Errors
///
/// * `DomainError::DegenerateRange` - if `type_max <= type_min`
///
/// * `DomainError::EmptyInput` - if `array` has no elements
///
/// * `DomainError::OutOfRange` - if the observed minimum or maximum
/// falls outside `[type_min, type_max]`
///
/// ## Example
///
/// ```rust, ignore
/// let image = Array2::<u8>::from_elem((4, 4), 0);
/// assert_eq!(dynamic_range(&image, u8::MIN, u8::MAX)?, 0.0);
/// ```
pub fn dynamic_range<S, T, D>(array : &ArrayBase<S, D>, type_min : T, type_max : T)
    -> Result<f64, DomainError>
    where S : Data<Elem = T>, T : Intensity, D : Dimension {
    if type_max <= type_min {
        return Err(DomainError::DegenerateRange{ min : type_min.as_(), max : type_max.as_() });
    }

    let (lo, hi) = match array.iter().minmax() {
        MinMaxResult::NoElements => return Err(DomainError::EmptyInput),
        MinMaxResult::OneElement(&only) => (only, only),
        MinMaxResult::MinMax(&lo, &hi) => (lo, hi),
    };
    if lo < type_min {
        return Err(out_of_range(lo, type_min, type_max));
    }
    if hi > type_max {
        return Err(out_of_range(hi, type_min, type_max));
    }

    let observed : f64 = AsPrimitive::<f64>::as_(hi) - AsPrimitive::<f64>::as_(lo);
    let span : f64 = AsPrimitive::<f64>::as_(type_max) - AsPrimitive::<f64>::as_(type_min);
    Ok(observed / span)
}

/// Percentage (0 to 100) of elements sitting exactly at
/// `type_min` or `type_max`.
///
/// ## Errors
///
/// * `DomainError::EmptyInput` - if `array` has no elements
///
/// * `DomainError::OutOfRange` - if any element falls outside
/// `[type_min, type_max]`
pub fn saturation_percentage<S, T, D>(array : &ArrayBase<S, D>, type_min : T, type_max : T)
    -> Result<f64, DomainError>
    where S : Data<Elem = T>, T : Intensity, D : Dimension {
    if array.is_empty() {
        return Err(DomainError::EmptyInput);
    }
    let mut saturated = 0usize;
    for &x in array.iter() {
        if x < type_min || x > type_max {
            return Err(out_of_range(x, type_min, type_max));
        }
        if x == type_min || x == type_max {
            saturated += 1;
        }
    }

    Ok(100.0 * saturated as f64 / array.len() as f64)
}

fn out_of_range<T : Intensity>(value : T, type_min : T, type_max : T) -> DomainError {
    DomainError::OutOfRange{ value : value.as_(), min : type_min.as_(), max : type_max.as_() }
}
