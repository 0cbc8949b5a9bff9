//! `IntensityVolume`
//!
//! A single channel's (Z, Y, X) stack of integer samples along
//! with the value range its element type can represent.

mod dimensions;

use std::fmt::Debug;

use bytemuck::Pod;
use ndarray::prelude::*;
use num_traits::{AsPrimitive, PrimInt};

use crate::utils::DomainError;

pub use dimensions::{VolumeDims, DimensionsError};

/// Fixed-width integer sample types the metrics accept
/// (`u8`, `u16`, `i16`, `u32`, ...).
pub trait Intensity : PrimInt + AsPrimitive<f64> + Pod + Debug + Send + Sync {}

impl<T> Intensity for T
    where T : PrimInt + AsPrimitive<f64> + Pod + Debug + Send + Sync {}

/// One Z plane of an `IntensityVolume`.
pub type IntensitySlice<'a, T> = ArrayView2<'a, T>;

/// The smallest and largest value a sample can take. Usually
/// the full range of the element type, but detectors that
/// digitize to fewer bits than their container (e.g. 12-bit
/// data stored as `u16`) saturate at a lower ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange<T : Intensity> {
    min : T,
    max : T,
}

impl<T : Intensity> ValueRange<T> {
    /// The full representable range of `T`.
    pub fn full() -> Self {
        ValueRange {
            min : T::min_value(),
            max : T::max_value(),
        }
    }

    /// A narrowed range. `min` must be strictly below `max`.
    pub fn new(min : T, max : T) -> Result<Self, DomainError> {
        if min >= max {
            return Err(DomainError::DegenerateRange{ min : min.as_(), max : max.as_() });
        }
        Ok(ValueRange { min, max })
    }

    /// The range of an `n_bits`-bit unsigned detector stored in `T`,
    /// i.e. `[0, 2^n_bits - 1]`, clamped to what `T` can hold.
    pub fn from_bits(n_bits : u32) -> Result<Self, DomainError> {
        let mut container = (std::mem::size_of::<T>() * 8) as u32;
        if T::min_value() < T::zero() {
            // sign bit
            container -= 1;
        }
        if n_bits == 0 || n_bits >= container {
            return match n_bits {
                0 => Err(DomainError::DegenerateRange{ min : 0.0, max : 0.0 }),
                _ => Ok(ValueRange::full()),
            };
        }
        let max = (T::one() << n_bits as usize) - T::one();
        ValueRange::new(T::zero(), max)
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }
}

impl<T : Intensity> Default for ValueRange<T> {
    fn default() -> Self {
        ValueRange::full()
    }
}

/// A single-channel intensity stack with axes (Z, Y, X).
/// The metrics only ever borrow it.
#[derive(Debug, Clone)]
pub struct IntensityVolume<T : Intensity> {
    data : Array3<T>,
    range : ValueRange<T>,
}

impl<T : Intensity> IntensityVolume<T> {
    /// Wraps a (Z, Y, X) array, assuming the full range of `T`.
    pub fn new(data : Array3<T>) -> Self {
        IntensityVolume {
            data,
            range : ValueRange::full(),
        }
    }

    /// Replaces the value range, e.g. for a 12-bit detector.
    pub fn with_range(mut self, range : ValueRange<T>) -> Self {
        self.range = range;
        self
    }

    pub fn dims(&self) -> VolumeDims {
        VolumeDims::from(self.data.dim())
    }

    pub fn range(&self) -> ValueRange<T> {
        self.range
    }

    pub fn view(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }

    /// Borrow the Z plane at index `z`.
    ///
    /// ## Errors
    ///
    /// * `DimensionsError::SliceOutOfBounds` - if `z` is not below
    /// the volume's depth
    pub fn slice(&self, z : usize) -> Result<IntensitySlice<'_, T>, DimensionsError> {
        let depth = self.data.len_of(Axis(0));
        if z >= depth {
            return Err(DimensionsError::SliceOutOfBounds{ requested : z, depth });
        }
        Ok(self.data.index_axis(Axis(0), z))
    }
}

impl<T : Intensity> From<Array3<T>> for IntensityVolume<T> {
    fn from(data : Array3<T>) -> Self {
        IntensityVolume::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_range_matches_type() {
        let range = ValueRange::<u16>::full();
        assert_eq!(range.min(), 0);
        assert_eq!(range.max(), u16::MAX);

        let signed = ValueRange::<i8>::full();
        assert_eq!((signed.min(), signed.max()), (i8::MIN, i8::MAX));
    }

    #[test]
    fn narrowed_ranges() {
        let twelve_bit = ValueRange::<u16>::from_bits(12).unwrap();
        assert_eq!(twelve_bit.max(), 4095);
        assert_eq!(ValueRange::<u8>::from_bits(8).unwrap(), ValueRange::full());
        assert!(ValueRange::<u16>::from_bits(0).is_err());
        assert!(ValueRange::<u16>::new(10, 10).is_err());
        assert!(ValueRange::<u16>::new(11, 10).is_err());
    }

    #[test]
    fn slices_are_bounds_checked() {
        let volume = IntensityVolume::new(Array3::<u8>::zeros((2, 3, 4)));
        assert_eq!(volume.dims(), VolumeDims::new(2, 3, 4));
        assert_eq!(volume.slice(1).unwrap().dim(), (3, 4));
        assert_eq!(
            volume.slice(2).unwrap_err(),
            DimensionsError::SliceOutOfBounds{ requested : 2, depth : 2 }
        );
    }
}
