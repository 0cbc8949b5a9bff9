//! The image source collaborator. Decoding acquisition files
//! lives outside this crate; whatever does it implements
//! `ImageSource` and hands over fully materialized volumes.

use bytemuck::{try_cast_slice, PodCastError, allocation::pod_collect_to_vec};
use ndarray::prelude::*;

use crate::data::volume::{
    Intensity,
    IntensityVolume,
    ValueRange,
    DimensionsError,
};
use crate::utils::QcError;

/// Anything that can enumerate channels and produce each one
/// as a (Z, Y, X) `IntensityVolume`.
pub trait ImageSource {
    type Sample : Intensity;

    fn channel_count(&self) -> usize;

    /// Returns the volume for `channel`, axes fixed as (Z, Y, X),
    /// carrying the value range of its samples.
    fn channel_volume(&self, channel : usize)
        -> Result<IntensityVolume<Self::Sample>, QcError>;
}

/// An `ImageSource` over an in-memory (C, Z, Y, X) array.
pub struct StackSource<T : Intensity> {
    stack : Array4<T>,
    range : ValueRange<T>,
}

impl<T : Intensity> StackSource<T> {
    pub fn new(stack : Array4<T>) -> Self {
        StackSource {
            stack,
            range : ValueRange::full(),
        }
    }

    /// Every channel produced reports `range` instead of the
    /// full range of `T`.
    pub fn with_range(mut self, range : ValueRange<T>) -> Self {
        self.range = range;
        self
    }

    /// Builds a source from a buffer of native-endian samples that
    /// has already been read into memory, laid out as (C, Z, Y, X).
    ///
    /// ## Arguments
    ///
    /// * `bytes` - The raw sample buffer
    ///
    /// * `shape` - `(channels, depth, height, width)`
    ///
    /// ## Errors
    ///
    /// * `DimensionsError::MismatchedLength` - if the buffer does not
    /// hold exactly `channels * depth * height * width` samples
    ///
    /// * `QcError::Source` - if the buffer length is not a whole
    /// number of `T` samples
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let raw : Vec<u8> = read_somewhere();
    /// let source = StackSource::<u16>::from_raw_bytes(&raw, (2, 10, 512, 512))?;
    /// ```
    pub fn from_raw_bytes(bytes : &[u8], shape : (usize, usize, usize, usize))
        -> Result<Self, QcError> {
        if bytes.len() % std::mem::size_of::<T>() != 0 {
            return Err(QcError::Source(format!(
                "Buffer of {} bytes is not a whole number of {}-byte samples",
                bytes.len(), std::mem::size_of::<T>()
            )));
        }
        let samples : Vec<T> = match try_cast_slice::<u8, T>(bytes) {
            Ok(samples) => samples.to_vec(),
            // copy out of a byte buffer that isn't aligned for `T`
            Err(PodCastError::TargetAlignmentGreaterAndInputNotAligned) => pod_collect_to_vec(bytes),
            Err(err) => {
                return Err(QcError::Source(format!("Cannot reinterpret sample buffer: {}", err)));
            },
        };

        let expected = shape.0 * shape.1 * shape.2 * shape.3;
        if samples.len() != expected {
            return Err(DimensionsError::MismatchedLength{ expected, found : samples.len() }.into());
        }

        let stack = Array4::from_shape_vec(shape, samples)
            .map_err(|err| QcError::Source(err.to_string()))?;
        Ok(StackSource::new(stack))
    }
}

impl<T : Intensity> ImageSource for StackSource<T> {
    type Sample = T;

    fn channel_count(&self) -> usize {
        self.stack.len_of(Axis(0))
    }

    fn channel_volume(&self, channel : usize) -> Result<IntensityVolume<T>, QcError> {
        let available = self.channel_count();
        if channel >= available {
            return Err(DimensionsError::ChannelOutOfBounds{ requested : channel, available }.into());
        }
        Ok(
            IntensityVolume::new(self.stack.index_axis(Axis(0), channel).to_owned())
            .with_range(self.range)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_split_on_the_slow_axis() {
        let stack = Array4::<u8>::from_shape_fn((2, 1, 2, 2), |(c, _, y, x)| (c * 10 + y * 2 + x) as u8);
        let source = StackSource::new(stack);
        assert_eq!(source.channel_count(), 2);

        let second = source.channel_volume(1).unwrap();
        assert_eq!(second.view()[[0, 1, 1]], 13);
        assert!(matches!(
            source.channel_volume(2),
            Err(QcError::Dimensions(DimensionsError::ChannelOutOfBounds{ requested : 2, available : 2 }))
        ));
    }

    #[test]
    fn raw_bytes_must_match_shape() {
        let samples : Vec<u16> = (0..16).collect();
        let bytes : &[u8] = bytemuck::cast_slice(&samples);

        let source = StackSource::<u16>::from_raw_bytes(bytes, (1, 1, 4, 4)).unwrap();
        assert_eq!(source.channel_volume(0).unwrap().view()[[0, 3, 3]], 15);

        assert!(matches!(
            StackSource::<u16>::from_raw_bytes(bytes, (1, 2, 4, 4)),
            Err(QcError::Dimensions(DimensionsError::MismatchedLength{ expected : 32, found : 16 }))
        ));
        // odd byte count cannot hold whole u16 samples
        assert!(matches!(
            StackSource::<u16>::from_raw_bytes(&bytes[..3], (1, 1, 1, 1)),
            Err(QcError::Source(_))
        ));
    }
}
