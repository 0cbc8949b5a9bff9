//! Code in this submodule deals strictly with attention to
//! volume dimensions and the types of things that can go wrong
//! with `VolumeDims`.

use thiserror::Error;

/// `VolumeDims` is a simple struct that holds the dimensions
/// of a single-channel volume
///
/// `depth` is the number of Z slices
/// `height` is the number of rows (Y) in each slice
/// `width` is the number of columns (X) in each slice
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct VolumeDims {
    pub depth : usize,
    pub height : usize,
    pub width : usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DimensionsError {
    #[error("Volume has an empty axis: {0:?}")]
    EmptyAxis(VolumeDims),

    #[error("Requested slice {requested} is out of bounds (depth {depth}).")]
    SliceOutOfBounds{ requested : usize, depth : usize },

    #[error("Requested channel {requested} is out of bounds ({available} channels).")]
    ChannelOutOfBounds{ requested : usize, available : usize },

    #[error("Buffer holds {found} samples but the requested shape needs {expected}.")]
    MismatchedLength{ expected : usize, found : usize },
}

impl VolumeDims {
    pub fn new(depth : usize, height : usize, width : usize) -> VolumeDims {
        VolumeDims {
            depth,
            height,
            width,
        }
    }

    /// Number of pixels in one Z slice.
    pub fn slice_len(&self) -> usize {
        self.height * self.width
    }

    /// Returns the dimensions as a tuple (z, y, x)
    pub fn to_tuple(&self) -> (usize, usize, usize) {
        (self.depth, self.height, self.width)
    }

    /// Errors if any axis has length zero.
    pub fn require_nonempty(&self) -> Result<(), DimensionsError> {
        if self.depth == 0 || self.height == 0 || self.width == 0 {
            return Err(DimensionsError::EmptyAxis(*self));
        }
        Ok(())
    }
}

impl From<(usize, usize, usize)> for VolumeDims {
    fn from(shape : (usize, usize, usize)) -> Self {
        VolumeDims::new(shape.0, shape.1, shape.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_axes_are_rejected() {
        assert!(VolumeDims::new(2, 4, 4).require_nonempty().is_ok());
        assert_eq!(
            VolumeDims::new(2, 0, 4).require_nonempty(),
            Err(DimensionsError::EmptyAxis(VolumeDims::new(2, 0, 4)))
        );
    }

    #[test]
    fn tuple_round_trip() {
        let dims = VolumeDims::from((3, 5, 7));
        assert_eq!(dims.to_tuple(), (3, 5, 7));
        assert_eq!(dims.slice_len(), 35);
    }
}
