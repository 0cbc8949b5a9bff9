//! `data`
//!
//! The intensity containers the metrics operate on and the
//! seam through which an external image source hands them over.

mod volume;
mod source;

pub use volume::{
    Intensity,
    IntensityVolume,
    IntensitySlice,
    ValueRange,
    VolumeDims,
    DimensionsError,
};

pub use source::{ImageSource, StackSource};
