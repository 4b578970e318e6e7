//! Deciding whether a radar precipitation image shows rain.
//!
//! Images are 2-D grids of accumulated precipitation. A file counts as rainy when enough
//! precipitation falls inside connected showers of a minimum size, outside of pixels known to
//! suffer from ground clutter, and the image as a whole does not look like clutter (lots of
//! sharp edges between neighbouring pixels).

use std::path::PathBuf;

use ndarray::Array2;
use thiserror::Error;

pub mod clutter;
pub mod morphology;
pub mod rain;
pub mod reader;

pub use clutter::{gradient, has_clutter};
pub use morphology::remove_small_objects;
pub use rain::{assess, is_rainy, RainAssessment};
pub use reader::{clean_out_of_image, ClutterMask, Hdf5Reader, RadarReader};

pub type RadarImage = Array2<f64>;

/// Thresholds for telling rain apart from noise and clutter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainCriteria {
    /// Showers with fewer pixels than this are ignored
    pub min_object_size: usize,
    /// Total precipitation over valid showers must exceed this
    pub rain_sum_threshold: f64,
    pub gradient_threshold: f64,
    /// More pixels than this over `gradient_threshold` marks the image as cluttered
    pub clutter_min_pixels: usize,
}

impl Default for RainCriteria {
    fn default() -> Self {
        Self {
            min_object_size: 9,
            rain_sum_threshold: 3000.0,
            gradient_threshold: 500.0,
            clutter_min_pixels: 130,
        }
    }
}

#[derive(Error, Debug)]
pub enum RadarError {
    #[error("failed to read clutter mask {path}")]
    Mask {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },
    #[error("clutter mask shape {mask:?} does not match image shape {image:?}")]
    ShapeMismatch {
        mask: (usize, usize),
        image: (usize, usize),
    },
    #[error("cannot read {0}: built without HDF5 support, rebuild with `--features hdf5`")]
    Unsupported(PathBuf),
    #[cfg(feature = "hdf5")]
    #[error("failed to read radar file {path}")]
    Hdf5 {
        path: PathBuf,
        #[source]
        source: hdf5::Error,
    },
}
