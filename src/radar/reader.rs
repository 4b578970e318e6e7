use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2};
use ndarray_npy::read_npy;

use super::{RadarError, RadarImage};

pub trait RadarReader: Sync {
    fn read(&self, path: &Path) -> Result<RadarImage, RadarError>;
}

/// Reads KNMI radar composites stored as HDF5: the grid lives in `image1/image_data`, and the
/// value used for pixels outside the radar range in the `calibration_out_of_image` attribute of
/// `image1/calibration`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Hdf5Reader;

impl RadarReader for Hdf5Reader {
    #[cfg(feature = "hdf5")]
    fn read(&self, path: &Path) -> Result<RadarImage, RadarError> {
        let wrap = |source: hdf5::Error| RadarError::Hdf5 {
            path: path.to_path_buf(),
            source,
        };

        // Stored as integers; int to float is a hard conversion in HDF5
        let file = hdf5::File::open(path).map_err(wrap)?;
        let image = file
            .dataset("image1/image_data")
            .map_err(wrap)?
            .as_reader()
            .conversion(hdf5::Conversion::Hard)
            .read_2d::<f64>()
            .map_err(wrap)?;
        let out_of_image = file
            .group("image1/calibration")
            .map_err(wrap)?
            .attr("calibration_out_of_image")
            .map_err(wrap)?
            .as_reader()
            .conversion(hdf5::Conversion::Hard)
            .read_scalar::<f64>()
            .map_err(wrap)?;

        Ok(clean_out_of_image(image, out_of_image))
    }

    #[cfg(not(feature = "hdf5"))]
    fn read(&self, path: &Path) -> Result<RadarImage, RadarError> {
        Err(RadarError::Unsupported(path.to_path_buf()))
    }
}

/// Zeroes pixels outside the radar range. Besides the calibrated marker value, some files use
/// another one (255, 244, ...), so whatever value sits in the top-left corner, which is always
/// outside the range, is cleared as well.
pub fn clean_out_of_image(mut image: RadarImage, out_of_image: f64) -> RadarImage {
    let corner = image.first().copied();
    image.mapv_inplace(|v| {
        if v == out_of_image || Some(v) == corner {
            0.0
        } else {
            v
        }
    });
    image
}

/// Per-pixel weights applied before summing precipitation; pixels prone to ground clutter are 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ClutterMask {
    weights: Array2<f64>,
}

impl ClutterMask {
    pub fn new(weights: Array2<f64>) -> Self {
        Self { weights }
    }

    /// Loads a mask from a `.npy` file holding a 2-D array of floats, integers or booleans.
    pub fn load(path: &Path) -> Result<Self, RadarError> {
        let wrap = |source| RadarError::Mask {
            path: PathBuf::from(path),
            source,
        };

        let weights = match read_npy::<_, Array2<f64>>(path) {
            Ok(weights) => weights,
            Err(float_err) => {
                if let Ok(mask) = read_npy::<_, Array2<bool>>(path) {
                    mask.mapv(|keep| if keep { 1.0 } else { 0.0 })
                } else if let Ok(mask) = read_npy::<_, Array2<u8>>(path) {
                    mask.mapv(f64::from)
                } else if let Ok(mask) = read_npy::<_, Array2<i64>>(path) {
                    mask.mapv(|v| v as f64)
                } else if let Ok(mask) = read_npy::<_, Array2<f32>>(path) {
                    mask.mapv(f64::from)
                } else {
                    return Err(wrap(float_err));
                }
            }
        };

        Ok(Self { weights })
    }

    pub fn weights(&self) -> ArrayView2<'_, f64> {
        self.weights.view()
    }

    pub fn check_shape(&self, image: &RadarImage) -> Result<(), RadarError> {
        if self.weights.dim() != image.dim() {
            return Err(RadarError::ShapeMismatch {
                mask: self.weights.dim(),
                image: image.dim(),
            });
        }
        Ok(())
    }
}
