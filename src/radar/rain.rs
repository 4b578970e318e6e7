use ndarray::Zip;

use super::{
    clutter::steep_pixels, morphology::remove_small_objects, ClutterMask, RadarError,
    RadarImage, RainCriteria,
};

/// The numbers behind a rainy/dry decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainAssessment {
    /// Precipitation summed over showers large enough to count, outside masked pixels
    pub shower_sum: f64,
    pub steep_pixels: usize,
    pub rainy: bool,
}

pub fn assess(
    image: &RadarImage,
    mask: Option<&ClutterMask>,
    criteria: &RainCriteria,
) -> Result<RainAssessment, RadarError> {
    let wet = image.mapv(|v| v > 0.0);
    let showers = remove_small_objects(&wet, criteria.min_object_size);

    let shower_sum = match mask {
        Some(mask) => {
            mask.check_shape(image)?;
            Zip::from(image)
                .and(&showers)
                .and(mask.weights())
                .fold(0.0, |acc, &value, &valid, &weight| {
                    if valid {
                        acc + value * weight
                    } else {
                        acc
                    }
                })
        }
        None => Zip::from(image)
            .and(&showers)
            .fold(
                0.0,
                |acc, &value, &valid| if valid { acc + value } else { acc },
            ),
    };

    let steep = steep_pixels(image.view(), criteria.gradient_threshold);
    let cluttered = steep > criteria.clutter_min_pixels;

    Ok(RainAssessment {
        shower_sum,
        steep_pixels: steep,
        rainy: shower_sum > criteria.rain_sum_threshold && !cluttered,
    })
}

pub fn is_rainy(
    image: &RadarImage,
    mask: Option<&ClutterMask>,
    criteria: &RainCriteria,
) -> Result<bool, RadarError> {
    Ok(assess(image, mask, criteria)?.rainy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn criteria() -> RainCriteria {
        RainCriteria::default()
    }

    /// A smooth blob of rain: no steep edges, well above the sum threshold.
    fn rainy_image() -> RadarImage {
        let mut image = Array2::zeros((40, 40));
        for ((y, x), v) in image.indexed_iter_mut() {
            let dy = y as f64 - 20.0;
            let dx = x as f64 - 20.0;
            let d = (dy * dy + dx * dx).sqrt();
            if d < 10.0 {
                *v = 100.0 - d * 5.0;
            }
        }
        image
    }

    #[test]
    fn smooth_shower_is_rainy() {
        let result = assess(&rainy_image(), None, &criteria()).unwrap();

        assert!(result.shower_sum > 3000.0);
        assert_eq!(result.steep_pixels, 0);
        assert!(result.rainy);
    }

    #[test]
    fn dry_image_is_not_rainy() {
        let image = Array2::zeros((10, 10));

        assert!(!is_rainy(&image, None, &criteria()).unwrap());
    }

    #[test]
    fn specks_smaller_than_minimum_do_not_count() {
        let mut image = Array2::zeros((40, 40));
        for i in (0..40).step_by(3) {
            for j in (0..40).step_by(3) {
                image[[i, j]] = 100.0;
            }
        }

        let result = assess(&image, None, &criteria()).unwrap();

        assert_eq!(result.shower_sum, 0.0);
        assert!(!result.rainy);
    }

    #[test]
    fn masked_pixels_are_ignored() {
        let mask = ClutterMask::new(Array2::zeros((40, 40)));

        let result = assess(&rainy_image(), Some(&mask), &criteria()).unwrap();

        assert_eq!(result.shower_sum, 0.0);
        assert!(!result.rainy);
    }

    #[test]
    fn heavy_clutter_overrides_rain() {
        let mut image = rainy_image();
        for i in (1..39).step_by(3) {
            for j in (1..39).step_by(3) {
                image[[i, j]] += 5000.0;
            }
        }

        let result = assess(&image, None, &criteria()).unwrap();

        assert!(result.shower_sum > 3000.0);
        assert!(result.steep_pixels > 130);
        assert!(!result.rainy);
    }

    #[test]
    fn mask_shape_must_match_image() {
        let mask = ClutterMask::new(Array2::ones((5, 5)));

        assert!(matches!(
            is_rainy(&rainy_image(), Some(&mask), &criteria()),
            Err(RadarError::ShapeMismatch { .. })
        ));
    }
}
