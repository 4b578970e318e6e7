use ndarray::{Array2, ArrayView2, Axis};

/// Rate of change along rows (axis 0) and columns (axis 1). Interior points use central
/// differences, the borders one-sided differences. Axes shorter than two give zeros.
pub fn gradient(image: ArrayView2<f64>) -> (Array2<f64>, Array2<f64>) {
    (
        gradient_along(image, Axis(0)),
        gradient_along(image, Axis(1)),
    )
}

fn gradient_along(image: ArrayView2<f64>, axis: Axis) -> Array2<f64> {
    let mut out = Array2::zeros(image.raw_dim());
    let n = image.len_of(axis);
    if n < 2 {
        return out;
    }

    for (src, mut dst) in image.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        dst[0] = src[1] - src[0];
        dst[n - 1] = src[n - 1] - src[n - 2];
        for i in 1..n - 1 {
            dst[i] = (src[i + 1] - src[i - 1]) / 2.0;
        }
    }
    out
}

/// Number of pixels whose gradient magnitude exceeds `threshold`.
pub fn steep_pixels(image: ArrayView2<f64>, threshold: f64) -> usize {
    let (gx, gy) = gradient(image);
    let limit = threshold * threshold;
    gx.iter()
        .zip(gy.iter())
        .filter(|(x, y)| *x * *x + *y * *y > limit)
        .count()
}

/// Clutter shows up as many sharp edges: more than `min_pixels` pixels with a gradient magnitude
/// above `threshold`.
pub fn has_clutter(image: ArrayView2<f64>, threshold: f64, min_pixels: usize) -> bool {
    steep_pixels(image, threshold) > min_pixels
}
