//! Conversion of stored DICOM sample values to an 8-bit display raster.

// Keeps flat images from dividing by zero
const EPSILON: f64 = 1e-8;

/// Linear calibration from stored values to output units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    pub slope: f64,
    pub intercept: f64,
}

/// Map raw samples to `0..=255`.
///
/// Inverts first when `invert` is set (MONOCHROME1), then applies `rescale`,
/// then min-max normalizes the whole raster.
pub fn to_display_u8(mut values: Vec<f64>, invert: bool, rescale: Option<Rescale>) -> Vec<u8> {
    if values.is_empty() {
        return Vec::new();
    }

    if invert {
        let max = max_of(&values);
        values.iter_mut().for_each(|v| *v = max - *v);
    }

    if let Some(Rescale { slope, intercept }) = rescale {
        values.iter_mut().for_each(|v| *v = *v * slope + intercept);
    }

    let min = min_of(&values);
    let max = max_of(&values);
    let range = max - min + EPSILON;
    values
        .into_iter()
        .map(|v| ((v - min) / range * 255.0) as u8)
        .collect()
}

fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}
