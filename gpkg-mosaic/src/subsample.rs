//! Decimation of images read from overview levels.

use image::RgbaImage;

/// Number of source pixels to advance per output pixel, per axis. Offsets are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsampleFactors {
    pub x: u32,
    pub y: u32,
}

impl SubsampleFactors {
    pub const NONE: Self = Self { x: 1, y: 1 };

    #[must_use]
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// Decimation factors for reading an image of `dims` pixels at `selected` resolution
/// when the caller asked for `requested` resolution.
///
/// Factors are never zero and never so large that an axis would end up without a sample.
#[must_use]
pub fn plan_subsampling(
    requested: (f64, f64),
    selected: (f64, f64),
    dims: (u32, u32),
) -> SubsampleFactors {
    SubsampleFactors {
        x: axis_factor(requested.0, selected.0, dims.0),
        y: axis_factor(requested.1, selected.1, dims.1),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_factor(requested: f64, selected: f64, dim: u32) -> u32 {
    let ratio = (requested / selected).floor();
    if !ratio.is_finite() || ratio < 1.0 {
        return 1;
    }
    // saturating cast, any value beyond u32 is cut down by the loop below anyway
    let mut factor = ratio as u32;
    while factor > 1 && dim / factor == 0 {
        factor -= 1;
    }
    factor.max(1)
}

/// Keep every `factors.x`-th column and `factors.y`-th row, starting with the first one.
#[must_use]
pub fn decimate(image: &RgbaImage, factors: SubsampleFactors) -> RgbaImage {
    if factors.is_none() {
        return image.clone();
    }
    let width = image.width().div_ceil(factors.x);
    let height = image.height().div_ceil(factors.y);
    RgbaImage::from_fn(width, height, |x, y| {
        *image.get_pixel(x * factors.x, y * factors.y)
    })
}
