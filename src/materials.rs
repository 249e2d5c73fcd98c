use image::RgbImage;
use ndarray::Array2;
use thiserror::Error;

/// Coefficient marking a cell as free medium.
pub const FREE_MEDIUM: f64 = 1.0;

/// Coefficient of the default barrier pattern.
pub const BARRIER: f64 = 0.6;

// Default barrier: a straight run of cells at column 50, rows 50..=150.
const BARRIER_COL: usize = 50;
const BARRIER_ROW_START: usize = 50;
const BARRIER_ROW_END: usize = 150;

// Quantized luminance bands for image import: (upper bound, coefficient).
// Samples at or above the last bound stay free medium.
const LUMINANCE_BANDS: [(f64, f64); 3] = [(0.25, 0.6), (0.45, 0.7), (0.65, 0.85)];

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("material image must be {expected}x{expected}, got {width}x{height}")]
    DimensionMismatch {
        expected: usize,
        width: u32,
        height: u32,
    },
}

/// Per-cell material coefficients, consumed only by rendering.
///
/// 1.0 is free medium; each sub-unity value is a distinct material class.
/// A grid is immutable once built; replacing one means building a complete
/// new grid and swapping it in.
#[derive(Debug)]
pub struct Materials {
    coeff: Array2<f64>,
}

impl Materials {
    /// All cells free medium.
    pub fn free(l: usize) -> Self {
        Materials {
            coeff: Array2::from_elem((l, l), FREE_MEDIUM),
        }
    }

    /// Free medium with the fixed partially transmissive barrier.
    pub fn default_barrier(l: usize) -> Self {
        let mut materials = Self::free(l);
        if BARRIER_COL < l {
            let lo = BARRIER_ROW_START.min(l - 1);
            let hi = BARRIER_ROW_END.min(l - 1);
            for x in lo..=hi {
                materials.coeff[[x, BARRIER_COL]] = BARRIER;
            }
        }
        materials
    }

    /// Derive a material grid from an l x l image.
    ///
    /// Each pixel's perceptual luminance (0.299 R + 0.587 G + 0.114 B) is
    /// quantized into a fixed band table; samples outside every band stay
    /// free medium. The image must match the grid exactly; on mismatch
    /// nothing is built.
    pub fn from_image(l: usize, img: &RgbImage) -> Result<Self, MaterialError> {
        if img.width() as usize != l || img.height() as usize != l {
            return Err(MaterialError::DimensionMismatch {
                expected: l,
                width: img.width(),
                height: img.height(),
            });
        }

        let mut coeff = Array2::from_elem((l, l), FREE_MEDIUM);
        for (x, y, pixel) in img.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let luminance =
                (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0;
            coeff[[x as usize, y as usize]] = Self::classify(luminance);
        }
        Ok(Materials { coeff })
    }

    fn classify(luminance: f64) -> f64 {
        for &(bound, coefficient) in &LUMINANCE_BANDS {
            if luminance < bound {
                return coefficient;
            }
        }
        FREE_MEDIUM
    }

    pub fn coeff(&self, x: usize, y: usize) -> f64 {
        self.coeff[[x, y]]
    }

    pub fn grid(&self) -> &Array2<f64> {
        &self.coeff
    }
}
