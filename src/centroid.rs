//! Locate the brightest source in an image.
//!
//! The physical offset path needs one well-measured position per image,
//! not a full star list. Detection follows the usual extraction steps:
//!
//! 1. Estimate the background level and noise (sigma-clipped mean)
//! 2. Find the peak pixel and test its significance against the noise
//! 3. Compute an intensity-weighted centroid in a box around the peak
//!
//! Images are row-major `f32` arrays; with the `image` feature enabled,
//! [`image_to_array`] converts a loaded [`image::DynamicImage`].

use ndarray::ArrayView2;
use tracing::debug;

use crate::error::{Error, Result};

/// Configuration for single-source detection.
#[derive(Debug, Clone)]
pub struct DetectConfig {
    /// Number of sigma above background the peak pixel must reach to
    /// count as a source.
    /// Default: 5.0
    pub sigma_threshold: f32,

    /// Half-width of the centroiding box around the peak, in pixels.
    /// Default: 5
    pub box_halfwidth: usize,

    /// Number of iterations for sigma-clipped background estimation.
    /// Default: 5
    pub sigma_clip_iterations: usize,

    /// Sigma clipping factor for background estimation. Pixels more than
    /// this many sigma from the running mean are excluded.
    /// Default: 3.0
    pub sigma_clip_factor: f32,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            sigma_threshold: 5.0,
            box_halfwidth: 5,
            sigma_clip_iterations: 5,
            sigma_clip_factor: 3.0,
        }
    }
}

/// A detected source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Column position in pixels, origin at the array corner.
    pub x: f64,
    /// Row position in pixels, origin at the array corner.
    pub y: f64,
    /// Total background-subtracted flux inside the centroid box.
    pub mass: f64,
    /// Peak significance over the background, in sigma units.
    pub snr: f64,
}

/// Detect the brightest source in an image.
///
/// Returns the intensity-weighted centroid of the peak, or
/// [`Error::NoSource`] when the peak does not clear the significance
/// threshold.
pub fn find_brightest_source(img: ArrayView2<'_, f32>, config: &DetectConfig) -> Result<Source> {
    let (rows, cols) = img.dim();
    if rows == 0 || cols == 0 {
        return Err(Error::NoSource {
            measured: 0.0,
            min_snr: config.sigma_threshold as f64,
        });
    }

    // ── Step 1: background level and noise ──
    let (bg_mean, bg_sigma) = estimate_background(img, config);

    // ── Step 2: peak pixel and its significance ──
    let mut peak = (0usize, 0usize);
    let mut peak_value = f32::NEG_INFINITY;
    for ((r, c), &v) in img.indexed_iter() {
        if v > peak_value {
            peak_value = v;
            peak = (r, c);
        }
    }

    let snr = if bg_sigma > 0.0 {
        ((peak_value - bg_mean) / bg_sigma) as f64
    } else if peak_value > bg_mean {
        f64::INFINITY
    } else {
        0.0
    };
    let min_snr = config.sigma_threshold as f64;
    if snr < min_snr {
        return Err(Error::NoSource {
            measured: snr,
            min_snr,
        });
    }

    // ── Step 3: intensity-weighted centroid around the peak ──
    let hw = config.box_halfwidth;
    let r0 = peak.0.saturating_sub(hw);
    let r1 = (peak.0 + hw + 1).min(rows);
    let c0 = peak.1.saturating_sub(hw);
    let c1 = (peak.1 + hw + 1).min(cols);

    let mut mass = 0.0f64;
    let mut sum_r = 0.0f64;
    let mut sum_c = 0.0f64;
    for r in r0..r1 {
        for c in c0..c1 {
            let w = (img[(r, c)] - bg_mean).max(0.0) as f64;
            mass += w;
            sum_r += w * r as f64;
            sum_c += w * c as f64;
        }
    }
    if mass <= 0.0 {
        return Err(Error::NoSource {
            measured: snr,
            min_snr,
        });
    }

    let source = Source {
        x: sum_c / mass,
        y: sum_r / mass,
        mass,
        snr,
    };
    debug!(
        "source at ({:.2}, {:.2}), mass {:.1}, SNR {:.1}",
        source.x, source.y, source.mass, source.snr
    );
    Ok(source)
}

/// Sigma-clipped background estimate: iteratively compute mean and
/// standard deviation over pixels within `sigma_clip_factor` sigma of the
/// previous mean.
fn estimate_background(img: ArrayView2<'_, f32>, config: &DetectConfig) -> (f32, f32) {
    let mut mean = 0.0f32;
    let mut sigma = f32::INFINITY;

    for _ in 0..config.sigma_clip_iterations.max(1) {
        let (lo, hi) = if sigma.is_finite() {
            (
                mean - config.sigma_clip_factor * sigma,
                mean + config.sigma_clip_factor * sigma,
            )
        } else {
            (f32::NEG_INFINITY, f32::INFINITY)
        };

        let mut n = 0usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for &v in img.iter() {
            if v >= lo && v <= hi {
                n += 1;
                sum += v as f64;
                sum_sq += (v as f64) * (v as f64);
            }
        }
        if n < 2 {
            break;
        }

        let new_mean = sum / n as f64;
        let var = (sum_sq / n as f64 - new_mean * new_mean).max(0.0);
        let new_sigma = var.sqrt() as f32;
        let converged = (new_mean as f32 - mean).abs() < 1e-6 && (new_sigma - sigma).abs() < 1e-6;
        mean = new_mean as f32;
        sigma = new_sigma;
        if converged {
            break;
        }
    }

    if !sigma.is_finite() {
        sigma = 0.0;
    }
    (mean, sigma)
}

/// Convert a loaded image to a row-major grayscale array.
#[cfg(feature = "image")]
pub fn image_to_array(img: &image::DynamicImage) -> ndarray::Array2<f32> {
    use image::GenericImageView;

    let (width, height) = img.dimensions();
    let gray = img.to_luma32f();
    ndarray::Array2::from_shape_vec((height as usize, width as usize), gray.into_raw())
        .expect("luma buffer length matches image dimensions")
}

/// Detect the brightest source in a loaded image.
#[cfg(feature = "image")]
pub fn find_brightest_source_in_image(
    img: &image::DynamicImage,
    config: &DetectConfig,
) -> Result<Source> {
    let gray = image_to_array(img);
    find_brightest_source(gray.view(), config)
}
