//! Relative pixel offsets between overlapping images, and the
//! combination geometry derived from them.
//!
//! Two ways to measure where one exposure sits relative to another:
//!
//! - [`calc_offset_wcs`] projects a common sky position through each
//!   image's world-coordinate transform and differences the pixel
//!   positions. Works whenever both headers carry a valid WCS.
//! - [`calc_offset_physical`] compares the pixel data directly, either by
//!   centroiding the brightest source in each frame or by a
//!   cross-correlation search, gated by a caller-supplied confidence
//!   threshold.
//!
//! Once per-image offsets are known, [`regularize_offsets`],
//! [`combined_shape`] and [`offsets_to_slices`] turn them into the
//! geometry needed to stack or mosaic the frames.
//!
//! All offsets and shapes are in row-major array-axis order: a 2-D
//! [`PixelOffset`] is `[Δrow, Δcolumn]`.

use ndarray::{s, Array2, ArrayView2};
use tracing::debug;
use wcs::{ImgXY, LonLat, WCS};

use crate::centroid::{find_brightest_source, DetectConfig, Source};
use crate::error::{Error, Result};
use crate::slices::{AxisSlice, SliceTuple};
use crate::PixelOffset;

/// Sky/pixel transform metadata for one image.
///
/// Implemented for [`wcs::WCS`]; anything that can map both ways between
/// pixel and sky coordinates can serve as offset metadata.
pub trait PixelSky {
    /// Map a pixel position `(x, y)` to a sky position `(lon, lat)` in
    /// radians, if the transform is defined there.
    fn pixel_to_sky(&self, x: f64, y: f64) -> Option<(f64, f64)>;

    /// Map a sky position `(lon, lat)` in radians to a pixel position
    /// `(x, y)`, if the transform is defined there.
    fn sky_to_pixel(&self, lon: f64, lat: f64) -> Option<(f64, f64)>;

    /// Image dimensions `(width, height)` in pixels, when known.
    fn dimensions(&self) -> Option<(usize, usize)>;
}

impl PixelSky for WCS {
    fn pixel_to_sky(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.unproj(&ImgXY::new(x, y)).map(|ll| (ll.lon(), ll.lat()))
    }

    fn sky_to_pixel(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        self.proj(&LonLat::new(lon, lat)).map(|xy| (xy.x(), xy.y()))
    }

    fn dimensions(&self) -> Option<(usize, usize)> {
        let dims = self.img_dimensions();
        if dims.len() < 2 {
            return None;
        }
        Some((dims[0] as usize, dims[1] as usize))
    }
}

/// A pixel location within an image, used to anchor the reference sky
/// position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefLocation {
    /// The center of the image (requires known dimensions).
    Center,
    /// Pixel `(0, 0)`.
    Origin,
    /// An explicit pixel position `(x, y)`.
    Pixel(f64, f64),
}

/// Sky position `(lon, lat)` in radians seen at a given location of an
/// image.
///
/// Convenience for anchoring [`calc_offset_wcs`] on, say, the center of
/// the target frame:
///
/// ```no_run
/// # fn demo(target: &wcs::WCS, reference: &wcs::WCS) -> astroslice::Result<()> {
/// use astroslice::{calc_offset_wcs, sky_at, RefLocation};
///
/// let anchor = sky_at(target, RefLocation::Center)?;
/// let offset = calc_offset_wcs(target, reference, anchor)?;
/// # Ok(()) }
/// ```
pub fn sky_at<M: PixelSky>(meta: &M, loc: RefLocation) -> Result<(f64, f64)> {
    let (x, y) = match loc {
        RefLocation::Center => {
            let (w, h) = meta.dimensions().ok_or(Error::MissingTransform {
                which: "target",
            })?;
            (w as f64 / 2.0, h as f64 / 2.0)
        }
        RefLocation::Origin => (0.0, 0.0),
        RefLocation::Pixel(x, y) => (x, y),
    };
    meta.pixel_to_sky(x, y)
        .ok_or(Error::MissingTransform { which: "target" })
}

/// Pixel offset of `target` relative to `reference` from world-coordinate
/// metadata.
///
/// `ref_coord` is a sky position `(lon, lat)` in radians visible in both
/// frames. It is projected into each frame and the pixel positions are
/// differenced: a positive component means the position sits further
/// along that axis in `target` than in `reference`. Fails with
/// [`Error::MissingTransform`] when either transform cannot map the
/// position.
pub fn calc_offset_wcs<T, R>(target: &T, reference: &R, ref_coord: (f64, f64)) -> Result<PixelOffset>
where
    T: PixelSky,
    R: PixelSky,
{
    let (lon, lat) = ref_coord;
    let (xt, yt) = target
        .sky_to_pixel(lon, lat)
        .ok_or(Error::MissingTransform { which: "target" })?;
    let (xr, yr) = reference
        .sky_to_pixel(lon, lat)
        .ok_or(Error::MissingTransform {
            which: "reference",
        })?;

    let offset = PixelOffset::new(yt - yr, xt - xr);
    debug!(
        "wcs offset: target ({:.2}, {:.2}), reference ({:.2}, {:.2}) -> {:?}",
        xt, yt, xr, yr, offset
    );
    Ok(offset)
}

/// How [`calc_offset_physical`] compares the two images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalMethod {
    /// Centroid the brightest source in each image and difference the
    /// two positions.
    Centroid,
    /// Search integer shifts for the best ZNCC score, then refine the
    /// peak to sub-pixel precision.
    CrossCorrelation,
}

/// Configuration for [`calc_offset_physical`].
#[derive(Debug, Clone)]
pub struct PhysicalOffsetConfig {
    /// Comparison method.
    /// Default: [`PhysicalMethod::Centroid`]
    pub method: PhysicalMethod,

    /// Search half-width in pixels for the cross-correlation method.
    /// Default: 10
    pub max_shift: usize,

    /// Minimum ZNCC peak score for a correlation to be accepted.
    /// Default: 0.5
    pub min_correlation: f64,

    /// Source detection settings for the centroid method.
    pub detect: DetectConfig,
}

impl Default for PhysicalOffsetConfig {
    fn default() -> Self {
        Self {
            method: PhysicalMethod::Centroid,
            max_shift: 10,
            min_correlation: 0.5,
            detect: DetectConfig::default(),
        }
    }
}

/// Pixel offset of `target` relative to `reference` from the pixel data
/// itself.
///
/// Returns `[Δrow, Δcolumn]` such that a feature at `(r, c)` in
/// `reference` appears at `(r, c) + offset` in `target`. Fails with
/// [`Error::NoSource`] (centroid method) or [`Error::NoCorrelation`]
/// (cross-correlation method) when the images cannot be matched above
/// the configured confidence threshold.
pub fn calc_offset_physical(
    target: ArrayView2<'_, f32>,
    reference: ArrayView2<'_, f32>,
    config: &PhysicalOffsetConfig,
) -> Result<PixelOffset> {
    match config.method {
        PhysicalMethod::Centroid => {
            let t = find_brightest_source(target, &config.detect)?;
            let r = find_brightest_source(reference, &config.detect)?;
            Ok(offset_between_sources(&t, &r))
        }
        PhysicalMethod::CrossCorrelation => xcorr_offset(target, reference, config),
    }
}

/// Offset between two already-measured positions of the same source,
/// `[Δrow, Δcolumn]` of `target` relative to `reference`.
pub fn offset_between_sources(target: &Source, reference: &Source) -> PixelOffset {
    PixelOffset::new(target.y - reference.y, target.x - reference.x)
}

/// Integer-shift ZNCC search with parabolic sub-pixel refinement.
fn xcorr_offset(
    target: ArrayView2<'_, f32>,
    reference: ArrayView2<'_, f32>,
    config: &PhysicalOffsetConfig,
) -> Result<PixelOffset> {
    let m = config.max_shift as isize;
    let size = 2 * config.max_shift + 1;
    let (ht, wt) = target.dim();
    let (hr, wr) = reference.dim();

    // ── Step 1: score every integer shift over the overlap region ──
    // target[r, c] lines up with reference[r - dy, c - dx]
    let mut scores = Array2::<f64>::from_elem((size, size), f64::NEG_INFINITY);
    let mut best = f64::NEG_INFINITY;
    let mut best_idx = (config.max_shift, config.max_shift);
    for (i, dy) in (-m..=m).enumerate() {
        for (j, dx) in (-m..=m).enumerate() {
            let r0 = dy.max(0) as usize;
            let r1 = (ht as isize).min(hr as isize + dy).max(0) as usize;
            let c0 = dx.max(0) as usize;
            let c1 = (wt as isize).min(wr as isize + dx).max(0) as usize;
            // need at least a 2x2 overlap for a meaningful score
            if r1 < r0 + 2 || c1 < c0 + 2 {
                continue;
            }

            let t = target.slice(s![r0..r1, c0..c1]);
            let r = reference.slice(s![
                (r0 as isize - dy) as usize..(r1 as isize - dy) as usize,
                (c0 as isize - dx) as usize..(c1 as isize - dx) as usize
            ]);
            let score = zncc(&t, &r);
            scores[(i, j)] = score;
            if score > best {
                best = score;
                best_idx = (i, j);
            }
        }
    }

    if !best.is_finite() || best < config.min_correlation {
        return Err(Error::NoCorrelation {
            best: if best.is_finite() { best } else { -1.0 },
            min_correlation: config.min_correlation,
        });
    }

    // ── Step 2: parabolic refinement of the peak, one axis at a time ──
    let (bi, bj) = best_idx;
    let dy = bi as isize - m;
    let dx = bj as isize - m;
    let sub_dy = if bi > 0 && bi + 1 < size {
        parabolic_peak(scores[(bi - 1, bj)], best, scores[(bi + 1, bj)])
    } else {
        0.0
    };
    let sub_dx = if bj > 0 && bj + 1 < size {
        parabolic_peak(scores[(bi, bj - 1)], best, scores[(bi, bj + 1)])
    } else {
        0.0
    };

    debug!(
        "xcorr offset: best shift ({}, {}), score {:.3}, refinement ({:.3}, {:.3})",
        dy, dx, best, sub_dy, sub_dx
    );
    Ok(PixelOffset::new(dy as f64 + sub_dy, dx as f64 + sub_dx))
}

/// Sub-pixel peak position from three samples around a maximum, clamped
/// to half a pixel either side.
fn parabolic_peak(lo: f64, mid: f64, hi: f64) -> f64 {
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0;
    }
    let denom = lo - 2.0 * mid + hi;
    if denom.abs() < 1e-12 {
        return 0.0;
    }
    (0.5 * (lo - hi) / denom).clamp(-0.5, 0.5)
}

/// Zero-normalized cross-correlation of two equally-shaped windows, in
/// `[-1, 1]`. Flat windows score 0.
fn zncc(a: &ArrayView2<'_, f32>, b: &ArrayView2<'_, f32>) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mean_b = b.iter().map(|&v| v as f64).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let da = x as f64 - mean_a;
        let db = y as f64 - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return 0.0;
    }
    cov / (var_a * var_b).sqrt()
}

/// How the output geometry of a multi-image combination is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMethod {
    /// Cover every input pixel: the output is the union footprint.
    Outer,
    /// Keep only the region every input covers: the intersection
    /// footprint.
    Inner,
}

/// Shift offsets so each axis's minimum is zero.
///
/// Offsets are one row per image, one column per axis, in array order.
/// With `round_to_int` set, the regularized offsets are rounded to whole
/// pixels.
pub fn regularize_offsets(offsets: &Array2<f64>, round_to_int: bool) -> Array2<f64> {
    let mut out = offsets.to_owned();
    for mut col in out.columns_mut() {
        let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
        if min.is_finite() {
            col.mapv_inplace(|v| v - min);
        }
    }
    if round_to_int {
        out.mapv_inplace(f64::round);
    }
    out
}

/// Regularized offsets plus the output shape of a combination.
///
/// `shapes` and `offsets` are one row per image, one column per axis.
/// For [`CombineMethod::Outer`] the shape covers every input pixel; for
/// [`CombineMethod::Inner`] it is the fully-overlapping region, and the
/// call fails with [`Error::Range`] on an axis where no such region
/// exists.
pub fn combined_shape(
    shapes: &Array2<usize>,
    offsets: &Array2<f64>,
    method: CombineMethod,
) -> Result<(Array2<f64>, Vec<usize>)> {
    check_rows_and_axes(shapes, offsets)?;
    let reg = regularize_offsets(offsets, false);
    let (n_img, ndim) = shapes.dim();

    let mut shape_out = vec![0usize; ndim];
    for j in 0..ndim {
        match method {
            CombineMethod::Outer => {
                let extent = (0..n_img)
                    .map(|i| shapes[(i, j)] as f64 + reg[(i, j)])
                    .fold(f64::NEG_INFINITY, f64::max);
                shape_out[j] = extent.round() as usize;
            }
            CombineMethod::Inner => {
                let lower = reg.column(j).iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let upper = (0..n_img)
                    .map(|i| reg[(i, j)] + shapes[(i, j)] as f64)
                    .fold(f64::INFINITY, f64::min);
                if upper - lower <= 0.0 {
                    return Err(Error::Range {
                        axis: j,
                        start: lower.round() as isize,
                        stop: upper.round() as isize,
                    });
                }
                shape_out[j] = (upper - lower).round() as usize;
            }
        }
    }
    Ok((reg, shape_out))
}

/// Per-image slices for extracting or placing the overlapping parts of a
/// combination.
///
/// For [`CombineMethod::Outer`], slice `i` addresses the region of the
/// *output* array where image `i` lands. For [`CombineMethod::Inner`],
/// slice `i` addresses the region of *input* image `i` shared by every
/// frame. Rendering a returned [`SliceTuple`] with `to_string()` yields
/// the FITS-convention section string for headers and logs.
pub fn offsets_to_slices(
    shapes: &Array2<usize>,
    offsets: &Array2<f64>,
    method: CombineMethod,
) -> Result<Vec<SliceTuple>> {
    check_rows_and_axes(shapes, offsets)?;
    let reg = regularize_offsets(offsets, true);
    let (n_img, ndim) = shapes.dim();

    match method {
        CombineMethod::Outer => (0..n_img)
            .map(|i| {
                let axes = (0..ndim)
                    .map(|j| {
                        let start = reg[(i, j)] as usize;
                        AxisSlice::Range(start..start + shapes[(i, j)])
                    })
                    .collect();
                SliceTuple::new(axes)
            })
            .collect(),
        CombineMethod::Inner => {
            let mut starts = vec![0usize; ndim];
            let mut stops = vec![0usize; ndim];
            for j in 0..ndim {
                let offmax = reg.column(j).iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let stopmin = (0..n_img)
                    .map(|i| reg[(i, j)] + shapes[(i, j)] as f64)
                    .fold(f64::INFINITY, f64::min);
                if stopmin <= offmax {
                    return Err(Error::Range {
                        axis: j,
                        start: offmax as isize,
                        stop: stopmin as isize,
                    });
                }
                starts[j] = offmax as usize;
                stops[j] = stopmin as usize;
            }
            (0..n_img)
                .map(|i| {
                    let axes = (0..ndim)
                        .map(|j| {
                            let off = reg[(i, j)] as usize;
                            AxisSlice::Range(starts[j] - off..stops[j] - off)
                        })
                        .collect();
                    SliceTuple::new(axes)
                })
                .collect()
        }
    }
}

fn check_rows_and_axes(shapes: &Array2<usize>, offsets: &Array2<f64>) -> Result<()> {
    if shapes.nrows() == 0 {
        return Err(Error::ShapeMismatch {
            expected: 1,
            got: 0,
        });
    }
    if shapes.nrows() != offsets.nrows() {
        return Err(Error::ShapeMismatch {
            expected: shapes.nrows(),
            got: offsets.nrows(),
        });
    }
    if shapes.ncols() != offsets.ncols() {
        return Err(Error::ShapeMismatch {
            expected: shapes.ncols(),
            got: offsets.ncols(),
        });
    }
    Ok(())
}
