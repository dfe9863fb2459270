//! Integration tests: recover known offsets between synthetic star
//! fields, and between WCS headers built from FITS keywords, then feed
//! measured offsets into the combination helpers.

use anyhow::Result;
use approx::assert_abs_diff_eq;
use astroslice::{
    calc_offset_physical, calc_offset_wcs, combined_shape, offsets_to_slices, CombineMethod,
    Error, PhysicalMethod, PhysicalOffsetConfig,
};
use ndarray::{array, Array2, ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}

/// Noisy background plus a few Gaussian stars at fixed positions, all
/// shifted by `(dy, dx)`.
fn star_field(shape: (usize, usize), shift: (f64, f64), rng: &mut StdRng) -> Array2<f32> {
    let noise = Normal::new(0.0f32, 1.0).unwrap();
    let stars = [
        (12.0, 40.0, 180.0),
        (33.5, 18.25, 250.0),
        (47.0, 47.0, 120.0),
    ];
    Array2::from_shape_fn(shape, |(r, c)| {
        let mut v = 50.0 + noise.sample(rng);
        for &(sy, sx, amp) in &stars {
            let dr = r as f64 - (sy + shift.0);
            let dc = c as f64 - (sx + shift.1);
            v += (amp * (-(dr * dr + dc * dc) / (2.0 * 1.8 * 1.8)).exp()) as f32;
        }
        v
    })
}

#[test]
fn test_physical_offset_centroid() -> Result<()> {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(42);
    let reference = star_field((64, 64), (0.0, 0.0), &mut rng);
    let target = star_field((64, 64), (3.2, -2.4), &mut rng);

    let config = PhysicalOffsetConfig::default();
    let off = calc_offset_physical(target.view(), reference.view(), &config)?;
    assert_abs_diff_eq!(off[0], 3.2, epsilon = 0.5);
    assert_abs_diff_eq!(off[1], -2.4, epsilon = 0.5);
    Ok(())
}

#[test]
fn test_physical_offset_cross_correlation() -> Result<()> {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(7);
    let reference = star_field((64, 64), (0.0, 0.0), &mut rng);
    let target = star_field((64, 64), (4.0, -3.0), &mut rng);

    let config = PhysicalOffsetConfig {
        method: PhysicalMethod::CrossCorrelation,
        max_shift: 8,
        ..Default::default()
    };
    let off = calc_offset_physical(target.view(), reference.view(), &config)?;
    assert_abs_diff_eq!(off[0], 4.0, epsilon = 0.5);
    assert_abs_diff_eq!(off[1], -3.0, epsilon = 0.5);
    Ok(())
}

#[test]
fn test_uncorrelated_images_fail() {
    let mut rng = StdRng::seed_from_u64(3);
    let noise = Normal::new(0.0f32, 1.0).unwrap();
    let a = Array2::from_shape_fn((48, 48), |_| 10.0 + noise.sample(&mut rng));
    let b = Array2::from_shape_fn((48, 48), |_| 10.0 + noise.sample(&mut rng));

    let config = PhysicalOffsetConfig {
        method: PhysicalMethod::CrossCorrelation,
        max_shift: 5,
        min_correlation: 0.9,
        ..Default::default()
    };
    let err = calc_offset_physical(a.view(), b.view(), &config).unwrap_err();
    assert!(matches!(err, Error::NoCorrelation { .. }));
}

fn wcs_from_keywords(crpix1: f64, crpix2: f64) -> Result<wcs::WCS> {
    let params: wcs::WCSParams = serde_json::from_value(serde_json::json!({
        "NAXIS": 2,
        "NAXIS1": 1024,
        "NAXIS2": 1024,
        "CTYPE1": "RA---TAN",
        "CTYPE2": "DEC--TAN",
        "CRPIX1": crpix1,
        "CRPIX2": crpix2,
        "CRVAL1": 83.0,
        "CRVAL2": -1.0,
        "CDELT1": -0.000277,
        "CDELT2": 0.000277,
    }))?;
    Ok(wcs::WCS::new(&params)?)
}

#[test]
fn test_wcs_offset_from_fits_keywords() -> Result<()> {
    // Identical TAN projections except the reference pixel: the same sky
    // position must land 10 pixels apart along x.
    let target = wcs_from_keywords(522.0, 512.0)?;
    let reference = wcs_from_keywords(512.0, 512.0)?;

    let ref_coord = (83.0f64.to_radians(), (-1.0f64).to_radians());
    let off = calc_offset_wcs(&target, &reference, ref_coord)?;
    assert_abs_diff_eq!(off[0], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(off[1], 10.0, epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_measure_then_combine() -> Result<()> {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(99);
    let reference = star_field((64, 64), (0.0, 0.0), &mut rng);
    let target = star_field((64, 64), (4.0, -3.0), &mut rng);

    let config = PhysicalOffsetConfig {
        method: PhysicalMethod::CrossCorrelation,
        ..Default::default()
    };
    let off = calc_offset_physical(target.view(), reference.view(), &config)?;

    let shapes = array![[64usize, 64], [64, 64]];
    let offsets = array![[0.0, 0.0], [off[0], off[1]]];

    let (_, canvas_shape) = combined_shape(&shapes, &offsets, CombineMethod::Outer)?;
    let slices = offsets_to_slices(&shapes, &offsets, CombineMethod::Outer)?;
    assert_eq!(slices.len(), 2);

    // every per-image slice must fit the combined canvas
    let canvas = ArrayD::<f32>::zeros(IxDyn(&canvas_shape));
    for cut in &slices {
        let view = cut.slice(canvas.view())?;
        assert_eq!(view.shape(), &[64, 64]);
    }
    Ok(())
}
