//! # astroslice
//!
//! Small utilities for astronomical image processing: FITS/IRAF section
//! notation, bezel (edge-margin) trimming, scalar/sequence coercion, and
//! relative pixel offsets between overlapping exposures.
//!
//! ## Features
//!
//! - **Section parsing**: convert `"[10:20, 1:2]"`-style strings
//!   (1-indexed, inclusive upper bound, optional brackets, open ends,
//!   negative from-the-end bounds) into validated native index ranges
//! - **Bezel trimming**: turn symmetric or per-axis edge margins into
//!   the same index ranges, with broadcast over axes
//! - **Container coercion**: normalize a scalar, a sequence, or nothing
//!   into lists and numeric arrays with explicit broadcast rules
//! - **Offset measurement**: locate one exposure relative to another
//!   through world-coordinate metadata ([`wcs`]) or directly from pixels
//!   (source centroiding or ZNCC correlation)
//! - **Combination geometry**: regularize per-image offsets and derive
//!   the slices needed to stack or mosaic the frames
//!
//! ## Example
//!
//! ```
//! use astroslice::slicefy;
//! use ndarray::Array2;
//!
//! let img = Array2::<f32>::zeros((100, 100));
//!
//! // Trim a 10-pixel bezel from every edge:
//! let cut = slicefy(10, &[100, 100])?;
//! let trimmed = cut.slice(img.view().into_dyn())?;
//! assert_eq!(trimmed.shape(), &[80, 80]);
//!
//! // The same region in FITS/IRAF section notation (1-indexed,
//! // inclusive upper bound):
//! assert_eq!(cut.to_string(), "[11:90, 11:90]");
//! let same = slicefy("[11:90, 11:90]", &[100, 100])?;
//! assert_eq!(same, cut);
//! # Ok::<(), astroslice::Error>(())
//! ```
//!
//! Sections and bezels share one entry point, [`slicefy`]; the input kind
//! is classified once into a [`SliceRule`] and every produced
//! [`SliceTuple`] is validated against the target shape, so applying it
//! never panics.
//!
//! Offsets are measured with [`calc_offset_wcs`] (two images' coordinate
//! metadata and a shared sky position) or [`calc_offset_physical`] (two
//! pixel arrays and a confidence threshold), both returning
//! `[Δrow, Δcolumn]` vectors.

pub mod centroid;
pub mod error;
pub mod listify;
pub mod offset;
pub mod slices;

pub use centroid::{find_brightest_source, DetectConfig, Source};
#[cfg(feature = "image")]
pub use centroid::{find_brightest_source_in_image, image_to_array};
pub use error::{Error, Result};
pub use listify::{is_list_like, listify, ndfy, Listable};
pub use offset::{
    calc_offset_physical, calc_offset_wcs, combined_shape, offset_between_sources,
    offsets_to_slices, regularize_offsets, sky_at, CombineMethod, PhysicalMethod,
    PhysicalOffsetConfig, PixelSky, RefLocation,
};
pub use slices::{
    bezel_to_slice, parse_fits_section, slicefy, AxisBezel, AxisSlice, BezelSpec, Bound,
    RangeSpec, SectionAxis, SliceRule, SliceTuple,
};

/// A 2-D pixel offset in array-axis order: `[Δrow, Δcolumn]`.
pub type PixelOffset = nalgebra::Vector2<f64>;
