//! Translate FITS/IRAF section notation and bezel margins into array
//! index objects.
//!
//! Astronomical headers describe sub-frames with bracketed section
//! strings such as `"[10:20, 1:2]"`: 1-indexed, upper bound included.
//! Reduction code instead wants native half-open, 0-indexed ranges it can
//! apply to an n-dimensional array. This module converts between the two:
//!
//! 1. [`parse_fits_section`] parses a section string into per-axis
//!    [`RangeSpec`]s / fixed indices, converting bounds to 0-indexed
//!    half-open form as it goes.
//! 2. [`bezel_to_slice`] turns per-axis edge margins into ranges.
//! 3. [`slicefy`] is the one entry point over both, dispatching on a
//!    [`SliceRule`] resolved once at the boundary, and producing a
//!    [`SliceTuple`] already validated against the target array shape.
//!
//! # Index conventions
//!
//! - Section strings are 1-indexed with inclusive upper bounds; a lower
//!   bound `n` becomes `n-1` while an upper bound `m` is kept, since a
//!   closed upper bound in 1-indexing equals an exclusive upper bound in
//!   0-indexing.
//! - Negative bounds count from the end of the axis.
//! - Axes are read in row-major array order, first token = axis 0.

use std::fmt;
use std::ops::Range;

use ndarray::{ArrayViewD, SliceInfoElem};
use tracing::debug;

use crate::error::{Error, Result};
use crate::listify::broadcast;

/// One side of an axis range.
///
/// An explicit sentinel keeps "no bound given" distinct from a legitimate
/// zero bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// No bound on this side; resolves to the full extent of the axis.
    Unbounded,
    /// A 0-indexed bound. Negative values count from the end of the axis.
    At(isize),
}

/// One axis's parsed bound pair, in 0-indexed half-open form, before
/// resolution against a concrete array shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    /// Inclusive lower bound.
    pub start: Bound,
    /// Exclusive upper bound.
    pub stop: Bound,
}

impl RangeSpec {
    /// Resolve against an axis of size `dim`, substituting unbounded
    /// sides, counting negative bounds from the end, and rejecting empty
    /// or inverted results.
    pub fn resolve(&self, axis: usize, dim: usize) -> Result<Range<usize>> {
        let start = match self.start {
            Bound::Unbounded => 0,
            Bound::At(v) if v < 0 => v + dim as isize,
            Bound::At(v) => v,
        };
        let stop = match self.stop {
            Bound::Unbounded => dim as isize,
            Bound::At(v) if v < 0 => v + dim as isize,
            Bound::At(v) => v,
        };
        if start < 0 || stop > dim as isize || start >= stop {
            return Err(Error::Range { axis, start, stop });
        }
        Ok(start as usize..stop as usize)
    }
}

/// One axis of a parsed section: a bound pair or a single fixed index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionAxis {
    /// A `start:stop` range.
    Range(RangeSpec),
    /// A single 0-indexed position; the axis is removed on application.
    /// Negative values count from the end.
    Index(isize),
}

impl SectionAxis {
    fn resolve(&self, axis: usize, dim: usize) -> Result<AxisSlice> {
        match self {
            SectionAxis::Range(spec) => Ok(AxisSlice::Range(spec.resolve(axis, dim)?)),
            SectionAxis::Index(idx) => {
                let i = if *idx < 0 { *idx + dim as isize } else { *idx };
                if i < 0 || i >= dim as isize {
                    return Err(Error::Range {
                        axis,
                        start: i,
                        stop: i + 1,
                    });
                }
                Ok(AxisSlice::Single(i as usize))
            }
        }
    }
}

/// One axis of a resolved selection, guaranteed in-bounds for the shape
/// it was resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisSlice {
    /// A non-empty half-open range; the axis is kept.
    Range(Range<usize>),
    /// A single position; the axis is removed on application.
    Single(usize),
}

/// An ordered per-axis selection, ready to index an n-dimensional array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceTuple {
    axes: Vec<AxisSlice>,
}

impl SliceTuple {
    /// Build from per-axis selections, rejecting empty or inverted ranges.
    pub fn new(axes: Vec<AxisSlice>) -> Result<Self> {
        for (axis, ax) in axes.iter().enumerate() {
            if let AxisSlice::Range(r) = ax {
                if r.end <= r.start {
                    return Err(Error::Range {
                        axis,
                        start: r.start as isize,
                        stop: r.end as isize,
                    });
                }
            }
        }
        Ok(Self { axes })
    }

    /// Per-axis selections, in array order.
    pub fn axes(&self) -> &[AxisSlice] {
        &self.axes
    }

    /// Number of axes this selection indexes.
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Shape of the selected region. Single-index axes are removed, as
    /// they are on application.
    pub fn output_shape(&self) -> Vec<usize> {
        self.axes
            .iter()
            .filter_map(|ax| match ax {
                AxisSlice::Range(r) => Some(r.end - r.start),
                AxisSlice::Single(_) => None,
            })
            .collect()
    }

    /// Convert to `ndarray` slice elements for use with `slice`/`slice_move`.
    pub fn as_slice_info(&self) -> Vec<SliceInfoElem> {
        self.axes
            .iter()
            .map(|ax| match ax {
                AxisSlice::Range(r) => SliceInfoElem::Slice {
                    start: r.start as isize,
                    end: Some(r.end as isize),
                    step: 1,
                },
                AxisSlice::Single(i) => SliceInfoElem::Index(*i as isize),
            })
            .collect()
    }

    /// Apply to a dynamic-dimensional view.
    ///
    /// The view must have the same number of axes the selection was built
    /// for, and every axis bound must fit the view's actual shape; this
    /// keeps application panic-free even when the view differs from the
    /// shape the selection was resolved against.
    pub fn slice<'a, T>(&self, view: ArrayViewD<'a, T>) -> Result<ArrayViewD<'a, T>> {
        if view.ndim() != self.axes.len() {
            return Err(Error::ShapeMismatch {
                expected: view.ndim(),
                got: self.axes.len(),
            });
        }
        for (axis, (ax, &dim)) in self.axes.iter().zip(view.shape()).enumerate() {
            let (start, stop) = match ax {
                AxisSlice::Range(r) => (r.start, r.end),
                AxisSlice::Single(i) => (*i, *i + 1),
            };
            if stop > dim {
                return Err(Error::Range {
                    axis,
                    start: start as isize,
                    stop: stop as isize,
                });
            }
        }
        Ok(view.slice_move(self.as_slice_info().as_slice()))
    }
}

impl fmt::Display for SliceTuple {
    /// Render in FITS convention: 1-indexed, upper bound included.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, ax) in self.axes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match ax {
                AxisSlice::Range(r) => write!(f, "{}:{}", r.start + 1, r.end)?,
                AxisSlice::Single(idx) => write!(f, "{}", idx + 1)?,
            }
        }
        write!(f, "]")
    }
}

/// Margin trimmed from the two ends of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisBezel {
    /// Same margin on both ends.
    Symmetric(i64),
    /// Distinct margins for the low and high ends.
    Pair(i64, i64),
}

impl AxisBezel {
    fn ends(self) -> (i64, i64) {
        match self {
            AxisBezel::Symmetric(b) => (b, b),
            AxisBezel::Pair(lo, hi) => (lo, hi),
        }
    }
}

impl From<i64> for AxisBezel {
    fn from(value: i64) -> Self {
        AxisBezel::Symmetric(value)
    }
}

impl From<i32> for AxisBezel {
    fn from(value: i32) -> Self {
        AxisBezel::Symmetric(value as i64)
    }
}

impl From<(i64, i64)> for AxisBezel {
    fn from((lo, hi): (i64, i64)) -> Self {
        AxisBezel::Pair(lo, hi)
    }
}

impl From<(i32, i32)> for AxisBezel {
    fn from((lo, hi): (i32, i32)) -> Self {
        AxisBezel::Pair(lo as i64, hi as i64)
    }
}

/// Edge margins to trim, before normalization against a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BezelSpec {
    /// One margin for every axis and both ends.
    Scalar(i64),
    /// Per-axis margins; a length-1 vector broadcasts to all axes.
    PerAxis(Vec<AxisBezel>),
}

/// Input to [`slicefy`], classified once at the boundary.
///
/// `From` impls cover the common spellings: section strings, a bare
/// margin, a per-axis margin vector. A 2-tuple is read as two per-axis
/// symmetric margins, not a low/high pair; asymmetric trims are written
/// as a vector of pairs, e.g. `vec![(10, 20), (30, 40)]`.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceRule {
    /// A FITS/IRAF section string, e.g. `"[10:20, 1:2]"`.
    FitsNotation(String),
    /// One margin applied to every axis and both ends.
    BezelScalar(i64),
    /// Per-axis margins.
    BezelPerAxis(Vec<AxisBezel>),
    /// Select everything.
    Full,
}

impl From<&str> for SliceRule {
    fn from(value: &str) -> Self {
        SliceRule::FitsNotation(value.to_string())
    }
}

impl From<String> for SliceRule {
    fn from(value: String) -> Self {
        SliceRule::FitsNotation(value)
    }
}

impl From<i64> for SliceRule {
    fn from(value: i64) -> Self {
        SliceRule::BezelScalar(value)
    }
}

impl From<i32> for SliceRule {
    fn from(value: i32) -> Self {
        SliceRule::BezelScalar(value as i64)
    }
}

impl<B: Into<AxisBezel>> From<Vec<B>> for SliceRule {
    fn from(value: Vec<B>) -> Self {
        SliceRule::BezelPerAxis(value.into_iter().map(Into::into).collect())
    }
}

impl From<(i64, i64)> for SliceRule {
    fn from((a, b): (i64, i64)) -> Self {
        SliceRule::BezelPerAxis(vec![AxisBezel::Symmetric(a), AxisBezel::Symmetric(b)])
    }
}

impl From<(i32, i32)> for SliceRule {
    fn from((a, b): (i32, i32)) -> Self {
        (a as i64, b as i64).into()
    }
}

impl From<BezelSpec> for SliceRule {
    fn from(value: BezelSpec) -> Self {
        match value {
            BezelSpec::Scalar(b) => SliceRule::BezelScalar(b),
            BezelSpec::PerAxis(v) => SliceRule::BezelPerAxis(v),
        }
    }
}

fn parse_error(input: &str, reason: impl Into<String>) -> Error {
    Error::Parse {
        reason: reason.into(),
        input: input.to_string(),
    }
}

/// Parse a FITS/IRAF section string into per-axis specs.
///
/// Whitespace is ignored. Brackets are optional but must be balanced.
/// Each comma-separated token is either `start:stop` (either side may be
/// empty for an open end) or a single fixed index. Bounds are converted
/// from the 1-indexed, inclusive-upper source convention to 0-indexed
/// half-open form; negative bounds pass through to be counted from the
/// end of the axis at resolution time.
///
/// ```
/// use astroslice::{parse_fits_section, Bound, RangeSpec, SectionAxis};
///
/// let axes = parse_fits_section("[1:10, 5:8]")?;
/// assert_eq!(
///     axes[0],
///     SectionAxis::Range(RangeSpec { start: Bound::At(0), stop: Bound::At(10) })
/// );
/// # Ok::<(), astroslice::Error>(())
/// ```
pub fn parse_fits_section(section: &str) -> Result<Vec<SectionAxis>> {
    let compact: String = section.chars().filter(|c| !c.is_whitespace()).collect();
    let inner = match (compact.starts_with('['), compact.ends_with(']')) {
        (true, true) => &compact[1..compact.len() - 1],
        (false, false) => compact.as_str(),
        _ => return Err(parse_error(section, "unbalanced brackets")),
    };
    if inner.is_empty() {
        return Err(parse_error(section, "no axes given"));
    }

    inner
        .split(',')
        .enumerate()
        .map(|(axis, token)| parse_token(section, axis, token))
        .collect()
}

fn parse_token(input: &str, axis: usize, token: &str) -> Result<SectionAxis> {
    let parts: Vec<&str> = token.split(':').collect();
    match parts.as_slice() {
        [index] => Ok(SectionAxis::Index(parse_lower(input, axis, index)?)),
        [start, stop] => Ok(SectionAxis::Range(RangeSpec {
            start: match *start {
                "" => Bound::Unbounded,
                s => Bound::At(parse_lower(input, axis, s)?),
            },
            stop: match *stop {
                "" => Bound::Unbounded,
                s => Bound::At(parse_number(input, axis, s)?),
            },
        })),
        _ => Err(parse_error(
            input,
            format!("axis {axis}: more than one ':' in {token:?}"),
        )),
    }
}

/// Parse a lower bound or single index: 1-indexed positives shift down by
/// one, negatives pass through, zero is not a valid FITS index.
fn parse_lower(input: &str, axis: usize, part: &str) -> Result<isize> {
    let n = parse_number(input, axis, part)?;
    match n {
        0 => Err(parse_error(
            input,
            format!("axis {axis}: smallest permissible FITS index is 1"),
        )),
        n if n > 0 => Ok(n - 1),
        n => Ok(n),
    }
}

fn parse_number(input: &str, axis: usize, part: &str) -> Result<isize> {
    part.parse::<isize>()
        .map_err(|_| parse_error(input, format!("axis {axis}: non-numeric bound {part:?}")))
}

/// Convert per-axis bezel margins into a resolved selection.
///
/// Margins are normalized with the container-coercion broadcast rule: a
/// scalar or single-element vector applies to every axis; otherwise the
/// length must match `shape`. Each axis of size `d` with margins
/// `(lo, hi)` trims to `[lo, d - hi)`; zero means no trimming on that
/// end. Negative margins and empty or inverted results are range errors.
pub fn bezel_to_slice(bezels: &BezelSpec, shape: &[usize]) -> Result<SliceTuple> {
    let per_axis: Vec<AxisBezel> = match bezels {
        BezelSpec::Scalar(b) => broadcast(vec![AxisBezel::Symmetric(*b)], shape.len())?,
        BezelSpec::PerAxis(v) => broadcast(v.clone(), shape.len())?,
    };

    let axes = per_axis
        .iter()
        .zip(shape)
        .enumerate()
        .map(|(axis, (bz, &dim))| {
            let (lo, hi) = bz.ends();
            let start = lo as isize;
            let stop = dim as isize - hi as isize;
            if lo < 0 || hi < 0 || start >= stop {
                return Err(Error::Range { axis, start, stop });
            }
            Ok(AxisSlice::Range(start as usize..stop as usize))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SliceTuple { axes })
}

/// Resolve a trimming rule against an array shape.
///
/// The rule is classified once into a [`SliceRule`]: section strings take
/// the FITS-notation path, numeric input the bezel path. The returned
/// [`SliceTuple`] is fully validated against `shape` and applies without
/// panicking.
///
/// ```
/// use astroslice::slicefy;
///
/// // FITS section: 1-indexed, inclusive upper bound.
/// let cut = slicefy("[1:10, 5:8]", &[20, 20])?;
/// assert_eq!(cut.output_shape(), vec![10, 4]);
///
/// // Bezel: trim 10 pixels from every edge.
/// let cut = slicefy(10, &[100, 100])?;
/// assert_eq!(cut.to_string(), "[11:90, 11:90]");
/// # Ok::<(), astroslice::Error>(())
/// ```
pub fn slicefy(rule: impl Into<SliceRule>, shape: &[usize]) -> Result<SliceTuple> {
    match rule.into() {
        SliceRule::FitsNotation(section) => {
            let parsed = parse_fits_section(&section)?;
            if parsed.len() != shape.len() {
                return Err(Error::ShapeMismatch {
                    expected: shape.len(),
                    got: parsed.len(),
                });
            }
            let axes = parsed
                .iter()
                .zip(shape)
                .enumerate()
                .map(|(axis, (sect, &dim))| sect.resolve(axis, dim))
                .collect::<Result<Vec<_>>>()?;
            let tuple = SliceTuple { axes };
            debug!("resolved section {:?} to {}", section, tuple);
            Ok(tuple)
        }
        SliceRule::BezelScalar(b) => bezel_to_slice(&BezelSpec::Scalar(b), shape),
        SliceRule::BezelPerAxis(v) => bezel_to_slice(&BezelSpec::PerAxis(v), shape),
        SliceRule::Full => {
            let axes = shape
                .iter()
                .enumerate()
                .map(|(axis, &dim)| {
                    if dim == 0 {
                        return Err(Error::Range {
                            axis,
                            start: 0,
                            stop: 0,
                        });
                    }
                    Ok(AxisSlice::Range(0..dim))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(SliceTuple { axes })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: usize, stop: usize) -> AxisSlice {
        AxisSlice::Range(start..stop)
    }

    #[test]
    fn test_parse_basic_section() {
        let axes = parse_fits_section("[2:5]").unwrap();
        assert_eq!(
            axes,
            vec![SectionAxis::Range(RangeSpec {
                start: Bound::At(1),
                stop: Bound::At(5),
            })]
        );
    }

    #[test]
    fn test_parse_open_ended_and_negative() {
        let axes = parse_fits_section("[ : , -5: ]").unwrap();
        assert_eq!(
            axes,
            vec![
                SectionAxis::Range(RangeSpec {
                    start: Bound::Unbounded,
                    stop: Bound::Unbounded,
                }),
                SectionAxis::Range(RangeSpec {
                    start: Bound::At(-5),
                    stop: Bound::Unbounded,
                }),
            ]
        );
    }

    #[test]
    fn test_parse_single_index() {
        let axes = parse_fits_section("[3, 1:4]").unwrap();
        assert_eq!(axes[0], SectionAxis::Index(2));
    }

    #[test]
    fn test_parse_bracketless() {
        assert_eq!(
            parse_fits_section("1:10").unwrap(),
            parse_fits_section("[1:10]").unwrap()
        );
    }

    #[test]
    fn test_parse_errors() {
        // two colons in one token
        assert!(matches!(
            parse_fits_section("[1:2:3]"),
            Err(Error::Parse { .. })
        ));
        // unbalanced brackets
        assert!(matches!(
            parse_fits_section("[1:2"),
            Err(Error::Parse { .. })
        ));
        // non-numeric bound
        assert!(matches!(
            parse_fits_section("[a:b]"),
            Err(Error::Parse { .. })
        ));
        // empty input
        assert!(matches!(parse_fits_section(""), Err(Error::Parse { .. })));
        assert!(matches!(parse_fits_section("[]"), Err(Error::Parse { .. })));
        // FITS indexing starts at 1
        assert!(matches!(
            parse_fits_section("[0:4]"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_slicefy_fits_mode() {
        let cut = slicefy("[1:10]", &[20]).unwrap();
        assert_eq!(cut.axes(), &[range(0, 10)]);

        let cut = slicefy("[1:10, 5:8]", &[20, 20]).unwrap();
        assert_eq!(cut.axes(), &[range(0, 10), range(4, 8)]);
        assert_eq!(cut.output_shape(), vec![10, 4]);
    }

    #[test]
    fn test_slicefy_negative_bounds() {
        // last five elements of a 20-element axis
        let cut = slicefy("[-5:]", &[20]).unwrap();
        assert_eq!(cut.axes(), &[range(15, 20)]);

        // all but the outermost element on each side
        let cut = slicefy("[2:-1]", &[10]).unwrap();
        assert_eq!(cut.axes(), &[range(1, 9)]);
    }

    #[test]
    fn test_slicefy_inverted_range_fails() {
        let err = slicefy("[5:2]", &[10]).unwrap_err();
        assert!(matches!(err, Error::Range { axis: 0, .. }));
    }

    #[test]
    fn test_slicefy_out_of_bounds_fails() {
        assert!(matches!(
            slicefy("[1:30]", &[20]),
            Err(Error::Range { .. })
        ));
        assert!(matches!(slicefy("[25]", &[20]), Err(Error::Range { .. })));
    }

    #[test]
    fn test_slicefy_axis_count_mismatch() {
        let err = slicefy("[1:10]", &[20, 20]).unwrap_err();
        assert_eq!(err, Error::ShapeMismatch { expected: 2, got: 1 });
    }

    #[test]
    fn test_slicefy_bezel_scalar() {
        let cut = slicefy(10, &[100, 100]).unwrap();
        assert_eq!(cut.axes(), &[range(10, 90), range(10, 90)]);
    }

    #[test]
    fn test_slicefy_bezel_per_axis() {
        let cut = slicefy(vec![5, 10], &[100, 100]).unwrap();
        assert_eq!(cut.axes(), &[range(5, 95), range(10, 90)]);
    }

    #[test]
    fn test_slicefy_bezel_pairs() {
        let cut = slicefy(vec![(10, 20), (30, 40)], &[100, 100]).unwrap();
        assert_eq!(cut.axes(), &[range(10, 80), range(30, 60)]);
    }

    #[test]
    fn test_slicefy_bezel_broadcast() {
        // single-element vector broadcasts like a scalar
        let cut = slicefy(vec![4], &[10, 10]).unwrap();
        assert_eq!(cut.axes(), &[range(4, 6), range(4, 6)]);
    }

    #[test]
    fn test_slicefy_bezel_wrong_length() {
        let err = slicefy(vec![1, 2, 3], &[10, 10]).unwrap_err();
        assert_eq!(err, Error::ShapeMismatch { expected: 2, got: 3 });
    }

    #[test]
    fn test_slicefy_bezel_negative_or_too_large() {
        assert!(matches!(slicefy(-1, &[10, 10]), Err(Error::Range { .. })));
        // 6 + 6 > 10: nothing left
        assert!(matches!(slicefy(6, &[10, 10]), Err(Error::Range { .. })));
        assert!(matches!(
            slicefy(vec![(45, 56), (0, 0)], &[100, 100]),
            Err(Error::Range { .. })
        ));
    }

    #[test]
    fn test_slicefy_full() {
        let cut = slicefy(SliceRule::Full, &[3, 4]).unwrap();
        assert_eq!(cut.axes(), &[range(0, 3), range(0, 4)]);
    }

    #[test]
    fn test_display_fits_convention() {
        let cut = slicefy("[1:10, 5:8]", &[20, 20]).unwrap();
        assert_eq!(cut.to_string(), "[1:10, 5:8]");

        let cut = slicefy(10, &[100, 100]).unwrap();
        assert_eq!(cut.to_string(), "[11:90, 11:90]");

        let cut = slicefy("[3, 1:4]", &[5, 5]).unwrap();
        assert_eq!(cut.to_string(), "[3, 1:4]");
    }

    #[test]
    fn test_display_parse_roundtrip() {
        let cut = slicefy("[ 2 : 9 , 4:4 ]", &[10, 10]).unwrap();
        let again = slicefy(cut.to_string(), &[10, 10]).unwrap();
        assert_eq!(cut, again);
    }
}
