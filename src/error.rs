use thiserror::Error;

/// Errors produced by section parsing, container coercion, and offset
/// measurement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed FITS/IRAF section string.
    #[error("cannot parse section {input:?}: {reason}")]
    Parse {
        /// What went wrong.
        reason: String,
        /// The offending input, as given by the caller.
        input: String,
    },

    /// A sequence length does not match the array dimensionality.
    #[error("length mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Required length (usually the number of axes).
        expected: usize,
        /// Length actually supplied.
        got: usize,
    },

    /// A resolved axis range is empty, inverted, or out of bounds.
    #[error("invalid range {start}..{stop} on axis {axis}")]
    Range {
        /// Axis the range was resolved on.
        axis: usize,
        /// Resolved lower bound (0-indexed, inclusive).
        start: isize,
        /// Resolved upper bound (0-indexed, exclusive).
        stop: isize,
    },

    /// Coordinate metadata cannot supply the required sky/pixel transform.
    #[error("no valid coordinate transform for the {which} image")]
    MissingTransform {
        /// Which input lacked the transform (`"target"` or `"reference"`).
        which: &'static str,
    },

    /// No source detected above the significance threshold.
    #[error("no source above threshold: peak SNR {measured:.2} < {min_snr:.2}")]
    NoSource {
        /// Significance of the brightest peak found, in sigma.
        measured: f64,
        /// Significance the caller required.
        min_snr: f64,
    },

    /// Cross-correlation peak below the confidence threshold.
    #[error("no correlation above threshold: best score {best:.3} < {min_correlation:.3}")]
    NoCorrelation {
        /// Best ZNCC score over the searched shifts.
        best: f64,
        /// Score the caller required.
        min_correlation: f64,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
