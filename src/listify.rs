//! Coerce scalar-or-sequence inputs into canonical containers.
//!
//! Calibration-style parameters (bezels, sigmas, per-axis margins) are
//! naturally written as a bare scalar, a sequence, or nothing at all.
//! [`Listable`] captures those three cases in one tagged value, resolved
//! once at the API boundary; [`listify`] and [`ndfy`] then normalize it
//! into a list or a numeric array with broadcast semantics.

use ndarray::Array1;

use crate::error::{Error, Result};

/// A value that may be absent, a single scalar, or an ordered sequence.
///
/// Bare text always enters as [`Listable::Scalar`]; a string is never
/// treated as a sequence of characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listable<T> {
    /// No value given.
    None,
    /// A single scalar.
    Scalar(T),
    /// An ordered, indexable sequence.
    List(Vec<T>),
}

impl<T> Listable<T> {
    /// Number of elements, or `None` when no value was given.
    pub fn len(&self) -> Option<usize> {
        match self {
            Listable::None => None,
            Listable::Scalar(_) => Some(1),
            Listable::List(v) => Some(v.len()),
        }
    }

    /// `true` when no value was given.
    pub fn is_none(&self) -> bool {
        matches!(self, Listable::None)
    }

    /// Convert into a plain vector: a scalar becomes a one-element vector,
    /// absence becomes `None`.
    pub fn into_vec(self) -> Option<Vec<T>> {
        match self {
            Listable::None => None,
            Listable::Scalar(s) => Some(vec![s]),
            Listable::List(v) => Some(v),
        }
    }
}

impl<T> From<T> for Listable<T> {
    fn from(value: T) -> Self {
        Listable::Scalar(value)
    }
}

impl<T> From<Vec<T>> for Listable<T> {
    fn from(value: Vec<T>) -> Self {
        Listable::List(value)
    }
}

impl<T: Clone> From<&[T]> for Listable<T> {
    fn from(value: &[T]) -> Self {
        Listable::List(value.to_vec())
    }
}

impl<T, const N: usize> From<[T; N]> for Listable<T> {
    fn from(value: [T; N]) -> Self {
        Listable::List(value.into())
    }
}

impl<T> From<Option<T>> for Listable<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Listable::Scalar(v),
            None => Listable::None,
        }
    }
}

impl From<&str> for Listable<String> {
    fn from(value: &str) -> Self {
        Listable::Scalar(value.to_string())
    }
}

/// Check whether a value is list-like (an ordered, indexable sequence).
///
/// Scalars and absent values are not list-like; neither is bare text,
/// which only ever enters the model as a scalar.
pub fn is_list_like<T>(value: &Listable<T>) -> bool {
    matches!(value, Listable::List(_))
}

/// Normalize a value into list form.
///
/// * A sequence is returned unchanged (same elements, same order), so the
///   operation is idempotent.
/// * A scalar becomes a one-element list when `scalar2list` is set and is
///   returned unchanged otherwise.
/// * An absent value becomes the empty list when `none2list` is set and is
///   returned unchanged otherwise.
///
/// ```
/// use astroslice::{listify, Listable};
///
/// assert_eq!(listify(12, true, false), Listable::List(vec![12]));
/// assert_eq!(listify(12, false, false), Listable::Scalar(12));
/// assert_eq!(listify(vec![1, 2], true, false), Listable::List(vec![1, 2]));
/// ```
pub fn listify<T>(
    value: impl Into<Listable<T>>,
    scalar2list: bool,
    none2list: bool,
) -> Listable<T> {
    match value.into() {
        Listable::None => {
            if none2list {
                Listable::List(Vec::new())
            } else {
                Listable::None
            }
        }
        Listable::Scalar(s) => {
            if scalar2list {
                Listable::List(vec![s])
            } else {
                Listable::Scalar(s)
            }
        }
        list @ Listable::List(_) => list,
    }
}

/// Coerce a value into a numeric array of a given length.
///
/// The element type is cast through the generic target `U`, so callers
/// pick the output dtype explicitly, e.g.
/// `ndfy::<i64, f64>(20.into(), Some(2))`.
///
/// * An absent value becomes the empty array.
/// * A scalar broadcasts to `length` elements (or a length-1 array when no
///   length is requested).
/// * A sequence must already have `length` elements, or exactly one
///   element to broadcast; anything else is a
///   [`shape mismatch`](Error::ShapeMismatch).
pub fn ndfy<T, U>(value: Listable<T>, length: Option<usize>) -> Result<Array1<U>>
where
    U: From<T> + Clone,
{
    let items: Vec<U> = match value {
        Listable::None => Vec::new(),
        Listable::Scalar(s) => vec![U::from(s)],
        Listable::List(v) => v.into_iter().map(U::from).collect(),
    };

    let items = match length {
        Some(n) => broadcast(items, n)?,
        None => items,
    };

    Ok(Array1::from_vec(items))
}

/// Broadcast a vector to exactly `length` elements: already-correct
/// lengths pass through, a single element repeats, anything else is a
/// shape mismatch. Shared by [`ndfy`] and the bezel normalization path.
pub(crate) fn broadcast<T: Clone>(values: Vec<T>, length: usize) -> Result<Vec<T>> {
    if values.len() == length {
        Ok(values)
    } else if values.len() == 1 {
        let v = values.into_iter().next().expect("length checked above");
        Ok(vec![v; length])
    } else {
        Err(Error::ShapeMismatch {
            expected: length,
            got: values.len(),
        })
    }
}
