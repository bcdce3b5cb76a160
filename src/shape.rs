//! Shape algebra for broadcasting.
//!
//! Broadcasting works by left-padding shapes with 1s so they have the same
//! length, then matching dimensions. In each dimension the sizes are
//! compatible if at most one distinct size other than 1 appears, and that
//! size (or 1) is the size of the dimension in the result.
//!
//! See <https://numpy.org/doc/stable/user/basics.broadcasting.html>.

use std::borrow::Cow;

use smallvec::{smallvec, SmallVec};

use crate::errors::{Error, Result};

/// The index type used for shapes, strides and positions.
pub type DynIndex = SmallVec<[usize; 4]>;

/// Compute the shape that results from broadcasting all the shapes in
/// `shapes` together. `None` entries are skipped.
///
/// Returns [`Error::InvalidArgument`] if there are no shapes and
/// [`Error::ShapeMismatch`] if two shapes have conflicting sizes.
pub fn broadcast_shapes(shapes: &[Option<&[usize]>]) -> Result<DynIndex> {
    let ndim = shapes
        .iter()
        .flatten()
        .map(|s| s.len())
        .max()
        .ok_or_else(|| Error::invalid_arg("no shapes to broadcast"))?;

    let mut result: DynIndex = smallvec![1; ndim];
    for shape in shapes.iter().flatten() {
        let pad = ndim - shape.len();
        for (i, &size) in shape.iter().enumerate() {
            let dim = pad + i;
            let current = result[dim];
            if size == current || size == 1 {
                continue;
            } else if current == 1 {
                result[dim] = size;
            } else {
                return Err(Error::ShapeMismatch {
                    dim,
                    first: current,
                    second: size,
                });
            }
        }
    }

    Ok(result)
}

/// Broadcast two shapes together.
pub fn broadcast_pair(a: &[usize], b: &[usize]) -> Result<DynIndex> {
    broadcast_shapes(&[Some(a), Some(b)])
}

/// Return true if `from` can be broadcast to exactly `to`.
pub fn can_broadcast_to(from: &[usize], to: &[usize]) -> bool {
    if from.len() > to.len() {
        return false;
    }
    let pad = to.len() - from.len();
    from.iter()
        .zip(&to[pad..])
        .all(|(&from, &to)| from == to || from == 1)
}

/// Left-pad `shape` with `n` 1s.
///
/// When `n` is zero the input is returned without copying.
pub fn pad_shape(shape: &[usize], n: usize) -> Cow<'_, [usize]> {
    if n == 0 {
        return Cow::Borrowed(shape);
    }
    let mut padded = Vec::with_capacity(shape.len() + n);
    padded.resize(n, 1);
    padded.extend_from_slice(shape);
    Cow::Owned(padded)
}

/// Return the strides, in storage elements, of a contiguous row-major array
/// with a given shape and `item_size` elements per item.
pub fn contiguous_strides(shape: &[usize], item_size: usize) -> DynIndex {
    let mut strides: DynIndex = smallvec![0; shape.len()];
    let mut stride = item_size;
    for (dim, &size) in shape.iter().enumerate().rev() {
        strides[dim] = stride;
        stride *= size;
    }
    strides
}

/// Check that the shape of an output supplied by the caller is exactly the
/// broadcast shape. Outputs are never reshaped to fit.
pub fn check_output_shape(expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected != actual {
        return Err(Error::incompatible(format!(
            "output shape {:?} does not match broadcast shape {:?}",
            actual, expected
        )));
    }
    Ok(())
}

/// Check that a caller-supplied output with shape `out` can receive values
/// broadcast from `shape`.
pub fn check_output_broadcast(shape: &[usize], out: &[usize]) -> Result<()> {
    if !can_broadcast_to(shape, out) {
        return Err(Error::incompatible(format!(
            "output shape {:?} cannot hold broadcast shape {:?}",
            out, shape
        )));
    }
    Ok(())
}
