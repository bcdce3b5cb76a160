//! Computation of the strides used to walk an array as if it had a larger,
//! broadcast shape.

use smallvec::SmallVec;

use crate::array::Dataset;
use crate::errors::{Error, Result};
use crate::shape::{contiguous_strides, DynIndex};

/// Return the strides of a layout that broadcasts an array with shape
/// `shape` and strides `strides` to `target`.
///
/// `strides` of `None` means the array is contiguous with `item_size`
/// elements per item. Dimensions added by padding, and dimensions of size 1
/// that are broadcast to a larger size, get a stride of zero so that
/// stepping along them revisits the same element.
pub fn broadcast_strides(
    shape: &[usize],
    strides: Option<&[usize]>,
    item_size: usize,
    target: &[usize],
) -> Result<DynIndex> {
    if shape.len() > target.len() {
        return Err(Error::invalid_arg(format!(
            "cannot broadcast {} dims to {} dims",
            shape.len(),
            target.len()
        )));
    }

    let native = match strides {
        Some(strides) if strides.len() != shape.len() => {
            return Err(Error::invalid_arg(format!(
                "{} strides given for {} dims",
                strides.len(),
                shape.len()
            )));
        }
        Some(strides) => SmallVec::from_slice(strides),
        None => contiguous_strides(shape, item_size),
    };

    let pad = target.len() - shape.len();
    let mut result: DynIndex = SmallVec::with_capacity(target.len());
    result.resize(pad, 0);
    for (i, (&size, &stride)) in shape.iter().zip(native.iter()).enumerate() {
        let to = target[pad + i];
        let bcast_stride = if size == to {
            stride
        } else if size == 1 {
            0
        } else {
            return Err(Error::ShapeMismatch {
                dim: pad + i,
                first: to,
                second: size,
            });
        };
        result.push(bcast_stride);
    }
    Ok(result)
}

/// Per-operand part of a [`BroadcastPlan`](crate::BroadcastPlan).
///
/// Offsets are signed because iteration starts one step before the first
/// element.
#[derive(Clone, Debug, PartialEq)]
pub struct OperandPlan {
    /// Physical index of the first item.
    start: isize,

    /// Offset change for each step of a rank-0 iteration.
    step: isize,

    /// Offset change for each step along a dimension.
    strides: SmallVec<[isize; 4]>,

    /// `stride * size` for each dimension. Subtracted from the offset when
    /// the index in that dimension wraps back to zero.
    deltas: SmallVec<[isize; 4]>,
}

impl OperandPlan {
    /// Plan the traversal of `data` over the index space of `target`.
    pub fn new<D: Dataset + ?Sized>(data: &D, target: &[usize]) -> Result<OperandPlan> {
        let strides = broadcast_strides(data.shape(), data.strides(), data.item_size(), target)?;
        Ok(OperandPlan::from_strides(
            data.offset(),
            data.item_size(),
            &strides,
            target,
        ))
    }

    pub(crate) fn from_strides(
        start: usize,
        item_size: usize,
        strides: &[usize],
        target: &[usize],
    ) -> OperandPlan {
        let strides: SmallVec<[isize; 4]> = strides.iter().map(|&s| s as isize).collect();
        let deltas = strides
            .iter()
            .zip(target)
            .map(|(&stride, &size)| stride * size as isize)
            .collect();
        OperandPlan {
            start: start as isize,
            step: item_size as isize,
            strides,
            deltas,
        }
    }

    pub fn start(&self) -> isize {
        self.start
    }

    pub fn step(&self) -> isize {
        self.step
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn deltas(&self) -> &[isize] {
        &self.deltas
    }
}

#[cfg(test)]
mod tests {
    use super::{broadcast_strides, OperandPlan};
    use crate::array::NdArray;
    use crate::errors::Error;
    use crate::test_util::{arange, TestCases};

    #[test]
    fn test_broadcast_strides() {
        #[derive(Debug)]
        struct Case {
            shape: Vec<usize>,
            strides: Option<Vec<usize>>,
            item_size: usize,
            target: Vec<usize>,
            expected: Vec<usize>,
        }

        let cases = [
            Case {
                shape: vec![3, 1],
                strides: None,
                item_size: 1,
                target: vec![3, 4],
                expected: vec![1, 0],
            },
            Case {
                shape: vec![4],
                strides: None,
                item_size: 1,
                target: vec![2, 3, 4],
                expected: vec![0, 0, 1],
            },
            Case {
                shape: vec![2, 3],
                strides: None,
                item_size: 2,
                target: vec![2, 3],
                expected: vec![6, 2],
            },
            Case {
                shape: vec![2, 3],
                strides: Some(vec![1, 2]),
                item_size: 1,
                target: vec![5, 2, 3],
                expected: vec![0, 1, 2],
            },
            Case {
                shape: vec![],
                strides: None,
                item_size: 1,
                target: vec![2, 2],
                expected: vec![0, 0],
            },
            // A size-1 dim that stays size 1 keeps its native stride.
            Case {
                shape: vec![1, 3],
                strides: Some(vec![7, 1]),
                item_size: 1,
                target: vec![1, 3],
                expected: vec![7, 1],
            },
        ];

        cases.test_each(|case| {
            let strides = broadcast_strides(
                &case.shape,
                case.strides.as_deref(),
                case.item_size,
                &case.target,
            )
            .unwrap();
            assert_eq!(strides.as_slice(), case.expected);
        })
    }

    #[test]
    fn test_broadcast_strides_errors() {
        assert!(matches!(
            broadcast_strides(&[2, 3], None, 1, &[3]),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            broadcast_strides(&[2, 3], Some(&[3]), 1, &[2, 3]),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            broadcast_strides(&[3], Some(&[1, 1]), 1, &[2, 3]),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            broadcast_strides(&[2, 3], None, 1, &[2, 4]),
            Err(Error::ShapeMismatch {
                dim: 1,
                first: 4,
                second: 3
            })
        ));
    }

    #[test]
    fn test_operand_plan() {
        let x = arange(&[3, 1]);
        let plan = OperandPlan::new(&x, &[3, 4]).unwrap();
        assert_eq!(plan.start(), 0);
        assert_eq!(plan.step(), 1);
        assert_eq!(plan.strides(), &[1, 0]);
        assert_eq!(plan.deltas(), &[3, 0]);

        let s = NdArray::scalar(1.);
        let plan = OperandPlan::new(&s, &[]).unwrap();
        assert!(plan.strides().is_empty());
        assert_eq!(plan.step(), 1);
    }
}
