//! Rectangular, strided regions of an N-dimensional array.

use std::fmt;

use crate::errors::{Error, Result};
use crate::shape::DynIndex;

/// A stepped range of indices along one axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisRange {
    pub start: usize,
    /// End of the range (exclusive).
    pub stop: usize,
    pub step: usize,
}

impl AxisRange {
    pub fn new(start: usize, stop: usize, step: usize) -> AxisRange {
        AxisRange { start, stop, step }
    }

    /// Range selecting a single index.
    pub fn index(index: usize) -> AxisRange {
        AxisRange::new(index, index + 1, 1)
    }

    /// Number of indices selected.
    pub fn len(&self) -> usize {
        if self.stop <= self.start || self.step == 0 {
            0
        } else {
            (self.stop - self.start).div_ceil(self.step)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map the `i`th index in this range to an index in the source axis.
    pub fn source_index(&self, i: usize) -> usize {
        self.start + i * self.step
    }
}

impl fmt::Display for AxisRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.stop, self.step)
    }
}

/// Describes a slice of an array with a given source shape, as one
/// [`AxisRange`] per axis.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SliceND {
    source_shape: Vec<usize>,
    ranges: Vec<AxisRange>,
}

impl SliceND {
    /// Create a slice that selects every element of an array with the given
    /// shape.
    pub fn full(shape: &[usize]) -> SliceND {
        SliceND {
            source_shape: shape.to_vec(),
            ranges: shape.iter().map(|&size| AxisRange::new(0, size, 1)).collect(),
        }
    }

    /// Create a slice from explicit ranges, which are validated against
    /// `shape`.
    pub fn new(shape: &[usize], ranges: Vec<AxisRange>) -> Result<SliceND> {
        if ranges.len() != shape.len() {
            return Err(Error::invalid_arg(format!(
                "slice has {} axes but shape {:?} has {}",
                ranges.len(),
                shape,
                shape.len()
            )));
        }
        for (axis, (range, &size)) in ranges.iter().zip(shape).enumerate() {
            check_range(axis, range, size)?;
        }
        Ok(SliceND {
            source_shape: shape.to_vec(),
            ranges,
        })
    }

    /// Replace the range selected along `axis`.
    pub fn set_axis(&mut self, axis: usize, range: AxisRange) -> Result<()> {
        let Some(&size) = self.source_shape.get(axis) else {
            return Err(Error::invalid_arg(format!(
                "axis {} out of range for {} dims",
                axis,
                self.source_shape.len()
            )));
        };
        check_range(axis, &range, size)?;
        self.ranges[axis] = range;
        Ok(())
    }

    /// Return a copy of this slice narrowed to the `i`th index of its range
    /// along `axis`.
    ///
    /// Panics if `i` is not less than the length of that range.
    pub fn narrow(&self, axis: usize, i: usize) -> SliceND {
        let range = self.ranges[axis];
        assert!(i < range.len(), "index {} out of range {}", i, range);
        let mut narrowed = self.clone();
        narrowed.ranges[axis] = AxisRange::index(range.source_index(i));
        narrowed
    }

    pub fn ndim(&self) -> usize {
        self.ranges.len()
    }

    /// Shape of the array this slice was taken from.
    pub fn source_shape(&self) -> &[usize] {
        &self.source_shape
    }

    pub fn ranges(&self) -> &[AxisRange] {
        &self.ranges
    }

    pub fn range(&self, axis: usize) -> AxisRange {
        self.ranges[axis]
    }

    /// Shape of the region selected by this slice.
    pub fn shape(&self) -> DynIndex {
        self.ranges.iter().map(|r| r.len()).collect()
    }

    /// Number of elements in the selected region.
    pub fn len(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return true if this slice selects the whole source array.
    pub fn is_full(&self) -> bool {
        self.ranges
            .iter()
            .zip(&self.source_shape)
            .all(|(r, &size)| r.start == 0 && r.stop == size && r.step == 1)
    }
}

fn check_range(axis: usize, range: &AxisRange, size: usize) -> Result<()> {
    if range.step == 0 {
        return Err(Error::invalid_arg(format!("axis {} has a zero step", axis)));
    }
    if range.start > range.stop || range.stop > size {
        return Err(Error::invalid_arg(format!(
            "range {} is out of bounds for axis {} of size {}",
            range, axis, size
        )));
    }
    Ok(())
}

impl fmt::Display for SliceND {
    /// Produces strings such as `[0:4:1, 2:3:1]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", range)?;
        }
        write!(f, "]")
    }
}
