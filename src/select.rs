//! Iterators which visit a subset of an array's items: those selected by a
//! boolean mask, or those at a list of indices.

use std::iter::FusedIterator;

use smallvec::smallvec;
use tracing::debug;

use crate::array::{check_numeric, Dataset};
use crate::cursor::{Cursor, Scalar, ValueMode};
use crate::errors::{Error, Result};
use crate::plan::{BroadcastPlan, Output, StepCursor};
use crate::shape::DynIndex;
use crate::single::{SingleIter, SingleOptions};
use crate::strides::OperandPlan;

/// Iterator over the items of `data` whose corresponding `mask` element
/// equals a target value.
///
/// `data` and `mask` are walked in row-major order in lock-step, so they
/// must have the same number of elements but need not have the same shape.
pub struct PredicateIter<'a> {
    data: SingleIter<'a>,
    mask: &'a dyn Dataset,
    mask_plan: BroadcastPlan,
    mask_cursor: StepCursor,
    target: bool,
}

impl<'a> PredicateIter<'a> {
    /// Create an iterator over the items of `data` where `mask` is true.
    pub fn new(data: &'a dyn Dataset, mask: &'a dyn Dataset) -> Result<PredicateIter<'a>> {
        PredicateIter::with_target(data, mask, true)
    }

    /// Create an iterator over the items of `data` where `mask` equals
    /// `target`.
    pub fn with_target(
        data: &'a dyn Dataset,
        mask: &'a dyn Dataset,
        target: bool,
    ) -> Result<PredicateIter<'a>> {
        if data.len() != mask.len() {
            return Err(Error::incompatible(format!(
                "data has {} elements but mask has {}",
                data.len(),
                mask.len()
            )));
        }
        check_numeric(mask)?;
        let data = SingleIter::new(data, Output::None, SingleOptions::default())?;
        let mask_op = OperandPlan::new(mask, mask.shape())?;
        let mask_plan = BroadcastPlan::new(
            DynIndex::from_slice(mask.shape()),
            smallvec![mask_op],
            None,
        );
        let mask_cursor = StepCursor::new(&mask_plan);
        debug!(shape = ?data.shape(), target, "built predicate iterator");

        Ok(PredicateIter {
            data,
            mask,
            mask_plan,
            mask_cursor,
            target,
        })
    }

    /// Move to the next selected item.
    pub fn advance(&mut self) -> bool {
        loop {
            let data_ok = self.data.advance();
            let mask_ok = self.mask_cursor.advance(&self.mask_plan);
            if !data_ok || !mask_ok {
                return false;
            }
            if self.mask.get_bool(self.mask_index()) == self.target {
                return true;
            }
        }
    }

    pub fn reset(&mut self) {
        self.data.reset();
        self.mask_cursor.reset(&self.mask_plan);
    }

    /// Position of the current item in `data`.
    pub fn position(&self) -> Option<DynIndex> {
        self.data.position()
    }

    /// Physical index of the current item in `data`.
    pub fn data_index(&self) -> usize {
        self.data.a_index()
    }

    /// Physical index of the mask element for the current item.
    pub fn mask_index(&self) -> usize {
        self.mask_cursor.offset(0) as usize
    }

    pub fn set_value_mode(&mut self, mode: ValueMode) {
        self.data.set_value_mode(mode)
    }

    pub fn value(&self) -> Scalar {
        self.data.a_value()
    }

    pub fn data_f64(&self) -> f64 {
        self.data.a_f64()
    }

    pub fn data_i64(&self) -> i64 {
        self.data.a_i64()
    }
}

impl Cursor for PredicateIter<'_> {
    fn advance(&mut self) -> bool {
        PredicateIter::advance(self)
    }

    fn reset(&mut self) {
        PredicateIter::reset(self)
    }

    fn position(&self) -> Option<DynIndex> {
        PredicateIter::position(self)
    }

    fn index(&self) -> usize {
        self.data_index()
    }

    fn value(&self) -> Option<Scalar> {
        Some(PredicateIter::value(self))
    }
}

/// Iterator which converts a list of possibly negative indices into a
/// dimension of size `length` into physical offsets.
///
/// Index `i` yields `i.rem_euclid(length) * item_stride`, so `-1` refers to
/// the last entry.
pub struct IndexSetIter<'a> {
    indices: SingleIter<'a>,
    length: usize,
    item_stride: usize,
    current: usize,
}

impl<'a> IndexSetIter<'a> {
    /// Create an iterator over `indices`, which are read as integers.
    ///
    /// Fails if `item_stride` is zero or any index is outside
    /// `[-length, length)`.
    pub fn new(
        indices: &'a dyn Dataset,
        length: usize,
        item_stride: usize,
    ) -> Result<IndexSetIter<'a>> {
        if item_stride == 0 {
            return Err(Error::invalid_arg("item stride must be positive"));
        }

        let mut indices = SingleIter::new(indices, Output::None, SingleOptions::default())?;
        indices.set_value_mode(ValueMode::Integer);

        let bound = length as i64;
        while indices.advance() {
            let index = indices.a_i64();
            if index < -bound || index >= bound {
                return Err(Error::invalid_arg(format!(
                    "index {} is out of range for length {}",
                    index, length
                )));
            }
        }
        indices.reset();

        Ok(IndexSetIter {
            indices,
            length,
            item_stride,
            current: 0,
        })
    }

    pub fn advance(&mut self) -> bool {
        if !self.indices.advance() {
            return false;
        }
        let index = self.indices.a_i64().rem_euclid(self.length as i64) as usize;
        self.current = index * self.item_stride;
        true
    }

    pub fn reset(&mut self) {
        self.indices.reset();
        self.current = 0;
    }

    /// Offset of the current index.
    pub fn index(&self) -> usize {
        self.current
    }
}

impl Cursor for IndexSetIter<'_> {
    fn advance(&mut self) -> bool {
        IndexSetIter::advance(self)
    }

    fn reset(&mut self) {
        IndexSetIter::reset(self)
    }

    fn position(&self) -> Option<DynIndex> {
        None
    }

    fn index(&self) -> usize {
        self.current
    }
}

impl Iterator for IndexSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        IndexSetIter::advance(self).then_some(self.current)
    }
}

impl FusedIterator for IndexSetIter<'_> {}
