//! Broadcast plans and the cursor that steps through them.

use std::iter::{zip, FusedIterator};

use smallvec::SmallVec;

use crate::array::DatasetMut;
use crate::cursor::Cursor;
use crate::shape::DynIndex;
use crate::strides::OperandPlan;

/// Where an iterator writes its results.
pub enum Output<'a> {
    /// The iterator has no output.
    None,

    /// Allocate a new array with the broadcast shape.
    Create,

    /// Write into a caller-supplied array, whose shape must be exactly the
    /// broadcast shape.
    Into(&'a mut dyn DatasetMut),
}

/// How the output of an iterator relates to its inputs.
///
/// This is decided once when the iterator is constructed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputKind {
    /// The output is the first input, and shares its offsets.
    AliasA,

    /// The output is the second input, and shares its offsets.
    AliasB,

    /// The output is a separate array supplied by the caller.
    Distinct,

    /// The output was allocated by the iterator.
    Created,
}

/// The immutable part of a broadcasting traversal: the common shape, and the
/// strides and deltas for each operand that has its own offset.
#[derive(Clone, Debug, PartialEq)]
pub struct BroadcastPlan {
    shape: DynIndex,
    len: usize,
    operands: SmallVec<[OperandPlan; 3]>,
    output: Option<OutputKind>,
}

impl BroadcastPlan {
    pub fn new(
        shape: DynIndex,
        operands: SmallVec<[OperandPlan; 3]>,
        output: Option<OutputKind>,
    ) -> BroadcastPlan {
        debug_assert!(operands.iter().all(|op| op.strides().len() == shape.len()));
        BroadcastPlan {
            len: shape.iter().product(),
            shape,
            operands,
            output,
        }
    }

    /// Plan a traversal of the index space of `shape` which tracks no
    /// operand offsets.
    pub fn positions_only(shape: &[usize]) -> BroadcastPlan {
        BroadcastPlan::new(SmallVec::from_slice(shape), SmallVec::new(), None)
    }

    /// The broadcast shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of steps in a full traversal.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn operands(&self) -> &[OperandPlan] {
        &self.operands
    }

    pub fn output_kind(&self) -> Option<OutputKind> {
        self.output
    }
}

/// Offset that operands are parked at once a traversal is exhausted.
const EXHAUSTED: isize = isize::MAX;

/// Mutable position and offsets for a traversal of a [`BroadcastPlan`].
///
/// After a reset the innermost position is `-1`, and each offset is one
/// innermost step before the operand's first item, so the first advance
/// lands on element zero.
#[derive(Clone, Debug)]
pub(crate) struct StepCursor {
    pos: SmallVec<[isize; 4]>,
    offsets: SmallVec<[isize; 3]>,
    started: bool,
    exhausted: bool,
}

impl StepCursor {
    pub fn new(plan: &BroadcastPlan) -> StepCursor {
        let mut cursor = StepCursor {
            pos: SmallVec::new(),
            offsets: SmallVec::new(),
            started: false,
            exhausted: false,
        };
        cursor.reset(plan);
        cursor
    }

    pub fn reset(&mut self, plan: &BroadcastPlan) {
        self.pos.clear();
        self.pos.resize(plan.ndim(), 0);
        self.offsets.clear();
        self.started = false;
        self.exhausted = false;

        if plan.is_empty() {
            self.park(plan);
            return;
        }

        match plan.ndim().checked_sub(1) {
            Some(inner) => {
                self.pos[inner] = -1;
                self.offsets.extend(
                    plan.operands()
                        .iter()
                        .map(|op| op.start() - op.strides()[inner]),
                );
            }
            None => {
                self.offsets
                    .extend(plan.operands().iter().map(|op| op.start() - op.step()));
            }
        }
    }

    /// Step to the next position. Returns false once all positions have been
    /// visited, and on every call after that.
    #[inline]
    pub fn advance(&mut self, plan: &BroadcastPlan) -> bool {
        if self.exhausted {
            return false;
        }

        let ndim = plan.ndim();
        if ndim == 0 {
            if self.started {
                self.park(plan);
                return false;
            }
            for (offset, op) in zip(self.offsets.iter_mut(), plan.operands()) {
                *offset += op.step();
            }
            self.started = true;
            return true;
        }

        let shape = plan.shape();
        let mut dim = ndim;
        while dim > 0 {
            dim -= 1;
            self.pos[dim] += 1;
            for (offset, op) in zip(self.offsets.iter_mut(), plan.operands()) {
                *offset += op.strides()[dim];
            }
            if self.pos[dim] as usize >= shape[dim] {
                self.pos[dim] = 0;
                for (offset, op) in zip(self.offsets.iter_mut(), plan.operands()) {
                    *offset -= op.deltas()[dim];
                }
            } else {
                self.started = true;
                return true;
            }
        }

        // Every dimension wrapped.
        self.park(plan);
        false
    }

    fn park(&mut self, plan: &BroadcastPlan) {
        self.exhausted = true;
        self.offsets.clear();
        self.offsets.resize(plan.operands().len(), EXHAUSTED);
    }

    /// Return true if the cursor is on an element, ie. it has been advanced
    /// since the last reset and is not exhausted.
    pub fn is_positioned(&self) -> bool {
        self.started && !self.exhausted
    }

    /// Current offset of the `i`th operand in the plan.
    #[inline]
    pub fn offset(&self, i: usize) -> isize {
        self.offsets[i]
    }

    pub fn position(&self) -> Option<DynIndex> {
        self.is_positioned()
            .then(|| self.pos.iter().map(|&p| p as usize).collect())
    }
}

/// Iterator over all the indices of a shape, in row-major order.
///
/// A rank-0 shape yields a single empty index. A shape with a zero-sized
/// dimension yields nothing.
#[derive(Clone, Debug)]
pub struct Positions {
    plan: BroadcastPlan,
    cursor: StepCursor,
}

impl Positions {
    pub fn new(shape: &[usize]) -> Positions {
        let plan = BroadcastPlan::positions_only(shape);
        let cursor = StepCursor::new(&plan);
        Positions { plan, cursor }
    }

    pub fn shape(&self) -> &[usize] {
        self.plan.shape()
    }
}

impl Cursor for Positions {
    fn advance(&mut self) -> bool {
        self.cursor.advance(&self.plan)
    }

    fn reset(&mut self) {
        self.cursor.reset(&self.plan)
    }

    fn position(&self) -> Option<DynIndex> {
        self.cursor.position()
    }

    /// Linear index of the current position in row-major order.
    fn index(&self) -> usize {
        let mut index = 0;
        for (&pos, &size) in zip(self.cursor.pos.iter(), self.plan.shape()) {
            index = index * size + pos.max(0) as usize;
        }
        index
    }
}

impl Iterator for Positions {
    type Item = DynIndex;

    fn next(&mut self) -> Option<DynIndex> {
        if self.cursor.advance(&self.plan) {
            self.cursor.position()
        } else {
            None
        }
    }
}

impl FusedIterator for Positions {}
