//! The interface shared by all iterators in this crate.

use crate::array::Dataset;
use crate::dual::DualIter;
use crate::select::{IndexSetIter, PredicateIter};
use crate::shape::DynIndex;
use crate::single::SingleIter;

/// A restartable cursor over the elements of one or more arrays.
///
/// Cursors start positioned before the first element. Each call to
/// [`advance`](Cursor::advance) moves to the next element and returns false
/// once there are no more. Exhaustion is sticky: further calls also return
/// false until [`reset`](Cursor::reset) is called.
pub trait Cursor {
    fn advance(&mut self) -> bool;

    /// Return to the state before the first element.
    fn reset(&mut self);

    /// Current multi-dimensional index, or `None` if the cursor is not on an
    /// element or does not track positions.
    fn position(&self) -> Option<DynIndex>;

    /// Physical index of the current element in the primary array.
    ///
    /// Only meaningful after `advance` has returned true.
    fn index(&self) -> usize;

    /// Current value of the primary array, if the cursor reads values.
    fn value(&self) -> Option<Scalar> {
        None
    }
}

/// Selects whether iterators read elements as floats or integers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ValueMode {
    #[default]
    Float,
    Integer,
}

/// An element value read through either the float or integer view.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    Float(f64),
    Int(i64),
}

impl Scalar {
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Float(x) => x,
            Scalar::Int(x) => x as f64,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Scalar::Float(x) => x as i64,
            Scalar::Int(x) => x,
        }
    }

    /// Read the element at `index` of `data` using the view selected by
    /// `mode`.
    #[inline]
    pub(crate) fn read<D: Dataset + ?Sized>(data: &D, index: usize, mode: ValueMode) -> Scalar {
        match mode {
            ValueMode::Float => Scalar::Float(data.get_f64(index)),
            ValueMode::Integer => Scalar::Int(data.get_i64(index)),
        }
    }
}

impl Default for Scalar {
    fn default() -> Scalar {
        Scalar::Float(0.)
    }
}

/// One of the iterator kinds in this crate, selected at construction.
pub enum AnyCursor<'a> {
    Dual(DualIter<'a>),
    Single(SingleIter<'a>),
    Predicate(PredicateIter<'a>),
    IndexSet(IndexSetIter<'a>),
}

macro_rules! dispatch {
    ($self:expr, $iter:ident => $body:expr) => {
        match $self {
            AnyCursor::Dual($iter) => $body,
            AnyCursor::Single($iter) => $body,
            AnyCursor::Predicate($iter) => $body,
            AnyCursor::IndexSet($iter) => $body,
        }
    };
}

impl Cursor for AnyCursor<'_> {
    fn advance(&mut self) -> bool {
        dispatch!(self, it => it.advance())
    }

    fn reset(&mut self) {
        dispatch!(self, it => Cursor::reset(it))
    }

    fn position(&self) -> Option<DynIndex> {
        dispatch!(self, it => Cursor::position(it))
    }

    fn index(&self) -> usize {
        dispatch!(self, it => Cursor::index(it))
    }

    fn value(&self) -> Option<Scalar> {
        dispatch!(self, it => Cursor::value(it))
    }
}

impl<'a> From<DualIter<'a>> for AnyCursor<'a> {
    fn from(it: DualIter<'a>) -> Self {
        AnyCursor::Dual(it)
    }
}

impl<'a> From<SingleIter<'a>> for AnyCursor<'a> {
    fn from(it: SingleIter<'a>) -> Self {
        AnyCursor::Single(it)
    }
}

impl<'a> From<PredicateIter<'a>> for AnyCursor<'a> {
    fn from(it: PredicateIter<'a>) -> Self {
        AnyCursor::Predicate(it)
    }
}

impl<'a> From<IndexSetIter<'a>> for AnyCursor<'a> {
    fn from(it: IndexSetIter<'a>) -> Self {
        AnyCursor::IndexSet(it)
    }
}
