//! Operand and output storage shared by the broadcasting iterators.

use crate::array::{Dataset, DatasetMut, NdArray};
use crate::dtype::DataType;
use crate::errors::{Error, Result};
use crate::plan::OutputKind;

/// An array read by an iterator. Exclusive operands are also written to,
/// when they are the iterator's output.
pub(crate) enum Operand<'a> {
    Shared(&'a dyn Dataset),
    Exclusive(&'a mut dyn DatasetMut),
}

impl<'a> Operand<'a> {
    pub fn as_mut(&mut self) -> Option<&mut (dyn DatasetMut + 'a)> {
        match self {
            Operand::Shared(_) => None,
            Operand::Exclusive(data) => Some(&mut **data),
        }
    }
}

macro_rules! forward {
    ($self:expr, $data:ident => $body:expr) => {
        match $self {
            Operand::Shared($data) => $body,
            Operand::Exclusive($data) => $body,
        }
    };
}

impl Dataset for Operand<'_> {
    fn dtype(&self) -> DataType {
        forward!(self, d => d.dtype())
    }

    fn shape(&self) -> &[usize] {
        forward!(self, d => d.shape())
    }

    fn strides(&self) -> Option<&[usize]> {
        forward!(self, d => d.strides())
    }

    fn offset(&self) -> usize {
        forward!(self, d => d.offset())
    }

    fn item_size(&self) -> usize {
        forward!(self, d => d.item_size())
    }

    #[inline]
    fn get_f64(&self, index: usize) -> f64 {
        forward!(self, d => d.get_f64(index))
    }

    #[inline]
    fn get_i64(&self, index: usize) -> i64 {
        forward!(self, d => d.get_i64(index))
    }

    #[inline]
    fn get_bool(&self, index: usize) -> bool {
        forward!(self, d => d.get_bool(index))
    }
}

/// The resolved output of an iterator.
pub(crate) enum OutputSlot<'a> {
    None,
    AliasA,
    AliasB,
    Distinct(Operand<'a>),
    Created(NdArray),
}

impl OutputSlot<'_> {
    pub fn kind(&self) -> Option<OutputKind> {
        match self {
            OutputSlot::None => None,
            OutputSlot::AliasA => Some(OutputKind::AliasA),
            OutputSlot::AliasB => Some(OutputKind::AliasB),
            OutputSlot::Distinct(_) => Some(OutputKind::Distinct),
            OutputSlot::Created(_) => Some(OutputKind::Created),
        }
    }
}

/// Return an error unless the items of `x` and `y` can be combined.
///
/// Item sizes are compatible if they are equal, if either is 1, or if either
/// array holds a single item, which is then applied to every element of the
/// other's items.
pub(crate) fn check_item_sizes<X, Y>(x: &X, y: &Y) -> Result<()>
where
    X: Dataset + ?Sized,
    Y: Dataset + ?Sized,
{
    let (wx, wy) = (x.item_size(), y.item_size());
    if wx == wy || wx == 1 || wy == 1 || x.len() == 1 || y.len() == 1 {
        return Ok(());
    }
    Err(Error::incompatible(format!(
        "item sizes {} and {} cannot be combined",
        wx, wy
    )))
}
