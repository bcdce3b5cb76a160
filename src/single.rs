//! Iteration over the items of a single array, optionally broadcast into an
//! output.

use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace};

use crate::array::{check_numeric, Dataset, DatasetMut, NdArray};
use crate::config::config;
use crate::cursor::{Cursor, Scalar, ValueMode};
use crate::dtype::DataType;
use crate::errors::Result;
use crate::operand::{check_item_sizes, Operand, OutputSlot};
use crate::plan::{BroadcastPlan, Output, OutputKind, StepCursor};
use crate::shape::{check_output_broadcast, DynIndex};
use crate::strides::OperandPlan;

/// Options which control the type of the output created by a [`SingleIter`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SingleOptions {
    /// Keep integer and boolean input types for a created output. Otherwise
    /// such outputs use `float_type`.
    pub allow_integer: bool,

    /// Keep complex input types for a created output. Otherwise the output
    /// holds the real component type, with half the item size.
    pub allow_complex: bool,

    /// Float type used for created outputs of integer inputs when
    /// `allow_integer` is false.
    pub float_type: DataType,
}

impl SingleOptions {
    /// Options that give a created output the same type and item size as
    /// the input.
    pub fn preserve() -> SingleOptions {
        SingleOptions {
            allow_integer: true,
            allow_complex: true,
            ..SingleOptions::default()
        }
    }

    /// Return the element type and item size of an output created for an
    /// input of type `dtype` with items of `item_size` elements.
    fn output_type(&self, dtype: DataType, item_size: usize) -> (DataType, usize) {
        if dtype.is_complex() {
            if self.allow_complex {
                (dtype, item_size)
            } else {
                (dtype.real_type(), (item_size / 2).max(1))
            }
        } else if dtype.is_integer() || dtype.is_bool() {
            if self.allow_integer {
                (dtype, item_size)
            } else {
                (self.float_type, item_size)
            }
        } else {
            (dtype, item_size)
        }
    }
}

impl Default for SingleOptions {
    fn default() -> SingleOptions {
        SingleOptions {
            allow_integer: false,
            allow_complex: false,
            float_type: config().default_float_type,
        }
    }
}

enum Target<'a> {
    None,
    Create(SingleOptions),
    InPlace,
    Distinct(&'a mut dyn DatasetMut),
}

/// Iterator over the items of an array `a`, with an optional output.
///
/// When there is an output, `a` is broadcast to the output's shape.
pub struct SingleIter<'a> {
    a: Operand<'a>,
    output: OutputSlot<'a>,
    plan: BroadcastPlan,
    cursor: StepCursor,
    mode: ValueMode,
    value: Scalar,
    stale: bool,
}

impl<'a> SingleIter<'a> {
    pub fn new(
        a: &'a dyn Dataset,
        output: Output<'a>,
        options: SingleOptions,
    ) -> Result<SingleIter<'a>> {
        let target = match output {
            Output::None => Target::None,
            Output::Create => Target::Create(options),
            Output::Into(out) => Target::Distinct(out),
        };
        SingleIter::build(Operand::Shared(a), target)
    }

    /// Create an iterator which writes its results back into `a`.
    pub fn in_place(a: &'a mut dyn DatasetMut) -> Result<SingleIter<'a>> {
        SingleIter::build(Operand::Exclusive(a), Target::InPlace)
    }

    fn build(a: Operand<'a>, target: Target<'a>) -> Result<SingleIter<'a>> {
        check_numeric(&a)?;

        let shape = match &target {
            Target::Distinct(out) => {
                check_numeric(&**out)?;
                check_item_sizes(&a, &**out)?;
                check_output_broadcast(a.shape(), out.shape())?;
                SmallVec::from_slice(out.shape())
            }
            _ => SmallVec::from_slice(a.shape()),
        };

        let mut operands: SmallVec<[OperandPlan; 3]> = smallvec![OperandPlan::new(&a, &shape)?];
        let output = match target {
            Target::None => OutputSlot::None,
            Target::InPlace => OutputSlot::AliasA,
            Target::Distinct(out) => {
                operands.push(OperandPlan::new(&*out, &shape)?);
                OutputSlot::Distinct(Operand::Exclusive(out))
            }
            Target::Create(options) => {
                let (dtype, item_size) = options.output_type(a.dtype(), a.item_size());
                let out = NdArray::zeros(dtype, item_size, &shape)?;
                trace!(%dtype, item_size, shape = ?shape.as_slice(), "allocated output");
                operands.push(OperandPlan::new(&out, &shape)?);
                OutputSlot::Created(out)
            }
        };

        let plan = BroadcastPlan::new(shape, operands, output.kind());
        debug!(
            a = ?a.shape(),
            shape = ?plan.shape(),
            output = ?plan.output_kind(),
            "built single broadcast plan"
        );
        let cursor = StepCursor::new(&plan);
        let mut iter = SingleIter {
            a,
            output,
            plan,
            cursor,
            mode: ValueMode::default(),
            value: Scalar::default(),
            stale: true,
        };
        iter.load_single_item();
        Ok(iter)
    }

    pub fn plan(&self) -> &BroadcastPlan {
        &self.plan
    }

    pub fn shape(&self) -> &[usize] {
        self.plan.shape()
    }

    pub fn output_kind(&self) -> Option<OutputKind> {
        self.plan.output_kind()
    }

    #[inline]
    pub fn advance(&mut self) -> bool {
        let prev = self.cursor.offset(0);
        if !self.cursor.advance(&self.plan) {
            return false;
        }
        if self.stale || self.cursor.offset(0) != prev {
            self.refresh();
        }
        true
    }

    pub fn reset(&mut self) {
        self.cursor.reset(&self.plan);
        self.stale = true;
        self.load_single_item();
    }

    pub fn position(&self) -> Option<DynIndex> {
        self.cursor.position()
    }

    pub fn value_mode(&self) -> ValueMode {
        self.mode
    }

    /// Choose whether values are read as floats or integers. The cached value
    /// is re-read immediately.
    pub fn set_value_mode(&mut self, mode: ValueMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        if self.cursor.is_positioned() {
            self.refresh();
        } else {
            self.stale = true;
            self.load_single_item();
        }
    }

    pub fn a_value(&self) -> Scalar {
        self.value
    }

    #[inline]
    pub fn a_f64(&self) -> f64 {
        self.value.as_f64()
    }

    #[inline]
    pub fn a_i64(&self) -> i64 {
        self.value.as_i64()
    }

    #[inline]
    pub fn a_index(&self) -> usize {
        self.cursor.offset(0) as usize
    }

    #[inline]
    pub fn output_index(&self) -> Option<usize> {
        match self.output {
            OutputSlot::None => None,
            OutputSlot::AliasA | OutputSlot::AliasB => Some(self.a_index()),
            OutputSlot::Distinct(_) | OutputSlot::Created(_) => {
                Some(self.cursor.offset(1) as usize)
            }
        }
    }

    pub fn a(&self) -> &dyn Dataset {
        &self.a
    }

    pub fn output(&self) -> Option<&dyn Dataset> {
        match &self.output {
            OutputSlot::None => None,
            OutputSlot::AliasA | OutputSlot::AliasB => Some(&self.a),
            OutputSlot::Distinct(out) => Some(out),
            OutputSlot::Created(out) => Some(out),
        }
    }

    pub fn output_mut(&mut self) -> Option<&mut (dyn DatasetMut + 'a)> {
        match &mut self.output {
            OutputSlot::None => None,
            OutputSlot::AliasA | OutputSlot::AliasB => self.a.as_mut(),
            OutputSlot::Distinct(out) => out.as_mut(),
            OutputSlot::Created(out) => Some(out),
        }
    }

    /// Write `value` to the first element of the current output item.
    pub fn set_output_f64(&mut self, value: f64) {
        if !self.cursor.is_positioned() {
            return;
        }
        if let Some(index) = self.output_index() {
            if let Some(out) = self.output_mut() {
                out.set_f64(index, value);
            }
        }
    }

    pub fn set_output_i64(&mut self, value: i64) {
        if !self.cursor.is_positioned() {
            return;
        }
        if let Some(index) = self.output_index() {
            if let Some(out) = self.output_mut() {
                out.set_i64(index, value);
            }
        }
    }

    /// Consume the iterator and return the output array it allocated, if
    /// any.
    pub fn into_output(self) -> Option<NdArray> {
        match self.output {
            OutputSlot::Created(out) => Some(out),
            _ => None,
        }
    }

    #[inline]
    fn refresh(&mut self) {
        self.value = Scalar::read(&self.a, self.a_index(), self.mode);
        self.stale = false;
    }

    fn load_single_item(&mut self) {
        if !self.plan.is_empty() && self.a.len() == 1 {
            let start = self.plan.operands()[0].start() as usize;
            self.value = Scalar::read(&self.a, start, self.mode);
            self.stale = false;
        }
    }
}

impl Cursor for SingleIter<'_> {
    fn advance(&mut self) -> bool {
        SingleIter::advance(self)
    }

    fn reset(&mut self) {
        SingleIter::reset(self)
    }

    fn position(&self) -> Option<DynIndex> {
        SingleIter::position(self)
    }

    fn index(&self) -> usize {
        self.a_index()
    }

    fn value(&self) -> Option<Scalar> {
        Some(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::{SingleIter, SingleOptions};
    use crate::array::{Dataset, NdArray};
    use crate::cursor::{Scalar, ValueMode};
    use crate::dtype::DataType;
    use crate::errors::Error;
    use crate::plan::{Output, OutputKind};
    use crate::slice::{AxisRange, SliceND};
    use crate::storage::Buffer;
    use crate::test_util::{arange, arange_i64, TestCases};

    fn a_indices(iter: &mut SingleIter) -> Vec<usize> {
        let mut out = Vec::new();
        while iter.advance() {
            out.push(iter.a_index());
        }
        out
    }

    #[test]
    fn test_iterate_view() {
        let x = arange(&[3, 4]);
        let slice = SliceND::new(&[3, 4], vec![AxisRange::new(0, 3, 2), AxisRange::new(1, 4, 1)])
            .unwrap();
        let view = x.view(&slice).unwrap();
        let mut iter = SingleIter::new(&view, Output::None, SingleOptions::default()).unwrap();
        assert_eq!(a_indices(&mut iter), [1, 2, 3, 9, 10, 11]);
        assert_eq!(iter.output_index(), None);
    }

    #[test]
    fn test_created_output_type() {
        #[derive(Debug)]
        struct Case {
            dtype: DataType,
            item_size: usize,
            options: SingleOptions,
            expected: (DataType, usize),
        }

        let float32 = SingleOptions {
            allow_integer: false,
            allow_complex: false,
            float_type: DataType::Float32,
        };

        let cases = [
            Case {
                dtype: DataType::Int32,
                item_size: 1,
                options: float32,
                expected: (DataType::Float32, 1),
            },
            Case {
                dtype: DataType::Bool,
                item_size: 1,
                options: float32,
                expected: (DataType::Float32, 1),
            },
            Case {
                dtype: DataType::Int16,
                item_size: 3,
                options: SingleOptions {
                    allow_integer: true,
                    ..float32
                },
                expected: (DataType::Int16, 3),
            },
            Case {
                dtype: DataType::Float64,
                item_size: 1,
                options: float32,
                expected: (DataType::Float64, 1),
            },
            Case {
                dtype: DataType::Complex128,
                item_size: 2,
                options: float32,
                expected: (DataType::Float64, 1),
            },
            Case {
                dtype: DataType::Complex64,
                item_size: 4,
                options: SingleOptions {
                    allow_complex: true,
                    ..float32
                },
                expected: (DataType::Complex64, 4),
            },
        ];

        cases.test_each(|case| {
            let input = NdArray::zeros(case.dtype, case.item_size, &[2]).unwrap();
            let iter = SingleIter::new(&input, Output::Create, case.options).unwrap();
            let out = iter.into_output().unwrap();
            assert_eq!((out.dtype(), out.item_size()), case.expected);
            assert_eq!(out.shape(), &[2]);
        })
    }

    #[test]
    fn test_complex_to_real_output() {
        let x = NdArray::from_complex(&[(3., 4.), (0., -2.)], &[2]).unwrap();
        let mut iter = SingleIter::new(
            &x,
            Output::Create,
            SingleOptions {
                allow_complex: false,
                ..SingleOptions::preserve()
            },
        )
        .unwrap();
        while iter.advance() {
            let index = iter.a_index();
            let (re, im) = (iter.a().get_f64(index), iter.a().get_f64(index + 1));
            iter.set_output_f64(re.hypot(im));
        }
        let out = iter.into_output().unwrap();
        assert_eq!(out.dtype(), DataType::Float64);
        assert_eq!(out.to_vec_f64(), [5., 2.]);
    }

    #[test]
    fn test_in_place() {
        let mut x = arange_i64(-2, &[2, 2]);
        {
            let mut iter = SingleIter::in_place(&mut x).unwrap();
            iter.set_value_mode(ValueMode::Integer);
            assert_eq!(iter.output_kind(), Some(OutputKind::AliasA));
            while iter.advance() {
                assert_eq!(iter.output_index(), Some(iter.a_index()));
                let square = iter.a_i64() * iter.a_i64();
                iter.set_output_i64(square);
            }
            assert!(iter.into_output().is_none());
        }
        assert_eq!(x.to_vec_i64(), [4, 1, 0, 1]);
    }

    #[test]
    fn test_broadcast_into_output() {
        let x = arange(&[3]);
        let mut out = NdArray::zeros(DataType::Float64, 1, &[2, 3]).unwrap();
        let mut iter = SingleIter::new(&x, Output::Into(&mut out), SingleOptions::default())
            .unwrap();
        assert_eq!(iter.shape(), &[2, 3]);
        let mut seen = Vec::new();
        while iter.advance() {
            seen.push((iter.a_index(), iter.output_index().unwrap()));
            let value = iter.a_f64() + 1.;
            iter.set_output_f64(value);
        }
        assert_eq!(seen, [(0, 0), (1, 1), (2, 2), (0, 3), (1, 4), (2, 5)]);
        drop(iter);
        assert_eq!(out.to_vec_f64(), [1., 2., 3., 1., 2., 3.]);
    }

    #[test]
    fn test_output_errors() {
        let x = arange(&[2, 3]);
        let mut small = NdArray::zeros(DataType::Float64, 1, &[3]).unwrap();
        assert!(matches!(
            SingleIter::new(&x, Output::Into(&mut small), SingleOptions::default()),
            Err(Error::IncompatibleOperands { .. })
        ));

        let mut wrong = NdArray::zeros(DataType::Float64, 1, &[2, 4]).unwrap();
        assert!(matches!(
            SingleIter::new(&x, Output::Into(&mut wrong), SingleOptions::default()),
            Err(Error::IncompatibleOperands { .. })
        ));

        let pairs = NdArray::from_buffer(DataType::Float64, 2, &[2], Buffer::Float64(vec![0.; 4]))
            .unwrap();
        let mut triples = NdArray::zeros(DataType::Float64, 3, &[2]).unwrap();
        assert!(matches!(
            SingleIter::new(&pairs, Output::Into(&mut triples), SingleOptions::default()),
            Err(Error::IncompatibleOperands { .. })
        ));

        let objects = NdArray::zeros(DataType::Object, 1, &[2]).unwrap();
        assert!(matches!(
            SingleIter::new(&objects, Output::None, SingleOptions::default()),
            Err(Error::UnsupportedElementAccess { .. })
        ));
    }

    #[test]
    fn test_scalar_input() {
        let s = NdArray::scalar(4.5);
        let mut iter = SingleIter::new(&s, Output::None, SingleOptions::default()).unwrap();
        assert_eq!(iter.a_value(), Scalar::Float(4.5));
        assert!(iter.advance());
        assert_eq!(iter.a_f64(), 4.5);
        assert!(!iter.advance());
        assert!(!iter.advance());

        iter.reset();
        assert_eq!(a_indices(&mut iter), [0]);
    }

    #[test]
    fn test_empty_input() {
        let x = arange(&[3, 0]);
        let mut iter = SingleIter::new(&x, Output::Create, SingleOptions::default()).unwrap();
        assert!(!iter.advance());
        assert_eq!(iter.into_output().unwrap().shape(), &[3, 0]);
    }
}
