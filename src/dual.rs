//! Lock-step iteration over two arrays broadcast against each other.

use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace};

use crate::array::{check_numeric, Dataset, DatasetMut, NdArray};
use crate::cursor::{Cursor, Scalar, ValueMode};
use crate::dtype::promote;
use crate::errors::{Error, Result};
use crate::operand::{check_item_sizes, Operand, OutputSlot};
use crate::plan::{BroadcastPlan, Output, OutputKind, StepCursor};
use crate::shape::{broadcast_shapes, check_output_broadcast, check_output_shape, DynIndex};
use crate::strides::OperandPlan;

/// Output requested by a [`DualIter`] constructor.
enum Target<'a> {
    None,
    Create,
    AliasA,
    AliasB,
    Distinct(&'a mut dyn DatasetMut),
}

/// Iterator over pairs of items from two arrays `a` and `b`, broadcast to a
/// common shape, with an optional output of that shape.
///
/// The iterator starts before the first element. After each successful call
/// to [`advance`](DualIter::advance), the physical indices of the current
/// items are available from [`a_index`](DualIter::a_index),
/// [`b_index`](DualIter::b_index) and [`output_index`](DualIter::output_index),
/// and their first elements from the value accessors.
///
/// ```
/// use ndbroadcast::{DualIter, NdArray, Output};
///
/// let a = NdArray::from_f64(vec![1., 2., 3.], &[3, 1]).unwrap();
/// let b = NdArray::from_f64(vec![10., 20.], &[2]).unwrap();
/// let mut iter = DualIter::new(&a, &b, Output::Create).unwrap();
/// while iter.advance() {
///     let sum = iter.a_f64() + iter.b_f64();
///     iter.set_output_f64(sum);
/// }
/// let sums = iter.into_output().unwrap();
/// assert_eq!(sums.to_vec_f64(), [11., 21., 12., 22., 13., 23.]);
/// ```
pub struct DualIter<'a> {
    a: Operand<'a>,
    b: Operand<'a>,
    output: OutputSlot<'a>,
    plan: BroadcastPlan,
    cursor: StepCursor,
    mode: ValueMode,
    values: [Scalar; 2],

    /// Whether the cached value of each input must be re-read on the next
    /// step, even if its offset did not change.
    stale: [bool; 2],
}

impl<'a> DualIter<'a> {
    /// Create an iterator over `a` and `b`.
    pub fn new(
        a: &'a dyn Dataset,
        b: &'a dyn Dataset,
        output: Output<'a>,
    ) -> Result<DualIter<'a>> {
        let target = match output {
            Output::None => Target::None,
            Output::Create => Target::Create,
            Output::Into(out) => Target::Distinct(out),
        };
        DualIter::build(Operand::Shared(a), Operand::Shared(b), target)
    }

    /// Create an iterator which writes its results back into `a`.
    ///
    /// `b` must broadcast to the shape of `a`.
    pub fn into_a(a: &'a mut dyn DatasetMut, b: &'a dyn Dataset) -> Result<DualIter<'a>> {
        DualIter::build(Operand::Exclusive(a), Operand::Shared(b), Target::AliasA)
    }

    /// Create an iterator which writes its results back into `b`.
    ///
    /// `a` must broadcast to the shape of `b`.
    pub fn into_b(a: &'a dyn Dataset, b: &'a mut dyn DatasetMut) -> Result<DualIter<'a>> {
        DualIter::build(Operand::Shared(a), Operand::Exclusive(b), Target::AliasB)
    }

    fn build(a: Operand<'a>, b: Operand<'a>, target: Target<'a>) -> Result<DualIter<'a>> {
        check_numeric(&a)?;
        check_numeric(&b)?;
        check_item_sizes(&a, &b)?;

        let item_size = a.item_size().max(b.item_size());
        let mut shape = broadcast_shapes(&[Some(a.shape()), Some(b.shape())])?;
        match &target {
            Target::AliasA => check_output_shape(&shape, a.shape())?,
            Target::AliasB => check_output_shape(&shape, b.shape())?,
            Target::Distinct(out) => {
                check_output_broadcast(&shape, out.shape())?;
                shape = DynIndex::from_slice(out.shape());
            }
            Target::None | Target::Create => {}
        }

        let out_width = match &target {
            Target::AliasA => Some(a.item_size()),
            Target::AliasB => Some(b.item_size()),
            Target::Distinct(out) => {
                check_numeric(&**out)?;
                Some(out.item_size())
            }
            Target::None | Target::Create => None,
        };
        if let Some(width) = out_width {
            if item_size != 1 && width != item_size {
                return Err(Error::incompatible(format!(
                    "output item size {} does not match input item size {}",
                    width, item_size
                )));
            }
        }

        let mut operands: SmallVec<[OperandPlan; 3]> = smallvec![
            OperandPlan::new(&a, &shape)?,
            OperandPlan::new(&b, &shape)?
        ];
        let output = match target {
            Target::None => OutputSlot::None,
            Target::AliasA => OutputSlot::AliasA,
            Target::AliasB => OutputSlot::AliasB,
            Target::Distinct(out) => {
                operands.push(OperandPlan::new(&*out, &shape)?);
                OutputSlot::Distinct(Operand::Exclusive(out))
            }
            Target::Create => {
                let dtype = promote(a.dtype(), b.dtype());
                let out = NdArray::zeros(dtype, item_size, &shape)?;
                trace!(%dtype, item_size, shape = ?shape.as_slice(), "allocated output");
                operands.push(OperandPlan::new(&out, &shape)?);
                OutputSlot::Created(out)
            }
        };

        let plan = BroadcastPlan::new(shape, operands, output.kind());
        debug!(
            a = ?a.shape(),
            b = ?b.shape(),
            shape = ?plan.shape(),
            output = ?plan.output_kind(),
            "built dual broadcast plan"
        );
        let cursor = StepCursor::new(&plan);
        let mut iter = DualIter {
            a,
            b,
            output,
            plan,
            cursor,
            mode: ValueMode::default(),
            values: [Scalar::default(); 2],
            stale: [true; 2],
        };
        iter.load_single_items();
        Ok(iter)
    }

    pub fn plan(&self) -> &BroadcastPlan {
        &self.plan
    }

    /// The broadcast shape being iterated over.
    pub fn shape(&self) -> &[usize] {
        self.plan.shape()
    }

    pub fn output_kind(&self) -> Option<OutputKind> {
        self.plan.output_kind()
    }

    /// Move to the next pair of items. Returns false once every position of
    /// the broadcast shape has been visited.
    #[inline]
    pub fn advance(&mut self) -> bool {
        let prev = [self.cursor.offset(0), self.cursor.offset(1)];
        if !self.cursor.advance(&self.plan) {
            return false;
        }
        for i in 0..2 {
            if self.stale[i] || self.cursor.offset(i) != prev[i] {
                self.refresh(i);
            }
        }
        true
    }

    /// Return to the state before the first element.
    pub fn reset(&mut self) {
        self.cursor.reset(&self.plan);
        self.stale = [true; 2];
        self.load_single_items();
    }

    /// Current index into the broadcast shape.
    pub fn position(&self) -> Option<DynIndex> {
        self.cursor.position()
    }

    pub fn value_mode(&self) -> ValueMode {
        self.mode
    }

    /// Choose whether values are read as floats or integers. Cached values are
    /// re-read immediately.
    pub fn set_value_mode(&mut self, mode: ValueMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        if self.cursor.is_positioned() {
            self.refresh(0);
            self.refresh(1);
        } else {
            self.stale = [true; 2];
            self.load_single_items();
        }
    }

    pub fn a_value(&self) -> Scalar {
        self.values[0]
    }

    pub fn b_value(&self) -> Scalar {
        self.values[1]
    }

    #[inline]
    pub fn a_f64(&self) -> f64 {
        self.values[0].as_f64()
    }

    #[inline]
    pub fn b_f64(&self) -> f64 {
        self.values[1].as_f64()
    }

    #[inline]
    pub fn a_i64(&self) -> i64 {
        self.values[0].as_i64()
    }

    #[inline]
    pub fn b_i64(&self) -> i64 {
        self.values[1].as_i64()
    }

    /// Physical index of the current item of `a`.
    #[inline]
    pub fn a_index(&self) -> usize {
        self.cursor.offset(0) as usize
    }

    /// Physical index of the current item of `b`.
    #[inline]
    pub fn b_index(&self) -> usize {
        self.cursor.offset(1) as usize
    }

    /// Physical index of the current item of the output, if there is one.
    #[inline]
    pub fn output_index(&self) -> Option<usize> {
        match self.output {
            OutputSlot::None => None,
            OutputSlot::AliasA => Some(self.a_index()),
            OutputSlot::AliasB => Some(self.b_index()),
            OutputSlot::Distinct(_) | OutputSlot::Created(_) => {
                Some(self.cursor.offset(2) as usize)
            }
        }
    }

    pub fn a(&self) -> &dyn Dataset {
        &self.a
    }

    pub fn b(&self) -> &dyn Dataset {
        &self.b
    }

    pub fn output(&self) -> Option<&dyn Dataset> {
        match &self.output {
            OutputSlot::None => None,
            OutputSlot::AliasA => Some(&self.a),
            OutputSlot::AliasB => Some(&self.b),
            OutputSlot::Distinct(out) => Some(out),
            OutputSlot::Created(out) => Some(out),
        }
    }

    pub fn output_mut(&mut self) -> Option<&mut (dyn DatasetMut + 'a)> {
        match &mut self.output {
            OutputSlot::None => None,
            OutputSlot::AliasA => self.a.as_mut(),
            OutputSlot::AliasB => self.b.as_mut(),
            OutputSlot::Distinct(out) => out.as_mut(),
            OutputSlot::Created(out) => Some(out),
        }
    }

    /// Write `value` to the first element of the current output item.
    ///
    /// Does nothing if the iterator has no output or is not on an element.
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

    /// Integer counterpart of [`set_output_f64`](DualIter::set_output_f64).
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

    /// Consume the iterator and return the output array it allocated.
    ///
    /// Returns `None` unless the iterator was created with [`Output::Create`].
    pub fn into_output(self) -> Option<NdArray> {
        match self.output {
            OutputSlot::Created(out) => Some(out),
            _ => None,
        }
    }

    fn operand(&self, i: usize) -> &Operand<'a> {
        if i == 0 {
            &self.a
        } else {
            &self.b
        }
    }

    #[inline]
    fn refresh(&mut self, i: usize) {
        let index = self.cursor.offset(i) as usize;
        self.values[i] = Scalar::read(self.operand(i), index, self.mode);
        self.stale[i] = false;
    }

    /// Read the value of inputs that hold a single item, so it is available
    /// before the first step.
    fn load_single_items(&mut self) {
        if self.plan.is_empty() {
            return;
        }
        for i in 0..2 {
            if self.operand(i).len() == 1 {
                let start = self.plan.operands()[i].start() as usize;
                self.values[i] = Scalar::read(self.operand(i), start, self.mode);
                self.stale[i] = false;
            }
        }
    }
}

impl Cursor for DualIter<'_> {
    fn advance(&mut self) -> bool {
        DualIter::advance(self)
    }

    fn reset(&mut self) {
        DualIter::reset(self)
    }

    fn position(&self) -> Option<DynIndex> {
        DualIter::position(self)
    }

    fn index(&self) -> usize {
        self.a_index()
    }

    fn value(&self) -> Option<Scalar> {
        Some(self.a_value())
    }
}
