//! The array interface consumed by the iterators, and an owned array type
//! which implements it.

use smallvec::SmallVec;

use crate::dtype::DataType;
use crate::errors::{Error, Result};
use crate::plan::Output;
use crate::shape::{contiguous_strides, DynIndex};
use crate::single::{SingleIter, SingleOptions};
use crate::slice::SliceND;
use crate::storage::Buffer;
use crate::strides::broadcast_strides;

/// Read access to an N-dimensional strided array.
///
/// Elements are addressed by absolute physical index into the array's
/// storage. The element at logical index `[i0, i1, ...]` is at
/// `offset + i0 * strides[0] + i1 * strides[1] + ...`, and an item occupies
/// `item_size` consecutive storage elements starting there.
///
/// Strides are unsigned, so layouts which step backwards through storage,
/// such as reversed views, cannot be described. Traverse a reversed region
/// by mapping the logical index instead.
pub trait Dataset {
    fn dtype(&self) -> DataType;

    fn shape(&self) -> &[usize];

    /// Strides of each dimension in storage elements, or `None` if the array
    /// is contiguous in row-major order.
    fn strides(&self) -> Option<&[usize]>;

    /// Physical index of the first element.
    fn offset(&self) -> usize;

    /// Number of storage elements per item.
    fn item_size(&self) -> usize;

    fn get_f64(&self, index: usize) -> f64;

    fn get_i64(&self, index: usize) -> i64;

    fn get_bool(&self, index: usize) -> bool;

    fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Number of items in the array.
    fn len(&self) -> usize {
        self.shape().iter().product()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write access to an N-dimensional strided array.
pub trait DatasetMut: Dataset {
    fn set_f64(&mut self, index: usize, value: f64);

    fn set_i64(&mut self, index: usize, value: i64);

    fn set_bool(&mut self, index: usize, value: bool);
}

/// Return an error if elements of `data` have no numeric interpretation.
pub(crate) fn check_numeric<D: Dataset + ?Sized>(data: &D) -> Result<()> {
    if !data.dtype().is_numeric() {
        return Err(Error::UnsupportedElementAccess {
            dtype: data.dtype(),
        });
    }
    Ok(())
}

/// An owned, contiguous N-dimensional array.
#[derive(Clone, Debug)]
pub struct NdArray {
    dtype: DataType,
    item_size: usize,
    shape: DynIndex,
    buffer: Buffer,
}

impl NdArray {
    /// Create an array from an existing buffer.
    ///
    /// The buffer's element type must be the component type of `dtype` and
    /// its length must be `item_size` times the product of `shape`.
    pub fn from_buffer(
        dtype: DataType,
        item_size: usize,
        shape: &[usize],
        buffer: Buffer,
    ) -> Result<NdArray> {
        check_item_size(dtype, item_size)?;
        if buffer.element_type() != dtype.real_type() {
            return Err(Error::invalid_arg(format!(
                "buffer of {} cannot hold {} items",
                buffer.element_type(),
                dtype
            )));
        }
        let expected_len = shape.iter().product::<usize>() * item_size;
        if buffer.len() != expected_len {
            return Err(Error::invalid_arg(format!(
                "buffer length {} does not match shape {:?} with item size {}",
                buffer.len(),
                shape,
                item_size
            )));
        }
        Ok(NdArray {
            dtype,
            item_size,
            shape: SmallVec::from_slice(shape),
            buffer,
        })
    }

    /// Create a zero-filled array.
    pub fn zeros(dtype: DataType, item_size: usize, shape: &[usize]) -> Result<NdArray> {
        check_item_size(dtype, item_size)?;
        let len = shape.iter().product::<usize>() * item_size;
        NdArray::from_buffer(dtype, item_size, shape, Buffer::zeros(dtype, len))
    }

    pub fn from_f64(data: Vec<f64>, shape: &[usize]) -> Result<NdArray> {
        NdArray::from_buffer(DataType::Float64, 1, shape, Buffer::Float64(data))
    }

    pub fn from_i64(data: Vec<i64>, shape: &[usize]) -> Result<NdArray> {
        NdArray::from_buffer(DataType::Int64, 1, shape, Buffer::Int64(data))
    }

    pub fn from_bool(data: Vec<bool>, shape: &[usize]) -> Result<NdArray> {
        NdArray::from_buffer(DataType::Bool, 1, shape, Buffer::Bool(data))
    }

    /// Create a complex array from `(re, im)` pairs.
    pub fn from_complex(data: &[(f64, f64)], shape: &[usize]) -> Result<NdArray> {
        let buf = data.iter().flat_map(|&(re, im)| [re, im]).collect();
        NdArray::from_buffer(DataType::Complex128, 2, shape, Buffer::Float64(buf))
    }

    /// Create a rank-0 array holding a single float.
    pub fn scalar(value: f64) -> NdArray {
        NdArray {
            dtype: DataType::Float64,
            item_size: 1,
            shape: SmallVec::new(),
            buffer: Buffer::Float64(vec![value]),
        }
    }

    /// Return a copy of this array with a new shape of the same length.
    pub fn reshaped(self, shape: &[usize]) -> Result<NdArray> {
        if shape.iter().product::<usize>() != self.len() {
            return Err(Error::invalid_arg(format!(
                "cannot reshape {:?} to {:?}",
                self.shape.as_slice(),
                shape
            )));
        }
        Ok(NdArray {
            shape: SmallVec::from_slice(shape),
            ..self
        })
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Return all storage elements, in order, as floats.
    pub fn to_vec_f64(&self) -> Vec<f64> {
        (0..self.buffer.len()).map(|i| self.buffer.get_f64(i)).collect()
    }

    /// Return all storage elements, in order, as integers.
    pub fn to_vec_i64(&self) -> Vec<i64> {
        (0..self.buffer.len()).map(|i| self.buffer.get_i64(i)).collect()
    }

    /// Read element `index` as a float, failing for object arrays.
    pub fn try_get_f64(&self, index: usize) -> Result<f64> {
        check_numeric(self)?;
        Ok(self.buffer.get_f64(index))
    }

    /// Read element `index` as an integer, failing for object arrays.
    pub fn try_get_i64(&self, index: usize) -> Result<i64> {
        check_numeric(self)?;
        Ok(self.buffer.get_i64(index))
    }

    /// Return a view of the whole array.
    pub fn as_view(&self) -> ArrayView<'_> {
        ArrayView {
            array: self,
            shape: self.shape.clone(),
            strides: contiguous_strides(&self.shape, self.item_size),
            offset: 0,
        }
    }

    /// Return a view of the region selected by `slice`.
    pub fn view(&self, slice: &SliceND) -> Result<ArrayView<'_>> {
        if slice.source_shape() != self.shape.as_slice() {
            return Err(Error::invalid_arg(format!(
                "slice of {:?} applied to array of shape {:?}",
                slice.source_shape(),
                self.shape.as_slice()
            )));
        }
        let base_strides = contiguous_strides(&self.shape, self.item_size);
        let mut offset = 0;
        let mut strides = DynIndex::with_capacity(self.ndim());
        for (range, stride) in slice.ranges().iter().zip(base_strides) {
            offset += range.start * stride;
            strides.push(range.step * stride);
        }
        Ok(ArrayView {
            array: self,
            shape: slice.shape(),
            strides,
            offset,
        })
    }

    /// Return a view which broadcasts this array to `shape`.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<ArrayView<'_>> {
        let strides = broadcast_strides(&self.shape, None, self.item_size, shape)?;
        Ok(ArrayView {
            array: self,
            shape: SmallVec::from_slice(shape),
            strides,
            offset: 0,
        })
    }
}

fn check_item_size(dtype: DataType, item_size: usize) -> Result<()> {
    if item_size == 0 || item_size % dtype.elements_per_value() != 0 {
        return Err(Error::invalid_arg(format!(
            "item size {} is not valid for {}",
            item_size, dtype
        )));
    }
    Ok(())
}

impl Dataset for NdArray {
    fn dtype(&self) -> DataType {
        self.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn strides(&self) -> Option<&[usize]> {
        None
    }

    fn offset(&self) -> usize {
        0
    }

    fn item_size(&self) -> usize {
        self.item_size
    }

    #[inline]
    fn get_f64(&self, index: usize) -> f64 {
        self.buffer.get_f64(index)
    }

    #[inline]
    fn get_i64(&self, index: usize) -> i64 {
        self.buffer.get_i64(index)
    }

    #[inline]
    fn get_bool(&self, index: usize) -> bool {
        self.buffer.get_bool(index)
    }
}

impl DatasetMut for NdArray {
    #[inline]
    fn set_f64(&mut self, index: usize, value: f64) {
        self.buffer.set_f64(index, value)
    }

    #[inline]
    fn set_i64(&mut self, index: usize, value: i64) {
        self.buffer.set_i64(index, value)
    }

    #[inline]
    fn set_bool(&mut self, index: usize, value: bool) {
        self.buffer.set_bool(index, value)
    }
}

/// A strided view of an [`NdArray`], as produced by slicing or broadcasting.
#[derive(Clone, Debug)]
pub struct ArrayView<'a> {
    array: &'a NdArray,
    shape: DynIndex,
    strides: DynIndex,
    offset: usize,
}

impl ArrayView<'_> {
    /// Copy the elements of this view into a new contiguous array.
    pub fn to_owned(&self) -> Result<NdArray> {
        copy_to_owned(self)
    }
}

impl Dataset for ArrayView<'_> {
    fn dtype(&self) -> DataType {
        self.array.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn strides(&self) -> Option<&[usize]> {
        Some(&self.strides)
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn item_size(&self) -> usize {
        self.array.item_size
    }

    #[inline]
    fn get_f64(&self, index: usize) -> f64 {
        self.array.buffer.get_f64(index)
    }

    #[inline]
    fn get_i64(&self, index: usize) -> i64 {
        self.array.buffer.get_i64(index)
    }

    #[inline]
    fn get_bool(&self, index: usize) -> bool {
        self.array.buffer.get_bool(index)
    }
}

/// Copy every item of `src` into a new contiguous array of the same type.
pub fn copy_to_owned(src: &dyn Dataset) -> Result<NdArray> {
    let dtype = src.dtype();
    let item_size = src.item_size();
    let mut iter = SingleIter::new(src, Output::Create, SingleOptions::preserve())?;
    let exact_ints = !(dtype.is_float() || dtype.is_complex());

    while iter.advance() {
        let (src_index, dst_index) = (iter.a_index(), iter.output_index().unwrap_or(0));
        let Some(out) = iter.output_mut() else {
            break;
        };
        for k in 0..item_size {
            if exact_ints {
                out.set_i64(dst_index + k, src.get_i64(src_index + k));
            } else {
                out.set_f64(dst_index + k, src.get_f64(src_index + k));
            }
        }
    }

    iter.into_output()
        .ok_or_else(|| Error::incompatible("copy produced no output"))
}
