//! Typed element storage for [`NdArray`](crate::NdArray).

use std::any::Any;
use std::sync::Arc;

use crate::dtype::DataType;

/// An opaque element of an object array.
pub type Object = Option<Arc<dyn Any + Send + Sync>>;

/// Element buffer for an array.
///
/// There is one variant per storage element kind. Complex arrays use the
/// buffer of their real component type, with two elements per value.
#[derive(Clone, Debug)]
pub enum Buffer {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Object(Vec<Object>),
}

/// Apply `$body` to the vector inside any numeric buffer variant, binding it
/// to `$vec`. Evaluates `$object` for object buffers.
macro_rules! match_numeric {
    ($buf:expr, $vec:ident => $body:expr, $object:expr) => {
        match $buf {
            Buffer::Bool($vec) => $body,
            Buffer::Int8($vec) => $body,
            Buffer::Int16($vec) => $body,
            Buffer::Int32($vec) => $body,
            Buffer::Int64($vec) => $body,
            Buffer::Float32($vec) => $body,
            Buffer::Float64($vec) => $body,
            Buffer::Object(_) => $object,
        }
    };
}

/// Conversions between a storage element type and the `f64` / `i64` / `bool`
/// views exposed by arrays.
trait Element: Copy {
    fn to_f64(self) -> f64;
    fn to_i64(self) -> i64;
    fn to_bool(self) -> bool;
    fn from_f64(v: f64) -> Self;
    fn from_i64(v: i64) -> Self;
    fn from_bool(v: bool) -> Self;
}

macro_rules! impl_element {
    ($type:ty) => {
        impl Element for $type {
            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }

            #[inline]
            fn to_bool(self) -> bool {
                self != (0 as $type)
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $type
            }

            #[inline]
            fn from_i64(v: i64) -> Self {
                v as $type
            }

            #[inline]
            fn from_bool(v: bool) -> Self {
                v as u8 as $type
            }
        }
    };
}

impl_element!(i8);
impl_element!(i16);
impl_element!(i32);
impl_element!(i64);
impl_element!(f32);
impl_element!(f64);

impl Element for bool {
    #[inline]
    fn to_f64(self) -> f64 {
        self as u8 as f64
    }

    #[inline]
    fn to_i64(self) -> i64 {
        self as i64
    }

    #[inline]
    fn to_bool(self) -> bool {
        self
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v != 0.
    }

    #[inline]
    fn from_i64(v: i64) -> Self {
        v != 0
    }

    #[inline]
    fn from_bool(v: bool) -> Self {
        v
    }
}

impl Buffer {
    /// Allocate a zero-filled (or `None`-filled) buffer for `len` elements of
    /// type `dtype`.
    pub fn zeros(dtype: DataType, len: usize) -> Buffer {
        match dtype {
            DataType::Bool => Buffer::Bool(vec![false; len]),
            DataType::Int8 => Buffer::Int8(vec![0; len]),
            DataType::Int16 => Buffer::Int16(vec![0; len]),
            DataType::Int32 => Buffer::Int32(vec![0; len]),
            DataType::Int64 => Buffer::Int64(vec![0; len]),
            DataType::Float32 | DataType::Complex64 => Buffer::Float32(vec![0.; len]),
            DataType::Float64 | DataType::Complex128 => Buffer::Float64(vec![0.; len]),
            DataType::Object => Buffer::Object(vec![None; len]),
        }
    }

    /// Return the element type stored in this buffer. Complex arrays report
    /// their component type here.
    pub fn element_type(&self) -> DataType {
        match self {
            Buffer::Bool(_) => DataType::Bool,
            Buffer::Int8(_) => DataType::Int8,
            Buffer::Int16(_) => DataType::Int16,
            Buffer::Int32(_) => DataType::Int32,
            Buffer::Int64(_) => DataType::Int64,
            Buffer::Float32(_) => DataType::Float32,
            Buffer::Float64(_) => DataType::Float64,
            Buffer::Object(_) => DataType::Object,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::Object(v) => v.len(),
            numeric => match_numeric!(numeric, v => v.len(), 0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read element `index` as a float. Object elements read as NaN.
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn get_f64(&self, index: usize) -> f64 {
        match_numeric!(self, v => v[index].to_f64(), f64::NAN)
    }

    /// Read element `index` as an integer, truncating floats. Object elements
    /// read as zero.
    #[inline]
    pub fn get_i64(&self, index: usize) -> i64 {
        match_numeric!(self, v => v[index].to_i64(), 0)
    }

    /// Read element `index` as a boolean (non-zero is true). Object elements
    /// are true if present.
    #[inline]
    pub fn get_bool(&self, index: usize) -> bool {
        match self {
            Buffer::Object(v) => v[index].is_some(),
            other => match_numeric!(other, v => v[index].to_bool(), false),
        }
    }

    /// Write a float to element `index`, converting to the buffer's type.
    /// Writes to object buffers are ignored.
    #[inline]
    pub fn set_f64(&mut self, index: usize, value: f64) {
        match_numeric!(self, v => v[index] = Element::from_f64(value), ())
    }

    #[inline]
    pub fn set_i64(&mut self, index: usize, value: i64) {
        match_numeric!(self, v => v[index] = Element::from_i64(value), ())
    }

    #[inline]
    pub fn set_bool(&mut self, index: usize, value: bool) {
        match_numeric!(self, v => v[index] = Element::from_bool(value), ())
    }
}
