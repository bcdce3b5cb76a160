//! ndbroadcast iterates over N-dimensional strided arrays of different shapes
//! as if they had a common, broadcast shape.
//!
//! Shapes are broadcast using the same rules as NumPy: shapes are aligned at
//! their last dimension and padded on the left with ones, and in each
//! dimension every size must be either 1 or the same as the largest size.
//! Size-1 dimensions are stretched by walking them with a stride of zero, so
//! the same element is visited repeatedly without copying any data.
//!
//! # Iterators
//!
//! - [`DualIter`] walks two arrays in lock-step, with an optional output
//!   that can be one of the inputs, an array supplied by the caller or a new
//!   array allocated by the iterator.
//! - [`SingleIter`] walks one array, optionally broadcasting it into an
//!   output.
//! - [`PredicateIter`] visits the items of an array selected by a mask.
//! - [`IndexSetIter`] converts a list of possibly negative indices into
//!   offsets.
//!
//! All of these implement the [`Cursor`] trait. Construction validates the
//! operands and builds a [`BroadcastPlan`], after which stepping through the
//! elements cannot fail.
//!
//! ```
//! use ndbroadcast::{DualIter, NdArray, Output};
//!
//! let column = NdArray::from_f64(vec![1., 2., 3.], &[3, 1]).unwrap();
//! let row = NdArray::from_f64(vec![10., 20., 30., 40.], &[1, 4]).unwrap();
//!
//! let mut iter = DualIter::new(&column, &row, Output::Create).unwrap();
//! let mut steps = 0;
//! while iter.advance() {
//!     let product = iter.a_f64() * iter.b_f64();
//!     iter.set_output_f64(product);
//!     steps += 1;
//! }
//! assert_eq!(steps, 12);
//! let out = iter.into_output().unwrap();
//! assert_eq!(&out.to_vec_f64()[..4], &[10., 20., 30., 40.]);
//! ```
//!
//! # Arrays
//!
//! The iterators read arrays through the [`Dataset`] and [`DatasetMut`]
//! traits. [`NdArray`] is an owned, contiguous implementation of these and
//! [`ArrayView`] is a strided view of one.
//!
//! # Slicing large datasets
//!
//! A [`Slicer`] splits a [`LazyDataset`] into slices which are loaded and
//! passed to a [`SliceVisitor`] one at a time, either on the calling thread or
//! in a [`ThreadPool`].
//!
//! # Configuration
//!
//! Some defaults can be set with environment variables, which are read once
//! per process. See [`Config`].

mod array;
mod config;
mod cursor;
mod dtype;
mod dual;
mod errors;
mod operand;
mod plan;
mod select;
mod single;
mod slice;
mod slicer;
mod storage;
mod strides;
mod threading;

pub mod shape;

#[cfg(test)]
mod test_util;

pub use array::{copy_to_owned, ArrayView, Dataset, DatasetMut, NdArray};
pub use config::{config, Config, FLOAT_TYPE_VAR, NUM_THREADS_VAR};
pub use cursor::{AnyCursor, Cursor, Scalar, ValueMode};
pub use dtype::{promote, DataType};
pub use dual::DualIter;
pub use errors::{Error, Result, VisitError};
pub use plan::{BroadcastPlan, Output, OutputKind, Positions};
pub use select::{IndexSetIter, PredicateIter};
pub use single::{SingleIter, SingleOptions};
pub use slice::{AxisRange, SliceND};
pub use slicer::{FailurePolicy, LazyDataset, SliceFailure, SliceReport, SliceVisitor, Slicer};
pub use storage::{Buffer, Object};
pub use strides::{broadcast_strides, OperandPlan};
pub use threading::{thread_pool, ThreadPool};
