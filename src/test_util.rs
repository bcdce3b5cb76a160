//! Helpers shared by the tests in this crate.

use std::fmt::Debug;
use std::panic::RefUnwindSafe;

use crate::array::NdArray;

/// Runs table-driven tests.
///
/// Each case is run with panics caught, so that one failing case does not
/// hide the others. After all cases have run, this panics if any failed,
/// listing the debug representation of every failing case.
pub trait TestCases {
    type Case;

    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        I::Item: Debug + RefUnwindSafe,
    {
        let mut failures = Vec::new();
        let mut count = 0;
        for case in self {
            count += 1;
            if std::panic::catch_unwind(|| test(&case)).is_err() {
                failures.push(format!("{:?}", case));
            }
        }
        if !failures.is_empty() {
            panic!(
                "{} of {} test cases failed:\n{}",
                failures.len(),
                count,
                failures.join("\n")
            );
        }
    }
}

/// Create a contiguous `f64` array with values `0, 1, 2 ...`.
pub fn arange(shape: &[usize]) -> NdArray {
    let len = shape.iter().product::<usize>();
    NdArray::from_f64((0..len).map(|x| x as f64).collect(), shape)
        .expect("arange shape should match data")
}

/// Create a contiguous `i64` array with values `start, start + 1 ...`.
pub fn arange_i64(start: i64, shape: &[usize]) -> NdArray {
    let len = shape.iter().product::<usize>() as i64;
    NdArray::from_i64((start..start + len).collect(), shape)
        .expect("arange shape should match data")
}
