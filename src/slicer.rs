//! Visit a large dataset one slice at a time.
//!
//! A [`Slicer`] splits a [`LazyDataset`] into a grid of slices. The axes
//! passed to [`Slicer::new`] are kept whole in every slice, and the remaining
//! axes are stepped through one index at a time. Each slice is loaded into
//! memory and passed to a [`SliceVisitor`].
//!
//! ```
//! use ndbroadcast::{Dataset, NdArray, SliceND, Slicer, VisitError};
//!
//! let data = NdArray::from_f64((0..6).map(|x| x as f64).collect(), &[2, 3]).unwrap();
//! let slicer = Slicer::new(&data, &[1]).unwrap();
//! let report = slicer
//!     .visit_all(&|row: NdArray, _slice: &SliceND, shape: &[usize]| {
//!         assert_eq!(shape, &[3]);
//!         assert_eq!(row.len(), 3);
//!         Ok::<_, VisitError>(())
//!     })
//!     .unwrap();
//! assert_eq!(report.visited, 2);
//! ```

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::array::{Dataset, NdArray};
use crate::errors::{Error, Result, VisitError};
use crate::plan::Positions;
use crate::shape::DynIndex;
use crate::slice::SliceND;
use crate::threading::ThreadPool;

/// A dataset whose elements are loaded on demand, one slice at a time.
pub trait LazyDataset {
    fn shape(&self) -> &[usize];

    /// Load the region selected by `slice` into a new array with the
    /// slice's shape.
    fn get_slice(&self, slice: &SliceND) -> Result<NdArray>;
}

impl LazyDataset for NdArray {
    fn shape(&self) -> &[usize] {
        Dataset::shape(self)
    }

    fn get_slice(&self, slice: &SliceND) -> Result<NdArray> {
        self.view(slice)?.to_owned()
    }
}

/// Callback invoked by a [`Slicer`] for each slice.
pub trait SliceVisitor {
    /// Visit one slice.
    ///
    /// `data` holds the elements of the slice, with the axes that are not kept
    /// whole removed, so its shape is `shape`. `slice` gives the position of
    /// the slice in the source dataset.
    fn visit(
        &self,
        data: NdArray,
        slice: &SliceND,
        shape: &[usize],
    ) -> std::result::Result<(), VisitError>;
}

impl<F> SliceVisitor for F
where
    F: Fn(NdArray, &SliceND, &[usize]) -> std::result::Result<(), VisitError>,
{
    fn visit(
        &self,
        data: NdArray,
        slice: &SliceND,
        shape: &[usize],
    ) -> std::result::Result<(), VisitError> {
        self(data, slice, shape)
    }
}

/// What a [`Slicer`] does when a visit fails.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop visiting and return the error.
    #[default]
    Abort,

    /// Visit every slice, and list the failures in the [`SliceReport`].
    Continue,
}

/// A failed visit.
#[derive(Debug)]
pub struct SliceFailure {
    pub slice: SliceND,
    pub error: VisitError,
}

/// Result of visiting the slices of a dataset.
#[derive(Debug, Default)]
pub struct SliceReport {
    /// Number of slices visited, including failed visits.
    pub visited: usize,

    /// Failed visits, in the order the slices appear in the grid.
    pub failures: Vec<SliceFailure>,
}

impl SliceReport {
    /// Return true if every visit succeeded.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Splits a [`LazyDataset`] into slices and visits each in turn.
pub struct Slicer<'a, D: LazyDataset + ?Sized> {
    data: &'a D,

    /// Axes which are kept whole in each slice, in ascending order.
    axes: Vec<usize>,

    /// Region of `data` that is visited.
    region: SliceND,

    policy: FailurePolicy,
}

impl<'a, D: LazyDataset + ?Sized> Slicer<'a, D> {
    /// Create a slicer which visits every slice of `data` that spans the
    /// axes in `axes`.
    pub fn new(data: &'a D, axes: &[usize]) -> Result<Slicer<'a, D>> {
        let ndim = data.shape().len();
        let mut sorted = axes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != axes.len() {
            return Err(Error::invalid_arg(format!("axes {:?} contain duplicates", axes)));
        }
        if let Some(&axis) = sorted.iter().find(|&&axis| axis >= ndim) {
            return Err(Error::invalid_arg(format!(
                "axis {} is out of range for {} dims",
                axis, ndim
            )));
        }

        Ok(Slicer {
            data,
            axes: sorted,
            region: SliceND::full(data.shape()),
            policy: FailurePolicy::default(),
        })
    }

    /// Restrict visiting to the region of the dataset selected by `region`.
    pub fn with_slice(mut self, region: SliceND) -> Result<Slicer<'a, D>> {
        if region.source_shape() != self.data.shape() {
            return Err(Error::invalid_arg(format!(
                "slice of {:?} does not match dataset shape {:?}",
                region.source_shape(),
                self.data.shape()
            )));
        }
        self.region = region;
        Ok(self)
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Slicer<'a, D> {
        self.policy = policy;
        self
    }

    fn is_kept(&self, axis: usize) -> bool {
        self.axes.binary_search(&axis).is_ok()
    }

    /// Shape of the data passed to each visit.
    pub fn slice_shape(&self) -> DynIndex {
        self.axes.iter().map(|&axis| self.region.range(axis).len()).collect()
    }

    /// Shape of the grid of slices, ie. the sizes of the axes which are not
    /// kept whole.
    pub fn grid_shape(&self) -> DynIndex {
        (0..self.region.ndim())
            .filter(|&axis| !self.is_kept(axis))
            .map(|axis| self.region.range(axis).len())
            .collect()
    }

    /// Number of slices that will be visited.
    pub fn len(&self) -> usize {
        self.grid_shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the slices to visit, in row-major order of the grid.
    pub fn slices(&self) -> Vec<SliceND> {
        self.iter_slices().collect()
    }

    /// Return an iterator which produces the slices to visit on demand, in
    /// row-major order of the grid.
    pub fn iter_slices(&self) -> impl Iterator<Item = SliceND> + '_ {
        Positions::new(&self.grid_shape()).map(move |pos| self.slice_at(&pos))
    }

    /// Return the slice at position `pos` in the grid.
    fn slice_at(&self, pos: &[usize]) -> SliceND {
        let grid_axes = (0..self.region.ndim()).filter(|&axis| !self.is_kept(axis));
        grid_axes
            .zip(pos)
            .fold(self.region.clone(), |slice, (axis, &i)| slice.narrow(axis, i))
    }

    fn visit_one<V: SliceVisitor + ?Sized>(
        &self,
        visitor: &V,
        slice: &SliceND,
        shape: &[usize],
    ) -> std::result::Result<(), VisitError> {
        let data = self.data.get_slice(slice)?.reshaped(shape)?;
        visitor.visit(data, slice, shape)
    }

    /// Visit every slice on the current thread, in row-major order of the
    /// grid.
    pub fn visit_all<V: SliceVisitor + ?Sized>(&self, visitor: &V) -> Result<SliceReport> {
        let shape = self.slice_shape();
        debug!(
            grid = ?self.grid_shape().as_slice(),
            slice_shape = ?shape.as_slice(),
            policy = ?self.policy,
            "visiting slices"
        );

        let mut report = SliceReport::default();
        for slice in self.iter_slices() {
            report.visited += 1;
            if let Err(error) = self.visit_one(visitor, &slice, &shape) {
                match self.policy {
                    FailurePolicy::Abort => return Err(visit_error(&slice, error)),
                    FailurePolicy::Continue => {
                        warn!(slice = %slice, %error, "slice visit failed");
                        report.failures.push(SliceFailure { slice, error });
                    }
                }
            }
        }
        Ok(report)
    }

    /// Visit every slice using the threads in `pool`.
    ///
    /// Each slice is visited exactly once, in no particular order. With
    /// [`FailurePolicy::Abort`], slices which have not started when a visit
    /// fails may be skipped.
    pub fn visit_all_parallel<V>(&self, visitor: &V, pool: &ThreadPool) -> Result<SliceReport>
    where
        D: Sync,
        V: SliceVisitor + Sync + ?Sized,
    {
        let shape = self.slice_shape();
        let slices = self.slices();
        debug!(
            grid = ?self.grid_shape().as_slice(),
            slice_shape = ?shape.as_slice(),
            policy = ?self.policy,
            threads = pool.num_threads(),
            "visiting slices in parallel"
        );

        match self.policy {
            FailurePolicy::Abort => {
                pool.run(|| {
                    slices.par_iter().try_for_each(|slice| {
                        self.visit_one(visitor, slice, &shape)
                            .map_err(|error| visit_error(slice, error))
                    })
                })?;
                Ok(SliceReport {
                    visited: slices.len(),
                    failures: Vec::new(),
                })
            }
            FailurePolicy::Continue => {
                let visited = slices.len();
                let failures: Vec<SliceFailure> = pool.run(|| {
                    slices
                        .into_par_iter()
                        .filter_map(|slice| {
                            let error = self.visit_one(visitor, &slice, &shape).err()?;
                            warn!(slice = %slice, %error, "slice visit failed");
                            Some(SliceFailure { slice, error })
                        })
                        .collect()
                });
                Ok(SliceReport { visited, failures })
            }
        }
    }
}

fn visit_error(slice: &SliceND, source: VisitError) -> Error {
    Error::Visit {
        slice: slice.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::{FailurePolicy, SliceVisitor, Slicer};
    use crate::array::{Dataset, NdArray};
    use crate::dtype::DataType;
    use crate::errors::{Error, Result, VisitError};
    use crate::slice::{AxisRange, SliceND};
    use crate::test_util::{arange, TestCases};
    use crate::threading::ThreadPool;

    /// Visitor which records the slices it sees, and fails on selected
    /// visits.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, Vec<f64>)>>,
        calls: AtomicUsize,
        fail_on: Vec<usize>,
    }

    impl SliceVisitor for Recorder {
        fn visit(
            &self,
            data: NdArray,
            slice: &SliceND,
            shape: &[usize],
        ) -> std::result::Result<(), VisitError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(data.shape(), shape);
            self.seen
                .lock()
                .unwrap()
                .push((slice.to_string(), data.to_vec_f64()));
            if self.fail_on.contains(&call) {
                return Err(format!("visit {} failed", call).into());
            }
            Ok(())
        }
    }

    impl Recorder {
        fn failing(fail_on: &[usize]) -> Recorder {
            Recorder {
                fail_on: fail_on.to_vec(),
                ..Default::default()
            }
        }

        fn seen(&self) -> Vec<(String, Vec<f64>)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_grid_shapes() {
        #[derive(Debug)]
        struct Case {
            shape: Vec<usize>,
            axes: Vec<usize>,
            grid_shape: Vec<usize>,
            slice_shape: Vec<usize>,
        }

        let cases = [
            Case {
                shape: vec![2, 3, 4],
                axes: vec![2],
                grid_shape: vec![2, 3],
                slice_shape: vec![4],
            },
            Case {
                shape: vec![2, 3, 4],
                axes: vec![2, 0],
                grid_shape: vec![3],
                slice_shape: vec![2, 4],
            },
            Case {
                shape: vec![2, 3],
                axes: vec![],
                grid_shape: vec![2, 3],
                slice_shape: vec![],
            },
            Case {
                shape: vec![2, 3],
                axes: vec![0, 1],
                grid_shape: vec![],
                slice_shape: vec![2, 3],
            },
            Case {
                shape: vec![0, 3],
                axes: vec![1],
                grid_shape: vec![0],
                slice_shape: vec![3],
            },
        ];

        cases.test_each(|case| {
            let data = arange(&case.shape);
            let slicer = Slicer::new(&data, &case.axes).unwrap();
            assert_eq!(slicer.grid_shape().as_slice(), case.grid_shape);
            assert_eq!(slicer.slice_shape().as_slice(), case.slice_shape);
            assert_eq!(slicer.slices().len(), slicer.len());
        })
    }

    #[test]
    fn test_visit_all_in_order() {
        let data = arange(&[2, 3, 2]);
        let slicer = Slicer::new(&data, &[1]).unwrap();
        let recorder = Recorder::default();
        let report = slicer.visit_all(&recorder).unwrap();
        assert_eq!(report.visited, 4);
        assert!(report.is_ok());

        let seen = recorder.seen();
        assert_eq!(seen[0], ("[0:1:1, 0:3:1, 0:1:1]".to_string(), vec![0., 2., 4.]));
        assert_eq!(seen[1], ("[0:1:1, 0:3:1, 1:2:1]".to_string(), vec![1., 3., 5.]));
        assert_eq!(seen[3], ("[1:2:1, 0:3:1, 1:2:1]".to_string(), vec![7., 9., 11.]));
    }

    #[test]
    fn test_visit_restricted_region() {
        let data = arange(&[4, 6]);
        let region = SliceND::new(&[4, 6], vec![AxisRange::new(1, 4, 2), AxisRange::new(0, 6, 3)])
            .unwrap();
        let slicer = Slicer::new(&data, &[1]).unwrap().with_slice(region).unwrap();
        let recorder = Recorder::default();
        slicer.visit_all(&recorder).unwrap();
        assert_eq!(
            recorder.seen(),
            [
                ("[1:2:1, 0:6:3]".to_string(), vec![6., 9.]),
                ("[3:4:1, 0:6:3]".to_string(), vec![18., 21.]),
            ]
        );

        let wrong = SliceND::full(&[4, 5]);
        assert!(Slicer::new(&data, &[1]).unwrap().with_slice(wrong).is_err());
    }

    #[test]
    fn test_invalid_axes() {
        let data = arange(&[2, 3]);
        assert!(matches!(
            Slicer::new(&data, &[2]),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            Slicer::new(&data, &[1, 1]),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_closure_visitor() {
        let data = arange(&[3, 2]);
        let slicer = Slicer::new(&data, &[]).unwrap();
        let total = Mutex::new(0.);
        let report = slicer
            .visit_all(&|x: NdArray, _: &SliceND, shape: &[usize]| {
                assert!(shape.is_empty());
                *total.lock().unwrap() += x.get_f64(0);
                Ok::<_, VisitError>(())
            })
            .unwrap();
        assert_eq!(report.visited, 6);
        assert_eq!(*total.lock().unwrap(), 15.);
    }

    #[test]
    fn test_abort_on_failure() {
        let data = arange(&[5, 2]);
        let slicer = Slicer::new(&data, &[1]).unwrap();
        let recorder = Recorder::failing(&[2]);
        let err = slicer.visit_all(&recorder).err().unwrap();
        match err {
            Error::Visit { slice, source } => {
                assert_eq!(slice, "[2:3:1, 0:2:1]");
                assert_eq!(source.to_string(), "visit 2 failed");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(recorder.seen().len(), 3);
    }

    #[test]
    fn test_continue_on_failure() {
        let data = arange(&[5, 2]);
        let slicer = Slicer::new(&data, &[1])
            .unwrap()
            .with_policy(FailurePolicy::Continue);
        let recorder = Recorder::failing(&[1, 3]);
        let report = slicer.visit_all(&recorder).unwrap();
        assert_eq!(report.visited, 5);
        assert!(!report.is_ok());
        let failed: Vec<String> = report.failures.iter().map(|f| f.slice.to_string()).collect();
        assert_eq!(failed, ["[1:2:1, 0:2:1]", "[3:4:1, 0:2:1]"]);
    }

    #[test]
    fn test_visit_all_parallel() {
        let data = arange(&[4, 3, 2]);
        let slicer = Slicer::new(&data, &[2]).unwrap();
        let pool = ThreadPool::with_num_threads(3);

        let sequential = Recorder::default();
        slicer.visit_all(&sequential).unwrap();
        let parallel = Recorder::default();
        let report = slicer.visit_all_parallel(&parallel, &pool).unwrap();
        assert_eq!(report.visited, 12);

        let mut expected = sequential.seen();
        let mut actual = parallel.seen();
        expected.sort_by(|a, b| a.0.cmp(&b.0));
        actual.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_visit_all_parallel_failures() {
        let data = arange(&[6, 2]);
        let pool = ThreadPool::with_num_threads(2);

        let slicer = Slicer::new(&data, &[1]).unwrap();
        let recorder = Recorder::failing(&[0]);
        assert!(matches!(
            slicer.visit_all_parallel(&recorder, &pool),
            Err(Error::Visit { .. })
        ));

        let slicer = slicer.with_policy(FailurePolicy::Continue);
        let recorder = Recorder::failing(&[0, 1]);
        let report = slicer.visit_all_parallel(&recorder, &pool).unwrap();
        assert_eq!(report.visited, 6);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(recorder.seen().len(), 6);
    }

    /// Dataset whose slices cannot be loaded past a given row.
    struct Truncated {
        shape: Vec<usize>,
        rows: usize,
    }

    impl super::LazyDataset for Truncated {
        fn shape(&self) -> &[usize] {
            &self.shape
        }

        fn get_slice(&self, slice: &SliceND) -> Result<NdArray> {
            if slice.range(0).start >= self.rows {
                return Err(Error::InvalidArgument {
                    reason: "row not loaded".into(),
                });
            }
            NdArray::zeros(DataType::Float32, 1, &slice.shape())
        }
    }

    #[test]
    fn test_load_failure_is_visit_failure() {
        let data = Truncated {
            shape: vec![3, 4],
            rows: 2,
        };
        let slicer = Slicer::new(&data, &[1])
            .unwrap()
            .with_policy(FailurePolicy::Continue);
        let recorder = Recorder::default();
        let report = slicer.visit_all(&recorder).unwrap();
        assert_eq!(recorder.seen().len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0]
            .error
            .to_string()
            .contains("row not loaded"));
    }

    #[test]
    fn test_visit_all_produces_slices_on_demand() {
        let data = arange(&[3, 2]);
        let slicer = Slicer::new(&data, &[1]).unwrap();
        let lazy: Vec<SliceND> = slicer.iter_slices().collect();
        assert_eq!(lazy, slicer.slices());

        // A grid far too large to enumerate up front.
        let data = Truncated {
            shape: vec![1 << 40, 4],
            rows: 1,
        };
        let slicer = Slicer::new(&data, &[1]).unwrap();
        assert_eq!(slicer.iter_slices().nth(5).unwrap().range(0).start, 5);

        let recorder = Recorder::default();
        let err = slicer.visit_all(&recorder).err().unwrap();
        assert!(matches!(err, Error::Visit { .. }));
        assert_eq!(recorder.seen().len(), 1);
    }
}
