//! The thread pool used for parallel slice visiting.

use std::sync::OnceLock;

use tracing::warn;

use crate::config::config;

/// A wrapper around a Rayon thread pool.
///
/// If the pool could not be created, work runs directly on the calling
/// thread.
pub struct ThreadPool {
    /// The wrapped thread pool, or None if we failed to construct one.
    pool: Option<rayon::ThreadPool>,
}

impl ThreadPool {
    /// Run a function in the thread pool.
    ///
    /// This corresponds to [`rayon::ThreadPool::install`], except when there
    /// is no pool, where it just runs `op` directly.
    pub fn run<R: Send, Op: FnOnce() -> R + Send>(&self, op: Op) -> R {
        if let Some(pool) = self.pool.as_ref() {
            pool.install(op)
        } else {
            op()
        }
    }

    /// Create a thread pool with a given number of threads.
    pub fn with_num_threads(num_threads: usize) -> ThreadPool {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("ndbroadcast-{}", index))
            .build();
        if let Err(err) = &pool {
            warn!(%err, "failed to create thread pool, running on caller's thread");
        }

        ThreadPool { pool: pool.ok() }
    }

    /// Number of threads that work is spread across.
    pub fn num_threads(&self) -> usize {
        self.pool
            .as_ref()
            .map(|pool| pool.current_num_threads())
            .unwrap_or(1)
    }
}

/// Return the number of physical cores, which is the default size of the
/// pool.
fn optimal_core_count() -> usize {
    num_cpus::get_physical().max(1)
}

/// Return the [Rayon][rayon] thread pool used by
/// [`Slicer::visit_all_parallel`](crate::Slicer::visit_all_parallel)
/// callers that have no pool of their own.
///
/// The thread count defaults to the number of physical cores. It can be
/// overridden by setting the `NDBROADCAST_NUM_THREADS` environment variable,
/// whose value is clamped to the logical core count.
///
/// [rayon]: https://github.com/rayon-rs/rayon
pub fn thread_pool() -> &'static ThreadPool {
    static THREAD_POOL: OnceLock<ThreadPool> = OnceLock::new();
    THREAD_POOL.get_or_init(|| {
        let num_threads = match config().num_threads {
            Some(n) => n.clamp(1, num_cpus::get().max(1)),
            None => optimal_core_count(),
        };
        ThreadPool::with_num_threads(num_threads)
    })
}
