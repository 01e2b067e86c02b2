//! Per-sort shared state and the job dispatch policy.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::pool::TaskQueue;
use crate::radix::par_step;
use crate::radix::radix_key::{Digit, RadixKey};
use crate::radix::shadow::ShadowPtr;
use crate::radix::smallsort;
use crate::radix::SortConfig;

/// One instance per top-level sort. Jobs reach it through an `Arc`; it
/// outlives the last job because the entry point drains the queue before
/// dropping its own handle.
pub(crate) struct SortContext<T, D> {
    /// Total input length, fixed at construction.
    pub total_size: usize,
    /// Elements not yet finally sorted; only maintained under the
    /// rest-size policy.
    rest_size: AtomicUsize,
    /// First byte depth that is past the configured digit budget.
    pub max_depth: usize,
    pub subsort_threshold: usize,
    pub work_sharing: bool,
    use_rest_size: bool,
    pub zero_tail_terminal: bool,
    num_threads: usize,

    // step counters, reported once the sort completes
    pub par_steps: AtomicUsize,
    pub seq_steps: AtomicUsize,
    pub fallback_steps: AtomicUsize,

    pub pool: Arc<dyn TaskQueue>,
    _marker: PhantomData<fn() -> (T, D)>,
}

impl<T, D> SortContext<T, D>
where
    T: RadixKey + Copy + Send + Sync + 'static,
    D: Digit,
{
    pub fn new(
        total_size: usize,
        max_depth: usize,
        config: &SortConfig,
        pool: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            total_size,
            rest_size: AtomicUsize::new(total_size),
            max_depth,
            subsort_threshold: config.subsort_threshold,
            work_sharing: config.work_sharing,
            use_rest_size: config.use_rest_size,
            zero_tail_terminal: config.zero_tail_terminal,
            num_threads: pool.workers().max(1),
            par_steps: AtomicUsize::new(0),
            seq_steps: AtomicUsize::new(0),
            fallback_steps: AtomicUsize::new(0),
            pool,
            _marker: PhantomData,
        }
    }

    /// Sub-ranges larger than this become parallel bucket steps.
    pub fn sequential_threshold(&self) -> usize {
        let basis = if self.use_rest_size {
            self.rest_size.load(Ordering::Relaxed)
        } else {
            self.total_size
        };
        self.subsort_threshold.max(basis / self.num_threads)
    }

    /// Mark `n` elements finally sorted.
    pub fn done(&self, n: usize) {
        if self.use_rest_size && n > 0 {
            self.rest_size.fetch_sub(n, Ordering::Relaxed);
        }
    }

    /// The single fan-out point: every sub-range that still needs digit
    /// decomposition re-enters here, from the top level and from both job
    /// kinds.
    pub fn enqueue(self: &Arc<Self>, cursor: ShadowPtr<T>, depth: usize) {
        if cursor.len() <= 1 || depth >= self.max_depth {
            // Trivially sorted, or every budgeted digit is already equal
            // across the range.
            cursor.copy_back();
            self.done(cursor.len());
            return;
        }

        if cursor.len() > self.sequential_threshold() {
            par_step::enqueue_par_step(self, cursor, depth);
        } else {
            smallsort::enqueue_smallsort(self, cursor, depth);
        }
    }

    pub fn log_totals(&self) {
        log::debug!(
            "sorted {} elements: {} parallel steps, {} sequential jobs, {} fallback sorts",
            self.total_size,
            self.par_steps.load(Ordering::Relaxed),
            self.seq_steps.load(Ordering::Relaxed),
            self.fallback_steps.load(Ordering::Relaxed),
        );
    }
}
