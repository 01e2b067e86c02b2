//! The radix sort engine.
//!
//! One dispatch point (`context::SortContext::enqueue`) decides per
//! sub-range between the out-of-place parallel bucket step (`par_step`)
//! and the in-place sequential stack job (`smallsort`); both feed every
//! bucket that still needs work back into the same dispatch point.

use crate::pool::Backend;

pub(crate) mod comparative_sort;
pub(crate) mod context;
pub(crate) mod par_step;
pub mod radix_key;
pub(crate) mod shadow;
pub(crate) mod smallsort;

/// Width of one radix digit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigitWidth {
    /// 8-bit digits, 256 buckets per pass.
    U8,
    /// 16-bit digits, 65536 buckets per pass.
    U16,
}

/// Tuning and policy knobs for one sort. The defaults match the reference
/// behavior: work sharing on, thresholds computed against the total input
/// size, digit-0 classes sorted like any other bucket.
#[derive(Clone, Debug)]
pub struct SortConfig {
    /// Worker threads; 0 means hardware parallelism.
    pub threads: usize,
    /// Below this sub-range length the engine stops partitioning and runs
    /// the comparison fallback.
    pub subsort_threshold: usize,
    /// Allow sequential jobs to shed the bottom of their stack to idle
    /// workers.
    pub work_sharing: bool,
    /// Base the sequential/parallel threshold on the live count of
    /// not-yet-sorted elements instead of the total input size.
    pub use_rest_size: bool,
    /// Treat buckets whose digit ends in a zero byte as finished without
    /// further passes. Only valid for terminator-encoded keys where a zero
    /// byte implies every later byte is zero.
    pub zero_tail_terminal: bool,
    /// Scheduler implementation.
    pub backend: Backend,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            subsort_threshold: 32,
            work_sharing: true,
            use_rest_size: false,
            zero_tail_terminal: false,
            backend: Backend::default(),
        }
    }
}
