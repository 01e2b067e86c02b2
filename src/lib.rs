//! Parallel work-shedding MSB radix sort for fixed-width keyed records.
//!
//! Records expose a fixed-width key through [`RadixKey`]; the engine sorts
//! them by recursively partitioning on 1- or 2-byte digits, most
//! significant first. Large sub-ranges run an out-of-place, multi-worker
//! count/distribute pass over a shadow buffer; small sub-ranges run an
//! in-place, stack-driven sequential pass that hands the bottom of its
//! stack to idle workers whenever the scheduler has spare capacity. Tiny
//! buckets finish with a comparison fallback.
//!
//! ```
//! use shedsort::{radix_sort, DigitWidth};
//!
//! let mut data: Vec<u64> = vec![981, 3, 55_701, 3, 0, u64::MAX];
//! radix_sort(&mut data, DigitWidth::U8, 8);
//! assert_eq!(data, vec![0, 3, 3, 981, 55_701, u64::MAX]);
//! ```
//!
//! The sort is unstable and in place from the caller's point of view; the
//! scratch buffer lives only for the duration of the call. Keys compare on
//! the first `max_digits` digits — pass enough digits to cover the whole
//! key (e.g. 8 byte digits for a `u64`) for a total order over the full
//! key. Invariant violations abort rather than return errors: a sort that
//! cannot finish correctly has nothing useful to hand back.

use std::mem::MaybeUninit;
use std::sync::Arc;

pub mod pool;
pub mod radix;

pub use pool::{Backend, Job, RayonQueue, TaskQueue, ThreadPool};
pub use radix::radix_key::RadixKey;
pub use radix::{DigitWidth, SortConfig};

use radix::context::SortContext;
use radix::radix_key::Digit;
use radix::shadow::ShadowPtr;

/// Profiling scope marker; expands to nothing unless the `profile` feature
/// is enabled.
#[macro_export]
macro_rules! scope {
    ($name:expr) => {
        #[cfg(feature = "profile")]
        profiling::scope!($name);
    };
}

/// Sort `data` by its radix key with the default configuration.
///
/// `max_digits` is the number of digits of the chosen width to partition
/// on, counted from the most-significant end of the key and capped at the
/// key width.
pub fn radix_sort<T>(data: &mut [T], width: DigitWidth, max_digits: usize)
where
    T: RadixKey + Copy + Send + Sync + 'static,
{
    radix_sort_with(data, width, max_digits, &SortConfig::default());
}

/// Sort with explicit configuration, spawning a scheduler for the call.
pub fn radix_sort_with<T>(data: &mut [T], width: DigitWidth, max_digits: usize, config: &SortConfig)
where
    T: RadixKey + Copy + Send + Sync + 'static,
{
    if data.len() <= 1 {
        return;
    }
    let pool = config.backend.spawn(config.threads);
    radix_sort_in(&pool, data, width, max_digits, config);
}

/// Sort on a caller-provided scheduler, reusing its worker threads across
/// sorts. Blocks until the task graph of this sort has drained; sharing
/// the pool with other concurrent work extends the wait to that work too.
pub fn radix_sort_in<T>(
    pool: &Arc<dyn TaskQueue>,
    data: &mut [T],
    width: DigitWidth,
    max_digits: usize,
    config: &SortConfig,
) where
    T: RadixKey + Copy + Send + Sync + 'static,
{
    match width {
        DigitWidth::U8 => sort_impl::<T, u8>(pool, data, max_digits, config),
        DigitWidth::U16 => sort_impl::<T, u16>(pool, data, max_digits, config),
    }
}

fn sort_impl<T, D>(pool: &Arc<dyn TaskQueue>, data: &mut [T], max_digits: usize, config: &SortConfig)
where
    T: RadixKey + Copy + Send + Sync + 'static,
    D: Digit,
{
    crate::scope!("radix_sort");
    let n = data.len();
    if n <= 1 {
        return;
    }

    let max_depth = (max_digits.saturating_mul(D::ADD_DEPTH)).min(T::LEVELS);

    let mut shadow: Vec<MaybeUninit<T>> = Vec::with_capacity(n);
    // SAFETY: MaybeUninit slots need no initialization; the distribute pass
    // writes an element before anything reads it.
    unsafe { shadow.set_len(n) };

    let ctx = Arc::new(SortContext::<T, D>::new(
        n,
        max_depth,
        config,
        Arc::clone(pool),
    ));

    // SAFETY: data and shadow are disjoint allocations of n elements, and
    // both outlive the drain below, after which no job holds a cursor.
    let cursor = unsafe { ShadowPtr::new(data.as_mut_ptr(), shadow.as_mut_ptr() as *mut T, n) };
    ctx.enqueue(cursor, 0);
    ctx.pool.drain();
    ctx.log_totals();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_small_u64_input() {
        let mut data: Vec<u64> = vec![5, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5, 8, 9, 7, 9, 3];
        radix_sort(&mut data, DigitWidth::U8, 8);
        assert_eq!(data, vec![1, 1, 2, 3, 3, 4, 5, 5, 5, 5, 6, 7, 8, 9, 9, 9]);
    }

    #[test]
    fn empty_and_singleton_are_no_ops() {
        let mut empty: Vec<u32> = Vec::new();
        radix_sort(&mut empty, DigitWidth::U8, 4);
        assert!(empty.is_empty());

        let mut one = vec![17u32];
        radix_sort(&mut one, DigitWidth::U16, 2);
        assert_eq!(one, vec![17]);
    }

    #[test]
    fn zero_digit_budget_leaves_data_alone() {
        let mut data = vec![3u32, 1, 2];
        radix_sort(&mut data, DigitWidth::U8, 0);
        assert_eq!(data, vec![3, 1, 2]);
    }

    #[test]
    fn custom_record_sorts_by_embedded_key() {
        #[derive(Clone, Copy, Debug, PartialEq)]
        struct Item {
            code: u32,
            payload: u32,
        }

        impl RadixKey for Item {
            const LEVELS: usize = 4;
            #[inline(always)]
            fn get_level(&self, level: usize) -> u8 {
                self.code.get_level(level)
            }
        }

        let mut items: Vec<Item> = (0..200u32)
            .rev()
            .map(|i| Item {
                code: i % 50,
                payload: i,
            })
            .collect();
        radix_sort(&mut items, DigitWidth::U8, 4);
        for w in items.windows(2) {
            assert!(w[0].code <= w[1].code);
        }
        // Records travel with their keys.
        for item in &items {
            assert_eq!(item.payload % 50, item.code);
        }
    }
}
