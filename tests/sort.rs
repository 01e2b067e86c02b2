//! End-to-end properties of the parallel radix sort.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use shedsort::{
    radix_sort, radix_sort_in, radix_sort_with, Backend, DigitWidth, Job, RadixKey, SortConfig,
    TaskQueue, ThreadPool,
};

fn random_u64s(n: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random::<u64>()).collect()
}

/// Uniform draws from a small value set: plenty of duplicates.
fn duplicate_heavy_u64s(n: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(0..1000u64)).collect()
}

fn assert_matches_reference(mut data: Vec<u64>, width: DigitWidth, max_digits: usize) {
    let mut reference = data.clone();
    reference.sort_unstable();
    radix_sort(&mut data, width, max_digits);
    assert_eq!(data, reference);
}

#[test]
fn total_order_and_permutation_random_u64() {
    for size in [0, 1, 2, 16, 255, 4096, 100_000] {
        assert_matches_reference(random_u64s(size, 0xDEAD + size as u64), DigitWidth::U8, 8);
    }
}

#[test]
fn geometric_size_sweep() {
    // Sizes growing by 1.5x across the sequential/parallel crossover.
    let mut size = 256;
    while size <= 200_000 {
        assert_matches_reference(random_u64s(size, size as u64), DigitWidth::U8, 8);
        size = 2 * size - size / 2;
    }
}

#[test]
fn worker_count_invariance() {
    let input = random_u64s(50_000, 42);
    let mut outputs = Vec::new();
    for threads in [1, 2, 0] {
        let mut data = input.clone();
        let config = SortConfig {
            threads,
            ..SortConfig::default()
        };
        radix_sort_with(&mut data, DigitWidth::U8, 8, &config);
        outputs.push(data);
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[1], outputs[2]);
    let mut reference = input;
    reference.sort_unstable();
    assert_eq!(outputs[0], reference);
}

#[test]
fn threshold_invariance() {
    let input = duplicate_heavy_u64s(30_000, 7);
    let mut reference = input.clone();
    reference.sort_unstable();
    for subsort_threshold in [2, 32, 4096, 1 << 20] {
        let mut data = input.clone();
        let config = SortConfig {
            subsort_threshold,
            ..SortConfig::default()
        };
        radix_sort_with(&mut data, DigitWidth::U8, 8, &config);
        assert_eq!(data, reference, "threshold {subsort_threshold}");
    }
}

#[test]
fn boundary_sizes_around_subsort_threshold() {
    let threshold = SortConfig::default().subsort_threshold;
    for size in [0, 1, threshold, threshold + 1] {
        assert_matches_reference(random_u64s(size, 99), DigitWidth::U8, 8);
    }
}

#[test]
fn two_byte_digit_sorts_u16_permutation_to_identity() {
    let mut data: Vec<u16> = (0..=u16::MAX).collect();
    // Fisher-Yates with a fixed seed.
    let mut rng = StdRng::seed_from_u64(123456);
    for i in (1..data.len()).rev() {
        data.swap(i, rng.random_range(0..=i));
    }
    radix_sort(&mut data, DigitWidth::U16, 1);
    for (i, v) in data.iter().enumerate() {
        assert_eq!(i, *v as usize);
    }
}

#[test]
fn digit_widths_agree_on_u64() {
    let input = random_u64s(80_000, 0xABCD);
    let mut narrow = input.clone();
    let mut wide = input;
    radix_sort(&mut narrow, DigitWidth::U8, 8);
    radix_sort(&mut wide, DigitWidth::U16, 4);
    assert_eq!(narrow, wide);
}

#[test]
fn rayon_backend_matches_native() {
    let input = random_u64s(60_000, 0xBEEF);
    let mut reference = input.clone();
    reference.sort_unstable();
    for backend in [Backend::Native, Backend::Rayon] {
        let mut data = input.clone();
        let config = SortConfig {
            backend,
            ..SortConfig::default()
        };
        radix_sort_with(&mut data, DigitWidth::U8, 8, &config);
        assert_eq!(data, reference, "{backend:?}");
    }
}

#[test]
fn rest_size_policy_sorts_identically() {
    let input = duplicate_heavy_u64s(40_000, 0x5EED);
    let mut reference = input.clone();
    reference.sort_unstable();
    let mut data = input;
    let config = SortConfig {
        use_rest_size: true,
        ..SortConfig::default()
    };
    radix_sort_with(&mut data, DigitWidth::U8, 8, &config);
    assert_eq!(data, reference);
}

/// Forwards to a real pool but fixes the idle answer, driving the work
/// shedding path to one extreme.
struct FixedIdle {
    inner: ThreadPool,
    idle: bool,
}

impl TaskQueue for FixedIdle {
    fn submit(&self, job: Job) {
        self.inner.submit(job);
    }

    fn has_idle(&self) -> bool {
        self.idle
    }

    fn drain(&self) {
        self.inner.drain();
    }

    fn workers(&self) -> usize {
        self.inner.workers()
    }
}

#[test]
fn shedding_extremes_sort_identically() {
    let input = duplicate_heavy_u64s(50_000, 0x1D1E);
    let mut reference = input.clone();
    reference.sort_unstable();

    for idle in [true, false] {
        let pool: Arc<dyn TaskQueue> = Arc::new(FixedIdle {
            inner: ThreadPool::new(4),
            idle,
        });
        let mut data = input.clone();
        radix_sort_in(&pool, &mut data, DigitWidth::U8, 8, &SortConfig::default());
        assert_eq!(data, reference, "forced has_idle = {idle}");
    }

    // Shedding disabled entirely: the stack walk runs to completion
    // locally even with idle workers available.
    let mut data = input;
    let config = SortConfig {
        work_sharing: false,
        ..SortConfig::default()
    };
    radix_sort_with(&mut data, DigitWidth::U8, 8, &config);
    assert_eq!(data, reference);
}

#[test]
fn records_are_preserved_as_a_multiset() {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct Rec {
        key: u32,
        tag: u32,
    }

    impl RadixKey for Rec {
        const LEVELS: usize = 4;
        #[inline(always)]
        fn get_level(&self, level: usize) -> u8 {
            self.key.get_level(level)
        }
    }

    let mut rng = StdRng::seed_from_u64(404);
    let original: Vec<Rec> = (0..25_000u32)
        .map(|tag| Rec {
            key: rng.random_range(0..500),
            tag,
        })
        .collect();

    let mut sorted = original.clone();
    radix_sort(&mut sorted, DigitWidth::U8, 4);

    for w in sorted.windows(2) {
        assert!(w[0].key <= w[1].key);
    }

    let mut lhs = sorted;
    let mut rhs = original;
    lhs.sort_unstable();
    rhs.sort_unstable();
    assert_eq!(lhs, rhs);
}

/// Keys where a zero byte ends the significant prefix: every byte after
/// the first zero is zero too.
fn terminator_encoded_u64s(n: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let v = rng.random::<u64>() | 0x0101_0101_0101_0101; // no interior zero bytes
            let kept = rng.random_range(0..=8u32);
            if kept == 0 {
                0
            } else {
                v & (u64::MAX << (64 - kept * 8))
            }
        })
        .collect()
}

#[test]
fn zero_tail_shortcut_sorts_terminator_keys() {
    let input = terminator_encoded_u64s(40_000, 0x7E57);
    let mut reference = input.clone();
    reference.sort_unstable();
    for width in [DigitWidth::U8, DigitWidth::U16] {
        let digits = match width {
            DigitWidth::U8 => 8,
            DigitWidth::U16 => 4,
        };
        let mut data = input.clone();
        let config = SortConfig {
            zero_tail_terminal: true,
            ..SortConfig::default()
        };
        radix_sort_with(&mut data, width, digits, &config);
        assert_eq!(data, reference, "{width:?}");
    }
}

#[test]
fn stress_three_orders_of_magnitude() {
    for size in [16, 65_536, 2_097_152] {
        // Mixed regime: half full-range keys, half heavy duplicates.
        let mut data = random_u64s(size / 2, size as u64);
        data.extend(duplicate_heavy_u64s(size - size / 2, !(size as u64)));
        let mut reference = data.clone();
        reference.sort_unstable();
        radix_sort(&mut data, DigitWidth::U8, 8);
        assert_eq!(data, reference, "size {size}");
    }
}

#[test]
#[ignore = "needs ~256 MiB and a few seconds; run with --ignored"]
fn stress_sixteen_million() {
    let mut data = random_u64s(16_777_216, 16);
    let mut reference = data.clone();
    reference.sort_unstable();
    radix_sort(&mut data, DigitWidth::U8, 8);
    assert_eq!(data, reference);
}
