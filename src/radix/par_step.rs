//! Out-of-place parallel bucket step: count, distribute, recurse.
//!
//! A sub-range above the sequential threshold is cut into `parts` equal
//! slices. Every slice first histograms its digits into its own row of a
//! shared table (count); the last slice to finish turns the table into
//! per-slice, per-digit write offsets with one inclusive prefix sum and
//! fans out the scatter pass (distribute), which moves every element into
//! its bucket in the shadow buffer. The last scatter slice then walks the
//! finished bucket boundaries and feeds each bucket back to the dispatcher
//! with the buffers flipped.
//!
//! The shared table and digit cache are plain memory written at disjoint
//! rows/segments; the only synchronization is the atomic countdown that
//! separates the two phases, and reaching zero is an exclusive event, so
//! each `*_finished` step runs exactly once.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::radix::context::SortContext;
use crate::radix::radix_key::{Digit, RadixKey};
use crate::radix::shadow::ShadowPtr;

/// Heap storage written concurrently at caller-guaranteed disjoint ranges.
struct SharedSlice<U> {
    storage: UnsafeCell<Box<[U]>>,
}

// SAFETY: all access goes through `slice_mut`, whose contract requires
// disjoint ranges across threads.
unsafe impl<U: Send> Send for SharedSlice<U> {}
unsafe impl<U: Send> Sync for SharedSlice<U> {}

impl<U> SharedSlice<U> {
    fn new(storage: Box<[U]>) -> Self {
        Self {
            storage: UnsafeCell::new(storage),
        }
    }

    /// # Safety
    /// Concurrent callers must request disjoint ranges; a caller may take
    /// the full slice only while no other access is live (phase barriers
    /// guarantee both here).
    #[inline(always)]
    unsafe fn slice_mut<'a>(&self, start: usize, len: usize) -> &'a mut [U] {
        let storage = &mut *self.storage.get();
        debug_assert!(start + len <= storage.len());
        std::slice::from_raw_parts_mut(storage.as_mut_ptr().add(start), len)
    }
}

/// Shared state of one three-phase pass. Owned by the phase closures via
/// `Arc`; the clone held by the slice that runs `distribute_finished` is
/// the last one standing, so the table and cache are freed exactly once,
/// after every continuation has been submitted.
pub(crate) struct ParRadixStep<T, D: Digit> {
    cursor: ShadowPtr<T>,
    /// Byte depth of the digit this pass partitions on.
    depth: usize,
    /// Number of slices the sub-range is cut into.
    parts: usize,
    /// Elements per slice; the last slice may be shorter.
    psize: usize,
    /// Countdown used as the fan-in barrier of each phase.
    pwork: AtomicUsize,
    /// `RADIX * parts + 1` counters: per-slice histogram rows, then the
    /// prefix-summed write offsets, finally bucket boundaries in row 0.
    bkt: SharedSlice<usize>,
    /// Digit of every element, extracted once during count and reused by
    /// distribute.
    cache: SharedSlice<D>,
}

pub(crate) fn enqueue_par_step<T, D>(
    ctx: &Arc<SortContext<T, D>>,
    cursor: ShadowPtr<T>,
    depth: usize,
) where
    T: RadixKey + Copy + Send + Sync + 'static,
    D: Digit,
{
    let n = cursor.len();
    let parts = n.div_ceil(ctx.sequential_threshold()).max(1);
    let psize = n.div_ceil(parts);
    log::trace!("parallel step: {n} elements at depth {depth} split into {parts} slices");
    ctx.par_steps.fetch_add(1, Ordering::Relaxed);

    let step = Arc::new(ParRadixStep {
        cursor,
        depth,
        parts,
        psize,
        pwork: AtomicUsize::new(parts),
        bkt: SharedSlice::new(vec![0usize; D::RADIX * parts + 1].into_boxed_slice()),
        cache: SharedSlice::new(vec![D::default(); n].into_boxed_slice()),
    });

    let pool = Arc::clone(&ctx.pool);
    for p in 0..parts {
        let step = Arc::clone(&step);
        let ctx = Arc::clone(ctx);
        pool.submit(Box::new(move || step.count(p, &ctx)));
    }
}

impl<T, D> ParRadixStep<T, D>
where
    T: RadixKey + Copy + Send + Sync + 'static,
    D: Digit,
{
    /// Slice bounds of part `p`.
    #[inline]
    fn slice_bounds(&self, p: usize) -> (usize, usize) {
        let lo = p * self.psize;
        let hi = ((p + 1) * self.psize).min(self.cursor.len());
        (lo.min(hi), hi)
    }

    fn count(self: &Arc<Self>, p: usize, ctx: &Arc<SortContext<T, D>>) {
        crate::scope!("count");
        let (lo, hi) = self.slice_bounds(p);

        // SAFETY: each part owns its cache segment and its table row.
        let cache = unsafe { self.cache.slice_mut(lo, hi - lo) };
        let row = unsafe { self.bkt.slice_mut(p * D::RADIX, D::RADIX) };

        for (c, i) in cache.iter_mut().zip(lo..hi) {
            // SAFETY: i is within this part's sub-range; count only reads.
            let v = unsafe { self.cursor.read(i) };
            let d = D::extract(&v, self.depth);
            *c = d;
            row[d.index()] += 1;
        }

        if self.pwork.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.count_finished(ctx);
        }
    }

    /// Runs once, on the slice that drove the countdown to zero: turn the
    /// histogram rows into per-slice inclusive write offsets and fan out
    /// the scatter pass.
    fn count_finished(self: &Arc<Self>, ctx: &Arc<SortContext<T, D>>) {
        crate::scope!("count_finished");
        log::trace!("count finished at depth {}, prefix-summing", self.depth);

        // SAFETY: the countdown hit zero, no other worker touches the table.
        let bkt = unsafe { self.bkt.slice_mut(0, D::RADIX * self.parts) };
        let mut sum = 0usize;
        for i in 0..D::RADIX {
            for p in 0..self.parts {
                let cell = &mut bkt[p * D::RADIX + i];
                sum += *cell;
                *cell = sum;
            }
        }
        assert_eq!(
            sum,
            self.cursor.len(),
            "digit histogram does not cover the sub-range"
        );

        self.pwork.store(self.parts, Ordering::Release);
        for p in 0..self.parts {
            let step = Arc::clone(self);
            let ctx2 = Arc::clone(ctx);
            ctx.pool.submit(Box::new(move || step.distribute(p, &ctx2)));
        }
    }

    fn distribute(self: &Arc<Self>, p: usize, ctx: &Arc<SortContext<T, D>>) {
        crate::scope!("distribute");
        let (lo, hi) = self.slice_bounds(p);

        // SAFETY: disjoint per part, and count finished before any
        // distribute slice started.
        let cache = unsafe { self.cache.slice_mut(lo, hi - lo) };
        let row = unsafe { self.bkt.slice_mut(p * D::RADIX, D::RADIX) };

        let mut offsets = row.to_vec();
        for (c, i) in cache.iter().zip(lo..hi) {
            let d = c.index();
            offsets[d] -= 1;
            // SAFETY: prefix sums reserve a distinct shadow position per
            // element; reads stay within this part's slice.
            unsafe { self.cursor.shadow_write(offsets[d], self.cursor.read(i)) };
        }

        // Slice 0 decremented each offset down to its bucket's start; the
        // recursion step reads the boundaries from row 0.
        if p == 0 {
            row.copy_from_slice(&offsets);
        }

        if self.pwork.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.distribute_finished(ctx);
        }
    }

    /// Runs once, after every slice scattered: hand each bucket back to
    /// the dispatcher with the buffers flipped.
    fn distribute_finished(&self, ctx: &Arc<SortContext<T, D>>) {
        crate::scope!("distribute_finished");
        log::trace!("distribute finished at depth {}, enqueueing buckets", self.depth);

        let n = self.cursor.len();
        // SAFETY: exclusive again; only row 0 plus the sentinel are read.
        let bkt = unsafe { self.bkt.slice_mut(0, D::RADIX + 1) };
        bkt[D::RADIX] = n;
        assert_eq!(bkt[0], 0, "first bucket must start at offset zero");

        let next_depth = self.depth + D::ADD_DEPTH;
        for i in 0..D::RADIX {
            let start = bkt[i];
            let len = bkt[i + 1] - start;
            if len == 0 {
                continue;
            }
            if ctx.zero_tail_terminal && D::zero_tail(i) {
                // Terminator class: every remaining byte is zero, nothing
                // smaller distinguishes these elements.
                self.cursor.flip(start, len).copy_back();
                ctx.done(len);
            } else if len == 1 {
                self.cursor.flip(start, 1).copy_back();
                ctx.done(1);
            } else {
                ctx.enqueue(self.cursor.flip(start, len), next_depth);
            }
        }
    }
}
