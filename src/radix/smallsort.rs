//! In-place sequential bucketing driven by an explicit stack, with work
//! shedding.
//!
//! A frame is one single-byte partition pass: digits are cached, counted,
//! and the sub-range is permuted in place by following swap cycles through
//! the cache. The frame then sits on the stack while its buckets are
//! advanced one at a time; buckets that still need another digit push a
//! deeper frame, small ones drop to the comparison fallback.
//!
//! Because the stack is an indexable vector rather than the call stack,
//! the job can give work away mid-flight: whenever the queue reports idle
//! capacity, the bottom unshed frame has all of its remaining buckets
//! submitted as independent jobs, and a pop-front index moves up so the
//! local walk never returns to them. The job keeps running on its own top
//! of stack the whole time.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::radix::comparative_sort::comparative_sort;
use crate::radix::context::SortContext;
use crate::radix::radix_key::{Digit, RadixKey};
use crate::radix::shadow::ShadowPtr;

/// Boundary counter stored in frame tables: u32 until a single job covers
/// more than u32::MAX elements, which keeps 257-entry tables to a quarter
/// of the wide size.
pub(crate) trait BktSize: Copy + Default + Send + 'static {
    fn from_usize(v: usize) -> Self;
    fn to_usize(self) -> usize;
}

impl BktSize for u32 {
    #[inline(always)]
    fn from_usize(v: usize) -> Self {
        debug_assert!(v <= u32::MAX as usize);
        v as u32
    }

    #[inline(always)]
    fn to_usize(self) -> usize {
        self as usize
    }
}

impl BktSize for u64 {
    #[inline(always)]
    fn from_usize(v: usize) -> Self {
        v as u64
    }

    #[inline(always)]
    fn to_usize(self) -> usize {
        self as usize
    }
}

/// One partitioned level: the sub-range it covers, the digit depth it
/// partitioned on, the next bucket to advance, and the 257-entry exclusive
/// boundary table (closing sentinel equals the sub-range length).
struct RadixFrame<T, B> {
    cursor: ShadowPtr<T>,
    depth: usize,
    idx: usize,
    bkt: [B; 257],
}

impl<T, B> RadixFrame<T, B>
where
    T: RadixKey + Copy + Send + Sync + 'static,
    B: BktSize,
{
    /// Partition `cursor` on the byte at `depth`: cache digits, count,
    /// permute in place, and record the bucket boundaries.
    fn partition(cursor: ShadowPtr<T>, depth: usize, cache: &mut [u8]) -> Self {
        crate::scope!("partition");
        let n = cursor.len();
        // SAFETY: the sequential job exclusively owns its sub-range, and
        // nested frames cover disjoint slices of it one at a time.
        let data = unsafe { cursor.active_mut() };
        let cache = &mut cache[..n];

        for (c, v) in cache.iter_mut().zip(data.iter()) {
            *c = <u8 as Digit>::extract(v, depth);
        }

        let mut bktsize = [0usize; 256];
        for &c in cache.iter() {
            bktsize[c as usize] += 1;
        }

        // Running end offsets per bucket, and the size of the highest
        // nonempty bucket: once everything below it is placed, that bucket
        // is in position by exclusion and the scan can stop early.
        let mut bkt_end = [0usize; 256];
        let mut sum = 0usize;
        let mut last_bkt_size = bktsize[0];
        for i in 0..256 {
            sum += bktsize[i];
            bkt_end[i] = sum;
            if i > 0 && bktsize[i] != 0 {
                last_bkt_size = bktsize[i];
            }
        }

        // In-place permute: lift the element at the scan position and keep
        // swapping it into its bucket's next free slot (tracked by the
        // decrementing end offsets) until the cycle closes back at the scan
        // position, then jump the scan past the bucket that just completed.
        let mut i = 0usize;
        while i < n - last_bkt_size {
            let mut perm = data[i];
            let mut permch = cache[i];
            loop {
                bkt_end[permch as usize] -= 1;
                let j = bkt_end[permch as usize];
                if j <= i {
                    break;
                }
                std::mem::swap(&mut perm, &mut data[j]);
                std::mem::swap(&mut permch, &mut cache[j]);
            }
            data[i] = perm;
            i += bktsize[permch as usize];
        }

        let mut bkt = [B::default(); 257];
        let mut acc = 0usize;
        for b in 0..256 {
            bkt[b] = B::from_usize(acc);
            acc += bktsize[b];
        }
        bkt[256] = B::from_usize(acc);
        debug_assert_eq!(acc, n);

        Self {
            cursor,
            depth,
            idx: 0,
            bkt,
        }
    }

    #[inline]
    fn bucket(&self, b: usize) -> (usize, usize) {
        let lo = self.bkt[b].to_usize();
        let hi = self.bkt[b + 1].to_usize();
        (lo, hi - lo)
    }
}

/// Submit a sequential job, sized to 32- or 64-bit boundary counters.
pub(crate) fn enqueue_smallsort<T, D>(
    ctx: &Arc<SortContext<T, D>>,
    cursor: ShadowPtr<T>,
    depth: usize,
) where
    T: RadixKey + Copy + Send + Sync + 'static,
    D: Digit,
{
    ctx.seq_steps.fetch_add(1, Ordering::Relaxed);
    let ctx2 = Arc::clone(ctx);
    if cursor.len() as u64 <= u32::MAX as u64 {
        ctx.pool
            .submit(Box::new(move || run::<T, D, u32>(&ctx2, cursor, depth)));
    } else {
        ctx.pool
            .submit(Box::new(move || run::<T, D, u64>(&ctx2, cursor, depth)));
    }
}

fn run<T, D, B>(ctx: &Arc<SortContext<T, D>>, cursor: ShadowPtr<T>, depth: usize)
where
    T: RadixKey + Copy + Send + Sync + 'static,
    D: Digit,
    B: BktSize,
{
    crate::scope!("smallsort");
    let cursor = cursor.copy_back();
    let n = cursor.len();
    log::trace!("sequential job: {n} elements at depth {depth}");

    if n < ctx.subsort_threshold {
        ctx.fallback_steps.fetch_add(1, Ordering::Relaxed);
        // SAFETY: this job owns the whole sub-range.
        comparative_sort(unsafe { cursor.active_mut() }, depth, ctx.max_depth);
        ctx.done(n);
        return;
    }

    // One digit cache for the whole job: a frame only reads the cache
    // while partitioning, so nested frames can reuse the same storage.
    let mut cache = vec![0u8; n];
    let mut stack: Vec<RadixFrame<T, B>> = Vec::new();
    // Frames below this index have been shed to the queue and belong to
    // other jobs now; the local walk stops above them.
    let mut pop_front = 0usize;
    stack.push(RadixFrame::partition(cursor, depth, &mut cache));

    while stack.len() > pop_front {
        loop {
            let top = stack.len() - 1;
            if stack[top].idx == 256 {
                break;
            }

            let b = stack[top].idx;
            stack[top].idx += 1;
            let (lo, len) = stack[top].bucket(b);
            let frame_cursor = stack[top].cursor;
            let next_depth = stack[top].depth + 1;

            if len == 0 {
                // empty bucket
            } else if next_depth >= ctx.max_depth {
                // All budgeted digits equal across the bucket; it is in
                // place already.
                ctx.done(len);
            } else if len < ctx.subsort_threshold {
                ctx.fallback_steps.fetch_add(1, Ordering::Relaxed);
                let leaf = frame_cursor.sub(lo, len);
                // SAFETY: buckets of one frame are disjoint and this one is
                // visited exactly once.
                comparative_sort(unsafe { leaf.active_mut() }, next_depth, ctx.max_depth);
                ctx.done(len);
            } else {
                let sub = frame_cursor.sub(lo, len);
                stack.push(RadixFrame::partition(sub, next_depth, &mut cache));
            }

            if ctx.work_sharing && ctx.pool.has_idle() {
                shed(ctx, &mut stack[pop_front]);
                pop_front += 1;
                if stack.len() <= pop_front {
                    break;
                }
            }
        }
        if stack.len() > pop_front {
            stack.pop();
        }
    }
}

/// Convert every remaining bucket of `frame` into an independent job. The
/// frame's bucket index is run to the end so the local walk, if this frame
/// is also the top of stack, finds nothing left to do.
fn shed<T, D, B>(ctx: &Arc<SortContext<T, D>>, frame: &mut RadixFrame<T, B>)
where
    T: RadixKey + Copy + Send + Sync + 'static,
    D: Digit,
    B: BktSize,
{
    log::trace!("shedding remaining buckets of a depth-{} frame", frame.depth);
    while frame.idx < 256 {
        let b = frame.idx;
        frame.idx += 1;
        let (lo, len) = frame.bucket(b);
        if len == 0 {
            continue;
        }
        ctx.enqueue(frame.cursor.sub(lo, len), frame.depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_groups_by_most_significant_byte() {
        let mut data: Vec<u16> = vec![0x0102, 0xFF00, 0x0101, 0x0203, 0xFF01, 0x0102];
        let mut scratch = vec![0u16; 6];
        let cursor = unsafe { ShadowPtr::new(data.as_mut_ptr(), scratch.as_mut_ptr(), 6) };
        let mut cache = vec![0u8; 6];

        let frame: RadixFrame<u16, u32> = RadixFrame::partition(cursor, 0, &mut cache);

        assert_eq!(frame.bucket(0x00), (0, 0));
        assert_eq!(frame.bucket(0x01), (0, 3));
        assert_eq!(frame.bucket(0x02), (3, 1));
        assert_eq!(frame.bucket(0xFF), (4, 2));
        assert_eq!(frame.bkt[256].to_usize(), 6);

        assert!(data[..3].iter().all(|v| v >> 8 == 0x01));
        assert_eq!(data[3], 0x0203);
        assert!(data[4..].iter().all(|v| v >> 8 == 0xFF));
    }

    #[test]
    fn partition_handles_single_bucket_input() {
        let mut data: Vec<u32> = vec![0x0500_0001, 0x0500_0003, 0x0500_0002];
        let mut scratch = vec![0u32; 3];
        let cursor = unsafe { ShadowPtr::new(data.as_mut_ptr(), scratch.as_mut_ptr(), 3) };
        let mut cache = vec![0u8; 3];

        let frame: RadixFrame<u32, u32> = RadixFrame::partition(cursor, 0, &mut cache);

        assert_eq!(frame.bucket(0x05), (0, 3));
        // Elements stay untouched: the only bucket is in place by exclusion.
        assert_eq!(data, vec![0x0500_0001, 0x0500_0003, 0x0500_0002]);
    }
}
