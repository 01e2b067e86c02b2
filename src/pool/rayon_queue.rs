//! rayon-backed [`TaskQueue`].
//!
//! rayon has no drain-all primitive and no idle query, so the adapter keeps
//! its own counters: `pending` (queued + running, backs `drain`) and
//! `active` (running, backs `has_idle`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::pool::{Job, TaskQueue};

struct Counters {
    pending: AtomicUsize,
    active: AtomicUsize,
    done_lock: Mutex<()>,
    all_done: Condvar,
}

pub struct RayonQueue {
    pool: rayon::ThreadPool,
    counters: Arc<Counters>,
    threads: usize,
}

impl RayonQueue {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("failed to build rayon pool");
        Self {
            pool,
            counters: Arc::new(Counters {
                pending: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                done_lock: Mutex::new(()),
                all_done: Condvar::new(),
            }),
            threads,
        }
    }
}

impl TaskQueue for RayonQueue {
    fn submit(&self, job: Job) {
        let counters = Arc::clone(&self.counters);
        counters.pending.fetch_add(1, Ordering::AcqRel);
        self.pool.spawn(move || {
            counters.active.fetch_add(1, Ordering::Relaxed);
            job();
            counters.active.fetch_sub(1, Ordering::Relaxed);
            if counters.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                let _guard = counters.done_lock.lock().unwrap();
                counters.all_done.notify_all();
            }
        });
    }

    #[inline]
    fn has_idle(&self) -> bool {
        self.counters.active.load(Ordering::Relaxed) < self.threads
    }

    fn drain(&self) {
        let mut guard = self.counters.done_lock.lock().unwrap();
        while self.counters.pending.load(Ordering::Acquire) > 0 {
            guard = self.counters.all_done.wait(guard).unwrap();
        }
        drop(guard);
    }

    fn workers(&self) -> usize {
        self.threads
    }
}
