//! Native thread pool: a fixed set of workers over a mutex/condvar queue.
//!
//! The pending counter covers queued *and* running jobs and is decremented
//! only after a job returns, so a job that submits sub-jobs keeps the count
//! nonzero until the whole task graph has run. `drain` waits on exactly that
//! counter reaching zero.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::pool::{Job, TaskQueue};

struct State {
    queue: VecDeque<Job>,
    /// Queued plus in-flight jobs.
    pending: usize,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    work_avail: Condvar,
    all_done: Condvar,
    /// Workers currently parked waiting for work. Read without the lock by
    /// `has_idle`; staleness is fine.
    idle: AtomicUsize,
}

/// Fixed-size worker pool with a shared job queue.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

/// Aborts the process if the enclosing scope unwinds.
///
/// A panicking job means corrupted sort state; `drain` must never be left
/// waiting on a decrement that will not happen.
struct PanicBomb;

impl Drop for PanicBomb {
    fn drop(&mut self) {
        if std::thread::panicking() {
            std::process::abort();
        }
    }
}

impl ThreadPool {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                pending: 0,
                shutdown: false,
            }),
            work_avail: Condvar::new(),
            all_done: Condvar::new(),
            idle: AtomicUsize::new(0),
        });

        let workers = (0..threads)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || worker_loop(&shared))
            })
            .collect();

        Self { shared, workers }
    }
}

fn worker_loop(shared: &Shared) {
    let mut state = shared.state.lock().unwrap();
    loop {
        if let Some(job) = state.queue.pop_front() {
            drop(state);
            {
                let bomb = PanicBomb;
                job();
                drop(bomb);
            }
            state = shared.state.lock().unwrap();
            state.pending -= 1;
            if state.pending == 0 {
                shared.all_done.notify_all();
            }
        } else if state.shutdown {
            return;
        } else {
            shared.idle.fetch_add(1, Ordering::Relaxed);
            state = shared.work_avail.wait(state).unwrap();
            shared.idle.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl TaskQueue for ThreadPool {
    fn submit(&self, job: Job) {
        let mut state = self.shared.state.lock().unwrap();
        state.pending += 1;
        state.queue.push_back(job);
        drop(state);
        self.shared.work_avail.notify_one();
    }

    #[inline]
    fn has_idle(&self) -> bool {
        self.shared.idle.load(Ordering::Relaxed) > 0
    }

    fn drain(&self) {
        let mut state = self.shared.state.lock().unwrap();
        while state.pending > 0 {
            state = self.shared.all_done.wait(state).unwrap();
        }
    }

    fn workers(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
        }
        self.shared.work_avail.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
