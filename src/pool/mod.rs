//! Task scheduling for the sort engine.
//!
//! Every unit of sorting work goes through the [`TaskQueue`] contract:
//! `submit` enqueues a closure for a fixed pool of workers, `has_idle` is a
//! racy hint used to decide when to shed work, and `drain` blocks until the
//! transitive closure of submitted work has finished (jobs freely submit
//! further jobs).

use std::str::FromStr;
use std::sync::{Arc, OnceLock};

pub mod native;
pub mod rayon_queue;

pub use native::ThreadPool;
pub use rayon_queue::RayonQueue;

/// A unit of work. Jobs own all the state they need and may submit more jobs.
pub type Job = Box<dyn FnOnce() + Send>;

/// Fixed-size worker pool draining a shared queue of [`Job`]s.
///
/// A job that panics aborts the process: the engine has no partial-failure
/// recovery, and a silently dead job would leave `drain` waiting forever.
pub trait TaskQueue: Send + Sync {
    /// Enqueue a job and return immediately.
    fn submit(&self, job: Job);

    /// Best-effort: is at least one worker currently not running a job?
    ///
    /// Inherently racy. A stale answer only delays or triggers extra work
    /// shedding; it never affects the sorted result.
    fn has_idle(&self) -> bool;

    /// Block until the queue is empty and all in-flight jobs have returned,
    /// including jobs submitted by other jobs after `drain` was called.
    fn drain(&self);

    /// Number of worker threads.
    fn workers(&self) -> usize;
}

static AVAILABLE_PARALLELISM: OnceLock<usize> = OnceLock::new();

/// Hardware parallelism, queried once.
#[inline(always)]
pub fn cached_available_parallelism() -> usize {
    *AVAILABLE_PARALLELISM.get_or_init(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

/// Which scheduler implementation backs the sort.
#[derive(PartialEq, Eq, Default, Clone, Copy, Debug)]
pub enum Backend {
    #[default]
    Native,
    Rayon,
}

impl FromStr for Backend {
    type Err = String;

    #[inline(always)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "rayon" => Ok(Self::Rayon),
            _ => Err(format!("Unknown backend: '{s}', valid backends: 'native', 'rayon'")),
        }
    }
}

impl Backend {
    /// Spawn a queue with `threads` workers (0 means hardware parallelism).
    pub fn spawn(self, threads: usize) -> Arc<dyn TaskQueue> {
        let threads = if threads == 0 {
            cached_available_parallelism()
        } else {
            threads
        };
        match self {
            Backend::Native => Arc::new(ThreadPool::new(threads)),
            Backend::Rayon => Arc::new(RayonQueue::new(threads)),
        }
    }
}
