//! Bounded worker pool for chunk downloads.
//!
//! Chunk workers of every stream run on one shared pool. Stream-level
//! tasks must never run here: they block on a [`Latch`] until their chunks
//! finish, and if they held pool threads the chunks queued behind them
//! could never start.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::error;

use super::error::{DownloadError, DownloadResult};

/// Fixed-size thread pool shared by all chunk workers.
pub struct ChunkPool {
    pool: ThreadPool,
    threads: usize,
}

impl std::fmt::Debug for ChunkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkPool")
            .field("threads", &self.threads)
            .finish()
    }
}

impl ChunkPool {
    /// Create a pool with `threads` workers (minimum 1).
    pub fn new(threads: usize) -> DownloadResult<Self> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("chunk-worker-{}", i))
            .panic_handler(|_| error!("Chunk worker panicked"))
            .build()
            .map_err(|e| DownloadError::Pool(e.to_string()))?;

        Ok(Self { pool, threads })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Queue a job; returns immediately.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }
}

/// Count-down barrier.
///
/// `wait` returns once `count_down` has been called `count` times,
/// regardless of whether the participants succeeded.
#[derive(Debug)]
pub struct Latch {
    remaining: Mutex<usize>,
    zero: Condvar,
}

impl Latch {
    /// Create a latch for `count` participants.
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: Mutex::new(count),
            zero: Condvar::new(),
        })
    }

    /// Mark one participant finished.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.zero.notify_all();
            }
        }
    }

    /// Block until every participant has finished.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.zero.wait(&mut remaining);
        }
    }

    /// Participants still running.
    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }
}

/// Counts a latch down when dropped, including during a panic unwind.
pub(crate) struct LatchGuard(pub(crate) Arc<Latch>);

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.0.count_down();
    }
}
