//! Worker pool for parallel batch loading.
//!
//! Each worker owns its own bounded task channel, so the main thread decides
//! which worker handles which batch. Combined with the per-worker RNG seeding
//! this keeps random transforms reproducible for a given seed.

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::dataloader::common::thread::WORKER_ID;

/// Thread pool for parallel data loading.
///
/// - Task channels: Main thread -> Worker `i` (one bounded channel each)
/// - Output channel: Workers -> Main thread
/// - Shutdown flag: Enables graceful termination
pub(crate) struct WorkerPool<Task, Output> {
    workers: Vec<thread::JoinHandle<()>>,
    task_txs: Vec<Sender<Task>>,
    output_rx: Receiver<Output>,
    shutdown: Arc<AtomicBool>,
}

impl<Task, Output> WorkerPool<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Spawns `num_workers` threads running `worker_fn`.
    ///
    /// Each task channel holds `buffer_size` tasks and the output channel
    /// `buffer_size * num_workers` results.
    pub(crate) fn new<F>(num_workers: usize, buffer_size: usize, worker_fn: F) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Sender<Output>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        if num_workers == 0 {
            bail!(
                "Cannot create WorkerPool with 0 workers. \
                Either set num_workers > 0 or use single-threaded mode."
            );
        }
        if buffer_size == 0 {
            bail!(
                "Cannot create WorkerPool with buffer_size 0. \
                Buffer size must be > 0 to prevent deadlocks."
            );
        }

        let (output_tx, output_rx) = bounded(buffer_size * num_workers);
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);

        let mut workers = Vec::with_capacity(num_workers);
        let mut task_txs = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (task_tx, task_rx) = bounded(buffer_size);
            let output_tx = output_tx.clone();
            let shutdown_clone = shutdown.clone();
            let worker_fn_clone = worker_fn.clone();

            let handle = thread::Builder::new()
                .name(format!("dataloader-worker-{}", worker_id))
                .spawn(move || {
                    WORKER_ID.with(|id| *id.borrow_mut() = worker_id);
                    worker_fn_clone(task_rx, output_tx, shutdown_clone);
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;

            task_txs.push(task_tx);
            workers.push(handle);
        }

        Ok(Self {
            workers,
            task_txs,
            output_rx,
            shutdown,
        })
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.task_txs.len()
    }

    /// Sends `task` to worker `worker_id`.
    pub(crate) fn send_to(&self, worker_id: usize, task: Task) -> Result<()> {
        let tx = self
            .task_txs
            .get(worker_id)
            .ok_or_else(|| anyhow!("No worker with id {}", worker_id))?;
        tx.send(task)
            .map_err(|_| anyhow!("Worker {} has stopped accepting tasks", worker_id))
    }

    /// Waits up to `timeout` for the next result from any worker.
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Result<Output> {
        self.output_rx
            .recv_timeout(timeout)
            .map_err(|e| match e {
                RecvTimeoutError::Timeout => {
                    anyhow!("No result from workers within {:?}", timeout)
                }
                RecvTimeoutError::Disconnected => anyhow!("All workers have exited"),
            })
    }
}

impl<Task, Output> Drop for WorkerPool<Task, Output> {
    fn drop(&mut self) {
        // Signal shutdown to all workers
        self.shutdown.store(true, Ordering::Relaxed);

        // Close the task channels so blocked workers wake up
        self.task_txs.clear();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_pool(num_workers: usize) -> Result<WorkerPool<u32, (usize, u32)>> {
        WorkerPool::new(num_workers, 2, |task_rx: Receiver<u32>, output_tx, shutdown| {
            let worker_id = WORKER_ID.with(|id| *id.borrow());
            while !shutdown.load(Ordering::Relaxed) {
                match task_rx.recv_timeout(Duration::from_millis(10)) {
                    Ok(task) => {
                        if output_tx.send((worker_id, task * 2)).is_err() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })
    }

    #[test]
    fn test_tasks_reach_assigned_worker() -> Result<()> {
        let pool = echo_pool(3)?;
        assert_eq!(pool.num_workers(), 3);

        pool.send_to(2, 21)?;
        let (worker_id, value) = pool.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(worker_id, 2);
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_invalid_pool_arguments() {
        assert!(echo_pool(0).is_err());
        let pool = echo_pool(1).unwrap();
        assert!(pool.send_to(5, 1).is_err());
    }

    #[test]
    fn test_recv_timeout_without_tasks() -> Result<()> {
        let pool = echo_pool(1)?;
        assert!(pool.recv_timeout(Duration::from_millis(20)).is_err());
        Ok(())
    }
}
