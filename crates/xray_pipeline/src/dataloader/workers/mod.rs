pub(crate) mod pool;

use crate::collator::Collator;
use crate::dataset::InMemoryDataset;
use crate::minibatch::MiniBatch;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::dataloader::common::thread::{init_worker_rng, WORKER_ID};
use pool::WorkerPool;

/// A batch of dataset indices tagged with its position in the epoch.
pub(crate) type BatchTask = (usize, Vec<usize>);
/// A loaded batch tagged with the position of the task it answers.
pub(crate) type BatchResult = (usize, Result<MiniBatch>);

/// Loads, transforms and collates the samples at `indices`.
pub(crate) fn load_batch<Raw, C>(
    dataset: &InMemoryDataset<Raw>,
    indices: &[usize],
    collator: &C,
    pin_memory: bool,
) -> Result<MiniBatch>
where
    Raw: Clone + Send + Sync + 'static,
    C: Collator,
{
    let samples = indices
        .iter()
        .map(|&idx| {
            dataset
                .get_sample(idx)
                .with_context(|| format!("Failed to load sample {}", idx))
        })
        .collect::<Result<Vec<_>>>()?;

    let batch = collator
        .collate(&samples)
        .with_context(|| format!("Collation failed for {} samples", samples.len()))?;

    if pin_memory {
        batch.pin_memory()
    } else {
        Ok(batch)
    }
}

/// Settings shared by the workers of one epoch.
pub(crate) struct EpochWorkers {
    pub(crate) num_workers: usize,
    pub(crate) prefetch_factor: usize,
    pub(crate) worker_timeout: Duration,
    pub(crate) pin_memory: bool,
    pub(crate) epoch: usize,
    pub(crate) runtime_seed: Option<u64>,
}

impl EpochWorkers {
    /// Spawns a fresh pool for one epoch. Each worker seeds its RNG from
    /// `(worker_id, epoch, seed)` before taking its first task.
    pub(crate) fn spawn<Raw, C>(
        &self,
        dataset: InMemoryDataset<Raw>,
        collator: C,
    ) -> Result<WorkerPool<BatchTask, BatchResult>>
    where
        Raw: Clone + Send + Sync + 'static,
        C: Collator + Clone + Send + Sync + 'static,
    {
        let epoch = self.epoch;
        let runtime_seed = self.runtime_seed;
        let worker_timeout = self.worker_timeout;
        let pin_memory = self.pin_memory;

        WorkerPool::new(
            self.num_workers,
            self.prefetch_factor,
            move |task_rx: Receiver<BatchTask>, output_tx: Sender<BatchResult>, shutdown| {
                let worker_id = WORKER_ID.with(|id| *id.borrow());
                if let Some(base_seed) = runtime_seed {
                    init_worker_rng(worker_id, epoch, base_seed);
                }

                while !shutdown.load(Ordering::Relaxed) {
                    match task_rx.recv_timeout(worker_timeout) {
                        Ok((batch_index, indices)) => {
                            let result = load_batch(&dataset, &indices, &collator, pin_memory)
                                .with_context(|| {
                                    format!(
                                        "Worker {} failed to process batch {}",
                                        worker_id, batch_index
                                    )
                                });
                            if output_tx.send((batch_index, result)).is_err() {
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            },
        )
        .context("Failed to create worker pool")
    }
}
