//! Iterator implementation for DataLoader.
//!
//! The `IteratorImpl` variant created depends on the DataLoader configuration:
//! - `num_workers = 0`: IteratorImpl::Single, samples load on the calling thread
//! - `num_workers > 0`: IteratorImpl::Multi, a fresh worker pool for the epoch
//!
//! Both variants yield batches in sampler order.

use crate::collator::Collator;
use crate::dataset::InMemoryDataset;
use crate::minibatch::MiniBatch;
use crate::sampler::Sampler;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

use rand::rngs::StdRng;

use super::common::thread::{swap_worker_rng, worker_rng};
use super::loader::DataLoader;
use super::workers::pool::WorkerPool;
use super::workers::{load_batch, BatchResult, BatchTask, EpochWorkers};

impl<Raw, C> DataLoader<Raw, C>
where
    Raw: Clone + Send + Sync + 'static,
    C: Collator + Clone + Send + Sync + 'static,
{
    /// Creates an iterator over the batches of the next epoch.
    ///
    /// With `shuffle`, every call draws a new (seeded) order. Random transforms
    /// are re-seeded per worker and epoch in either case.
    pub fn iter(&self) -> Result<DataLoaderIter<'_, Raw, C>> {
        let epoch = self.current_epoch.fetch_add(1, Ordering::SeqCst);
        let sampler_epoch = if self.config.shuffle { epoch } else { 0 };
        let batch_indices = self.batch_sampler.iter(sampler_epoch);

        let inner = if self.config.num_workers == 0 {
            IteratorImpl::Single {
                dataset: &self.dataset,
                collator: &self.collator,
                batch_indices,
                pin_memory: self.config.pin_memory,
                rng: self.runtime_seed.map(|seed| worker_rng(0, epoch, seed)),
            }
        } else {
            let workers = EpochWorkers {
                num_workers: self.config.num_workers,
                prefetch_factor: self.config.prefetch_factor,
                worker_timeout: self.config.worker_timeout,
                pin_memory: self.config.pin_memory,
                epoch,
                runtime_seed: self.runtime_seed,
            };
            let worker_pool = workers
                .spawn(self.dataset.clone(), self.collator.clone())
                .with_context(|| format!("Failed to start workers for epoch {}", epoch))?;

            IteratorImpl::Multi {
                worker_pool,
                batch_indices,
                max_in_flight: self.config.num_workers * self.config.prefetch_factor,
                timeout: self.config.timeout,
                next_send: 0,
                next_yield: 0,
                ready: BTreeMap::new(),
                failed: false,
            }
        };

        Ok(DataLoaderIter { inner })
    }
}

/// Iterator over the batches of one epoch.
///
/// Created by calling `dataloader.iter()`. Dropping it stops the epoch's
/// workers.
pub struct DataLoaderIter<'a, Raw, C> {
    inner: IteratorImpl<'a, Raw, C>,
}

enum IteratorImpl<'a, Raw, C> {
    /// Single-threaded iteration on the calling thread.
    /// - `rng`: this epoch's RNG as worker 0. It is installed in the thread-local
    ///   slot only while a batch loads, so the caller's own RNG state and other
    ///   iterators on the same thread are left untouched.
    Single {
        dataset: &'a InMemoryDataset<Raw>,
        collator: &'a C,
        batch_indices: Box<dyn Iterator<Item = Vec<usize>> + Send + 'a>,
        pin_memory: bool,
        rng: Option<StdRng>,
    },

    /// Multi-threaded iteration with fresh workers for this epoch.
    /// - `next_send`: position of the next batch to hand to a worker
    /// - `next_yield`: position of the next batch to return
    /// - `ready`: finished batches that arrived ahead of `next_yield`
    /// - `failed`: set once the workers stopped answering; ends the epoch
    Multi {
        worker_pool: WorkerPool<BatchTask, BatchResult>,
        batch_indices: Box<dyn Iterator<Item = Vec<usize>> + Send + 'a>,
        max_in_flight: usize,
        timeout: Duration,
        next_send: usize,
        next_yield: usize,
        ready: BTreeMap<usize, Result<MiniBatch>>,
        failed: bool,
    },
}

impl<Raw, C> Iterator for DataLoaderIter<'_, Raw, C>
where
    Raw: Clone + Send + Sync + 'static,
    C: Collator,
{
    type Item = Result<MiniBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IteratorImpl::Single {
                dataset,
                collator,
                batch_indices,
                pin_memory,
                rng,
            } => {
                let indices = batch_indices.next()?;
                if rng.is_none() {
                    return Some(load_batch(*dataset, &indices, *collator, *pin_memory));
                }
                let caller_rng = swap_worker_rng(rng.take());
                let result = load_batch(*dataset, &indices, *collator, *pin_memory);
                *rng = swap_worker_rng(caller_rng);
                Some(result)
            }

            IteratorImpl::Multi {
                worker_pool,
                batch_indices,
                max_in_flight,
                timeout,
                next_send,
                next_yield,
                ready,
                failed,
            } => {
                if *failed {
                    return None;
                }

                // Keep up to `max_in_flight` batches between send and yield.
                // Round-robin assignment caps each worker at `prefetch_factor`
                // outstanding tasks, which is its channel capacity.
                while *next_send - *next_yield < *max_in_flight {
                    let Some(indices) = batch_indices.next() else {
                        break;
                    };
                    let worker_id = *next_send % worker_pool.num_workers();
                    if let Err(e) = worker_pool.send_to(worker_id, (*next_send, indices)) {
                        *failed = true;
                        return Some(Err(e.context(format!(
                            "Failed to send batch {} to worker {}",
                            *next_send, worker_id
                        ))));
                    }
                    *next_send += 1;
                }

                if *next_yield == *next_send {
                    return None;
                }

                loop {
                    if let Some(result) = ready.remove(&*next_yield) {
                        *next_yield += 1;
                        return Some(result);
                    }
                    match worker_pool.recv_timeout(*timeout) {
                        Ok((batch_index, result)) => {
                            ready.insert(batch_index, result);
                        }
                        Err(e) => {
                            *failed = true;
                            return Some(Err(e.context(format!(
                                "Failed to receive batch {} from workers \
                                (possible deadlock or slow transform)",
                                *next_yield
                            ))));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::{init_worker_rng, reset_worker_rng, worker_gen_range, DataLoaderConfig};
    use crate::sample::Sample;
    use crate::transforms::Transform;
    use anyhow::bail;
    use tch::Tensor;

    struct IndexToSample;
    impl Transform<i64, Sample> for IndexToSample {
        fn apply(&self, input: i64) -> Result<Sample> {
            Ok(Sample::from_single("value", Tensor::from(input)))
        }
    }

    /// Emits the index together with a draw from the worker RNG.
    struct NoisySample;
    impl Transform<i64, Sample> for NoisySample {
        fn apply(&self, input: i64) -> Result<Sample> {
            Ok(Sample::from_single("value", Tensor::from(input))
                .with_feature("noise", Tensor::from(worker_gen_range(0.0, 1.0))))
        }
    }

    struct FailOnThree;
    impl Transform<i64, Sample> for FailOnThree {
        fn apply(&self, input: i64) -> Result<Sample> {
            if input == 3 {
                bail!("cannot load 3");
            }
            Ok(Sample::from_single("value", Tensor::from(input)))
        }
    }

    struct SlowSample;
    impl Transform<i64, Sample> for SlowSample {
        fn apply(&self, input: i64) -> Result<Sample> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Sample::from_single("value", Tensor::from(input)))
        }
    }

    fn values(loader: &DataLoader<i64>) -> Result<Vec<Vec<i64>>> {
        loader
            .iter()?
            .map(|batch| {
                let batch = batch?;
                let values: Vec<i64> = batch.get("value")?.try_into()?;
                Ok(values)
            })
            .collect()
    }

    #[test]
    fn test_single_threaded_order() -> Result<()> {
        let dataset = InMemoryDataset::new((0..5).collect()).with_transform(IndexToSample);
        let loader = DataLoader::new(dataset, DataLoaderConfig::builder().batch_size(2).build())?;

        assert_eq!(values(&loader)?, vec![vec![0, 1], vec![2, 3], vec![4]]);
        Ok(())
    }

    #[test]
    fn test_workers_keep_sampler_order() -> Result<()> {
        let dataset = InMemoryDataset::new((0..23).collect()).with_transform(IndexToSample);
        let config = DataLoaderConfig::builder()
            .batch_size(2)
            .num_workers(3)
            .prefetch_factor(1)
            .build();
        let loader = DataLoader::new(dataset, config)?;

        let flat: Vec<i64> = values(&loader)?.into_iter().flatten().collect();
        assert_eq!(flat, (0..23).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_sample_error_is_reported_for_its_batch() -> Result<()> {
        let dataset = InMemoryDataset::new((0..6).collect()).with_transform(FailOnThree);
        let loader = DataLoader::new(dataset, DataLoaderConfig::builder().batch_size(2).build())?;

        let results: Vec<_> = loader.iter()?.collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load sample 3"));
        assert!(results[2].is_ok());
        Ok(())
    }

    #[test]
    fn test_seeded_transforms_repeat_across_loaders() -> Result<()> {
        let noise = |num_workers: usize| -> Result<Vec<f64>> {
            let dataset = InMemoryDataset::new((0..8).collect()).with_transform(NoisySample);
            let config = DataLoaderConfig::builder()
                .batch_size(2)
                .num_workers(num_workers)
                .seed(11)
                .build();
            let loader = DataLoader::new(dataset, config)?;
            let mut draws = Vec::new();
            for batch in loader.iter()? {
                let batch_draws: Vec<f64> = batch?.get("noise")?.try_into()?;
                draws.extend(batch_draws);
            }
            Ok(draws)
        };

        assert_eq!(noise(2)?, noise(2)?);
        Ok(())
    }

    #[test]
    fn test_worker_timeout_ends_epoch() -> Result<()> {
        let dataset = InMemoryDataset::new((0..4).collect()).with_transform(SlowSample);
        let config = DataLoaderConfig::builder()
            .batch_size(1)
            .num_workers(1)
            .timeout(Duration::from_millis(50))
            .build();
        let loader = DataLoader::new(dataset, config)?;

        let mut iter = loader.iter()?;
        let err = iter.next().unwrap().unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to receive batch 0"));
        assert!(iter.next().is_none());
        Ok(())
    }

    #[test]
    fn test_single_threaded_epoch_leaves_caller_rng_alone() -> Result<()> {
        init_worker_rng(5, 0, 99);
        let expected: Vec<f64> = (0..4).map(|_| worker_gen_range(0.0, 1.0)).collect();

        init_worker_rng(5, 0, 99);
        let first = worker_gen_range(0.0, 1.0);

        // A seeded epoch on this thread, partly consumed then dropped.
        let dataset = InMemoryDataset::new((0..6).collect()).with_transform(NoisySample);
        let config = DataLoaderConfig::builder().batch_size(2).seed(1).build();
        let loader = DataLoader::new(dataset, config)?;
        let mut iter = loader.iter()?;
        iter.next().unwrap()?;
        let second = worker_gen_range(0.0, 1.0);
        iter.next().unwrap()?;
        drop(iter);

        let mut observed = vec![first, second];
        observed.extend((0..2).map(|_| worker_gen_range(0.0, 1.0)));
        reset_worker_rng();

        assert_eq!(observed, expected);
        Ok(())
    }

    #[test]
    fn test_interleaved_single_threaded_loaders_repeat() -> Result<()> {
        let loader = |seed: u64| -> Result<DataLoader<i64>> {
            let dataset = InMemoryDataset::new((0..4).collect()).with_transform(NoisySample);
            DataLoader::new(dataset, DataLoaderConfig::builder().batch_size(2).seed(seed).build())
        };
        let noise = |batch: Result<MiniBatch>| -> Result<Vec<f64>> {
            Ok(batch?.get("noise")?.try_into()?)
        };

        let alone: Vec<Vec<f64>> = loader(3)?.iter()?.map(noise).collect::<Result<_>>()?;

        let train = loader(3)?;
        let test = loader(4)?;
        let mut train_iter = train.iter()?;
        let mut interleaved = Vec::new();
        for test_batch in test.iter()? {
            noise(test_batch)?;
            if let Some(batch) = train_iter.next() {
                interleaved.push(noise(batch)?);
            }
        }

        assert_eq!(interleaved, alone);
        Ok(())
    }
}
