use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// A `Sampler` defines the order in which dataset indices are visited.
///
/// `iter(epoch)` returns the order for that epoch. Random samplers derive their
/// RNG from a base seed plus the epoch, so every epoch gets a fresh but
/// reproducible permutation.
pub trait Sampler: Send + Sync {
    type Item: Send + Sync;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_>;
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    type Item = S::Item;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_> {
        (**self).iter(epoch)
    }
}

/// Visits the image-folder entries in their on-disk (sorted) order, the same
/// order every epoch. Used for evaluation loaders and unshuffled training.
#[derive(Debug, Clone)]
pub struct SequentialSampler {
    dataset_size: usize,
}

impl SequentialSampler {
    pub fn new(dataset_size: usize) -> Self {
        Self { dataset_size }
    }
}

impl Sampler for SequentialSampler {
    type Item = usize;

    fn iter(&self, _epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        Box::new(0..self.dataset_size)
    }
}

/// Random permutation of `0..dataset_size`, without replacement.
///
/// For each epoch a new RNG is derived as `base_seed + epoch`: the order
/// changes between epochs and is identical across runs with the same seed.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    dataset_size: usize,
    base_seed: u64,
}

impl RandomSampler {
    pub fn new(dataset_size: usize, base_seed: u64) -> Self {
        Self {
            dataset_size,
            base_seed,
        }
    }

    fn epoch_rng(&self, epoch: usize) -> StdRng {
        StdRng::seed_from_u64(self.base_seed.wrapping_add(epoch as u64))
    }
}

impl Sampler for RandomSampler {
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        let mut order: Vec<usize> = (0..self.dataset_size).collect();
        order.shuffle(&mut self.epoch_rng(epoch));
        Box::new(order.into_iter())
    }
}

/// Groups the indices of an inner sampler into batches of `batch_size`.
/// The last, shorter batch is kept unless `drop_last` is set.
pub struct BatchSampler<S> {
    sampler: S,
    batch_size: usize,
    drop_last: bool,
}

impl<S: Sampler> BatchSampler<S> {
    pub fn new(sampler: S, batch_size: usize, drop_last: bool) -> Result<Self> {
        ensure!(
            batch_size > 0,
            "batch_size must be > 0, but got batch_size={}",
            batch_size
        );
        Ok(Self {
            sampler,
            batch_size,
            drop_last,
        })
    }
}

impl<S: Sampler> Sampler for BatchSampler<S> {
    type Item = Vec<S::Item>;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_> {
        let mut indices = self.sampler.iter(epoch);
        let (batch_size, drop_last) = (self.batch_size, self.drop_last);

        Box::new(std::iter::from_fn(move || {
            let batch: Vec<_> = indices.by_ref().take(batch_size).collect();
            let complete = batch.len() == batch_size;
            (complete || (!drop_last && !batch.is_empty())).then_some(batch)
        }))
    }
}
