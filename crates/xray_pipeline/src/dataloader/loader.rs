//! DataLoader constructors.
//!
//! The DataLoader creates its sampler from `config.shuffle`:
//! - `shuffle = false`: a SequentialSampler
//! - `shuffle = true`: a RandomSampler seeded with `config.seed`
//!
//! and wraps it in a BatchSampler honoring `batch_size` and `drop_last`.
//!
//! **Methods:**
//! - `new()` - default StackCollator
//! - `new_with_collator()` - custom Collator
//!
//! When no seed is configured a random one is drawn at construction, so every
//! epoch of one loader is still internally consistent.

use crate::collator::{Collator, StackCollator};
use crate::dataset::InMemoryDataset;
use crate::sampler::{BatchSampler, RandomSampler, Sampler, SequentialSampler};
use anyhow::{bail, Context, Result};
use rand::Rng;
use std::sync::atomic::AtomicUsize;

use super::config::DataLoaderConfig;

/// Iterates an [`InMemoryDataset`] in batches.
///
/// # Thread safety:
/// - `DataLoader` itself is Send + Sync and can be shared across threads.
/// - Each call to `iter()` starts a new epoch.
///
/// # Type parameters:
/// - `Raw`: raw item type of the dataset
/// - `C`: Collator type (defaults to StackCollator)
pub struct DataLoader<Raw, C = StackCollator> {
    pub(crate) dataset: InMemoryDataset<Raw>,
    pub(crate) collator: C,
    pub(crate) config: DataLoaderConfig,
    pub(crate) batch_sampler: BatchSampler<Box<dyn Sampler<Item = usize>>>,
    pub(crate) current_epoch: AtomicUsize,
    pub(crate) runtime_seed: Option<u64>,
}

impl<Raw> DataLoader<Raw, StackCollator>
where
    Raw: Clone + Send + Sync + 'static,
{
    /// Creates a new DataLoader with the default StackCollator.
    ///
    /// # Example
    /// ```ignore
    /// let config = DataLoaderConfig::builder()
    ///     .batch_size(2)
    ///     .shuffle(true)
    ///     .seed(42)
    ///     .build();
    /// let dataloader = DataLoader::new(dataset, config)?;
    /// ```
    pub fn new(dataset: InMemoryDataset<Raw>, config: DataLoaderConfig) -> Result<Self> {
        Self::new_with_collator(dataset, config, StackCollator)
    }
}

impl<Raw, C> DataLoader<Raw, C>
where
    Raw: Clone + Send + Sync + 'static,
    C: Collator + Clone + Send + Sync + 'static,
{
    /// Creates a new DataLoader with a custom collator.
    ///
    /// # Errors
    /// - Returns error if `batch_size` is 0
    /// - Returns error if `prefetch_factor` is 0 when using workers
    pub fn new_with_collator(
        dataset: InMemoryDataset<Raw>,
        config: DataLoaderConfig,
        collator: C,
    ) -> Result<Self> {
        if config.batch_size == 0 {
            bail!("Batch size must be greater than 0");
        }

        if config.prefetch_factor == 0 && config.num_workers > 0 {
            bail!(
                "Prefetch factor must be > 0 when using {} workers",
                config.num_workers
            );
        }

        let effective_seed = config.seed.unwrap_or_else(|| rand::rng().random());

        let sampler: Box<dyn Sampler<Item = usize>> = if config.shuffle {
            Box::new(RandomSampler::new(dataset.len(), effective_seed))
        } else {
            Box::new(SequentialSampler::new(dataset.len()))
        };

        let batch_sampler = BatchSampler::new(sampler, config.batch_size, config.drop_last)
            .context("Failed to wrap sampler with BatchSampler")?;

        Ok(Self {
            dataset,
            collator,
            config,
            batch_sampler,
            current_epoch: AtomicUsize::new(0),
            runtime_seed: Some(effective_seed),
        })
    }
}

impl<Raw, C> DataLoader<Raw, C>
where
    Raw: Clone + Send + Sync + 'static,
{
    pub fn dataset(&self) -> &InMemoryDataset<Raw> {
        &self.dataset
    }

    pub fn config(&self) -> &DataLoaderConfig {
        &self.config
    }

    /// Number of batches per epoch.
    pub fn len(&self) -> usize {
        let samples = self.dataset.len();
        if self.config.drop_last {
            samples / self.config.batch_size
        } else {
            samples.div_ceil(self.config.batch_size)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<Raw, C> std::fmt::Debug for DataLoader<Raw, C>
where
    Raw: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("samples", &self.dataset.len())
            .field("config", &self.config)
            .finish()
    }
}
