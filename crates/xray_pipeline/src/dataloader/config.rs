//! Batch parameters of a [`super::DataLoader`].
//!
//! The pipeline fills these from `DataLoaderParams` in the settings file:
//! ```ignore
//! let config = DataLoaderConfig::builder()
//!     .batch_size(2)
//!     .pin_memory(true)
//!     .build();
//! ```

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DataLoaderConfig {
    /// Number of samples per batch (must be > 0)
    pub batch_size: usize,
    /// Whether to draw a new random order every epoch
    pub shuffle: bool,
    /// Whether to drop the last incomplete batch
    pub drop_last: bool,
    /// Copy batches into page-locked memory when CUDA is available
    pub pin_memory: bool,
    /// Number of parallel workers (0 = load on the calling thread)
    pub num_workers: usize,
    /// Random seed for reproducible shuffling and transforms
    pub seed: Option<u64>,
    /// Number of batches in flight per worker (must be > 0 when using workers)
    pub prefetch_factor: usize,
    /// Maximum time to wait for a batch from workers before giving up on the
    /// epoch. Default: 30s
    pub timeout: Duration,
    /// How often idle workers check for the shutdown signal.
    /// Not an error timeout, just a polling interval. Default: 100ms.
    pub worker_timeout: Duration,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            shuffle: false,
            drop_last: false,
            pin_memory: false,
            num_workers: 0,
            seed: None,
            prefetch_factor: 2,
            timeout: Duration::from_secs(30),
            worker_timeout: Duration::from_millis(100),
        }
    }
}

impl DataLoaderConfig {
    pub fn builder() -> DataLoaderConfigBuilder {
        DataLoaderConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataLoaderConfigBuilder {
    config: DataLoaderConfig,
}

impl DataLoaderConfigBuilder {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    pub fn drop_last(mut self, drop: bool) -> Self {
        self.config.drop_last = drop;
        self
    }

    pub fn pin_memory(mut self, pin: bool) -> Self {
        self.config.pin_memory = pin;
        self
    }

    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    /// Seeds both the shuffle order and the augmentation RNG of every worker.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Like [`seed`](Self::seed), but `None` leaves the loader to draw one.
    pub fn maybe_seed(mut self, seed: Option<u64>) -> Self {
        self.config.seed = seed;
        self
    }

    /// Batches queued per worker.
    pub fn prefetch_factor(mut self, factor: usize) -> Self {
        self.config.prefetch_factor = factor;
        self
    }

    /// How long to wait for the next batch before the epoch fails.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn worker_timeout(mut self, worker_timeout: Duration) -> Self {
        self.config.worker_timeout = worker_timeout;
        self
    }

    pub fn build(self) -> DataLoaderConfig {
        self.config
    }
}
