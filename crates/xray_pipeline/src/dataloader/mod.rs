//! Batch loading over an [`InMemoryDataset`](crate::dataset::InMemoryDataset).
//!
//! ```text
//!   InMemoryDataset (raw items + Transform: Raw → Sample)
//!          │
//!   BatchSampler (Sequential or Random, batch_size, drop_last)
//!          │ index batches
//!   [Worker Threads] (optional, fresh per epoch)
//!          │ fetch & transform samples
//!   Collator (stack samples)
//!          │
//!   MiniBatch (optionally pinned)
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/dataloader/
//! ├── mod.rs          # Public API exports
//! ├── config.rs       # DataLoaderConfig and builder
//! ├── loader.rs       # DataLoader struct and constructors
//! ├── iterator.rs     # DataLoaderIter (single and multi-threaded)
//! ├── workers/
//! │   ├── mod.rs      # Batch loading and per-epoch worker setup
//! │   └── pool.rs     # WorkerPool with per-worker channels
//! └── common/
//!     └── thread.rs   # Thread-local worker ID and RNG
//! ```
//!
//! # Example
//! ```ignore
//! let config = DataLoaderConfig::builder().batch_size(2).build();
//! let dataloader = DataLoader::new(dataset, config)?;
//!
//! for batch in dataloader.iter()? {
//!     let batch: MiniBatch = batch?;
//!     let images = batch.get("image")?; // [2, 3, 224, 224]
//! }
//! ```
//!
//! ## Memory Usage
//! - Single-threaded: O(batch_size)
//! - Multi-threaded: O(num_workers x prefetch_factor x batch_size)

mod common;
mod config;
mod iterator;
mod loader;
mod workers;

pub use config::{DataLoaderConfig, DataLoaderConfigBuilder};
pub use iterator::DataLoaderIter;
pub use loader::DataLoader;

pub use common::thread::{
    init_worker_rng, reset_worker_rng, worker_gen_bool, worker_gen_range, worker_shuffle,
    WORKER_ID, WORKER_RNG,
};
