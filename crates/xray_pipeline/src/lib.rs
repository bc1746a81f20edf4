//! Data stages of a chest X-ray classifier.
//!
//! ```text
//! S3 bucket ──(aws s3 sync)──▶ data_ingestion/data/{train,test}
//!                                      │
//!                      DataTransformation (Compose → ImageFolder → DataLoader)
//!                                      │
//!                      DataTransformationArtifact (2 loaders + 2 JSON definitions)
//! ```

pub mod artifact;
pub mod cloud_storage;
pub mod collator;
pub mod components;
pub mod config;
pub mod dataloader;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod minibatch;
pub mod pipeline;
pub mod readers;
pub mod sample;
pub mod sampler;
pub mod transforms;

pub use artifact::{DataIngestionArtifact, DataTransformationArtifact, ImageFolderLoader};
pub use cloud_storage::S3Operation;
pub use components::{DataIngestion, DataTransformation};
pub use config::{ConfigError, PipelineConfig};
pub use error::XrayError;
pub use pipeline::TrainPipeline;
