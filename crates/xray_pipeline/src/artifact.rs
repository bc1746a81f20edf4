//! Outputs handed from one pipeline stage to the next.

use crate::dataloader::DataLoader;
use std::path::PathBuf;

/// Batch loader over an image folder: `(path, class_index)` items.
pub type ImageFolderLoader = DataLoader<(PathBuf, usize)>;

/// Where ingestion left the train and test image folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIngestionArtifact {
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

/// The two loaders and the persisted transform definitions behind them.
#[derive(Debug)]
pub struct DataTransformationArtifact {
    pub transformed_train_object: ImageFolderLoader,
    pub transformed_test_object: ImageFolderLoader,
    pub train_transform_file_path: PathBuf,
    pub test_transform_file_path: PathBuf,
}
