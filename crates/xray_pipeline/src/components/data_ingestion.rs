use crate::artifact::DataIngestionArtifact;
use crate::cloud_storage::S3Operation;
use crate::config::DataIngestionConfig;
use crate::error::{OperationContext, XrayError};
use anyhow::{ensure, Context};
use std::fs;
use tracing::info;

/// Pulls the dataset folder from S3 into the run's artifact directory.
#[derive(Debug, Clone)]
pub struct DataIngestion {
    config: DataIngestionConfig,
    s3: S3Operation,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig, s3: S3Operation) -> Self {
        Self { config, s3 }
    }

    pub fn config(&self) -> &DataIngestionConfig {
        &self.config
    }

    /// Syncs `s3://<bucket>/<s3_data_folder>` into `data_path`.
    pub fn get_data_from_s3(&self) -> Result<(), XrayError> {
        info!("Entered the get_data_from_s3 method of DataIngestion");

        fs::create_dir_all(&self.config.data_path)
            .with_context(|| {
                format!(
                    "Failed to create ingestion directory: {}",
                    self.config.data_path.display()
                )
            })
            .in_operation("get_data_from_s3")?;

        self.s3
            .sync_folder_from_s3(
                &self.config.data_path,
                &self.config.bucket_name,
                &self.config.s3_data_folder,
            )
            .in_operation("get_data_from_s3")?;

        info!("Exited the get_data_from_s3 method of DataIngestion");
        Ok(())
    }

    /// Downloads the data and checks that the train and test folders exist.
    pub fn initiate_data_ingestion(&self) -> Result<DataIngestionArtifact, XrayError> {
        info!("Entered the initiate_data_ingestion method of DataIngestion");

        self.get_data_from_s3()?;

        self.check_split_folders()
            .in_operation("initiate_data_ingestion")?;

        let artifact = DataIngestionArtifact {
            train_file_path: self.config.train_data_path.clone(),
            test_file_path: self.config.test_data_path.clone(),
        };

        info!(
            train = %artifact.train_file_path.display(),
            test = %artifact.test_file_path.display(),
            "Exited the initiate_data_ingestion method of DataIngestion"
        );
        Ok(artifact)
    }

    fn check_split_folders(&self) -> anyhow::Result<()> {
        for dir in [&self.config.train_data_path, &self.config.test_data_path] {
            ensure!(
                dir.is_dir(),
                "Expected folder {} after syncing s3://{}/{}",
                dir.display(),
                self.config.bucket_name,
                self.config.s3_data_folder
            );
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_ingestion_requires_split_folders() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let config = DataIngestionConfig::new(dir.path(), "bucket", "data");
        let ingestion = DataIngestion::new(config.clone(), S3Operation::with_program("true"));

        let err = ingestion.initiate_data_ingestion().unwrap_err();
        assert_eq!(err.operation, "initiate_data_ingestion");

        fs::create_dir_all(&config.train_data_path)?;
        fs::create_dir_all(&config.test_data_path)?;
        let artifact = ingestion.initiate_data_ingestion()?;
        assert_eq!(artifact.train_file_path, config.train_data_path);
        assert!(artifact.test_file_path.ends_with(Path::new("data_ingestion/data/test")));
        Ok(())
    }

    #[test]
    fn test_failed_sync_names_operation() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let config = DataIngestionConfig::new(dir.path(), "bucket", "data");
        let ingestion = DataIngestion::new(config, S3Operation::with_program("false"));

        let err = ingestion.initiate_data_ingestion().unwrap_err();
        assert_eq!(err.operation, "get_data_from_s3");
        Ok(())
    }
}
