use crate::artifact::{DataIngestionArtifact, DataTransformationArtifact};
use crate::cloud_storage::S3Operation;
use crate::components::{DataIngestion, DataTransformation};
use crate::config::PipelineConfig;
use crate::error::XrayError;
use tracing::info;

/// Runs ingestion followed by transformation.
#[derive(Debug, Clone)]
pub struct TrainPipeline {
    config: PipelineConfig,
    s3: S3Operation,
}

impl TrainPipeline {
    pub fn new(config: PipelineConfig, s3: S3Operation) -> Self {
        Self { config, s3 }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn start_data_ingestion(&self) -> Result<DataIngestionArtifact, XrayError> {
        info!("Entered the start_data_ingestion method of TrainPipeline");
        let ingestion = DataIngestion::new(self.config.ingestion.clone(), self.s3.clone());
        let artifact = ingestion.initiate_data_ingestion()?;
        info!("Exited the start_data_ingestion method of TrainPipeline");
        Ok(artifact)
    }

    pub fn start_data_transformation(
        &self,
        ingestion_artifact: DataIngestionArtifact,
    ) -> Result<DataTransformationArtifact, XrayError> {
        info!("Entered the start_data_transformation method of TrainPipeline");
        let transformation =
            DataTransformation::new(self.config.transformation.clone(), ingestion_artifact);
        let artifact = transformation.initiate_data_transformation()?;
        info!("Exited the start_data_transformation method of TrainPipeline");
        Ok(artifact)
    }

    pub fn run_pipeline(&self) -> Result<DataTransformationArtifact, XrayError> {
        info!(timestamp = %self.config.timestamp, "Starting training pipeline");
        let ingestion_artifact = self.start_data_ingestion()?;
        self.start_data_transformation(ingestion_artifact)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_failed_ingestion_stops_pipeline() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut config = PipelineConfig::with_defaults()?;
        config.ingestion = crate::config::DataIngestionConfig::new(dir.path(), "bucket", "data");
        let pipeline = TrainPipeline::new(config, S3Operation::with_program("false"));

        let err = pipeline.run_pipeline().unwrap_err();
        assert_eq!(err.operation, "get_data_from_s3");
        assert!(logs_contain("Entered the start_data_ingestion method of TrainPipeline"));
        assert!(logs_contain("Entered the get_data_from_s3 method of DataIngestion"));
        assert!(!logs_contain("start_data_transformation"));
        Ok(())
    }
}
