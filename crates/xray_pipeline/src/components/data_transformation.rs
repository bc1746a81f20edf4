use crate::artifact::{DataIngestionArtifact, DataTransformationArtifact, ImageFolderLoader};
use crate::config::DataTransformationConfig;
use crate::dataloader::{DataLoader, DataLoaderConfig};
use crate::error::{OperationContext, XrayError};
use crate::readers::ImageFolder;
use crate::transforms::{Compose, TransformStep};
use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::info;

/// Builds the train/test preprocessing sequences and loaders.
///
/// - train: resize → center crop → color jitter → horizontal flip → rotation
///   → to tensor → normalize
/// - test: resize → center crop → to tensor → normalize
#[derive(Debug, Clone)]
pub struct DataTransformation {
    config: DataTransformationConfig,
    ingestion_artifact: DataIngestionArtifact,
}

impl DataTransformation {
    pub fn new(
        config: DataTransformationConfig,
        ingestion_artifact: DataIngestionArtifact,
    ) -> Self {
        Self {
            config,
            ingestion_artifact,
        }
    }

    pub fn config(&self) -> &DataTransformationConfig {
        &self.config
    }

    fn resize_and_crop(&self) -> [TransformStep; 2] {
        [
            TransformStep::Resize {
                size: self.config.resize,
            },
            TransformStep::CenterCrop {
                width: self.config.center_crop,
                height: self.config.center_crop,
            },
        ]
    }

    fn tensor_steps(&self) -> [TransformStep; 2] {
        [
            TransformStep::ToTensor,
            TransformStep::Normalize {
                mean: self.config.normalize.mean.clone(),
                std: self.config.normalize.std.clone(),
            },
        ]
    }

    /// The augmenting sequence used for training images.
    ///
    /// Every step is instantiated before returning, so an invalid parameter
    /// (say a hue above 0.5) is reported here.
    pub fn transforming_training_data(&self) -> Result<Compose, XrayError> {
        info!("Entered the transforming_training_data method of DataTransformation");

        let jitter = &self.config.color_jitter;
        let mut steps = Vec::with_capacity(7);
        steps.extend(self.resize_and_crop());
        steps.push(TransformStep::ColorJitter {
            brightness: jitter.brightness,
            contrast: jitter.contrast,
            saturation: jitter.saturation,
            hue: jitter.hue,
        });
        steps.push(TransformStep::RandomHorizontalFlip {
            p: self.config.horizontal_flip_p,
        });
        steps.push(TransformStep::RandomRotation {
            degrees: self.config.random_rotation,
        });
        steps.extend(self.tensor_steps());

        let train_transform = Compose::new(steps);
        train_transform
            .build()
            .in_operation("transforming_training_data")?;

        info!("Exited the transforming_training_data method of DataTransformation");
        Ok(train_transform)
    }

    /// The deterministic sequence used for evaluation images.
    pub fn transforming_testing_data(&self) -> Result<Compose, XrayError> {
        info!("Entered the transforming_testing_data method of DataTransformation");

        let mut steps = Vec::with_capacity(4);
        steps.extend(self.resize_and_crop());
        steps.extend(self.tensor_steps());

        let test_transform = Compose::new(steps);
        test_transform
            .build()
            .in_operation("transforming_testing_data")?;

        info!("Exited the transforming_testing_data method of DataTransformation");
        Ok(test_transform)
    }

    /// Wraps the ingested train and test folders with their transforms and
    /// creates one loader for each, both with the configured batch parameters.
    pub fn data_loader(
        &self,
        train_transform: &Compose,
        test_transform: &Compose,
    ) -> Result<(ImageFolderLoader, ImageFolderLoader), XrayError> {
        info!("Entered the data_loader method of DataTransformation");

        let loader_config = DataLoaderConfig::from(&self.config.data_loader);
        let train_loader = folder_loader(
            &self.ingestion_artifact.train_file_path,
            train_transform,
            loader_config.clone(),
        )
        .context("Failed to create the train loader")
        .in_operation("data_loader")?;
        let test_loader = folder_loader(
            &self.ingestion_artifact.test_file_path,
            test_transform,
            loader_config,
        )
        .context("Failed to create the test loader")
        .in_operation("data_loader")?;

        info!(
            train_samples = train_loader.dataset().len(),
            test_samples = test_loader.dataset().len(),
            "Exited the data_loader method of DataTransformation"
        );
        Ok((train_loader, test_loader))
    }

    /// Builds both sequences, writes their definitions under `artifact_dir`
    /// and returns the loaders together with the written file paths.
    pub fn initiate_data_transformation(&self) -> Result<DataTransformationArtifact, XrayError> {
        info!("Entered the initiate_data_transformation method of DataTransformation");

        let train_transform = self.transforming_training_data()?;
        let test_transform = self.transforming_testing_data()?;

        fs::create_dir_all(&self.config.artifact_dir)
            .with_context(|| {
                format!(
                    "Failed to create transformation directory: {}",
                    self.config.artifact_dir.display()
                )
            })
            .in_operation("initiate_data_transformation")?;

        train_transform
            .save(&self.config.train_transforms_file)
            .in_operation("initiate_data_transformation")?;
        test_transform
            .save(&self.config.test_transforms_file)
            .in_operation("initiate_data_transformation")?;

        let (train_loader, test_loader) = self.data_loader(&train_transform, &test_transform)?;

        let artifact = DataTransformationArtifact {
            transformed_train_object: train_loader,
            transformed_test_object: test_loader,
            train_transform_file_path: self.config.train_transforms_file.clone(),
            test_transform_file_path: self.config.test_transforms_file.clone(),
        };

        info!("Exited the initiate_data_transformation method of DataTransformation");
        Ok(artifact)
    }
}

fn folder_loader(
    root: &Path,
    transform: &Compose,
    config: DataLoaderConfig,
) -> anyhow::Result<ImageFolderLoader> {
    let pipeline = transform.build()?;
    let folder = ImageFolder::new(root)?;
    info!(
        root = %root.display(),
        classes = ?folder.classes(),
        samples = folder.len(),
        "Loaded image folder"
    );
    DataLoader::new(folder.into_dataset(pipeline), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::vision::ResizeTarget;
    use std::path::PathBuf;

    fn transformation(run_dir: &Path) -> DataTransformation {
        DataTransformation::new(
            DataTransformationConfig::with_defaults(run_dir),
            DataIngestionArtifact {
                train_file_path: PathBuf::from("missing/train"),
                test_file_path: PathBuf::from("missing/test"),
            },
        )
    }

    #[test]
    fn test_training_sequence_order() -> anyhow::Result<()> {
        let compose = transformation(Path::new("run")).transforming_training_data()?;
        let names: Vec<_> = compose.steps().iter().map(TransformStep::name).collect();
        assert_eq!(
            names,
            [
                "resize",
                "center_crop",
                "color_jitter",
                "random_horizontal_flip",
                "random_rotation",
                "to_tensor",
                "normalize"
            ]
        );
        assert_eq!(
            compose.steps()[0],
            TransformStep::Resize {
                size: ResizeTarget::ShorterSide(224)
            }
        );
        Ok(())
    }

    #[test]
    fn test_testing_sequence_order() -> anyhow::Result<()> {
        let compose = transformation(Path::new("run")).transforming_testing_data()?;
        let names: Vec<_> = compose.steps().iter().map(TransformStep::name).collect();
        assert_eq!(names, ["resize", "center_crop", "to_tensor", "normalize"]);
        Ok(())
    }

    #[test]
    fn test_invalid_jitter_is_rejected_early() {
        let mut stage = transformation(Path::new("run"));
        stage.config.color_jitter.hue = 0.9;
        let err = stage.transforming_training_data().unwrap_err();
        assert_eq!(err.operation, "transforming_training_data");
    }

    #[test]
    fn test_missing_folders_fail_in_data_loader() -> anyhow::Result<()> {
        let stage = transformation(Path::new("run"));
        let train = stage.transforming_training_data()?;
        let test = stage.transforming_testing_data()?;
        let err = stage.data_loader(&train, &test).unwrap_err();
        assert_eq!(err.operation, "data_loader");
        Ok(())
    }
}
