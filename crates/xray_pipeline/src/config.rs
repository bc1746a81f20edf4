//! Stage configuration.
//!
//! Every value has a default, so an empty JSON object (or no file at all) is a
//! complete configuration. Directory paths are derived from `artifact_root`
//! and the run `timestamp`:
//!
//! ```text
//! <artifact_root>/<timestamp>/
//! ├── data_ingestion/data/{train,test}
//! └── data_transformation/{train,test}_transforms.json
//! ```

use crate::dataloader::DataLoaderConfig;
use crate::transforms::vision::ResizeTarget;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const BUCKET_NAME: &str = "xraylungimgs";
pub const S3_DATA_FOLDER: &str = "data";
pub const ARTIFACT_DIR: &str = "artifacts";
pub const TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

pub const DATA_INGESTION_DIR: &str = "data_ingestion";
pub const DATA_TRANSFORMATION_DIR: &str = "data_transformation";
pub const TRAIN_TRANSFORMS_FILE: &str = "train_transforms.json";
pub const TEST_TRANSFORMS_FILE: &str = "test_transforms.json";

pub const RESIZE: u32 = 224;
pub const CENTERCROP: u32 = 224;
pub const RANDOMROTATION: f32 = 10.0;
pub const HORIZONTAL_FLIP_P: f64 = 0.5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

// ============================================================================
// File format
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorJitterParams {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
}

impl Default for ColorJitterParams {
    fn default() -> Self {
        Self {
            brightness: 0.1,
            contrast: 0.1,
            saturation: 0.1,
            hue: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeParams {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            mean: vec![0.485, 0.456, 0.406],
            std: vec![0.229, 0.224, 0.225],
        }
    }
}

/// Batch parameters shared by the train and test loaders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataLoaderParams {
    pub batch_size: usize,
    pub shuffle: bool,
    pub pin_memory: bool,
    pub num_workers: usize,
    pub drop_last: bool,
    pub seed: Option<u64>,
}

impl Default for DataLoaderParams {
    fn default() -> Self {
        Self {
            batch_size: 2,
            shuffle: false,
            pin_memory: true,
            num_workers: 0,
            drop_last: false,
            seed: None,
        }
    }
}

impl From<&DataLoaderParams> for DataLoaderConfig {
    fn from(params: &DataLoaderParams) -> Self {
        DataLoaderConfig::builder()
            .batch_size(params.batch_size)
            .shuffle(params.shuffle)
            .pin_memory(params.pin_memory)
            .num_workers(params.num_workers)
            .drop_last(params.drop_last)
            .maybe_seed(params.seed)
            .build()
    }
}

/// Top-level file format of `--config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub artifact_root: Option<PathBuf>,
    pub bucket_name: Option<String>,
    pub s3_data_folder: Option<String>,
    pub transformation: TransformationSettings,
}

impl PipelineSettings {
    /// Reads a JSON settings file. Missing fields fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformationSettings {
    pub resize: ResizeTarget,
    pub center_crop: u32,
    pub random_rotation: f32,
    pub horizontal_flip_p: f64,
    pub color_jitter: ColorJitterParams,
    pub normalize: NormalizeParams,
    pub data_loader: DataLoaderParams,
}

impl Default for TransformationSettings {
    fn default() -> Self {
        Self {
            resize: ResizeTarget::ShorterSide(RESIZE),
            center_crop: CENTERCROP,
            random_rotation: RANDOMROTATION,
            horizontal_flip_p: HORIZONTAL_FLIP_P,
            color_jitter: ColorJitterParams::default(),
            normalize: NormalizeParams::default(),
            data_loader: DataLoaderParams::default(),
        }
    }
}

// ============================================================================
// Stage configs
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DataIngestionConfig {
    pub bucket_name: String,
    pub s3_data_folder: String,
    pub artifact_dir: PathBuf,
    pub data_path: PathBuf,
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
}

impl DataIngestionConfig {
    pub fn new(
        run_dir: &Path,
        bucket_name: impl Into<String>,
        s3_data_folder: impl Into<String>,
    ) -> Self {
        let artifact_dir = run_dir.join(DATA_INGESTION_DIR);
        let data_path = artifact_dir.join(S3_DATA_FOLDER);
        Self {
            bucket_name: bucket_name.into(),
            s3_data_folder: s3_data_folder.into(),
            train_data_path: data_path.join("train"),
            test_data_path: data_path.join("test"),
            artifact_dir,
            data_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataTransformationConfig {
    pub resize: ResizeTarget,
    pub center_crop: u32,
    pub random_rotation: f32,
    pub horizontal_flip_p: f64,
    pub color_jitter: ColorJitterParams,
    pub normalize: NormalizeParams,
    pub data_loader: DataLoaderParams,
    pub artifact_dir: PathBuf,
    pub train_transforms_file: PathBuf,
    pub test_transforms_file: PathBuf,
}

impl DataTransformationConfig {
    pub fn new(run_dir: &Path, settings: TransformationSettings) -> Self {
        let artifact_dir = run_dir.join(DATA_TRANSFORMATION_DIR);
        Self {
            resize: settings.resize,
            center_crop: settings.center_crop,
            random_rotation: settings.random_rotation,
            horizontal_flip_p: settings.horizontal_flip_p,
            color_jitter: settings.color_jitter,
            normalize: settings.normalize,
            data_loader: settings.data_loader,
            train_transforms_file: artifact_dir.join(TRAIN_TRANSFORMS_FILE),
            test_transforms_file: artifact_dir.join(TEST_TRANSFORMS_FILE),
            artifact_dir,
        }
    }

    /// Defaults rooted at `run_dir`.
    pub fn with_defaults(run_dir: &Path) -> Self {
        Self::new(run_dir, TransformationSettings::default())
    }
}

/// Resolved configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub artifact_root: PathBuf,
    pub timestamp: String,
    pub ingestion: DataIngestionConfig,
    pub transformation: DataTransformationConfig,
}

impl PipelineConfig {
    /// Resolves settings against a run timestamp (formatted with
    /// [`TIMESTAMP_FORMAT`]).
    pub fn from_settings(
        settings: PipelineSettings,
        timestamp: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let timestamp = timestamp.into();
        validate(&settings)?;

        let artifact_root = settings
            .artifact_root
            .unwrap_or_else(|| PathBuf::from(ARTIFACT_DIR));
        let run_dir = artifact_root.join(&timestamp);

        let ingestion = DataIngestionConfig::new(
            &run_dir,
            settings
                .bucket_name
                .unwrap_or_else(|| BUCKET_NAME.to_string()),
            settings
                .s3_data_folder
                .unwrap_or_else(|| S3_DATA_FOLDER.to_string()),
        );
        let transformation = DataTransformationConfig::new(&run_dir, settings.transformation);

        Ok(Self {
            artifact_root,
            timestamp,
            ingestion,
            transformation,
        })
    }

    /// [`PipelineSettings::from_file`] resolved against `timestamp`.
    pub fn from_file(
        path: impl AsRef<Path>,
        timestamp: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::from_settings(PipelineSettings::from_file(path)?, timestamp)
    }

    /// Defaults with a timestamp for the current local time.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Self::from_settings(PipelineSettings::default(), current_timestamp())
    }
}

/// The current local time formatted with [`TIMESTAMP_FORMAT`].
pub fn current_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

fn validate(settings: &PipelineSettings) -> Result<(), ConfigError> {
    let transformation = &settings.transformation;
    if transformation.data_loader.batch_size == 0 {
        return Err(ConfigError::Invalid {
            name: "transformation.data_loader.batch_size",
            source: anyhow::anyhow!("must be greater than zero"),
        });
    }
    if transformation.center_crop == 0 {
        return Err(ConfigError::Invalid {
            name: "transformation.center_crop",
            source: anyhow::anyhow!("must be greater than zero"),
        });
    }
    if let Some(bucket) = &settings.bucket_name {
        if bucket.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "bucket_name",
                source: anyhow::anyhow!("must not be empty"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() -> Result<(), ConfigError> {
        let config =
            PipelineConfig::from_settings(PipelineSettings::default(), "01_02_2024_03_04_05")?;

        assert_eq!(config.ingestion.bucket_name, "xraylungimgs");
        assert_eq!(config.ingestion.s3_data_folder, "data");
        assert_eq!(
            config.ingestion.train_data_path,
            PathBuf::from("artifacts/01_02_2024_03_04_05/data_ingestion/data/train")
        );
        assert_eq!(
            config.transformation.test_transforms_file,
            PathBuf::from("artifacts/01_02_2024_03_04_05/data_transformation/test_transforms.json")
        );
        assert_eq!(config.transformation.resize, ResizeTarget::ShorterSide(224));
        assert_eq!(config.transformation.data_loader.batch_size, 2);
        assert!(config.transformation.data_loader.pin_memory);
        assert!(!config.transformation.data_loader.shuffle);
        Ok(())
    }

    #[test]
    fn test_from_file_partial_overrides() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("pipeline.json");
        fs::write(
            &path,
            r#"{
                "artifact_root": "/tmp/runs",
                "transformation": {
                    "resize": [256, 256],
                    "data_loader": { "batch_size": 8, "seed": 42 }
                }
            }"#,
        )?;

        let config = PipelineConfig::from_file(&path, "ts")?;
        assert_eq!(config.artifact_root, PathBuf::from("/tmp/runs"));
        assert_eq!(config.transformation.resize, ResizeTarget::Exact([256, 256]));
        assert_eq!(config.transformation.data_loader.batch_size, 8);
        assert_eq!(config.transformation.data_loader.seed, Some(42));
        assert!(config.transformation.data_loader.pin_memory);
        assert_eq!(config.transformation.center_crop, 224);
        assert_eq!(config.ingestion.bucket_name, BUCKET_NAME);
        Ok(())
    }

    #[test]
    fn test_invalid_files() -> anyhow::Result<()> {
        let dir = tempdir()?;
        assert!(matches!(
            PipelineConfig::from_file(dir.path().join("missing.json"), "ts"),
            Err(ConfigError::Read { .. })
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json")?;
        assert!(matches!(
            PipelineConfig::from_file(&bad, "ts"),
            Err(ConfigError::Parse { .. })
        ));

        let zero = dir.path().join("zero.json");
        fs::write(&zero, r#"{"transformation": {"data_loader": {"batch_size": 0}}}"#)?;
        assert!(matches!(
            PipelineConfig::from_file(&zero, "ts"),
            Err(ConfigError::Invalid { name: "transformation.data_loader.batch_size", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_misspelled_fields_are_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested.json");
        fs::write(
            &nested,
            r#"{"transformation": {"data_loader": {"batchsize": 8}}}"#,
        )?;
        let err = PipelineConfig::from_file(&nested, "ts").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        let cause = std::error::Error::source(&err).map(ToString::to_string);
        assert!(cause.is_some_and(|cause| cause.contains("batchsize")));

        let top = dir.path().join("top.json");
        fs::write(&top, r#"{"bucket": "other"}"#)?;
        assert!(matches!(
            PipelineSettings::from_file(&top),
            Err(ConfigError::Parse { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_loader_params_convert() {
        let params = DataLoaderParams {
            seed: Some(3),
            num_workers: 2,
            ..DataLoaderParams::default()
        };
        let config = DataLoaderConfig::from(&params);
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.seed, Some(3));
        assert!(config.pin_memory);
    }
}
