use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use xray_pipeline::artifact::DataIngestionArtifact;
use xray_pipeline::config::{current_timestamp, PipelineConfig, PipelineSettings};
use xray_pipeline::{logging, DataTransformation, S3Operation, TrainPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON settings file; missing fields use the defaults
    #[arg(long, env = "XRAY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for log files
    #[arg(long, env = "XRAY_LOG_DIR", default_value = logging::DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Root directory for run artifacts (overrides the settings file)
    #[arg(long, env = "XRAY_ARTIFACT_ROOT")]
    artifact_root: Option<PathBuf>,

    /// S3 bucket holding the dataset (overrides the settings file)
    #[arg(long, env = "XRAY_BUCKET")]
    bucket: Option<String>,

    /// Program used for `s3 sync`
    #[arg(long, env = "XRAY_AWS_CLI", default_value = "aws")]
    aws_cli: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pull the dataset from S3 and build the train/test loaders
    Run,
    /// Build the train/test loaders from local image folders
    Transform {
        #[arg(long)]
        train_dir: PathBuf,
        #[arg(long)]
        test_dir: PathBuf,
    },
    /// Upload a local folder to S3
    Push {
        #[arg(long)]
        folder: PathBuf,
        #[arg(long)]
        prefix: String,
    },
    /// Download an S3 prefix into a local folder
    Pull {
        #[arg(long)]
        folder: PathBuf,
        #[arg(long)]
        prefix: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_dir) {
        eprintln!("Failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let s3 = S3Operation::with_program(&cli.aws_cli);

    match cli.command {
        Command::Run => {
            let artifact = TrainPipeline::new(config, s3).run_pipeline()?;
            info!(
                train_batches = artifact.transformed_train_object.len(),
                test_batches = artifact.transformed_test_object.len(),
                train_transforms = %artifact.train_transform_file_path.display(),
                test_transforms = %artifact.test_transform_file_path.display(),
                "Pipeline finished"
            );
        }
        Command::Transform {
            train_dir,
            test_dir,
        } => {
            let ingestion_artifact = DataIngestionArtifact {
                train_file_path: train_dir,
                test_file_path: test_dir,
            };
            let artifact = DataTransformation::new(config.transformation, ingestion_artifact)
                .initiate_data_transformation()?;
            info!(
                train_batches = artifact.transformed_train_object.len(),
                test_batches = artifact.transformed_test_object.len(),
                "Data transformation finished"
            );
        }
        Command::Push { folder, prefix } => {
            s3.sync_folder_to_s3(&folder, &config.ingestion.bucket_name, &prefix)?;
        }
        Command::Pull { folder, prefix } => {
            s3.sync_folder_from_s3(&folder, &config.ingestion.bucket_name, &prefix)?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut settings = match &cli.config {
        Some(path) => PipelineSettings::from_file(path)?,
        None => PipelineSettings::default(),
    };

    if let Some(root) = &cli.artifact_root {
        settings.artifact_root = Some(root.clone());
    }
    if let Some(bucket) = &cli.bucket {
        settings.bucket_name = Some(bucket.clone());
    }

    let config = PipelineConfig::from_settings(settings, current_timestamp())?;
    info!(
        artifact_root = %config.artifact_root.display(),
        bucket = %config.ingestion.bucket_name,
        "Configuration loaded"
    );
    Ok(config)
}
