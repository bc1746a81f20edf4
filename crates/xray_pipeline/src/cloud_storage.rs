//! Folder sync against S3 through the `aws` command line tool.
//!
//! Each call runs `<program> s3 sync <src> <dst>` once and blocks until it
//! exits. Arguments are passed as a discrete argv; nothing goes through a
//! shell. There are no retries.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Default CLI used for syncing.
pub const AWS_CLI: &str = "aws";

#[derive(Debug, Clone)]
pub struct S3Operation {
    program: OsString,
}

impl Default for S3Operation {
    fn default() -> Self {
        Self::new()
    }
}

impl S3Operation {
    pub fn new() -> Self {
        Self::with_program(AWS_CLI)
    }

    /// Uses `program` in place of `aws`. It is invoked with the same
    /// `s3 sync <src> <dst>` arguments.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Uploads `folder` to `s3://<bucket_name>/<bucket_folder_name>`.
    pub fn sync_folder_to_s3(
        &self,
        folder: impl AsRef<Path>,
        bucket_name: &str,
        bucket_folder_name: &str,
    ) -> Result<()> {
        let destination = s3_uri(bucket_name, bucket_folder_name);
        info!(folder = %folder.as_ref().display(), %destination, "Syncing folder to S3");
        self.sync(folder.as_ref().as_os_str().to_owned(), destination.into())
    }

    /// Downloads `s3://<bucket_name>/<bucket_folder_name>` into `folder`.
    pub fn sync_folder_from_s3(
        &self,
        folder: impl AsRef<Path>,
        bucket_name: &str,
        bucket_folder_name: &str,
    ) -> Result<()> {
        let source = s3_uri(bucket_name, bucket_folder_name);
        info!(%source, folder = %folder.as_ref().display(), "Syncing folder from S3");
        self.sync(source.into(), folder.as_ref().as_os_str().to_owned())
    }

    fn sync(&self, source: OsString, destination: OsString) -> Result<()> {
        let args = sync_args(source, destination);
        debug!(program = ?self.program, ?args, "Running sync command");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .with_context(|| format!("Failed to run {:?}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{:?} s3 sync exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

pub(crate) fn s3_uri(bucket_name: &str, bucket_folder_name: &str) -> String {
    format!(
        "s3://{}/{}",
        bucket_name,
        bucket_folder_name.trim_start_matches('/')
    )
}

pub(crate) fn sync_args(source: OsString, destination: OsString) -> Vec<OsString> {
    vec!["s3".into(), "sync".into(), source, destination]
}
