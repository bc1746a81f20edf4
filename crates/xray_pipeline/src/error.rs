//! Error type returned at component boundaries.

use thiserror::Error;

/// A pipeline stage failed.
///
/// Carries the name of the failing operation and the full cause chain of the
/// underlying error, so `{:#}` prints e.g.
/// `data_loader failed: Failed to access image folder: ...: No such file or directory`.
#[derive(Debug, Error)]
#[error("{operation} failed")]
pub struct XrayError {
    pub operation: &'static str,
    #[source]
    pub source: anyhow::Error,
}

impl XrayError {
    pub fn new(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }
}

/// Attaches the failing operation name to an `anyhow::Result`.
pub trait OperationContext<T> {
    fn in_operation(self, operation: &'static str) -> Result<T, XrayError>;
}

impl<T, E> OperationContext<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn in_operation(self, operation: &'static str) -> Result<T, XrayError> {
        self.map_err(|source| XrayError::new(operation, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_operation_and_chain_are_kept() {
        let result: anyhow::Result<()> = Err(anyhow!("disk full")).context("writing transforms");
        let err = result.in_operation("initiate_data_transformation").unwrap_err();

        assert_eq!(err.operation, "initiate_data_transformation");
        assert_eq!(err.to_string(), "initiate_data_transformation failed");

        let chain = format!("{:#}", anyhow::Error::new(err));
        assert!(chain.contains("writing transforms"));
        assert!(chain.contains("disk full"));
    }

    #[test]
    fn test_io_errors_convert() {
        let io: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = io.in_operation("get_data_from_s3").unwrap_err();
        assert!(err.source.to_string().contains("gone"));
    }
}
