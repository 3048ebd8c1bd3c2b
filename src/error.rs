//! Error taxonomy shared by every pipeline stage

use thiserror::Error;

/// Failure raised by a pipeline stage.
///
/// All variants are deterministic validation failures; nothing is retried
/// internally and the caller's input table is never modified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// A referenced column is absent or has the wrong kind
    #[error("schema error: {0}")]
    Schema(String),
    /// A statistic is undefined for the data at hand
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    /// A caller-supplied parameter is out of range or malformed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl PipelineError {
    pub(crate) fn missing_column(name: &str) -> Self {
        PipelineError::Schema(format!("column '{}' not found", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::Schema("column 'age' not found".to_string());
        assert_eq!(err.to_string(), "schema error: column 'age' not found");

        let err = PipelineError::InsufficientData("empty".to_string());
        assert_eq!(err.to_string(), "insufficient data: empty");

        let err = PipelineError::InvalidArgument("k = 0".to_string());
        assert_eq!(err.to_string(), "invalid argument: k = 0");
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let err = PipelineError::missing_column("tier");
        assert!(matches!(err, PipelineError::Schema(ref msg) if msg.contains("tier")));
    }

    #[test]
    fn test_error_converts_to_anyhow() {
        fn fails() -> anyhow::Result<()> {
            Err(PipelineError::InvalidArgument("bad".to_string()))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(err.downcast_ref::<PipelineError>().is_some());
    }
}
