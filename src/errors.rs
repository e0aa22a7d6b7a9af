use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a pipeline step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed input '{}': {reason}", path.display())]
    MalformedInput { path: PathBuf, reason: String },
    #[error("missing dependency for {stage}: '{}' does not exist", path.display())]
    MissingDependency { stage: &'static str, path: PathBuf },
    #[error("id map '{}' is not a bijection onto 0..{len}: {details}", path.display())]
    CorruptIdMap {
        path: PathBuf,
        len: usize,
        details: String,
    },
    #[error("configuration error: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::MalformedInput {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing(stage: &'static str, path: impl Into<PathBuf>) -> Self {
        PipelineError::MissingDependency {
            stage,
            path: path.into(),
        }
    }
}

/// Fail with `MissingDependency` unless `path` exists.
pub fn require(stage: &'static str, path: &std::path::Path) -> Result<(), PipelineError> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::missing(stage, path))
    }
}
