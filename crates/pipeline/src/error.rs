use hooktail_core::error::CoreError;
use hooktail_core::exec::ExecError;

/// Why a stage failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Execution(#[from] ExecError),
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl PipelineError {
    /// Captured command output or the validation message, for the outcome log.
    pub fn detail(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Execution(err) if err.output().is_empty() => err.to_string(),
            Self::Execution(err) => err.output().to_string(),
        }
    }
}
