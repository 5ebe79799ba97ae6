/// Domain errors shared by the pipeline and the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("No deployment configured for repository {repository}")]
    NotFound { repository: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}
