use thiserror::Error;

/// Failure of an external collaborator: the package manager subprocess or
/// the remote tutor.
///
/// These never reach the user as errors. Each collaborator renders them
/// into its own prefixed message.
#[derive(Debug, Error)]
pub enum ToolingError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0} seconds")]
    Timeout(u64),

    #[error("{0}")]
    Failed(String),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API key is not configured (set API_KEY)")]
    MissingApiKey,

    #[error("request failed with status {0}")]
    Status(reqwest::StatusCode),

    #[error("response contained no choices")]
    EmptyResponse,
}
