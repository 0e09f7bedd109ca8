use thiserror::Error;

pub type EdgeResult<T> = Result<T, EdgeError>;

#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed audience definition caught while compiling it into an
    /// evaluation plan. The one error class worth surfacing to callers:
    /// silently mis-evaluating a bad definition would hide missed matches.
    #[error("Audience translation error: {0}")]
    Translation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
