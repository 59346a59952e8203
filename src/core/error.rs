use thiserror::Error;

/// Errors that abort an analysis before a usable result exists.
///
/// Conditions that only end enumeration early once at least one solution has
/// been accepted are reported through
/// [`Termination`](crate::core::result::Termination) instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not extract a solution from the solved model: {0}")]
    Extraction(String),

    #[error("solver failure: {0}")]
    Solver(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),
}
