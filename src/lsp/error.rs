//! Error types for the analysis service.

#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("{query} query failed: {message}")]
    Query { query: &'static str, message: String },
    #[error("service panicked during {0}")]
    Panicked(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to fetch {location}: {message}")]
    Fetch { location: String, message: String },
    #[error("invalid asset {location}: {reason}")]
    InvalidAsset { location: String, reason: String },
    #[error("service instantiation failed: {0}")]
    Instantiation(String),
    #[error("service reported not ready after loading")]
    NotReady,
    #[error("initialisation task aborted")]
    Aborted,
}
