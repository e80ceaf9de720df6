use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected response shape: {0}")]
    SchemaShape(String),

    #[error("no rotation window in storage covers the requested instant")]
    NoSchedule,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{failures} of the last {capacity} cycles failed (threshold {threshold})")]
    CircuitBreaker {
        failures: usize,
        capacity: usize,
        threshold: f64,
    },
}

pub type Result<T> = std::result::Result<T, AppError>;
