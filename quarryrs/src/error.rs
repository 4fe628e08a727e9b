use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuarryError>;

#[derive(Debug, Error)]
pub enum QuarryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compilation(String),
    #[error("Database Error\n  {0}")]
    Database(#[from] duckdb::Error),
    #[error("execution error: {0}")]
    Execution(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
