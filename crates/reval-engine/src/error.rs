use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
