use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("loader error: {0}")]
    Loader(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
