use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AskError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AskError>;
