use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown storage backend: {0}")]
    UnknownBackend(String),

    #[error("invalid item id: {0:?}")]
    InvalidItemId(String),

    #[error("corrupt storage row: {0}")]
    Corrupt(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}
