use thiserror::Error;

#[derive(Error, Debug)]
pub enum KVError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("quota exceeded writing {key}: limit is {limit} bytes")]
    QuotaExceeded { key: String, limit: usize },
}
