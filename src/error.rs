use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrucibleError {
    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cluster API error: {0}")]
    Cluster(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CrucibleError>;
