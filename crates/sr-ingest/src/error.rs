use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("source error: {0}")]
    Source(String),

    #[error("source request failed: {0}")]
    Http(#[from] reqwest::Error),
}
