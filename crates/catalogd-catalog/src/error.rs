use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request to catalog failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to decode catalog response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("catalog returned status {status}: {body}")]
    Status { status: u16, body: String },
}
