use thiserror::Error;

/// Errors from the registrar client and the DNS reconciler.
#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("request to registrar failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to decode registrar response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("registrar returned status {status}: {body}")]
    Status { status: String, body: String },
}
