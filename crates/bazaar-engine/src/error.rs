use bazaar_core::ScanKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("browser error: {0}")]
    Browser(#[from] bazaar_browser::BrowserError),

    #[error("extraction failed for {kind}: {reason}")]
    Extraction { kind: ScanKind, reason: String },

    #[error("store error: {0}")]
    Store(#[from] bazaar_store::StoreError),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("configuration error: {0}")]
    Config(#[from] bazaar_core::ConfigError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
