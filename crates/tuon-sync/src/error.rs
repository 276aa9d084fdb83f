//! Error types for sync operations.

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while loading, caching or syncing a document.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum SyncError {
    /// Local durable store failed to read or write.
    #[error("local store error: {0}")]
    #[diagnostic(code(sync::local_store))]
    LocalStore(String),

    /// Local snapshot is missing or incomplete; nothing is sent remotely.
    #[error("local snapshot for {id} is missing or incomplete")]
    #[diagnostic(
        code(sync::corrupt_snapshot),
        help("the document stays pending; the next local save rewrites the snapshot")
    )]
    CorruptSnapshot { id: String },

    /// Remote call failed (network, transport, backend exception).
    #[error("remote error: {0}")]
    #[diagnostic(code(sync::remote))]
    Remote(String),

    /// Remote API answered but reported failure.
    #[error("remote {operation} failed for {id}")]
    #[diagnostic(code(sync::rejected))]
    Rejected { operation: &'static str, id: String },

    /// No authenticated user.
    #[error("not authenticated")]
    #[diagnostic(code(sync::not_authenticated))]
    NotAuthenticated,

    /// An operation needed an open document and there was none.
    #[error("no document is open")]
    #[diagnostic(code(sync::no_document))]
    NoActiveDocument,

    /// A newer open request replaced this one before it finished loading.
    #[error("opening {id} was superseded by a newer request")]
    #[diagnostic(code(sync::superseded))]
    Superseded { id: String },

    /// Image resolution or title suggestion failed.
    #[error("service error: {0}")]
    #[diagnostic(code(sync::service))]
    Service(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] tuon_common::ConfigError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    #[diagnostic(code(sync::serialization))]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether retrying the same operation later can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SyncError::NoActiveDocument | SyncError::Superseded { .. } | SyncError::Config(_)
        )
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::LocalStore(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
