//! Unified error types for tether.
//!
//! Every message carries a stable code prefix so hosts can match on it
//! without depending on the enum layout; `Error::code` returns the same prefix.

use tokio_rusqlite::rusqlite;

/// Unified error types for the interception core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty manifest path).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The origin could not be reached.
    #[error("NETWORK_FAILURE: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Only responses with a status below 300 may be stored.
    #[error("CACHE_ERROR: refusing to store response with status {0}")]
    NonSuccessResponse(u16),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored headers or payload could not be (de)serialized.
    #[error("CACHE_ERROR: serialization failed: {0}")]
    Serialization(String),

    /// A manifest asset could not be pre-cached; the install is aborted.
    #[error("INSTALL_FAILED: {key}: {reason}")]
    InstallAssetFailure { key: String, reason: String },

    /// A queued submission could not be delivered; it stays queued.
    #[error("DELIVERY_FAILED: submission {id}: {reason}")]
    QueueDeliveryFailure { id: i64, reason: String },

    /// Lifecycle transition requested from the wrong state.
    #[error("INVALID_STATE: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },
}

impl Error {
    /// Stable error code, identical to the message prefix.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Network(_) => "NETWORK_FAILURE",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::FetchTooLarge(_) => "FETCH_TOO_LARGE",
            Error::NonSuccessResponse(_)
            | Error::Database(_)
            | Error::MigrationFailed(_)
            | Error::Serialization(_) => "CACHE_ERROR",
            Error::InstallAssetFailure { .. } => "INSTALL_FAILED",
            Error::QueueDeliveryFailure { .. } => "DELIVERY_FAILED",
            Error::InvalidState { .. } => "INVALID_STATE",
        }
    }

    /// Whether the error came from the transport rather than local state.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTimeout(_) | Error::FetchTooLarge(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
