//! Error types for admission decisions.
//!
//! Every failure the engine can hit maps onto exactly one HTTP-style status
//! code and reason, which the dispatcher turns into a deny response.

use thiserror::Error;

use crate::store::StoreError;
use crate::webhooks::policies::immutability::ImmutableFieldViolation;

/// Error type for admission checks
#[derive(Error, Debug)]
pub enum Error {
    /// The engine has no store handle yet
    #[error("not initialized")]
    Uninitialized,

    /// The request payload did not decode into the requested kind
    #[error("failed to decode {kind}: {source}")]
    Decode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// A field that may not change was changed
    #[error(transparent)]
    ImmutableField(#[from] ImmutableFieldViolation),

    /// A kind-specific rule rejected the object
    #[error("{0}")]
    Semantic(String),

    /// The caller is not allowed to perform this transition
    #[error("{0}")]
    Unauthorized(String),

    /// The object store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unexpected internal condition
    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn semantic(msg: impl Into<String>) -> Self {
        Self::Semantic(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status code reported to the API server
    pub fn code(&self) -> u16 {
        match self {
            Error::Decode { .. } => 400,
            Error::ImmutableField(_) | Error::Semantic(_) | Error::Unauthorized(_) => 403,
            Error::Uninitialized | Error::Store(_) | Error::Internal(_) => 500,
        }
    }

    /// Machine-readable reason matching [`Error::code`]
    pub fn reason(&self) -> &'static str {
        match self.code() {
            400 => "BadRequest",
            403 => "Forbidden",
            _ => "InternalError",
        }
    }

    /// Whether the caller may succeed by retrying the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Uninitialized | Error::Store(_))
    }
}

/// Result type alias for admission checks
pub type Result<T> = std::result::Result<T, Error>;
