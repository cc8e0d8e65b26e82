//! Share service error type and its HTTP status mapping.

use serde::{Deserialize, Serialize};

/// Error categories surfaced by the share-link API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalError,
}

impl ShareErrorKind {
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InternalError => 500,
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            _ => Self::InternalError,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::InternalError => "Internal Server Error",
        }
    }
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{error} [{status_code}]: {message}")]
pub struct ShareError {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub error: String,
    pub message: String,
}

impl ShareError {
    pub fn new(kind: ShareErrorKind, message: impl Into<String>) -> Self {
        Self {
            status_code: kind.status(),
            error: kind.reason().to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ShareErrorKind::BadRequest, message)
    }

    /// The uniform denial: never says which check failed.
    pub fn unauthorized() -> Self {
        Self::new(ShareErrorKind::Unauthorized, "Unauthorized")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ShareErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ShareErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ShareErrorKind::InternalError, message)
    }

    pub fn kind(&self) -> ShareErrorKind {
        ShareErrorKind::from_status(self.status_code)
    }
}
