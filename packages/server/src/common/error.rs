//! Domain error type shared by actions and views.

use thiserror::Error;

use crate::common::auth::AuthError;

/// Errors surfaced to callers of the forum entry points.
///
/// Infrastructure failures travel as `Internal`; everything else carries a
/// human-readable message suitable for the end user.
#[derive(Error, Debug)]
pub enum ForumError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ForumError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ForumError::NotFound(what.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        ForumError::Validation(reason.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ForumError::NotFound(_))
    }
}

impl From<AuthError> for ForumError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthenticationRequired => ForumError::Unauthenticated,
            other => ForumError::Forbidden(other.to_string()),
        }
    }
}

pub type ForumResult<T> = std::result::Result<T, ForumError>;
