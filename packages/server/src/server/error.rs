//! Maps domain errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::common::ForumError;

impl ForumError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ForumError::NotFound(_) => StatusCode::NOT_FOUND,
            ForumError::Forbidden(_) => StatusCode::FORBIDDEN,
            ForumError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ForumError::Validation(_) => StatusCode::BAD_REQUEST,
            ForumError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ForumError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Details stay in the logs
            ForumError::Internal(e) => {
                error!(error = %e, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ForumError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ForumError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ForumError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ForumError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ForumError::from(anyhow::anyhow!("db down")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let response = ForumError::from(anyhow::anyhow!("password=hunter2")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
