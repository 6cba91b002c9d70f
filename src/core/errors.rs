use http::StatusCode;
use spin_sdk::http::Response;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("You cannot follow yourself")]
    SelfFollow,
    #[error("You already follow this user")]
    DuplicateEdge,
    #[error("{0}")]
    NotFound(String),
    #[error("User not found")]
    UserNotFound,
    #[error("You do not follow this user")]
    EdgeNotFound,
    #[error("{0}")]
    Forbidden(String),
    #[error("Incorrect password")]
    InvalidCredential,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Missing token")]
    Unauthorized,
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::SelfFollow
            | ApiError::Conflict(_)
            | ApiError::InvalidCredential => StatusCode::BAD_REQUEST,
            ApiError::DuplicateEdge | ApiError::InvalidToken | ApiError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::UserNotFound | ApiError::EdgeNotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(what.to_string())
    }

    pub fn forbidden(why: &str) -> Self {
        ApiError::Forbidden(why.to_string())
    }

    pub fn validation(why: &str) -> Self {
        ApiError::Validation(why.to_string())
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        let body = serde_json::to_vec(&serde_json::json!({ "error": err.to_string() }))
            .unwrap_or_default();
        Response::builder()
            .status(err.status().as_u16())
            .header("Content-Type", "application/json")
            .body(body)
            .build()
    }
}

// Storage failures are logged here and never leak past the boundary.
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "storage failure");
        ApiError::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::SelfFollow.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::DuplicateEdge.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::EdgeNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn storage_errors_do_not_leak() {
        let err: ApiError = StoreError::Backend("connection refused at 10.0.0.3".to_string()).into();
        assert_eq!(err, ApiError::Internal);

        let response: Response = err.into();
        assert_eq!(*response.status(), 500);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], "Internal server error");
    }
}
