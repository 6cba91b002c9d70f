use ammonia::Builder;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use serde::Serialize;
use spin_sdk::http::Response;

use crate::core::errors::ApiError;

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!(error = %e, "failed to hash password");
            ApiError::Internal
        })
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Strips every HTML tag; only plain text is stored. ammonia serializes its
/// output as HTML, so entities are decoded back before storing.
pub fn sanitize_text(text: &str) -> String {
    let cleaned = Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text.trim())
        .to_string();
    html_escape::decode_html_entities(&cleaned).trim().to_string()
}

pub fn json_response<T: Serialize>(status: u16, value: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(value).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize response body");
        ApiError::Internal
    })?;
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body)
        .build())
}

pub fn message_response(status: u16, message: &str) -> Result<Response, ApiError> {
    json_response(status, &serde_json::json!({ "message": message }))
}

/// Parses the trailing id segment of `path` after `prefix`.
pub fn parse_path_id(path: &str, prefix: &str) -> Result<i64, ApiError> {
    let raw = path.trim_start_matches(prefix).trim_end_matches('/');
    if raw.is_empty() {
        return Err(ApiError::validation("Id required"));
    }
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::validation("Invalid id"))
}

pub fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e)))
}
