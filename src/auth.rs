use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use spin_sdk::http::{Request, Response};

use crate::config::Config;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, parse_json, verify_password};
use crate::models::models::{Requester, TokenClaims, User};
use crate::AppContext;

pub fn issue_token(config: &Config, user: &User) -> Result<String, ApiError> {
    let iat = Utc::now().timestamp();
    let claims = TokenClaims {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        iat,
        exp: iat + config.token_ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "failed to sign token");
        ApiError::Internal
    })
}

/// Checks signature and expiry; returns the identity the token carries.
pub fn verify_token(config: &Config, token: &str) -> Result<Requester, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // expiry is exact, the configured TTL is the whole lifetime
    validation.leeway = 0;
    let data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::InvalidToken
    })?;

    Ok(Requester {
        id: data.claims.id,
        name: data.claims.name,
        email: data.claims.email,
    })
}

/// Token from the `Authorization` header, with or without the `Bearer` prefix.
pub fn bearer_token(req: &Request) -> Option<&str> {
    let auth_header = req.header("Authorization")?.as_str()?.trim();
    let token = auth_header
        .strip_prefix("Bearer ")
        .unwrap_or(auth_header)
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Resolves the requester of an authenticated route. The token's user must
/// still exist.
pub fn authenticate(ctx: &AppContext<'_>, req: &Request) -> Result<Requester, ApiError> {
    let token = bearer_token(req).ok_or(ApiError::Unauthorized)?;
    let requester = verify_token(ctx.config, token)?;
    if ctx.repo.user(requester.id)?.is_none() {
        tracing::warn!(user_id = requester.id, "token for a deleted user");
        return Err(ApiError::InvalidToken);
    }
    Ok(requester)
}

/// Email/password check followed by token issuance.
#[tracing::instrument(skip_all)]
pub fn login(ctx: &AppContext<'_>, email: &str, password: &str) -> Result<String, ApiError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }
    let user = ctx
        .repo
        .user_by_email(email.trim())?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(password, &user.password_hash) {
        tracing::warn!(user_id = user.id, "failed login attempt");
        return Err(ApiError::InvalidCredential);
    }

    tracing::info!(user_id = user.id, "user logged in");
    issue_token(ctx.config, &user)
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

pub fn login_user(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let form: LoginForm = parse_json(req.body())?;
    let token = login(ctx, &form.email, &form.password)?;
    json_response(
        200,
        &serde_json::json!({
            "message": "Login successful",
            "token": token,
        }),
    )
}
