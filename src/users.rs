use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use spin_sdk::http::{Request, Response};

use crate::auth::authenticate;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{hash_password, json_response, message_response, parse_json, parse_path_id, sanitize_text};
use crate::core::query_params::{get_positive_int, parse_query_params};
use crate::models::models::{NewUser, Page, UserId, UserView};
use crate::store::{StoreError, UniqueField};
use crate::AppContext;

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Regex should compile")
    })
}

fn conflict(err: StoreError) -> ApiError {
    match err {
        StoreError::Duplicate(UniqueField::Nickname | UniqueField::Email) => {
            ApiError::Conflict("Email or nickname already exists".to_string())
        }
        other => other.into(),
    }
}

fn check_name(name: &str) -> Result<String, ApiError> {
    let name = sanitize_text(name);
    if name.chars().count() < MIN_NAME_LENGTH || name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::validation("Name must be 1-100 characters"));
    }
    Ok(name)
}

fn check_nickname(nickname: &str) -> Result<String, ApiError> {
    let nickname = sanitize_text(nickname);
    let len = nickname.chars().count();
    if !(MIN_NICKNAME_LENGTH..=MAX_NICKNAME_LENGTH).contains(&len) || nickname.contains(char::is_whitespace) {
        return Err(ApiError::validation(
            "Nickname must be 3-50 characters without spaces",
        ));
    }
    Ok(nickname)
}

fn check_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_string();
    if email.len() > MAX_EMAIL_LENGTH || !email_regex().is_match(&email) {
        return Err(ApiError::validation("Invalid email"));
    }
    Ok(email)
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation("Password must be at least 3 characters"));
    }
    Ok(())
}

// Mirrors the avatar upload filter: jpeg, jpg or png only.
fn check_avatar_path(path: &str) -> Result<String, ApiError> {
    let path = path.trim();
    let allowed = mime_guess::from_path(path)
        .iter()
        .any(|mime| mime == mime_guess::mime::IMAGE_JPEG || mime == mime_guess::mime::IMAGE_PNG);
    if path.is_empty() || path.contains("..") || !allowed {
        return Err(ApiError::validation("Only JPEG, JPG or PNG avatars are allowed"));
    }
    Ok(path.to_string())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validates, hashes the password and stores the new user.
#[tracing::instrument(skip_all)]
pub fn register(ctx: &AppContext<'_>, form: RegisterForm) -> Result<UserView, ApiError> {
    let (Some(name), Some(nickname), Some(email), Some(password)) =
        (form.name, form.nickname, form.email, form.password)
    else {
        return Err(ApiError::validation("All fields are required"));
    };
    if [&name, &nickname, &email, &password].iter().any(|v| v.trim().is_empty()) {
        return Err(ApiError::validation("All fields are required"));
    }

    let name = check_name(&name)?;
    let nickname = check_nickname(&nickname)?;
    let email = check_email(&email)?;
    check_password(&password)?;

    let password_hash = hash_password(&password)?;
    let user = ctx
        .repo
        .insert_user(NewUser {
            name,
            nickname,
            email,
            password_hash,
        })
        .map_err(conflict)?;

    tracing::info!(user_id = user.id, "registered user");
    Ok(UserView::from(&user))
}

pub fn list_users(ctx: &AppContext<'_>, page: usize, limit: usize) -> Result<Page<UserView>, ApiError> {
    if page < 1 || limit < 1 {
        return Err(ApiError::validation("Page and limit must be positive values"));
    }
    let total_items = ctx.repo.count_users()?;
    let offset = (page - 1).saturating_mul(limit);
    let data = ctx
        .repo
        .users_page(offset, limit)?
        .iter()
        .map(UserView::from)
        .collect();

    Ok(Page {
        total_items,
        total_pages: total_items.div_ceil(limit),
        current_page: page,
        items_per_page: limit,
        data,
    })
}

pub fn get_user(ctx: &AppContext<'_>, id: UserId) -> Result<UserView, ApiError> {
    ctx.repo
        .user(id)?
        .map(|user| UserView::from(&user))
        .ok_or_else(|| ApiError::not_found("User not found"))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub avatar_path: Option<String>,
}

/// Self-service profile update. Omitted or empty fields keep their value.
#[tracing::instrument(skip_all, fields(user_id = requester_id))]
pub fn update_profile(
    ctx: &AppContext<'_>,
    requester_id: UserId,
    patch: ProfilePatch,
) -> Result<UserView, ApiError> {
    let mut user = ctx
        .repo
        .user(requester_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !is_blank(&patch.name) {
        user.name = check_name(patch.name.as_deref().unwrap_or_default())?;
    }
    if !is_blank(&patch.nickname) {
        user.nickname = check_nickname(patch.nickname.as_deref().unwrap_or_default())?;
    }
    if !is_blank(&patch.email) {
        user.email = check_email(patch.email.as_deref().unwrap_or_default())?;
    }
    if !is_blank(&patch.avatar_path) {
        user.avatar_path = Some(check_avatar_path(patch.avatar_path.as_deref().unwrap_or_default())?);
    }
    if let Some(password) = patch.password.filter(|p| !p.is_empty()) {
        check_password(&password)?;
        user.password_hash = hash_password(&password)?;
    }
    user.updated_at = chrono::Utc::now();

    ctx.repo.update_user(&user).map_err(conflict)?;
    tracing::info!("profile updated");
    Ok(UserView::from(&user))
}

/// Removes the account with its posts and every follow edge touching it.
#[tracing::instrument(skip_all, fields(user_id = requester_id))]
pub fn delete_account(ctx: &AppContext<'_>, requester_id: UserId) -> Result<(), ApiError> {
    if !ctx.repo.delete_user(requester_id)? {
        return Err(ApiError::not_found("User not found"));
    }
    tracing::info!("account deleted");
    Ok(())
}

// === HTTP Handlers ===

pub fn create_user(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let form: RegisterForm = parse_json(req.body())?;
    let user = register(ctx, form)?;
    json_response(201, &user)
}

pub fn list_users_page(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let params = parse_query_params(req.uri());
    let page = get_positive_int(&params, "page", DEFAULT_PAGE)?;
    let limit = get_positive_int(&params, "limit", DEFAULT_PAGE_LIMIT)?;
    json_response(200, &list_users(ctx, page, limit)?)
}

pub fn get_user_details(ctx: &AppContext<'_>, path: &str) -> Result<Response, ApiError> {
    let user_id = parse_path_id(path, "/usuarios/info/")?;
    json_response(200, &get_user(ctx, user_id)?)
}

pub fn update_me(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    let patch: ProfilePatch = parse_json(req.body())?;
    json_response(200, &update_profile(ctx, requester.id, patch)?)
}

pub fn delete_me(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    delete_account(ctx, requester.id)?;
    message_response(200, "Account deleted")
}
