use serde::Deserialize;
use spin_sdk::http::{Request, Response};

use crate::auth::authenticate;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, message_response, parse_json, parse_path_id, sanitize_text};
use crate::models::models::{NewPost, Post, PostId, UserId};
use crate::AppContext;

fn check_title(title: &str) -> Result<String, ApiError> {
    let title = sanitize_text(title);
    if title.is_empty() || title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::validation("Invalid title"));
    }
    Ok(title)
}

fn check_body(body: &str) -> Result<String, ApiError> {
    let body = sanitize_text(body);
    if body.is_empty() || body.chars().count() > MAX_POST_LENGTH {
        return Err(ApiError::validation("Invalid content"));
    }
    Ok(body)
}

#[tracing::instrument(skip(ctx, title, body))]
pub fn create(ctx: &AppContext<'_>, owner_id: UserId, title: &str, body: &str) -> Result<Post, ApiError> {
    let post = ctx.repo.insert_post(NewPost {
        owner_id,
        title: check_title(title)?,
        body: check_body(body)?,
    })?;
    tracing::info!(post_id = post.id, "post created");
    Ok(post)
}

pub fn get(ctx: &AppContext<'_>, post_id: PostId) -> Result<Post, ApiError> {
    ctx.repo
        .post(post_id)?
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

#[derive(Debug, Default, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

fn owned_post(ctx: &AppContext<'_>, post_id: PostId, requester_id: UserId, action: &str) -> Result<Post, ApiError> {
    let post = get(ctx, post_id)?;
    if post.owner_id != requester_id {
        tracing::warn!(post_id, requester_id, "refused to {} someone else's post", action);
        return Err(ApiError::Forbidden(format!("Not allowed to {} this post", action)));
    }
    Ok(post)
}

/// Present fields overwrite, omitted ones keep their stored value.
#[tracing::instrument(skip(ctx, patch))]
pub fn update(
    ctx: &AppContext<'_>,
    post_id: PostId,
    requester_id: UserId,
    patch: PostPatch,
) -> Result<Post, ApiError> {
    let mut post = owned_post(ctx, post_id, requester_id, "modify")?;

    if let Some(title) = patch.title.as_deref() {
        post.title = check_title(title)?;
    }
    if let Some(body) = patch.body.as_deref() {
        post.body = check_body(body)?;
    }
    post.updated_at = Some(chrono::Utc::now());

    ctx.repo.update_post(&post)?;
    Ok(post)
}

#[tracing::instrument(skip(ctx))]
pub fn delete(ctx: &AppContext<'_>, post_id: PostId, requester_id: UserId) -> Result<(), ApiError> {
    owned_post(ctx, post_id, requester_id, "delete")?;
    if !ctx.repo.delete_post(post_id)? {
        return Err(ApiError::not_found("Post not found"));
    }
    tracing::info!("post deleted");
    Ok(())
}

/// Posts of `owner_id`, newest first. May be empty.
pub fn list_by_owner(ctx: &AppContext<'_>, owner_id: UserId) -> Result<Vec<Post>, ApiError> {
    Ok(ctx.repo.posts_by_owner(owner_id)?)
}

// === HTTP Handlers ===

#[derive(Deserialize)]
struct CreatePostForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
}

pub fn create_post(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    let form: CreatePostForm = parse_json(req.body())?;
    let post = create(ctx, requester.id, &form.title, &form.body)?;
    json_response(201, &post)
}

pub fn list_own_posts(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    let posts = list_by_owner(ctx, requester.id)?;
    if posts.is_empty() {
        return Err(ApiError::not_found("You have not created any posts"));
    }
    json_response(200, &posts)
}

pub fn edit_post(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    let post_id = parse_path_id(req.path(), "/posts/update/")?;
    let patch: PostPatch = parse_json(req.body())?;
    let post = update(ctx, post_id, requester.id, patch)?;
    json_response(
        200,
        &serde_json::json!({
            "message": "Post updated",
            "post": post,
        }),
    )
}

pub fn delete_post(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    let post_id = parse_path_id(req.path(), "/posts/delete/")?;
    delete(ctx, post_id, requester.id)?;
    message_response(200, "Post deleted")
}
