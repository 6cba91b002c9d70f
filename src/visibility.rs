//! Read authorization for posts.
//!
//! A requester sees a post when they own it or follow its owner. The check
//! runs against the follow graph on every read; nothing here is cached.

use spin_sdk::http::{Request, Response};

use crate::auth::authenticate;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, parse_path_id};
use crate::follow::is_following;
use crate::models::models::{Post, PostId, PostWithAuthor, UserId, UserProfile};
use crate::posts;
use crate::AppContext;

pub fn can_view(ctx: &AppContext<'_>, requester_id: UserId, post: &Post) -> Result<bool, ApiError> {
    if requester_id == post.owner_id {
        return Ok(true);
    }
    is_following(ctx, requester_id, post.owner_id)
}

fn author(ctx: &AppContext<'_>, owner_id: UserId) -> Result<UserProfile, ApiError> {
    ctx.repo
        .user(owner_id)?
        .map(|user| UserProfile::from(&user))
        .ok_or_else(|| ApiError::not_found("Author not found"))
}

#[tracing::instrument(skip(ctx))]
pub fn get_post_by_id(ctx: &AppContext<'_>, requester_id: UserId, post_id: PostId) -> Result<PostWithAuthor, ApiError> {
    let post = posts::get(ctx, post_id)?;
    if !can_view(ctx, requester_id, &post)? {
        return Err(ApiError::forbidden("You are not allowed to view this post"));
    }
    let author = author(ctx, post.owner_id)?;
    Ok(PostWithAuthor { post, author })
}

/// Posts of `target_user_id`, visible to the user themselves or to their
/// followers. An empty result is reported as not found.
#[tracing::instrument(skip(ctx))]
pub fn get_posts_by_user(
    ctx: &AppContext<'_>,
    requester_id: UserId,
    target_user_id: UserId,
) -> Result<Vec<PostWithAuthor>, ApiError> {
    if requester_id != target_user_id && !is_following(ctx, requester_id, target_user_id)? {
        return Err(ApiError::forbidden("You are not allowed to view these posts"));
    }

    let posts = posts::list_by_owner(ctx, target_user_id)?;
    if posts.is_empty() {
        return Err(ApiError::not_found("This user has no posts"));
    }
    let author = author(ctx, target_user_id)?;
    Ok(posts
        .into_iter()
        .map(|post| PostWithAuthor {
            post,
            author: author.clone(),
        })
        .collect())
}

// === HTTP Handlers ===

pub fn get_post(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    let post_id = parse_path_id(req.path(), "/posts/getpost/")?;
    json_response(200, &get_post_by_id(ctx, requester.id, post_id)?)
}

pub fn get_user_posts(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    let target_user_id = parse_path_id(req.path(), "/posts/user-posts/")?;
    json_response(200, &get_posts_by_user(ctx, requester.id, target_user_id)?)
}
