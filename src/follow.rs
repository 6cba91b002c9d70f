use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use spin_sdk::http::{Request, Response};

use crate::auth::authenticate;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, parse_json};
use crate::models::models::{FollowEdge, User, UserId, UserProfile, UserSummary};
use crate::store::{StoreError, UniqueField};
use crate::AppContext;

/// Outcome of a follow or unfollow: the edge and who it points at.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct EdgeChange {
    pub edge: FollowEdge,
    pub user: UserSummary,
}

fn followee(ctx: &AppContext<'_>, followee_id: UserId) -> Result<User, ApiError> {
    ctx.repo.user(followee_id)?.ok_or(ApiError::UserNotFound)
}

fn profiles(ctx: &AppContext<'_>, ids: &[UserId]) -> Result<Vec<UserProfile>, ApiError> {
    Ok(ctx
        .repo
        .users_by_ids(ids)?
        .iter()
        .map(UserProfile::from)
        .collect())
}

/// Creates the edge `follower -> followee`. The followee is checked before
/// anything is written, and the insert itself re-checks both endpoints.
#[tracing::instrument(skip(ctx))]
pub fn follow(ctx: &AppContext<'_>, follower_id: UserId, followee_id: UserId) -> Result<EdgeChange, ApiError> {
    if follower_id == followee_id {
        return Err(ApiError::SelfFollow);
    }
    let target = followee(ctx, followee_id)?;

    let edge = FollowEdge {
        follower_id,
        followee_id,
        created_at: Utc::now(),
    };
    ctx.repo.insert_edge(&edge).map_err(|err| match err {
        StoreError::Duplicate(UniqueField::FollowEdge) => ApiError::DuplicateEdge,
        StoreError::MissingUser(_) => ApiError::UserNotFound,
        other => other.into(),
    })?;

    tracing::info!("follow edge created");
    Ok(EdgeChange {
        edge,
        user: UserSummary::from(&target),
    })
}

#[tracing::instrument(skip(ctx))]
pub fn unfollow(ctx: &AppContext<'_>, follower_id: UserId, followee_id: UserId) -> Result<EdgeChange, ApiError> {
    if follower_id == followee_id {
        return Err(ApiError::SelfFollow);
    }
    let target = followee(ctx, followee_id)?;
    let edge = ctx
        .repo
        .edge(follower_id, followee_id)?
        .ok_or(ApiError::EdgeNotFound)?;

    // a concurrent unfollow may have won the race
    if !ctx.repo.delete_edge(follower_id, followee_id)? {
        return Err(ApiError::EdgeNotFound);
    }

    tracing::info!("follow edge removed");
    Ok(EdgeChange {
        edge,
        user: UserSummary::from(&target),
    })
}

pub fn is_following(ctx: &AppContext<'_>, follower_id: UserId, followee_id: UserId) -> Result<bool, ApiError> {
    Ok(ctx.repo.edge_exists(follower_id, followee_id)?)
}

/// Everyone `user_id` follows.
pub fn list_followed(ctx: &AppContext<'_>, user_id: UserId) -> Result<Vec<UserProfile>, ApiError> {
    let ids = ctx.repo.followee_ids(user_id)?;
    profiles(ctx, &ids)
}

/// Everyone following `user_id`.
pub fn list_followers(ctx: &AppContext<'_>, user_id: UserId) -> Result<Vec<UserProfile>, ApiError> {
    let ids = ctx.repo.follower_ids(user_id)?;
    profiles(ctx, &ids)
}

/// Users that `user_id` follows and who follow `user_id` back.
pub fn list_mutual(ctx: &AppContext<'_>, user_id: UserId) -> Result<Vec<UserProfile>, ApiError> {
    let followees: BTreeSet<UserId> = ctx.repo.followee_ids(user_id)?.into_iter().collect();
    let followers: BTreeSet<UserId> = ctx.repo.follower_ids(user_id)?.into_iter().collect();
    let mutual: Vec<UserId> = followees.intersection(&followers).copied().collect();
    profiles(ctx, &mutual)
}

// === HTTP Handlers ===

#[derive(Deserialize)]
struct FollowForm {
    followee_id: Option<UserId>,
}

fn target_of(req: &Request) -> Result<UserId, ApiError> {
    let form: FollowForm = parse_json(req.body())?;
    form.followee_id
        .ok_or_else(|| ApiError::validation("followee_id is required"))
}

pub fn handle_follow(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    let change = follow(ctx, requester.id, target_of(req)?)?;
    json_response(
        201,
        &serde_json::json!({
            "message": "You are now following this user",
            "user": change.user,
        }),
    )
}

pub fn handle_unfollow(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    let change = unfollow(ctx, requester.id, target_of(req)?)?;
    json_response(
        200,
        &serde_json::json!({
            "message": "You unfollowed this user",
            "user": change.user,
        }),
    )
}

fn non_empty(list: Vec<UserProfile>, message: &str) -> Result<Response, ApiError> {
    if list.is_empty() {
        return Err(ApiError::not_found(message));
    }
    json_response(200, &list)
}

pub fn get_followed_list(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    non_empty(list_followed(ctx, requester.id)?, "You do not follow anyone")
}

pub fn get_followers_list(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    non_empty(list_followers(ctx, requester.id)?, "You do not have any followers")
}

pub fn get_mutual_list(ctx: &AppContext<'_>, req: &Request) -> Result<Response, ApiError> {
    let requester = authenticate(ctx, req)?;
    non_empty(list_mutual(ctx, requester.id)?, "You do not have any mutual follows")
}
