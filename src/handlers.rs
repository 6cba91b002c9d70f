use spin_sdk::http::{Method, Request, Response};

use crate::core::errors::ApiError;
use crate::{auth, follow, posts, users, visibility, AppContext};

/// Dispatches a request to its handler and turns any error into a JSON
/// error response.
pub fn route(ctx: &AppContext<'_>, req: &Request) -> Response {
    let path = req.path();
    tracing::debug!(method = ?req.method(), path, "dispatching request");

    let result = match (req.method(), path) {
        (Method::Post, "/usuarios/register") => users::create_user(ctx, req),
        (Method::Post, "/usuarios/login") => auth::login_user(ctx, req),
        (Method::Get, "/usuarios/list") => users::list_users_page(ctx, req),
        (Method::Put, "/usuarios/me") => users::update_me(ctx, req),
        (Method::Delete, "/usuarios/me") => users::delete_me(ctx, req),
        (Method::Get, p) if p.starts_with("/usuarios/info/") => users::get_user_details(ctx, p),

        (Method::Post, "/posts/create") => posts::create_post(ctx, req),
        (Method::Get, "/posts/get") => posts::list_own_posts(ctx, req),
        (Method::Put, p) if p.starts_with("/posts/update/") => posts::edit_post(ctx, req),
        (Method::Delete, p) if p.starts_with("/posts/delete/") => posts::delete_post(ctx, req),
        (Method::Get, p) if p.starts_with("/posts/getpost/") => visibility::get_post(ctx, req),
        (Method::Get, p) if p.starts_with("/posts/user-posts/") => visibility::get_user_posts(ctx, req),

        (Method::Post, "/following/follow") => follow::handle_follow(ctx, req),
        (Method::Delete, "/following/unfollow") => follow::handle_unfollow(ctx, req),
        (Method::Get, "/following/followed") => follow::get_followed_list(ctx, req),
        (Method::Get, "/following/followers") => follow::get_followers_list(ctx, req),
        (Method::Get, "/following/mutual") => follow::get_mutual_list(ctx, req),

        _ => Err(ApiError::not_found("No route found")),
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            if err == ApiError::Internal {
                tracing::error!(path, "request failed");
            } else {
                tracing::debug!(path, error = %err, "request rejected");
            }
            err.into()
        }
    }
}
