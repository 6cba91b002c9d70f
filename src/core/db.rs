use crate::core::errors::ApiError;
use crate::follow::{follow, is_following};
use crate::models::models::UserId;
use crate::posts;
use crate::users::{register, RegisterForm};
use crate::AppContext;

const DEMO_PASSWORD: &str = "password";

fn demo_user(ctx: &AppContext<'_>, name: &str, nickname: &str) -> Result<(UserId, bool), ApiError> {
    let email = format!("{}@example.com", nickname);
    if let Some(user) = ctx.repo.user_by_email(&email)? {
        return Ok((user.id, false));
    }
    let user = register(
        ctx,
        RegisterForm {
            name: Some(name.to_string()),
            nickname: Some(nickname.to_string()),
            email: Some(email),
            password: Some(DEMO_PASSWORD.to_string()),
        },
    )?;
    Ok((user.id, true))
}

/// Seeds a few demo users, posts and follow edges. Safe to run repeatedly:
/// existing demo users are left untouched.
pub fn seed_demo_data(ctx: &AppContext<'_>) -> Result<(), ApiError> {
    let (alice, alice_created) = demo_user(ctx, "Alice", "alice")?;
    let (bob, bob_created) = demo_user(ctx, "Bob", "bob")?;
    let (test, _) = demo_user(ctx, "Test", "test")?;

    if alice_created {
        posts::create(ctx, alice, "Welcome", "Welcome to my page! Excited to share thoughts here.")?;
        posts::create(ctx, alice, "Productive day", "Just finished an amazing project.")?;
    }
    if bob_created {
        posts::create(ctx, bob, "Hello", "Hey everyone! Just joined, looking forward to connecting.")?;
    }

    for (follower, followee) in [(test, bob), (bob, alice), (alice, bob)] {
        if !is_following(ctx, follower, followee)? {
            follow(ctx, follower, followee)?;
        }
    }

    tracing::info!("demo data ready");
    Ok(())
}
