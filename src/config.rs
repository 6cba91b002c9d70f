use thiserror::Error;

pub const MIN_NAME_LENGTH: usize = 1;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MIN_NICKNAME_LENGTH: usize = 3;
pub const MAX_NICKNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 3;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_POST_LENGTH: usize = 5000;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_LIMIT: usize = 10;

pub const DEFAULT_TOKEN_TTL_SECS: i64 = 180;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

const MIN_JWT_SECRET_LENGTH: usize = 12;
const MAX_JWT_SECRET_LENGTH: usize = 1024;

// === KV key layout ===
pub const USERS_LIST_KEY: &str = "users_list";
pub const USER_SEQ_KEY: &str = "seq:user";
pub const POST_SEQ_KEY: &str = "seq:post";

pub fn user_key(id: i64) -> String {
    format!("user:{}", id)
}

pub fn nickname_key(nickname: &str) -> String {
    format!("nickname:{}", nickname.to_lowercase())
}

pub fn email_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

pub fn post_key(id: i64) -> String {
    format!("post:{}", id)
}

pub fn posts_of_key(owner_id: i64) -> String {
    format!("posts_of:{}", owner_id)
}

pub fn follow_key(follower_id: i64, followee_id: i64) -> String {
    format!("follow:{}:{}", follower_id, followee_id)
}

pub fn followings_key(user_id: i64) -> String {
    format!("followings:{}", user_id)
}

pub fn followers_key(user_id: i64) -> String {
    format!("followers:{}", user_id)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CIRCLE_JWT_SECRET is not set")]
    MissingJwtSecret,
    #[error("CIRCLE_JWT_SECRET must be between 12 and 1024 characters long")]
    InvalidJwtSecret,
    #[error("CIRCLE_TOKEN_TTL_SECS must be a positive number of seconds, got {0:?}")]
    InvalidTokenTtl(String),
}

/// Runtime settings, read from `CIRCLE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
}

impl Config {
    pub fn new(jwt_secret: impl Into<String>, token_ttl_secs: i64) -> Result<Self, ConfigError> {
        let jwt_secret = jwt_secret.into();
        if !(MIN_JWT_SECRET_LENGTH..=MAX_JWT_SECRET_LENGTH).contains(&jwt_secret.len()) {
            return Err(ConfigError::InvalidJwtSecret);
        }
        if token_ttl_secs <= 0 {
            return Err(ConfigError::InvalidTokenTtl(token_ttl_secs.to_string()));
        }
        Ok(Self {
            jwt_secret,
            token_ttl_secs,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("CIRCLE_JWT_SECRET").ok_or(ConfigError::MissingJwtSecret)?;
        let token_ttl_secs = match lookup("CIRCLE_TOKEN_TTL_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidTokenTtl(raw.clone()))?,
            None => DEFAULT_TOKEN_TTL_SECS,
        };
        Self::new(jwt_secret, token_ttl_secs)
    }
}

pub fn bind_addr() -> String {
    std::env::var("CIRCLE_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
}

pub fn seed_demo_enabled() -> bool {
    std::env::var("CIRCLE_SEED_DEMO")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}
