//! Data access for users, posts and follow edges.
//!
//! Services never reach for a global handle; they receive a
//! `&dyn Repository` through [`crate::AppContext`]. Uniqueness rules
//! (nickname, email, one edge per ordered pair) are enforced by the
//! repository itself so concurrent writers resolve to a single winner.

use thiserror::Error;

use crate::models::models::{FollowEdge, NewPost, NewUser, Post, PostId, User, UserId};

pub mod kv;
pub mod memory;

pub use kv::KvRepository;
pub use memory::MemoryRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Nickname,
    Email,
    FollowEdge,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated on {0:?}")]
    Duplicate(UniqueField),
    #[error("referenced user {0} does not exist")]
    MissingUser(UserId),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub(crate) fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

pub trait Repository {
    /// Inserts a user with a freshly assigned id.
    /// Fails with [`StoreError::Duplicate`] on a taken nickname or email.
    fn insert_user(&self, new: NewUser) -> Result<User, StoreError>;
    fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Resolves ids to users, skipping ids that no longer exist. Output is
    /// ordered by id.
    fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError>;
    /// Users ordered by id.
    fn users_page(&self, offset: usize, limit: usize) -> Result<Vec<User>, StoreError>;
    fn count_users(&self) -> Result<usize, StoreError>;
    /// Overwrites an existing user, keeping nickname/email uniqueness.
    fn update_user(&self, user: &User) -> Result<(), StoreError>;
    /// Removes the user, their posts and every edge touching them.
    /// Returns `false` when there was no such user.
    fn delete_user(&self, id: UserId) -> Result<bool, StoreError>;

    fn insert_post(&self, new: NewPost) -> Result<Post, StoreError>;
    fn post(&self, id: PostId) -> Result<Option<Post>, StoreError>;
    fn update_post(&self, post: &Post) -> Result<(), StoreError>;
    fn delete_post(&self, id: PostId) -> Result<bool, StoreError>;
    /// Posts of `owner_id`, newest first.
    fn posts_by_owner(&self, owner_id: UserId) -> Result<Vec<Post>, StoreError>;

    /// Inserts the edge if absent. Both endpoints must exist
    /// ([`StoreError::MissingUser`]); an existing edge for the same ordered
    /// pair fails with [`StoreError::Duplicate`].
    fn insert_edge(&self, edge: &FollowEdge) -> Result<(), StoreError>;
    fn edge(&self, follower_id: UserId, followee_id: UserId) -> Result<Option<FollowEdge>, StoreError>;
    fn delete_edge(&self, follower_id: UserId, followee_id: UserId) -> Result<bool, StoreError>;
    /// Ids followed by `follower_id`, ascending.
    fn followee_ids(&self, follower_id: UserId) -> Result<Vec<UserId>, StoreError>;
    /// Ids following `followee_id`, ascending.
    fn follower_ids(&self, followee_id: UserId) -> Result<Vec<UserId>, StoreError>;

    fn edge_exists(&self, follower_id: UserId, followee_id: UserId) -> Result<bool, StoreError> {
        Ok(self.edge(follower_id, followee_id)?.is_some())
    }
}
