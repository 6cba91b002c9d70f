use serde::de::DeserializeOwned;
use serde::Serialize;
use spin_sdk::key_value::Store;

use chrono::Utc;

use super::{backend, Repository, StoreError, UniqueField};
use crate::config::*;
use crate::models::models::{FollowEdge, NewPost, NewUser, Post, PostId, User, UserId};

/// The key-value operations the repository is built on. Values are JSON.
pub trait KeyValue {
    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError>;
    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl KeyValue for Store {
    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.get_json(key).map_err(backend)
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.set_json(key, value).map_err(backend)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.delete(key).map_err(backend)
    }
}

/// Repository over a key-value store, the Spin one by default.
///
/// Layout: `user:{id}`, `post:{id}` and `follow:{a}:{b}` hold the rows;
/// `nickname:{n}` / `email:{e}` map unique values to a user id;
/// `users_list`, `posts_of:{owner}`, `followings:{a}` and `followers:{b}`
/// are the secondary indexes.
pub struct KvRepository<S = Store> {
    store: S,
}

impl KvRepository<Store> {
    pub fn open_default() -> Result<Self, StoreError> {
        Store::open_default().map(Self::new).map_err(backend)
    }
}

impl<S: KeyValue> KvRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.store.read(key)
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.store.write(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store.remove(key)
    }

    fn ids(&self, key: &str) -> Result<Vec<i64>, StoreError> {
        Ok(self.get::<Vec<i64>>(key)?.unwrap_or_default())
    }

    fn push_id(&self, key: &str, id: i64) -> Result<(), StoreError> {
        let mut ids = self.ids(key)?;
        if !ids.contains(&id) {
            ids.push(id);
            self.set(key, &ids)?;
        }
        Ok(())
    }

    fn remove_id(&self, key: &str, id: i64) -> Result<(), StoreError> {
        let mut ids = self.ids(key)?;
        let before = ids.len();
        ids.retain(|existing| *existing != id);
        if ids.len() != before {
            self.set(key, &ids)?;
        }
        Ok(())
    }

    fn next_id(&self, seq_key: &str) -> Result<i64, StoreError> {
        let next = self.get::<i64>(seq_key)?.unwrap_or_default() + 1;
        self.set(seq_key, &next)?;
        Ok(next)
    }

    fn owner_of(&self, key: &str) -> Result<Option<UserId>, StoreError> {
        self.get::<UserId>(key)
    }

    fn check_unique(&self, nickname: &str, email: &str, except: Option<UserId>) -> Result<(), StoreError> {
        let taken = |owner: Option<UserId>| owner.is_some_and(|owner| Some(owner) != except);
        if taken(self.owner_of(&nickname_key(nickname))?) {
            return Err(StoreError::Duplicate(UniqueField::Nickname));
        }
        if taken(self.owner_of(&email_key(email))?) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        Ok(())
    }
}

impl<S: KeyValue> Repository for KvRepository<S> {
    fn insert_user(&self, new: NewUser) -> Result<User, StoreError> {
        self.check_unique(&new.nickname, &new.email, None)?;

        let now = Utc::now();
        let user = User {
            id: self.next_id(USER_SEQ_KEY)?,
            name: new.name,
            nickname: new.nickname,
            email: new.email,
            password_hash: new.password_hash,
            avatar_path: None,
            created_at: now,
            updated_at: now,
        };
        self.set(&nickname_key(&user.nickname), &user.id)?;
        self.set(&email_key(&user.email), &user.id)?;
        self.set(&user_key(user.id), &user)?;
        self.push_id(USERS_LIST_KEY, user.id)?;
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.get(&user_key(id))
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        match self.owner_of(&email_key(email))? {
            Some(id) => self.user(id),
            None => Ok(None),
        }
    }

    fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.user(id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    fn users_page(&self, offset: usize, limit: usize) -> Result<Vec<User>, StoreError> {
        let mut ids = self.ids(USERS_LIST_KEY)?;
        ids.sort_unstable();
        let page: Vec<UserId> = ids.into_iter().skip(offset).take(limit).collect();
        self.users_by_ids(&page)
    }

    fn count_users(&self) -> Result<usize, StoreError> {
        Ok(self.ids(USERS_LIST_KEY)?.len())
    }

    fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let previous = self.user(user.id)?.ok_or(StoreError::MissingUser(user.id))?;
        self.check_unique(&user.nickname, &user.email, Some(user.id))?;

        if nickname_key(&previous.nickname) != nickname_key(&user.nickname) {
            self.delete(&nickname_key(&previous.nickname))?;
            self.set(&nickname_key(&user.nickname), &user.id)?;
        }
        if email_key(&previous.email) != email_key(&user.email) {
            self.delete(&email_key(&previous.email))?;
            self.set(&email_key(&user.email), &user.id)?;
        }
        self.set(&user_key(user.id), user)
    }

    fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let Some(user) = self.user(id)? else {
            return Ok(false);
        };

        for post_id in self.ids(&posts_of_key(id))? {
            self.delete(&post_key(post_id))?;
        }
        self.delete(&posts_of_key(id))?;

        for followee_id in self.ids(&followings_key(id))? {
            self.delete(&follow_key(id, followee_id))?;
            self.remove_id(&followers_key(followee_id), id)?;
        }
        for follower_id in self.ids(&followers_key(id))? {
            self.delete(&follow_key(follower_id, id))?;
            self.remove_id(&followings_key(follower_id), id)?;
        }
        self.delete(&followings_key(id))?;
        self.delete(&followers_key(id))?;

        self.delete(&nickname_key(&user.nickname))?;
        self.delete(&email_key(&user.email))?;
        self.delete(&user_key(id))?;
        self.remove_id(USERS_LIST_KEY, id)?;
        Ok(true)
    }

    fn insert_post(&self, new: NewPost) -> Result<Post, StoreError> {
        if self.user(new.owner_id)?.is_none() {
            return Err(StoreError::MissingUser(new.owner_id));
        }
        let post = Post {
            id: self.next_id(POST_SEQ_KEY)?,
            owner_id: new.owner_id,
            title: new.title,
            body: new.body,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.set(&post_key(post.id), &post)?;
        self.push_id(&posts_of_key(post.owner_id), post.id)?;
        Ok(post)
    }

    fn post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        self.get(&post_key(id))
    }

    fn update_post(&self, post: &Post) -> Result<(), StoreError> {
        if self.post(post.id)?.is_none() {
            return Err(StoreError::Backend(format!("post {} vanished during update", post.id)));
        }
        self.set(&post_key(post.id), post)
    }

    fn delete_post(&self, id: PostId) -> Result<bool, StoreError> {
        let Some(post) = self.post(id)? else {
            return Ok(false);
        };
        self.delete(&post_key(id))?;
        self.remove_id(&posts_of_key(post.owner_id), id)?;
        Ok(true)
    }

    fn posts_by_owner(&self, owner_id: UserId) -> Result<Vec<Post>, StoreError> {
        let mut posts = Vec::new();
        for id in self.ids(&posts_of_key(owner_id))?.into_iter().rev() {
            if let Some(post) = self.post(id)? {
                posts.push(post);
            }
        }
        Ok(posts)
    }

    fn insert_edge(&self, edge: &FollowEdge) -> Result<(), StoreError> {
        for id in [edge.follower_id, edge.followee_id] {
            if self.user(id)?.is_none() {
                return Err(StoreError::MissingUser(id));
            }
        }
        let key = follow_key(edge.follower_id, edge.followee_id);
        if self.get::<FollowEdge>(&key)?.is_some() {
            return Err(StoreError::Duplicate(UniqueField::FollowEdge));
        }
        self.set(&key, edge)?;
        self.push_id(&followings_key(edge.follower_id), edge.followee_id)?;
        self.push_id(&followers_key(edge.followee_id), edge.follower_id)
    }

    fn edge(&self, follower_id: UserId, followee_id: UserId) -> Result<Option<FollowEdge>, StoreError> {
        self.get(&follow_key(follower_id, followee_id))
    }

    fn delete_edge(&self, follower_id: UserId, followee_id: UserId) -> Result<bool, StoreError> {
        if self.edge(follower_id, followee_id)?.is_none() {
            return Ok(false);
        }
        self.delete(&follow_key(follower_id, followee_id))?;
        self.remove_id(&followings_key(follower_id), followee_id)?;
        self.remove_id(&followers_key(followee_id), follower_id)?;
        Ok(true)
    }

    fn followee_ids(&self, follower_id: UserId) -> Result<Vec<UserId>, StoreError> {
        let mut ids = self.ids(&followings_key(follower_id))?;
        ids.sort_unstable();
        Ok(ids)
    }

    fn follower_ids(&self, followee_id: UserId) -> Result<Vec<UserId>, StoreError> {
        let mut ids = self.ids(&followers_key(followee_id))?;
        ids.sort_unstable();
        Ok(ids)
    }
}
