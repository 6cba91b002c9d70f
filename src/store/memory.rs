use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::{backend, Repository, StoreError, UniqueField};
use crate::models::models::{FollowEdge, NewPost, NewUser, Post, PostId, User, UserId};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    nicknames: HashMap<String, UserId>,
    emails: HashMap<String, UserId>,
    posts: BTreeMap<PostId, Post>,
    edges: HashMap<(UserId, UserId), FollowEdge>,
    followings: HashMap<UserId, BTreeSet<UserId>>,
    followers: HashMap<UserId, BTreeSet<UserId>>,
    next_user_id: UserId,
    next_post_id: PostId,
}

impl Tables {
    fn check_unique(&self, nickname: &str, email: &str, except: Option<UserId>) -> Result<(), StoreError> {
        let taken = |index: &HashMap<String, UserId>, value: &str| {
            index
                .get(&value.to_lowercase())
                .is_some_and(|owner| Some(*owner) != except)
        };
        if taken(&self.nicknames, nickname) {
            return Err(StoreError::Duplicate(UniqueField::Nickname));
        }
        if taken(&self.emails, email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        Ok(())
    }

    fn remove_edge(&mut self, follower_id: UserId, followee_id: UserId) -> bool {
        if self.edges.remove(&(follower_id, followee_id)).is_none() {
            return false;
        }
        if let Some(set) = self.followings.get_mut(&follower_id) {
            set.remove(&followee_id);
        }
        if let Some(set) = self.followers.get_mut(&followee_id) {
            set.remove(&follower_id);
        }
        true
    }
}

/// Process-local repository. Every operation runs under one lock, which
/// makes each of them atomic.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(backend)
    }
}

impl Repository for MemoryRepository {
    fn insert_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut tables = self.lock()?;
        tables.check_unique(&new.nickname, &new.email, None)?;

        tables.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: tables.next_user_id,
            name: new.name,
            nickname: new.nickname,
            email: new.email,
            password_hash: new.password_hash,
            avatar_path: None,
            created_at: now,
            updated_at: now,
        };
        tables.nicknames.insert(user.nickname.to_lowercase(), user.id);
        tables.emails.insert(user.email.to_lowercase(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .emails
            .get(&email.to_lowercase())
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        let tables = self.lock()?;
        let wanted: BTreeSet<UserId> = ids.iter().copied().collect();
        Ok(wanted
            .iter()
            .filter_map(|id| tables.users.get(id))
            .cloned()
            .collect())
    }

    fn users_page(&self, offset: usize, limit: usize) -> Result<Vec<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count_users(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.users.len())
    }

    fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let previous = tables
            .users
            .get(&user.id)
            .cloned()
            .ok_or(StoreError::MissingUser(user.id))?;
        tables.check_unique(&user.nickname, &user.email, Some(user.id))?;

        tables.nicknames.remove(&previous.nickname.to_lowercase());
        tables.emails.remove(&previous.email.to_lowercase());
        tables.nicknames.insert(user.nickname.to_lowercase(), user.id);
        tables.emails.insert(user.email.to_lowercase(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let mut tables = self.lock()?;
        let Some(user) = tables.users.remove(&id) else {
            return Ok(false);
        };
        tables.nicknames.remove(&user.nickname.to_lowercase());
        tables.emails.remove(&user.email.to_lowercase());
        tables.posts.retain(|_, post| post.owner_id != id);

        let followees: Vec<UserId> = tables.followings.remove(&id).unwrap_or_default().into_iter().collect();
        for followee_id in followees {
            tables.edges.remove(&(id, followee_id));
            if let Some(set) = tables.followers.get_mut(&followee_id) {
                set.remove(&id);
            }
        }
        let followers: Vec<UserId> = tables.followers.remove(&id).unwrap_or_default().into_iter().collect();
        for follower_id in followers {
            tables.edges.remove(&(follower_id, id));
            if let Some(set) = tables.followings.get_mut(&follower_id) {
                set.remove(&id);
            }
        }
        Ok(true)
    }

    fn insert_post(&self, new: NewPost) -> Result<Post, StoreError> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&new.owner_id) {
            return Err(StoreError::MissingUser(new.owner_id));
        }
        tables.next_post_id += 1;
        let post = Post {
            id: tables.next_post_id,
            owner_id: new.owner_id,
            title: new.title,
            body: new.body,
            created_at: Utc::now(),
            updated_at: None,
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    fn post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.lock()?.posts.get(&id).cloned())
    }

    fn update_post(&self, post: &Post) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        match tables.posts.get_mut(&post.id) {
            Some(stored) => {
                *stored = post.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("post {} vanished during update", post.id))),
        }
    }

    fn delete_post(&self, id: PostId) -> Result<bool, StoreError> {
        Ok(self.lock()?.posts.remove(&id).is_some())
    }

    fn posts_by_owner(&self, owner_id: UserId) -> Result<Vec<Post>, StoreError> {
        Ok(self
            .lock()?
            .posts
            .values()
            .rev()
            .filter(|post| post.owner_id == owner_id)
            .cloned()
            .collect())
    }

    fn insert_edge(&self, edge: &FollowEdge) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        for id in [edge.follower_id, edge.followee_id] {
            if !tables.users.contains_key(&id) {
                return Err(StoreError::MissingUser(id));
            }
        }
        let key = (edge.follower_id, edge.followee_id);
        if tables.edges.contains_key(&key) {
            return Err(StoreError::Duplicate(UniqueField::FollowEdge));
        }
        tables.edges.insert(key, edge.clone());
        tables
            .followings
            .entry(edge.follower_id)
            .or_default()
            .insert(edge.followee_id);
        tables
            .followers
            .entry(edge.followee_id)
            .or_default()
            .insert(edge.follower_id);
        Ok(())
    }

    fn edge(&self, follower_id: UserId, followee_id: UserId) -> Result<Option<FollowEdge>, StoreError> {
        Ok(self.lock()?.edges.get(&(follower_id, followee_id)).cloned())
    }

    fn delete_edge(&self, follower_id: UserId, followee_id: UserId) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove_edge(follower_id, followee_id))
    }

    fn followee_ids(&self, follower_id: UserId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .lock()?
            .followings
            .get(&follower_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn follower_ids(&self, followee_id: UserId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .lock()?
            .followers
            .get(&followee_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_user(nickname: &str) -> NewUser {
        NewUser {
            name: nickname.to_string(),
            nickname: nickname.to_string(),
            email: format!("{}@x.com", nickname),
            password_hash: "hash".to_string(),
        }
    }

    fn edge(follower_id: UserId, followee_id: UserId) -> FollowEdge {
        FollowEdge {
            follower_id,
            followee_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn enforces_unique_nickname_and_email() {
        let repo = MemoryRepository::new();
        repo.insert_user(new_user("alice")).unwrap();

        let mut same_nick = new_user("Alice");
        same_nick.email = "other@x.com".to_string();
        assert_eq!(
            repo.insert_user(same_nick).unwrap_err(),
            StoreError::Duplicate(UniqueField::Nickname)
        );

        let mut same_email = new_user("other");
        same_email.email = "ALICE@x.com".to_string();
        assert_eq!(
            repo.insert_user(same_email).unwrap_err(),
            StoreError::Duplicate(UniqueField::Email)
        );
        assert_eq!(repo.count_users().unwrap(), 1);
    }

    #[test]
    fn update_user_moves_unique_indexes() {
        let repo = MemoryRepository::new();
        let mut alice = repo.insert_user(new_user("alice")).unwrap();
        let bob = repo.insert_user(new_user("bob")).unwrap();

        alice.nickname = "bob".to_string();
        assert_eq!(
            repo.update_user(&alice).unwrap_err(),
            StoreError::Duplicate(UniqueField::Nickname)
        );

        alice.nickname = "alicia".to_string();
        repo.update_user(&alice).unwrap();
        // the old nickname is free again
        let mut carol = new_user("alice");
        carol.email = "carol@x.com".to_string();
        assert!(repo.insert_user(carol).is_ok());
        assert_eq!(repo.user(bob.id).unwrap().unwrap().nickname, "bob");
    }

    #[test]
    fn edges_are_unique_and_need_both_users() {
        let repo = MemoryRepository::new();
        let a = repo.insert_user(new_user("a")).unwrap();
        let b = repo.insert_user(new_user("b")).unwrap();

        repo.insert_edge(&edge(a.id, b.id)).unwrap();
        assert_eq!(
            repo.insert_edge(&edge(a.id, b.id)).unwrap_err(),
            StoreError::Duplicate(UniqueField::FollowEdge)
        );
        assert_eq!(
            repo.insert_edge(&edge(a.id, 999)).unwrap_err(),
            StoreError::MissingUser(999)
        );
        assert!(repo.edge(a.id, 999).unwrap().is_none());
        assert_eq!(repo.followee_ids(a.id).unwrap(), vec![b.id]);
        assert_eq!(repo.follower_ids(b.id).unwrap(), vec![a.id]);
    }

    #[test]
    fn concurrent_inserts_store_one_edge() {
        let repo = Arc::new(MemoryRepository::new());
        let a = repo.insert_user(new_user("a")).unwrap();
        let b = repo.insert_user(new_user("b")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                std::thread::spawn(move || repo.insert_edge(&edge(a.id, b.id)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == StoreError::Duplicate(UniqueField::FollowEdge)));
        assert_eq!(repo.followee_ids(a.id).unwrap().len(), 1);
    }

    #[test]
    fn delete_user_cascades() {
        let repo = MemoryRepository::new();
        let a = repo.insert_user(new_user("a")).unwrap();
        let b = repo.insert_user(new_user("b")).unwrap();
        let c = repo.insert_user(new_user("c")).unwrap();
        repo.insert_edge(&edge(a.id, b.id)).unwrap();
        repo.insert_edge(&edge(b.id, a.id)).unwrap();
        repo.insert_edge(&edge(c.id, b.id)).unwrap();
        let post = repo
            .insert_post(NewPost {
                owner_id: b.id,
                title: "t".to_string(),
                body: "b".to_string(),
            })
            .unwrap();

        assert!(repo.delete_user(b.id).unwrap());
        assert!(!repo.delete_user(b.id).unwrap());

        assert!(repo.post(post.id).unwrap().is_none());
        assert!(repo.edge(a.id, b.id).unwrap().is_none());
        assert!(repo.edge(b.id, a.id).unwrap().is_none());
        assert!(repo.followee_ids(a.id).unwrap().is_empty());
        assert!(repo.follower_ids(a.id).unwrap().is_empty());
        assert!(repo.followee_ids(c.id).unwrap().is_empty());
        assert!(repo.user_by_email("b@x.com").unwrap().is_none());
    }

    #[test]
    fn posts_by_owner_newest_first() {
        let repo = MemoryRepository::new();
        let a = repo.insert_user(new_user("a")).unwrap();
        let b = repo.insert_user(new_user("b")).unwrap();
        for (owner, title) in [(a.id, "one"), (b.id, "other"), (a.id, "two")] {
            repo.insert_post(NewPost {
                owner_id: owner,
                title: title.to_string(),
                body: "body".to_string(),
            })
            .unwrap();
        }
        let titles: Vec<String> = repo
            .posts_by_owner(a.id)
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["two", "one"]);
    }
}
