//! crates/folktale_core/src/memory.rs
//!
//! In-memory implementations of the storage ports. They follow the same query
//! contract as the database adapter and can be switched off to simulate an
//! unavailable backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::domain::{
    slugify, AuthSession, NewStory, Story, StoryFilter, StoryId, StoryOrder, User, UserCredentials,
};
use crate::ports::{AccountStore, FavoritesStore, PortError, PortResult, StoryStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct InMemoryStore {
    stories: Mutex<Vec<Story>>,
    next_id: AtomicI64,
    favorites: Mutex<HashSet<(Uuid, StoryId)>>,
    users: Mutex<HashMap<String, UserCredentials>>,
    auth_sessions: Mutex<HashMap<String, (Uuid, DateTime<Utc>)>>,
    unavailable: AtomicBool,
    query_log: Mutex<Vec<StoryFilter>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing stories. Ids keep counting after the largest one.
    pub fn with_stories(stories: Vec<Story>) -> Self {
        let store = Self::new();
        let max_id = stories.iter().map(|s| s.id).max().unwrap_or(0);
        store.next_id.store(max_id, Ordering::SeqCst);
        *lock(&store.stories) = stories;
        store
    }

    /// While unavailable every call fails with `PortError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Every filter `query` has been called with, oldest first.
    pub fn query_log(&self) -> Vec<StoryFilter> {
        lock(&self.query_log).clone()
    }

    pub fn contains_favorite(&self, user_id: Uuid, story_id: StoryId) -> bool {
        lock(&self.favorites).contains(&(user_id, story_id))
    }

    pub fn favorites_count(&self) -> usize {
        lock(&self.favorites).len()
    }

    fn check(&self) -> PortResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("in-memory store is switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoryStore for InMemoryStore {
    async fn query(
        &self,
        filter: &StoryFilter,
        order: StoryOrder,
        offset: usize,
        limit: usize,
    ) -> PortResult<Vec<Story>> {
        lock(&self.query_log).push(filter.clone());
        self.check()?;

        let mut matching: Vec<Story> = lock(&self.stories)
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| order.compare(a, b));
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_by_id(&self, id: StoryId) -> PortResult<Story> {
        self.check()?;
        lock(&self.stories)
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Story {} not found", id)))
    }

    async fn get_by_slug(&self, slug: &str) -> PortResult<Story> {
        self.check()?;
        lock(&self.stories)
            .iter()
            .find(|s| s.slug.as_deref() == Some(slug))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Story '{}' not found", slug)))
    }

    async fn get_many(&self, ids: &[StoryId]) -> PortResult<Vec<Story>> {
        self.check()?;
        let mut found: Vec<Story> = lock(&self.stories)
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect();
        found.sort_by(|a, b| StoryOrder::Newest.compare(a, b));
        Ok(found)
    }

    async fn insert(&self, story: NewStory) -> PortResult<Story> {
        self.check()?;
        let story = story.normalized().map_err(PortError::Invalid)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = Story {
            id,
            slug: Some(format!("{}-{}", slugify(&story.title), id)),
            title: story.title,
            text: story.text,
            region: story.region,
            category: story.category,
            cover_image: story.cover_image,
            author: story.author,
            language: story.language,
            source: story.source,
            source_url: story.source_url,
            tags: story.tags,
            created_at: Utc::now(),
        };
        lock(&self.stories).push(record.clone());
        Ok(record)
    }

    async fn random(&self) -> PortResult<Option<Story>> {
        self.check()?;
        let stories = lock(&self.stories);
        if stories.is_empty() {
            return Ok(None);
        }
        let index = (Uuid::new_v4().as_u128() % stories.len() as u128) as usize;
        Ok(stories.get(index).cloned())
    }

    async fn list_regions(&self) -> PortResult<Vec<String>> {
        self.check()?;
        let mut regions: Vec<String> = lock(&self.stories)
            .iter()
            .filter_map(|s| s.region.clone())
            .filter(|r| !r.trim().is_empty())
            .collect();
        regions.sort();
        regions.dedup();
        Ok(regions)
    }
}

#[async_trait]
impl FavoritesStore for InMemoryStore {
    async fn list_by_user(&self, user_id: Uuid) -> PortResult<HashSet<StoryId>> {
        self.check()?;
        Ok(lock(&self.favorites)
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, story_id)| *story_id)
            .collect())
    }

    async fn add(&self, user_id: Uuid, story_id: StoryId) -> PortResult<()> {
        self.check()?;
        if !lock(&self.favorites).insert((user_id, story_id)) {
            return Err(PortError::Conflict(format!(
                "Story {} is already a favorite",
                story_id
            )));
        }
        Ok(())
    }

    async fn remove(&self, user_id: Uuid, story_id: StoryId) -> PortResult<()> {
        self.check()?;
        lock(&self.favorites).remove(&(user_id, story_id));
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        self.check()?;
        let key = email.trim().to_lowercase();
        let mut users = lock(&self.users);
        if users.contains_key(&key) {
            return Err(PortError::Conflict(format!("Email {} is already registered", key)));
        }
        let credentials = UserCredentials {
            user_id: Uuid::new_v4(),
            email: key.clone(),
            hashed_password: hashed_password.to_string(),
        };
        let user = User {
            user_id: credentials.user_id,
            email: Some(key.clone()),
        };
        users.insert(key, credentials);
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.check()?;
        let key = email.trim().to_lowercase();
        lock(&self.users)
            .get(&key)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", key)))
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        self.check()?;
        lock(&self.auth_sessions).insert(session.id.clone(), (session.user_id, session.expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<User> {
        self.check()?;
        let (user_id, expires_at) = lock(&self.auth_sessions)
            .get(session_id)
            .copied()
            .ok_or(PortError::Unauthenticated)?;
        if expires_at <= Utc::now() {
            return Err(PortError::Unauthenticated);
        }
        let email = lock(&self.users)
            .values()
            .find(|c| c.user_id == user_id)
            .map(|c| c.email.clone());
        Ok(User { user_id, email })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.check()?;
        lock(&self.auth_sessions).remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn submission(title: &str, region: &str) -> NewStory {
        NewStory {
            title: title.to_string(),
            text: format!("{} text", title),
            region: Some(region.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_unique_slugs() {
        let store = InMemoryStore::new();
        let a = store.insert(submission("The Fox", "Asia")).await.unwrap();
        let b = store.insert(submission("The Fox", "Asia")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_ne!(a.slug, b.slug);
        assert_eq!(store.get_by_slug(b.slug.as_deref().unwrap()).await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn tagged_stories_are_found_by_tag() {
        let store = InMemoryStore::new();
        let mut tagged = submission("Anansi", "Africa");
        tagged.tags = vec!["Trickster".to_string(), " spider ".to_string()];
        store.insert(tagged).await.unwrap();
        store.insert(submission("Kaguya", "Asia")).await.unwrap();

        let filter = StoryFilter {
            tag: Some("SPIDER".to_string()),
            ..Default::default()
        };
        let found = store.query(&filter, StoryOrder::Newest, 0, 6).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tags, vec!["spider", "Trickster"]);
    }

    #[tokio::test]
    async fn insert_rejects_blank_text() {
        let store = InMemoryStore::new();
        let err = store
            .insert(NewStory {
                title: "Title".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Invalid(_)));
    }

    #[tokio::test]
    async fn duplicate_favorite_is_a_conflict() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.add(user, 1).await.unwrap();
        assert!(matches!(store.add(user, 1).await, Err(PortError::Conflict(_))));
        store.remove(user, 1).await.unwrap();
        assert!(store.list_by_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_auth_session_is_rejected() {
        let store = InMemoryStore::new();
        let user = store.create_user_with_email("A@b.io", "hash").await.unwrap();
        let session = AuthSession {
            id: "old".to_string(),
            user_id: user.user_id,
            expires_at: Utc::now() - Duration::minutes(1),
        };
        store.create_auth_session(&session).await.unwrap();
        assert_eq!(
            store.validate_auth_session("old").await,
            Err(PortError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn switched_off_store_is_unavailable() {
        let store = InMemoryStore::new();
        store.set_available(false);
        let result = store.query(&StoryFilter::default(), StoryOrder::Newest, 0, 6).await;
        assert!(matches!(result, Err(PortError::Unavailable(_))));
        assert_eq!(store.query_log().len(), 1);
    }

    #[tokio::test]
    async fn regions_are_distinct_and_sorted() {
        let store = InMemoryStore::new();
        for (title, region) in [("a", "Europe"), ("b", "Africa"), ("c", "Europe")] {
            store.insert(submission(title, region)).await.unwrap();
        }
        assert_eq!(store.list_regions().await.unwrap(), vec!["Africa", "Europe"]);
    }
}
