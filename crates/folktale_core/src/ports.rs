//! crates/folktale_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core consumes.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted database, auth and file storage behind them.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::{
    AuthSession, NewStory, Story, StoryFilter, StoryId, StoryOrder, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote table of stories.
#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Returns at most `limit` stories matching every active filter, starting at `offset`.
    async fn query(
        &self,
        filter: &StoryFilter,
        order: StoryOrder,
        offset: usize,
        limit: usize,
    ) -> PortResult<Vec<Story>>;

    async fn get_by_id(&self, id: StoryId) -> PortResult<Story>;

    async fn get_by_slug(&self, slug: &str) -> PortResult<Story>;

    /// Fetches the given stories, newest first. Unknown ids are skipped.
    async fn get_many(&self, ids: &[StoryId]) -> PortResult<Vec<Story>>;

    async fn insert(&self, story: NewStory) -> PortResult<Story>;

    /// A uniformly random story, or `None` when the table is empty.
    async fn random(&self) -> PortResult<Option<Story>>;

    /// Distinct non-empty regions, sorted.
    async fn list_regions(&self) -> PortResult<Vec<String>>;
}

/// The remote table mapping users to their favorite stories.
#[async_trait]
pub trait FavoritesStore: Send + Sync {
    async fn list_by_user(&self, user_id: Uuid) -> PortResult<HashSet<StoryId>>;

    /// Fails with `Conflict` if the pair already exists.
    async fn add(&self, user_id: Uuid, story_id: StoryId) -> PortResult<()>;

    async fn remove(&self, user_id: Uuid, story_id: StoryId) -> PortResult<()>;
}

/// Email/password accounts and their login sessions.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()>;

    /// Resolves a live session to its user. Expired sessions are `Unauthenticated`.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<User>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// The current authenticated user, as seen by one client.
pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<User>;

    /// A receiver that is notified whenever the signed-in user changes.
    fn subscribe(&self) -> watch::Receiver<Option<User>>;
}

/// Blob storage for cover images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `path` and returns the public URL.
    async fn upload(&self, path: &str, bytes: Bytes) -> PortResult<String>;
}
