//! crates/folktale_core/src/feed.rs
//!
//! The story feed controller. It owns the filter state, debounces filter
//! changes into reloads, pages through the story store and keeps the signed-in
//! user's favorites with an optimistic toggle.
//!
//! Every fetch is tagged with the generation counter current when it was
//! issued. A response is applied only if no reload or filter change has bumped
//! the counter since, so a slow stale reply can never overwrite newer results.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{FilterUpdate, Story, StoryFilter, StoryId, StoryOrder};
use crate::ports::{FavoritesStore, PortError, PortResult, SessionProvider, StoryStore};

pub const DEFAULT_PAGE_SIZE: usize = 6;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Shown to users when a page fails to load. Details only go to the log.
pub const LOAD_FAILED_MESSAGE: &str = "Could not load stories.";

//=========================================================================================
// Configuration and Observable State
//=========================================================================================

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub page_size: usize,
    pub debounce: Duration,
    pub order: StoryOrder,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            debounce: DEFAULT_DEBOUNCE,
            order: StoryOrder::Newest,
        }
    }
}

/// What the presentation layer should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Nothing has been requested yet.
    Idle,
    Loading,
    Ready,
    /// The last reload succeeded with no matching stories.
    Empty,
    /// The last reload failed.
    Failed,
}

/// How a fetch request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer request superseded this one; its response was dropped.
    Stale,
    /// Preconditions did not hold, nothing was fetched.
    Skipped,
}

/// A point-in-time copy of the feed state.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub filter: StoryFilter,
    pub stories: Vec<Story>,
    pub current_page: usize,
    pub has_more: bool,
    pub is_loading: bool,
    pub status: FeedStatus,
    pub error: Option<String>,
    pub favorites: HashSet<StoryId>,
}

impl FeedSnapshot {
    pub fn story_ids(&self) -> Vec<StoryId> {
        self.stories.iter().map(|s| s.id).collect()
    }

    pub fn is_favorite(&self, story_id: StoryId) -> bool {
        self.favorites.contains(&story_id)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingToggle {
    user_id: Uuid,
    favorite: bool,
}

struct FeedState {
    filter: StoryFilter,
    stories: Vec<Story>,
    current_page: usize,
    has_more: bool,
    is_loading: bool,
    status: FeedStatus,
    error: Option<String>,
    favorites: HashSet<StoryId>,
    /// Optimistic membership of each story whose toggle awaits the store.
    toggles_in_flight: HashMap<StoryId, PendingToggle>,
    generation: u64,
    favorites_epoch: u64,
}

impl FeedState {
    fn new() -> Self {
        Self {
            filter: StoryFilter::default(),
            stories: Vec::new(),
            current_page: 0,
            has_more: false,
            is_loading: false,
            status: FeedStatus::Idle,
            error: None,
            favorites: HashSet::new(),
            toggles_in_flight: HashMap::new(),
            generation: 0,
            favorites_epoch: 0,
        }
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            filter: self.filter.clone(),
            stories: self.stories.clone(),
            current_page: self.current_page,
            has_more: self.has_more,
            is_loading: self.is_loading,
            status: self.status,
            error: self.error.clone(),
            favorites: self.favorites.clone(),
        }
    }

    /// Replaces the favorite set, keeping the optimistic membership of
    /// stories whose toggle for `user_id` has not resolved yet.
    fn replace_favorites(&mut self, favorites: HashSet<StoryId>, user_id: Option<Uuid>) {
        self.favorites = favorites;
        for (story_id, pending) in &self.toggles_in_flight {
            if Some(pending.user_id) != user_id {
                continue;
            }
            if pending.favorite {
                self.favorites.insert(*story_id);
            } else {
                self.favorites.remove(story_id);
            }
        }
    }

    fn append_unique(&mut self, page: Vec<Story>) {
        let mut seen: HashSet<StoryId> = self.stories.iter().map(|s| s.id).collect();
        self.stories
            .extend(page.into_iter().filter(|s| seen.insert(s.id)));
    }
}

//=========================================================================================
// The Controller
//=========================================================================================

struct FeedInner {
    stories: Arc<dyn StoryStore>,
    favorites: Arc<dyn FavoritesStore>,
    session: Arc<dyn SessionProvider>,
    config: FeedConfig,
    state: Mutex<FeedState>,
    pending_reload: Mutex<Option<JoinHandle<()>>>,
    updates: watch::Sender<FeedSnapshot>,
}

/// Cheap to clone; clones share the same feed.
#[derive(Clone)]
pub struct StoryFeedController {
    inner: Arc<FeedInner>,
}

impl StoryFeedController {
    pub fn new(
        stories: Arc<dyn StoryStore>,
        favorites: Arc<dyn FavoritesStore>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self::build(stories, favorites, session, FeedConfig::default())
    }

    /// Fails with `Invalid` if the page size is zero.
    pub fn with_config(
        stories: Arc<dyn StoryStore>,
        favorites: Arc<dyn FavoritesStore>,
        session: Arc<dyn SessionProvider>,
        config: FeedConfig,
    ) -> PortResult<Self> {
        if config.page_size == 0 {
            return Err(PortError::Invalid("page size must be at least 1".to_string()));
        }
        Ok(Self::build(stories, favorites, session, config))
    }

    fn build(
        stories: Arc<dyn StoryStore>,
        favorites: Arc<dyn FavoritesStore>,
        session: Arc<dyn SessionProvider>,
        config: FeedConfig,
    ) -> Self {
        let state = FeedState::new();
        let (updates, _rx) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(FeedInner {
                stories,
                favorites,
                session,
                config,
                state: Mutex::new(state),
                pending_reload: Mutex::new(None),
                updates,
            }),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.inner.config
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.state().snapshot()
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.inner.updates.subscribe()
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &FeedState) {
        self.inner.updates.send_replace(state.snapshot());
    }

    fn replace_pending(&self, handle: Option<JoinHandle<()>>) {
        let mut pending = self
            .inner
            .pending_reload
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *pending, handle) {
            previous.abort();
        }
    }

    // --- Filtering ---

    /// Merges a partial filter change and schedules a reload once the filter
    /// has been quiet for the debounce window. Any earlier pending reload is
    /// cancelled and any in-flight response is invalidated.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_filter(&self, update: FilterUpdate) {
        let token = {
            let mut state = self.state();
            state.filter.apply(update);
            state.generation += 1;
            state.is_loading = true;
            state.status = FeedStatus::Loading;
            state.error = None;
            self.publish(&state);
            state.generation
        };

        let controller = self.clone();
        let debounce = self.inner.config.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Err(e) = controller.reload_if_current(token).await {
                debug!("Debounced reload ended with error: {}", e);
            }
        });
        self.replace_pending(Some(handle));
    }

    /// Merges a partial filter change and reloads right away, skipping the debounce.
    pub async fn apply_filter_now(&self, update: FilterUpdate) -> PortResult<FetchOutcome> {
        self.replace_pending(None);
        self.state().filter.apply(update);
        self.reload().await
    }

    async fn reload_if_current(&self, token: u64) -> PortResult<FetchOutcome> {
        if self.state().generation != token {
            return Ok(FetchOutcome::Stale);
        }
        self.reload().await
    }

    // --- Paging ---

    /// Clears the feed and fetches page 0 for the current filter.
    pub async fn reload(&self) -> PortResult<FetchOutcome> {
        let (token, filter) = {
            let mut state = self.state();
            state.generation += 1;
            state.current_page = 0;
            state.stories.clear();
            state.has_more = false;
            state.is_loading = true;
            state.status = FeedStatus::Loading;
            state.error = None;
            self.publish(&state);
            (state.generation, state.filter.clone())
        };

        let page_size = self.inner.config.page_size;
        let result = self
            .inner
            .stories
            .query(&filter, self.inner.config.order, 0, page_size)
            .await;

        let mut state = self.state();
        if state.generation != token {
            debug!(token, current = state.generation, "Discarding stale story page");
            return Ok(FetchOutcome::Stale);
        }
        state.is_loading = false;
        let outcome = match result {
            Ok(page) => {
                state.has_more = page.len() == page_size;
                state.append_unique(page);
                state.status = if state.stories.is_empty() {
                    FeedStatus::Empty
                } else {
                    FeedStatus::Ready
                };
                Ok(FetchOutcome::Applied)
            }
            Err(e) => {
                error!("Failed to load stories: {}", e);
                state.has_more = false;
                state.status = FeedStatus::Failed;
                state.error = Some(LOAD_FAILED_MESSAGE.to_string());
                Err(e)
            }
        };
        self.publish(&state);
        outcome
    }

    /// Fetches and appends the next page. A no-op while loading or when the
    /// last page came back short.
    pub async fn load_more(&self) -> PortResult<FetchOutcome> {
        let (token, filter, next_page) = {
            let mut state = self.state();
            if !state.has_more || state.is_loading {
                return Ok(FetchOutcome::Skipped);
            }
            state.is_loading = true;
            state.error = None;
            self.publish(&state);
            (state.generation, state.filter.clone(), state.current_page + 1)
        };

        let page_size = self.inner.config.page_size;
        let result = self
            .inner
            .stories
            .query(&filter, self.inner.config.order, next_page * page_size, page_size)
            .await;

        let mut state = self.state();
        if state.generation != token {
            debug!(token, current = state.generation, "Discarding stale story page");
            return Ok(FetchOutcome::Stale);
        }
        state.is_loading = false;
        let outcome = match result {
            Ok(page) => {
                state.has_more = page.len() == page_size;
                state.append_unique(page);
                state.current_page = next_page;
                state.status = if state.stories.is_empty() {
                    FeedStatus::Empty
                } else {
                    FeedStatus::Ready
                };
                Ok(FetchOutcome::Applied)
            }
            Err(e) => {
                error!("Failed to load page {}: {}", next_page, e);
                state.error = Some(LOAD_FAILED_MESSAGE.to_string());
                Err(e)
            }
        };
        self.publish(&state);
        outcome
    }

    // --- Favorites ---

    /// Replaces the favorite set with the signed-in user's favorites, or
    /// clears it when nobody is signed in.
    pub async fn refresh_favorites(&self) -> PortResult<()> {
        let user = self.inner.session.current_user();
        let epoch = {
            let mut state = self.state();
            state.favorites_epoch += 1;
            state.favorites_epoch
        };

        let result = match &user {
            Some(user) => self.inner.favorites.list_by_user(user.user_id).await,
            None => Ok(HashSet::new()),
        };

        let signed_in_now = self.inner.session.current_user().map(|u| u.user_id);
        let mut state = self.state();
        if state.favorites_epoch != epoch || signed_in_now != user.as_ref().map(|u| u.user_id) {
            debug!("Discarding stale favorites refresh");
            return Ok(());
        }
        let outcome = match result {
            Ok(favorites) => {
                state.replace_favorites(favorites, signed_in_now);
                Ok(())
            }
            Err(e) => {
                error!("Failed to load favorites: {}", e);
                state.replace_favorites(HashSet::new(), signed_in_now);
                Err(e)
            }
        };
        self.publish(&state);
        outcome
    }

    /// Spawns a task that refreshes favorites on every sign-in or sign-out.
    pub fn watch_session(&self) -> JoinHandle<()> {
        let controller = self.clone();
        let mut changes = self.inner.session.subscribe();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                if let Err(e) = controller.refresh_favorites().await {
                    warn!("Favorites refresh after session change failed: {}", e);
                }
            }
        })
    }

    /// Flips the favorite state of a story and returns the new membership.
    ///
    /// The local set changes before the store call and is reverted if the
    /// call fails. While a toggle of the same story is in flight, further
    /// toggles return the current membership without touching the store,
    /// and favorites refreshes keep its optimistic membership.
    pub async fn toggle_favorite(&self, story_id: StoryId) -> PortResult<bool> {
        let user = self
            .inner
            .session
            .current_user()
            .ok_or(PortError::Unauthenticated)?;

        let now_favorite = {
            let mut state = self.state();
            if state.toggles_in_flight.contains_key(&story_id) {
                debug!(story_id, "Favorite toggle already in flight");
                return Ok(state.favorites.contains(&story_id));
            }
            let now_favorite = !state.favorites.remove(&story_id);
            if now_favorite {
                state.favorites.insert(story_id);
            }
            state.toggles_in_flight.insert(
                story_id,
                PendingToggle {
                    user_id: user.user_id,
                    favorite: now_favorite,
                },
            );
            self.publish(&state);
            now_favorite
        };

        let result = if now_favorite {
            match self.inner.favorites.add(user.user_id, story_id).await {
                Err(PortError::Conflict(_)) => Ok(()),
                other => other,
            }
        } else {
            self.inner.favorites.remove(user.user_id, story_id).await
        };

        let same_user = self.inner.session.current_user().map(|u| u.user_id) == Some(user.user_id);
        let mut state = self.state();
        state.toggles_in_flight.remove(&story_id);
        match result {
            Ok(()) => {
                info!(story_id, favorite = now_favorite, "Favorite updated");
                Ok(now_favorite)
            }
            Err(e) => {
                warn!("Failed to update favorite {}, rolling back: {}", story_id, e);
                if same_user {
                    if now_favorite {
                        state.favorites.remove(&story_id);
                    } else {
                        state.favorites.insert(story_id);
                    }
                    self.publish(&state);
                }
                Err(e)
            }
        }
    }
}
