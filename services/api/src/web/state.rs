//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use folktale_core::ports::{AccountStore, FavoritesStore, ObjectStorage, StoryStore};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub stories: Arc<dyn StoryStore>,
    pub favorites: Arc<dyn FavoritesStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub config: Arc<Config>,
}
