//! services/api/src/web/rest.rs
//!
//! Shared response payloads and error mapping for the REST handlers, and the
//! master definition for the OpenAPI specification.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use folktale_core::catalog::{category_display_name, cover_url, region_display_name};
use folktale_core::domain::Story;
use folktale_core::ports::PortError;
use serde::Serialize;
use tracing::{debug, error, warn};
use utoipa::{OpenApi, ToSchema};

use crate::web::{auth, catalog, favorites, stories};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        stories::list_stories_handler,
        stories::random_story_handler,
        stories::get_story_handler,
        stories::get_story_by_slug_handler,
        stories::submit_story_handler,
        favorites::list_favorites_handler,
        favorites::list_favorite_ids_handler,
        favorites::add_favorite_handler,
        favorites::remove_favorite_handler,
        catalog::list_regions_handler,
        catalog::region_map_handler,
        catalog::categories_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            StoryResponse,
            StoryPageResponse,
            catalog::RegionMarkerResponse,
            catalog::CategoryResponse,
            catalog::CategoriesResponse,
        )
    ),
    tags(
        (name = "Folktale API", description = "Browse, search, submit and favorite folktales.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// A story as shown to clients, with display values resolved.
#[derive(Serialize, ToSchema)]
pub struct StoryResponse {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub region: Option<String>,
    pub region_name: String,
    pub category: Option<String>,
    pub category_name: String,
    pub slug: Option<String>,
    pub cover_image: Option<String>,
    /// The uploaded cover, or the deterministic fallback for this story.
    pub cover_image_url: String,
    pub author: Option<String>,
    pub language: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Story> for StoryResponse {
    fn from(story: Story) -> Self {
        Self {
            region_name: region_display_name(story.region.as_deref()),
            category_name: category_display_name(story.category.as_deref()),
            cover_image_url: cover_url(story.id, story.cover_image.as_deref()),
            id: story.id,
            title: story.title,
            text: story.text,
            region: story.region,
            category: story.category,
            slug: story.slug,
            cover_image: story.cover_image,
            author: story.author,
            language: story.language,
            source: story.source,
            source_url: story.source_url,
            tags: story.tags,
            created_at: story.created_at,
        }
    }
}

/// One page of the story feed.
#[derive(Serialize, ToSchema)]
pub struct StoryPageResponse {
    pub stories: Vec<StoryResponse>,
    pub page: usize,
    pub page_size: usize,
    /// False once a page comes back shorter than `page_size`.
    pub has_more: bool,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a port failure to a status and a message safe to show to users.
/// Store details are logged, never returned.
pub fn port_failure(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(detail) => {
            debug!("{}: {}", context, detail);
            (StatusCode::NOT_FOUND, "Not found".to_string())
        }
        PortError::Unauthenticated => (
            StatusCode::UNAUTHORIZED,
            "Authentication required".to_string(),
        ),
        PortError::Conflict(detail) => {
            warn!("{}: {}", context, detail);
            (StatusCode::CONFLICT, "Already exists".to_string())
        }
        PortError::Invalid(message) => (StatusCode::BAD_REQUEST, message),
        PortError::Unavailable(detail) => {
            error!("{}: {}", context, detail);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}
