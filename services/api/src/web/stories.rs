//! services/api/src/web/stories.rs
//!
//! Handlers for browsing, reading and submitting stories.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use chrono::Utc;
use folktale_core::domain::{FilterUpdate, NewStory, StoryFilter, StoryId, StoryOrder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::IntoParams;

use crate::adapters::storage::cover_object_path;
use crate::web::rest::{port_failure, StoryPageResponse, StoryResponse};
use crate::web::state::AppState;

//=========================================================================================
// Query Parameters
//=========================================================================================

/// Filters for the story feed. All present filters must match.
#[derive(Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StoryListQuery {
    /// Case-insensitive substring of the region.
    pub region: Option<String>,
    /// Case-insensitive substring of the category.
    pub category: Option<String>,
    /// Case-insensitive substring of the title or the text.
    pub q: Option<String>,
    /// A tag the story must carry, ignoring case.
    pub tag: Option<String>,
    /// `newest` (default), `oldest` or `title`.
    pub sort: Option<String>,
    /// Zero-based page number.
    pub page: Option<usize>,
}

impl StoryListQuery {
    fn filter(&self) -> StoryFilter {
        let mut filter = StoryFilter::default();
        filter.apply(FilterUpdate {
            region: Some(self.region.clone()),
            category: Some(self.category.clone()),
            search: Some(self.q.clone()),
            tag: Some(self.tag.clone()),
        });
        filter
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List one page of stories, newest first unless another sort is requested.
#[utoipa::path(
    get,
    path = "/stories",
    params(StoryListQuery),
    responses(
        (status = 200, description = "A page of matching stories", body = StoryPageResponse),
        (status = 400, description = "Unknown sort or page out of range"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_stories_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StoryListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let order = match params.sort.as_deref() {
        None => StoryOrder::Newest,
        Some(raw) => StoryOrder::parse(raw).ok_or_else(|| {
            (StatusCode::BAD_REQUEST, format!("Unknown sort '{}'", raw))
        })?,
    };
    let page = params.page.unwrap_or(0);
    let page_size = state.config.page_size;
    let offset = page
        .checked_mul(page_size)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "Page out of range".to_string()))?;

    let stories = state
        .stories
        .query(&params.filter(), order, offset, page_size)
        .await
        .map_err(|e| port_failure("Could not load stories", e))?;

    let has_more = stories.len() == page_size;
    Ok(Json(StoryPageResponse {
        stories: stories.into_iter().map(StoryResponse::from).collect(),
        page,
        page_size,
        has_more,
    }))
}

/// Pick a random story.
#[utoipa::path(
    get,
    path = "/stories/random",
    responses(
        (status = 200, description = "A random story", body = StoryResponse),
        (status = 404, description = "There are no stories yet")
    )
)]
pub async fn random_story_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let story = state
        .stories
        .random()
        .await
        .map_err(|e| port_failure("Could not pick a story", e))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No stories yet".to_string()))?;
    Ok(Json(StoryResponse::from(story)))
}

/// Fetch a story by id.
#[utoipa::path(
    get,
    path = "/stories/{id}",
    params(("id" = i64, Path, description = "The story id")),
    responses(
        (status = 200, description = "The story", body = StoryResponse),
        (status = 404, description = "No such story")
    )
)]
pub async fn get_story_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<StoryId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let story = state
        .stories
        .get_by_id(id)
        .await
        .map_err(|e| port_failure("Could not load story", e))?;
    Ok(Json(StoryResponse::from(story)))
}

/// Fetch a story by slug.
#[utoipa::path(
    get,
    path = "/stories/slug/{slug}",
    params(("slug" = String, Path, description = "The story slug")),
    responses(
        (status = 200, description = "The story", body = StoryResponse),
        (status = 404, description = "No such story")
    )
)]
pub async fn get_story_by_slug_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let story = state
        .stories
        .get_by_slug(&slug)
        .await
        .map_err(|e| port_failure("Could not load story", e))?;
    Ok(Json(StoryResponse::from(story)))
}

/// Submit a new story.
///
/// Accepts multipart/form-data with text fields `title`, `text`, `region`,
/// `category`, `author`, `language`, `source`, `source_url`, comma-separated
/// `tags` and an optional `cover_image` file part.
#[utoipa::path(
    post,
    path = "/stories",
    request_body(content_type = "multipart/form-data", description = "The story fields and an optional cover image."),
    responses(
        (status = 201, description = "Story created", body = StoryResponse),
        (status = 400, description = "Missing title or text, or a malformed form"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn submit_story_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut submission = NewStory::default();
    let mut cover: Option<(String, Bytes)> = None;

    let malformed = |e: axum::extract::multipart::MultipartError| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "cover_image" => {
                let file_name = field.file_name().unwrap_or("cover").to_string();
                let data = field.bytes().await.map_err(malformed)?;
                if !data.is_empty() {
                    cover = Some((file_name, data));
                }
            }
            "title" => submission.title = field.text().await.map_err(malformed)?,
            "text" => submission.text = field.text().await.map_err(malformed)?,
            "region" => submission.region = Some(field.text().await.map_err(malformed)?),
            "category" => submission.category = Some(field.text().await.map_err(malformed)?),
            "author" => submission.author = Some(field.text().await.map_err(malformed)?),
            "language" => submission.language = Some(field.text().await.map_err(malformed)?),
            "source" => submission.source = Some(field.text().await.map_err(malformed)?),
            "source_url" => submission.source_url = Some(field.text().await.map_err(malformed)?),
            "tags" => submission.tags.extend(
                field
                    .text()
                    .await
                    .map_err(malformed)?
                    .split(',')
                    .map(str::to_string),
            ),
            _ => {}
        }
    }

    // Validate before uploading so a rejected submission leaves no orphaned cover.
    let mut submission = submission
        .normalized()
        .map_err(|message| (StatusCode::BAD_REQUEST, message))?;

    if let Some((file_name, data)) = cover {
        let path = cover_object_path(&file_name, Utc::now().timestamp_millis());
        let url = state.storage.upload(&path, data).await.map_err(|e| {
            error!("Failed to upload cover image: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to upload cover image".to_string(),
            )
        })?;
        submission.cover_image = Some(url);
    }

    let story = state
        .stories
        .insert(submission)
        .await
        .map_err(|e| port_failure("Failed to submit story", e))?;

    info!("Story {} submitted", story.id);
    Ok((StatusCode::CREATED, Json(StoryResponse::from(story))))
}
