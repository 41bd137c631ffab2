//! services/api/src/web/favorites.rs
//!
//! Handlers for the signed-in user's favorite stories. All routes here sit
//! behind the `require_auth` middleware.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use folktale_core::domain::{StoryId, User};
use folktale_core::ports::PortError;
use std::sync::Arc;
use tracing::info;

use crate::web::rest::{port_failure, StoryResponse};
use crate::web::state::AppState;

/// List the signed-in user's favorite stories, newest first.
#[utoipa::path(
    get,
    path = "/favorites",
    responses(
        (status = 200, description = "Favorite stories", body = [StoryResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_favorites_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ids: Vec<StoryId> = state
        .favorites
        .list_by_user(user.user_id)
        .await
        .map_err(|e| port_failure("Could not load favorites", e))?
        .into_iter()
        .collect();

    let stories = state
        .stories
        .get_many(&ids)
        .await
        .map_err(|e| port_failure("Could not load favorites", e))?;

    Ok(Json(
        stories
            .into_iter()
            .map(StoryResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// List the ids of the signed-in user's favorite stories.
#[utoipa::path(
    get,
    path = "/favorites/ids",
    responses(
        (status = 200, description = "Favorite story ids, ascending", body = [i64]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_favorite_ids_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut ids: Vec<StoryId> = state
        .favorites
        .list_by_user(user.user_id)
        .await
        .map_err(|e| port_failure("Could not load favorites", e))?
        .into_iter()
        .collect();
    ids.sort_unstable();
    Ok(Json(ids))
}

/// Mark a story as favorite. Adding an existing favorite succeeds.
#[utoipa::path(
    put,
    path = "/favorites/{story_id}",
    params(("story_id" = i64, Path, description = "The story id")),
    responses(
        (status = 204, description = "The story is a favorite"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such story")
    )
)]
pub async fn add_favorite_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(story_id): Path<StoryId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .stories
        .get_by_id(story_id)
        .await
        .map_err(|e| port_failure("Could not update favorites", e))?;

    match state.favorites.add(user.user_id, story_id).await {
        Ok(()) | Err(PortError::Conflict(_)) => {}
        Err(e) => return Err(port_failure("Could not update favorites", e)),
    }

    info!("User {} favorited story {}", user.user_id, story_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a story from favorites. Removing a non-favorite succeeds.
#[utoipa::path(
    delete,
    path = "/favorites/{story_id}",
    params(("story_id" = i64, Path, description = "The story id")),
    responses(
        (status = 204, description = "The story is not a favorite"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn remove_favorite_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(story_id): Path<StoryId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .favorites
        .remove(user.user_id, story_id)
        .await
        .map_err(|e| port_failure("Could not update favorites", e))?;

    info!("User {} unfavorited story {}", user.user_id, story_id);
    Ok(StatusCode::NO_CONTENT)
}
