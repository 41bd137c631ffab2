//! services/api/src/web/catalog.rs
//!
//! Reference data for the filter panel and the region explorer map.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use folktale_core::catalog::{CATEGORIES, REGION_MARKERS, TAG_CLOUD};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::rest::port_failure;
use crate::web::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct RegionMarkerResponse {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryResponse {
    pub key: String,
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryResponse>,
    pub tags: Vec<String>,
}

/// Distinct regions that stories are tagged with.
#[utoipa::path(
    get,
    path = "/regions",
    responses(
        (status = 200, description = "Regions, sorted", body = [String]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_regions_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let regions = state
        .stories
        .list_regions()
        .await
        .map_err(|e| port_failure("Could not load regions", e))?;
    Ok(Json(regions))
}

/// Markers for the region explorer map.
#[utoipa::path(
    get,
    path = "/regions/map",
    responses((status = 200, description = "Map markers", body = [RegionMarkerResponse]))
)]
pub async fn region_map_handler() -> Json<Vec<RegionMarkerResponse>> {
    Json(
        REGION_MARKERS
            .iter()
            .map(|m| RegionMarkerResponse {
                name: m.name.to_string(),
                latitude: m.latitude,
                longitude: m.longitude,
            })
            .collect(),
    )
}

/// The category catalog and the tag cloud.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Categories and tags", body = CategoriesResponse))
)]
pub async fn categories_handler() -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: CATEGORIES
            .iter()
            .map(|(key, name)| CategoryResponse {
                key: key.to_string(),
                name: name.to_string(),
            })
            .collect(),
        tags: TAG_CLOUD.iter().map(|t| t.to_string()).collect(),
    })
}
