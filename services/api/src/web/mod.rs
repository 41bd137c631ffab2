pub mod auth;
pub mod catalog;
pub mod favorites;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod stories;

pub use middleware::require_auth;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::web::{
    auth::{login_handler, logout_handler, me_handler, signup_handler},
    catalog::{categories_handler, list_regions_handler, region_map_handler},
    favorites::{
        add_favorite_handler, list_favorite_ids_handler, list_favorites_handler,
        remove_favorite_handler,
    },
    rest::ApiDoc,
    state::AppState,
    stories::{
        get_story_by_slug_handler, get_story_handler, list_stories_handler, random_story_handler,
        submit_story_handler,
    },
};

/// Builds the complete application router: public and protected API routes,
/// uploaded covers and the Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = HeaderValue::from_str(&app_state.config.cors_origin).map_err(|e| {
        ApiError::Internal(format!(
            "Invalid CORS origin '{}': {}",
            app_state.config.cors_origin, e
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/stories", get(list_stories_handler).post(submit_story_handler))
        .route("/stories/random", get(random_story_handler))
        .route("/stories/{id}", get(get_story_handler))
        .route("/stories/slug/{slug}", get(get_story_by_slug_handler))
        .route("/regions", get(list_regions_handler))
        .route("/regions/map", get(region_map_handler))
        .route("/categories", get(categories_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(me_handler))
        .route("/favorites", get(list_favorites_handler))
        .route("/favorites/ids", get(list_favorite_ids_handler))
        .route(
            "/favorites/{story_id}",
            put(add_favorite_handler).delete(remove_favorite_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let covers = ServeDir::new(app_state.config.storage_root.join("covers"));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/covers", covers)
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
