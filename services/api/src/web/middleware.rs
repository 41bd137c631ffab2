//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use folktale_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::{auth::session_id_from_headers, state::AppState};

/// Middleware that validates the auth session cookie and resolves the user.
///
/// If valid, inserts the `User` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_id_from_headers(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let user = state
        .accounts
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| match e {
            PortError::Unauthenticated => {
                debug!("Rejected expired or unknown auth session");
                StatusCode::UNAUTHORIZED
            }
            _ => {
                error!("Failed to validate auth session: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
