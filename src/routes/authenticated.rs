use crate::{
    AppState,
    handlers::{session, videos},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes open to any logged-in user regardless of permissions. The router is wrapped
/// in `auth_middleware`, so anonymous requests never reach these handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // Profile view: the caller's record, roles and effective permissions.
        .route("/me", get(session::get_me))
        // POST /videos/{id}/tested
        // Records the caller as a tester of the video; idempotent.
        .route("/videos/{id}/tested", post(videos::mark_video_tested))
}
