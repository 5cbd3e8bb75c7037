use crate::{
    AppState,
    handlers::{series, session, videos},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints for anonymous clients: liveness, login/registration, and read-only
/// browsing of the catalogue.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and the client's test-connection view.
        .route("/health", get(|| async { "ok" }))
        // POST /login, POST /register
        // Issue bearer tokens. The client stores the token and sends it on every request.
        .route("/login", post(session::login))
        .route("/register", post(session::register))
        // GET /videos, GET /videos/{id}
        .route("/videos", get(videos::list_videos))
        .route("/videos/{id}", get(videos::show_video))
        // GET /series, GET /series/{id}
        // The detail view embeds the videos filed under the series.
        .route("/series", get(series::list_series))
        .route("/series/{id}", get(series::show_series))
}
