use crate::{
    AppState,
    handlers::{series, users, videos},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Manage Router Module
///
/// Create/update/delete surfaces for videos, series and users, plus the management
/// listings. Wrapped in `auth_middleware` (anonymous → `/login`); each handler then
/// checks its resource permission and answers 403 when it is missing.
pub fn manage_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Videos (videosManager) ---
        .route(
            "/videos/manage",
            get(videos::manage_videos).post(videos::store_video),
        )
        .route("/videos/manage/create", get(videos::create_video_form))
        // POST /videos/manage/upload
        // Presigned object-storage URL for the video file itself.
        .route("/videos/manage/upload", post(videos::request_video_upload))
        .route(
            "/videos/manage/{id}",
            axum::routing::put(videos::update_video).delete(videos::destroy_video),
        )
        .route("/videos/manage/{id}/edit", get(videos::edit_video_form))
        .route(
            "/videos/manage/{id}/tested-by",
            get(videos::video_tested_by),
        )
        // --- Series (manageSeries) ---
        .route(
            "/series/manage",
            get(series::manage_series).post(series::store_series),
        )
        .route("/series/manage/create", get(series::create_series_form))
        .route(
            "/series/manage/{id}",
            axum::routing::put(series::update_series).delete(series::destroy_series),
        )
        .route("/series/manage/{id}/edit", get(series::edit_series_form))
        // --- Users (manageUsers) ---
        .route(
            "/users/manage",
            get(users::manage_users).post(users::store_user),
        )
        .route("/users/manage/create", get(users::create_user_form))
        .route(
            "/users/manage/{id}",
            get(users::show_user)
                .put(users::update_user)
                .delete(users::destroy_user),
        )
        .route("/users/manage/{id}/edit", get(users::edit_user_form))
}
