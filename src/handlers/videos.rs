use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    flash::{Flash, FlashRedirect},
    gate::Permission,
    models::{
        UploadRequest, UploadResponse, User, Video, VideoCreateForm, VideoEditForm, VideoRequest,
    },
};

use super::{check_series_reference, field_errors, json_body};

pub const VIDEOS_INDEX: &str = "/videos/manage";
pub const VIDEOS_CREATE: &str = "/videos/manage/create";

async fn validate(state: &AppState, payload: &VideoRequest) -> Result<(), AppError> {
    let mut errors = field_errors(payload);
    check_series_reference(state.repo.as_ref(), payload.series_id, &mut errors).await?;
    errors.into_result()
}

/// list_videos
///
/// [Public Route] The whole catalogue, for browsing.
#[utoipa::path(
    get,
    path = "/videos",
    responses((status = 200, description = "All videos", body = [Video]))
)]
pub async fn list_videos(State(state): State<AppState>) -> Result<Json<Vec<Video>>, AppError> {
    Ok(Json(state.repo.list_videos().await?))
}

/// show_video
///
/// [Public Route] A single video; 404 when the id is unknown.
#[utoipa::path(
    get,
    path = "/videos/{id}",
    params(("id" = i64, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Found", body = Video),
        (status = 404, description = "Not Found")
    )
)]
pub async fn show_video(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Video>, AppError> {
    state
        .repo
        .get_video(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// manage_videos
///
/// [Manage Route] Every video, for the management table. Requires `videosManager`.
#[utoipa::path(
    get,
    path = "/videos/manage",
    responses(
        (status = 200, description = "All videos", body = [Video]),
        (status = 302, description = "Not logged in, redirected to /login"),
        (status = 403, description = "Missing videosManager")
    )
)]
pub async fn manage_videos(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Video>>, AppError> {
    user.authorize(Permission::VideosManager)?;
    Ok(Json(state.repo.list_videos().await?))
}

/// create_video_form
///
/// [Manage Route] Data for the creation form: the series a video can be filed under.
#[utoipa::path(
    get,
    path = "/videos/manage/create",
    responses((status = 200, description = "Form data", body = VideoCreateForm))
)]
pub async fn create_video_form(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<VideoCreateForm>, AppError> {
    user.authorize(Permission::VideosManager)?;
    Ok(Json(VideoCreateForm {
        series: state.repo.list_series().await?,
    }))
}

/// store_video
///
/// [Manage Route] Validates and persists a new video owned by the caller.
///
/// A failed insert is not an error for the caller: it is redirected back to the
/// creation form with an error flash.
#[utoipa::path(
    post,
    path = "/videos/manage",
    request_body = VideoRequest,
    responses(
        (status = 302, description = "Redirect to /videos/manage (success) or /videos/manage/create (error)"),
        (status = 403, description = "Missing videosManager"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn store_video(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<VideoRequest>, JsonRejection>,
) -> Result<FlashRedirect, AppError> {
    user.authorize(Permission::VideosManager)?;
    let payload = json_body(payload)?;
    validate(&state, &payload).await?;

    match state
        .repo
        .create_video(payload.into_fields(), Some(user.id))
        .await
    {
        Ok(video) => {
            tracing::info!(video_id = video.id, user_id = user.id, "video created");
            Ok(FlashRedirect::to(VIDEOS_INDEX).with(Flash::success("Video created successfully.")))
        }
        Err(e) => {
            tracing::warn!(user_id = user.id, "video creation failed: {}", e);
            Ok(FlashRedirect::to(VIDEOS_CREATE).with(Flash::error("Failed to create video.")))
        }
    }
}

/// edit_video_form
///
/// [Manage Route] The video being edited plus the series choices.
#[utoipa::path(
    get,
    path = "/videos/manage/{id}/edit",
    params(("id" = i64, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Form data", body = VideoEditForm),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_video_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<VideoEditForm>, AppError> {
    user.authorize(Permission::VideosManager)?;
    let video = state.repo.get_video(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(VideoEditForm {
        video,
        series: state.repo.list_series().await?,
    }))
}

/// update_video
///
/// [Manage Route] Full-field update. Unknown ids are a 404, never a silent no-op.
#[utoipa::path(
    put,
    path = "/videos/manage/{id}",
    params(("id" = i64, Path, description = "Video ID")),
    request_body = VideoRequest,
    responses(
        (status = 302, description = "Redirect to /videos/manage"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_video(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<VideoRequest>, JsonRejection>,
) -> Result<FlashRedirect, AppError> {
    user.authorize(Permission::VideosManager)?;
    if state.repo.get_video(id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let payload = json_body(payload)?;
    validate(&state, &payload).await?;

    // The row can still vanish between the lookup and the update.
    state
        .repo
        .update_video(id, payload.into_fields())
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(video_id = id, user_id = user.id, "video updated");
    Ok(FlashRedirect::to(VIDEOS_INDEX).with(Flash::success("Video updated successfully.")))
}

/// destroy_video
///
/// [Manage Route] Deletes exactly the addressed video.
#[utoipa::path(
    delete,
    path = "/videos/manage/{id}",
    params(("id" = i64, Path, description = "Video ID")),
    responses(
        (status = 302, description = "Redirect to /videos/manage"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn destroy_video(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, AppError> {
    user.authorize(Permission::VideosManager)?;
    if !state.repo.delete_video(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(video_id = id, user_id = user.id, "video deleted");
    Ok(FlashRedirect::to(VIDEOS_INDEX).with(Flash::success("Video deleted successfully.")))
}

/// video_tested_by
///
/// [Manage Route] Users who recorded that they tested the video.
#[utoipa::path(
    get,
    path = "/videos/manage/{id}/tested-by",
    params(("id" = i64, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Testers", body = [User]),
        (status = 404, description = "Not Found")
    )
)]
pub async fn video_tested_by(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<User>>, AppError> {
    user.authorize(Permission::VideosManager)?;
    if state.repo.get_video(id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    Ok(Json(state.repo.tested_by(id).await?))
}

/// mark_video_tested
///
/// [Authenticated Route] Records the caller as a tester of the video. Repeating the
/// call is harmless: 201 the first time, 200 afterwards.
#[utoipa::path(
    post,
    path = "/videos/{id}/tested",
    params(("id" = i64, Path, description = "Video ID")),
    responses(
        (status = 201, description = "Recorded"),
        (status = 200, description = "Already recorded"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn mark_video_tested(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.repo.get_video(id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    if state.repo.mark_tested(id, user.id).await? {
        Ok(StatusCode::CREATED)
    } else {
        Ok(StatusCode::OK)
    }
}

/// request_video_upload
///
/// [Manage Route] Presigned URL for uploading a video file straight to object storage.
/// The returned `public_url` is what the client then submits as the video's `url`.
#[utoipa::path(
    post,
    path = "/videos/manage/upload",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "Upload URL", body = UploadResponse),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn request_video_upload(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    user.authorize(Permission::VideosManager)?;
    let payload = json_body(payload)?;
    field_errors(&payload).into_result()?;

    let extension = std::path::Path::new(&payload.filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin")
        .to_ascii_lowercase();
    let resource_key = format!("videos/{}.{}", Uuid::new_v4(), extension);

    let upload_url = state
        .storage
        .presigned_upload_url(&resource_key, &payload.content_type)
        .await?;

    Ok(Json(UploadResponse {
        upload_url,
        public_url: state.storage.public_url(&resource_key),
        resource_key,
    }))
}
