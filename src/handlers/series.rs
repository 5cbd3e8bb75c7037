use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    flash::{Flash, FlashRedirect},
    gate::Permission,
    models::{Series, SeriesRequest, SeriesWithVideos},
};

use super::{field_errors, json_body};

pub const SERIES_INDEX: &str = "/series/manage";
pub const SERIES_CREATE: &str = "/series/manage/create";

/// list_series
///
/// [Public Route] All series.
#[utoipa::path(
    get,
    path = "/series",
    responses((status = 200, description = "All series", body = [Series]))
)]
pub async fn list_series(State(state): State<AppState>) -> Result<Json<Vec<Series>>, AppError> {
    Ok(Json(state.repo.list_series().await?))
}

/// show_series
///
/// [Public Route] A series with the videos filed under it.
#[utoipa::path(
    get,
    path = "/series/{id}",
    params(("id" = i64, Path, description = "Series ID")),
    responses(
        (status = 200, description = "Found", body = SeriesWithVideos),
        (status = 404, description = "Not Found")
    )
)]
pub async fn show_series(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SeriesWithVideos>, AppError> {
    let series = state.repo.get_series(id).await?.ok_or(AppError::NotFound)?;
    let videos = state.repo.videos_in_series(id).await?;
    Ok(Json(SeriesWithVideos { series, videos }))
}

/// manage_series
///
/// [Manage Route] Every series, for the management table. Requires `manageSeries`.
#[utoipa::path(
    get,
    path = "/series/manage",
    responses(
        (status = 200, description = "All series", body = [Series]),
        (status = 403, description = "Missing manageSeries")
    )
)]
pub async fn manage_series(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Series>>, AppError> {
    user.authorize(Permission::ManageSeries)?;
    Ok(Json(state.repo.list_series().await?))
}

/// create_series_form
///
/// [Manage Route] The series form has no server-side choices; this only answers the permission check.
#[utoipa::path(
    get,
    path = "/series/manage/create",
    responses((status = 200, description = "Allowed to create series"))
)]
pub async fn create_series_form(user: AuthUser) -> Result<Json<SeriesRequest>, AppError> {
    user.authorize(Permission::ManageSeries)?;
    Ok(Json(SeriesRequest::default()))
}

/// store_series
///
/// [Manage Route] Mirrors `store_video`: a failed insert redirects back to the form with an error flash.
#[utoipa::path(
    post,
    path = "/series/manage",
    request_body = SeriesRequest,
    responses(
        (status = 302, description = "Redirect to /series/manage or /series/manage/create"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn store_series(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<SeriesRequest>, JsonRejection>,
) -> Result<FlashRedirect, AppError> {
    user.authorize(Permission::ManageSeries)?;
    let payload = json_body(payload)?;
    field_errors(&payload).into_result()?;

    match state.repo.create_series(payload.into_fields()).await {
        Ok(series) => {
            tracing::info!(series_id = series.id, user_id = user.id, "series created");
            Ok(FlashRedirect::to(SERIES_INDEX).with(Flash::success("Series created successfully.")))
        }
        Err(e) => {
            tracing::warn!(user_id = user.id, "series creation failed: {}", e);
            Ok(FlashRedirect::to(SERIES_CREATE).with(Flash::error("Failed to create series.")))
        }
    }
}

/// edit_series_form
///
/// [Manage Route] The series being edited.
#[utoipa::path(
    get,
    path = "/series/manage/{id}/edit",
    params(("id" = i64, Path, description = "Series ID")),
    responses(
        (status = 200, description = "Form data", body = Series),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_series_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Series>, AppError> {
    user.authorize(Permission::ManageSeries)?;
    state
        .repo
        .get_series(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// update_series
///
/// [Manage Route] Full-field update; 404 for unknown ids.
#[utoipa::path(
    put,
    path = "/series/manage/{id}",
    params(("id" = i64, Path, description = "Series ID")),
    request_body = SeriesRequest,
    responses(
        (status = 302, description = "Redirect to /series/manage"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_series(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<SeriesRequest>, JsonRejection>,
) -> Result<FlashRedirect, AppError> {
    user.authorize(Permission::ManageSeries)?;
    if state.repo.get_series(id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let payload = json_body(payload)?;
    field_errors(&payload).into_result()?;

    state
        .repo
        .update_series(id, payload.into_fields())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(FlashRedirect::to(SERIES_INDEX).with(Flash::success("Series updated successfully.")))
}

/// destroy_series
///
/// [Manage Route] Videos of the series stay in the catalogue without a series.
#[utoipa::path(
    delete,
    path = "/series/manage/{id}",
    params(("id" = i64, Path, description = "Series ID")),
    responses(
        (status = 302, description = "Redirect to /series/manage"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn destroy_series(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, AppError> {
    user.authorize(Permission::ManageSeries)?;
    if !state.repo.delete_series(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(series_id = id, user_id = user.id, "series deleted");
    Ok(FlashRedirect::to(SERIES_INDEX).with(Flash::success("Series deleted successfully.")))
}
