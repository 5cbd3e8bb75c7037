use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::gate::{Access, Permission, Role};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Public view of a row in the `users` table. The password hash is loaded separately
/// through `UserCredentials` and never leaves the repository boundary in this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub name: String,
    // Unique across the table.
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Row used only by the login flow.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i64,
    pub password_hash: String,
}

/// Video
///
/// A catalogued video. `user_id` is the creator and `series_id` the optional series;
/// both become null when the referenced row is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub url: String,
    pub user_id: Option<i64>,
    pub series_id: Option<i64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Series
///
/// Named grouping of videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Series {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Series detail page payload: the series plus the videos filed under it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SeriesWithVideos {
    #[serde(flatten)]
    #[ts(flatten)]
    pub series: Series,
    pub videos: Vec<Video>,
}

// --- Repository Inputs ---

/// Validated column values for inserting or fully updating a video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFields {
    pub title: String,
    pub description: String,
    pub url: String,
    pub series_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFields {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Full-field user update. `password_hash` is `None` when the password is unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct UserChanges {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// Rejects empty and whitespace-only strings with the same code as a missing field.
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// VideoRequest
///
/// Body of `POST /videos/manage` and `PUT /videos/manage/{id}`. Required fields are
/// `Option`s so a missing field becomes a field-level validation message instead of
/// a deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct VideoRequest {
    #[validate(required, length(max = 255), custom(function = "not_blank"))]
    pub title: Option<String>,
    #[validate(required, custom(function = "not_blank"))]
    pub description: Option<String>,
    #[validate(required, url)]
    pub url: Option<String>,
    // Existence is checked against the repository by the handler.
    pub series_id: Option<i64>,
}

impl VideoRequest {
    /// Converts an already validated request into repository fields.
    pub fn into_fields(self) -> VideoFields {
        VideoFields {
            title: self.title.unwrap_or_default().trim().to_string(),
            description: self.description.unwrap_or_default().trim().to_string(),
            url: self.url.unwrap_or_default(),
            series_id: self.series_id,
        }
    }
}

/// Body of `POST /series/manage` and `PUT /series/manage/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct SeriesRequest {
    #[validate(required, length(max = 255), custom(function = "not_blank"))]
    pub title: Option<String>,
    pub description: Option<String>,
}

impl SeriesRequest {
    pub fn into_fields(self) -> SeriesFields {
        SeriesFields {
            title: self.title.unwrap_or_default().trim().to_string(),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        }
    }
}

/// CreateUserRequest
///
/// Body of `POST /users/manage`. Role and permission names outside the closed sets
/// fail deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    #[validate(required, length(max = 255), custom(function = "not_blank"))]
    pub name: Option<String>,
    #[validate(required, email, length(max = 255))]
    pub email: Option<String>,
    #[validate(required, length(min = 8))]
    pub password: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// UpdateUserRequest
///
/// Body of `PUT /users/manage/{id}`. Omitting `password` keeps the current one;
/// omitting `roles`/`permissions` keeps the current grants.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[validate(required, length(max = 255), custom(function = "not_blank"))]
    pub name: Option<String>,
    #[validate(required, email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(min = 8))]
    pub password: Option<String>,
    pub roles: Option<Vec<Role>>,
    pub permissions: Option<Vec<Permission>>,
}

/// Body of `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[validate(required, length(max = 255), custom(function = "not_blank"))]
    pub name: Option<String>,
    #[validate(required, email, length(max = 255))]
    pub email: Option<String>,
    #[validate(required, length(min = 8))]
    pub password: Option<String>,
}

/// Body of `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(required, email)]
    pub email: Option<String>,
    #[validate(required, custom(function = "not_blank"))]
    pub password: Option<String>,
}

/// UploadRequest
///
/// Input for requesting a short-lived upload URL for a video file.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UploadRequest {
    /// The original filename, used to derive the object extension.
    #[schema(example = "lesson_01.mp4")]
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    /// MIME type the upload is constrained to. Only `video/*` is accepted.
    #[schema(example = "video/mp4")]
    #[validate(custom(function = "video_content_type"))]
    pub content_type: String,
}

fn video_content_type(value: &str) -> Result<(), ValidationError> {
    match value.strip_prefix("video/") {
        Some(subtype) if !subtype.is_empty() => Ok(()),
        _ => Err(ValidationError::new("video_type")),
    }
}

// --- Response Schemas (Output) ---

/// Token issued by `/login` and `/register`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
    /// Always `"Bearer"`.
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    pub user: User,
}

/// Profile
///
/// Output of `GET /me`: the caller's record and resolved capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Profile {
    pub user: User,
    pub access: Access,
}

/// Data backing the video create form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct VideoCreateForm {
    pub series: Vec<Series>,
}

/// Data backing the video edit form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct VideoEditForm {
    pub video: Video,
    pub series: Vec<Series>,
}

/// Choices offered by the user create form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserCreateForm {
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

/// A managed user together with the grants shown on the edit form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserDetail {
    pub user: User,
    pub access: Access,
}

/// UploadResponse
///
/// The presigned URL for the PUT request, the object key, and the public URL the
/// client stores as the video's `url` once the upload finishes.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadResponse {
    pub upload_url: String,
    pub resource_key: String,
    pub public_url: String,
}
