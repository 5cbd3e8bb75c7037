//! HTTP handlers, one module per resource.
//!
//! Reads answer JSON; mutations answer a `FlashRedirect` to the resource's index.
//! Every management handler calls `AuthUser::authorize` before it looks at the
//! request body: callers without the permission get 403 whatever they sent.

pub mod series;
pub mod session;
pub mod users;
pub mod videos;

use axum::{Json, extract::rejection::JsonRejection};
use validator::Validate;

use crate::{
    error::{AppError, FieldErrors},
    repository::{Repository, RepositoryError},
};

/// Unwraps a body extracted as `Result<Json<T>, JsonRejection>`. Malformed, mistyped
/// or missing bodies become a 422 on the `body` field.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::debug!("rejected request body: {}", rejection.body_text());
            Err(AppError::Validation(FieldErrors::single(
                "body",
                rejection.body_text(),
            )))
        }
    }
}

/// A unique-constraint race on `users.email` is reported like the upfront check.
pub(crate) fn email_conflict(error: RepositoryError) -> AppError {
    match error {
        RepositoryError::Conflict(_) => {
            let mut errors = FieldErrors::new();
            errors.add_rule("email", "unique");
            AppError::Validation(errors)
        }
        other => other.into(),
    }
}

/// Runs the derived field rules and returns the collected messages (possibly empty).
pub(crate) fn field_errors<T: Validate>(payload: &T) -> FieldErrors {
    match payload.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => e.into(),
    }
}

/// Adds an `exists` error when `series_id` is set but names no series.
pub(crate) async fn check_series_reference(
    repo: &dyn Repository,
    series_id: Option<i64>,
    errors: &mut FieldErrors,
) -> Result<(), AppError> {
    if let Some(id) = series_id {
        if !repo.series_exists(id).await? {
            errors.add_rule("series_id", "exists");
        }
    }
    Ok(())
}

/// Adds a `unique` error when the email belongs to another user.
pub(crate) async fn check_email_unique(
    repo: &dyn Repository,
    email: Option<&str>,
    except: Option<i64>,
    errors: &mut FieldErrors,
) -> Result<(), AppError> {
    if errors.contains("email") {
        return Ok(());
    }
    if let Some(email) = email {
        if repo.email_taken(email.trim(), except).await? {
            errors.add_rule("email", "unique");
        }
    }
    Ok(())
}
