use std::collections::BTreeMap;

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::repository::RepositoryError;

/// Path of the login view unauthenticated callers are sent to.
pub const LOGIN_PATH: &str = "/login";

/// FieldErrors
///
/// Field-level validation messages keyed by field name, serialized in the
/// `{"field": ["message", ...]}` shape the frontend forms expect.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Adds the standard message for a rule `code` (see `describe`).
    pub fn add_rule(&mut self, field: &str, code: &str) {
        let message = describe(field, code, |_| None);
        self.add(field, message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Ok when nothing was collected, otherwise the matching `AppError`.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            let field = field.to_string();
            for error in field_errors.iter() {
                let message = describe(&field, &error.code, |name| {
                    error.params.get(name).and_then(|v| v.as_u64())
                });
                out.add(&field, message);
            }
        }
        out
    }
}

/// Human readable message for a validation rule code.
pub fn describe(field: &str, code: &str, param: impl Fn(&str) -> Option<u64>) -> String {
    let label = field.replace('_', " ");
    match code {
        "required" => format!("The {label} field is required."),
        "length" => match (param("min"), param("max")) {
            (Some(min), None) => format!("The {label} field must be at least {min} characters."),
            (None, Some(max)) => {
                format!("The {label} field must not be greater than {max} characters.")
            }
            (Some(min), Some(max)) => {
                format!("The {label} field must be between {min} and {max} characters.")
            }
            (None, None) => format!("The {label} field has an invalid length."),
        },
        "url" => format!("The {label} field must be a valid URL."),
        "email" => format!("The {label} field must be a valid email address."),
        "exists" => format!("The selected {label} is invalid."),
        "unique" => format!("The {label} has already been taken."),
        "video_type" => format!("The {label} field must be a video MIME type."),
        _ => format!("The {label} field is invalid."),
    }
}

#[derive(Serialize)]
struct ValidationBody<'a> {
    message: String,
    errors: &'a FieldErrors,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

/// AppError
///
/// Every failure a handler can report. Validation and authorization failures are
/// raised before the repository is touched.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("the given data was invalid")]
    Validation(FieldErrors),
    #[error("resource not found")]
    NotFound,
    /// No valid identity. Browsers are redirected to the login view; JSON clients get
    /// a 401 and run their own redirect.
    #[error("authentication required")]
    AuthenticationRequired { wants_json: bool },
    #[error("this action is unauthorized")]
    Forbidden,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => {
                let message = errors
                    .0
                    .values()
                    .flatten()
                    .next()
                    .cloned()
                    .unwrap_or_else(|| "The given data was invalid.".to_string());
                let body = ValidationBody {
                    message,
                    errors: &errors,
                };
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(MessageBody { message: "Not Found" }),
            )
                .into_response(),
            AppError::AuthenticationRequired { wants_json: true } => (
                StatusCode::UNAUTHORIZED,
                Json(MessageBody {
                    message: "Unauthenticated.",
                }),
            )
                .into_response(),
            AppError::AuthenticationRequired { wants_json: false } => {
                (StatusCode::FOUND, [(header::LOCATION, LOGIN_PATH)]).into_response()
            }
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(MessageBody {
                    message: "This action is unauthorized.",
                }),
            )
                .into_response(),
            AppError::Repository(e) => {
                tracing::error!("repository failure: {}", e);
                server_error()
            }
            AppError::Storage(e) => {
                tracing::error!("storage failure: {}", e);
                server_error()
            }
            AppError::Internal(e) => {
                tracing::error!("internal failure: {}", e);
                server_error()
            }
        }
    }
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(MessageBody {
            message: "Server Error",
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_uses_laravel_style_messages() {
        let none = |_: &str| None;
        assert_eq!(
            describe("series_id", "exists", none),
            "The selected series id is invalid."
        );
        assert_eq!(
            describe("title", "length", |n| (n == "max").then_some(255)),
            "The title field must not be greater than 255 characters."
        );
        assert_eq!(describe("url", "url", none), "The url field must be a valid URL.");
    }

    #[test]
    fn authentication_required_redirects_browsers_only() {
        let redirect = AppError::AuthenticationRequired { wants_json: false }.into_response();
        assert_eq!(redirect.status(), StatusCode::FOUND);
        assert_eq!(redirect.headers()[header::LOCATION], LOGIN_PATH);

        let json = AppError::AuthenticationRequired { wants_json: true }.into_response();
        assert_eq!(json.status(), StatusCode::UNAUTHORIZED);
        assert!(json.headers().get(header::LOCATION).is_none());
    }

    #[test]
    fn forbidden_never_redirects() {
        let response = AppError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::LOCATION).is_none());
    }
}
