use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::{AuthUser, hash_password, issue_token, verify_password},
    error::{AppError, FieldErrors},
    models::{LoginRequest, NewUser, Profile, RegisterRequest, TokenResponse, User},
};

use super::{check_email_unique, email_conflict, field_errors, json_body};

fn token_response(state: &AppState, user: User) -> Result<TokenResponse, AppError> {
    Ok(TokenResponse {
        token: issue_token(user.id, &state.config.jwt_secret, state.config.token_ttl_secs)?,
        token_type: "Bearer".to_string(),
        expires_in: state.config.token_ttl_secs,
        user,
    })
}

/// login
///
/// [Public Route] Exchanges email and password for a bearer token. Unknown emails and
/// wrong passwords produce the same field error.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 422, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let payload = json_body(payload)?;
    field_errors(&payload).into_result()?;
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    let rejected = || {
        AppError::Validation(FieldErrors::single(
            "email",
            "These credentials do not match our records.",
        ))
    };

    let credentials = state
        .repo
        .find_credentials(email.trim())
        .await?
        .ok_or_else(rejected)?;
    if !verify_password(&password, &credentials.password_hash) {
        tracing::info!(user_id = credentials.id, "login rejected");
        return Err(rejected());
    }
    let user = state
        .repo
        .get_user(credentials.id)
        .await?
        .ok_or_else(rejected)?;

    tracing::info!(user_id = user.id, "login");
    Ok(Json(token_response(&state, user)?))
}

/// register
///
/// [Public Route] Self-service signup. New accounts hold no roles or permissions.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = TokenResponse),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let payload = json_body(payload)?;
    let mut errors = field_errors(&payload);
    check_email_unique(state.repo.as_ref(), payload.email.as_deref(), None, &mut errors).await?;
    errors.into_result()?;

    let user = state
        .repo
        .create_user(NewUser {
            name: payload.name.unwrap_or_default().trim().to_string(),
            email: payload.email.unwrap_or_default().trim().to_string(),
            password_hash: hash_password(payload.password.as_deref().unwrap_or_default())?,
        })
        .await
        .map_err(email_conflict)?;

    tracing::info!(user_id = user.id, "registered");
    Ok((StatusCode::CREATED, Json(token_response(&state, user)?)))
}

/// get_me
///
/// [Authenticated Route] The caller's profile with resolved roles and permissions.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = Profile))
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> Result<Json<Profile>, AppError> {
    let record = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(Profile {
        user: record,
        access: user.access,
    }))
}
