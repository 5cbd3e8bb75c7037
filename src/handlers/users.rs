use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

use crate::{
    AppState,
    auth::{AuthUser, hash_password},
    error::{AppError, FieldErrors},
    flash::{Flash, FlashRedirect},
    gate::{Permission, Role},
    models::{
        CreateUserRequest, NewUser, UpdateUserRequest, User, UserChanges, UserCreateForm,
        UserDetail,
    },
    repository::RepositoryError,
};

use super::{check_email_unique, email_conflict, field_errors, json_body};

pub const USERS_INDEX: &str = "/users/manage";
pub const USERS_CREATE: &str = "/users/manage/create";

// Every handler in this module is gated by `manageUsers`.

/// manage_users
///
/// [Manage Route] Every account, for the management table.
#[utoipa::path(
    get,
    path = "/users/manage",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 302, description = "Not logged in, redirected to /login"),
        (status = 403, description = "Missing manageUsers")
    )
)]
pub async fn manage_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, AppError> {
    user.authorize(Permission::ManageUsers)?;
    Ok(Json(state.repo.list_users().await?))
}

/// show_user
///
/// [Manage Route] One account with its roles and effective permissions.
#[utoipa::path(
    get,
    path = "/users/manage/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn show_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserDetail>, AppError> {
    user.authorize(Permission::ManageUsers)?;
    load_detail(&state, id).await.map(Json)
}

/// create_user_form
///
/// [Manage Route] Choices offered by the create form: every assignable role and permission.
#[utoipa::path(
    get,
    path = "/users/manage/create",
    responses((status = 200, description = "Form data", body = UserCreateForm))
)]
pub async fn create_user_form(user: AuthUser) -> Result<Json<UserCreateForm>, AppError> {
    user.authorize(Permission::ManageUsers)?;
    Ok(Json(UserCreateForm {
        roles: Role::ALL.to_vec(),
        permissions: Permission::ALL.to_vec(),
    }))
}

/// store_user
///
/// [Manage Route] Creates the user, then assigns the requested roles and permissions. The two steps
/// are separate writes: if the assignment fails the user exists without grants and the
/// caller is sent to its edit form with an error flash. An email taken by a concurrent
/// request is reported as a 422 on `email`.
#[utoipa::path(
    post,
    path = "/users/manage",
    request_body = CreateUserRequest,
    responses(
        (status = 302, description = "Redirect to /users/manage"),
        (status = 403, description = "Missing manageUsers"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn store_user(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<FlashRedirect, AppError> {
    user.authorize(Permission::ManageUsers)?;
    let payload = json_body(payload)?;
    let mut errors = field_errors(&payload);
    check_email_unique(state.repo.as_ref(), payload.email.as_deref(), None, &mut errors).await?;
    errors.into_result()?;

    let new_user = NewUser {
        name: payload.name.unwrap_or_default().trim().to_string(),
        email: payload.email.unwrap_or_default().trim().to_string(),
        password_hash: hash_password(payload.password.as_deref().unwrap_or_default())?,
    };

    let created = match state.repo.create_user(new_user).await {
        Ok(created) => created,
        Err(e @ RepositoryError::Conflict(_)) => return Err(email_conflict(e)),
        Err(e) => {
            tracing::warn!(user_id = user.id, "user creation failed: {}", e);
            return Ok(FlashRedirect::to(USERS_CREATE).with(Flash::error("Failed to create user.")));
        }
    };
    tracing::info!(created_id = created.id, user_id = user.id, "user created");

    if let Err(e) = assign(
        &state,
        created.id,
        Some(payload.roles.as_slice()),
        Some(payload.permissions.as_slice()),
    )
    .await
    {
        tracing::warn!(created_id = created.id, "assigning grants failed: {}", e);
        return Ok(FlashRedirect::to(format!("{USERS_INDEX}/{}/edit", created.id))
            .with(Flash::error("User created, but assigning roles failed.")));
    }

    Ok(FlashRedirect::to(USERS_INDEX).with(Flash::success("User created successfully.")))
}

/// edit_user_form
///
/// [Manage Route] The account being edited with its current grants.
#[utoipa::path(
    get,
    path = "/users/manage/{id}/edit",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Form data", body = UserDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_user_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserDetail>, AppError> {
    user.authorize(Permission::ManageUsers)?;
    load_detail(&state, id).await.map(Json)
}

/// update_user
///
/// [Manage Route] Updates name and email. The password changes only when one is sent;
/// roles and permissions are replaced only when their list is present.
#[utoipa::path(
    put,
    path = "/users/manage/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 302, description = "Redirect to /users/manage"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<FlashRedirect, AppError> {
    user.authorize(Permission::ManageUsers)?;
    if state.repo.get_user(id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let payload = json_body(payload)?;
    let mut errors = field_errors(&payload);
    check_email_unique(state.repo.as_ref(), payload.email.as_deref(), Some(id), &mut errors)
        .await?;
    errors.into_result()?;

    let password_hash = match payload.password.as_deref() {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };
    let changes = UserChanges {
        name: payload.name.unwrap_or_default().trim().to_string(),
        email: payload.email.unwrap_or_default().trim().to_string(),
        password_hash,
    };
    state
        .repo
        .update_user(id, changes)
        .await
        .map_err(email_conflict)?
        .ok_or(AppError::NotFound)?;
    assign(&state, id, payload.roles.as_deref(), payload.permissions.as_deref()).await?;

    tracing::info!(updated_id = id, user_id = user.id, "user updated");
    Ok(FlashRedirect::to(USERS_INDEX).with(Flash::success("User updated successfully.")))
}

/// destroy_user
///
/// [Manage Route] Removes the account; videos it created stay with no owner. Callers cannot delete
/// their own account.
#[utoipa::path(
    delete,
    path = "/users/manage/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 302, description = "Redirect to /users/manage"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Attempt to delete own account")
    )
)]
pub async fn destroy_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, AppError> {
    user.authorize(Permission::ManageUsers)?;
    if id == user.id {
        return Err(AppError::Validation(FieldErrors::single(
            "id",
            "You cannot delete your own account.",
        )));
    }
    if !state.repo.delete_user(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(deleted_id = id, user_id = user.id, "user deleted");
    Ok(FlashRedirect::to(USERS_INDEX).with(Flash::success("User deleted successfully.")))
}

async fn load_detail(state: &AppState, id: i64) -> Result<UserDetail, AppError> {
    let user = state.repo.get_user(id).await?.ok_or(AppError::NotFound)?;
    let access = state.repo.get_access(id).await?;
    Ok(UserDetail { user, access })
}

/// Replaces whichever grant lists are given.
async fn assign(
    state: &AppState,
    user_id: i64,
    roles: Option<&[Role]>,
    permissions: Option<&[Permission]>,
) -> Result<(), AppError> {
    if let Some(roles) = roles {
        state.repo.set_user_roles(user_id, roles).await?;
    }
    if let Some(permissions) = permissions {
        state.repo.set_user_permissions(user_id, permissions).await?;
    }
    Ok(())
}
