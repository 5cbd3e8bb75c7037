use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::{
    gate::{Access, Permission, Role},
    models::{
        NewUser, Series, SeriesFields, User, UserChanges, UserCredentials, Video, VideoFields,
    },
};

/// RepositoryError
///
/// Failures of the entity store. Handlers either surface these as a 500 or, for
/// `store` operations, turn them into an error flash.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A unique constraint rejected the write (e.g. a concurrent duplicate email).
    #[error("conflicting record: {0}")]
    Conflict(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The contract of the entity store. Handlers only see `Arc<dyn Repository>`, so the
/// Postgres store and the in-memory test doubles are interchangeable.
///
/// Operations returning `Option`/`bool` report "no such row" through that value rather
/// than an error; the caller decides whether that is a 404.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>>;
    // True when another user (other than `except`) already uses this email.
    async fn email_taken(&self, email: &str, except: Option<i64>) -> RepoResult<bool>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>>;
    // Videos created by the user are kept with a null `user_id`.
    async fn delete_user(&self, id: i64) -> RepoResult<bool>;

    // --- Roles & Permissions ---
    async fn get_access(&self, user_id: i64) -> RepoResult<Access>;
    // Replaces the user's roles.
    async fn set_user_roles(&self, user_id: i64, roles: &[Role]) -> RepoResult<()>;
    // Replaces the user's direct permissions.
    async fn set_user_permissions(&self, user_id: i64, permissions: &[Permission])
    -> RepoResult<()>;
    // Replaces the permission bundle of a role.
    async fn define_role(&self, role: Role, permissions: &[Permission]) -> RepoResult<()>;

    // --- Series ---
    async fn list_series(&self) -> RepoResult<Vec<Series>>;
    async fn get_series(&self, id: i64) -> RepoResult<Option<Series>>;
    async fn series_exists(&self, id: i64) -> RepoResult<bool>;
    async fn create_series(&self, fields: SeriesFields) -> RepoResult<Series>;
    async fn update_series(&self, id: i64, fields: SeriesFields) -> RepoResult<Option<Series>>;
    // Videos in the series are kept with a null `series_id`.
    async fn delete_series(&self, id: i64) -> RepoResult<bool>;
    async fn videos_in_series(&self, id: i64) -> RepoResult<Vec<Video>>;

    // --- Videos ---
    async fn list_videos(&self) -> RepoResult<Vec<Video>>;
    async fn get_video(&self, id: i64) -> RepoResult<Option<Video>>;
    async fn create_video(&self, fields: VideoFields, user_id: Option<i64>) -> RepoResult<Video>;
    async fn update_video(&self, id: i64, fields: VideoFields) -> RepoResult<Option<Video>>;
    async fn delete_video(&self, id: i64) -> RepoResult<bool>;
    async fn tested_by(&self, video_id: i64) -> RepoResult<Vec<User>>;
    // Idempotent: true only when a new tested-by record was inserted.
    async fn mark_tested(&self, video_id: i64, user_id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Schema lives in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, name, email, created_at, updated_at";
const VIDEO_COLUMNS: &str =
    "id, title, description, url, user_id, series_id, created_at, updated_at";
const SERIES_COLUMNS: &str = "id, title, description, created_at, updated_at";

/// Logs the failed operation and maps unique violations to `Conflict`.
fn db_error(op: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        tracing::error!("{} error: {:?}", op, e);
        let unique = e
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            RepositoryError::Conflict(op.to_string())
        } else {
            RepositoryError::Database(e)
        }
    }
}

fn names<T: Copy>(items: &[T], as_str: fn(T) -> &'static str) -> Vec<String> {
    items.iter().map(|i| as_str(*i).to_string()).collect()
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_user"))
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        sqlx::query_as::<_, UserCredentials>(
            "SELECT id, password_hash FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_credentials"))
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1) AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("email_taken"))
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_users"))
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create_user"))
    }

    /// Full-field update; `COALESCE` keeps the stored hash when no new password is given.
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = $2,
                email = $3,
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update_user"))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_user"))?;
        Ok(res.rows_affected() > 0)
    }

    /// get_access
    ///
    /// Effective permissions are the union of direct grants and role grants.
    async fn get_access(&self, user_id: i64) -> RepoResult<Access> {
        let roles = sqlx::query_scalar::<_, String>(
            "SELECT role FROM user_roles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("get_access roles"))?;

        let permissions = sqlx::query_scalar::<_, String>(
            r#"
            SELECT permission FROM user_permissions WHERE user_id = $1
            UNION
            SELECT rp.permission
            FROM role_permissions rp
            JOIN user_roles ur ON ur.role = rp.role
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("get_access permissions"))?;

        Ok(Access::from_names(roles, permissions))
    }

    async fn set_user_roles(&self, user_id: i64, roles: &[Role]) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error("set_user_roles"))?;
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("set_user_roles"))?;
        sqlx::query("INSERT INTO user_roles (user_id, role) SELECT $1, UNNEST($2::TEXT[])")
            .bind(user_id)
            .bind(names(roles, Role::as_str))
            .execute(&mut *tx)
            .await
            .map_err(db_error("set_user_roles"))?;
        tx.commit().await.map_err(db_error("set_user_roles"))
    }

    async fn set_user_permissions(
        &self,
        user_id: i64,
        permissions: &[Permission],
    ) -> RepoResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("set_user_permissions"))?;
        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("set_user_permissions"))?;
        sqlx::query(
            "INSERT INTO user_permissions (user_id, permission) SELECT $1, UNNEST($2::TEXT[])",
        )
        .bind(user_id)
        .bind(names(permissions, Permission::as_str))
        .execute(&mut *tx)
        .await
        .map_err(db_error("set_user_permissions"))?;
        tx.commit().await.map_err(db_error("set_user_permissions"))
    }

    async fn define_role(&self, role: Role, permissions: &[Permission]) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error("define_role"))?;
        sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(role.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error("define_role"))?;
        sqlx::query(
            "INSERT INTO permissions (name) SELECT UNNEST($1::TEXT[]) ON CONFLICT DO NOTHING",
        )
        .bind(names(permissions, Permission::as_str))
        .execute(&mut *tx)
        .await
        .map_err(db_error("define_role"))?;
        sqlx::query("DELETE FROM role_permissions WHERE role = $1")
            .bind(role.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error("define_role"))?;
        sqlx::query(
            "INSERT INTO role_permissions (role, permission) SELECT $1, UNNEST($2::TEXT[])",
        )
        .bind(role.as_str())
        .bind(names(permissions, Permission::as_str))
        .execute(&mut *tx)
        .await
        .map_err(db_error("define_role"))?;
        tx.commit().await.map_err(db_error("define_role"))
    }

    // --- SERIES ---

    async fn list_series(&self) -> RepoResult<Vec<Series>> {
        sqlx::query_as::<_, Series>(&format!("SELECT {SERIES_COLUMNS} FROM series ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_series"))
    }

    async fn get_series(&self, id: i64) -> RepoResult<Option<Series>> {
        sqlx::query_as::<_, Series>(&format!(
            "SELECT {SERIES_COLUMNS} FROM series WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get_series"))
    }

    async fn series_exists(&self, id: i64) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM series WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("series_exists"))
    }

    async fn create_series(&self, fields: SeriesFields) -> RepoResult<Series> {
        sqlx::query_as::<_, Series>(&format!(
            "INSERT INTO series (title, description) VALUES ($1, $2) RETURNING {SERIES_COLUMNS}"
        ))
        .bind(fields.title)
        .bind(fields.description)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create_series"))
    }

    async fn update_series(&self, id: i64, fields: SeriesFields) -> RepoResult<Option<Series>> {
        sqlx::query_as::<_, Series>(&format!(
            "UPDATE series SET title = $2, description = $3, updated_at = NOW() WHERE id = $1 RETURNING {SERIES_COLUMNS}"
        ))
        .bind(id)
        .bind(fields.title)
        .bind(fields.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update_series"))
    }

    async fn delete_series(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM series WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_series"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn videos_in_series(&self, id: i64) -> RepoResult<Vec<Video>> {
        sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE series_id = $1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("videos_in_series"))
    }

    // --- VIDEOS ---

    async fn list_videos(&self) -> RepoResult<Vec<Video>> {
        sqlx::query_as::<_, Video>(&format!("SELECT {VIDEO_COLUMNS} FROM videos ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_videos"))
    }

    async fn get_video(&self, id: i64) -> RepoResult<Option<Video>> {
        sqlx::query_as::<_, Video>(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_video"))
    }

    async fn create_video(&self, fields: VideoFields, user_id: Option<i64>) -> RepoResult<Video> {
        sqlx::query_as::<_, Video>(&format!(
            r#"
            INSERT INTO videos (title, description, url, user_id, series_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {VIDEO_COLUMNS}
            "#
        ))
        .bind(fields.title)
        .bind(fields.description)
        .bind(fields.url)
        .bind(user_id)
        .bind(fields.series_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create_video"))
    }

    async fn update_video(&self, id: i64, fields: VideoFields) -> RepoResult<Option<Video>> {
        sqlx::query_as::<_, Video>(&format!(
            r#"
            UPDATE videos
            SET title = $2, description = $3, url = $4, series_id = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {VIDEO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(fields.title)
        .bind(fields.description)
        .bind(fields.url)
        .bind(fields.series_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update_video"))
    }

    async fn delete_video(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_video"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn tested_by(&self, video_id: i64) -> RepoResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.name, u.email, u.created_at, u.updated_at
            FROM video_tested_by t
            JOIN users u ON u.id = t.user_id
            WHERE t.video_id = $1
            ORDER BY t.created_at, u.id
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("tested_by"))
    }

    async fn mark_tested(&self, video_id: i64, user_id: i64) -> RepoResult<bool> {
        let res = sqlx::query(
            "INSERT INTO video_tested_by (video_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(video_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("mark_tested"))?;
        Ok(res.rows_affected() > 0)
    }
}
