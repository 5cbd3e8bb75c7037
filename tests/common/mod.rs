#![allow(dead_code)]

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use videos_app::{
    AppConfig, AppState, MockStorageService, create_router,
    auth::DEV_USER_HEADER,
    gate::{Access, Permission, Role},
    models::{
        NewUser, Series, SeriesFields, User, UserChanges, UserCredentials, Video, VideoFields,
    },
    repository::{RepoResult, Repository, RepositoryError, RepositoryState},
    storage::StorageState,
};

// --- IN-MEMORY REPOSITORY ---

#[derive(Default)]
struct Store {
    next_id: i64,
    users: BTreeMap<i64, (User, String)>,
    role_permissions: BTreeMap<Role, BTreeSet<Permission>>,
    user_roles: BTreeMap<i64, BTreeSet<Role>>,
    user_permissions: BTreeMap<i64, BTreeSet<Permission>>,
    // Names outside the closed enums, as a hand-edited table could hold them.
    raw_permissions: BTreeMap<i64, Vec<String>>,
    series: BTreeMap<i64, Series>,
    videos: BTreeMap<i64, Video>,
    tested: BTreeSet<(i64, i64)>,
}

impl Store {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// MemoryRepo
///
/// `Repository` over maps behind a mutex, with the same null-on-delete behaviour as
/// the Postgres schema. `fail_creates` and `fail_grants` simulate write failures;
/// `conflict_on_email` makes user writes lose a unique-email race.
#[derive(Default)]
pub struct MemoryRepo {
    store: Mutex<Store>,
    pub fail_creates: AtomicBool,
    pub fail_grants: AtomicBool,
    pub conflict_on_email: AtomicBool,
}

fn simulated_failure() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolClosed)
}

impl MemoryRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    pub fn fail_grants(&self) {
        self.fail_grants.store(true, Ordering::SeqCst);
    }

    pub fn conflict_on_email(&self) {
        self.conflict_on_email.store(true, Ordering::SeqCst);
    }

    /// Inserts a user directly, bypassing hashing.
    pub fn add_user(&self, name: &str, roles: &[Role], permissions: &[Permission]) -> User {
        self.add_user_with_hash(name, "not-a-real-hash", roles, permissions)
    }

    pub fn add_user_with_hash(
        &self,
        name: &str,
        password_hash: &str,
        roles: &[Role],
        permissions: &[Permission],
    ) -> User {
        let mut store = self.store.lock().unwrap();
        let id = store.id();
        let now = Utc::now();
        let user = User {
            id,
            name: name.to_string(),
            email: format!("{}@videosapp.test", name.to_lowercase().replace(' ', ".")),
            created_at: now,
            updated_at: now,
        };
        store
            .users
            .insert(id, (user.clone(), password_hash.to_string()));
        store.user_roles.insert(id, roles.iter().copied().collect());
        store
            .user_permissions
            .insert(id, permissions.iter().copied().collect());
        user
    }

    pub fn grant_raw_permission(&self, user_id: i64, name: &str) {
        let mut store = self.store.lock().unwrap();
        store
            .raw_permissions
            .entry(user_id)
            .or_default()
            .push(name.to_string());
    }

    pub fn add_series(&self, title: &str) -> Series {
        let mut store = self.store.lock().unwrap();
        let id = store.id();
        let now = Utc::now();
        let series = Series {
            id,
            title: title.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        store.series.insert(id, series.clone());
        series
    }

    pub fn add_video(&self, title: &str, user_id: Option<i64>, series_id: Option<i64>) -> Video {
        let mut store = self.store.lock().unwrap();
        let id = store.id();
        let now = Utc::now();
        let video = Video {
            id,
            title: title.to_string(),
            description: format!("About {title}"),
            url: format!("https://videos.test/{id}"),
            user_id,
            series_id,
            created_at: now,
            updated_at: now,
        };
        store.videos.insert(id, video.clone());
        video
    }

    pub fn videos(&self) -> Vec<Video> {
        self.store.lock().unwrap().videos.values().cloned().collect()
    }

    pub fn users(&self) -> Vec<User> {
        self.store
            .lock()
            .unwrap()
            .users
            .values()
            .map(|(u, _)| u.clone())
            .collect()
    }

    pub fn series(&self) -> Vec<Series> {
        self.store.lock().unwrap().series.values().cloned().collect()
    }

    pub fn password_hash(&self, user_id: i64) -> Option<String> {
        self.store
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .map(|(_, hash)| hash.clone())
    }
}

#[async_trait]
impl Repository for MemoryRepo {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.store.lock().unwrap().users.get(&id).map(|(u, _)| u.clone()))
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .users
            .values()
            .find(|(u, _)| u.email.eq_ignore_ascii_case(email))
            .map(|(u, hash)| UserCredentials {
                id: u.id,
                password_hash: hash.clone(),
            }))
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> RepoResult<bool> {
        let store = self.store.lock().unwrap();
        Ok(store
            .users
            .values()
            .any(|(u, _)| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except))
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.users())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        if self.conflict_on_email.load(Ordering::SeqCst) {
            return Err(RepositoryError::Conflict("create_user".to_string()));
        }
        let mut store = self.store.lock().unwrap();
        let id = store.id();
        let now = Utc::now();
        let created = User {
            id,
            name: user.name,
            email: user.email,
            created_at: now,
            updated_at: now,
        };
        store
            .users
            .insert(id, (created.clone(), user.password_hash));
        Ok(created)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        if self.conflict_on_email.load(Ordering::SeqCst) {
            return Err(RepositoryError::Conflict("update_user".to_string()));
        }
        let mut store = self.store.lock().unwrap();
        let Some((user, hash)) = store.users.get_mut(&id) else {
            return Ok(None);
        };
        user.name = changes.name;
        user.email = changes.email;
        user.updated_at = Utc::now();
        if let Some(new_hash) = changes.password_hash {
            *hash = new_hash;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        if store.users.remove(&id).is_none() {
            return Ok(false);
        }
        store.user_roles.remove(&id);
        store.user_permissions.remove(&id);
        store.raw_permissions.remove(&id);
        store.tested.retain(|(_, user_id)| *user_id != id);
        for video in store.videos.values_mut() {
            if video.user_id == Some(id) {
                video.user_id = None;
            }
        }
        Ok(true)
    }

    async fn get_access(&self, user_id: i64) -> RepoResult<Access> {
        let store = self.store.lock().unwrap();
        let roles = store.user_roles.get(&user_id).cloned().unwrap_or_default();
        let mut permissions: Vec<String> = store
            .user_permissions
            .get(&user_id)
            .into_iter()
            .flatten()
            .map(|p| p.as_str().to_string())
            .collect();
        for role in &roles {
            if let Some(granted) = store.role_permissions.get(role) {
                permissions.extend(granted.iter().map(|p| p.as_str().to_string()));
            }
        }
        permissions.extend(
            store
                .raw_permissions
                .get(&user_id)
                .cloned()
                .unwrap_or_default(),
        );
        Ok(Access::from_names(
            roles.iter().map(|r| r.as_str()),
            permissions,
        ))
    }

    async fn set_user_roles(&self, user_id: i64, roles: &[Role]) -> RepoResult<()> {
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        let mut store = self.store.lock().unwrap();
        store
            .user_roles
            .insert(user_id, roles.iter().copied().collect());
        Ok(())
    }

    async fn set_user_permissions(
        &self,
        user_id: i64,
        permissions: &[Permission],
    ) -> RepoResult<()> {
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        let mut store = self.store.lock().unwrap();
        store
            .user_permissions
            .insert(user_id, permissions.iter().copied().collect());
        Ok(())
    }

    async fn define_role(&self, role: Role, permissions: &[Permission]) -> RepoResult<()> {
        let mut store = self.store.lock().unwrap();
        store
            .role_permissions
            .insert(role, permissions.iter().copied().collect());
        Ok(())
    }

    async fn list_series(&self) -> RepoResult<Vec<Series>> {
        Ok(self.series())
    }

    async fn get_series(&self, id: i64) -> RepoResult<Option<Series>> {
        Ok(self.store.lock().unwrap().series.get(&id).cloned())
    }

    async fn series_exists(&self, id: i64) -> RepoResult<bool> {
        Ok(self.store.lock().unwrap().series.contains_key(&id))
    }

    async fn create_series(&self, fields: SeriesFields) -> RepoResult<Series> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        let mut store = self.store.lock().unwrap();
        let id = store.id();
        let now = Utc::now();
        let series = Series {
            id,
            title: fields.title,
            description: fields.description,
            created_at: now,
            updated_at: now,
        };
        store.series.insert(id, series.clone());
        Ok(series)
    }

    async fn update_series(&self, id: i64, fields: SeriesFields) -> RepoResult<Option<Series>> {
        let mut store = self.store.lock().unwrap();
        let Some(series) = store.series.get_mut(&id) else {
            return Ok(None);
        };
        series.title = fields.title;
        series.description = fields.description;
        series.updated_at = Utc::now();
        Ok(Some(series.clone()))
    }

    async fn delete_series(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        if store.series.remove(&id).is_none() {
            return Ok(false);
        }
        for video in store.videos.values_mut() {
            if video.series_id == Some(id) {
                video.series_id = None;
            }
        }
        Ok(true)
    }

    async fn videos_in_series(&self, id: i64) -> RepoResult<Vec<Video>> {
        Ok(self
            .videos()
            .into_iter()
            .filter(|v| v.series_id == Some(id))
            .collect())
    }

    async fn list_videos(&self) -> RepoResult<Vec<Video>> {
        Ok(self.videos())
    }

    async fn get_video(&self, id: i64) -> RepoResult<Option<Video>> {
        Ok(self.store.lock().unwrap().videos.get(&id).cloned())
    }

    async fn create_video(&self, fields: VideoFields, user_id: Option<i64>) -> RepoResult<Video> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        let mut store = self.store.lock().unwrap();
        let id = store.id();
        let now = Utc::now();
        let video = Video {
            id,
            title: fields.title,
            description: fields.description,
            url: fields.url,
            user_id,
            series_id: fields.series_id,
            created_at: now,
            updated_at: now,
        };
        store.videos.insert(id, video.clone());
        Ok(video)
    }

    async fn update_video(&self, id: i64, fields: VideoFields) -> RepoResult<Option<Video>> {
        let mut store = self.store.lock().unwrap();
        let Some(video) = store.videos.get_mut(&id) else {
            return Ok(None);
        };
        video.title = fields.title;
        video.description = fields.description;
        video.url = fields.url;
        video.series_id = fields.series_id;
        video.updated_at = Utc::now();
        Ok(Some(video.clone()))
    }

    async fn delete_video(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        store.tested.retain(|(video_id, _)| *video_id != id);
        Ok(store.videos.remove(&id).is_some())
    }

    async fn tested_by(&self, video_id: i64) -> RepoResult<Vec<User>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .tested
            .iter()
            .filter(|(v, _)| *v == video_id)
            .filter_map(|(_, u)| store.users.get(u).map(|(user, _)| user.clone()))
            .collect())
    }

    async fn mark_tested(&self, video_id: i64, user_id: i64) -> RepoResult<bool> {
        Ok(self.store.lock().unwrap().tested.insert((video_id, user_id)))
    }
}

// --- APP SCAFFOLDING ---

pub fn state_with(repo: Arc<MemoryRepo>, storage: MockStorageService) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        storage: Arc::new(storage) as StorageState,
        config: AppConfig::default(),
    }
}

pub fn app(repo: Arc<MemoryRepo>) -> Router {
    create_router(state_with(repo, MockStorageService::new()))
}

/// Role bundles as the seeder defines them.
pub async fn define_default_roles(repo: &MemoryRepo) {
    for role in Role::ALL {
        repo.define_role(role, role.default_permissions())
            .await
            .unwrap();
    }
}

// --- REQUEST HELPERS ---

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Messages of the 422 body for `field`.
    pub fn field_errors(&self, field: &str) -> Vec<String> {
        self.body["errors"][field]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Builds a request; `as_user` sets the local-mode identity header.
pub fn request(method: Method, uri: &str, as_user: Option<i64>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = as_user {
        builder = builder.header(DEV_USER_HEADER, id.to_string());
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    TestResponse {
        status,
        headers,
        body,
    }
}
