use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod flash;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod seed;
pub mod storage;

// Typed HTTP client, token persistence and the frontend route guard.
pub mod client;

// Module for routing segregation (Public, Authenticated, Manage).
pub mod routes;
use auth::AuthUser;
use handlers::{series, session, users, videos};
use routes::{authenticated, manage, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        session::login, session::register, session::get_me,
        videos::list_videos, videos::show_video, videos::manage_videos,
        videos::create_video_form, videos::store_video, videos::edit_video_form,
        videos::update_video, videos::destroy_video, videos::video_tested_by,
        videos::mark_video_tested, videos::request_video_upload,
        series::list_series, series::show_series, series::manage_series,
        series::create_series_form, series::store_series, series::edit_series_form,
        series::update_series, series::destroy_series,
        users::manage_users, users::show_user, users::create_user_form,
        users::store_user, users::edit_user_form, users::update_user,
        users::destroy_user
    ),
    components(
        schemas(
            models::User, models::Video, models::Series, models::SeriesWithVideos,
            models::VideoRequest, models::SeriesRequest, models::CreateUserRequest,
            models::UpdateUserRequest, models::RegisterRequest, models::LoginRequest,
            models::UploadRequest, models::UploadResponse, models::TokenResponse,
            models::Profile, models::VideoCreateForm, models::VideoEditForm,
            models::UserCreateForm, models::UserDetail,
            gate::Access, gate::Role, gate::Permission,
        )
    ),
    tags(
        (name = "videos-app", description = "Video catalogue API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, immutable container for the services every request needs.
#[derive(Clone)]
pub struct AppState {
    /// Postgres in production, an in-memory store in tests.
    pub repo: RepositoryState,
    /// Object storage for uploaded video files.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects anonymous requests before they reach the wrapped routes. The resolved
/// `AuthUser` is stored in the request extensions, so handlers extracting it again
/// do not hit the repository a second time.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies the scoped and global middleware and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any)
        // The client reads flash messages and redirect targets from these.
        .expose_headers([
            flash::FLASH_KIND_HEADER,
            flash::FLASH_MESSAGE_HEADER,
            axum::http::header::LOCATION,
        ]);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Permission checks happen inside the handlers, after this layer.
        .merge(
            manage::manage_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with its `x-request-id` so every log line of the
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
