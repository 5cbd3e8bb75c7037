use reqwest::{
    Method, StatusCode,
    header::{self, HeaderMap},
    redirect,
};
use serde::{Serialize, de::DeserializeOwned};

use super::{ClientError, Navigation, Session};
use crate::{
    flash::Flash,
    models::{LoginRequest, Profile, RegisterRequest, TokenResponse},
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// ApiResponse
///
/// A non-401 answer from the server. Mutations answer redirects, so the target and
/// the flash message are surfaced alongside the raw body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub flash: Option<Flash>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    /// Fails with `ClientError::Status` for 4xx/5xx answers, using the server's
    /// `message` field when there is one.
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if !(self.status.is_client_error() || self.status.is_server_error()) {
            return Ok(self);
        }
        let message = serde_json::from_slice::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|v| v.get("message")?.as_str().map(str::to_string))
            .unwrap_or_else(|| String::from_utf8_lossy(&self.body).into_owned());
        Err(ClientError::Status {
            status: self.status.as_u16(),
            message,
        })
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// ApiClient
///
/// HTTP client bound to one server and one `Session`. Every request carries
/// `Accept: application/json` and, when a token is stored, `Authorization: Bearer`.
/// A 401 clears the stored token and surfaces as `ClientError::Unauthenticated`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(session: Session) -> Result<Self, ClientError> {
        Self::with_base_url(DEFAULT_BASE_URL, session)
    }

    pub fn with_base_url(base_url: &str, session: Session) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            // Redirects carry the flash message; following them would drop it.
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// send
    ///
    /// Issues one request. `path` is relative to the base URL.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse, ClientError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(%method, %url, status = status.as_u16(), "api response");

        if status == StatusCode::UNAUTHORIZED {
            self.session.clear()?;
            tracing::info!("token rejected, cleared the session");
            return Err(ClientError::Unauthenticated(Navigation::Login));
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let flash = Flash::from_headers(response.headers());
        let body = response.bytes().await?.to_vec();
        Ok(ApiResponse {
            status,
            location,
            flash,
            body,
        })
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.send::<()>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ClientError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ClientError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.send::<()>(Method::DELETE, path, None).await
    }

    /// GET returning the decoded JSON body; 4xx/5xx become `ClientError::Status`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.get(path).await?.error_for_status()?.json()
    }

    /// Logs in and stores the issued token in the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ClientError> {
        let payload = LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        let token: TokenResponse = self.post("/login", &payload).await?.error_for_status()?.json()?;
        self.session.set_token(&token.token)?;
        Ok(token)
    }

    /// Registers a new account and logs it in.
    pub async fn register(&self, payload: &RegisterRequest) -> Result<TokenResponse, ClientError> {
        let token: TokenResponse = self.post("/register", payload).await?.error_for_status()?.json()?;
        self.session.set_token(&token.token)?;
        Ok(token)
    }

    /// Forgets the token locally. Tokens are stateless, so the server is not told.
    pub fn logout(&self) -> Result<(), ClientError> {
        Ok(self.session.clear()?)
    }

    pub async fn me(&self) -> Result<Profile, ClientError> {
        self.get_json("/me").await
    }

    /// Backs the test-connection view.
    pub async fn health(&self) -> Result<bool, ClientError> {
        Ok(self.get("/health").await?.status.is_success())
    }
}
