//! Client side of the videos app: bearer-token persistence, a typed HTTP client
//! that attaches the token and reacts to 401s, and the route guard deciding which
//! views need a logged-in user.

pub mod api;
pub mod router;
pub mod token_store;

use thiserror::Error;

pub use api::{ApiClient, ApiResponse, DEFAULT_BASE_URL};
pub use router::{ClientRoute, NavigationDecision, ROUTES, before_each};
pub use token_store::{FileTokenStore, MemoryTokenStore, Session, TOKEN_KEY, TokenStore};

/// Where the client must send the user after a request outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Login,
}

impl Navigation {
    pub fn path(self) -> &'static str {
        match self {
            Navigation::Login => crate::error::LOGIN_PATH,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the stored token (or there was none). The token has been
    /// cleared; the caller should navigate to the login view.
    #[error("unauthenticated, navigate to {}", .0.path())]
    Unauthenticated(Navigation),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("token store failure: {0}")]
    TokenStore(#[from] std::io::Error),
}
