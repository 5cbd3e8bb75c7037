use super::Session;
use crate::error::LOGIN_PATH;

/// A view of the client application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRoute {
    pub path: &'static str,
    pub name: &'static str,
    pub requires_auth: bool,
}

pub const ROUTES: [ClientRoute; 6] = [
    ClientRoute {
        path: "/",
        name: "Home",
        requires_auth: true,
    },
    ClientRoute {
        path: "/test-connection",
        name: "TestConnection",
        requires_auth: true,
    },
    ClientRoute {
        path: LOGIN_PATH,
        name: "Login",
        requires_auth: false,
    },
    ClientRoute {
        path: "/upload",
        name: "Upload",
        requires_auth: true,
    },
    ClientRoute {
        path: "/profile",
        name: "Profile",
        requires_auth: true,
    },
    ClientRoute {
        path: "/register",
        name: "Register",
        requires_auth: false,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed,
    Redirect(&'static str),
}

/// Looks a path up in the route table, ignoring any query string or trailing slash.
pub fn find_route(path: &str) -> Option<&'static ClientRoute> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    ROUTES.iter().find(|route| route.path == path)
}

/// before_each
///
/// Guard run before every navigation: views that require a login redirect to the
/// login view when the session holds no token. Unknown paths proceed.
pub fn before_each(path: &str, session: &Session) -> NavigationDecision {
    match find_route(path) {
        Some(route) if route.requires_auth && !session.is_authenticated() => {
            tracing::debug!(path, "navigation blocked, no token");
            NavigationDecision::Redirect(LOGIN_PATH)
        }
        _ => NavigationDecision::Proceed,
    }
}
