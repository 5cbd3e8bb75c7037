use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

pub const FLASH_KIND_HEADER: HeaderName = HeaderName::from_static("x-flash-kind");
pub const FLASH_MESSAGE_HEADER: HeaderName = HeaderName::from_static("x-flash-message");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

/// Flash
///
/// One-shot status indicator attached to the redirect that follows a mutation.
/// Carried on the redirect response itself, so it is seen exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// Reads the indicator back from a redirect's headers.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let kind = match headers.get(FLASH_KIND_HEADER)?.to_str().ok()? {
            "success" => FlashKind::Success,
            "error" => FlashKind::Error,
            _ => return None,
        };
        let message = headers
            .get(FLASH_MESSAGE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Some(Self { kind, message })
    }
}

/// FlashRedirect
///
/// `302 Found` to another route of the application, optionally carrying a flash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashRedirect {
    pub to: String,
    pub flash: Option<Flash>,
}

impl FlashRedirect {
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            to: path.into(),
            flash: None,
        }
    }

    pub fn with(mut self, flash: Flash) -> Self {
        self.flash = Some(flash);
        self
    }
}

impl IntoResponse for FlashRedirect {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        match HeaderValue::try_from(self.to.as_str()) {
            Ok(location) => {
                headers.insert(header::LOCATION, location);
            }
            Err(e) => {
                tracing::error!("unrepresentable redirect target {:?}: {}", self.to, e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
        if let Some(flash) = self.flash {
            headers.insert(
                FLASH_KIND_HEADER,
                HeaderValue::from_static(flash.kind.as_str()),
            );
            // Messages are fixed ASCII strings; anything else is dropped rather than mangled.
            if let Ok(message) = HeaderValue::try_from(flash.message) {
                headers.insert(FLASH_MESSAGE_HEADER, message);
            }
        }
        (StatusCode::FOUND, headers).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_carries_location_and_flash() {
        let response = FlashRedirect::to("/videos/manage")
            .with(Flash::success("Video created successfully."))
            .into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/videos/manage");
        assert_eq!(
            Flash::from_headers(response.headers()),
            Some(Flash::success("Video created successfully."))
        );
    }

    #[test]
    fn plain_redirect_has_no_flash() {
        let response = FlashRedirect::to("/series/manage").into_response();
        assert_eq!(Flash::from_headers(response.headers()), None);
    }
}
