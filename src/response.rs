//! Replies returned by resources and the HTTP response built from them.

use crate::error::RestError;
use crate::renderers::Renderer;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// Content returned by a resource method, rendered by the negotiated renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
    /// Sent as the `Location` header (redirect-after-write).
    pub location: Option<String>,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply {
            status: StatusCode::OK,
            body,
            location: None,
        }
    }

    pub fn created(body: Value) -> Self {
        Reply {
            status: StatusCode::CREATED,
            body,
            location: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// What a resource method hands back; `Ok(None)` means there is nothing to render.
pub type ResourceResult = Result<Option<Reply>, RestError>;

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Render `reply` and apply its status, `Location` and the view's `Cache-Control`.
pub fn render_reply(
    reply: &Reply,
    renderer: &dyn Renderer,
    http_cache: Option<u32>,
) -> Result<Response, RestError> {
    let mut response = renderer.render(&reply.body)?;
    *response.status_mut() = reply.status;
    if let Some(location) = &reply.location {
        let value = HeaderValue::from_str(location)
            .map_err(|_| RestError::Internal(format!("invalid Location: {}", location)))?;
        response.headers_mut().insert(header::LOCATION, value);
    }
    set_cache_control(&mut response, http_cache);
    Ok(response)
}

pub fn set_cache_control(response: &mut Response, http_cache: Option<u32>) {
    if let Some(seconds) = http_cache {
        if let Ok(v) = HeaderValue::from_str(&format!("max-age={}", seconds)) {
            response.headers_mut().insert(header::CACHE_CONTROL, v);
        }
    }
}

/// Drop the body of a response to a HEAD request, keeping status and headers.
pub fn strip_body(response: Response) -> Response {
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, Body::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderers::JsonRenderer;
    use serde_json::json;

    #[test]
    fn applies_status_location_and_cache() {
        let reply = Reply::created(json!({"item": {"id": 1}})).with_location("/things/1");
        let response = render_reply(&reply, &JsonRenderer, Some(0)).unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "/things/1");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=0");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn no_cache_header_without_http_cache() {
        let response = render_reply(&Reply::ok(json!({})), &JsonRenderer, None).unwrap();
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }
}
