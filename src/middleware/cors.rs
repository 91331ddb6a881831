//! Permissive CORS: every origin is allowed. Meant for development.
//!
//! Responses that already carry `Access-Control-*` headers are left alone, so a resource
//! can handle CORS itself.

use crate::response::no_content;
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};

fn has_cors_headers(headers: &HeaderMap) -> bool {
    headers.keys().any(|name| name.as_str().starts_with("access-control"))
}

pub async fn add_cors_headers(request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .and_then(|o| HeaderValue::from_str(o).ok());
    let is_options = request.method() == Method::OPTIONS;
    let preflight = is_options && has_cors_headers(request.headers());

    let mut response = next.run(request).await;
    let Some(origin) = origin else {
        return response;
    };
    if has_cors_headers(response.headers()) {
        return response;
    }

    if is_options {
        if !preflight {
            return response;
        }
        // No resource answers OPTIONS; the preflight itself succeeds.
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED
        ) {
            response = no_content();
        }
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("*"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    } else {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, routing::get, Router};
    use tower::ServiceExt;

    async fn handled() -> Response {
        let mut response = Response::new(Body::empty());
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://mine.example"),
        );
        response
    }

    fn app() -> Router {
        Router::new()
            .route("/things", get(|| async { "ok" }))
            .route("/handled", get(handled))
            .layer(axum::middleware::from_fn(add_cors_headers))
    }

    #[tokio::test]
    async fn simple_request_gets_origin() {
        let request = HttpRequest::get("/things")
            .header(header::ORIGIN, "https://app.example")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).is_none());
    }

    #[tokio::test]
    async fn no_origin_no_headers() {
        let request = HttpRequest::get("/things").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert!(!has_cors_headers(response.headers()));
    }

    #[tokio::test]
    async fn preflight_is_answered() {
        let request = HttpRequest::options("/things")
            .header(header::ORIGIN, "https://app.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS], "*");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
    }

    #[tokio::test]
    async fn options_without_cors_request_headers_is_untouched() {
        let request = HttpRequest::options("/things")
            .header(header::ORIGIN, "https://app.example")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert!(!has_cors_headers(response.headers()));
    }

    #[tokio::test]
    async fn existing_cors_headers_win() {
        let request = HttpRequest::get("/handled")
            .header(header::ORIGIN, "https://app.example")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://mine.example");
    }
}
