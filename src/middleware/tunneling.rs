//! Method override for clients that can only send GET and POST.
//!
//! A POST carrying the override (query parameter, then form field, then header) is
//! rewritten to the requested method before routing, and the override is removed so
//! resources never see it.

use crate::configurator::TunnelingOptions;
use crate::error::RestError;
use crate::params::QueryParams;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, request::Parts, HeaderValue, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

pub struct TunnelState {
    options: TunnelingOptions,
    body_limit: usize,
    disallowed: String,
}

impl TunnelState {
    pub fn new(options: TunnelingOptions, body_limit: usize) -> Self {
        let mut allowed: Vec<&str> = options.allowed_methods.iter().map(Method::as_str).collect();
        allowed.sort_unstable();
        let disallowed = format!("Only these methods may be tunneled over POST: {:?}.", allowed);
        TunnelState {
            options,
            body_limit,
            disallowed,
        }
    }

    fn check(&self, requested: &str) -> Result<Method, RestError> {
        self.options
            .allowed_methods
            .iter()
            .find(|m| m.as_str() == requested)
            .cloned()
            .ok_or_else(|| {
                tracing::warn!(method = %requested, "rejected tunneled method");
                RestError::BadRequest(self.disallowed.clone())
            })
    }
}

pub async fn tunnel_post(State(state): State<Arc<TunnelState>>, request: Request, next: Next) -> Response {
    match tunnel(&state, request).await {
        Ok(request) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

fn is_form(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .map(|m| m.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str())
        .unwrap_or(false)
}

fn replace_query(uri: &Uri, query: &QueryParams) -> Result<Uri, RestError> {
    let qs = query.to_query_string();
    let path_and_query = if qs.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), qs)
    };
    let mut uri_parts = uri.clone().into_parts();
    uri_parts.path_and_query = Some(
        path_and_query
            .parse()
            .map_err(|e| RestError::BadRequest(format!("invalid URI: {}", e)))?,
    );
    Uri::from_parts(uri_parts).map_err(|e| RestError::BadRequest(format!("invalid URI: {}", e)))
}

async fn tunnel(state: &TunnelState, request: Request) -> Result<Request, RestError> {
    if request.method() != Method::POST {
        return Ok(request);
    }
    let options = &state.options;
    let (mut parts, body) = request.into_parts();

    let mut query = QueryParams::parse(parts.uri.query().unwrap_or(""))?;
    let from_query = query.get(&options.param_name).map(str::to_string);

    // Only form posts are buffered; any other body passes through untouched.
    let (mut form, body) = if is_form(&parts) {
        let bytes = axum::body::to_bytes(body, state.body_limit)
            .await
            .map_err(|e| RestError::PayloadTooLarge(e.to_string()))?;
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&bytes)
            .map_err(|e| RestError::BadRequest(format!("invalid form body: {}", e)))?;
        (Some(pairs), Body::from(bytes))
    } else {
        (None, body)
    };
    let from_form = form
        .as_ref()
        .and_then(|pairs| pairs.iter().find(|(k, _)| *k == options.param_name))
        .map(|(_, v)| v.clone());
    let from_header = parts
        .headers
        .get(options.header_name.as_str())
        .map(|v| v.to_str().map(str::to_string).unwrap_or_default());

    let Some(requested) = from_query.or(from_form).or(from_header) else {
        return Ok(Request::from_parts(parts, body));
    };
    let method = state.check(&requested)?;
    tracing::debug!(method = %method, path = %parts.uri.path(), "tunneled request");

    if query.remove(&options.param_name) {
        parts.uri = replace_query(&parts.uri, &query)?;
    }
    parts.headers.remove(options.header_name.as_str());
    parts.method = method;

    let body = match form.as_mut() {
        Some(pairs) if pairs.iter().any(|(k, _)| *k == options.param_name) => {
            pairs.retain(|(k, _)| *k != options.param_name);
            let encoded = serde_urlencoded::to_string(&*pairs)
                .map_err(|e| RestError::Internal(format!("form encode: {}", e)))?;
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(encoded.len()));
            Body::from(Bytes::from(encoded))
        }
        _ => body,
    };
    Ok(Request::from_parts(parts, body))
}
