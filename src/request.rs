//! The request as resources see it: method, matched route, query params, body and shared state.

use crate::error::RestError;
use crate::params::QueryParams;
use crate::routing::RouteUrls;
use crate::settings::Settings;
use crate::state::AppState;
use crate::store::Store;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ResourceRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: QueryParams,
    matchdict: BTreeMap<String, String>,
    route_name: Option<String>,
    principals: Vec<String>,
    state: AppState,
    urls: RouteUrls,
}

impl ResourceRequest {
    pub fn new(method: Method, uri: Uri, state: AppState) -> Result<Self, RestError> {
        let params = QueryParams::parse(uri.query().unwrap_or(""))?;
        Ok(ResourceRequest {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params,
            matchdict: BTreeMap::new(),
            route_name: None,
            principals: vec![crate::acl::EVERYONE.to_string()],
            state,
            urls: RouteUrls::default(),
        })
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn with_json(self, value: &Value) -> Self {
        self.with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(Bytes::from(value.to_string()))
    }

    pub fn with_form(self, pairs: &[(&str, &str)]) -> Self {
        let encoded = serde_urlencoded::to_string(pairs).unwrap_or_default();
        self.with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        )
        .with_body(Bytes::from(encoded))
    }

    pub fn with_matchdict<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.matchdict = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub(crate) fn with_route(mut self, name: &str, urls: RouteUrls) -> Self {
        self.route_name = Some(name.to_string());
        self.urls = urls;
        self
    }

    pub fn with_principals(mut self, principals: Vec<String>) -> Self {
        self.principals = principals;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Query-string parameters.
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Values captured by the route pattern.
    pub fn matchdict(&self) -> &BTreeMap<String, String> {
        &self.matchdict
    }

    pub fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    pub fn principals(&self) -> &[String] {
        &self.principals
    }

    pub fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Media type of the body without parameters (`application/json; charset=utf-8` → `application/json`).
    pub fn content_type(&self) -> Option<String> {
        self.header(header::CONTENT_TYPE.as_str())
            .and_then(|v| v.parse::<mime::Mime>().ok())
            .map(|m| m.essence_str().to_string())
    }

    /// Path of a named route, e.g. `route_url("thing.item", &[("id", "4")])`.
    pub fn route_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, RestError> {
        self.urls.url(name, params)
    }

    /// Request data from a form or JSON body, with the CSRF token field removed.
    pub fn extract_data(&self) -> Result<Map<String, Value>, RestError> {
        let content_type = self.content_type().unwrap_or_default();
        let mut data = match content_type.as_str() {
            "application/x-www-form-urlencoded" => {
                let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&self.body)
                    .map_err(|e| RestError::BadRequest(format!("Malformed form body: {}", e)))?;
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect::<Map<String, Value>>()
            }
            "application/json" => {
                if self.body.is_empty() {
                    Map::new()
                } else {
                    match serde_json::from_slice::<Value>(&self.body) {
                        Ok(Value::Object(m)) => m,
                        Ok(_) => {
                            return Err(RestError::BadRequest("JSON body must be an object".into()))
                        }
                        Err(e) => {
                            return Err(RestError::BadRequest(format!("Malformed JSON body: {}", e)))
                        }
                    }
                }
            }
            other => {
                return Err(RestError::UnsupportedMediaType(format!(
                    "Cannot extract data for content type: {}",
                    other
                )))
            }
        };
        if let Some(token) = &self.settings().csrf_token_name {
            data.remove(token);
        }
        Ok(data)
    }
}

/// Shared pieces a dispatcher needs to build [`ResourceRequest`]s.
#[derive(Clone, Debug)]
pub(crate) struct RequestContext {
    pub state: AppState,
    pub urls: RouteUrls,
}

impl RequestContext {
    pub fn new(state: AppState, urls: RouteUrls) -> Arc<Self> {
        Arc::new(RequestContext { state, urls })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::store::MemoryStore;

    fn state(settings: Settings) -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), settings)
    }

    fn request(settings: Settings) -> ResourceRequest {
        ResourceRequest::new(Method::POST, Uri::from_static("/things?x=1"), state(settings)).unwrap()
    }

    #[test]
    fn parses_query() {
        let req = request(Settings::default());
        assert_eq!(req.params().get("x"), Some("1"));
        assert_eq!(req.path(), "/things");
    }

    #[test]
    fn extracts_form_data() {
        let req = request(Settings::default()).with_form(&[("value", "four"), ("id", "4")]);
        let data = req.extract_data().unwrap();
        assert_eq!(data["value"], "four");
        assert_eq!(data["id"], "4");
    }

    #[test]
    fn extracts_json_data_and_strips_csrf_token() {
        let settings = Settings {
            csrf_token_name: Some("csrf_token".into()),
            ..Settings::default()
        };
        let req = request(settings).with_json(&serde_json::json!({"value": 4, "csrf_token": "abc"}));
        let data = req.extract_data().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data["value"], 4);
    }

    #[test]
    fn json_charset_parameter_is_ignored() {
        let req = request(Settings::default())
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            )
            .with_body(Bytes::from_static(b"{}"));
        assert!(req.extract_data().unwrap().is_empty());
    }

    #[test]
    fn rejects_other_content_types() {
        let req = request(Settings::default())
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .with_body(Bytes::from_static(b"value"));
        assert!(matches!(req.extract_data(), Err(RestError::UnsupportedMediaType(_))));
    }

    #[test]
    fn rejects_non_object_json() {
        let req = request(Settings::default()).with_json(&serde_json::json!([1, 2]));
        assert!(matches!(req.extract_data(), Err(RestError::BadRequest(_))));
    }
}
