#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use restler::{load_from_str, resolve, Configurator, MemoryStore, RestlerConfig, Row, Settings};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const CONFIG: &str = r#"{
    "models": [{
        "id": "thing",
        "table": "things",
        "primary_key": "id",
        "columns": [
            {"name": "id", "type": "serial", "nullable": false},
            {"name": "value", "type": "text", "nullable": false},
            {"name": "rating", "type": "int4"}
        ]
    }],
    "resources": [
        {
            "kind": "container",
            "model": "thing",
            "renderers": ["json", "csv"],
            "location_route": "thing.item",
            "pagination": {"default_page_size": 2}
        },
        {"kind": "item", "model": "thing"}
    ]
}"#;

pub fn config() -> RestlerConfig {
    load_from_str(CONFIG).unwrap()
}

/// Five things: ids 1..=5, one with a null rating.
pub async fn seeded_store(config: &RestlerConfig) -> MemoryStore {
    let resolved = resolve(config).unwrap();
    let model = resolved.model("thing").unwrap();
    let rows: Vec<Row> = [
        json!({"id": 1, "value": "alpha", "rating": 5}),
        json!({"id": 2, "value": "beta", "rating": 3}),
        json!({"id": 3, "value": "gamma", "rating": null}),
        json!({"id": 4, "value": "delta", "rating": 3}),
        json!({"id": 5, "value": "epsilon", "rating": 1}),
    ]
    .into_iter()
    .map(|v| v.as_object().unwrap().clone())
    .collect();
    let store = MemoryStore::new();
    store.seed(model, rows).await.unwrap();
    store
}

/// Router over the seeded store with the configured resources; `customize` runs before
/// the router is built.
pub async fn app_with(settings: Settings, customize: impl FnOnce(&mut Configurator)) -> Router {
    let mut config = config();
    config.settings = settings;
    app_from(config, customize).await
}

/// Like [`app_with`] for an edited copy of [`CONFIG`].
pub async fn app_from(config: RestlerConfig, customize: impl FnOnce(&mut Configurator)) -> Router {
    let store = seeded_store(&config).await;
    let mut configurator = Configurator::new(Arc::new(store), config.settings.clone());
    configurator.include_config(&config).unwrap();
    customize(&mut configurator);
    configurator.into_router()
}

pub async fn app() -> Router {
    app_with(Settings::default(), |_| {}).await
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse { status, headers, body }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn form_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// `filters` as a query-string value.
pub fn filters(value: Value) -> String {
    serde_urlencoded::to_string([("filters", value.to_string())]).unwrap()
}
