mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use restler::{load_from_str, Configurator, MemoryStore};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn get_item() {
    let app = app().await;
    let response = send(&app, get("/thing/1")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({"item": {"id": 1, "value": "alpha", "rating": 5}}));

    let response = send(&app, get("/thing/1.json")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["item"]["id"], 1);
}

#[tokio::test]
async fn get_item_fields() {
    let app = app().await;
    let response = send(&app, get("/thing/2?fields=value")).await;
    assert_eq!(response.json(), json!({"item": {"value": "beta"}}));
}

#[tokio::test]
async fn missing_item_is_404() {
    let app = app().await;
    let response = send(&app, get("/thing/42")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let body = response.json();
    assert_eq!(body["title"], "Not Found");
    assert_eq!(body["detail"], "No item found for filters: {\"id\":42}");
}

#[tokio::test]
async fn unconvertible_key_is_400() {
    let app = app().await;
    let response = send(&app, get("/thing/abc")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_updates_given_fields() {
    let app = app().await;
    let response = send(&app, json_request("PATCH", "/thing/2", json!({"rating": 4}))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["item"], json!({"id": 2, "value": "beta", "rating": 4}));

    let response = send(&app, json_request("PATCH", "/thing/42", json!({"rating": 4}))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_replaces_existing() {
    let app = app().await;
    let response = send(&app, form_request("PUT", "/thing/3", "value=GAMMA&rating=9")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["item"], json!({"id": 3, "value": "GAMMA", "rating": 9}));
}

#[tokio::test]
async fn put_creates_missing() {
    let app = app().await;
    let response = send(&app, json_request("PUT", "/thing/42", json!({"value": "new"}))).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json()["item"], json!({"id": 42, "value": "new", "rating": null}));

    let response = send(&app, get("/thing/42")).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn delete_returns_row_then_404() {
    let app = app().await;
    let request = Request::delete("/thing/4").body(Body::empty()).unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["item"]["value"], "delta");

    let request = Request::delete("/thing/4").body(Body::empty()).unwrap();
    assert_eq!(send(&app, request).await.status, StatusCode::NOT_FOUND);

    let body = send(&app, get("/thing?page_size=*")).await.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn post_to_item_is_not_allowed() {
    let app = app().await;
    let response = send(&app, json_request("POST", "/thing/1", json!({"value": "x"}))).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.header("allow"), Some("DELETE, GET, PATCH, PUT, HEAD"));

    let request = Request::delete("/thing").body(Body::empty()).unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.header("allow"), Some("GET, POST, HEAD"));
}

async fn tag_app() -> axum::Router {
    let config = load_from_str(
        r#"{
            "models": [{
                "id": "tag",
                "table": "tags",
                "primary_key": "name",
                "columns": [{"name": "name", "type": "text", "nullable": false}]
            }],
            "resources": [
                {"kind": "container", "model": "tag", "location_route": "tag.item"},
                {"kind": "item", "model": "tag"}
            ]
        }"#,
    )
    .unwrap();
    let mut configurator = Configurator::new(Arc::new(MemoryStore::new()), config.settings.clone());
    configurator.include_config(&config).unwrap();
    configurator.into_router()
}

#[tokio::test]
async fn text_keys_round_trip_through_urls() {
    let app = tag_app().await;
    for (name, location) in [
        ("hello world", "/tag/hello%20world"),
        ("café", "/tag/caf%C3%A9"),
        ("a/b", "/tag/a%2Fb"),
    ] {
        let response = send(&app, json_request("POST", "/tag", json!({"name": name}))).await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.header("location"), Some(location));

        let response = send(&app, get(location)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json()["item"]["name"], name);
    }
}

#[tokio::test]
async fn undecodable_key_is_bad_request() {
    let app = tag_app().await;
    let response = send(&app, get("/tag/%FF")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
