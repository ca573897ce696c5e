//! Handler tests for the enrich domain
//!
//! These run the domain router against the in-memory repository and check:
//! - Request deserialization and response shapes
//! - HTTP status codes, including field validators (400) and conflicts (409)
//! - Membership endpoints (add, sort, remove, first/next)

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain_enrich::*;
use entity_events::EventBus;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For oneshot()

fn app() -> Router {
    let repository = InMemoryEnrichRepository::new();
    let relation = Arc::new(repository.relation());
    let service = EnrichService::new(repository, relation, EventBus::default());
    handlers::router(service)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_item(app: &Router, name: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/enrich-items",
        Some(json!({ "name": name, "service_name": "geo-service" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["entity"]["id"].as_i64().unwrap()
}

fn item_ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|node| node["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_create_item_returns_201_with_defaults() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/enrich-items",
        Some(json!({ "name": "geo", "service_name": "geo-service" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["entity"]["type"], "http_sync");
    assert_eq!(body["entity"]["request_timeout"], 5000);
    assert_eq!(body["field_validators"], json!([]));
}

#[tokio::test]
async fn test_create_item_returns_field_validators() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/enrich-items",
        Some(json!({ "name": "script", "type": "groovy_script" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["entity"], Value::Null);
    assert_eq!(body["field_validators"][0]["field"], "script");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = app();

    let request = Request::builder()
        .method("POST")
        .uri("/enrich-items")
        .header("content-type", "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_missing_item_returns_404() {
    let app = app();

    let (status, body) = send(&app, "GET", "/enrich-items/42", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_items_is_paginated() {
    let app = app();
    for name in ["a", "b", "c"] {
        create_item(&app, name).await;
    }

    let (status, body) = send(&app, "GET", "/enrich-items?first=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["edges"].as_array().unwrap().len(), 2);
    assert_eq!(body["page_info"]["has_next_page"], true);

    let cursor = body["page_info"]["end_cursor"].as_str().unwrap().to_string();
    let (_, body) = send(&app, "GET", &format!("/enrich-items?first=2&after={cursor}"), None).await;
    assert_eq!(body["edges"][0]["node"]["name"], "c");

    let (status, _) = send(&app, "GET", "/enrich-items?after=not-a-cursor", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pipeline_membership_flow() {
    let app = app();
    let a = create_item(&app, "a").await;
    let b = create_item(&app, "b").await;
    let c = create_item(&app, "c").await;

    let (status, body) = send(
        &app,
        "POST",
        "/enrich-pipelines",
        Some(json!({
            "name": "ingest",
            "items": [
                { "enrich_item_id": a, "weight": 0.0 },
                { "enrich_item_id": b, "weight": 1.0 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let pipeline = body["entity"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/enrich-pipelines/{pipeline}/items"),
        Some(json!({ "enrich_item_id": c })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item_ids(&body), vec![a, b, c]);
    assert_eq!(body[2]["weight"], 2.0);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/enrich-pipelines/{pipeline}/items/sort"),
        Some(json!({ "enrich_item_ids": [c, a] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item_ids(&body), vec![c, a, b]);

    let (_, body) = send(&app, "GET", &format!("/enrich-pipelines/{pipeline}/first-item"), None).await;
    assert_eq!(body["id"], c);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/enrich-pipelines/{pipeline}/items/{a}/next"),
        None,
    )
    .await;
    assert_eq!(body["id"], b);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/enrich-pipelines/{pipeline}/items/{a}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item_ids(&body), vec![c, b]);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/enrich-pipelines/{pipeline}/items/{a}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_existing_item_conflicts() {
    let app = app();
    let a = create_item(&app, "a").await;
    let (_, body) = send(&app, "POST", "/enrich-pipelines", Some(json!({ "name": "p" }))).await;
    let pipeline = body["entity"]["id"].as_i64().unwrap();

    let uri = format!("/enrich-pipelines/{pipeline}/items/{a}");
    let (status, _) = send(&app, "PUT", &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "PUT", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");
}

#[tokio::test]
async fn test_pipeline_items_not_equal() {
    let app = app();
    let a = create_item(&app, "a").await;
    let b = create_item(&app, "b").await;
    let (_, body) = send(
        &app,
        "POST",
        "/enrich-pipelines",
        Some(json!({ "name": "p", "items": [{ "enrich_item_id": a, "weight": 3.5 }] })),
    )
    .await;
    let pipeline = body["entity"]["id"].as_i64().unwrap();

    let (_, body) = send(&app, "GET", &format!("/enrich-pipelines/{pipeline}/items"), None).await;
    assert_eq!(body["edges"][0]["node"]["id"], a);
    assert_eq!(body["edges"][0]["node"]["weight"], 3.5);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/enrich-pipelines/{pipeline}/items?not_equal=true&first=10"),
        None,
    )
    .await;
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["edges"][0]["node"]["id"], b);
    assert_eq!(body["edges"][0]["node"]["weight"], Value::Null);
}

#[tokio::test]
async fn test_delete_item_in_use_needs_detach() {
    let app = app();
    let a = create_item(&app, "a").await;
    let (_, body) = send(
        &app,
        "POST",
        "/enrich-pipelines",
        Some(json!({ "name": "p", "items": [{ "enrich_item_id": a, "weight": 0.0 }] })),
    )
    .await;
    let pipeline = body["entity"]["id"].as_i64().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/enrich-items/{a}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "DELETE", &format!("/enrich-items/{a}?detach=true"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], a);

    let (_, body) = send(&app, "GET", &format!("/enrich-pipelines/{pipeline}/items"), None).await;
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn test_create_pipeline_with_unknown_item_returns_404() {
    let app = app();

    let (status, _) = send(
        &app,
        "POST",
        "/enrich-pipelines",
        Some(json!({ "name": "p", "items": [{ "enrich_item_id": 77, "weight": 0.0 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/enrich-pipelines", None).await;
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn test_delete_pipeline_then_unbound_pipelines() {
    let app = app();
    let a = create_item(&app, "a").await;
    let (_, body) = send(
        &app,
        "POST",
        "/enrich-pipelines",
        Some(json!({ "name": "first", "items": [{ "enrich_item_id": a, "weight": 0.0 }] })),
    )
    .await;
    let first = body["entity"]["id"].as_i64().unwrap();
    send(&app, "POST", "/enrich-pipelines", Some(json!({ "name": "second" }))).await;

    let (_, body) = send(&app, "GET", &format!("/enrich-items/{a}/unbound-pipelines"), None).await;
    assert_eq!(body["edges"][0]["node"]["name"], "second");

    let (status, _) = send(&app, "DELETE", &format!("/enrich-pipelines/{first}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", &format!("/enrich-items/{a}/unbound-pipelines"), None).await;
    assert_eq!(body["total_count"], 1);

    // the item is free now
    let (status, _) = send(&app, "DELETE", &format!("/enrich-items/{a}"), None).await;
    assert_eq!(status, StatusCode::OK);
}
