//! Router-level tests for the REST contract.

mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

async fn app() -> (Router, TempDir) {
    let (service, dir) = common::service().await;
    let router = file_manager::routes::routes::routes().with_state(service);
    (router, dir)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_is_ok() {
    let (app, _dir) = app().await;
    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn info_returns_capacity_stats() {
    let (app, _dir) = app().await;
    let response = app.oneshot(get("/info")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let stats = &body["stats"];
    assert_eq!(stats["total"].as_i64().unwrap(), 10 * 1024 * 1024 * 1024);
    assert_eq!(
        stats["used"].as_i64().unwrap() + stats["free"].as_i64().unwrap(),
        stats["total"].as_i64().unwrap()
    );
}

#[tokio::test]
async fn create_folder_then_list() {
    let (app, _dir) = app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/files",
            json!({ "name": "docs", "type": "folder" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["id"], "/docs");

    let response = app.oneshot(get("/files")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["has_more"], false);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "docs");
    assert_eq!(items[0]["type"], "folder");
    assert_eq!(items[0]["id"], "/docs");
}

#[tokio::test]
async fn create_with_bad_name_is_400() {
    let (app, _dir) = app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/files",
            json!({ "name": "../escape", "type": "file" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn rename_via_put() {
    let (app, _dir) = app().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/files",
            json!({ "name": "a.txt", "type": "file" }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/files/a.txt",
            json!({ "operation": "rename", "name": "b.txt" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], "/b.txt");
    assert_eq!(body["moved"], 1);

    let body = body_json(app.oneshot(get("/files")).await.unwrap()).await;
    let names: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["b.txt"]);
}

#[tokio::test]
async fn move_reports_per_item_outcomes() {
    let (app, _dir) = app().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/files",
            json!({ "name": "a.txt", "type": "file" }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/files",
            json!({ "operation": "move", "ids": ["/a.txt", "/ghost"], "target": "/dest" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let result = body["result"].as_array().unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result[0]["id"], "/a.txt");
    assert_eq!(result[0]["copied"], 1);
    assert_eq!(result[0]["deleted"], 1);
    assert_eq!(result[1]["copied"], 0);
    assert!(result[1].get("error").is_none());

    let body = body_json(app.oneshot(get("/files/dest")).await.unwrap()).await;
    assert_eq!(body["items"][0]["name"], "a.txt");
}

#[tokio::test]
async fn delete_is_idempotent_over_http() {
    let (app, _dir) = app().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/files",
            json!({ "name": "docs", "type": "folder" }),
        ))
        .await
        .unwrap();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request("DELETE", "/", json!({ "ids": ["/docs"] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
    }

    let body = body_json(app.oneshot(get("/files")).await.unwrap()).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn raw_download_serves_created_file() {
    let (app, _dir) = app().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/files",
            json!({ "name": "empty.txt", "type": "file" }),
        ))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/raw/empty.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let length = response.headers()[header::CONTENT_LENGTH].to_str().unwrap();
    assert_eq!(length, "0");

    let response = app.oneshot(get("/raw/nope.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
