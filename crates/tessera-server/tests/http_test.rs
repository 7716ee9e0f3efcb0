// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP tests for the demo back offices, driven through the router.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use tessera_admin::Config as AdminConfig;
use tessera_esign::jobs::GoogleDriveImport;
use tessera_esign::model::JobRunStatus;
use tessera_esign::{EsignConfig, JobContext, Stores};
use tessera_server::apps::esign::{self, DEMO_DRIVE_FILE_ID};
use tessera_server::{AppKind, ServerConfig};

fn config(app: AppKind) -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        app,
        esign_database_url: None,
        admin: AdminConfig::default(),
        esign: EsignConfig::default(),
    }
}

async fn router(app: AppKind) -> Router {
    tessera_server::build(&config(app)).await.unwrap().router
}

fn request(method: Method, uri: &str, role: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", "u-1")
        .header("x-user-role", role)
        .header("x-tenant-id", "tenant-1")
        .header("x-org-id", "org-1");
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn admin_get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, request(Method::GET, uri, "admin", None)).await
}

async fn admin_send(router: &Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, request(method, uri, "admin", Some(body))).await
}

#[tokio::test]
async fn test_commerce_product_flow() {
    let router = router(AppKind::Commerce).await;

    let (status, created) = admin_send(
        &router,
        Method::POST,
        "/admin/api/products",
        json!({
            "name": "Tessera Hoodie",
            "sku": "HOOD-1",
            "price": 59.0,
            "inventory": 3,
            "status": "active"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (status, list) = admin_get(&router, "/admin/api/products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
    assert_eq!(list["items"][0]["id"], id.as_str());
    assert_eq!(list["items"][0]["name"], "Tessera Hoodie");

    let (status, dashboard) = admin_get(&router, "/admin/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!dashboard["widgets"].as_array().unwrap().is_empty());

    let (status, search) = admin_get(&router, "/admin/api/search?query=hoodie").await;
    assert_eq!(status, StatusCode::OK);
    let results = search["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["id"], id.as_str());

    let (status, jobs) = admin_get(&router, "/admin/api/jobs").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = jobs["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|job| job["name"].as_str())
        .collect();
    assert!(names.contains(&"commerce.restock"));
}

#[tokio::test]
async fn test_restock_bulk_action() {
    let router = router(AppKind::Commerce).await;
    let (_, created) = admin_send(
        &router,
        Method::POST,
        "/admin/api/products",
        json!({ "name": "Mug", "sku": "MUG-1", "price": 12.0, "inventory": 1 }),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = admin_send(
        &router,
        Method::POST,
        "/admin/api/products/bulk/restock",
        json!({ "ids": [id], "payload": { "level": 40 } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "restock");
    assert_eq!(body["result"]["level"], 40);

    let (_, product) = admin_get(&router, &format!("/admin/api/products/{}", id)).await;
    assert_eq!(product["inventory"], 40);
}

#[tokio::test]
async fn test_bulk_action_needs_ids() {
    let router = router(AppKind::Commerce).await;
    let (status, body) = admin_send(
        &router,
        Method::POST,
        "/admin/api/products/bulk/restock",
        json!({ "payload": {} }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_anonymous_request_redirects_to_login() {
    let router = router(AppKind::Commerce).await;
    let request = Request::builder()
        .uri("/admin/api/products")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/admin/login"
    );
}

#[tokio::test]
async fn test_delete_requires_admin_role() {
    let router = router(AppKind::Commerce).await;
    let (_, created) = admin_send(
        &router,
        Method::POST,
        "/admin/api/orders",
        json!({ "number": "SO-1", "customer": "Ada", "total": 20.0, "status": "paid" }),
    )
    .await;
    let uri = format!("/admin/api/orders/{}", created["id"].as_str().unwrap());

    let (status, body) = send(&router, request(Method::DELETE, &uri, "editor", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = send(&router, request(Method::DELETE, &uri, "admin", None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = admin_get(&router, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_panel_is_not_found() {
    let router = router(AppKind::Commerce).await;
    let (status, body) = admin_get(&router, "/admin/api/invoices").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_web_app_serves_cms_panels() {
    let router = router(AppKind::Web).await;

    let (status, body) = admin_get(&router, "/admin/api/panels").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["panels"].as_array().unwrap().len() >= 4);

    let (status, _) = admin_send(
        &router,
        Method::POST,
        "/admin/api/users",
        json!({ "name": "Grace", "email": "grace@example.com", "role": "editor" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, dashboard) = admin_get(&router, "/admin/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["widgets"][0]["data"]["users"], 1);

    let (status, settings) = admin_get(&router, "/admin/api/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["values"]["site.maintenance_mode"], false);
}

#[tokio::test]
async fn test_esign_agreement_lifecycle() {
    let router = router(AppKind::Esign).await;

    let (status, created) = admin_send(
        &router,
        Method::POST,
        "/admin/api/agreements",
        json!({ "title": "Mutual NDA" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "draft");
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/admin/api/agreements/{}", id);

    let (status, sent) = admin_send(&router, Method::PATCH, &uri, json!({ "status": "sent" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["status"], "sent");

    let (status, body) = admin_send(
        &router,
        Method::POST,
        "/admin/api/agreements/actions/complete",
        json!({ "ids": [id] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["completed"][0]["agreement_id"], id.as_str());

    let (_, completed) = admin_get(&router, &uri).await;
    assert_eq!(completed["status"], "completed");
    assert!(completed["executed_object_key"].is_string());

    let (status, body) =
        admin_send(&router, Method::PATCH, &uri, json!({ "title": "Changed" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "AGREEMENT_IMMUTABLE");

    let (status, jobs) = admin_get(&router, "/admin/api/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs["jobs"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_esign_demo_imports_from_drive() {
    let jobs = esign::jobs(Stores::memory(), &EsignConfig::default());
    let ctx = JobContext::for_scope("tenant-1", "org-1");

    let out = jobs
        .import_google_drive(&ctx, GoogleDriveImport::new("u-1", DEMO_DRIVE_FILE_ID))
        .await
        .unwrap();
    assert_eq!(out.run.status, JobRunStatus::Succeeded);
    let document = out.value.unwrap();
    assert_eq!(document.title, "Mutual NDA.pdf");
    assert_eq!(document.google_file_id, DEMO_DRIVE_FILE_ID);

    let err = jobs
        .import_google_drive(&ctx, GoogleDriveImport::new("u-1", "missing-file"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}
