//! Router-level tests: status codes, redirects and the JSON envelope.

use admin_sdk::response::FLASH_HEADER;
use admin_sdk::{admin_routes, common_routes, resolve, AppState, MemoryStore, SiteConfig};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app() -> Router {
    let config: SiteConfig = serde_json::from_value(json!({
        "namespace": "admin",
        "resources": [
            {
                "name": "ships",
                "display": [{ "name": "name" }],
                "form": [{ "name": "name" }],
                "validation": { "name": { "required": true } }
            },
            {
                "name": "members",
                "parent": { "resource": "ships", "foreign_key": "ship_id" },
                "references": [{ "column": "ship_id", "resource": "ships" }],
                "display": [{ "name": "name" }],
                "form": [{ "name": "name" }]
            }
        ]
    }))
    .unwrap();
    let site = Arc::new(resolve(&config).unwrap());
    let store = MemoryStore::new(site.clone());
    store.seed("ships", json!({ "name": "Enterprise" })).await.unwrap();
    store.seed("members", json!({ "name": "Data", "ship_id": 1 })).await.unwrap();
    let state = AppState::new(site, Arc::new(store));
    Router::new().merge(common_routes()).nest("/admin", admin_routes(state))
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> axum::response::Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = send(app().await, Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_index_envelope() {
    let response = send(app().await, Method::GET, "/admin/ships", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["meta"]["count"], json!(1));
    assert_eq!(body["data"]["view"], json!("index"));
    assert_eq!(body["data"]["action"]["kind"], json!("index"));
    assert_eq!(body["data"]["body"]["records"][0]["record"]["attributes"]["name"], json!("Enterprise"));
}

#[tokio::test]
async fn test_new_and_edit_routes() {
    let response = send(app().await, Method::GET, "/admin/ships/new", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["view"], json!("new"));
    assert_eq!(body["data"]["body"]["submit"], json!({ "href": "/admin/ships", "method": "post" }));

    let response = send(app().await, Method::GET, "/admin/ships/1/members/1/edit", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["view"], json!("edit"));
    assert_eq!(
        body["data"]["body"]["submit"],
        json!({ "href": "/admin/ships/1/members/1", "method": "patch" })
    );
}

#[tokio::test]
async fn test_create_wrapped_body_redirects() {
    let response = send(
        app().await,
        Method::POST,
        "/admin/ships",
        Some(json!({ "ship": { "name": "Defiant" } })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/ships/2");
}

#[tokio::test]
async fn test_create_invalid_is_client_error() {
    let response = send(app().await, Method::POST, "/admin/ships", Some(json!({ "name": "" }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["data"]["action"], json!({ "kind": "new", "origin": "explicit" }));
    assert_eq!(body["data"]["body"]["record"]["errors"][0]["field"], json!("name"));
}

#[tokio::test]
async fn test_destroy_blocked_sets_flash_header() {
    let response = send(app().await, Method::DELETE, "/admin/ships/1", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/ships/1");
    let flash = response.headers().get(FLASH_HEADER).unwrap().to_str().unwrap();
    assert!(flash.starts_with("Couldn't delete record: integrity constraint violation"));
}

#[tokio::test]
async fn test_disallowed_csv_redirects() {
    let response = send(app().await, Method::GET, "/admin/ships?format=csv&sort=name", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/ships?sort=name");
}

#[tokio::test]
async fn test_unknown_resource_and_record_are_not_found() {
    let response = send(app().await, Method::GET, "/admin/stations", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], json!("not_found"));

    let response = send(app().await, Method::GET, "/admin/ships/9", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(app().await, Method::GET, "/admin/members/1/ships", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_action_param_cannot_turn_get_into_destroy() {
    let app = app().await;
    let response = send(app.clone(), Method::GET, "/admin/ships/1/members/1?action=destroy", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["view"], json!("show"));
    assert_eq!(body["data"]["action"], json!({ "kind": "show", "origin": "default" }));

    let response = send(app, Method::GET, "/admin/ships/1/members/1", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_action_param_cannot_swap_mutations() {
    let app = app().await;
    let response = send(
        app.clone(),
        Method::POST,
        "/admin/ships?action=destroy",
        Some(json!({ "name": "Defiant" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/ships/2");

    let response = send(app.clone(), Method::GET, "/admin/ships/1?action=update", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(app, Method::GET, "/admin/ships", None).await;
    assert_eq!(json_body(response).await["meta"]["count"], json!(2));
}

#[tokio::test]
async fn test_non_ascii_parent_id_is_escaped_in_location() {
    let app = app().await;
    let response = send(
        app,
        Method::POST,
        "/admin/ships/%CE%A9/members",
        Some(json!({ "name": "Worf" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/ships/%CE%A9/members/2");
}

#[tokio::test]
async fn test_disallowed_csv_redirect_keeps_param_order_and_repeats() {
    let response = send(
        app().await,
        Method::GET,
        "/admin/ships?sort=name&tag=b&format=csv&tag=a",
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/ships?sort=name&tag=b&tag=a");
}
