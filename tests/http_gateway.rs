// HttpGateway against a real HTTP server (axum on an ephemeral port)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};

use listing_console::{
    ColumnComposer, ColumnConfig, Filter, FieldType, FilterStore, FilterValue, GatewayError,
    HttpGateway, ListLoader, ListingConfig, LoadOutcome, Mutation, Operator, RecordingView,
    RemoteGateway, Row, RowsRender,
};

async fn results(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let objects = if params.get("value__gt").map(String::as_str) == Some("3") {
        vec![
            json!({"value": 5, "project": "/api/project/2/"}),
            json!({"value": 4, "project": "/api/project/1/"}),
        ]
    } else {
        Vec::new()
    };
    let total = objects.len();
    Json(json!({
        "objects": objects,
        "meta": {"total_count": total, "limit": 25, "offset": 0, "previous": null, "next": null}
    }))
}

async fn project(Path(id): Path<u32>) -> Json<Value> {
    Json(json!({"name": format!("project-{}", id)}))
}

async fn active_filters() -> Json<Value> {
    Json(json!({"objects": [
        {"field": "value", "type": "integer", "operator": "gt", "value": 3}
    ]}))
}

async fn reject_filter(Json(_body): Json<Value>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"value": ["Enter a whole number."]})),
    )
}

async fn update_filter(Path(field): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"field": field, "patched": body}))
}

async fn delete_filter(Path(_field): Path<String>) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({}))
}

async fn start_server() -> String {
    let app = Router::new()
        .route("/api/result/", get(results))
        .route("/api/project/:id/", get(project))
        .route("/api/filter/", get(active_filters).post(reject_filter))
        .route("/api/filter/:field/", patch(update_filter).delete(delete_filter))
        .route("/api/filter/query/", get(|| async { "value__gt=3\n" }))
        .route("/broken/", get(broken))
        .route("/slow/", get(slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn gateway(base_url: &str) -> HttpGateway {
    HttpGateway::new(base_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_get_json_resolves_relative_paths() {
    let base = start_server().await;
    let body = gateway(&base).get_json("/api/project/7/").await.unwrap();
    assert_eq!(body, json!({"name": "project-7"}));
}

#[tokio::test]
async fn test_get_text_is_trimmed() {
    let base = start_server().await;
    let text = gateway(&base).get_text("/api/filter/query/").await.unwrap();
    assert_eq!(text, "value__gt=3");
}

#[tokio::test]
async fn test_bad_request_becomes_validation_map() {
    let base = start_server().await;
    let err = gateway(&base)
        .send(Mutation::Post, "/api/filter/", json!({"field": "value"}))
        .await
        .unwrap_err();
    assert_eq!(err.field_message(), Some(("value", "Enter a whole number.")));
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let base = start_server().await;
    let err = gateway(&base).get_json("/broken/").await.unwrap_err();
    match err {
        GatewayError::Status { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_patch_and_empty_delete() {
    let base = start_server().await;
    let gateway = gateway(&base);

    let patched = gateway
        .send(Mutation::Patch, "/api/filter/value/", json!({"operator": "lt"}))
        .await
        .unwrap();
    assert_eq!(patched, json!({"field": "value", "patched": {"operator": "lt"}}));

    let deleted = gateway
        .send(Mutation::Delete, "/api/filter/value/", Value::Null)
        .await
        .unwrap();
    assert_eq!(deleted, Value::Null);
}

#[tokio::test]
async fn test_timeout_is_a_transport_error() {
    let base = start_server().await;
    let gateway = HttpGateway::new(&base, Duration::from_millis(200)).unwrap();
    let err = gateway.get_json("/slow/").await.unwrap_err();
    match err {
        GatewayError::Transport { message, .. } => assert_eq!(message, "timed out"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    let gateway = HttpGateway::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
    let err = gateway.get_json("/api/result/").await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport { .. }));
}

#[tokio::test]
async fn test_filtered_listing_end_to_end() {
    let base = start_server().await;
    let gateway: Arc<dyn RemoteGateway> = Arc::new(gateway(&base));

    let config = ListingConfig::new("results", "/api/result/", "-value")
        .with_column(ColumnConfig::new("Value", "value"))
        .with_column(ColumnConfig::new("Project", "project").resolving("name"));
    let store = Arc::new(FilterStore::new(gateway.clone(), "/api/filter/"));
    let view = Arc::new(RecordingView::new());
    let loader = ListLoader::new(
        config.clone(),
        gateway.clone(),
        view.clone(),
        Arc::new(ColumnComposer::new(config.columns.clone())),
    )
    .with_filters(store.clone());

    let outcome = loader.load(&config.first_page_url(), true).await;
    assert_eq!(outcome, LoadOutcome::Rendered { rows: 2, failed: 0 });
    assert_eq!(
        view.last_render(),
        Some(RowsRender::Rows(vec![
            Row::Ready {
                cells: vec!["5".to_string(), "project-2".to_string()],
            },
            Row::Ready {
                cells: vec!["4".to_string(), "project-1".to_string()],
            },
        ]))
    );
    assert_eq!(view.last_pagination().unwrap().1, "Showing 1–2 of 2");

    let rejected = Filter::new("age", FieldType::Integer, Operator::Exact, FilterValue::scalar("1")).unwrap();
    assert!(matches!(store.create(&rejected).await, Err(GatewayError::Validation(_))));
}
