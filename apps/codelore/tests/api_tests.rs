//! End-to-end tests for the HTTP API against an in-memory store.

use axum_test::TestServer;
use codelore::api::{AppState, create_router};
use codelore_core::Store;
use serde_json::{Value, json};
use std::sync::{Mutex, MutexGuard};

// Router construction reads process environment (API key, rate limit),
// so anything that touches env vars serializes on this lock.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    match ENV_MUTEX.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn test_server() -> TestServer {
    let guard = env_lock();
    // Make sure a leftover key from an auth test cannot leak in.
    unsafe {
        std::env::remove_var("CODELORE_API_KEY");
    }
    let router = create_router(AppState::new(Store::in_memory()));
    drop(guard);
    TestServer::new(router).expect("test server")
}

fn sample_entity(name: &str) -> Value {
    json!({
        "name": name,
        "entity_type": "function",
        "summary": format!("{name} does things"),
        "language": "rust",
    })
}

// =============================================================================
// REGISTRATION
// =============================================================================

#[tokio::test]
async fn register_entity_creates_then_merges() {
    let server = test_server();

    let first = server.post("/entity").json(&sample_entity("parse")).await;
    first.assert_status_ok();
    let body: Value = first.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["created"], json!(true));
    let id = body["id"].as_str().expect("id").to_string();

    let second = server.post("/entity").json(&sample_entity("parse")).await;
    second.assert_status_ok();
    let body: Value = second.json();
    assert_eq!(body["created"], json!(false));
    assert_eq!(body["id"], json!(id));
}

#[tokio::test]
async fn blank_name_is_a_bad_request() {
    let server = test_server();

    let response = server
        .post("/entity")
        .json(&json!({"name": "   ", "entity_type": "function", "summary": "x"}))
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().expect("error").contains("validation"));
}

#[tokio::test]
async fn null_metadata_value_is_a_bad_request() {
    let server = test_server();

    let mut entity = sample_entity("with_meta");
    entity["metadata"] = json!({"broken": null});
    let response = server.post("/entity").json(&entity).await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn fractional_metadata_is_stored_and_echoed_back() {
    let server = test_server();

    let mut entity = sample_entity("scored");
    entity["metadata"] = json!({"confidence": 0.95, "line": 42});
    let response = server.post("/entity").json(&entity).await;
    response.assert_status_ok();

    let details = server.get("/entity/scored").await;
    details.assert_status_ok();
    let body: Value = details.json();
    assert_eq!(body["entity"]["metadata"]["confidence"], json!(0.95));
    assert_eq!(body["entity"]["metadata"]["line"], json!(42));
}

#[tokio::test]
async fn relationship_accepts_dangling_endpoints() {
    let server = test_server();

    let response = server
        .post("/relationship")
        .json(&json!({
            "from_entity": "not_registered_yet",
            "to_entity": "also_missing",
            "relationship_type": "calls",
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["created"], json!(true));
}

#[tokio::test]
async fn observation_for_unknown_entity_is_not_found() {
    let server = test_server();

    let response = server
        .post("/entity/observation")
        .json(&json!({"entity_name": "ghost", "observation": "never seen"}))
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn repeated_observation_reports_not_appended() {
    let server = test_server();
    server.post("/entity").json(&sample_entity("watched")).await;

    let body = json!({"entity_name": "watched", "observation": "hot path"});
    let first = server.post("/entity/observation").json(&body).await;
    first.assert_status_ok();
    assert_eq!(first.json::<Value>()["appended"], json!(true));

    let second = server.post("/entity/observation").json(&body).await;
    second.assert_status_ok();
    assert_eq!(second.json::<Value>()["appended"], json!(false));
}

// =============================================================================
// QUERIES
// =============================================================================

#[tokio::test]
async fn entity_query_filters_and_orders() {
    let server = test_server();
    for name in ["alpha", "beta", "gamma"] {
        server.post("/entity").json(&sample_entity(name)).await;
    }
    server
        .post("/entity")
        .json(&json!({"name": "Config", "entity_type": "struct", "summary": "config"}))
        .await;

    let response = server
        .post("/query/entities")
        .json(&json!({"entity_type": "function"}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], json!(3));
    let names: Vec<&str> = body["entities"]
        .as_array()
        .expect("entities")
        .iter()
        .map(|e| e["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn invalid_regex_is_a_bad_request() {
    let server = test_server();

    let response = server
        .post("/query/entities")
        .json(&json!({"name_pattern": "["}))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn non_positive_limit_is_a_bad_request() {
    let server = test_server();

    let response = server
        .post("/query/entities")
        .json(&json!({"limit": 0}))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn entity_details_show_directed_relationships() {
    let server = test_server();
    server.post("/entity").json(&sample_entity("caller")).await;
    server.post("/entity").json(&sample_entity("callee")).await;
    server
        .post("/relationship")
        .json(&json!({
            "from_entity": "caller",
            "to_entity": "callee",
            "relationship_type": "calls",
        }))
        .await;

    let response = server.get("/entity/caller").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["entity"]["name"], json!("caller"));
    let relationships = body["relationships"].as_array().expect("relationships");
    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships[0]["direction"], json!("outgoing"));
    assert_eq!(relationships[0]["to_entity"], json!("callee"));

    let response = server.get("/entity/callee").await;
    let body: Value = response.json();
    assert_eq!(
        body["relationships"][0]["direction"],
        json!("incoming")
    );
}

#[tokio::test]
async fn unknown_entity_details_is_not_found() {
    let server = test_server();
    let response = server.get("/entity/missing").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn pattern_query_matches_exact_name_only() {
    let server = test_server();
    server
        .post("/pattern")
        .json(&json!({"name": "builder", "description": "builder pattern", "language": "rust"}))
        .await;

    let exact = server
        .post("/query/patterns")
        .json(&json!({"name": "builder"}))
        .await;
    assert_eq!(exact.json::<Value>()["count"], json!(1));

    let partial = server
        .post("/query/patterns")
        .json(&json!({"name": "build"}))
        .await;
    assert_eq!(partial.json::<Value>()["count"], json!(0));
}

#[tokio::test]
async fn statistics_reflect_registered_records() {
    let server = test_server();
    server.post("/entity").json(&sample_entity("one")).await;
    server.post("/entity").json(&sample_entity("two")).await;
    server
        .post("/convention")
        .json(&json!({
            "name": "snake_case",
            "description": "snake case names",
            "examples": ["fn parse_input"],
        }))
        .await;

    let response = server.get("/statistics").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["entity_count"], json!(2));
    assert_eq!(body["entities_by_type"]["function"], json!(2));
    assert_eq!(body["convention_count"], json!(1));
    assert_eq!(body["note_count"], json!(1));
}

// =============================================================================
// ADMINISTRATION
// =============================================================================

#[tokio::test]
async fn clear_empties_the_graph() {
    let server = test_server();
    server.post("/entity").json(&sample_entity("doomed")).await;

    let response = server.post("/clear").json(&json!({})).await;
    response.assert_status_ok();

    let stats: Value = server.get("/statistics").await.json();
    assert_eq!(stats["entity_count"], json!(0));
}

#[tokio::test]
async fn export_returns_decodable_snapshot_with_checksum() {
    let server = test_server();
    server.post("/entity").json(&sample_entity("kept")).await;

    let response = server.get("/export").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));

    let encoded = body["data"].as_str().expect("data");
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
        .expect("base64 decode");
    let checksum = body["checksum"].as_u64().expect("checksum");
    assert_eq!(codelore_core::snapshot_checksum(&bytes), checksum);

    let graph = codelore_core::knowledge_from_bytes(&bytes).expect("decode snapshot");
    assert_eq!(graph.entity_count(), 1);
}

#[tokio::test]
async fn health_reports_version() {
    let server = test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

#[tokio::test]
async fn auth_rejects_missing_and_wrong_keys() {
    let guard = env_lock();
    unsafe {
        std::env::set_var("CODELORE_API_KEY", "test-secret");
    }
    let router = create_router(AppState::new(Store::in_memory()));
    unsafe {
        std::env::remove_var("CODELORE_API_KEY");
    }
    drop(guard);
    let server = TestServer::new(router).expect("test server");

    // Key was removed after router construction; middleware fails closed.
    let response = server.get("/statistics").await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn auth_accepts_bearer_key_and_keeps_health_open() {
    let guard = env_lock();
    unsafe {
        std::env::set_var("CODELORE_API_KEY", "test-secret");
    }
    let router = create_router(AppState::new(Store::in_memory()));
    let server = TestServer::new(router).expect("test server");

    let open = server.get("/health").await;
    open.assert_status_ok();

    let denied = server.get("/statistics").await;
    denied.assert_status_unauthorized();

    let wrong = server
        .get("/statistics")
        .add_header("authorization", "Bearer wrong-secret")
        .await;
    wrong.assert_status_unauthorized();

    let allowed = server
        .get("/statistics")
        .add_header("authorization", "Bearer test-secret")
        .await;
    allowed.assert_status_ok();

    unsafe {
        std::env::remove_var("CODELORE_API_KEY");
    }
    drop(guard);
}
