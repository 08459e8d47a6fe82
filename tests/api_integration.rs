//! HTTP API integration tests (§6): drives the `axum::Router` directly via
//! `tower::ServiceExt::oneshot`, never binding a real socket.
//!
//! Only endpoints that do not reach the real LLM provider are exercised
//! here (`settings.llm.use_llm = false` keeps classification on the
//! rule-based fallback, but `pipeline::extract`, `/jobs/nightly`, and
//! `/summarize` call the LLM unconditionally, so those three routes are
//! left to a fake-`LlmProvider` unit test instead).

use std::collections::BTreeMap;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use mnemograph::api::AppState;
use mnemograph::config::{
    ConflictStrategy, EmbeddingProviderKind, EmbeddingSettings, HttpSettings, LlmSettings,
    PipelineLimits, Settings, StorageBackendKind, StorageSettings,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_settings() -> Settings {
    Settings {
        storage: StorageSettings {
            backend: StorageBackendKind::Relational,
            connection_string: ":memory:".to_string(),
            data_dir: std::env::temp_dir(),
        },
        embedding: EmbeddingSettings {
            provider: EmbeddingProviderKind::Local,
            model: "local-hash".to_string(),
            native_dimensions: 16,
            storage_dimensions: 16,
            endpoint: String::new(),
            api_key: None,
            timeout_secs: 30,
        },
        llm: LlmSettings {
            endpoint: String::new(),
            model: String::new(),
            api_key: None,
            timeout_secs: 60,
            use_llm: false,
        },
        conflict_strategy: ConflictStrategy::Recency,
        debug: false,
        log_level: "info".to_string(),
        log_json: false,
        http: HttpSettings { bind_address: "127.0.0.1".to_string(), port: 8077 },
        limits: PipelineLimits { max_items_per_run: 10_000, category_access_retention_days: 180 },
        sources: BTreeMap::new(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON body")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialize request body")))
        .expect("build request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).expect("build request")
}

#[tokio::test]
async fn full_api_workflow_exercises_major_endpoints() {
    let state = AppState::build(test_settings()).expect("build app state");
    let router = mnemograph::api::router(state);

    let health = router.clone().oneshot(get("/health")).await.expect("health request");
    assert_eq!(health.status(), StatusCode::OK);

    let create_item_response = router
        .clone()
        .oneshot(post_json(
            "/v2/items",
            &json!({"subject": "Judy", "predicate": "works_at", "object": "Acme", "category": "facts", "confidence": 0.9}),
        ))
        .await
        .expect("create item request");
    assert_eq!(create_item_response.status(), StatusCode::OK);
    let created_item = body_json(create_item_response).await;
    let item_id = created_item["id"].as_str().expect("item id is a string").to_string();
    assert_eq!(created_item["status"], "active");

    let meta_response = router
        .clone()
        .oneshot(post_json(&format!("/v2/items/{item_id}/meta"), &json!({"predicate": "has_source", "object": "api-test"})))
        .await
        .expect("create meta request");
    assert_eq!(meta_response.status(), StatusCode::OK);

    let meta_list = router.clone().oneshot(get(&format!("/v2/items/{item_id}/meta"))).await.expect("get meta request");
    assert_eq!(meta_list.status(), StatusCode::OK);
    let meta_body = body_json(meta_list).await;
    assert_eq!(meta_body["meta_facts"].as_array().expect("meta_facts array").len(), 1);

    let items_response = router.clone().oneshot(get("/items")).await.expect("list items request");
    assert_eq!(items_response.status(), StatusCode::OK);
    let items_body = body_json(items_response).await;
    assert_eq!(items_body["total"], 1);

    let categories_response = router.clone().oneshot(get("/categories")).await.expect("list categories request");
    assert_eq!(categories_response.status(), StatusCode::OK);
    let categories_body = body_json(categories_response).await;
    assert!(categories_body["categories"].as_array().expect("categories array").iter().any(|c| c["name"] == "facts"));

    let ingest_response = router
        .clone()
        .oneshot(post_json("/ingest", &json!({"content": "Judy moved to a new office.", "source": "api-test"})))
        .await
        .expect("ingest request");
    assert_eq!(ingest_response.status(), StatusCode::OK);
    let ingest_body = body_json(ingest_response).await;
    assert!(ingest_body["resource_id"].as_str().is_some());

    let resources_response = router.clone().oneshot(get("/resources")).await.expect("list resources request");
    assert_eq!(resources_response.status(), StatusCode::OK);
    let resources_body = body_json(resources_response).await;
    assert_eq!(resources_body["total"], 1);

    let retrieve_response = router.clone().oneshot(get("/retrieve?query=Judy")).await.expect("retrieve request");
    assert_eq!(retrieve_response.status(), StatusCode::OK);

    let search_response = router.clone().oneshot(get("/search?q=Judy")).await.expect("search request");
    assert_eq!(search_response.status(), StatusCode::OK);
    let search_body = body_json(search_response).await;
    assert!(search_body["intent"].is_string());

    let context_response = router.clone().oneshot(get("/context")).await.expect("context request");
    assert_eq!(context_response.status(), StatusCode::OK);

    let neighbors_response = router.clone().oneshot(get("/graph/neighbors?entity=Judy")).await.expect("neighbors request");
    assert_eq!(neighbors_response.status(), StatusCode::OK);
    let neighbors_body = body_json(neighbors_response).await;
    assert_eq!(neighbors_body["total"], 1);

    let paths_response =
        router.clone().oneshot(get("/graph/paths?source=Judy&target=Acme")).await.expect("paths request");
    assert_eq!(paths_response.status(), StatusCode::OK);

    let detailed_health = router.clone().oneshot(get("/health/detailed")).await.expect("detailed health request");
    assert_eq!(detailed_health.status(), StatusCode::OK);
    let detailed_body = body_json(detailed_health).await;
    assert_eq!(detailed_body["resources"], 1);

    let weekly_response = router.clone().oneshot(post_json("/jobs/weekly", &json!({}))).await.expect("weekly job request");
    assert_eq!(weekly_response.status(), StatusCode::OK);

    let monthly_response = router.clone().oneshot(post_json("/jobs/monthly", &json!({}))).await.expect("monthly job request");
    assert_eq!(monthly_response.status(), StatusCode::OK);
    let monthly_body = body_json(monthly_response).await;
    assert_eq!(monthly_body["embeddings_recomputed"], 1);

    let stats_response = router.clone().oneshot(get("/v2/stats")).await.expect("stats request");
    assert_eq!(stats_response.status(), StatusCode::OK);

    let metrics_response = router.clone().oneshot(get("/metrics")).await.expect("metrics request");
    assert_eq!(metrics_response.status(), StatusCode::OK);

    let metrics_reset_response =
        router.clone().oneshot(post_json("/metrics/reset", &json!({}))).await.expect("metrics reset request");
    assert_eq!(metrics_reset_response.status(), StatusCode::OK);

    // Error-path checks share this router/state rather than building a second
    // `AppState`: installing the global Prometheus recorder a second time in
    // the same process would fail.
    let empty_query_response = router.clone().oneshot(get("/retrieve?query=")).await.expect("retrieve request");
    assert_eq!(empty_query_response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let missing_id = uuid::Uuid::new_v4();
    let not_found_response =
        router.oneshot(get(&format!("/resources/{missing_id}"))).await.expect("get resource request");
    assert_eq!(not_found_response.status(), StatusCode::NOT_FOUND);
}
