mod common;

use bgg_gateway::upstream::UpstreamError;
use bgg_gateway::web::response_types::ErrorBody;
use common::{spawn_server, test_config, ScriptedCatalog, ADMIN_TOKEN};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_search_returns_xml_and_caches() {
    let source = Arc::new(ScriptedCatalog::new());
    let server = spawn_server(test_config(), source.clone()).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let response = client
            .get(format!("{}/search?query=catan&type=boardgame", server.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/xml");
        assert!(response.headers().contains_key("x-request-id"));
        assert!(response.text().await.unwrap().contains(r#"value="catan""#));
    }
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_missing_parameters_are_rejected_without_side_effects() {
    let source = Arc::new(ScriptedCatalog::new());
    let server = spawn_server(test_config(), source.clone()).await;
    let client = reqwest::Client::new();

    for path in ["/search", "/search?query=", "/thing", "/thing?stats=1"] {
        let response = client
            .get(format!("{}{path}", server.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
        let body: ErrorBody = response.json().await.unwrap();
        assert!(body.error.starts_with("Missing"), "{path}: {body:?}");
    }

    assert_eq!(source.call_count(), 0);
    assert_eq!(server.state.dispatcher.limiter().stats().completed, 0);
    assert_eq!(
        server
            .state
            .dispatcher
            .store()
            .count(bgg_gateway::Collection::ApiCache)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_wrong_method_is_405_with_json_body() {
    let server = spawn_server(test_config(), Arc::new(ScriptedCatalog::new())).await;
    let response = reqwest::Client::new()
        .post(format!("{}/search?query=catan", server.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = response.json().await.unwrap();
    assert!(body.get("error").is_some());
    assert!(body.get("details").is_some());
}

#[tokio::test]
async fn test_exhausted_throttling_maps_to_429() {
    let source = Arc::new(
        ScriptedCatalog::new().failing_searches(UpstreamError::RateLimited { status: 429 }),
    );
    let server = spawn_server(test_config(), source.clone()).await;

    let response = reqwest::Client::new()
        .get(format!("{}/search?query=catan", server.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.details, "too many requests");
    // max_retries = 3 in the test configuration
    assert_eq!(source.call_count(), 4);
}

#[tokio::test]
async fn test_upstream_failure_maps_to_500_and_hides_details() {
    let source = Arc::new(ScriptedCatalog::new().failing_searches(UpstreamError::Client { status: 404 }));
    let server = spawn_server(test_config(), source).await;

    let response = reqwest::Client::new()
        .get(format!("{}/search?query=nothing", server.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.details, "service temporarily unavailable");
}

#[tokio::test]
async fn test_error_details_exposed_when_configured() {
    let mut config = test_config();
    config.web.expose_error_details = true;
    let source = Arc::new(ScriptedCatalog::new().failing_searches(UpstreamError::Client { status: 404 }));
    let server = spawn_server(config, source).await;

    let body: ErrorBody = reqwest::Client::new()
        .get(format!("{}/search?query=nothing", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body.details.contains("404"), "{body:?}");
}

#[tokio::test]
async fn test_admin_endpoints_require_token() {
    let source = Arc::new(ScriptedCatalog::new().with_listing("boardgame", vec![vec!["1", "2"]]));
    let server = spawn_server(test_config(), source.clone()).await;
    let client = reqwest::Client::new();
    let url = format!("{}/admin/cache/initialize", server.base_url);

    let anonymous = client.post(&url).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);

    let wrong = client.post(&url).bearer_auth("nope").send().await.unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    let metrics = client
        .get(format!("{}/admin/metrics", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(metrics.status(), StatusCode::FORBIDDEN);

    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn test_initialize_runs_then_skips() {
    let source = Arc::new(ScriptedCatalog::new().with_listing("boardgame", vec![vec!["1", "2"]]));
    let server = spawn_server(test_config(), source.clone()).await;
    let client = reqwest::Client::new();
    let url = format!("{}/admin/cache/initialize", server.base_url);

    let started = client.post(&url).bearer_auth(ADMIN_TOKEN).send().await.unwrap();
    assert_eq!(started.status(), StatusCode::ACCEPTED);
    let body: Value = started.json().await.unwrap();
    assert_eq!(body["status"], "started");

    for _ in 0..200 {
        if !server.state.coordinator.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let report = server.state.coordinator.last_report().unwrap();
    assert_eq!(report.total_games(), 2);

    let skipped: Value = client
        .post(&url)
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(skipped["status"], "skipped");

    let calls_before = source.call_count();
    let forced = client
        .post(format!("{url}?force=true"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(forced.status(), StatusCode::ACCEPTED);
    for _ in 0..200 {
        if !server.state.coordinator.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(source.call_count() > calls_before);
}

#[tokio::test]
async fn test_malformed_force_flag_is_rejected_with_json_body() {
    let source = Arc::new(ScriptedCatalog::new().with_listing("boardgame", vec![vec!["1"]]));
    let server = spawn_server(test_config(), source.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/admin/cache/initialize?force=yes", server.base_url))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = response.json().await.unwrap();
    assert!(body.error.contains("force"), "{body:?}");
    assert!(!server.state.coordinator.is_running());
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn test_metrics_and_health() {
    let source = Arc::new(ScriptedCatalog::new());
    let server = spawn_server(test_config(), source).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        client
            .get(format!("{}/thing?id=13", server.base_url))
            .send()
            .await
            .unwrap();
    }

    let metrics: Value = client
        .get(format!("{}/admin/metrics", server.base_url))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["cacheHits"], 2);
    assert_eq!(metrics["cacheMisses"], 1);
    assert_eq!(metrics["totalRequests"], 3);
    assert_eq!(metrics["cacheProvider"], "memory");
    assert_eq!(metrics["rateLimiters"][0]["name"], "interactive");
    assert_eq!(metrics["rateLimiters"][0]["completed"], 1);
    assert_eq!(metrics["rateLimiters"][1]["name"], "bulk");

    let health: Value = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["cacheHealthy"], true);
}
