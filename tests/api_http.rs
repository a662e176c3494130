// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /signals (fresh, then cached)
// - GET/DELETE /cache/{entity}
// - POST /batch, /signals followed by /batch
// - POST /batch/cancel and shutdown
// - request validation

use std::sync::Arc;

use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt as _; // for `oneshot`

use prospect_signals::config::PipelineConfig;
use prospect_signals::fakes::{article, offline_extractor, StaticNewsBackend};
use prospect_signals::generate::MockGenerator;
use prospect_signals::sources::newsapi::NewsApiResponse;
use prospect_signals::sources::{NewsApiBackend, PrimarySource, SecondarySource};
use prospect_signals::{create_router, AppState, BatchOrchestrator, EntityFetcher, SessionCache};

const BODY_LIMIT: usize = 1024 * 1024;

/// Pipeline over in-memory sources; shares the news fake so tests can count calls.
fn test_pipeline() -> (Arc<BatchOrchestrator>, Arc<StaticNewsBackend>) {
    let news = Arc::new(StaticNewsBackend::new().on(
        "Acme",
        vec![Ok(NewsApiResponse::ok(vec![
            article(
                "Acme raises Series C",
                "Acme raised $40 million to expand its cloud platform.",
                "https://n.test/acme-1",
                Some("2025-03-07T10:00:00Z"),
            ),
            article(
                "Acme opens Berlin office",
                "Acme opened an office in Berlin to serve European customers.",
                "https://n.test/acme-2",
                None,
            ),
        ]))],
    ));
    let ex = offline_extractor();
    let backend: Arc<dyn NewsApiBackend> = news.clone();
    let fetcher = EntityFetcher::new(
        PrimarySource::new(Some(backend), ex.clone(), 60, 5),
        SecondarySource::new(None, ex, 5),
    );
    let pipeline = BatchOrchestrator::new(
        PipelineConfig::default(),
        fetcher,
        Arc::new(MockGenerator::fixed("Acme is scaling its cloud business.")),
        Arc::new(SessionCache::new()),
    );
    (Arc::new(pipeline), news)
}

fn test_router() -> (Router, Arc<StaticNewsBackend>) {
    let (pipeline, news) = test_pipeline();
    (create_router(AppState::new(pipeline)), news)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    };
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

fn json_of(bytes: &[u8]) -> Json {
    serde_json::from_slice(bytes).expect("valid json")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let (app, _) = test_router();
    let (status, bytes) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).expect("utf8"), "ok");
}

#[tokio::test]
async fn api_signals_fetches_then_serves_from_cache() {
    let (app, news) = test_router();
    let payload = json!({ "entity_name": "Acme", "min_articles": 1, "max_articles": 5 });

    let (status, bytes) = send(&app, "POST", "/signals", Some(payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let first = json_of(&bytes);
    assert_eq!(first["from_cache"], false);
    assert_eq!(first["result"]["outcome"], "done");
    assert_eq!(first["result"]["primary"].as_array().map(Vec::len), Some(2));
    let calls = news.calls();

    let (status, bytes) = send(&app, "POST", "/signals", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let second = json_of(&bytes);
    assert_eq!(second["from_cache"], true);
    assert_eq!(second["result"]["primary"].as_array().map(Vec::len), Some(2));
    assert_eq!(news.calls(), calls, "cache hit makes no source call");
}

#[tokio::test]
async fn api_cache_get_and_delete() {
    let (app, _) = test_router();

    let (status, _) = send(&app, "GET", "/cache/Acme", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/signals", Some(json!({ "entity_name": "Acme" }))).await;
    assert_eq!(status, StatusCode::OK);

    // Keys are case-insensitive.
    let (status, bytes) = send(&app, "GET", "/cache/acme", None).await;
    assert_eq!(status, StatusCode::OK);
    let entry = json_of(&bytes);
    assert_eq!(entry["items"].as_array().map(Vec::len), Some(2));

    let (status, _) = send(&app, "DELETE", "/cache/Acme", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", "/cache/Acme", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, bytes) = send(&app, "GET", "/cache/Acme", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json_of(&bytes)["error"].as_str().is_some());
}

#[tokio::test]
async fn api_batch_runs_every_prospect_to_completion() {
    let (app, _) = test_router();
    let payload = json!({
        "prospects": [
            { "prospect_name": "Dana Lee", "prospect_title": "CTO", "prospect_company": "Acme", "region": "EU" },
            { "prospect_company": "" }
        ],
        "options": { "industry": "tech", "min_articles": 1 }
    });

    let (status, bytes) = send(&app, "POST", "/batch", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    assert_eq!(v["progress"], 1.0);

    let outcomes = v["outcomes"].as_array().expect("outcomes array");
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["status"], "completed");
    assert_eq!(outcomes[0]["email"], "Acme is scaling its cloud business.");
    assert_eq!(outcomes[0]["prospect"]["region"], "EU", "extra columns pass through");
    assert_eq!(outcomes[0]["entry"]["summaries"].as_array().map(Vec::len), Some(2));
    assert_eq!(outcomes[1]["status"], "failed");
    assert!(outcomes[1]["error"].as_str().is_some());
}

#[tokio::test]
async fn api_batch_summarizes_items_cached_by_signals() {
    let (app, news) = test_router();

    let (status, _) = send(&app, "POST", "/signals", Some(json!({ "entity_name": "Acme" }))).await;
    assert_eq!(status, StatusCode::OK);
    let calls = news.calls();

    let payload = json!({ "prospects": [{ "prospect_name": "Dana Lee", "prospect_company": "Acme" }] });
    let (status, bytes) = send(&app, "POST", "/batch", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    let outcome = &v["outcomes"][0];
    assert_eq!(outcome["status"], "completed");
    assert_eq!(outcome["from_cache"], true);
    assert_eq!(outcome["entry"]["summaries"].as_array().map(Vec::len), Some(2));
    assert_eq!(outcome["entry"]["summarized"], true);
    assert_eq!(news.calls(), calls, "cached items are reused");

    let (_, bytes) = send(&app, "GET", "/cache/Acme", None).await;
    assert_eq!(json_of(&bytes)["summaries"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn api_batch_after_shutdown_is_cancelled() {
    let (pipeline, news) = test_pipeline();
    let shutdown = CancellationToken::new();
    let app = create_router(AppState::with_shutdown(pipeline, shutdown.clone()));
    shutdown.cancel();

    let payload = json!({ "prospects": [{ "prospect_company": "Acme" }, { "prospect_company": "Globex" }] });
    let (status, bytes) = send(&app, "POST", "/batch", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    assert_eq!(v["progress"], 0.0);
    let outcomes = v["outcomes"].as_array().expect("outcomes array");
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o["status"] == "cancelled"));
    assert_eq!(news.calls(), 0);
}

#[tokio::test]
async fn api_cancel_route_accepts_and_later_batches_still_run() {
    let (app, _) = test_router();

    let (status, _) = send(&app, "POST", "/batch/cancel", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let payload = json!({ "prospects": [{ "prospect_company": "Acme" }] });
    let (status, bytes) = send(&app, "POST", "/batch", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    assert_eq!(v["outcomes"][0]["status"], "completed");
    assert_eq!(v["progress"], 1.0);
}

#[tokio::test]
async fn api_rejects_empty_inputs() {
    let (app, news) = test_router();

    let (status, bytes) = send(&app, "POST", "/signals", Some(json!({ "entity_name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_of(&bytes)["error"].as_str().is_some());

    let (status, _) = send(&app, "POST", "/batch", Some(json!({ "prospects": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(news.calls(), 0);
}
