//! HTTP API integration tests
//!
//! Exercise the axum router end to end with `tower::ServiceExt::oneshot`
//! against the in-memory engine.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use helpers::{engine_with_fetcher, wait_for_terminal, StubFetcher, TestEngine};
use songdrop_sd::{build_router, AppState};

async fn test_app(fetcher: StubFetcher) -> (axum::Router, TestEngine) {
    let engine = engine_with_fetcher(Arc::new(fetcher), 2).await;
    let state = AppState::new(
        engine.db.clone(),
        engine.event_bus.clone(),
        engine.manager.clone(),
        engine.sessions.clone(),
    );
    (build_router(state), engine)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn scrape_submission_returns_accepted_with_job_id() {
    let fetcher = StubFetcher::new().song("https://songs.test/1", Some("v"), Some(b"a"));
    let (app, engine) = test_app(fetcher).await;

    let response = app
        .oneshot(post_json(
            "/api/scrape",
            json!({
                "user_id": 7,
                "songs": [{"title": "One", "artist": "A", "url": "https://songs.test/1"}],
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "queued");
    assert_eq!(body["songs_count"], 1);

    let job_id = body["job_id"].as_str().unwrap().to_string();
    wait_for_terminal(&engine.manager, &job_id, Duration::from_secs(5)).await;
}

#[tokio::test]
async fn invalid_batch_is_bad_request_with_error_body() {
    let (app, _engine) = test_app(StubFetcher::new()).await;

    let response = app
        .oneshot(post_json(
            "/api/scrape",
            json!({"user_id": 7, "songs": []}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn unknown_job_status_is_not_found() {
    let (app, _engine) = test_app(StubFetcher::new()).await;

    let response = app.oneshot(get("/api/job/9_0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn download_of_running_or_failed_job_is_bad_request() {
    let fetcher = StubFetcher::new().song("https://songs.test/1", None, None);
    let (app, engine) = test_app(fetcher).await;

    let job_id = engine
        .manager
        .submit(1, vec![helpers::submission("One", "https://songs.test/1")])
        .await
        .unwrap();
    wait_for_terminal(&engine.manager, &job_id, Duration::from_secs(5)).await;

    let response = app
        .oneshot(get(&format!("/api/download/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completed_job_downloads_as_zip_attachment() {
    let fetcher = StubFetcher::new().song("https://songs.test/1", Some("v"), Some(b"a"));
    let (app, engine) = test_app(fetcher).await;

    let job_id = engine
        .manager
        .submit(1, vec![helpers::submission("One", "https://songs.test/1")])
        .await
        .unwrap();
    wait_for_terminal(&engine.manager, &job_id, Duration::from_secs(5)).await;

    let response = app
        .oneshot(get(&format!("/api/download/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/zip"
    );
    assert!(response.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .contains(&format!("{}.zip", job_id)));
}

#[tokio::test]
async fn session_flow_over_http() {
    let (app, _engine) = test_app(StubFetcher::new()).await;

    let response = app
        .clone()
        .oneshot(post_json("/api/session/7/start", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["state"], "awaiting_title");

    for value in ["My Song", "My Artist", "https://songs.test/1"] {
        let response = app
            .clone()
            .oneshot(post_json("/api/session/7/field", json!({"value": value})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post_json("/api/session/7/confirm", json!({})))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["state"], "awaiting_title");
    assert_eq!(body["queued_songs"], 1);

    let response = app.clone().oneshot(get("/api/session/7/queue")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["songs"][0]["title"], "My Song");

    // second start mid-conversation conflicts
    let response = app
        .clone()
        .oneshot(post_json("/api/session/7/start", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _engine) = test_app(StubFetcher::new()).await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_seconds"].is_u64());
}
