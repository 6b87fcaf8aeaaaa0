//! Router-level API tests
//!
//! Exercise validation, conflict, and acceptance behavior through the
//! axum router with mock collaborators behind the pipeline.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use helpers::{
    build_pipeline, build_state, raw_file, wait_for_terminal, MockAligner, MockStorage,
    MockTranscoder,
};
use versealign::db::sessions;
use versealign::models::SessionStatus;
use versealign::build_router;

async fn setup_db(dir: &TempDir) -> sqlx::SqlitePool {
    versealign::db::init_database_pool(&dir.path().join("sessions.db"))
        .await
        .unwrap()
}

fn router_with_storage(
    pool: sqlx::SqlitePool,
    storage: Arc<MockStorage>,
    dir: &TempDir,
) -> axum::Router {
    let pipeline = build_pipeline(
        pool.clone(),
        storage,
        Arc::new(MockTranscoder::default()),
        Arc::new(MockAligner::default()),
        dir.path().join("work"),
    );
    build_router(build_state(pool, pipeline))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn missing_parameters_are_rejected() {
    let dir = TempDir::new().unwrap();
    let pool = setup_db(&dir).await;
    let app = router_with_storage(pool, Arc::new(MockStorage::default()), &dir);

    for uri in [
        "/align",
        "/align?session-id=s1",
        "/align?session-id=s1&separator=lineBreak",
        "/align?separator=lineBreak&lang=eng",
        "/align?session-id=s1&separator=lineBreak&lang=%20",
    ] {
        let response = app.clone().oneshot(post(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {}", uri);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn session_without_files_is_404() {
    let dir = TempDir::new().unwrap();
    let pool = setup_db(&dir).await;
    let app = router_with_storage(pool, Arc::new(MockStorage::default()), &dir);

    let response = app
        .oneshot(post("/align?session-id=s1&separator=lineBreak&lang=eng"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn in_progress_session_is_rejected_with_400() {
    let dir = TempDir::new().unwrap();
    let pool = setup_db(&dir).await;

    let mut storage = MockStorage::with_files(vec![
        raw_file("s1", "a.wav"),
        raw_file("s1", "a.txt"),
    ]);
    storage.set_content("sessions/s1/a.txt", "Hello");
    let app = router_with_storage(pool.clone(), Arc::new(storage), &dir);

    sessions::claim_session(&pool, "s1", Utc::now()).await.unwrap();
    sessions::set_progress(&pool, "s1", 1).await.unwrap();

    let response = app
        .oneshot(post("/align?session-id=s1&separator=lineBreak&lang=eng"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "ALREADY_IN_PROGRESS");

    // The rejected request mutated nothing.
    let record = sessions::load_session(&pool, "s1").await.unwrap().unwrap();
    assert_eq!(record.status, SessionStatus::InProgress);
    assert_eq!(record.progress, Some(1));
}

#[tokio::test]
async fn accepted_job_runs_to_done() {
    let dir = TempDir::new().unwrap();
    let pool = setup_db(&dir).await;

    let mut storage = MockStorage::with_files(vec![
        raw_file("s1", "a.wav"),
        raw_file("s1", "a.txt"),
        raw_file("s1", "orphan.wav"),
    ]);
    storage.set_content("sessions/s1/a.txt", "Hello\nWorld");
    let app = router_with_storage(pool.clone(), Arc::new(storage), &dir);

    let response = app
        .clone()
        .oneshot(post("/align?session-id=s1&separator=lineBreak&lang=eng"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "IN_PROGRESS");
    assert_eq!(body["matched_pairs"], 1);

    let record = wait_for_terminal(&pool, "s1").await;
    assert_eq!(record.status, SessionStatus::Done);
    assert_eq!(record.progress, Some(1));

    // The session record endpoint reflects the same state.
    let response = app.oneshot(get("/sessions/s1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "DONE");
    assert_eq!(body["timestamps"][0]["audio_file"], "a.wav");
}

#[tokio::test]
async fn unknown_session_record_is_404() {
    let dir = TempDir::new().unwrap();
    let pool = setup_db(&dir).await;
    let app = router_with_storage(pool, Arc::new(MockStorage::default()), &dir);

    let response = app.oneshot(get("/sessions/absent")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn identify_returns_language() {
    let dir = TempDir::new().unwrap();
    let pool = setup_db(&dir).await;
    let app = router_with_storage(pool, Arc::new(MockStorage::default()), &dir);

    let response = app
        .oneshot(get("/identify?session-id=s1&file-name=a.wav"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["language"], "eng");
}

#[tokio::test]
async fn identify_download_failure_is_400() {
    let dir = TempDir::new().unwrap();
    let pool = setup_db(&dir).await;

    let mut storage = MockStorage::default();
    storage.fail_paths = vec!["a.wav".to_string()];
    let app = router_with_storage(pool, Arc::new(storage), &dir);

    let response = app
        .oneshot(get("/identify?session-id=s1&file-name=a.wav"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn identify_requires_both_parameters() {
    let dir = TempDir::new().unwrap();
    let pool = setup_db(&dir).await;
    let app = router_with_storage(pool, Arc::new(MockStorage::default()), &dir);

    let response = app
        .oneshot(get("/identify?session-id=s1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let pool = setup_db(&dir).await;
    let app = router_with_storage(pool, Arc::new(MockStorage::default()), &dir);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "versealign");
}
