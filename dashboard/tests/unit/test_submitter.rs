//! Deployment submitter tests against an in-process backend

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use openapi_client::{DeployRequest, DeployResponse, DeploymentType};
use tokio_test::{assert_err, assert_ok};

use common::{spawn_backend, unreachable_base_url};
use deploydash::deploy::DeploymentSubmitter;
use deploydash::errors::SubmissionError;
use deploydash::http::client::HttpClient;
use deploydash::models::deployment::{DeploymentKind, DeploymentStatus};

fn submitter(base_url: &str, timeout: Option<Duration>) -> DeploymentSubmitter {
    let http_client = HttpClient::new(base_url, timeout).unwrap();
    DeploymentSubmitter::new(Arc::new(http_client), "/deploy")
}

/// A backend that answers every deploy with `response` and counts hits
async fn backend(status: StatusCode, response: serde_json::Value) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/deploy",
        post(move |Json(_): Json<DeployRequest>| {
            let counter = counter.clone();
            let response = response.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (status, Json(response))
            }
        }),
    );
    (spawn_backend(router).await, hits)
}

#[tokio::test]
async fn test_accepted_deployment_becomes_record() {
    let (base_url, hits) = backend(
        StatusCode::OK,
        serde_json::json!({ "success": true, "url": "http://localhost:8070/abc", "type": "static" }),
    )
    .await;

    let record = assert_ok!(submitter(&base_url, None).submit("https://github.com/a/b.git").await);

    assert_eq!(record.kind, DeploymentKind::Static);
    assert_eq!(record.status, DeploymentStatus::Deployed);
    assert_eq!(record.url, "http://localhost:8070/abc");
    assert_eq!(record.repo_url, "https://github.com/a/b.git");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_request_body_carries_trimmed_repo_url() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let router = Router::new().route(
        "/deploy",
        post(move |Json(request): Json<serde_json::Value>| {
            sink.lock().unwrap().push(request);
            async { Json(DeployResponse::deployed("http://localhost:8070/x", DeploymentType::Dynamic)) }
        }),
    );
    let base_url = spawn_backend(router).await;

    let record = assert_ok!(submitter(&base_url, None).submit("  https://github.com/a/b.git\n").await);

    assert_eq!(record.kind, DeploymentKind::Dynamic);
    assert_eq!(
        *received.lock().unwrap(),
        vec![serde_json::json!({ "repoUrl": "https://github.com/a/b.git" })]
    );
}

#[tokio::test]
async fn test_empty_input_never_reaches_backend() {
    let (base_url, hits) = backend(StatusCode::OK, serde_json::json!({ "success": true })).await;
    let submitter = submitter(&base_url, None);

    for input in ["", "   ", "\t\n"] {
        assert_eq!(submitter.submit(input).await, Err(SubmissionError::EmptyInput));
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_backend_rejection_reason() {
    let (base_url, _) = backend(
        StatusCode::OK,
        serde_json::json!({ "success": false, "error": "Repository not found" }),
    )
    .await;

    let err = assert_err!(submitter(&base_url, None).submit("https://github.com/a/missing.git").await);
    assert_eq!(err, SubmissionError::failed("Repository not found"));
    assert_eq!(err.to_string(), "Deployment failed: Repository not found");
}

#[tokio::test]
async fn test_server_error_is_failure() {
    let (base_url, _) = backend(
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::json!({ "detail": "boom" }),
    )
    .await;

    let err = assert_err!(submitter(&base_url, None).submit("https://github.com/a/b.git").await);
    assert!(err.reason().unwrap().starts_with("HTTP 500"));
}

#[tokio::test]
async fn test_unreachable_backend_is_failure() {
    let err = assert_err!(
        submitter(&unreachable_base_url(), None)
            .submit("https://github.com/a/b.git")
            .await
    );
    assert!(matches!(err, SubmissionError::SubmissionFailed { .. }));
    assert!(!err.reason().unwrap().is_empty());
}

#[tokio::test]
async fn test_timeout_is_failure() {
    let router = Router::new().route(
        "/deploy",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(DeployResponse::deployed("http://localhost:8070/slow", DeploymentType::Static))
        }),
    );
    let base_url = spawn_backend(router).await;

    let err = assert_err!(
        submitter(&base_url, Some(Duration::from_millis(200)))
            .submit("https://github.com/a/b.git")
            .await
    );
    assert_eq!(err.reason(), Some("request timed out"));
}

#[tokio::test]
async fn test_ids_follow_completion_order() {
    let (base_url, _) = backend(
        StatusCode::OK,
        serde_json::json!({ "success": true, "url": "http://localhost:8070/a", "type": "static" }),
    )
    .await;
    let submitter = submitter(&base_url, None);

    let first = submitter.submit("https://github.com/a/one.git").await.unwrap();
    let second = submitter.submit("https://github.com/a/two.git").await.unwrap();
    assert!(second.id > first.id);
}
