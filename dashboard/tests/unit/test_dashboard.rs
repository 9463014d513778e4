//! End-to-end dashboard tests: submissions and the build-log stream together

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::routing::post;
use axum::{Json, Router};
use openapi_client::{DeployRequest, DeployResponse, DeploymentType};
use tokio::sync::Notify;

use common::{lines_of, spawn_backend, wait_for_lines, wait_for_state, wait_until, with_timeout, FakeLogStream};
use deploydash::app::options::AppOptions;
use deploydash::app::state::Dashboard;
use deploydash::channel::ChannelState;
use deploydash::errors::SubmissionError;
use deploydash::models::deployment::{DeploymentKind, DeploymentStatus};

/// A deploy backend that holds requests for repos containing "held" until
/// the gate is opened, and rejects repos containing "fail".
struct GatedBackend {
    base_url: String,
    gate: Arc<Notify>,
    hits: Arc<AtomicUsize>,
}

impl GatedBackend {
    async fn spawn() -> Self {
        let gate = Arc::new(Notify::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let (handler_gate, counter) = (gate.clone(), hits.clone());

        let router = Router::new().route(
            "/deploy",
            post(move |Json(request): Json<DeployRequest>| {
                let (gate, counter) = (handler_gate.clone(), counter.clone());
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if request.repo_url.contains("held") {
                        gate.notified().await;
                    }
                    if request.repo_url.contains("fail") {
                        return Json(DeployResponse::failed("build failed"));
                    }
                    let name = request.repo_url.rsplit('/').next().unwrap_or_default().to_string();
                    Json(DeployResponse::deployed(
                        format!("http://localhost:8070/{name}"),
                        DeploymentType::Static,
                    ))
                }
            }),
        );

        Self {
            base_url: spawn_backend(router).await,
            gate,
            hits,
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn dashboard(backend: &GatedBackend, stream: &FakeLogStream) -> Arc<Dashboard> {
    let options = AppOptions {
        backend_base_url: backend.base_url.clone(),
        logs_url: stream.url.clone(),
        view_height: 3,
        ..Default::default()
    };
    Arc::new(Dashboard::init(&options).unwrap())
}

#[tokio::test]
async fn test_successful_submission_is_recorded() {
    let backend = GatedBackend::spawn().await;
    let stream = FakeLogStream::spawn().await;
    let dashboard = dashboard(&backend, &stream);

    dashboard.submit_deployment("https://github.com/a/abc").await.unwrap();

    let deployments = dashboard.current_deployments();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].kind, DeploymentKind::Static);
    assert_eq!(deployments[0].status, DeploymentStatus::Deployed);
    assert_eq!(deployments[0].url, "http://localhost:8070/abc");
    assert_eq!(deployments[0].display_name(dashboard.public_base_url()), "abc");
    dashboard.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_registry_follows_completion_order() {
    let backend = GatedBackend::spawn().await;
    let stream = FakeLogStream::spawn().await;
    let dashboard = dashboard(&backend, &stream);

    let started_first = {
        let dashboard = dashboard.clone();
        tokio::spawn(async move { dashboard.submit_deployment("https://github.com/a/held-first").await })
    };
    wait_until(|| backend.hits() == 1).await;

    dashboard.submit_deployment("https://github.com/a/second").await.unwrap();
    assert_eq!(dashboard.current_deployments()[0].url, "http://localhost:8070/second");

    backend.gate.notify_one();
    with_timeout(started_first).await.unwrap().unwrap();

    let urls: Vec<String> = dashboard.current_deployments().into_iter().map(|d| d.url).collect();
    assert_eq!(
        urls,
        vec!["http://localhost:8070/held-first", "http://localhost:8070/second"]
    );
    assert!(dashboard.current_deployments()[0].id > dashboard.current_deployments()[1].id);
    dashboard.shutdown().await.unwrap();
}

async fn logs_flow_while_submission_pending(repo_url: &'static str) -> Arc<Dashboard> {
    let backend = GatedBackend::spawn().await;
    let stream = FakeLogStream::spawn().await;
    let dashboard = dashboard(&backend, &stream);
    wait_for_state(dashboard.channel(), ChannelState::Open).await;

    let pending = {
        let dashboard = dashboard.clone();
        tokio::spawn(async move { dashboard.submit_deployment(repo_url).await })
    };
    wait_until(|| backend.hits() == 1).await;

    let expected: Vec<String> = (1..=10).map(|i| format!("log {i}")).collect();
    for line in &expected {
        stream.send_message(line);
    }
    wait_for_lines(dashboard.channel(), 10).await;
    assert!(!pending.is_finished(), "submission should still be pending");
    assert_eq!(lines_of(dashboard.channel()), expected);

    backend.gate.notify_one();
    let _ = with_timeout(pending).await.unwrap();
    assert_eq!(lines_of(dashboard.channel()), expected);
    dashboard
}

#[tokio::test]
async fn test_logs_flow_while_successful_submission_pending() {
    let dashboard = logs_flow_while_submission_pending("https://github.com/a/held-ok").await;
    assert_eq!(dashboard.current_deployments().len(), 1);
    dashboard.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_logs_flow_while_failing_submission_pending() {
    let dashboard = logs_flow_while_submission_pending("https://github.com/a/held-fail").await;
    assert!(dashboard.current_deployments().is_empty());
    dashboard.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failures_leave_registry_untouched() {
    let backend = GatedBackend::spawn().await;
    let stream = FakeLogStream::spawn().await;
    let dashboard = dashboard(&backend, &stream);

    assert_eq!(
        dashboard.submit_deployment("   ").await,
        Err(SubmissionError::EmptyInput)
    );
    assert_eq!(backend.hits(), 0);

    let err = dashboard
        .submit_deployment("https://github.com/a/fail")
        .await
        .unwrap_err();
    assert_eq!(err.reason(), Some("build failed"));

    assert!(dashboard.current_deployments().is_empty());
    dashboard.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_clear_and_tail_view() {
    let backend = GatedBackend::spawn().await;
    let stream = FakeLogStream::spawn().await;
    let dashboard = dashboard(&backend, &stream);

    for i in 0..5 {
        stream.send_message(&format!("line {i}"));
    }
    wait_for_lines(dashboard.channel(), 5).await;

    let view = dashboard.log_view();
    let visible: Vec<String> = view.lines.iter().map(|l| l.to_string()).collect();
    assert_eq!(visible, vec!["line 2", "line 3", "line 4"]);
    assert_eq!(view.viewport.last(), Some(4));

    dashboard.clear_logs();
    assert!(dashboard.current_log_lines().is_empty());
    assert!(dashboard.log_view().lines.is_empty());

    stream.send_message("fresh");
    wait_for_lines(dashboard.channel(), 1).await;
    assert_eq!(lines_of(dashboard.channel()), vec!["fresh"]);
    assert_eq!(dashboard.log_view().viewport.last(), Some(0));
    dashboard.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_keeps_previous_lines() {
    let backend = GatedBackend::spawn().await;
    let stream = FakeLogStream::spawn().await;
    let dashboard = dashboard(&backend, &stream);

    stream.send_message("before");
    wait_for_lines(dashboard.channel(), 1).await;
    stream.close();
    wait_for_state(dashboard.channel(), ChannelState::Closed).await;

    dashboard.reconnect_logs();
    wait_for_state(dashboard.channel(), ChannelState::Open).await;
    wait_until(|| stream.connections() == 2).await;
    stream.send_message("after");
    wait_for_lines(dashboard.channel(), 2).await;

    assert_eq!(lines_of(dashboard.channel()), vec!["before", "after"]);
    dashboard.shutdown().await.unwrap();
    assert_eq!(dashboard.log_state(), ChannelState::Closed);
}
