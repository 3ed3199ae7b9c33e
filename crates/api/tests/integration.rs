//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to drive the Axum router without a real HTTP
//! server. The transport is replaced by in-memory fakes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use relay_api::routes::create_router;
use relay_api::state::AppState;
use relay_common::config::{ConfigSource, Credentials, PipelineConfig};
use relay_common::error::AppError;
use relay_common::types::{ChatId, InboundEvent, Participant};
use relay_engine::supervisor::PipelineSupervisor;
use relay_engine::transport::{Connector, EventListener, ParticipantSource, Session};
use relay_notifier::MessageSender;

// ============================================================
// Fakes
// ============================================================

/// Never yields an event; the run lasts until stopped.
struct IdleListener;

#[async_trait]
impl EventListener for IdleListener {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, AppError> {
        std::future::pending().await
    }
}

struct NoParticipants;

#[async_trait]
impl ParticipantSource for NoParticipants {
    async fn fetch_participants(
        &self,
        _channel_id: ChatId,
        _offset: usize,
        _limit: usize,
    ) -> Result<Vec<Participant>, AppError> {
        Ok(Vec::new())
    }
}

struct NullSender;

#[async_trait]
impl MessageSender for NullSender {
    async fn send_message(&self, _destination: ChatId, _text: &str) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Default)]
struct IdleConnector {
    connects: AtomicUsize,
}

#[async_trait]
impl Connector for IdleConnector {
    async fn connect(&self, _config: &PipelineConfig) -> Result<Session, AppError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Session {
            events: Box::new(IdleListener),
            participants: Arc::new(NoParticipants),
            sender: Arc::new(NullSender),
        })
    }
}

/// Blocks in `connect` until released.
#[derive(Default)]
struct GatedConnector {
    entered: tokio::sync::Notify,
    release: tokio::sync::Notify,
}

#[async_trait]
impl Connector for GatedConnector {
    async fn connect(&self, _config: &PipelineConfig) -> Result<Session, AppError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Session {
            events: Box::new(IdleListener),
            participants: Arc::new(NoParticipants),
            sender: Arc::new(NullSender),
        })
    }
}

struct RejectingConnector;

#[async_trait]
impl Connector for RejectingConnector {
    async fn connect(&self, _config: &PipelineConfig) -> Result<Session, AppError> {
        Err(AppError::TransportConnect("401 Unauthorized".to_string()))
    }
}

struct MissingConfig;

impl ConfigSource for MissingConfig {
    fn load(&self) -> Result<PipelineConfig, AppError> {
        Err(AppError::Config(
            "Missing one or more required environment variables for Telegram API credentials: TELEGRAM_BOT_TOKEN"
                .to_string(),
        ))
    }
}

// ============================================================
// Helpers
// ============================================================

fn test_config() -> PipelineConfig {
    PipelineConfig::from_toml_str(
        "",
        Credentials {
            api_id: "123456".to_string(),
            api_hash: "fake_api_hash".to_string(),
            bot_token: "fake_bot_token".to_string(),
            owner_id: "123456789".to_string(),
        },
    )
    .unwrap()
}

fn build_app(config: Arc<dyn ConfigSource>, connector: Arc<dyn Connector>) -> Router {
    let supervisor = Arc::new(PipelineSupervisor::new(config, connector));
    create_router(AppState::new(supervisor))
}

fn idle_app() -> (Router, Arc<IdleConnector>) {
    let connector = Arc::new(IdleConnector::default());
    (
        build_app(Arc::new(test_config()), connector.clone()),
        connector,
    )
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

// ============================================================
// Route tests
// ============================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = idle_app();

    let (status, json) = send(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "reaction-relay-api");
}

#[tokio::test]
async fn test_status_when_stopped() {
    let (app, _) = idle_app();

    let (status, json) = send(&app, "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bot_running"], false);
    assert_eq!(json["state"], "stopped");
    assert!(json["run_id"].is_null());
    assert!(json["started_at"].is_null());
}

#[tokio::test]
async fn test_start_then_start_again() {
    let (app, connector) = idle_app();

    let (status, json) = send(&app, "POST", "/start-bot").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "Bot is starting...");

    let (status, json) = send(&app, "POST", "/start-bot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Bot is already running.");
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

    let (_, json) = send(&app, "GET", "/status").await;
    assert_eq!(json["bot_running"], true);
    assert_eq!(json["state"], "running");
    assert!(json["run_id"].is_string());
    assert!(json["started_at"].is_string());

    send(&app, "POST", "/stop-bot").await;
}

#[tokio::test]
async fn test_stop_running_then_stop_again() {
    let (app, _) = idle_app();
    send(&app, "POST", "/start-bot").await;

    let (status, json) = send(&app, "POST", "/stop-bot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Bot stopped successfully.");

    let (status, json) = send(&app, "POST", "/stop-bot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Bot is not running.");

    let (_, json) = send(&app, "GET", "/status").await;
    assert_eq!(json["bot_running"], false);
}

#[tokio::test]
async fn test_stop_when_never_started() {
    let (app, _) = idle_app();

    let (status, json) = send(&app, "POST", "/stop-bot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Bot is not running.");
}

#[tokio::test]
async fn test_start_with_bad_config_is_500() {
    let app = build_app(Arc::new(MissingConfig), Arc::new(IdleConnector::default()));

    let (status, json) = send(&app, "POST", "/start-bot").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("TELEGRAM_BOT_TOKEN")
    );

    let (_, json) = send(&app, "GET", "/status").await;
    assert_eq!(json["state"], "stopped");
}

#[tokio::test]
async fn test_start_with_rejected_credentials_is_502() {
    let app = build_app(Arc::new(test_config()), Arc::new(RejectingConnector));

    let (status, json) = send(&app, "POST", "/start-bot").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().unwrap().contains("Unauthorized"));

    let (_, json) = send(&app, "GET", "/status").await;
    assert_eq!(json["bot_running"], false);
}

#[tokio::test]
async fn test_stop_during_start_reports_cancelled() {
    let connector = Arc::new(GatedConnector::default());
    let app = build_app(Arc::new(test_config()), connector.clone());

    let start = tokio::spawn({
        let app = app.clone();
        async move { send(&app, "POST", "/start-bot").await }
    });
    connector.entered.notified().await;

    let (_, json) = send(&app, "GET", "/status").await;
    assert_eq!(json["state"], "starting");

    let (status, json) = send(&app, "POST", "/stop-bot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Bot stopped successfully.");

    connector.release.notify_one();
    let (status, json) = start.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Bot start was cancelled.");

    let (_, json) = send(&app, "GET", "/status").await;
    assert_eq!(json["bot_running"], false);
    assert_eq!(json["state"], "stopped");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _) = idle_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
