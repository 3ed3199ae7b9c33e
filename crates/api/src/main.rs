//! Reaction relay control server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use relay_common::config::{FileConfigSource, SettingsFile};
use relay_common::logging;
use relay_engine::supervisor::PipelineSupervisor;
use relay_telegram::TelegramConnector;

use relay_api::config::ServerConfig;
use relay_api::routes::create_router;
use relay_api::state::AppState;

/// The control routes take no request bodies.
const MAX_BODY_BYTES: usize = 4 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;

    // Pipeline settings are resolved on every start; only `[logging]` is read here
    let source = FileConfigSource::from_env();
    let settings = SettingsFile::read(source.path());
    let log_settings = settings
        .as_ref()
        .map(|settings| settings.logging.clone())
        .unwrap_or_default();

    // Held until exit so buffered log lines reach the file
    let _guard = logging::init_tracing(&log_settings)?;

    tracing::info!("Starting reaction relay control server...");
    if let Err(e) = &settings {
        tracing::warn!(error = %e, "Using default logging settings");
    }
    tracing::info!(
        config = %source.path().display(),
        log_file = %log_settings.log_file,
        "Pipeline settings file"
    );

    let supervisor = Arc::new(PipelineSupervisor::new(
        Arc::new(source),
        Arc::new(TelegramConnector),
    ));
    let state = AppState::new(supervisor.clone());

    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received shutdown signal, stopping gracefully...");
            }
        })
        .await?;

    supervisor.stop().await;
    tracing::info!("Reaction relay control server stopped.");
    Ok(())
}
