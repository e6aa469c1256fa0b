//! scoreline-sync binary entrypoint wiring the fetch cycle, source supervision and the
//! WebSocket, poll, SSE and REST transports.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scoreline_sync::{
    config::{AppConfig, server_port},
    routes,
    services::{cycle, source_supervisor},
    source::ItemSource,
    state::{self, AppState, clock::SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let source = build_source(&config)?;
    let app_state = AppState::new(config, source, Arc::new(SystemClock));

    tokio::spawn(source_supervisor::run(app_state.clone()));
    tokio::spawn(cycle::run(app_state.clone()));
    tokio::spawn(cycle::tick(app_state.clone()));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], server_port()));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Item source reached over HTTP, configured from the environment.
#[cfg(feature = "http-source")]
fn build_source(config: &AppConfig) -> anyhow::Result<Arc<dyn ItemSource>> {
    use scoreline_sync::source::http::{HttpItemSource, HttpSourceConfig};

    let source_config = HttpSourceConfig::from_env(config.full_fetch_timeout);
    info!(base_url = %source_config.base_url, "using HTTP item source");
    let source = HttpItemSource::new(source_config).context("building HTTP item source")?;
    Ok(Arc::new(source))
}

#[cfg(not(feature = "http-source"))]
fn build_source(_config: &AppConfig) -> anyhow::Result<Arc<dyn ItemSource>> {
    anyhow::bail!("built without an item source; enable the `http-source` feature")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
