use merlinflow_server::{app, config::ServerConfig, state::AppState};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Optional config file, overridden by MERLINFLOW__* variables
    let config_file = std::env::var_os("MERLINFLOW_CONFIG_FILE").map(PathBuf::from);
    let config = ServerConfig::load(config_file.as_deref()).expect("failed to load configuration");
    tracing::info!(
        traversal = ?config.executor.traversal,
        node_timeout_secs = config.executor.node_timeout_secs,
        run_timeout_secs = config.executor.run_timeout_secs,
        "Loaded configuration"
    );

    let state = AppState::from_config(&config).expect("failed to build service clients");
    let origin = config
        .cors_origin()
        .expect("allowed_origin is not a valid header value");
    let app = app(state, origin);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
