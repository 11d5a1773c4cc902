use event_chat_hub::{chat::SystemClock, gateway, AppState, Hub, ServerConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "event_chat_hub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting event chat hub");

    let config = ServerConfig::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        outbound_capacity = config.hub.outbound_capacity,
        backpressure = %config.hub.backpressure,
        retention = %config.hub.retention,
        issuer = %config.tokens.issuer(),
        "Configuration loaded"
    );

    let (hub, hub_task) = Hub::spawn(config.hub.clone(), Arc::new(SystemClock));
    let app = gateway::router(AppState::new(hub.clone(), config.tokens));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server running on http://{}", listener.local_addr()?);

    // Upgraded sockets outlive the HTTP drain, so release them through the hub
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, releasing chat connections");
            if let Err(e) = hub.shutdown().await {
                warn!(error = %e, "Chat hub already stopped");
            }
        })
        .await?;

    hub_task.await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
