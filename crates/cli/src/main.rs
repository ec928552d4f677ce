//! Process bootstrap for the zapbridge binary.

use std::{net::SocketAddr, sync::Arc};

use {
    anyhow::{Context, Result},
    clap::Parser,
    tokio::{net::TcpListener, signal},
    tracing::info,
    tracing_subscriber::EnvFilter,
};

use {
    zapbridge_gateway::router,
    zapbridge_platform::{DEFAULT_SIDECAR_URL, SidecarFactory},
    zapbridge_session::SessionService,
};

#[derive(Debug, Parser)]
#[command(name = "zapbridge", version, about)]
struct Args {
    /// Port the HTTP surface listens on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// WebSocket endpoint of the browser-automation sidecar.
    #[arg(long, env = "SIDECAR_URL", default_value = DEFAULT_SIDECAR_URL)]
    sidecar_url: String,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let factory = Arc::new(SidecarFactory::new(args.sidecar_url.clone()));
    let service = Arc::new(SessionService::new(factory));
    let app = router(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, sidecar_url = %args.sidecar_url, "zapbridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
