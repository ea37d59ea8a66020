mod handler;

use handler::LoggingHandler;

use anyhow::Context;
use axum::{http::StatusCode, routing::get, Router};
use smfc_config::SmfConfig;
use smfc_shared::Protocol;
use smfc_sm_runtime::{SmfActor, UdpPath};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    // Initialize logging
    smfc_logging::init_with_level(&config.log_level);

    // Register metrics
    smfc_metrics::register_metrics().context("metrics registration failed")?;

    info!(
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        gtpc = %config.gtpc_addr,
        pfcp = %config.pfcp_addr,
        "Starting SMF session daemon"
    );

    let (tx, rx) = mpsc::channel(config.event_queue_depth);
    let gtp_path = UdpPath::new(Protocol::Gtp, config.gtpc_addr, tx.clone());
    let pfcp_path = UdpPath::new(Protocol::Pfcp, config.pfcp_addr, tx);

    let mut actor = SmfActor::new(
        LoggingHandler::default(),
        gtp_path,
        pfcp_path,
        rx,
        config.policy_answer_timeout(),
    )
    .with_transaction_timeout(config.transaction_timeout());
    actor.start().await.context("SMF startup failed")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(serve_metrics(config.metrics_port, shutdown.clone()));

    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        token.cancel();
    });

    actor.run(shutdown).await;
    info!("SMF session daemon stopped");
    Ok(())
}

/// Config file from the first argument or `SMFC_CONFIG`; defaults otherwise
fn load_config() -> anyhow::Result<SmfConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SMFC_CONFIG").ok());

    match path {
        Some(path) => smfc_config::load_config(&path)
            .with_context(|| format!("cannot load config from {path}")),
        None => Ok(SmfConfig::default()),
    }
}

async fn serve_metrics(port: u16, shutdown: CancellationToken) {
    let app = Router::new().route("/metrics", get(metrics));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind metrics listener");
            return;
        }
    };
    info!(%addr, "Metrics endpoint listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
    {
        error!(error = %e, "Metrics server error");
    }
}

async fn metrics() -> Result<String, StatusCode> {
    smfc_metrics::gather_metrics().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
