use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use petal_broker::RedisPublisher;
use petal_gateway::{Deleter, Getter, Lister, Uploader};
use petal_meta::MetaStore;
use petal_object::S3ObjectStore;
use petal_server::api::{self, AppState};
use petal_server::config::PetalConfig;
use petal_server::error::ServerError;

/// petal content-addressed blob server.
#[derive(Parser, Debug)]
#[command(name = "petal-server", version, about = "Content-addressed blob service")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "petal.yml")]
    config: PathBuf,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = PetalConfig::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Process-global clients, injected explicitly into each component.
    let objects = Arc::new(S3ObjectStore::connect(&config.object_store).await);
    let meta = Arc::new(
        MetaStore::connect(&config.metadata)
            .await
            .map_err(|e| ServerError::Startup(e.to_string()))?,
    );
    let publisher = Arc::new(
        RedisPublisher::connect(&config.broker)
            .await
            .map_err(|e| ServerError::Startup(e.to_string()))?,
    );

    let address = config.server.public_address();
    let state = AppState {
        uploader: Arc::new(Uploader::new(
            objects.clone(),
            meta.clone(),
            publisher,
            address.clone(),
        )),
        getter: Arc::new(Getter::new(meta.clone())),
        lister: Arc::new(Lister::new(meta.clone(), address)),
        deleter: Arc::new(Deleter::new(objects, meta)),
    };

    let app = api::router(state, &config.server);

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(address = %bind, "petal-server listening");

    // Graceful shutdown with a bounded drain: stop accepting on the first
    // signal, then give in-flight requests the configured window.
    let (shutdown_tx, mut drain_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut serve_rx = drain_rx.clone();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = serve_rx.changed().await;
    });

    let drain_window = Duration::from_secs(config.server.shutdown_timeout_seconds);
    tokio::select! {
        result = server => result?,
        () = async {
            let _ = drain_rx.changed().await;
            tokio::time::sleep(drain_window).await;
        } => {
            warn!(seconds = drain_window.as_secs(), "drain window elapsed, forcing shutdown");
        }
    }

    info!("petal-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
