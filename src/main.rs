//! Transcript Annotator server
//!
//! Hosts one annotation session over a small JSON API and autosaves it to
//! a local file.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_annotator::config::Config;
use transcript_annotator::persist::{read_snapshot, JsonFileSink};
use transcript_annotator::routes;
use transcript_annotator::state::AppState;
use transcript_annotator::taxonomy::Taxonomy;
use transcript_annotator::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transcript_annotator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Transcript Annotator v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Save file: {}", config.storage.save_path.display());

    let taxonomy = match &config.taxonomy.path {
        Some(path) => Taxonomy::load(path)
            .await
            .with_context(|| format!("loading taxonomy from {}", path.display()))?,
        None => {
            tracing::info!("No taxonomy file configured, using built-in categories");
            Taxonomy::builtin()
        }
    };

    let sink = Arc::new(JsonFileSink::new(&config.storage.save_path));
    let mut session = Session::new(taxonomy).with_sink(sink);

    // Restore the previous run
    match read_snapshot(&config.storage.save_path).await {
        Ok(Some(contents)) => match session.load_save_str(&contents) {
            Ok(summary) => tracing::info!(
                documents = summary.documents,
                records = summary.records,
                "Restored previous session {}",
                summary.session_id
            ),
            Err(e) => tracing::warn!("Previous save file ignored: {}", e),
        },
        Ok(None) => tracing::info!("No previous save file, starting fresh"),
        Err(e) => tracing::warn!("Could not read previous save file: {}", e),
    }

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid ANNOTATOR_HOST {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    let app = routes::app(AppState::new(config, session));

    tracing::info!("Transcript Annotator listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
