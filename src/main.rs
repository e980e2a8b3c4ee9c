//! yeet -- minimal HTTP file relay.
//!
//! SIGTERM/SIGINT stop accepting connections and let in-flight transfers
//! finish before exiting.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use yeet::config::{Config, LoggingConfig};
use yeet::storage::backend::BlobStore;

/// Command-line arguments for the yeet server.
#[derive(Parser, Debug)]
#[command(name = "yeet", version, about = "Minimal HTTP file relay")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "yeet.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = yeet::config::load_config(&cli.config)?;
    init_logging(&config.logging);
    info!("Loaded configuration from {}", cli.config);

    let bind_addr = cli
        .bind
        .clone()
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        yeet::metrics::init_metrics()?;
        yeet::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let storage = open_storage(&config).await?;
    let keys = yeet::keys::build_generator(config.keys.strategy);
    info!("Key strategy: {}", config.keys.strategy.as_str());

    let state = Arc::new(yeet::AppState {
        config,
        storage,
        keys,
    });

    let app = yeet::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("yeet listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("yeet shut down");

    Ok(())
}

/// Install the global tracing subscriber.  `RUST_LOG` overrides the
/// configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Open the configured blob store backend.
async fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn BlobStore>> {
    let storage: Arc<dyn BlobStore> = match config.storage.backend.as_str() {
        "aws" => {
            let aws_config = config.storage.aws.as_ref().ok_or_else(|| {
                anyhow::anyhow!("storage.backend is 'aws' but storage.aws config section is missing")
            })?;
            let backend = yeet::storage::aws::AwsGatewayBackend::new(
                aws_config.bucket.clone(),
                aws_config.region.clone(),
                aws_config.prefix.clone(),
                non_empty(&aws_config.endpoint_url),
                aws_config.use_path_style,
                non_empty(&aws_config.access_key_id),
                non_empty(&aws_config.secret_access_key),
            )
            .await?;
            info!(
                "AWS gateway storage backend initialized: bucket={} region={} prefix='{}'",
                aws_config.bucket, aws_config.region, aws_config.prefix
            );
            Arc::new(backend)
        }
        "memory" => {
            info!("In-memory storage backend initialized (uploads are lost on exit)");
            Arc::new(yeet::storage::memory::MemoryBackend::new())
        }
        "local" => {
            let storage_root = &config.storage.local.root_dir;
            let backend = yeet::storage::local::LocalBackend::new(storage_root)?;
            info!("Local storage backend initialized at {}", storage_root);
            Arc::new(backend)
        }
        other => anyhow::bail!("unknown storage.backend '{}'", other),
    };
    Ok(storage)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
