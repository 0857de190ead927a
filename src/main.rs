use anyhow::{Context, Result};
use caution::identity::DocumentId;
use caution::service::{CautionApi, CautionService};
use caution::{api, config, logging};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Caches terms-and-conditions text and returns an AI-flagged summary"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Port to bind; overrides SERVER_PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Analyze one document and print its summary.
    Analyze {
        /// Document identity, typically the page URL.
        #[arg(long)]
        document_id: String,
        /// File containing the terms text.
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config().context("Failed to load configuration")?;
    let config = config::get_config();
    logging::init_tracing(config);
    tracing::debug!(
        server_port = ?config.server_port,
        cache_provider = ?config.cache_provider,
        llm_provider = ?config.llm_provider,
        analysis_model = %config.analysis_model,
        summary_model = %config.summary_model,
        vector_context = config.vector_context_enabled,
        "Loaded configuration"
    );

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, port).await,
        Command::Analyze { document_id, file } => analyze(config, &document_id, &file).await,
    }
}

async fn serve(config: &config::Config, port_override: Option<u16>) -> Result<()> {
    let service = CautionService::from_config(config)
        .await
        .context("Failed to initialize services")?;
    let app = api::create_router(Arc::new(service));

    let (listener, port) = bind_listener(port_override.or(config.server_port))
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated unexpectedly")?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn analyze(config: &config::Config, document_id: &str, file: &Path) -> Result<()> {
    let id = DocumentId::parse(document_id).context("Invalid document identity")?;
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let service = CautionService::from_config(config)
        .await
        .context("Failed to initialize services")?;
    let outcome = service
        .analyze(&id, &text)
        .await
        .context("Analysis failed")?;

    tracing::info!(
        document_id = %id,
        reused = outcome.reused,
        persisted = outcome.persisted,
        "Analysis finished"
    );
    println!("{}", outcome.result.summary_text);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn bind_listener(port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
