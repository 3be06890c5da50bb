//! pdfsuite server binary
//!
//! Stores blobs under `--storage-dir` and runs PDF operations for clients
//! using the pdfsuite orchestrator.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use pdfsuite_api::{build_router, AppState, BlobStore};
use pdfsuite_core::storage::DEFAULT_BUCKET;
use pdfsuite_core::invoker::DEFAULT_DISPATCH_FUNCTION;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for the pdfsuite server
#[derive(Parser, Debug)]
#[command(name = "pdfsuite-api")]
#[command(about = "Blob storage and PDF processing server for pdfsuite")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Directory blobs are stored in
    #[arg(long, env = "PDFSUITE_STORAGE_DIR", default_value = "./data")]
    storage_dir: PathBuf,

    /// Base URL used in result links (defaults to the bind address)
    #[arg(long, env = "PDFSUITE_PUBLIC_URL")]
    public_url: Option<String>,

    /// Bucket the functions read from and write to
    #[arg(long, default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Name of the function that reads the operation from the payload
    #[arg(long, default_value = DEFAULT_DISPATCH_FUNCTION)]
    dispatch_function: String,

    /// Request body limit in MiB
    #[arg(long, default_value = "25")]
    max_body_mb: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::fs::create_dir_all(&args.storage_dir).await?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let public_url = args.public_url.unwrap_or_else(|| {
        let host = if local_addr.ip().is_unspecified() {
            "127.0.0.1".to_string()
        } else {
            local_addr.ip().to_string()
        };
        format!("http://{}:{}", host, local_addr.port())
    });

    let state = AppState::new(
        BlobStore::new(&args.storage_dir),
        &args.bucket,
        &public_url,
    )
    .with_dispatch_function(&args.dispatch_function)
    .with_max_body_bytes(args.max_body_mb * 1024 * 1024);

    info!("Server listening on http://{}", local_addr);
    info!("Storage directory: {}", args.storage_dir.display());
    info!("Result links use {}", public_url);

    axum::serve(listener, build_router(state)).await?;

    Ok(())
}
