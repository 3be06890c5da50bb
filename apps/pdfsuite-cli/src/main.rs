//! pdfsuite command-line driver
//!
//! Runs one operation through the orchestrator against a pdfsuite server (or
//! any backend following the same storage and function conventions) and
//! optionally downloads the results.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pdfsuite_core::{
    ClientConfig, FunctionRouting, HttpInvoker, HttpStorage, Orchestrator, OrchestratorConfig,
    ProgressUpdate, RunPhase,
};
use tracing::{debug, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{load_file, Command};

#[derive(Parser, Debug)]
#[command(name = "pdfsuite")]
#[command(about = "Run PDF operations against a pdfsuite backend")]
struct Cli {
    /// Base URL of the backend
    #[arg(long, global = true, env = "PDFSUITE_URL")]
    server_url: Option<String>,

    /// API key sent with every request
    #[arg(long, global = true, env = "PDFSUITE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Storage bucket for uploads; must be the bucket the server's functions read from
    #[arg(long, global = true, env = "PDFSUITE_BUCKET")]
    bucket: Option<String>,

    /// Send every operation to this single dispatch function
    #[arg(long, global = true)]
    dispatch: Option<String>,

    /// Give up on the remote call after this many seconds
    #[arg(long, global = true, default_value = "60")]
    timeout_secs: u64,

    /// Download results into this directory
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(
            self.server_url.clone().unwrap_or_default(),
            self.api_key.clone().unwrap_or_default(),
        );
        if let Some(bucket) = &self.bucket {
            config = config.with_bucket(bucket);
        }
        if let Some(function) = &self.dispatch {
            config = config.with_routing(FunctionRouting::Dispatch {
                function: function.clone(),
            });
        }
        config
    }
}

/// Last path segment of a result URL
fn file_name_from_url(url: &str) -> &str {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("result.pdf")
}

async fn download_results(storage: &HttpStorage, urls: &[String], dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;
    for url in urls {
        let bytes = storage.download(url).await?;
        let target = dir.join(file_name_from_url(url));
        tokio::fs::write(&target, &bytes)
            .await
            .with_context(|| format!("writing {}", target.display()))?;
        println!("Saved {}", target.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.client_config();
    if let Some(missing) = config.missing_setting() {
        bail!("No {} configured; pass it as a flag or set it in the environment", missing);
    }
    debug!("Client configuration: {:?}", config);

    let output = cli.output.clone();
    let invoke_timeout = Duration::from_secs(cli.timeout_secs);
    let request = cli.command.into_request()?;
    let inputs = request
        .inputs
        .iter()
        .map(|path| load_file(path).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;

    let storage = HttpStorage::new(config.clone());
    let orchestrator = Orchestrator::new(
        request.kind,
        Arc::new(HttpStorage::new(config.clone())),
        Arc::new(HttpInvoker::new(config)),
    )
    .with_config(OrchestratorConfig {
        invoke_timeout,
        ..OrchestratorConfig::default()
    })
    .with_progress_callback(|update: &ProgressUpdate| {
        info!("[{:>3}%] {}", update.percent, update.message);
    });

    orchestrator.set_inputs(inputs)?;
    if let Some(options) = request.options {
        orchestrator.set_options(options)?;
    }

    let snapshot = orchestrator.start().await?;
    match (snapshot.phase, snapshot.result_artifact) {
        (RunPhase::Succeeded, Some(artifact)) => {
            for url in artifact.urls() {
                println!("{}", url);
            }
            if let Some(dir) = output {
                download_results(&storage, artifact.urls(), &dir).await?;
            }
            Ok(())
        }
        _ => bail!(
            "{} failed: {}",
            request.kind,
            snapshot
                .failure_reason
                .unwrap_or_else(|| "no result was produced".to_string())
        ),
    }
}
