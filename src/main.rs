//! prosper-autoinvest — scheduled auto-investor for Prosper.
//!
//! Entry point for the scheduler. Loads configuration, initialises
//! structured logging, runs exactly one allocation and exits. A failed
//! run exits non-zero so the scheduler can alert on it.

use anyhow::{Context, Result};
use tracing::{error, info};

use prosper_autoinvest::config::{RunConfig, SecretSource};
use prosper_autoinvest::engine::runner::Runner;
use prosper_autoinvest::marketplace::prosper::ProsperClient;
use prosper_autoinvest::secrets::gcp::SecretManagerProvider;
use prosper_autoinvest::secrets::{CredentialProvider, EnvCredentialProvider};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    if let Err(e) = run().await {
        error!(error = format!("{e:#}"), "Investment run failed");
        return Err(e);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let cfg = RunConfig::from_env().context("Invalid configuration")?;

    let credentials: Box<dyn CredentialProvider> = match &cfg.secret_source {
        SecretSource::Gcp { project } => {
            info!(project = %project, "Reading credentials from Secret Manager");
            Box::new(SecretManagerProvider::new(project.clone())?)
        }
        SecretSource::Env => {
            info!("Reading credentials from environment");
            Box::new(EnvCredentialProvider)
        }
    };

    let marketplace = ProsperClient::new(cfg.endpoints.clone())?;

    let report = Runner::new(&cfg, credentials.as_ref(), &marketplace)
        .run()
        .await?;

    info!(%report, "Investment run finished");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("prosper_autoinvest=info"));

    let json_logging = std::env::var("PROSPER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
