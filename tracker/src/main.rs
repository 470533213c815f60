//! `order-tracker` command-line entry point.

use clap::Parser;
use order_tracker::app;
use order_tracker::cli::{Cli, Command};
use order_tracker::config::Config;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;
    let _log_guard = order_tracker::logging::init(config.log_dir.as_deref())?;

    info!(
        database = %config.database.redacted_url(),
        model = %config.extraction.model,
        retry_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    let result = execute(cli.command, &config).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Command failed");
    }
    result
}

async fn execute(command: Command, config: &Config) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();

    match command {
        Command::Run => {
            info!("Service start");
            let report = app::run(config, &mut stdout).await?;
            info!(
                created = report.created,
                updated = report.updated,
                stale = report.stale,
                failed = report.failures.len(),
                "Service end"
            );
        }
        Command::Find { filter } => {
            let store = Arc::new(app::connect_store(config).await?);
            let retrying = app::retrying_store(config, store.clone());
            let count = app::find(retrying.as_ref(), filter, &mut stdout).await;
            store.close().await;
            info!(count = count?, "Shipment entries printed");
        }
        Command::SetTransshipment {
            number,
            trans_carrier,
            package_number,
        } => {
            let store = Arc::new(app::connect_store(config).await?);
            let retrying = app::retrying_store(config, store.clone());
            let result =
                app::set_transshipment(retrying.as_ref(), &number, &trans_carrier, &package_number)
                    .await;
            store.close().await;
            result?;
            info!(number = %number, "Transshipment recorded");
        }
        Command::Migrate => {
            let store = app::connect_store(config).await?;
            let result = store.migrate().await;
            store.close().await;
            result?;
            info!("Order store schema is up to date");
        }
    }

    Ok(())
}
