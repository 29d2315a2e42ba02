use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use household_analytics::config::{redact_url, ServiceConfig};
use household_analytics::loader::{DatabaseLoader, FileLoader, SourceLoader};
use household_analytics::AnalysisEngine;

#[derive(Parser)]
#[command(name = "household-analytics", about = "Household size vs spend analytics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the configured sources and print the view as JSON.
    View {
        #[arg(long)]
        household: Option<i64>,
    },
    /// Replace the dataset from three delimited files, then print the view.
    Ingest {
        #[arg(long)]
        transactions: PathBuf,
        #[arg(long)]
        households: PathBuf,
        #[arg(long)]
        products: PathBuf,
        #[arg(long)]
        household: Option<i64>,
    },
}

fn configured_loaders(config: &ServiceConfig) -> anyhow::Result<Vec<Box<dyn SourceLoader>>> {
    let mut loaders: Vec<Box<dyn SourceLoader>> = Vec::new();

    match &config.database_url {
        Some(url) => {
            info!("  Database URL: {}", redact_url(url));
            let loader = DatabaseLoader::new(url)
                .context("building database loader")?
                .with_timeout(config.source_timeout);
            loaders.push(Box::new(loader));
        }
        None => warn!("No database configured, skipping relational source"),
    }

    if let Some(files) = &config.bootstrap_files {
        info!("  Bootstrap files: {}", files.transactions.display());
        loaders.push(Box::new(
            FileLoader::new(&files.transactions, &files.households, &files.products)
                .with_timeout(config.source_timeout),
        ));
    }

    Ok(loaders)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "household_analytics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    info!("Starting household analytics v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::from_env().context("loading configuration")?;
    info!("Configuration loaded:");
    info!("  Source timeout: {}s", config.source_timeout.as_secs());

    let engine = AnalysisEngine::new(&config)?;
    engine.health_check().await?;

    let loaders = configured_loaders(&config)?;
    if let Err(e) = engine.load_initial(&loaders).await {
        warn!("Starting without an initial dataset: {}", e);
    }

    let household = match cli.command {
        Command::View { household } => household,
        Command::Ingest {
            transactions,
            households,
            products,
            household,
        } => {
            if let Err(e) = engine
                .ingest_upload(&transactions, &households, &products)
                .await
            {
                error!("Upload ingest failed: {}", e);
                return Err(e.into());
            }
            household
        }
    };

    let view = engine.view(household).await;
    info!(
        "Dataset {} has {} rows, correlation {}",
        view.snapshot.id, view.snapshot.row_count, view.correlation
    );
    println!("{}", serde_json::to_string_pretty(&view)?);

    Ok(())
}
