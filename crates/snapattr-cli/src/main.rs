mod pipeline;
mod report;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use snapattr_core::Config;
use snapattr_store::create_store;

use crate::pipeline::Pipeline;

/// Turn product photos into structured attributes using a VLM.
#[derive(Parser)]
#[command(name = "snapattr", version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze image files or directories and store the results
    Analyze {
        /// Image files or directories, one item each
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Path to the project configuration
        #[arg(short, long, default_value = "config/project.yaml")]
        config: PathBuf,

        /// Override the schema path from config
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Override the provider selector from config
        #[arg(long)]
        provider: Option<String>,
    },

    /// Summarize previously stored results
    Report {
        /// Path to the project configuration
        #[arg(short, long, default_value = "config/project.yaml")]
        config: PathBuf,

        /// Maximum number of items to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Analyze {
            inputs,
            config,
            schema,
            provider,
        } => {
            let mut config = Config::from_file(&config)
                .with_context(|| format!("loading config {}", config.display()))?;
            if let Some(schema) = schema {
                config.schema_path = schema;
            }
            if let Some(provider) = provider {
                config.provider = provider;
            }

            let pipeline = Pipeline::from_config(config)?;
            let results = pipeline.analyze_batch(&inputs).await;
            for result in &results {
                report::print_result(result);
            }

            let failed = results.iter().filter(|result| !result.success).count();
            if failed > 0 {
                anyhow::bail!("{failed} of {} item(s) failed", results.len());
            }
        }
        Command::Report { config, limit } => {
            let config = Config::from_file(&config)
                .with_context(|| format!("loading config {}", config.display()))?;
            let store = create_store(config.storage_name(), &config.storage_config)?;
            report::print_store_summary(store.as_ref(), limit)?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
