use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xm_api::AppState;
use xm_core::{DateKey, Pipeline, ScraperConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "XM daily demand extraction service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP trigger (POST /xm-data, GET /health)
    Serve(ServeArgs),
    /// Extract, transform and upload a single date, then print the summary
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Port to listen on (defaults to $PORT, then 5000)
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Day to extract, as YYYY-MM-DD
    #[arg(long)]
    date: DateKey,
    /// Destination bucket
    #[arg(long, default_value = "xm-data")]
    bucket: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = ScraperConfig::from_env().context("failed to read configuration")?;

    match cli.command {
        Command::Serve(args) => {
            let port = args.port.unwrap_or(config.port);
            let state = AppState::from_config(&config).await?;
            info!(port, "starting XM trigger server");
            xm_api::serve(state, port).await
        }
        Command::Run(args) => {
            let pipeline = Pipeline::from_config(&config).await?;
            let summary = pipeline.run(&args.date, &args.bucket).await?;
            if !summary.success {
                warn!(date = %args.date, "run finished without a successful upload");
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}
