//! Watermelon API - serves the Watermelon Index with stock tickers
//!
//! Runs the HTTP server by default; `--refresh` rebuilds the company cache once
//! and exits.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use watermelon_api::cli::{Cli, Settings};
use watermelon_api::pipeline::Pipeline;
use watermelon_api::server;

const DEFAULT_LOG_FILTER: &str = "watermelon_api=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let settings = Settings::from_cli(&cli)?;
    let durations = settings.cache.durations();
    info!(
        cache_dir = %settings.cache.cache_dir().display(),
        data_hours = durations.data.num_hours(),
        ticker_days = durations.ticker.num_days(),
        "using cache directory"
    );
    if settings.perplexity_api_key.is_none() {
        info!("no Perplexity API key configured; ticker searches are unauthenticated");
    }

    let pipeline = Arc::new(Pipeline::from_settings(&settings)?);

    if settings.refresh {
        info!("refreshing company cache");
        return match pipeline.refresh().await {
            Ok(companies) => {
                info!(companies = companies.len(), "company cache refreshed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, kind = ?e.kind(), "company cache refresh failed");
                Err(e.into())
            }
        };
    }

    let listener = TcpListener::bind(settings.addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    server::serve(listener, pipeline).await?;

    Ok(())
}
