//! Command-line interface parsing for the Watermelon API
//!
//! Every flag can also be supplied through the environment (a `.env` file is
//! loaded before parsing). [`Settings::from_cli`] validates the parsed flags and
//! derives what the server and pipeline need at startup.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use thiserror::Error;

use crate::cache::{CacheDurations, CacheManager};
use crate::data::snapshot::DEFAULT_UPSTREAM_URL;
use crate::ticker::search::{DEFAULT_OPENROUTER_URL, DEFAULT_PERPLEXITY_URL};

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// Outbound calls must always carry a timeout
    #[error("Invalid timeout: must be at least 1 second")]
    ZeroTimeout,

    /// A cache duration flag was zero
    #[error("Invalid {flag}: must be at least 1")]
    ZeroDuration { flag: &'static str },

    /// An endpoint flag is not an absolute http(s) URL
    #[error("Invalid {flag}: '{value}' is not an http(s) URL")]
    InvalidUrl { flag: &'static str, value: String },
}

#[derive(Parser, Debug)]
#[command(name = "watermelon-api")]
#[command(about = "Serves the Watermelon Index company list enriched with US stock tickers")]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "WATERMELON_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding data_cache.json and ticker_cache.json
    ///
    /// Defaults to the platform cache directory (~/.cache/watermelon-api on Linux).
    #[arg(long, env = "WATERMELON_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// How long the processed company list stays cached
    #[arg(long, default_value_t = 24, value_name = "HOURS")]
    pub data_cache_hours: u32,

    /// How long resolved tickers stay cached
    #[arg(long, default_value_t = 365, value_name = "DAYS")]
    pub ticker_cache_days: u32,

    /// Perplexity API key used for ticker search
    #[arg(long, env = "PERPLEXITY_API_KEY", hide_env_values = true)]
    pub perplexity_api_key: Option<String>,

    /// OpenRouter API key; enables model-based parsing of search answers
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    /// Base URL of the Glide app serving the snapshot
    #[arg(long, default_value = DEFAULT_UPSTREAM_URL, value_name = "URL")]
    pub upstream_url: String,

    /// Perplexity chat-completions endpoint
    #[arg(long, default_value = DEFAULT_PERPLEXITY_URL, value_name = "URL")]
    pub perplexity_url: String,

    /// OpenRouter chat-completions endpoint
    #[arg(long, default_value = DEFAULT_OPENROUTER_URL, value_name = "URL")]
    pub openrouter_url: String,

    /// Timeout applied to every outbound request
    #[arg(long, default_value_t = 30, value_name = "SECS")]
    pub timeout_secs: u64,

    /// Rebuild the company cache from upstream once, then exit
    #[arg(long)]
    pub refresh: bool,
}

/// Runtime settings derived from CLI arguments
#[derive(Debug, Clone)]
pub struct Settings {
    pub addr: SocketAddr,
    pub cache: CacheManager,
    pub upstream_url: String,
    pub perplexity_url: String,
    pub perplexity_api_key: Option<String>,
    pub openrouter_url: String,
    pub openrouter_api_key: Option<String>,
    pub timeout: Duration,
    pub refresh: bool,
}

impl Settings {
    /// Creates Settings from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(Settings)` with the cache directory resolved
    /// * `Err(CliError)` if a duration or timeout is zero, or an endpoint is not a URL
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.timeout_secs == 0 {
            return Err(CliError::ZeroTimeout);
        }
        if cli.data_cache_hours == 0 {
            return Err(CliError::ZeroDuration {
                flag: "--data-cache-hours",
            });
        }
        if cli.ticker_cache_days == 0 {
            return Err(CliError::ZeroDuration {
                flag: "--ticker-cache-days",
            });
        }

        let durations = CacheDurations {
            data: chrono::Duration::hours(i64::from(cli.data_cache_hours)),
            ticker: chrono::Duration::days(i64::from(cli.ticker_cache_days)),
        };
        let cache = match &cli.cache_dir {
            Some(dir) => CacheManager::with_dir(dir, durations),
            None => CacheManager::new(durations)
                .unwrap_or_else(|| CacheManager::with_dir(".", durations)),
        };

        Ok(Settings {
            addr: SocketAddr::new(cli.host, cli.port),
            cache,
            upstream_url: check_url("--upstream-url", &cli.upstream_url)?,
            perplexity_url: check_url("--perplexity-url", &cli.perplexity_url)?,
            perplexity_api_key: non_blank(&cli.perplexity_api_key),
            openrouter_url: check_url("--openrouter-url", &cli.openrouter_url)?,
            openrouter_api_key: non_blank(&cli.openrouter_api_key),
            timeout: Duration::from_secs(cli.timeout_secs),
            refresh: cli.refresh,
        })
    }
}

fn check_url(flag: &'static str, value: &str) -> Result<String, CliError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(value.to_string()),
        _ => Err(CliError::InvalidUrl {
            flag,
            value: value.to_string(),
        }),
    }
}

// An empty KEY= line in .env means "no key"
fn non_blank(key: &Option<String>) -> Option<String> {
    key.as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}
