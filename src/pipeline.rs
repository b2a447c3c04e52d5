//! Fetch, normalize and cache the company list
//!
//! A request is served from the main data cache while it is fresh; otherwise the
//! snapshot is fetched, normalized (resolving tickers as it goes) and the result
//! written back before it is returned.

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::cache::{CacheKind, CacheManager};
use crate::cli::Settings;
use crate::data::{CompanyOutput, NormalizeError, Normalizer, SnapshotClient, SnapshotError};
use crate::ticker::{ChatCompletionsClient, TickerCache, TickerResolver};

/// Broad failure classes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The upstream could not be reached or answered with an error status
    UpstreamUnavailable,
    /// The upstream answered, but not with the data we expect
    UpstreamShape,
}

/// Errors that can occur while producing the company list
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] SnapshotError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Fetch(e) if e.is_unavailable() => ErrorKind::UpstreamUnavailable,
            PipelineError::Fetch(_) | PipelineError::Normalize(_) => ErrorKind::UpstreamShape,
        }
    }
}

/// Payload of the main data cache envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedCompanies {
    pub raw_data: Value,
    pub processed_data: Vec<CompanyOutput>,
}

/// Produces the served company list
pub struct Pipeline {
    snapshots: SnapshotClient,
    normalizer: Normalizer,
    cache: CacheManager,
}

impl Pipeline {
    pub fn new(snapshots: SnapshotClient, normalizer: Normalizer, cache: CacheManager) -> Self {
        Self {
            snapshots,
            normalizer,
            cache,
        }
    }

    /// Wires the fetcher, ticker resolver and caches described by `settings`
    ///
    /// All outbound clients share one HTTP client carrying the configured timeout.
    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(settings.timeout).build()?;

        let search = ChatCompletionsClient::perplexity(
            http_client.clone(),
            &settings.perplexity_url,
            settings.perplexity_api_key.clone(),
        );
        let mut resolver =
            TickerResolver::new(Arc::new(search), TickerCache::load(settings.cache.clone()));
        if let Some(key) = &settings.openrouter_api_key {
            let parser = ChatCompletionsClient::openrouter(
                http_client.clone(),
                &settings.openrouter_url,
                key.clone(),
            );
            resolver = resolver.with_parser(Arc::new(parser));
        }

        Ok(Self::new(
            SnapshotClient::with_client(http_client, &settings.upstream_url),
            Normalizer::new(Arc::new(resolver)),
            settings.cache.clone(),
        ))
    }

    /// Returns the company list, from cache when fresh
    pub async fn companies(&self) -> Result<Vec<CompanyOutput>, PipelineError> {
        if let Some(cached) = self.cache.load::<CachedCompanies>(CacheKind::Data) {
            info!(companies = cached.processed_data.len(), "serving cached company list");
            return Ok(cached.processed_data);
        }
        self.refresh().await
    }

    /// Rebuilds the company list from upstream, ignoring any cached copy
    ///
    /// Nothing is written to the cache unless every step succeeds.
    pub async fn refresh(&self) -> Result<Vec<CompanyOutput>, PipelineError> {
        let raw_data = self.snapshots.fetch().await?;
        let processed_data = self.normalizer.normalize_document(&raw_data).await?;

        let cached = CachedCompanies {
            raw_data,
            processed_data,
        };
        self.cache.save(CacheKind::Data, &cached);
        info!(companies = cached.processed_data.len(), "company list rebuilt");

        Ok(cached.processed_data)
    }
}
