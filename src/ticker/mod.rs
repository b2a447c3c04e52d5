//! Stock ticker resolution
//!
//! Turns a company display name into a US ticker symbol (or nothing) using a
//! search model, heuristic extraction from its answer, and a long-lived cache.

pub mod extract;
pub mod resolver;
pub mod search;

pub use extract::{extract_ticker, is_valid_ticker};
pub use resolver::{TickerCache, TickerResolver};
pub use search::{ChatCompletionsClient, CompletionProvider, SearchError};

use async_trait::async_trait;

/// Anything that can look up a ticker for a company name
///
/// Lookups never fail; a company without a known listing yields `None`.
#[async_trait]
pub trait TickerLookup: Send + Sync {
    async fn lookup(&self, company_name: &str) -> Option<String>;
}
