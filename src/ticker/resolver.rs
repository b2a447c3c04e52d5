//! Company name to ticker resolution
//!
//! A [`TickerResolver`] answers from its [`TickerCache`] when it can and
//! otherwise asks the search stage, validates what comes back and records the
//! outcome. "Looked up, nothing found" is recorded too, so each company name
//! costs at most one search per process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::extract::{extract_ticker, is_null_answer, is_valid_ticker, normalize_company_name};
use super::search::{ticker_query, CompletionProvider};
use super::TickerLookup;
use crate::cache::{CacheKind, CacheManager};

/// Known outcomes, keyed by company display name
///
/// `Some(None)` from [`TickerCache::get`] means the name was looked up and has
/// no ticker; `None` means it was never looked up.
#[derive(Debug)]
pub struct TickerCache {
    entries: Mutex<HashMap<String, Option<String>>>,
    store: CacheManager,
}

impl TickerCache {
    /// Loads the persisted ticker cache, or starts empty if it is missing or expired
    pub fn load(store: CacheManager) -> Self {
        let entries: HashMap<String, Option<String>> =
            store.load(CacheKind::Ticker).unwrap_or_default();
        let cache = Self {
            entries: Mutex::new(entries),
            store,
        };
        info!(entries = cache.len(), "loaded ticker cache");
        cache
    }

    pub fn get(&self, company_name: &str) -> Option<Option<String>> {
        self.lock().get(company_name).cloned()
    }

    /// Records an outcome and writes the whole map through to disk
    ///
    /// The write happens under the lock, so the file always holds the latest map.
    pub fn record(&self, company_name: &str, ticker: Option<String>) {
        let mut entries = self.lock();
        entries.insert(company_name.to_string(), ticker);
        self.store.save(CacheKind::Ticker, &*entries);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<String>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves company names to tickers through a search provider
pub struct TickerResolver {
    search: Arc<dyn CompletionProvider>,
    parser: Option<Arc<dyn CompletionProvider>>,
    cache: TickerCache,
}

impl TickerResolver {
    pub fn new(search: Arc<dyn CompletionProvider>, cache: TickerCache) -> Self {
        Self {
            search,
            parser: None,
            cache,
        }
    }

    /// Adds a second model that reduces the search answer to a bare symbol
    pub fn with_parser(mut self, parser: Arc<dyn CompletionProvider>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Returns the ticker for `company_name`, or `None` if it has none
    ///
    /// Never fails: search errors count as "no ticker".
    pub async fn resolve(&self, company_name: &str) -> Option<String> {
        if let Some(known) = self.cache.get(company_name) {
            debug!(company = company_name, ticker = ?known, "ticker cache hit");
            return known;
        }

        let ticker = self.resolve_uncached(company_name).await;
        self.cache.record(company_name, ticker.clone());
        ticker
    }

    async fn resolve_uncached(&self, company_name: &str) -> Option<String> {
        let query = ticker_query(&normalize_company_name(company_name));
        let content = match self.search.complete(&query).await {
            Ok(content) => content,
            Err(e) => {
                warn!(company = company_name, error = %e, "ticker search failed");
                return None;
            }
        };

        if is_null_answer(&content) {
            info!(company = company_name, "no ticker found");
            return None;
        }

        if let Some(ticker) = self.parse_with_model(company_name, &content).await {
            info!(company = company_name, ticker = %ticker, "resolved ticker");
            return Some(ticker);
        }

        match extract_ticker(&content, company_name) {
            Some(candidate) if is_valid_ticker(&candidate) => {
                info!(company = company_name, ticker = %candidate, "resolved ticker");
                Some(candidate)
            }
            candidate => {
                warn!(
                    company = company_name,
                    candidate = ?candidate,
                    "invalid ticker format"
                );
                None
            }
        }
    }

    /// Asks the parsing model for a bare symbol; `None` defers to pattern extraction
    async fn parse_with_model(&self, company_name: &str, content: &str) -> Option<String> {
        let parser = self.parser.as_ref()?;
        match parser.complete(content).await {
            Ok(answer) => {
                let answer = answer.trim().trim_end_matches('.').trim_end();
                if !is_null_answer(answer) && is_valid_ticker(answer) {
                    Some(answer.to_string())
                } else {
                    debug!(company = company_name, answer, "parser gave no usable ticker");
                    None
                }
            }
            Err(e) => {
                warn!(company = company_name, error = %e, "ticker parsing failed");
                None
            }
        }
    }
}

#[async_trait]
impl TickerLookup for TickerResolver {
    async fn lookup(&self, company_name: &str) -> Option<String> {
        self.resolve(company_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDurations;
    use crate::ticker::search::SearchError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Provider returning a fixed answer (or a failure) and counting calls
    struct ScriptedProvider {
        answer: Option<&'static str>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn answering(answer: &'static str) -> Arc<Self> {
            Arc::new(Self {
                answer: Some(answer),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, prompt: &str) -> Result<String, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer
                .map(str::to_string)
                .ok_or(SearchError::EmptyResponse)
        }
    }

    fn store(temp_dir: &TempDir) -> CacheManager {
        CacheManager::with_dir(temp_dir.path(), CacheDurations::default())
    }

    fn resolver(temp_dir: &TempDir, search: Arc<ScriptedProvider>) -> TickerResolver {
        TickerResolver::new(search, TickerCache::load(store(temp_dir)))
    }

    fn persisted(temp_dir: &TempDir) -> HashMap<String, Option<String>> {
        store(temp_dir)
            .load(CacheKind::Ticker)
            .expect("ticker cache persisted")
    }

    #[tokio::test]
    async fn test_bare_answer_is_resolved_and_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let search = ScriptedProvider::answering("AAPL");
        let resolver = resolver(&temp_dir, search.clone());

        assert_eq!(resolver.resolve("Apple Inc.").await.as_deref(), Some("AAPL"));

        assert_eq!(persisted(&temp_dir)["Apple Inc."].as_deref(), Some("AAPL"));
        let prompts = search.prompts.lock().unwrap();
        assert!(prompts[0].contains("Apple Inc?"), "name should be normalized");
    }

    #[tokio::test]
    async fn test_second_resolve_uses_cache() {
        let temp_dir = TempDir::new().unwrap();
        let search = ScriptedProvider::answering("AAPL");
        let resolver = resolver(&temp_dir, search.clone());

        let first = resolver.resolve("Apple Inc.").await;
        let second = resolver.resolve("Apple Inc.").await;

        assert_eq!(first, second);
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_entry_skips_search() {
        let temp_dir = TempDir::new().unwrap();
        let mut seeded = HashMap::new();
        seeded.insert("Test Company".to_string(), Some("TEST".to_string()));
        store(&temp_dir).save(CacheKind::Ticker, &seeded);
        let search = ScriptedProvider::answering("WRONG");

        let resolver = resolver(&temp_dir, search.clone());

        assert_eq!(resolver.resolve("Test Company").await.as_deref(), Some("TEST"));
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_lookup_is_case_sensitive() {
        let temp_dir = TempDir::new().unwrap();
        let mut seeded = HashMap::new();
        seeded.insert("acme".to_string(), Some("ACME".to_string()));
        store(&temp_dir).save(CacheKind::Ticker, &seeded);
        let search = ScriptedProvider::answering("null");

        let resolver = resolver(&temp_dir, search.clone());

        assert!(resolver.resolve("Acme").await.is_none());
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn test_null_answer_is_cached_as_no_ticker() {
        let temp_dir = TempDir::new().unwrap();
        let search = ScriptedProvider::answering("null");
        let resolver = resolver(&temp_dir, search.clone());

        assert!(resolver.resolve("Private Company").await.is_none());
        assert!(resolver.resolve("Private Company").await.is_none());

        assert_eq!(search.calls(), 1);
        assert_eq!(resolver.cache.get("Private Company"), Some(None));
        let on_disk = persisted(&temp_dir);
        assert!(on_disk.contains_key("Private Company"));
        assert!(on_disk["Private Company"].is_none());
    }

    #[tokio::test]
    async fn test_search_failure_resolves_to_none() {
        let temp_dir = TempDir::new().unwrap();
        let search = ScriptedProvider::failing();
        let resolver = resolver(&temp_dir, search.clone());

        assert!(resolver.resolve("Test Company").await.is_none());
        assert_eq!(resolver.cache.get("Test Company"), Some(None));
    }

    #[tokio::test]
    async fn test_invalid_format_is_cached_as_no_ticker() {
        let temp_dir = TempDir::new().unwrap();
        let search = ScriptedProvider::answering("123INVALID");
        let resolver = resolver(&temp_dir, search);

        assert!(resolver.resolve("Test Company").await.is_none());
        assert!(persisted(&temp_dir)["Test Company"].is_none());
    }

    #[tokio::test]
    async fn test_extracts_ticker_from_sentence() {
        let temp_dir = TempDir::new().unwrap();
        let search = ScriptedProvider::answering(
            "The stock ticker symbol for ABB Group in the US OTC market is ABBNY.",
        );
        let resolver = resolver(&temp_dir, search);

        assert_eq!(resolver.resolve("ABB Group").await.as_deref(), Some("ABBNY"));
        assert_eq!(persisted(&temp_dir)["ABB Group"].as_deref(), Some("ABBNY"));
    }

    #[tokio::test]
    async fn test_parser_answer_is_used() {
        let temp_dir = TempDir::new().unwrap();
        let search = ScriptedProvider::answering(
            "The stock ticker symbol for Allianz in the US OTC markets is ALIZF or AZSEY.",
        );
        let parser = ScriptedProvider::answering("ALIZF");
        let resolver = resolver(&temp_dir, search).with_parser(parser.clone());

        assert_eq!(resolver.resolve("Allianz").await.as_deref(), Some("ALIZF"));
        assert_eq!(parser.calls(), 1);
    }

    #[tokio::test]
    async fn test_parser_answer_trailing_period_is_stripped() {
        let temp_dir = TempDir::new().unwrap();
        let search = ScriptedProvider::answering(
            "The stock ticker symbol for Allianz in the US OTC markets is ALIZF or AZSEY.",
        );
        let parser = ScriptedProvider::answering(" ALIZF.\n");
        let resolver = resolver(&temp_dir, search).with_parser(parser);

        assert_eq!(resolver.resolve("Allianz").await.as_deref(), Some("ALIZF"));
        assert_eq!(persisted(&temp_dir)["Allianz"].as_deref(), Some("ALIZF"));
    }

    #[tokio::test]
    async fn test_parser_failure_falls_back_to_extraction() {
        let temp_dir = TempDir::new().unwrap();
        let search = ScriptedProvider::answering("AAPL");
        let parser = ScriptedProvider::failing();
        let resolver = resolver(&temp_dir, search).with_parser(parser.clone());

        assert_eq!(resolver.resolve("Apple").await.as_deref(), Some("AAPL"));
        assert_eq!(parser.calls(), 1);
    }

    #[tokio::test]
    async fn test_parser_invalid_answer_falls_back_to_extraction() {
        let temp_dir = TempDir::new().unwrap();
        let search = ScriptedProvider::answering("The ticker is CAT.");
        let parser = ScriptedProvider::answering("cat.");
        let resolver = resolver(&temp_dir, search).with_parser(parser);

        assert_eq!(resolver.resolve("Caterpillar").await.as_deref(), Some("CAT"));
    }

    #[tokio::test]
    async fn test_cache_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let first = resolver(&temp_dir, ScriptedProvider::answering("AAPL"));
        first.resolve("Apple Inc.").await;
        first.resolve("Private Company").await;

        let search = ScriptedProvider::answering("WRONG");
        let second = resolver(&temp_dir, search.clone());

        assert_eq!(second.cache.len(), 2);
        assert_eq!(second.resolve("Apple Inc.").await.as_deref(), Some("AAPL"));
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_ticker_cache_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let mut seeded = HashMap::new();
        seeded.insert("Apple Inc.".to_string(), Some("AAPL".to_string()));
        store(&temp_dir).save(CacheKind::Ticker, &seeded);
        std::thread::sleep(std::time::Duration::from_millis(10));

        let expired_store = CacheManager::with_dir(
            temp_dir.path(),
            CacheDurations {
                ticker: chrono::Duration::zero(),
                ..CacheDurations::default()
            },
        );
        let cache = TickerCache::load(expired_store);

        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_concurrent_records_persist_the_whole_map() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(TickerCache::load(store(&temp_dir)));

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for company in 0..10 {
                        let ticker = (company % 2 == 0).then(|| format!("T{}", thread));
                        cache.record(&format!("Company {}-{}", thread, company), ticker);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let on_disk = persisted(&temp_dir);
        assert_eq!(on_disk.len(), 80);
        assert_eq!(on_disk, *cache.lock());
        assert_eq!(TickerCache::load(store(&temp_dir)).len(), 80);
    }
}
