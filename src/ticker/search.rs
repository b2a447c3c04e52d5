//! Chat-completions clients used for ticker lookup
//!
//! Perplexity answers the search question; an optional OpenRouter model then
//! reduces that prose answer to a bare symbol. Both speak the OpenAI-style
//! `/chat/completions` protocol.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PERPLEXITY_URL: &str = "https://api.perplexity.ai/chat/completions";
pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const PERPLEXITY_MODEL: &str = "sonar";
const OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";

const SEARCH_SYSTEM_PROMPT: &str = "You are a financial data assistant. Answer with the stock \
ticker symbol only. If the company is not publicly traded in the US, answer null.";

const PARSER_SYSTEM_PROMPT: &str = "Extract the US stock ticker symbol from the user's text. \
Reply with the ticker symbol only, in uppercase, with no punctuation or explanation. \
If the text does not name a ticker, reply null.";

/// Errors that can occur when calling a completions endpoint
#[derive(Debug, Error)]
pub enum SearchError {
    /// Transport failure, timeout, non-2xx status or undecodable body
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response carried no message content
    #[error("completion response had no content")]
    EmptyResponse,
}

/// A provider that answers a free-text prompt with free text
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, SearchError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http_client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    system_prompt: &'static str,
}

impl ChatCompletionsClient {
    /// Client for the Perplexity search stage
    pub fn perplexity(
        http_client: Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            api_key,
            model: PERPLEXITY_MODEL.to_string(),
            system_prompt: SEARCH_SYSTEM_PROMPT,
        }
    }

    /// Client for the OpenRouter parsing stage
    pub fn openrouter(http_client: Client, endpoint: impl Into<String>, api_key: String) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            api_key: Some(api_key),
            model: OPENROUTER_MODEL.to_string(),
            system_prompt: PARSER_SYSTEM_PROMPT,
        }
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String, SearchError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": prompt}
            ]
        });

        let mut request = self.http_client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: ChatResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(SearchError::EmptyResponse)?;

        debug!(model = %self.model, content = %content, "completion answered");
        Ok(content)
    }
}

/// Question asked of the search stage for one company
pub fn ticker_query(company_name: &str) -> String {
    format!(
        "What is the stock ticker symbol for {}? Only consider listings on NYSE, NASDAQ, \
         OTC markets (OTC, OTCQX, OTCQB, Pink Sheets) or ADRs. Respond with just the ticker \
         symbol, or null if the company is not publicly traded in the US.",
        company_name
    )
}
