use std::time::Duration;

use derive_builder::Builder;
use thiserror::Error;

use crate::constants::*;

/// Overrides for the provider endpoints. Unset entries use the public service.
#[derive(Clone, Debug, Default)]
pub struct EndpointConfig {
    pub text_search: Option<String>,
    pub nearby_search: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointConfigError {
    #[error("invalid url for endpoint {0}: {1}")]
    InvalidUrl(&'static str, String),
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<(), EndpointConfigError> {
        for (name, url) in [
            ("text_search", &self.text_search),
            ("nearby_search", &self.nearby_search),
            ("details", &self.details),
        ] {
            if let Some(url) = url {
                reqwest::Url::parse(url)
                    .map_err(|_| EndpointConfigError::InvalidUrl(name, url.clone()))?;
            }
        }
        Ok(())
    }

    pub fn text_search(&self) -> &str {
        self.text_search.as_deref().unwrap_or(DEFAULT_TEXT_SEARCH_URL)
    }

    pub fn nearby_search(&self) -> &str {
        self.nearby_search
            .as_deref()
            .unwrap_or(DEFAULT_NEARBY_SEARCH_URL)
    }

    pub fn details(&self) -> &str {
        self.details.as_deref().unwrap_or(DEFAULT_DETAILS_URL)
    }
}

/// Retry policy for transient failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Exponential backoff after the given (1-based) failed attempt, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Everything the client needs besides the HTTP client and the key.
#[derive(Builder, Clone, Debug)]
#[builder(default)]
pub struct ClientConfig {
    pub endpoints: EndpointConfig,
    pub retry: RetryConfig,
    /// Upper bound on result pages fetched per query.
    pub max_pages: u32,
    /// Wait before using a continuation token.
    pub page_token_delay: Duration,
    /// Minimum spacing between any two requests.
    pub min_request_interval: Duration,
    /// Preferred language for names and weekday text.
    #[builder(setter(into, strip_option))]
    pub language: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointConfig::default(),
            retry: RetryConfig::default(),
            max_pages: DEFAULT_MAX_PAGES,
            page_token_delay: DEFAULT_PAGE_TOKEN_DELAY,
            min_request_interval: Duration::from_millis(100),
            language: None,
        }
    }
}
