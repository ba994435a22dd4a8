//! One-shot check that the configured key can actually search.

use tracing::{info, warn};

use crate::{
    api_interfaces::places::ApiStatus,
    client::{Client, SearchQuery},
    constants::{DEFAULT_KEYWORD, DEFAULT_REGION},
    error::RequestError,
};

const INVALID_KEY: &str = "The API key is invalid or restricted. Generate a new API key.";
const ENABLE_BILLING: &str = "Enable billing for your Google Cloud project.";
const ENABLE_PLACES_API: &str = "Enable the Places API for this project in the Google Cloud Console.";
const SEE_CONSOLE: &str = "Check the Google Cloud Console for more details on the error.";

#[derive(Clone, Debug, PartialEq)]
pub struct VerifyReport {
    pub ok: bool,
    pub masked_key: String,
    /// Provider status, when the provider answered.
    pub status: Option<ApiStatus>,
    pub message: String,
    pub recommendations: Vec<String>,
}

/// Run a single text search and turn the answer into advice.
pub async fn check(client: &Client) -> VerifyReport {
    let masked_key = client.api_key().masked();
    let query = SearchQuery::text(DEFAULT_KEYWORD, DEFAULT_REGION);
    match client.fetch_page(&query, None).await {
        Ok(page) => {
            info!(results = page.results.len(), "api key verified");
            VerifyReport {
                ok: true,
                masked_key,
                status: Some(page.status),
                message: format!("request successful, found {} result(s)", page.results.len()),
                recommendations: Vec::new(),
            }
        }
        Err(error) => {
            warn!(error = %error, "api key verification failed");
            let provider_message = match &error {
                RequestError::Provider { message, .. } => message.clone().unwrap_or_default(),
                _ => String::new(),
            };
            VerifyReport {
                ok: false,
                masked_key,
                recommendations: recommendations(error.provider_status(), &provider_message),
                status: error.provider_status().cloned(),
                message: error.to_string(),
            }
        }
    }
}

fn recommendations(status: Option<&ApiStatus>, message: &str) -> Vec<String> {
    let mut advice = Vec::new();
    if status == Some(&ApiStatus::RequestDenied) || message.contains("API key is invalid") {
        advice.push(INVALID_KEY);
    }
    if message.to_lowercase().contains("billing") {
        advice.push(ENABLE_BILLING);
    }
    if message.contains("not authorized to use this API") {
        advice.push(ENABLE_PLACES_API);
    }
    if advice.is_empty() {
        advice.push(SEE_CONSOLE);
    }
    advice.into_iter().map(str::to_string).collect()
}
