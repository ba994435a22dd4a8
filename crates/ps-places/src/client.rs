use std::{collections::VecDeque, fmt, sync::Arc};

use futures::{stream, Stream};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::{
    sync::Mutex,
    time::{sleep, sleep_until, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    api_interfaces::places::{ApiStatus, DetailsResponse, SearchResponse},
    config::{ClientConfig, EndpointConfigError},
    constants::{API_KEY_PARAM, DETAIL_FIELDS},
    error::RequestError,
    geo::Coordinates,
    place::RawPlaceRecord,
    ApiKey,
};

/// One search against the provider.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchQuery {
    /// Free-text search for `keyword` inside `region`.
    Text { keyword: String, region: String },
    /// Keyword search around a point.
    Nearby {
        keyword: String,
        center: Coordinates,
        radius: u32,
    },
}

impl SearchQuery {
    pub fn text(keyword: &str, region: &str) -> Self {
        SearchQuery::Text {
            keyword: keyword.to_string(),
            region: region.to_string(),
        }
    }

    pub fn nearby(keyword: &str, center: Coordinates, radius: u32) -> Self {
        SearchQuery::Nearby {
            keyword: keyword.to_string(),
            center,
            radius,
        }
    }

    fn endpoint<'a>(&self, config: &'a ClientConfig) -> &'a str {
        match self {
            SearchQuery::Text { .. } => config.endpoints.text_search(),
            SearchQuery::Nearby { .. } => config.endpoints.nearby_search(),
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            SearchQuery::Text { keyword, region } => {
                vec![("query", format!("{keyword} in {region} Switzerland"))]
            }
            SearchQuery::Nearby {
                keyword,
                center,
                radius,
            } => vec![
                ("keyword", keyword.clone()),
                ("location", center.to_string()),
                ("radius", radius.to_string()),
            ],
        }
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchQuery::Text { keyword, region } => write!(f, "text '{keyword}' in {region}"),
            SearchQuery::Nearby {
                keyword,
                center,
                radius,
            } => write!(f, "nearby '{keyword}' within {radius}m of {center}"),
        }
    }
}

/// Common shape of provider payloads.
trait ProviderResponse {
    fn status(&self) -> &ApiStatus;
    fn error_message(&self) -> Option<&str>;
}

impl ProviderResponse for SearchResponse {
    fn status(&self) -> &ApiStatus {
        &self.status
    }

    fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

impl ProviderResponse for DetailsResponse {
    fn status(&self) -> &ApiStatus {
        &self.status
    }

    fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

#[derive(Debug, Error)]
pub enum ClientInitError {
    #[error("invalid endpoint configuration: {0}")]
    InvalidEndpointConfig(#[from] EndpointConfigError),
}

#[derive(Clone, Debug)]
pub struct Client {
    http_client: reqwest::Client,
    api_key: ApiKey,
    config: ClientConfig,
    last_request: Arc<Mutex<Option<Instant>>>,
}

enum Cursor {
    First,
    Token(String),
    Done,
}

struct Pages {
    buffer: VecDeque<RawPlaceRecord>,
    cursor: Cursor,
    fetched: u32,
}

impl Client {
    pub fn new(
        http_client: reqwest::Client,
        api_key: ApiKey,
        config: ClientConfig,
    ) -> Result<Self, ClientInitError> {
        config.endpoints.validate()?;
        Ok(Self {
            http_client,
            api_key,
            config,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Lazily page through the results of `query`.
    ///
    /// Pages are requested only as the stream is polled, so dropping it early
    /// saves quota. The stream ends when the provider stops returning a
    /// continuation token or `max_pages` pages were fetched. A request that
    /// still fails after retrying yields one `Err` and ends the stream; records
    /// yielded before it stay valid.
    pub fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> impl Stream<Item = Result<RawPlaceRecord, RequestError>> + 'a {
        let pages = Pages {
            buffer: VecDeque::new(),
            cursor: Cursor::First,
            fetched: 0,
        };
        stream::unfold(pages, move |mut pages| async move {
            loop {
                if let Some(record) = pages.buffer.pop_front() {
                    return Some((Ok(record), pages));
                }
                let token = match std::mem::replace(&mut pages.cursor, Cursor::Done) {
                    Cursor::Done => return None,
                    Cursor::First => None,
                    Cursor::Token(token) => Some(token),
                };
                if pages.fetched >= self.config.max_pages {
                    debug!(query = %query, pages = pages.fetched, "page limit reached");
                    return None;
                }
                if token.is_some() {
                    sleep(self.config.page_token_delay).await;
                }
                match self.fetch_page(query, token.as_deref()).await {
                    Ok(page) => {
                        pages.fetched += 1;
                        info!(
                            query = %query,
                            page = pages.fetched,
                            results = page.results.len(),
                            "fetched search page"
                        );
                        pages.buffer.extend(page.results);
                        if let Some(next) = page.next_page_token.filter(|t| !t.is_empty()) {
                            pages.cursor = Cursor::Token(next);
                        }
                    }
                    Err(error) => {
                        warn!(query = %query, page = pages.fetched + 1, error = %error, "search request failed");
                        return Some((Err(error), pages));
                    }
                }
            }
        })
    }

    /// Fetch one search page. Continuation requests carry only the token.
    pub(crate) async fn fetch_page(
        &self,
        query: &SearchQuery,
        token: Option<&str>,
    ) -> Result<SearchResponse, RequestError> {
        let params = match token {
            Some(token) => vec![("pagetoken", token.to_string())],
            None => query.params(),
        };
        self.get_json(query.endpoint(&self.config), params, token.is_some())
            .await
    }

    /// Look up the full record for one place. `Ok(None)` when the provider
    /// answered but had nothing for this id.
    pub async fn details(&self, place_id: &str) -> Result<Option<RawPlaceRecord>, RequestError> {
        let params = vec![
            ("place_id", place_id.to_string()),
            ("fields", DETAIL_FIELDS.to_string()),
        ];
        let response: DetailsResponse = self
            .get_json(self.config.endpoints.details(), params, false)
            .await?;
        Ok(response.result)
    }

    /// Complete a search result with its details. Failures leave the record
    /// as it was.
    pub async fn enrich(&self, summary: RawPlaceRecord) -> RawPlaceRecord {
        let Some(place_id) = summary.place_id.clone() else {
            return summary;
        };
        match self.details(&place_id).await {
            Ok(Some(details)) => summary.merge_details(details),
            Ok(None) => {
                warn!(place_id = %place_id, "details lookup returned no result");
                summary
            }
            Err(error) => {
                warn!(place_id = %place_id, error = %error, "details lookup failed, keeping search result");
                summary
            }
        }
    }

    async fn get_json<T>(
        &self,
        endpoint: &str,
        mut params: Vec<(&'static str, String)>,
        continuation: bool,
    ) -> Result<T, RequestError>
    where
        T: DeserializeOwned + ProviderResponse,
    {
        if let Some(language) = &self.config.language {
            params.push(("language", language.clone()));
        }
        let retry = &self.config.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt::<T>(endpoint, &params, attempt).await {
                Ok(body) => return Ok(body),
                Err(error) if attempt < max_attempts && error.is_transient(continuation) => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient provider failure, retrying"
                    );
                    sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn attempt<T>(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
        attempt: u32,
    ) -> Result<T, RequestError>
    where
        T: DeserializeOwned + ProviderResponse,
    {
        self.throttle().await;
        let response = self
            .http_client
            .get(endpoint)
            .query(params)
            .query(&[(API_KEY_PARAM, self.api_key.get())])
            .send()
            .await
            .map_err(|source| RequestError::Transport {
                endpoint: endpoint.to_string(),
                attempts: attempt,
                // the url carries the key
                source: source.without_url(),
            })?;
        let http_status = response.status();
        if !http_status.is_success() {
            return Err(RequestError::Http {
                endpoint: endpoint.to_string(),
                status: http_status,
                attempts: attempt,
            });
        }
        let body = response
            .text()
            .await
            .map_err(|source| RequestError::ResponseBody {
                endpoint: endpoint.to_string(),
                http_status,
                source: source.without_url(),
            })?;
        let parsed: T = serde_json::from_str(&body).map_err(|source| RequestError::Parse {
            endpoint: endpoint.to_string(),
            http_status,
            source,
        })?;
        if !parsed.status().is_success() {
            return Err(RequestError::Provider {
                endpoint: endpoint.to_string(),
                http_status,
                status: parsed.status().clone(),
                message: parsed.error_message().map(str::to_owned),
                attempts: attempt,
            });
        }
        Ok(parsed)
    }

    /// Keep at least `min_request_interval` between requests.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let next = previous + self.config.min_request_interval;
            if Instant::now() < next {
                sleep_until(next).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use std::{pin::pin, time::Duration};

    use super::*;
    use crate::config::{ClientConfigBuilder, EndpointConfig, RetryConfig};
    use futures::StreamExt;
    use httpmock::prelude::*;
    use reqwest::StatusCode;
    use serde_json::json;

    const FAKE_API_KEY: &str = "fake-api-key-123456";

    fn test_client(server: &MockServer, max_attempts: u32) -> Client {
        paced_client(server, max_attempts, Duration::ZERO, Duration::ZERO)
    }

    fn paced_client(
        server: &MockServer,
        max_attempts: u32,
        page_token_delay: Duration,
        min_request_interval: Duration,
    ) -> Client {
        let config = ClientConfigBuilder::default()
            .endpoints(EndpointConfig {
                text_search: Some(server.url("/textsearch")),
                nearby_search: Some(server.url("/nearbysearch")),
                details: Some(server.url("/details")),
            })
            .retry(RetryConfig {
                max_attempts,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            })
            .page_token_delay(page_token_delay)
            .min_request_interval(min_request_interval)
            .build()
            .unwrap();
        Client::new(
            reqwest::Client::new(),
            ApiKey::from_raw(FAKE_API_KEY).unwrap(),
            config,
        )
        .unwrap()
    }

    fn place(id: &str) -> serde_json::Value {
        json!({
            "place_id": id,
            "name": format!("Place {id}"),
            "geometry": { "location": { "lat": 47.4, "lng": 8.1 } }
        })
    }

    async fn collect(
        client: &Client,
        query: &SearchQuery,
    ) -> Vec<Result<RawPlaceRecord, RequestError>> {
        client.search(query).collect().await
    }

    #[tokio::test]
    async fn search_follows_pagination_tokens() {
        // Arrange
        let server = MockServer::start_async().await;
        let first_page = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/textsearch")
                    .query_param("query", "farm shops in Aargau Switzerland")
                    .query_param(API_KEY_PARAM, FAKE_API_KEY);
                then.status(200).json_body(json!({
                    "status": "OK",
                    "results": [place("a"), place("b")],
                    "next_page_token": "token-2"
                }));
            })
            .await;
        let second_page = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/textsearch")
                    .query_param("pagetoken", "token-2");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "results": [place("c")]
                }));
            })
            .await;
        let client = test_client(&server, 1);
        let query = SearchQuery::text("farm shops", "Aargau");

        // Act
        let results = collect(&client, &query).await;

        // Assert
        let ids: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().place_id().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
        first_page.assert();
        second_page.assert();
    }

    #[tokio::test]
    async fn search_stops_at_max_pages() {
        // Arrange
        let server = MockServer::start_async().await;
        let first_page = server
            .mock_async(|when, then| {
                when.path("/nearbysearch")
                    .query_param("keyword", "hofladen")
                    .query_param("location", "47.3887,8.0558")
                    .query_param("radius", "1000");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "results": [place("a")],
                    "next_page_token": "token-2"
                }));
            })
            .await;
        let second_page = server
            .mock_async(|when, then| {
                when.path("/nearbysearch").query_param("pagetoken", "token-2");
                then.status(200)
                    .json_body(json!({ "status": "OK", "results": [place("b")] }));
            })
            .await;
        let mut client = test_client(&server, 1);
        client.config.max_pages = 1;
        let query = SearchQuery::nearby("hofladen", crate::geo::AARGAU_CENTER, 1000);

        // Act
        let results = collect(&client, &query).await;

        // Assert
        assert_eq!(results.len(), 1);
        first_page.assert();
        second_page.assert_hits(0);
    }

    #[tokio::test]
    async fn search_is_lazy() {
        // Arrange
        let server = MockServer::start_async().await;
        let first_page = server
            .mock_async(|when, then| {
                when.path("/textsearch").query_param_exists("query");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "results": [place("a"), place("b")],
                    "next_page_token": "token-2"
                }));
            })
            .await;
        let second_page = server
            .mock_async(|when, then| {
                when.path("/textsearch").query_param("pagetoken", "token-2");
                then.status(200)
                    .json_body(json!({ "status": "OK", "results": [place("c")] }));
            })
            .await;
        let client = test_client(&server, 1);
        let query = SearchQuery::text("farm shops", "Aargau");

        // Act
        let taken: Vec<_> = client.search(&query).take(2).collect().await;

        // Assert
        assert_eq!(taken.len(), 2);
        first_page.assert();
        second_page.assert_hits(0);
    }

    #[tokio::test]
    async fn search_zero_results_is_empty() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/textsearch");
                then.status(200)
                    .json_body(json!({ "status": "ZERO_RESULTS", "results": [] }));
            })
            .await;
        let client = test_client(&server, 1);

        let results = collect(&client, &SearchQuery::text("nothing", "Uri")).await;

        assert!(results.is_empty());
        mock.assert();
    }

    #[tokio::test]
    async fn search_retries_over_query_limit_then_reports() {
        // Arrange
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/textsearch");
                then.status(200).json_body(json!({
                    "status": "OVER_QUERY_LIMIT",
                    "error_message": "You have exceeded your rate-limit"
                }));
            })
            .await;
        let client = test_client(&server, 3);

        // Act
        let results = collect(&client, &SearchQuery::text("farm shops", "Aargau")).await;

        // Assert
        assert_eq!(results.len(), 1);
        let error = results.into_iter().next().unwrap().unwrap_err();
        assert_eq!(error.provider_status(), Some(&ApiStatus::OverQueryLimit));
        assert_eq!(error.http_status(), Some(StatusCode::OK));
        assert!(matches!(error, RequestError::Provider { attempts: 3, .. }));
        mock.assert_hits(3);
    }

    #[tokio::test]
    async fn search_does_not_retry_request_denied() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/textsearch");
                then.status(200).json_body(json!({
                    "status": "REQUEST_DENIED",
                    "error_message": "The provided API key is invalid."
                }));
            })
            .await;
        let client = test_client(&server, 3);

        let results = collect(&client, &SearchQuery::text("farm shops", "Aargau")).await;

        let error = results.into_iter().next().unwrap().unwrap_err();
        assert_eq!(error.provider_status(), Some(&ApiStatus::RequestDenied));
        assert!(!error.to_string().contains(FAKE_API_KEY));
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn search_keeps_records_before_a_failed_page() {
        // Arrange
        let server = MockServer::start_async().await;
        let _first_page = server
            .mock_async(|when, then| {
                when.path("/textsearch").query_param_exists("query");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "results": [place("a")],
                    "next_page_token": "token-2"
                }));
            })
            .await;
        let second_page = server
            .mock_async(|when, then| {
                when.path("/textsearch").query_param("pagetoken", "token-2");
                then.status(503);
            })
            .await;
        let client = test_client(&server, 2);

        // Act
        let results = collect(&client, &SearchQuery::text("farm shops", "Aargau")).await;

        // Assert
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().place_id(), Some("a"));
        let error = results[1].as_ref().unwrap_err();
        assert_eq!(error.http_status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        second_page.assert_hits(2);
    }

    #[tokio::test]
    async fn search_invalid_url() {
        let config = ClientConfigBuilder::default()
            .endpoints(EndpointConfig {
                text_search: Some("http://test.invalid".to_string()),
                ..Default::default()
            })
            .retry(RetryConfig {
                max_attempts: 1,
                ..Default::default()
            })
            .build()
            .unwrap();
        let client = Client::new(
            reqwest::Client::new(),
            ApiKey::from_raw(FAKE_API_KEY).unwrap(),
            config,
        )
        .unwrap();
        let query = SearchQuery::text("farm shops", "Aargau");

        let mut results = pin!(client.search(&query));
        let first = results.next().await.unwrap();

        assert!(matches!(first, Err(RequestError::Transport { .. })));
        assert!(results.next().await.is_none());
    }

    #[tokio::test]
    async fn details_success() {
        // Arrange
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/details")
                    .query_param("place_id", "abc123")
                    .query_param("fields", DETAIL_FIELDS);
                then.status(200).json_body(json!({
                    "status": "OK",
                    "result": {
                        "place_id": "abc123",
                        "name": "Hofladen",
                        "website": "https://hof.example",
                        "address_components": [
                            { "long_name": "Aargau", "short_name": "AG", "types": ["administrative_area_level_1"] }
                        ]
                    }
                }));
            })
            .await;
        let client = test_client(&server, 1);

        // Act
        let details = client.details("abc123").await;

        // Assert
        assert!(details.is_ok(), "Failed to get details: {:?}", details.unwrap_err());
        let details = details.unwrap().unwrap();
        assert_eq!(details.website.as_deref(), Some("https://hof.example"));
        assert!(details.admin_area().is_some());
        mock.assert();
    }

    #[tokio::test]
    async fn enrich_degrades_on_failure() {
        // Arrange
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/details");
                then.status(200).json_body(json!({ "status": "NOT_FOUND" }));
            })
            .await;
        let client = test_client(&server, 3);
        let summary: RawPlaceRecord = serde_json::from_value(place("gone")).unwrap();

        // Act
        let enriched = client.enrich(summary.clone()).await;

        // Assert
        assert_eq!(enriched, summary);
        mock.assert_hits(1);
    }

    #[test]
    fn query_params() {
        let text = SearchQuery::text("farm shops", "Aargau");
        assert_eq!(
            text.params(),
            vec![("query", "farm shops in Aargau Switzerland".to_string())]
        );
        let nearby = SearchQuery::nearby("farm", Coordinates::new(47.0, 8.0), 500);
        assert_eq!(nearby.params()[1], ("location", "47,8".to_string()));
    }

    #[tokio::test]
    async fn continuation_waits_for_page_token_delay() {
        // Arrange
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/textsearch")
                    .query_param("query", "farm shops in Aargau Switzerland");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "results": [place("a")],
                    "next_page_token": "token-2"
                }));
            })
            .await;
        let second_page = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/textsearch")
                    .query_param("pagetoken", "token-2");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "results": [place("b")]
                }));
            })
            .await;
        let delay = Duration::from_millis(150);
        let client = paced_client(&server, 1, delay, Duration::ZERO);
        let query = SearchQuery::text("farm shops", "Aargau");
        let mut results = pin!(client.search(&query));

        // Act
        let first = results.next().await;
        let before_continuation = Instant::now();
        let second = results.next().await;
        let waited = before_continuation.elapsed();

        // Assert
        assert_eq!(first.unwrap().unwrap().place_id(), Some("a"));
        assert_eq!(second.unwrap().unwrap().place_id(), Some("b"));
        assert!(waited >= delay, "continuation sent after {waited:?}");
        second_page.assert();
    }

    #[tokio::test]
    async fn consecutive_requests_are_spaced_by_min_interval() {
        // Arrange
        let server = MockServer::start_async().await;
        let details = server
            .mock_async(|when, then| {
                when.method(GET).path("/details");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "result": place("a")
                }));
            })
            .await;
        let interval = Duration::from_millis(150);
        let client = paced_client(&server, 1, Duration::ZERO, interval);

        // Act
        let started = Instant::now();
        client.details("a").await.unwrap();
        client.details("a").await.unwrap();
        let elapsed = started.elapsed();

        // Assert
        assert!(elapsed >= interval, "two requests took only {elapsed:?}");
        details.assert_hits(2);
    }
}
