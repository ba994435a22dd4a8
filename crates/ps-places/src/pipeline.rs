//! Live mode: search, dedup, enrich, filter and clean in one pass.

use std::pin::pin;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::{
    cleaner::{Cleaner, CleanerConfig},
    client::{Client, SearchQuery},
    dedup::Deduplicator,
    error::RequestError,
    geo::{BoundingBox, Coordinates},
    place::RawPlaceRecord,
    record::CanonicalRecord,
    region::Region,
};

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub region: Region,
    /// Drop records whose coordinates fall outside this box.
    pub bounds: Option<BoundingBox>,
    pub cleaner: CleanerConfig,
    /// Produce canonical records next to the raw ones.
    pub clean: bool,
}

impl PipelineOptions {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            bounds: None,
            cleaner: CleanerConfig::default(),
            clean: false,
        }
    }
}

/// Events reported while a run is in progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Progress<'a> {
    QueryStarted {
        index: usize,
        total: usize,
        query: &'a SearchQuery,
    },
    /// Search is done; `total` unique places are about to be enriched.
    EnrichStarted { total: usize },
    Enriched { done: usize, total: usize },
}

/// A query that failed after retries.
#[derive(Debug)]
pub struct QueryFailure {
    pub query: SearchQuery,
    pub error: RequestError,
}

#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// Enriched records inside the region, in discovery order.
    pub raw: Vec<RawPlaceRecord>,
    /// Empty unless cleaning was requested.
    pub cleaned: Vec<CanonicalRecord>,
    /// Records the cleaner rejected.
    pub skipped: usize,
    pub outside_region: usize,
    pub failures: Vec<QueryFailure>,
}

type ProgressHook<'c> = Box<dyn Fn(Progress<'_>) + Send + Sync + 'c>;

pub struct Pipeline<'c> {
    client: &'c Client,
    options: PipelineOptions,
    on_progress: Option<ProgressHook<'c>>,
}

impl<'c> Pipeline<'c> {
    pub fn new(client: &'c Client, options: PipelineOptions) -> Self {
        Self {
            client,
            options,
            on_progress: None,
        }
    }

    pub fn on_progress(mut self, hook: impl Fn(Progress<'_>) + Send + Sync + 'c) -> Self {
        self.on_progress = Some(Box::new(hook));
        self
    }

    fn report(&self, progress: Progress<'_>) {
        if let Some(hook) = &self.on_progress {
            hook(progress);
        }
    }

    /// Run every query in order. A failing query is recorded and the rest
    /// still run; records it yielded before failing are kept.
    pub async fn run(&self, queries: &[SearchQuery]) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let mut dedup = Deduplicator::new();
        let mut candidates = Vec::new();

        for (index, query) in queries.iter().enumerate() {
            self.report(Progress::QueryStarted {
                index,
                total: queries.len(),
                query,
            });
            let mut results = pin!(self.client.search(query));
            while let Some(result) = results.next().await {
                match result {
                    Ok(record) if dedup.admit(&record) => candidates.push(record),
                    Ok(record) => {
                        debug!(place_id = record.place_id().unwrap_or_default(), "duplicate place");
                    }
                    Err(error) => {
                        warn!(query = %query, error = %error, "query failed");
                        outcome.failures.push(QueryFailure {
                            query: query.clone(),
                            error,
                        });
                    }
                }
            }
        }
        info!(unique = dedup.len(), queries = queries.len(), "search finished");

        let total = candidates.len();
        self.report(Progress::EnrichStarted { total });
        for (done, summary) in candidates.into_iter().enumerate() {
            let record = self.client.enrich(summary).await;
            self.report(Progress::Enriched {
                done: done + 1,
                total,
            });
            if self.keep(&record) {
                outcome.raw.push(record);
            } else {
                outcome.outside_region += 1;
            }
        }

        if self.options.clean {
            let cleaner = Cleaner::new(self.options.cleaner);
            for record in &outcome.raw {
                match cleaner.clean(record) {
                    Ok(cleaned) => outcome.cleaned.push(cleaned),
                    Err(error) => {
                        warn!(error = %error, "skipping record");
                        outcome.skipped += 1;
                    }
                }
            }
        }

        info!(
            region = self.options.region.name(),
            kept = outcome.raw.len(),
            outside_region = outcome.outside_region,
            cleaned = outcome.cleaned.len(),
            skipped = outcome.skipped,
            failed_queries = outcome.failures.len(),
            "pipeline finished"
        );
        outcome
    }

    fn keep(&self, record: &RawPlaceRecord) -> bool {
        if !self.options.region.contains(record) {
            debug!(place_id = record.place_id().unwrap_or_default(), "outside region");
            return false;
        }
        match &self.options.bounds {
            Some(bounds) => coordinates(record).is_some_and(|point| bounds.contains(point)),
            None => true,
        }
    }
}

fn coordinates(record: &RawPlaceRecord) -> Option<Coordinates> {
    let location = record.location()?;
    let number = |v: &serde_json::Value| match v {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    };
    Some(Coordinates::new(number(&location.lat)?, number(&location.lng)?))
}
