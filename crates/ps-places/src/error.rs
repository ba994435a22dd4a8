use std::{fmt, path::PathBuf};

use reqwest::StatusCode;
use thiserror::Error;

use crate::api_interfaces::places::ApiStatus;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("the request to {endpoint} failed after {attempts} attempt(s): {source}")]
    Transport {
        endpoint: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} responded with status code {status} after {attempts} attempt(s)")]
    Http {
        endpoint: String,
        status: StatusCode,
        attempts: u32,
    },
    #[error("{endpoint} returned provider status {status} after {attempts} attempt(s): {}", message.as_deref().unwrap_or("no error message"))]
    Provider {
        endpoint: String,
        http_status: StatusCode,
        status: ApiStatus,
        message: Option<String>,
        attempts: u32,
    },
    #[error("the response body from {endpoint} could not be read: {source}")]
    ResponseBody {
        endpoint: String,
        http_status: StatusCode,
        #[source]
        source: reqwest::Error,
    },
    #[error("unable to parse the response from {endpoint}: {source}")]
    Parse {
        endpoint: String,
        http_status: StatusCode,
        #[source]
        source: serde_json::Error,
    },
}

impl RequestError {
    /// The last HTTP status seen before giving up, if a response arrived at all.
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Transport { source, .. } => source.status(),
            RequestError::Http { status, .. } => Some(*status),
            RequestError::Provider { http_status, .. }
            | RequestError::ResponseBody { http_status, .. }
            | RequestError::Parse { http_status, .. } => Some(*http_status),
        }
    }

    /// Whether the request is worth repeating. A fresh continuation token is
    /// rejected with `INVALID_REQUEST` until the provider activates it, so that
    /// status only counts on `continuation` requests.
    pub fn is_transient(&self, continuation: bool) -> bool {
        match self {
            RequestError::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            RequestError::Http { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            RequestError::Provider { status, .. } => match status {
                ApiStatus::OverQueryLimit | ApiStatus::UnknownError => true,
                ApiStatus::InvalidRequest => continuation,
                _ => false,
            },
            RequestError::ResponseBody { .. } => true,
            RequestError::Parse { .. } => false,
        }
    }

    /// The provider status, for failures the provider reported in the payload.
    pub fn provider_status(&self) -> Option<&ApiStatus> {
        match self {
            RequestError::Provider { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// A single record that cannot be mapped onto the canonical schema.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("record {} has an invalid `{field}`: {reason}", place_id.as_deref().unwrap_or("<no place_id>"))]
pub struct SchemaError {
    pub place_id: Option<String>,
    pub field: &'static str,
    pub reason: String,
}

impl SchemaError {
    pub fn new(place_id: Option<&str>, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            place_id: place_id.map(str::to_owned),
            field,
            reason: reason.into(),
        }
    }
}

/// One record rejected by batch validation.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordFailure {
    /// Where the record came from, as `file#index`.
    pub source: String,
    pub place_id: Option<String>,
    pub reason: String,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (place_id {}): {}",
            self.source,
            self.place_id.as_deref().unwrap_or("<none>"),
            self.reason
        )
    }
}

/// Every record that failed batch validation.
#[derive(Debug, Error, PartialEq)]
#[error("{} record(s) failed validation:\n{}", failures.len(), render_failures(failures))]
pub struct ValidationError {
    pub failures: Vec<RecordFailure>,
}

fn render_failures(failures: &[RecordFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("  - {failure}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
#[error("unable to write {}: {source}", path.display())]
pub struct FilesystemError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl FilesystemError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
    #[error("unable to serialize the data: {0}")]
    SerializeError(#[from] serde_json::Error),
    #[error("unable to write csv data: {0}")]
    CsvError(#[from] csv::Error),
}
