use std::fmt;

use serde::Deserialize;

use crate::place::RawPlaceRecord;

// Request parameters are built directly in the client; only responses are modelled here.

/// Raw response from the text and nearby search services.
#[derive(Deserialize)]
pub struct SearchResponse {
    pub status: ApiStatus,
    #[serde(default)]
    pub results: Vec<RawPlaceRecord>,
    pub next_page_token: Option<String>,
    pub error_message: Option<String>,
}

/// Raw response from the details service.
#[derive(Deserialize)]
pub struct DetailsResponse {
    pub status: ApiStatus,
    pub result: Option<RawPlaceRecord>,
    pub error_message: Option<String>,
}

/// The `status` field every provider response carries.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ApiStatus {
    Ok,
    ZeroResults,
    OverQueryLimit,
    RequestDenied,
    InvalidRequest,
    NotFound,
    UnknownError,
    Other(String),
}

impl ApiStatus {
    /// Whether the payload can be trusted.
    pub fn is_success(&self) -> bool {
        matches!(self, ApiStatus::Ok | ApiStatus::ZeroResults)
    }
}

impl From<String> for ApiStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "OK" => ApiStatus::Ok,
            "ZERO_RESULTS" => ApiStatus::ZeroResults,
            "OVER_QUERY_LIMIT" => ApiStatus::OverQueryLimit,
            "REQUEST_DENIED" => ApiStatus::RequestDenied,
            "INVALID_REQUEST" => ApiStatus::InvalidRequest,
            "NOT_FOUND" => ApiStatus::NotFound,
            "UNKNOWN_ERROR" => ApiStatus::UnknownError,
            _ => ApiStatus::Other(value),
        }
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApiStatus::Ok => "OK",
            ApiStatus::ZeroResults => "ZERO_RESULTS",
            ApiStatus::OverQueryLimit => "OVER_QUERY_LIMIT",
            ApiStatus::RequestDenied => "REQUEST_DENIED",
            ApiStatus::InvalidRequest => "INVALID_REQUEST",
            ApiStatus::NotFound => "NOT_FOUND",
            ApiStatus::UnknownError => "UNKNOWN_ERROR",
            ApiStatus::Other(other) => other,
        };
        f.write_str(s)
    }
}
