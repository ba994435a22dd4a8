mod api_interfaces;
mod api_key;
pub mod cleaner;
pub mod client;
pub mod config;
pub mod constants;
pub mod dedup;
pub mod error;
pub mod etl;
pub mod export;
pub mod geo;
pub mod pipeline;
pub mod place;
pub mod record;
pub mod region;
pub mod verify;

pub use api_interfaces::places::ApiStatus;
pub use api_key::{ApiKey, ApiKeyError};
