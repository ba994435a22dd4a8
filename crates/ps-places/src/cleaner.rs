use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{
    error::SchemaError,
    geo::Coordinates,
    place::RawPlaceRecord,
    record::{CanonicalRecord, OpeningHours, WeeklyHours},
};

const ORGANIC_PATTERN: &str = r"(?i)(bio|organic|öko|oeko|naturkost|demeter|knospe)";
static ORGANIC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ORGANIC_PATTERN).expect("Invalid regex pattern"));

const CANONICAL_ID_PATTERN: &str = r"^place-[0-9a-f]{16}$";
static CANONICAL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CANONICAL_ID_PATTERN).expect("Invalid regex pattern"));

/// How `opening_hours` is written. One format applies to a whole run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HoursFormat {
    /// `{"Mon": "...", ...}`, the canonical shape.
    #[default]
    Weekly,
    /// The provider's weekday lines joined into one display string.
    Joined,
}

impl FromStr for HoursFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(HoursFormat::Weekly),
            "joined" => Ok(HoursFormat::Joined),
            _ => Err(format!(
                "unknown hours format '{s}'. Valid options: weekly, joined"
            )),
        }
    }
}

impl fmt::Display for HoursFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoursFormat::Weekly => write!(f, "weekly"),
            HoursFormat::Joined => write!(f, "joined"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CleanerConfig {
    pub hours_format: HoursFormat,
}

/// Maps provider records onto [`CanonicalRecord`].
#[derive(Clone, Debug, Default)]
pub struct Cleaner {
    config: CleanerConfig,
}

impl Cleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    /// Normalize one record. Optional fields fall back to their defaults;
    /// a missing or malformed `place_id`, `name` or coordinate is an error.
    pub fn clean(&self, raw: &RawPlaceRecord) -> Result<CanonicalRecord, SchemaError> {
        let place_id = non_blank(raw.place_id.as_deref())
            .ok_or_else(|| SchemaError::new(None, "place_id", "missing or blank"))?;
        let name = non_blank(raw.name.as_deref())
            .ok_or_else(|| SchemaError::new(Some(place_id), "name", "missing or blank"))?;
        let location = raw
            .location()
            .ok_or_else(|| SchemaError::new(Some(place_id), "geometry.location", "missing"))?;
        let coordinates = Coordinates::new(
            coordinate(&location.lat, place_id, "lat")?,
            coordinate(&location.lng, place_id, "lng")?,
        );
        if !coordinates.is_valid() {
            return Err(SchemaError::new(
                Some(place_id),
                "geometry.location",
                format!("{coordinates} is outside the valid latitude/longitude range"),
            ));
        }

        Ok(CanonicalRecord {
            id: canonical_id(place_id),
            name: name.to_string(),
            description: String::new(),
            address: optional(raw.formatted_address.as_deref()),
            canton: raw
                .admin_area()
                .map(|c| c.long_name.trim().to_string())
                .unwrap_or_default(),
            phone: optional(raw.formatted_phone_number.as_deref()),
            email: String::new(),
            website: optional(raw.website.as_deref()),
            opening_hours: self.opening_hours(raw.weekday_text()),
            products: Vec::new(),
            organic: ORGANIC_REGEX.is_match(name),
            lat: coordinates.lat,
            lng: coordinates.lng,
            image: String::new(),
        })
    }

    fn opening_hours(&self, weekday_text: &[String]) -> OpeningHours {
        match self.config.hours_format {
            HoursFormat::Weekly => OpeningHours::Weekly(WeeklyHours::from_weekday_text(weekday_text)),
            HoursFormat::Joined => OpeningHours::Joined(
                weekday_text
                    .iter()
                    .map(|line| line.trim())
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }
    }
}

/// Stable record id derived from the provider's place id. Ids that are
/// already canonical, as in previously cleaned files, come back unchanged.
pub fn canonical_id(place_id: &str) -> String {
    let place_id = place_id.trim();
    if CANONICAL_ID_REGEX.is_match(place_id) {
        return place_id.to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(place_id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("place-{}", &digest[..16])
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn optional(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Coordinates arrive as numbers from the API and as strings from CSV files.
fn coordinate(value: &Value, place_id: &str, field: &'static str) -> Result<f64, SchemaError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => {
            return Err(SchemaError::new(Some(place_id), field, "missing"));
        }
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| SchemaError::new(Some(place_id), field, format!("`{value}` is not a number")))
}
