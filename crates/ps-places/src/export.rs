//! Writing record collections to disk.
//!
//! Every writer creates missing parent directories and replaces whatever is
//! already at the target path; nothing is ever appended. Repeated runs with the
//! same output paths therefore leave only the latest run's data behind.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    constants::ADMIN_AREA_LEVEL_1,
    error::{FilesystemError, SaveError},
    place::RawPlaceRecord,
    record::CanonicalRecord,
};

const CANONICAL_CSV_HEADER: [&str; 14] = [
    "id",
    "name",
    "description",
    "address",
    "canton",
    "phone",
    "email",
    "website",
    "opening_hours",
    "products",
    "organic",
    "lat",
    "lng",
    "image",
];

const RAW_CSV_HEADER: [&str; 14] = [
    "place_id",
    "name",
    "formatted_address",
    "lat",
    "lng",
    "types",
    "website",
    "url",
    "formatted_phone_number",
    "opening_hours",
    "locality",
    ADMIN_AREA_LEVEL_1,
    "postal_code",
    "country",
];

/// Output wrapper for consumers that want provenance next to the data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub version: String,
    pub generated_at: String,
    pub records: Vec<T>,
}

impl<T> Envelope<T> {
    pub fn new(version: &str, generated_at: DateTime<Utc>, records: Vec<T>) -> Self {
        Self {
            version: version.to_string(),
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            records,
        }
    }
}

/// Write canonical records as a pretty-printed JSON array.
pub async fn write_json<P: AsRef<Path>>(path: P, records: &[CanonicalRecord]) -> Result<(), SaveError> {
    write_pretty(path.as_ref(), records).await?;
    info!(path = %path.as_ref().display(), records = records.len(), "wrote json");
    Ok(())
}

/// Write raw provider records as a pretty-printed JSON array.
pub async fn write_raw_json<P: AsRef<Path>>(path: P, records: &[RawPlaceRecord]) -> Result<(), SaveError> {
    write_pretty(path.as_ref(), records).await?;
    info!(path = %path.as_ref().display(), records = records.len(), "wrote raw json");
    Ok(())
}

/// Write records wrapped in a `{version, generated_at, records}` envelope.
pub async fn write_envelope<P: AsRef<Path>, T: Serialize>(
    path: P,
    envelope: &Envelope<T>,
) -> Result<(), SaveError> {
    write_pretty(path.as_ref(), envelope).await?;
    info!(
        path = %path.as_ref().display(),
        records = envelope.records.len(),
        version = %envelope.version,
        "wrote json envelope"
    );
    Ok(())
}

/// One row per record; opening hours and products are flattened to one cell each.
pub async fn write_csv<P: AsRef<Path>>(path: P, records: &[CanonicalRecord]) -> Result<(), SaveError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CANONICAL_CSV_HEADER)?;
    for record in records {
        writer.write_record([
            record.id.clone(),
            record.name.clone(),
            record.description.clone(),
            record.address.clone(),
            record.canton.clone(),
            record.phone.clone(),
            record.email.clone(),
            record.website.clone(),
            record.opening_hours.display(),
            record.products.join("; "),
            record.organic.to_string(),
            record.lat.to_string(),
            record.lng.to_string(),
            record.image.clone(),
        ])?;
    }
    write_bytes(path.as_ref(), &finish(writer)?).await?;
    info!(path = %path.as_ref().display(), records = records.len(), "wrote csv");
    Ok(())
}

/// Flattened raw records: coordinates split out, weekday lines joined with
/// `; `, and the common address components promoted to their own columns.
pub async fn write_raw_csv<P: AsRef<Path>>(path: P, records: &[RawPlaceRecord]) -> Result<(), SaveError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(RAW_CSV_HEADER)?;
    for record in records {
        let (lat, lng) = record
            .location()
            .map(|l| (cell(&l.lat), cell(&l.lng)))
            .unwrap_or_default();
        let component = |kind: &str| {
            record
                .component(kind)
                .map(|c| c.long_name.clone())
                .unwrap_or_default()
        };
        writer.write_record([
            record.place_id.clone().unwrap_or_default(),
            record.name.clone().unwrap_or_default(),
            record.formatted_address.clone().unwrap_or_default(),
            lat,
            lng,
            record.types.join(";"),
            record.website.clone().unwrap_or_default(),
            record.url.clone().unwrap_or_default(),
            record.formatted_phone_number.clone().unwrap_or_default(),
            record.weekday_text().join("; "),
            component("locality"),
            component(ADMIN_AREA_LEVEL_1),
            component("postal_code"),
            component("country"),
        ])?;
    }
    write_bytes(path.as_ref(), &finish(writer)?).await?;
    info!(path = %path.as_ref().display(), records = records.len(), "wrote raw csv");
    Ok(())
}

fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, SaveError> {
    writer
        .into_inner()
        .map_err(|e| SaveError::CsvError(csv::Error::from(e.into_error())))
}

async fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SaveError> {
    let serialized = serde_json::to_vec_pretty(value)?;
    write_bytes(path, &serialized).await?;
    Ok(())
}

/// Create parent directories, then replace the file.
pub(crate) async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FilesystemError::new(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| FilesystemError::new(path, e))
}
