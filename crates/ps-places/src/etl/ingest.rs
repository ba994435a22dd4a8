//! Reading previously saved files back into [`RawPlaceRecord`]s.
//!
//! Files written at different times do not agree on a shape: raw provider
//! JSON, the flattened raw CSV, and earlier cleaned output all show up in the
//! same input directory. All of that drift is absorbed here so the rest of the
//! batch pipeline only ever sees provider-shaped records.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::EtlError;
use crate::{
    constants::ADMIN_AREA_LEVEL_1,
    place::{AddressComponent, Geometry, LatLng, OpeningHoursText, RawPlaceRecord},
    record::WeeklyHours,
};

/// Keys under which earlier runs nested their record arrays.
const ENVELOPE_KEYS: &[&str] = &["records", "farmshops"];

/// A parsed record together with where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct SourcedRecord {
    /// `file#index`, zero-based within the file.
    pub source: String,
    pub record: RawPlaceRecord,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileKind {
    Json,
    Csv,
}

fn file_kind(path: &Path) -> Option<FileKind> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("json") => Some(FileKind::Json),
        Some("csv") => Some(FileKind::Csv),
        _ => None,
    }
}

/// JSON and CSV files directly inside `dir`, sorted by name. Paths in
/// `exclude` are skipped.
pub async fn discover(dir: &Path, exclude: &[PathBuf]) -> Result<Vec<PathBuf>, EtlError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|source| EtlError::InputDir {
            path: dir.to_path_buf(),
            source,
        })?;
    let excluded: Vec<PathBuf> = exclude
        .iter()
        .filter_map(|p| std::fs::canonicalize(p).ok())
        .collect();

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| EtlError::InputDir {
            path: dir.to_path_buf(),
            source,
        })?
    {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file || file_kind(&path).is_none() {
            continue;
        }
        if std::fs::canonicalize(&path).is_ok_and(|c| excluded.contains(&c)) {
            debug!(path = %path.display(), "skipping excluded file");
            continue;
        }
        files.push(path);
    }
    files.sort();
    info!(dir = %dir.display(), files = files.len(), "discovered input files");
    Ok(files)
}

/// Parse one file into sourced records.
pub async fn load_file(path: &Path) -> Result<Vec<SourcedRecord>, EtlError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| EtlError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = match file_kind(path) {
        Some(FileKind::Json) => json_rows(path, &bytes)?,
        Some(FileKind::Csv) => csv_rows(path, &bytes)?,
        None => Vec::new(),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let records: Vec<SourcedRecord> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| SourcedRecord {
            source: format!("{name}#{index}"),
            record: from_loose(row),
        })
        .collect();
    info!(path = %path.display(), records = records.len(), "parsed input file");
    Ok(records)
}

fn json_rows(path: &Path, bytes: &[u8]) -> Result<Vec<Map<String, Value>>, EtlError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| EtlError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => {
            match ENVELOPE_KEYS
                .iter()
                .find_map(|key| match object.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                }) {
                Some(items) => items,
                None => vec![Value::Object(object)],
            }
        }
        other => {
            return Err(EtlError::Parse {
                path: path.to_path_buf(),
                reason: format!("expected an array or object, found {}", kind_name(&other)),
            })
        }
    };
    let total = items.len();
    let rows: Vec<_> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(object) => Some(object),
            _ => None,
        })
        .collect();
    if rows.len() != total {
        warn!(
            path = %path.display(),
            skipped = total - rows.len(),
            "ignored entries that are not objects"
        );
    }
    Ok(rows)
}

fn csv_rows(path: &Path, bytes: &[u8]) -> Result<Vec<Map<String, Value>>, EtlError> {
    let parse_error = |e: csv::Error| EtlError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = reader.headers().map_err(parse_error)?.clone();
    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.map_err(parse_error)?;
        let map = headers
            .iter()
            .zip(row.iter())
            .map(|(key, value)| (key.trim().to_string(), Value::String(value.to_string())))
            .collect();
        rows.push(map);
    }
    Ok(rows)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// First non-empty value among `keys`, as text.
fn text(row: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match row.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First present coordinate among `keys`, kept as a JSON value for the cleaner
/// to validate.
fn coordinate(row: &Map<String, Value>, keys: &[&str]) -> Value {
    keys.iter()
        .find_map(|key| match row.get(*key)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::Null => None,
            value => Some(value.clone()),
        })
        .unwrap_or(Value::Null)
}

/// Map any known record shape onto a provider-shaped record.
pub fn from_loose(row: &Map<String, Value>) -> RawPlaceRecord {
    RawPlaceRecord {
        place_id: text(row, &["place_id", "id"]),
        name: text(row, &["name"]),
        formatted_address: text(row, &["formatted_address", "address"]),
        geometry: geometry(row),
        types: types(row),
        website: text(row, &["website"]),
        url: text(row, &["url", "google_maps_url"]),
        formatted_phone_number: text(row, &["formatted_phone_number", "phone"]),
        opening_hours: opening_hours(row),
        address_components: address_components(row),
    }
}

fn geometry(row: &Map<String, Value>) -> Option<Geometry> {
    if let Some(location) = row
        .get("geometry")
        .and_then(|g| g.get("location"))
        .and_then(|l| serde_json::from_value::<LatLng>(l.clone()).ok())
    {
        return Some(Geometry {
            location: Some(location),
        });
    }
    let lat = coordinate(row, &["geometry.location.lat", "lat", "latitude"]);
    let lng = coordinate(row, &["geometry.location.lng", "lng", "longitude"]);
    if lat.is_null() && lng.is_null() {
        return None;
    }
    Some(Geometry {
        location: Some(LatLng { lat, lng }),
    })
}

fn types(row: &Map<String, Value>) -> Vec<String> {
    match row.get("types") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => s
            .split([';', ','])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn opening_hours(row: &Map<String, Value>) -> Option<OpeningHoursText> {
    let lines: Vec<String> = match row
        .get("opening_hours")
        .or_else(|| row.get("opening_hours.weekday_text"))
    {
        Some(Value::Object(object)) => match object.get("weekday_text") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|l| l.as_str().map(str::to_string))
                .collect(),
            // Cleaned shape: {"Mon": "..."}
            _ => object
                .iter()
                .filter_map(|(day, hours)| hours.as_str().map(|h| format!("{day}: {h}")))
                .collect(),
        },
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|l| l.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => split_hours_text(s),
        _ => Vec::new(),
    };
    if lines.is_empty() {
        return None;
    }
    Some(OpeningHoursText {
        open_now: None,
        weekday_text: lines,
    })
}

/// Split a flattened hours cell back into weekday lines. Both `; ` and `, `
/// have been used as separators, and a day's hours may themselves contain a
/// comma, so a new line only starts where a day name follows.
fn split_hours_text(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for piece in text.split([';', ',']).map(str::trim).filter(|p| !p.is_empty()) {
        let starts_day = piece
            .split_once(':')
            .is_some_and(|(day, _)| WeeklyHours::is_day_name(day));
        match lines.last_mut() {
            Some(line) if !starts_day => {
                line.push_str(", ");
                line.push_str(piece);
            }
            _ => lines.push(piece.to_string()),
        }
    }
    lines
}

fn address_components(row: &Map<String, Value>) -> Vec<AddressComponent> {
    if let Some(components) = row
        .get("address_components")
        .and_then(|c| serde_json::from_value::<Vec<AddressComponent>>(c.clone()).ok())
        .filter(|c| !c.is_empty())
    {
        return components;
    }
    [
        ("locality", &["locality"][..]),
        (ADMIN_AREA_LEVEL_1, &[ADMIN_AREA_LEVEL_1, "canton"][..]),
        ("postal_code", &["postal_code"][..]),
        ("country", &["country"][..]),
    ]
    .into_iter()
    .filter_map(|(kind, keys)| {
        text(row, keys).map(|long_name| AddressComponent {
            long_name,
            short_name: None,
            types: vec![kind.to_string()],
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn row(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn from_loose_provider_shape() {
        let record = from_loose(&row(json!({
            "place_id": "abc123",
            "name": "Hofladen",
            "formatted_address": "Dorf 1",
            "geometry": { "location": { "lat": 47.39, "lng": 8.05 } },
            "opening_hours": { "weekday_text": ["Monday: Closed"] },
            "address_components": [
                { "long_name": "Aargau", "types": ["administrative_area_level_1"] }
            ]
        })));

        assert_eq!(record.place_id(), Some("abc123"));
        assert_eq!(record.location().unwrap().lat, json!(47.39));
        assert_eq!(record.weekday_text(), ["Monday: Closed".to_string()]);
        assert_eq!(record.admin_area().unwrap().long_name, "Aargau");
    }

    #[test]
    fn from_loose_flattened_csv_row() {
        let record = from_loose(&row(json!({
            "place_id": "abc123",
            "name": "Hofladen",
            "lat": "47.39",
            "lng": "8.05",
            "types": "store;food",
            "website": "",
            "opening_hours": "Monday: 9:00 AM – 12:00 PM, 1:30 – 6:00 PM; Tuesday: Closed",
            "administrative_area_level_1": "Aargau",
            "locality": "Aarau"
        })));

        assert_eq!(record.location().unwrap().lat, json!("47.39"));
        assert_eq!(record.types, ["store", "food"]);
        assert_eq!(record.website, None);
        assert_eq!(
            record.weekday_text(),
            [
                "Monday: 9:00 AM – 12:00 PM, 1:30 – 6:00 PM".to_string(),
                "Tuesday: Closed".to_string()
            ]
        );
        assert_eq!(record.admin_area().unwrap().long_name, "Aargau");
        assert_eq!(record.component("locality").unwrap().long_name, "Aarau");
    }

    #[test]
    fn from_loose_previously_cleaned_shape() {
        let record = from_loose(&row(json!({
            "name": "Hofladen",
            "address": "Dorf 1",
            "latitude": 47.39,
            "longitude": 8.05,
            "opening_hours": { "Mon": "8–12", "Sat": "8–16" },
            "google_maps_url": "https://maps.google.com/?cid=1"
        })));

        assert_eq!(record.place_id, None);
        assert_eq!(record.formatted_address.as_deref(), Some("Dorf 1"));
        assert_eq!(record.location().unwrap().lng, json!(8.05));
        assert_eq!(record.url.as_deref(), Some("https://maps.google.com/?cid=1"));
        assert_eq!(record.weekday_text().len(), 2);
    }

    #[test]
    fn split_hours_text_handles_both_separators() {
        assert_eq!(
            split_hours_text("Monday: 8–12, Tuesday: Closed"),
            ["Monday: 8–12", "Tuesday: Closed"]
        );
        assert!(split_hours_text("").is_empty());
    }

    #[tokio::test]
    async fn load_json_envelopes_and_single_objects() {
        // Arrange
        let dir = tempdir().unwrap();
        let envelope = dir.path().join("old.json");
        let single = dir.path().join("single.json");
        tokio::fs::write(
            &envelope,
            json!({ "farmshops": [{ "place_id": "a" }, { "place_id": "b" }] }).to_string(),
        )
        .await
        .unwrap();
        tokio::fs::write(&single, json!({ "place_id": "c" }).to_string())
            .await
            .unwrap();

        // Act
        let from_envelope = load_file(&envelope).await.unwrap();
        let from_single = load_file(&single).await.unwrap();

        // Assert
        assert_eq!(from_envelope.len(), 2);
        assert_eq!(from_envelope[1].source, "old.json#1");
        assert_eq!(from_single.len(), 1);
        assert_eq!(from_single[0].record.place_id(), Some("c"));
    }

    #[tokio::test]
    async fn load_malformed_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, "[{\"place_id\": ").await.unwrap();

        let result = load_file(&path).await;

        assert!(matches!(result, Err(EtlError::Parse { .. })));
    }

    #[tokio::test]
    async fn discover_is_sorted_non_recursive_and_filtered() {
        // Arrange
        let dir = tempdir().unwrap();
        for name in ["b.csv", "a.json", "notes.txt", "out.json"] {
            tokio::fs::write(dir.path().join(name), "[]").await.unwrap();
        }
        tokio::fs::create_dir(dir.path().join("nested")).await.unwrap();
        tokio::fs::write(dir.path().join("nested").join("c.json"), "[]")
            .await
            .unwrap();

        // Act
        let files = discover(dir.path(), &[dir.path().join("out.json")])
            .await
            .unwrap();

        // Assert
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.json", "b.csv"]);
    }

    #[tokio::test]
    async fn discover_missing_directory() {
        let result = discover(Path::new("totally_nonexistent_dir"), &[]).await;
        assert!(matches!(result, Err(EtlError::InputDir { .. })));
    }
}
