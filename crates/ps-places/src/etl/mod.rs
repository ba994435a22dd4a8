//! Batch mode: rebuild one validated output file from a directory of
//! previously saved search results.
//!
//! The run is all-or-nothing. Every record is cleaned and checked against a
//! reference sample first; if any record fails, the run reports all failures
//! and writes nothing.

pub mod ingest;
pub mod schema;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    cleaner::{Cleaner, CleanerConfig, HoursFormat},
    dedup::Deduplicator,
    error::{RecordFailure, SaveError, ValidationError},
    export::{self, Envelope},
    record::CanonicalRecord,
    region::folder_name,
};
use ingest::SourcedRecord;
use schema::ReferenceSchema;

pub const DEFAULT_ENVELOPE_VERSION: &str = "1.0";

#[derive(Clone, Debug)]
pub struct EtlOptions {
    pub input_dir: PathBuf,
    /// Sample file whose first record defines the expected output shape.
    pub schema_file: PathBuf,
    pub output_file: PathBuf,
    /// Also write one file per canton under `<output dir>/<canton>/`.
    pub canton_folders: bool,
    /// Wrap output in `{version, generated_at, records}`.
    pub metadata_envelope: bool,
    pub hours_format: HoursFormat,
    pub version: String,
}

impl EtlOptions {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        schema_file: impl Into<PathBuf>,
        output_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            schema_file: schema_file.into(),
            output_file: output_file.into(),
            canton_folders: false,
            metadata_envelope: false,
            hours_format: HoursFormat::default(),
            version: DEFAULT_ENVELOPE_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("unable to list input directory {}: {source}", path.display())]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
    #[error("invalid reference schema {}: {reason}", path.display())]
    Schema { path: PathBuf, reason: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Save(#[from] SaveError),
}

/// What a successful run did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EtlReport {
    pub files: usize,
    /// Records parsed across all files, duplicates included.
    pub records: usize,
    pub duplicates: usize,
    pub written: usize,
    pub canton_files: Vec<PathBuf>,
}

pub async fn run(options: &EtlOptions) -> Result<EtlReport, EtlError> {
    run_at(options, Utc::now()).await
}

/// [`run`] with a fixed envelope timestamp.
pub async fn run_at(options: &EtlOptions, generated_at: DateTime<Utc>) -> Result<EtlReport, EtlError> {
    let schema = ReferenceSchema::load(&options.schema_file).await?;
    let files = ingest::discover(
        &options.input_dir,
        &[options.output_file.clone(), options.schema_file.clone()],
    )
    .await?;

    let mut sourced = Vec::new();
    for file in &files {
        sourced.extend(ingest::load_file(file).await?);
    }
    let total = sourced.len();

    let mut dedup = Deduplicator::new();
    let unique: Vec<SourcedRecord> = sourced
        .into_iter()
        .filter(|s| {
            let admitted = dedup.admit(&s.record);
            if !admitted {
                debug!(source = %s.source, "dropping duplicate place");
            }
            admitted
        })
        .collect();
    let duplicates = total - unique.len();

    let records = validate(&unique, &schema, options.hours_format)?;

    write_records(&options.output_file, &records, options, generated_at).await?;
    let canton_files = if options.canton_folders {
        write_canton_folders(&records, options, generated_at).await?
    } else {
        Vec::new()
    };

    info!(
        files = files.len(),
        records = total,
        duplicates,
        written = records.len(),
        "etl run complete"
    );
    Ok(EtlReport {
        files: files.len(),
        records: total,
        duplicates,
        written: records.len(),
        canton_files,
    })
}

/// Clean and schema-check every record, collecting all failures.
fn validate(
    records: &[SourcedRecord],
    schema: &ReferenceSchema,
    hours_format: HoursFormat,
) -> Result<Vec<CanonicalRecord>, EtlError> {
    let cleaner = Cleaner::new(CleanerConfig { hours_format });
    let mut cleaned = Vec::with_capacity(records.len());
    let mut failures = Vec::new();

    for SourcedRecord { source, record } in records {
        let fail = |reason: String| RecordFailure {
            source: source.clone(),
            place_id: record.place_id.clone(),
            reason,
        };
        match cleaner.clean(record) {
            Ok(canonical) => {
                let value = serde_json::to_value(&canonical).map_err(SaveError::from)?;
                let problems = schema.check(&value);
                if problems.is_empty() {
                    cleaned.push(canonical);
                } else {
                    failures.push(fail(problems.join("; ")));
                }
            }
            Err(e) => failures.push(fail(format!("invalid `{}`: {}", e.field, e.reason))),
        }
    }

    if failures.is_empty() {
        Ok(cleaned)
    } else {
        warn!(failures = failures.len(), "validation failed, nothing written");
        Err(ValidationError { failures }.into())
    }
}

async fn write_records(
    path: &Path,
    records: &[CanonicalRecord],
    options: &EtlOptions,
    generated_at: DateTime<Utc>,
) -> Result<(), SaveError> {
    if options.metadata_envelope {
        let envelope = Envelope::new(&options.version, generated_at, records.to_vec());
        export::write_envelope(path, &envelope).await
    } else {
        export::write_json(path, records).await
    }
}

async fn write_canton_folders(
    records: &[CanonicalRecord],
    options: &EtlOptions,
    generated_at: DateTime<Utc>,
) -> Result<Vec<PathBuf>, SaveError> {
    let mut by_canton: BTreeMap<String, Vec<CanonicalRecord>> = BTreeMap::new();
    for record in records {
        by_canton
            .entry(folder_name(&record.canton))
            .or_default()
            .push(record.clone());
    }

    let output_dir = options
        .output_file
        .parent()
        .unwrap_or_else(|| Path::new(""));
    let file_name = options
        .output_file
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("output.json"));

    let mut written = Vec::with_capacity(by_canton.len());
    for (folder, group) in by_canton {
        let path = output_dir.join(folder).join(&file_name);
        write_records(&path, &group, options, generated_at).await?;
        written.push(path);
    }
    Ok(written)
}
