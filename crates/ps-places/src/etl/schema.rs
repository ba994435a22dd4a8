use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};

use super::EtlError;

/// The shape every output record must have, taken from a sample record.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceSchema {
    fields: Map<String, Value>,
}

impl ReferenceSchema {
    /// Load the first record of a sample file. The file may hold a bare
    /// object, an array, or a `records`/`farmshops` envelope.
    pub async fn load(path: &Path) -> Result<Self, EtlError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| EtlError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| EtlError::Schema {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_value(value).map_err(|reason| EtlError::Schema {
            path: PathBuf::from(path),
            reason,
        })
    }

    pub fn from_value(value: Value) -> Result<Self, String> {
        let sample = match value {
            Value::Array(items) => items.into_iter().next(),
            Value::Object(mut object) => {
                match ["records", "farmshops"]
                    .iter()
                    .find_map(|key| match object.remove(*key) {
                        Some(Value::Array(items)) => Some(items),
                        _ => None,
                    }) {
                    Some(items) => items.into_iter().next(),
                    None => Some(Value::Object(object)),
                }
            }
            _ => None,
        };
        match sample {
            Some(Value::Object(fields)) => Ok(Self { fields }),
            Some(_) => Err("the sample record is not an object".to_string()),
            None => Err("the sample file holds no records".to_string()),
        }
    }

    /// Every way `record` departs from the reference. Empty means it conforms.
    pub fn check(&self, record: &Value) -> Vec<String> {
        let Value::Object(candidate) = record else {
            return vec!["record is not an object".to_string()];
        };
        let expected: BTreeSet<&str> = self.fields.keys().map(String::as_str).collect();
        let actual: BTreeSet<&str> = candidate.keys().map(String::as_str).collect();

        let mut problems: Vec<String> = expected
            .difference(&actual)
            .map(|key| format!("missing key `{key}`"))
            .chain(
                actual
                    .difference(&expected)
                    .map(|key| format!("unexpected key `{key}`")),
            )
            .collect();

        for (key, reference) in &self.fields {
            let Some(value) = candidate.get(key) else {
                continue;
            };
            if !compatible(reference, value) {
                problems.push(format!(
                    "`{key}` should be {} but is {}",
                    kind(reference),
                    kind(value)
                ));
            }
        }
        problems
    }
}

fn compatible(reference: &Value, value: &Value) -> bool {
    reference.is_null() || kind(reference) == kind(value)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
