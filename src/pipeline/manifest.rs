//! Download manifests
//!
//! A manifest is a JSON object mapping document IDs to URLs:
//!
//! ```json
//! { "pdf1": "https://example.gov/report.pdf", "pdf2": "https://example.gov/annex.pdf" }
//! ```
//!
//! Entries are ordered by the numeric suffix of their ID, so `pdf10` comes
//! after `pdf9`. IDs without a numeric suffix sort after all numbered ones.

use crate::config::FilenameScheme;
use crate::{HarvestError, Result};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::path::Path;

/// One document to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    pub url: String,
    /// 1-based position after ordering
    pub position: usize,
}

impl ManifestEntry {
    /// Local filename for this entry under `scheme`
    pub fn filename(&self, scheme: FilenameScheme) -> String {
        match scheme {
            FilenameScheme::Sequential => format!("pdf{:02}.pdf", self.position),
            FilenameScheme::ManifestId => format!("{}.pdf", self.id),
        }
    }
}

/// An ordered list of documents to download
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Parses a manifest from JSON text
    ///
    /// # Returns
    ///
    /// * `Ok(Manifest)` - Entries in download order
    /// * `Err(HarvestError)` - Not a JSON object, a URL that is not a string,
    ///   or an ID that cannot be used as a filename
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(HarvestError::Manifest(format!(
                    "expected a JSON object of id -> url, found {}",
                    json_type(&other)
                )))
            }
        };

        Self::from_object(object)
    }

    /// Reads and parses a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn from_object(object: Map<String, Value>) -> Result<Self> {
        let mut pairs = Vec::with_capacity(object.len());

        for (id, value) in object {
            let url = match value {
                Value::String(url) => url,
                other => {
                    return Err(HarvestError::Manifest(format!(
                        "URL for '{}' must be a string, found {}",
                        id,
                        json_type(&other)
                    )))
                }
            };

            if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
                return Err(HarvestError::Manifest(format!(
                    "'{}' cannot be used as a document id",
                    id
                )));
            }

            pairs.push((id, url));
        }

        pairs.sort_by(|(a, _), (b, _)| compare_ids(a, b));

        let entries = pairs
            .into_iter()
            .enumerate()
            .map(|(index, (id, url))| ManifestEntry {
                id,
                url,
                position: index + 1,
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Trailing decimal digits of an ID, if any
fn numeric_suffix(id: &str) -> Option<u64> {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    id[digits_start..].parse().ok()
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    match (numeric_suffix(a), numeric_suffix(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
