use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use super::rules::clean;

/// One row of the input dataset: a source identifier plus the raw antigen
/// names recorded in its three origin fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub source_id: String,
    pub antibody_names: Vec<String>,
    pub marker_names: Vec<String>,
    pub channel_names: Vec<String>,
}

impl SourceRecord {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Default::default()
        }
    }

    pub fn with_antibodies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.antibody_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_markers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.marker_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_channels<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Union of the three origin fields, deduplicated.
    pub fn raw_antigens(&self) -> BTreeSet<String> {
        self.antibody_names
            .iter()
            .chain(&self.marker_names)
            .chain(&self.channel_names)
            .cloned()
            .collect()
    }
}

/// A successful generation result for one cleaned antigen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonizationRecord {
    pub original_string: String,
    pub harmonized_gene_name: String,
    pub common_name: Option<String>,
    /// The `original_string` the model echoed back, kept only when it differs
    /// from the cleaned antigen that was sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echoed_string: Option<String>,
}

/// Why a cleaned antigen produced no mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No `{` or `[` anywhere in the response.
    NoStructuredData,
    /// Both parse attempts failed.
    Unparseable,
    /// Parsed, but no usable `harmonized_gene_name`.
    MissingGeneName,
    /// Every attempt ran past the per-call timeout.
    Timeout,
    /// The generation service call failed and the run was told to keep going.
    Transport,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::NoStructuredData => "no structured data",
            FailureKind::Unparseable => "unparseable",
            FailureKind::MissingGeneName => "missing harmonized_gene_name",
            FailureKind::Timeout => "timeout",
            FailureKind::Transport => "transport failure",
        };
        write!(f, "{}", s)
    }
}

pub const INVALID_RESULT_MESSAGE: &str = "The response is not a valid structured result.";

/// Error record retained in the response log for a cleaned antigen that
/// could not be harmonized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonizationFailure {
    pub original_string: String,
    pub response: String,
    pub error: String,
    pub error_kind: FailureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Parsed structured data, kept for schema-incomplete responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
}

impl HarmonizationFailure {
    pub fn new(original_string: &str, response: &str, kind: FailureKind) -> Self {
        Self {
            original_string: original_string.to_string(),
            response: response.to_string(),
            error: INVALID_RESULT_MESSAGE.to_string(),
            error_kind: kind,
            detail: None,
            structured: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_structured(mut self, structured: Value) -> Self {
        self.structured = Some(structured);
        self
    }
}

/// One entry of the full response log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseLogEntry {
    Harmonized(HarmonizationRecord),
    Failed(HarmonizationFailure),
}

impl ResponseLogEntry {
    /// The cleaned antigen this entry was produced for.
    pub fn cleaned_antigen(&self) -> &str {
        match self {
            ResponseLogEntry::Harmonized(record) => &record.original_string,
            ResponseLogEntry::Failed(failure) => &failure.original_string,
        }
    }

    pub fn harmonized_name(&self) -> Option<&str> {
        match self {
            ResponseLogEntry::Harmonized(record) => Some(&record.harmonized_gene_name),
            ResponseLogEntry::Failed(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ResponseLogEntry::Harmonized(_) => None,
            ResponseLogEntry::Failed(failure) => Some(failure.error_kind),
        }
    }
}

/// Raw antigen → cleaned antigen, built once per run from every raw antigen
/// seen in the dataset.
#[derive(Debug, Clone, Default)]
pub struct CleaningTable {
    raw_to_cleaned: BTreeMap<String, String>,
}

impl CleaningTable {
    pub fn build<'a, I>(raw_antigens: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let raw_to_cleaned = raw_antigens
            .into_iter()
            .map(|raw| (raw.clone(), clean(raw)))
            .collect();
        Self { raw_to_cleaned }
    }

    pub fn from_records(records: &[SourceRecord]) -> Self {
        let raw: BTreeSet<String> = records.iter().flat_map(SourceRecord::raw_antigens).collect();
        Self::build(&raw)
    }

    /// Cleaned form of `raw`. Raw values outside the table are cleaned on the
    /// spot so the lookup stays total.
    pub fn cleaned(&self, raw: &str) -> String {
        self.raw_to_cleaned
            .get(raw)
            .cloned()
            .unwrap_or_else(|| clean(raw))
    }

    /// Distinct cleaned antigens, in sorted order.
    pub fn distinct_cleaned(&self) -> BTreeSet<String> {
        self.raw_to_cleaned.values().cloned().collect()
    }

    pub fn raw_count(&self) -> usize {
        self.raw_to_cleaned.len()
    }
}

/// Cleaned antigen → harmonized name. Partial: only cleaned antigens whose
/// generation step succeeded have an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarmonizedTable {
    cleaned_to_harmonized: HashMap<String, String>,
}

impl HarmonizedTable {
    pub fn from_responses(responses: &[ResponseLogEntry]) -> Self {
        let cleaned_to_harmonized = responses
            .iter()
            .filter_map(|entry| match entry {
                ResponseLogEntry::Harmonized(record) => Some((
                    record.original_string.clone(),
                    record.harmonized_gene_name.clone(),
                )),
                ResponseLogEntry::Failed(_) => None,
            })
            .collect();
        Self {
            cleaned_to_harmonized,
        }
    }

    pub fn insert(&mut self, cleaned: impl Into<String>, harmonized: impl Into<String>) {
        self.cleaned_to_harmonized
            .insert(cleaned.into(), harmonized.into());
    }

    pub fn get(&self, cleaned: &str) -> Option<&str> {
        self.cleaned_to_harmonized.get(cleaned).map(String::as_str)
    }

    /// Harmonized name for `cleaned`, or `cleaned` itself when the generation
    /// step produced nothing for it.
    pub fn harmonized_or_identity(&self, cleaned: &str) -> String {
        self.get(cleaned).unwrap_or(cleaned).to_string()
    }

    pub fn len(&self) -> usize {
        self.cleaned_to_harmonized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cleaned_to_harmonized.is_empty()
    }

    pub fn distinct_harmonized(&self) -> BTreeSet<&str> {
        self.cleaned_to_harmonized
            .values()
            .map(String::as_str)
            .collect()
    }
}
