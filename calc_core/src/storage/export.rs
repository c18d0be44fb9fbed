//! Export envelope and import.
//!
//! An export is the document JSON with two extra top-level keys:
//!
//! ```json
//! { "basic": { ... }, ..., "exportTime": "2025-03-01T08:00:00+00:00", "version": "2.0" }
//! ```
//!
//! Import accepts any file whose `version` major matches (or that has no
//! `version` at all), merges it over [`Document::sample`], sanitizes, and
//! rejects it if validation reports errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::errors::{CalcError, CalcResult};
use crate::validation::validate;

use super::{merge_with_defaults, Storage};

/// Envelope version written by [`export_document`].
pub const EXPORT_VERSION: &str = "2.0";

/// Document plus export metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    #[serde(flatten)]
    pub document: Document,
    pub export_time: String,
    pub version: String,
}

impl ExportEnvelope {
    pub fn new(document: &Document, at: DateTime<Utc>) -> Self {
        ExportEnvelope {
            document: document.sanitized(),
            export_time: at.to_rfc3339(),
            version: EXPORT_VERSION.to_string(),
        }
    }
}

/// Pretty-printed export JSON stamped with `at`.
pub fn export_document(doc: &Document, at: DateTime<Utc>) -> CalcResult<String> {
    Ok(serde_json::to_string_pretty(&ExportEnvelope::new(doc, at))?)
}

/// `hopeful-finance-YYYY-MM-DD.json` for the date of `at`.
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("hopeful-finance-{}.json", at.format("%Y-%m-%d"))
}

/// Parse, merge, sanitize and validate an exported (or hand-written) file.
pub fn import_document(json: &str) -> CalcResult<Document> {
    let mut value: Value = serde_json::from_str(json)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| CalcError::invalid_input("import", "non-object", "Import file must contain a JSON object"))?;

    if let Some(version) = object.remove("version") {
        let version = match version {
            Value::String(s) => s,
            other => other.to_string(),
        };
        validate_version(&version)?;
    }
    object.remove("exportTime");

    let defaults = Document::sample().to_value()?;
    let doc = Document::from_value(merge_with_defaults(&value, &defaults))?;

    let report = validate(&doc);
    if !report.is_valid {
        tracing::warn!(errors = ?report.errors, "import rejected");
        return Err(CalcError::ValidationFailed { errors: report.errors });
    }
    Ok(doc)
}

/// [`import_document`] and persist the result.
pub fn import_into<S: Storage + ?Sized>(storage: &S, json: &str) -> CalcResult<Document> {
    let doc = import_document(json)?;
    storage.save(&doc)?;
    Ok(doc)
}

/// The envelope major version must match [`EXPORT_VERSION`]'s.
fn validate_version(file_version: &str) -> CalcResult<()> {
    let major = |v: &str| v.trim().split('.').next().and_then(|p| p.parse::<u32>().ok());
    match (major(file_version), major(EXPORT_VERSION)) {
        (Some(file), Some(current)) if file == current => Ok(()),
        _ => Err(CalcError::VersionMismatch {
            file_version: file_version.to_string(),
            expected_version: EXPORT_VERSION.to_string(),
        }),
    }
}
