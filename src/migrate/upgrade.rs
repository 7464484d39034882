//! Save file upgrade
//!
//! Dispatches on `schemaVersion`. Version-less (or version 1) files are the
//! legacy browser saves: a `file_names` list plus one free-form entry per
//! document holding labels and text-only highlights. They are normalized,
//! then lifted into typed labels and range-less records.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use super::legacy::{migrate_entries, MigrationReport};
use crate::annotations::{
    AnnotationMap, AnnotationRecord, DocumentLabels, ACTION_CATEGORY, COT_CATEGORY,
    DEFAULT_SUB_DOCUMENT,
};
use crate::persist::{SaveFile, CURRENT_SCHEMA_VERSION};
use crate::session::new_session_id;

/// Errors rejecting a save file. The caller's state is never touched.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Invalid save file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid save file: top level is not an object")]
    NotAnObject,

    #[error("Invalid save file: missing or malformed `{0}`")]
    MissingKey(&'static str),

    #[error("Save file schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: String, supported: u32 },
}

/// An upgraded save and how it was produced
#[derive(Debug, Clone)]
pub struct Upgrade {
    pub save: SaveFile,
    /// Schema version found in the input (legacy files report 1)
    pub source_version: u32,
    pub migration: MigrationReport,
}

/// Parse and upgrade a save file
pub fn parse_save(json: &str) -> Result<Upgrade, LoadError> {
    let raw: Value = serde_json::from_str(json)?;
    upgrade(raw)
}

/// Upgrade a raw save value to the current schema
pub fn upgrade(raw: Value) -> Result<Upgrade, LoadError> {
    let Value::Object(root) = raw else {
        return Err(LoadError::NotAnObject);
    };

    match root.get("schemaVersion") {
        None | Some(Value::Null) => upgrade_legacy(root),
        Some(Value::Number(n)) if n.as_u64() == Some(1) => upgrade_legacy(root),
        Some(Value::Number(n)) if n.as_u64() == Some(u64::from(CURRENT_SCHEMA_VERSION)) => {
            if !root.get("annotations").is_some_and(Value::is_object) {
                return Err(LoadError::MissingKey("annotations"));
            }
            let save: SaveFile = serde_json::from_value(Value::Object(root))?;
            Ok(Upgrade {
                save,
                source_version: CURRENT_SCHEMA_VERSION,
                migration: MigrationReport::default(),
            })
        }
        Some(other) => Err(LoadError::UnsupportedVersion {
            found: other.to_string(),
            supported: CURRENT_SCHEMA_VERSION,
        }),
    }
}

fn upgrade_legacy(mut root: Map<String, Value>) -> Result<Upgrade, LoadError> {
    let Some(Value::Object(mut entries)) = root.remove("annotations") else {
        return Err(LoadError::MissingKey("annotations"));
    };
    if !root.get("file_names").is_some_and(Value::is_array) {
        return Err(LoadError::MissingKey("file_names"));
    }

    let session_id = root
        .get("sessionId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_session_id);
    let save_timestamp = root
        .get("save_timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let migration = migrate_entries(&mut entries);

    let mut annotations = AnnotationMap::new();
    let mut labels = BTreeMap::new();
    let mut unrecognized = BTreeMap::new();

    for (document_id, entry) in entries {
        let Value::Object(mut fields) = entry else {
            unrecognized.insert(document_id, entry);
            continue;
        };
        let original = fields.clone();

        let mut lifted = BTreeMap::new();
        for (field, category) in [
            ("cot_highlights", COT_CATEGORY),
            ("action_highlights", ACTION_CATEGORY),
        ] {
            // anything but a list stays with the labels
            if !fields.get(field).is_some_and(Value::is_array) {
                continue;
            }
            let Some(Value::Array(highlights)) = fields.remove(field) else {
                continue;
            };
            if highlights.is_empty() {
                continue;
            }
            let records = highlights
                .into_iter()
                .map(|h| lift_highlight(&document_id, category, h, save_timestamp))
                .collect::<Vec<_>>();
            lifted.insert(category.to_string(), records);
        }

        match serde_json::from_value::<DocumentLabels>(Value::Object(fields)) {
            Ok(document_labels) => {
                labels.insert(document_id.clone(), document_labels);
                if !lifted.is_empty() {
                    annotations
                        .entry(document_id)
                        .or_default()
                        .insert(DEFAULT_SUB_DOCUMENT.to_string(), lifted);
                }
            }
            Err(e) => {
                tracing::warn!(
                    document = %document_id,
                    error = %e,
                    "Legacy entry not understood, kept verbatim"
                );
                unrecognized.insert(document_id, Value::Object(original));
            }
        }
    }

    Ok(Upgrade {
        save: SaveFile {
            schema_version: CURRENT_SCHEMA_VERSION,
            session_id,
            save_timestamp,
            annotations,
            labels,
            unrecognized,
        },
        source_version: 1,
        migration,
    })
}

/// Legacy highlights are `{id: <epoch millis>, text, type}` and carry no
/// offsets, so they become records without a range.
fn lift_highlight(
    document_id: &str,
    category: &str,
    highlight: Value,
    fallback_time: DateTime<Utc>,
) -> AnnotationRecord {
    let mut fields = match highlight {
        Value::Object(fields) => fields,
        Value::String(text) => {
            let mut fields = Map::new();
            fields.insert("text".to_string(), Value::String(text));
            fields
        }
        other => {
            let mut fields = Map::new();
            fields.insert("legacy".to_string(), other);
            fields
        }
    };

    let (id, created_at) = match fields.remove("id") {
        Some(Value::Number(n)) => (
            n.to_string(),
            n.as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .unwrap_or(fallback_time),
        ),
        Some(Value::String(s)) if !s.is_empty() => (s, fallback_time),
        _ => (Uuid::new_v4().to_string(), fallback_time),
    };
    let selected_text = match fields.remove("text") {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    fields.remove("type");

    AnnotationRecord {
        id,
        document_id: document_id.to_string(),
        sub_document_key: DEFAULT_SUB_DOCUMENT.to_string(),
        category: category.to_string(),
        sub_label: None,
        range_start: None,
        range_end: None,
        selected_text,
        comment: String::new(),
        extra_fields: fields,
        created_at,
    }
}
