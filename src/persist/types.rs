//! Persisted data types
//!
//! The save file is the durable snapshot of a session. It carries an
//! explicit schema version so loaders dispatch on version instead of
//! guessing from field presence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::annotations::{AnnotationMap, DocumentLabels};

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Versioned session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub save_timestamp: DateTime<Utc>,
    /// document id → sub-document key → category → records
    pub annotations: AnnotationMap,
    /// Per-document label state
    #[serde(default)]
    pub labels: BTreeMap<String, DocumentLabels>,
    /// Entries the loader kept verbatim because it could not interpret them
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unrecognized: BTreeMap<String, Value>,
}

impl SaveFile {
    /// Empty snapshot for a session
    pub fn empty(session_id: &str) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            session_id: session_id.to_string(),
            save_timestamp: Utc::now(),
            annotations: AnnotationMap::new(),
            labels: BTreeMap::new(),
            unrecognized: BTreeMap::new(),
        }
    }
}

/// Export artifact handed to the download collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub export_timestamp: DateTime<Utc>,
    pub session_id: String,
    /// Documents whose labels are complete
    pub annotated_document_count: usize,
    pub annotated_document_ids: Vec<String>,
    pub annotations: AnnotationMap,
    pub labels: BTreeMap<String, DocumentLabels>,
}
