//! Annotation session
//!
//! One annotator's run: the record store, the taxonomy, the document being
//! viewed and where snapshots go. Every mutation goes through the session
//! so that it is followed by exactly one snapshot attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::annotations::{
    ActionLabel, AnnotationRecord, AnnotationStore, Confidence, CotLabel, CovertType,
    DocumentLabels, NewAnnotation, RecordPatch,
};
use crate::container::ContainerKey;
use crate::migrate::{parse_save, LoadError};
use crate::persist::{ExportDocument, SaveFile, SnapshotSink, CURRENT_SCHEMA_VERSION};
use crate::suggest::JudgeSuggestion;
use crate::taxonomy::Taxonomy;

/// Generate a session identifier
pub fn new_session_id() -> String {
    format!("session_{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone)]
struct ActiveDocument {
    key: ContainerKey,
    since: DateTime<Utc>,
}

/// Partial label change; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelUpdate {
    pub cot_label: Option<CotLabel>,
    pub cot_covert_type: Option<CovertType>,
    pub cot_hide_confidence: Option<Confidence>,
    pub action_label: Option<ActionLabel>,
    pub covert_action_confidence: Option<Confidence>,
    pub comments: Option<String>,
}

/// What a successful load brought in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub session_id: String,
    pub source_version: u32,
    pub documents: usize,
    pub records: usize,
    /// Entries whose labels were derived from a legacy shape
    pub remapped: usize,
    /// Entries kept verbatim
    pub unrecognized: usize,
}

/// Explicit context for one annotation session
pub struct Session {
    id: String,
    store: AnnotationStore,
    taxonomy: Taxonomy,
    active: Option<ActiveDocument>,
    sink: Option<Arc<dyn SnapshotSink>>,
    last_persist_error: Option<String>,
}

impl Session {
    /// Start an empty session
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            id: new_session_id(),
            store: AnnotationStore::new(),
            taxonomy,
            active: None,
            sink: None,
            last_persist_error: None,
        }
    }

    /// Send a snapshot to `sink` after every mutation
    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut AnnotationStore {
        &mut self.store
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Container currently on screen
    pub fn active_key(&self) -> Option<&ContainerKey> {
        self.active.as_ref().map(|a| &a.key)
    }

    /// Message of the most recent failed snapshot, cleared by the next
    /// successful one
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    pub fn labels(&self, document_id: &str) -> Option<&DocumentLabels> {
        self.store.labels(document_id)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Switch to another container. Time spent on the previous document is
    /// credited to it if the document has labels.
    pub fn open_document(&mut self, key: ContainerKey) {
        self.flush_time();
        tracing::debug!(container = %key, "Opened document");
        self.active = Some(ActiveDocument {
            key,
            since: Utc::now(),
        });
    }

    /// Leave the current document
    pub fn close_document(&mut self) {
        self.flush_time();
        self.active = None;
    }

    fn flush_time(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let now = Utc::now();
        let elapsed = (now - active.since).num_milliseconds().max(0) as u64;
        active.since = now;

        let document_id = active.key.document_id.clone();
        if self.store.labels(&document_id).is_some() {
            self.store.labels_mut(&document_id).total_time_ms += elapsed;
            self.autosave();
        }
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Store a record. Categories outside the taxonomy are accepted.
    pub fn insert(
        &mut self,
        key: &ContainerKey,
        category: &str,
        draft: NewAnnotation,
    ) -> AnnotationRecord {
        if !self.taxonomy.contains(category) {
            tracing::warn!(
                container = %key,
                category = %category,
                "Category not in taxonomy, storing anyway"
            );
        }
        let record = self
            .store
            .insert(&key.document_id, &key.sub_document_key, category, draft);
        tracing::info!(
            container = %key,
            category = %category,
            record_id = %record.id,
            "Annotation added"
        );
        self.autosave();
        record
    }

    pub fn remove(&mut self, key: &ContainerKey, category: &str, id: &str) -> bool {
        let removed = self
            .store
            .remove(&key.document_id, &key.sub_document_key, category, id);
        if removed {
            tracing::info!(container = %key, record_id = %id, "Annotation removed");
            self.autosave();
        }
        removed
    }

    /// Remove a record from whichever category holds it
    pub fn remove_anywhere(&mut self, key: &ContainerKey, id: &str) -> Option<String> {
        let category = self
            .store
            .remove_anywhere(&key.document_id, &key.sub_document_key, id)?;
        tracing::info!(
            container = %key,
            category = %category,
            record_id = %id,
            "Annotation removed"
        );
        self.autosave();
        Some(category)
    }

    pub fn update(
        &mut self,
        key: &ContainerKey,
        category: &str,
        id: &str,
        patch: RecordPatch,
    ) -> Option<AnnotationRecord> {
        let record = self.store.update(
            &key.document_id,
            &key.sub_document_key,
            category,
            id,
            patch,
        )?;
        self.autosave();
        Some(record)
    }

    pub(crate) fn note_rendered(&mut self, key: &ContainerKey, id: &str, elements: usize) {
        self.store
            .mark_rendered(&key.document_id, &key.sub_document_key, id, elements);
    }

    // ------------------------------------------------------------------
    // Labels
    // ------------------------------------------------------------------

    pub fn set_cot_label(&mut self, document_id: &str, label: CotLabel) {
        self.store.labels_mut(document_id).set_cot_label(label);
        self.autosave();
    }

    pub fn set_cot_covert_type(&mut self, document_id: &str, covert_type: CovertType) {
        self.store.labels_mut(document_id).set_cot_covert_type(covert_type);
        self.autosave();
    }

    pub fn set_cot_hide_confidence(&mut self, document_id: &str, confidence: Confidence) {
        self.store
            .labels_mut(document_id)
            .set_cot_hide_confidence(confidence);
        self.autosave();
    }

    /// Set the action label. Returns the action records that a change to a
    /// non-malicious label removed; their overlays must be torn down.
    pub fn set_action_label(&mut self, document_id: &str, label: ActionLabel) -> Vec<AnnotationRecord> {
        let dropped = self.store.set_action_label(document_id, label);
        if !dropped.is_empty() {
            tracing::info!(
                document = %document_id,
                removed = dropped.len(),
                "Action highlights cleared by label change"
            );
        }
        self.autosave();
        dropped
    }

    pub fn set_covert_action_confidence(&mut self, document_id: &str, confidence: Confidence) {
        self.store
            .labels_mut(document_id)
            .set_covert_action_confidence(confidence);
        self.autosave();
    }

    pub fn set_comments(&mut self, document_id: &str, comments: &str) {
        self.store.labels_mut(document_id).comments = comments.to_string();
        self.autosave();
    }

    /// Apply several label changes as one mutation. Primary labels are set
    /// before their follow-up fields.
    pub fn apply_labels(&mut self, document_id: &str, update: LabelUpdate) -> Vec<AnnotationRecord> {
        let dropped = match update.action_label {
            Some(label) => self.store.set_action_label(document_id, label),
            None => Vec::new(),
        };

        let labels = self.store.labels_mut(document_id);
        if let Some(label) = update.cot_label {
            labels.set_cot_label(label);
        }
        if let Some(covert_type) = update.cot_covert_type {
            labels.set_cot_covert_type(covert_type);
        }
        if let Some(confidence) = update.cot_hide_confidence {
            labels.set_cot_hide_confidence(confidence);
        }
        if let Some(confidence) = update.covert_action_confidence {
            labels.set_covert_action_confidence(confidence);
        }
        if let Some(comments) = update.comments {
            labels.comments = comments;
        }

        self.autosave();
        dropped
    }

    /// Pre-fill a document's labels from reviewer output. Returns what was
    /// recognized, or `None` when the text held nothing usable.
    pub fn apply_judge_output(&mut self, document_id: &str, text: &str) -> Option<JudgeSuggestion> {
        let suggestion = JudgeSuggestion::parse(text);
        if suggestion.is_empty() {
            return None;
        }
        if suggestion.apply(self.store.labels_mut(document_id)) {
            tracing::info!(document = %document_id, "Applied judge suggestions");
            self.autosave();
        }
        Some(suggestion)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Replace the session's contents with a save file. On error nothing
    /// changes.
    pub fn load_save_str(&mut self, json: &str) -> Result<LoadSummary, LoadError> {
        let upgraded = parse_save(json)?;
        let store = AnnotationStore::from_save(&upgraded.save);

        for (document_id, subs) in &upgraded.save.annotations {
            for category in subs.values().flat_map(|categories| categories.keys()) {
                if !self.taxonomy.contains(category) {
                    tracing::warn!(
                        document = %document_id,
                        category = %category,
                        "Loaded category not in taxonomy"
                    );
                }
            }
        }

        let summary = LoadSummary {
            session_id: upgraded.save.session_id.clone(),
            source_version: upgraded.source_version,
            documents: store.document_ids().len(),
            records: store.record_count(),
            remapped: upgraded.migration.remapped,
            unrecognized: store.unrecognized().len(),
        };

        self.id = upgraded.save.session_id;
        self.store = store;
        tracing::info!(
            session = %self.id,
            documents = summary.documents,
            records = summary.records,
            source_version = summary.source_version,
            "Loaded save file"
        );
        self.autosave();
        Ok(summary)
    }

    /// Current state as a save file
    pub fn save_file(&self) -> SaveFile {
        SaveFile {
            schema_version: CURRENT_SCHEMA_VERSION,
            session_id: self.id.clone(),
            save_timestamp: Utc::now(),
            annotations: self.store.export_all(),
            labels: self.store.all_labels().clone(),
            unrecognized: self.store.unrecognized().clone(),
        }
    }

    /// Export artifact with completion counts
    pub fn export(&self) -> ExportDocument {
        let annotated_document_ids: Vec<String> = self
            .store
            .all_labels()
            .iter()
            .filter(|(_, labels)| labels.is_complete())
            .map(|(id, _)| id.clone())
            .collect();

        ExportDocument {
            export_timestamp: Utc::now(),
            session_id: self.id.clone(),
            annotated_document_count: annotated_document_ids.len(),
            annotated_document_ids,
            annotations: self.store.export_all(),
            labels: self.store.all_labels().clone(),
        }
    }

    /// Drop everything. Confirmation happens at the caller's boundary.
    pub fn clear_all(&mut self) {
        self.store.clear_all();
        tracing::info!(session = %self.id, "Cleared all annotations");
        self.autosave();
    }

    /// Snapshot to the sink. Failures are logged and remembered, never
    /// returned to the mutation that triggered them.
    fn autosave(&mut self) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        match sink.persist(&self.save_file()) {
            Ok(()) => self.last_persist_error = None,
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "Autosave failed");
                self.last_persist_error = Some(e.to_string());
            }
        }
    }
}
