//! In-memory annotation store
//!
//! Records live in a nested map keyed document id → sub-document key →
//! category, each bucket an insertion-ordered list. Per-document label
//! state and entries the loader could not interpret sit alongside so a
//! save round-trips without loss.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use super::labels::{ActionLabel, DocumentLabels, ACTION_CATEGORY};
use super::types::{AnnotationRecord, NewAnnotation, RecordPatch};
use crate::persist::SaveFile;

/// Exported shape: document id → sub-document key → category → records
pub type AnnotationMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<AnnotationRecord>>>>;

#[derive(Debug, Clone)]
struct StoredRecord {
    record: AnnotationRecord,
    /// Overlay elements painted for this record in the live container
    rendered_elements: usize,
}

type Bucket = Vec<StoredRecord>;
type Categories = BTreeMap<String, Bucket>;
type SubDocuments = BTreeMap<String, Categories>;

/// Owns every record of the active session
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    records: BTreeMap<String, SubDocuments>,
    labels: BTreeMap<String, DocumentLabels>,
    unrecognized: BTreeMap<String, Value>,
}

impl AnnotationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from an upgraded save file.
    ///
    /// Map keys are authoritative over the fields inside each record. A
    /// record whose id repeats inside its bucket gets a fresh id.
    pub fn from_save(save: &SaveFile) -> Self {
        let mut store = Self::new();

        for (document_id, subs) in &save.annotations {
            for (sub_document_key, categories) in subs {
                for (category, records) in categories {
                    let mut seen = HashSet::new();
                    for record in records {
                        let mut record = record.clone();
                        record.document_id = document_id.clone();
                        record.sub_document_key = sub_document_key.clone();
                        record.category = category.clone();
                        if !seen.insert(record.id.clone()) {
                            let fresh = Uuid::new_v4().to_string();
                            tracing::warn!(
                                document = %document_id,
                                category = %category,
                                old_id = %record.id,
                                new_id = %fresh,
                                "Duplicate record id in save file, reassigned"
                            );
                            record.id = fresh.clone();
                            seen.insert(fresh);
                        }
                        store.push(record);
                    }
                }
            }
        }

        store.labels = save.labels.clone();
        store.unrecognized = save.unrecognized.clone();
        store
    }

    fn push(&mut self, record: AnnotationRecord) {
        self.records
            .entry(record.document_id.clone())
            .or_default()
            .entry(record.sub_document_key.clone())
            .or_default()
            .entry(record.category.clone())
            .or_default()
            .push(StoredRecord {
                record,
                rendered_elements: 0,
            });
    }

    fn bucket(&self, document_id: &str, sub_document_key: &str, category: &str) -> Option<&Bucket> {
        self.records
            .get(document_id)?
            .get(sub_document_key)?
            .get(category)
    }

    fn bucket_mut(
        &mut self,
        document_id: &str,
        sub_document_key: &str,
        category: &str,
    ) -> Option<&mut Bucket> {
        self.records
            .get_mut(document_id)?
            .get_mut(sub_document_key)?
            .get_mut(category)
    }

    /// Store a new record, assigning its id and creation time. Duplicate
    /// or overlapping ranges are accepted.
    pub fn insert(
        &mut self,
        document_id: &str,
        sub_document_key: &str,
        category: &str,
        draft: NewAnnotation,
    ) -> AnnotationRecord {
        let record = AnnotationRecord::from_new(document_id, sub_document_key, category, draft);
        self.push(record.clone());
        record
    }

    /// Remove a record by id. Returns whether it was found.
    pub fn remove(
        &mut self,
        document_id: &str,
        sub_document_key: &str,
        category: &str,
        id: &str,
    ) -> bool {
        let Some(bucket) = self.bucket_mut(document_id, sub_document_key, category) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|stored| stored.record.id != id);
        let removed = bucket.len() != before;
        if removed {
            self.prune(document_id, sub_document_key, category);
        }
        removed
    }

    /// Remove a record from whichever category of the sub-document holds
    /// it. Returns that category.
    pub fn remove_anywhere(
        &mut self,
        document_id: &str,
        sub_document_key: &str,
        id: &str,
    ) -> Option<String> {
        let category = self.find(document_id, sub_document_key, id)?.category.clone();
        self.remove(document_id, sub_document_key, &category, id)
            .then_some(category)
    }

    fn prune(&mut self, document_id: &str, sub_document_key: &str, category: &str) {
        let Some(subs) = self.records.get_mut(document_id) else {
            return;
        };
        if let Some(categories) = subs.get_mut(sub_document_key) {
            if categories.get(category).is_some_and(Vec::is_empty) {
                categories.remove(category);
            }
            if categories.is_empty() {
                subs.remove(sub_document_key);
            }
        }
        if subs.is_empty() {
            self.records.remove(document_id);
        }
    }

    /// Look a record up by id across the categories of a sub-document
    pub fn find(&self, document_id: &str, sub_document_key: &str, id: &str) -> Option<&AnnotationRecord> {
        self.records
            .get(document_id)?
            .get(sub_document_key)?
            .values()
            .flatten()
            .map(|stored| &stored.record)
            .find(|record| record.id == id)
    }

    /// Apply a partial update to a record
    pub fn update(
        &mut self,
        document_id: &str,
        sub_document_key: &str,
        category: &str,
        id: &str,
        patch: RecordPatch,
    ) -> Option<AnnotationRecord> {
        let stored = self
            .bucket_mut(document_id, sub_document_key, category)?
            .iter_mut()
            .find(|stored| stored.record.id == id)?;
        stored.record.apply(patch);
        Some(stored.record.clone())
    }

    /// Records of one sub-document, optionally limited to one category.
    ///
    /// Insertion order within a bucket; categories in lexical order.
    pub fn list(
        &self,
        document_id: &str,
        sub_document_key: &str,
        category: Option<&str>,
    ) -> Vec<AnnotationRecord> {
        match category {
            Some(category) => self
                .bucket(document_id, sub_document_key, category)
                .map(|bucket| bucket.iter().map(|s| s.record.clone()).collect())
                .unwrap_or_default(),
            None => self
                .records
                .get(document_id)
                .and_then(|subs| subs.get(sub_document_key))
                .map(|categories| {
                    categories
                        .values()
                        .flatten()
                        .map(|s| s.record.clone())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Snapshot of every record, without render linkage
    pub fn export_all(&self) -> AnnotationMap {
        self.records
            .iter()
            .map(|(document_id, subs)| {
                let subs = subs
                    .iter()
                    .map(|(sub_document_key, categories)| {
                        let categories = categories
                            .iter()
                            .map(|(category, bucket)| {
                                let records = bucket.iter().map(|s| s.record.clone()).collect();
                                (category.clone(), records)
                            })
                            .collect();
                        (sub_document_key.clone(), categories)
                    })
                    .collect();
                (document_id.clone(), subs)
            })
            .collect()
    }

    /// Drop every record and label
    pub fn clear_all(&mut self) {
        self.records.clear();
        self.labels.clear();
        self.unrecognized.clear();
    }

    pub fn labels(&self, document_id: &str) -> Option<&DocumentLabels> {
        self.labels.get(document_id)
    }

    /// Label state for a document, created on first access
    pub fn labels_mut(&mut self, document_id: &str) -> &mut DocumentLabels {
        self.labels
            .entry(document_id.to_string())
            .or_insert_with(DocumentLabels::started_now)
    }

    pub fn all_labels(&self) -> &BTreeMap<String, DocumentLabels> {
        &self.labels
    }

    pub fn unrecognized(&self) -> &BTreeMap<String, Value> {
        &self.unrecognized
    }

    /// Set a document's action label. Moving from a malicious label to a
    /// non-malicious one drops every action record of the document; those
    /// records are returned so their overlays can be torn down.
    pub fn set_action_label(&mut self, document_id: &str, label: ActionLabel) -> Vec<AnnotationRecord> {
        if !self.labels_mut(document_id).set_action_label(label) {
            return Vec::new();
        }

        let mut dropped = Vec::new();
        if let Some(subs) = self.records.get_mut(document_id) {
            for categories in subs.values_mut() {
                if let Some(bucket) = categories.remove(ACTION_CATEGORY) {
                    dropped.extend(bucket.into_iter().map(|s| s.record));
                }
            }
            subs.retain(|_, categories| !categories.is_empty());
            if subs.is_empty() {
                self.records.remove(document_id);
            }
        }
        dropped
    }

    /// Total number of records
    pub fn record_count(&self) -> usize {
        self.records
            .values()
            .flat_map(|subs| subs.values())
            .flat_map(|categories| categories.values())
            .map(Vec::len)
            .sum()
    }

    /// Documents that have records or labels
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .keys()
            .chain(self.labels.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Remember how many overlay elements a record currently has
    pub fn mark_rendered(&mut self, document_id: &str, sub_document_key: &str, id: &str, elements: usize) {
        let Some(categories) = self
            .records
            .get_mut(document_id)
            .and_then(|subs| subs.get_mut(sub_document_key))
        else {
            return;
        };
        if let Some(stored) = categories
            .values_mut()
            .flatten()
            .find(|stored| stored.record.id == id)
        {
            stored.rendered_elements = elements;
        }
    }

    /// Overlay elements last painted for a record
    pub fn rendered_elements(&self, document_id: &str, sub_document_key: &str, id: &str) -> usize {
        self.records
            .get(document_id)
            .and_then(|subs| subs.get(sub_document_key))
            .and_then(|categories| {
                categories
                    .values()
                    .flatten()
                    .find(|stored| stored.record.id == id)
            })
            .map(|stored| stored.rendered_elements)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::types::DEFAULT_SUB_DOCUMENT;
    use crate::container::OffsetRange;

    fn draft(start: usize, end: usize, text: &str) -> NewAnnotation {
        NewAnnotation::spanning(OffsetRange::new(start, end).unwrap(), text)
    }

    #[test]
    fn test_insert_and_remove_symmetry() {
        let mut store = AnnotationStore::new();
        let record = store.insert("fileA.json", "with_oversight", "cot", draft(4, 9, "agent"));

        assert_eq!(store.list("fileA.json", "with_oversight", None).len(), 1);
        assert!(store.remove("fileA.json", "with_oversight", "cot", &record.id));
        assert!(store.list("fileA.json", "with_oversight", None).is_empty());
        assert_eq!(store.record_count(), 0);

        let before = store.export_all();
        assert!(!store.remove("fileA.json", "with_oversight", "cot", &record.id));
        assert!(!store.remove("missing", "main", "cot", "nope"));
        assert_eq!(store.export_all(), before);
    }

    #[test]
    fn test_list_order() {
        let mut store = AnnotationStore::new();
        let first = store.insert("doc", DEFAULT_SUB_DOCUMENT, "cot", draft(0, 3, "abc"));
        let action = store.insert("doc", DEFAULT_SUB_DOCUMENT, "action", draft(1, 2, "b"));
        let second = store.insert("doc", DEFAULT_SUB_DOCUMENT, "cot", draft(0, 3, "abc"));

        let cot: Vec<_> = store
            .list("doc", DEFAULT_SUB_DOCUMENT, Some("cot"))
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(cot, vec![first.id.clone(), second.id.clone()]);

        let all: Vec<_> = store
            .list("doc", DEFAULT_SUB_DOCUMENT, None)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(all, vec![action.id, first.id, second.id]);
    }

    #[test]
    fn test_unknown_category_accepted() {
        let mut store = AnnotationStore::new();
        store.insert("doc", "main", "not-in-taxonomy", draft(0, 1, "x"));

        assert_eq!(store.list("doc", "main", Some("not-in-taxonomy")).len(), 1);
    }

    #[test]
    fn test_remove_anywhere() {
        let mut store = AnnotationStore::new();
        let record = store.insert("doc", "main", "action", draft(0, 4, "rm -"));

        assert_eq!(
            store.remove_anywhere("doc", "main", &record.id),
            Some("action".to_string())
        );
        assert_eq!(store.remove_anywhere("doc", "main", &record.id), None);
    }

    #[test]
    fn test_export_strips_render_state() {
        let mut store = AnnotationStore::new();
        let record = store.insert("doc", "main", "cot", draft(0, 4, "text"));
        store.mark_rendered("doc", "main", &record.id, 2);

        assert_eq!(store.rendered_elements("doc", "main", &record.id), 2);
        let exported = store.export_all();
        assert_eq!(exported["doc"]["main"]["cot"], vec![record]);
        assert_eq!(store.export_all(), exported);
    }

    #[test]
    fn test_update_record() {
        let mut store = AnnotationStore::new();
        let record = store.insert("doc", "main", "cot", draft(0, 4, "text"));

        let patch = RecordPatch {
            comment: Some("second look".into()),
            ..RecordPatch::default()
        };
        let updated = store.update("doc", "main", "cot", &record.id, patch).unwrap();
        assert_eq!(updated.comment, "second look");
        assert!(store
            .update("doc", "main", "action", &record.id, RecordPatch::default())
            .is_none());
    }

    #[test]
    fn test_action_label_change_drops_action_records() {
        let mut store = AnnotationStore::new();
        store.set_action_label("doc", ActionLabel::Malicious);
        let action = store.insert("doc", "main", "action", draft(0, 4, "text"));
        store.insert("doc", "main", "cot", draft(0, 4, "text"));

        assert!(store.set_action_label("doc", ActionLabel::CovertMalicious).is_empty());
        let dropped = store.set_action_label("doc", ActionLabel::NoMalicious);

        assert_eq!(dropped, vec![action]);
        assert!(store.list("doc", "main", Some("action")).is_empty());
        assert_eq!(store.list("doc", "main", Some("cot")).len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let mut store = AnnotationStore::new();
        store.insert("a", "main", "cot", draft(0, 1, "x"));
        store.labels_mut("b").comments = "note".into();
        assert_eq!(store.document_ids(), vec!["a".to_string(), "b".to_string()]);

        store.clear_all();
        assert_eq!(store.record_count(), 0);
        assert!(store.document_ids().is_empty());
    }
}
