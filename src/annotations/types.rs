//! Annotation record types
//!
//! A record anchors a category label to a character range inside one
//! sub-document. Records serialize in camelCase so that save files and
//! exports stay readable by the browser front end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::container::OffsetRange;

/// Sub-document key used when a document is not paired
pub const DEFAULT_SUB_DOCUMENT: &str = "main";

/// A persisted span annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    /// Unique identifier (UUID)
    pub id: String,
    /// The document this record belongs to
    pub document_id: String,
    /// Which side of a paired sample (or `main`)
    pub sub_document_key: String,
    /// Taxonomy category
    pub category: String,
    /// Optional secondary taxonomy value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_label: Option<String>,
    /// Start character offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_start: Option<usize>,
    /// End character offset (exclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_end: Option<usize>,
    /// Text under the range when the record was created
    #[serde(default)]
    pub selected_text: String,
    /// Free-text comment
    #[serde(default)]
    pub comment: String,
    /// Category-specific structured data
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra_fields: Map<String, Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied part of a record; the store fills in id and timestamp
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnotation {
    #[serde(default)]
    pub sub_label: Option<String>,
    #[serde(default)]
    pub range_start: Option<usize>,
    #[serde(default)]
    pub range_end: Option<usize>,
    #[serde(default)]
    pub selected_text: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub extra_fields: Map<String, Value>,
}

/// Partial update for an existing record
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    pub sub_label: Option<String>,
    pub comment: Option<String>,
    pub extra_fields: Option<Map<String, Value>>,
}

impl AnnotationRecord {
    /// Build a stored record from a draft
    pub fn from_new(
        document_id: &str,
        sub_document_key: &str,
        category: &str,
        draft: NewAnnotation,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            sub_document_key: sub_document_key.to_string(),
            category: category.to_string(),
            sub_label: draft.sub_label,
            range_start: draft.range_start,
            range_end: draft.range_end,
            selected_text: draft.selected_text,
            comment: draft.comment,
            extra_fields: draft.extra_fields,
            created_at: Utc::now(),
        }
    }

    /// The anchored range, if both ends are present and non-empty
    pub fn range(&self) -> Option<OffsetRange> {
        match (self.range_start, self.range_end) {
            (Some(start), Some(end)) => OffsetRange::new(start, end),
            _ => None,
        }
    }

    /// Apply a partial update
    pub fn apply(&mut self, patch: RecordPatch) {
        if let Some(sub_label) = patch.sub_label {
            self.sub_label = if sub_label.is_empty() {
                None
            } else {
                Some(sub_label)
            };
        }
        if let Some(comment) = patch.comment {
            self.comment = comment;
        }
        if let Some(extra) = patch.extra_fields {
            self.extra_fields = extra;
        }
    }
}

impl NewAnnotation {
    /// Draft covering a range with its text snapshot
    pub fn spanning(range: OffsetRange, selected_text: impl Into<String>) -> Self {
        Self {
            range_start: Some(range.start),
            range_end: Some(range.end),
            selected_text: selected_text.into(),
            ..Self::default()
        }
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Set the sub-label
    pub fn with_sub_label(mut self, sub_label: &str) -> Self {
        self.sub_label = Some(sub_label.to_string());
        self
    }

    /// Add a structured field
    pub fn with_extra_field(mut self, key: &str, value: Value) -> Self {
        self.extra_fields.insert(key.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_new_assigns_identity() {
        let draft = NewAnnotation::spanning(OffsetRange::new(4, 9).unwrap(), "agent");
        let a = AnnotationRecord::from_new("fileA.json", "with_oversight", "action", draft.clone());
        let b = AnnotationRecord::from_new("fileA.json", "with_oversight", "action", draft);

        assert_ne!(a.id, b.id);
        assert_eq!(a.range(), OffsetRange::new(4, 9));
        assert_eq!(a.selected_text, "agent");
    }

    #[test]
    fn test_range_requires_both_ends() {
        let mut record =
            AnnotationRecord::from_new("doc", DEFAULT_SUB_DOCUMENT, "cot", NewAnnotation::default());
        assert!(record.range().is_none());

        record.range_start = Some(3);
        assert!(record.range().is_none());

        record.range_end = Some(3);
        assert!(record.range().is_none());
    }

    #[test]
    fn test_serialization() {
        let draft = NewAnnotation::spanning(OffsetRange::new(0, 5).unwrap(), "hello")
            .with_comment("looks deliberate")
            .with_extra_field("withManipulation", Value::String("yes".into()));
        let record = AnnotationRecord::from_new("doc", "without_oversight", "cot", draft);

        let json = serde_json::to_string_pretty(&record).unwrap();
        assert!(json.contains("\"subDocumentKey\": \"without_oversight\""));
        assert!(json.contains("\"rangeStart\": 0"));
        assert!(json.contains("withManipulation"));
        assert!(!json.contains("subLabel"));

        let parsed: AnnotationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_apply_patch() {
        let mut record = AnnotationRecord::from_new(
            "doc",
            DEFAULT_SUB_DOCUMENT,
            "cot",
            NewAnnotation::default().with_sub_label("hide"),
        );

        record.apply(RecordPatch {
            sub_label: Some(String::new()),
            comment: Some("revised".into()),
            extra_fields: None,
        });

        assert_eq!(record.sub_label, None);
        assert_eq!(record.comment, "revised");
    }
}
