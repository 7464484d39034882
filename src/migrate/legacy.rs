//! Legacy label normalization
//!
//! Older save files describe each document with flags that predate the
//! two-axis chain-of-thought / action labels. The rules below rewrite an
//! entry in place; running them on already-current data changes nothing.

use serde_json::{Map, Value};

/// Which historical shape an entry was recognized as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyShape {
    /// Integer `category` in 1..=3
    Category(u8),
    /// Boolean `scheming_action` and `scheming_cot`
    BooleanPair,
    /// Boolean `scheming`
    Scheming,
}

/// Outcome of migrating a bag of entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Object entries inspected
    pub entries: usize,
    /// Entries whose labels were derived from a legacy shape
    pub remapped: usize,
    /// Non-object entries left untouched
    pub passed_through: usize,
}

const COVERT_FIELDS: [&str; 3] = [
    "cot_covert_type",
    "cot_hide_confidence",
    "covert_action_confidence",
];
const HIGHLIGHT_FIELDS: [&str; 2] = ["cot_highlights", "action_highlights"];
const DEPRECATED_FIELDS: [&str; 2] = ["highlights", "confidence"];

/// Normalize every entry of a document → entry map in place
pub fn migrate_entries(entries: &mut Map<String, Value>) -> MigrationReport {
    let mut report = MigrationReport::default();

    for (document_id, entry) in entries.iter_mut() {
        let Some(entry) = entry.as_object_mut() else {
            report.passed_through += 1;
            continue;
        };
        report.entries += 1;
        if let Some(shape) = migrate_entry(entry) {
            tracing::debug!(document = %document_id, shape = ?shape, "Migrated legacy labels");
            report.remapped += 1;
        }
    }

    report
}

/// Normalize one entry. Returns the legacy shape that was mapped, if any.
pub fn migrate_entry(entry: &mut Map<String, Value>) -> Option<LegacyShape> {
    let shape = if is_set(entry.get("cot_label")) && is_set(entry.get("action_label")) {
        None
    } else {
        map_axes(entry)
    };

    for field in COVERT_FIELDS {
        if !is_set(entry.get(field)) {
            entry.insert(field.to_string(), Value::Null);
        }
    }
    for field in HIGHLIGHT_FIELDS {
        if entry.get(field).map_or(true, Value::is_null) {
            entry.insert(field.to_string(), Value::Array(Vec::new()));
        }
    }
    for field in DEPRECATED_FIELDS {
        entry.remove(field);
    }

    shape
}

fn map_axes(entry: &mut Map<String, Value>) -> Option<LegacyShape> {
    if let Some(category) = entry
        .get("category")
        .and_then(Value::as_u64)
        .filter(|c| (1..=3).contains(c))
    {
        let (cot, action) = match category {
            1 => ("scheming_long_term", "malicious"),
            2 => ("scheming_long_term", "no_malicious"),
            _ => ("no_scheming", "no_malicious"),
        };
        set_labels(entry, cot, action);
        entry.remove("category");
        entry.remove("malicious_action_status");
        return Some(LegacyShape::Category(category as u8));
    }

    if let (Some(action), Some(cot)) = (
        entry.get("scheming_action").and_then(Value::as_bool),
        entry.get("scheming_cot").and_then(Value::as_bool),
    ) {
        set_labels(
            entry,
            if cot { "scheming_long_term" } else { "no_scheming" },
            if action { "malicious" } else { "no_malicious" },
        );
        entry.remove("scheming_action");
        entry.remove("scheming_cot");
        return Some(LegacyShape::BooleanPair);
    }

    if let Some(scheming) = entry.get("scheming").and_then(Value::as_bool) {
        if scheming {
            set_labels(entry, "scheming_long_term", "malicious");
        } else {
            set_labels(entry, "no_scheming", "no_malicious");
        }
        entry.remove("scheming");
        return Some(LegacyShape::Scheming);
    }

    None
}

fn set_labels(entry: &mut Map<String, Value>, cot: &str, action: &str) {
    entry.insert("cot_label".to_string(), Value::String(cot.to_string()));
    entry.insert("action_label".to_string(), Value::String(action.to_string()));
}

/// Present, non-null and not an empty string
fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
