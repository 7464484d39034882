//! Overlay replay and removal
//!
//! After every container rebuild the stored ranges are painted back onto
//! the fresh tree. Removing a record tears down only that record's overlay
//! nodes.

use serde::Serialize;

use crate::annotations::{AnnotationRecord, AnnotationStore};
use crate::container::{offsets_to_span, Container, NodeId};
use crate::session::Session;

/// Outcome of a repaint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepaintReport {
    /// Overlay nodes removed before painting
    pub cleared: usize,
    /// Records painted
    pub painted: usize,
    /// Records without a usable range
    pub skipped: usize,
    /// Records whose text snapshot differs from the text now at their range
    pub mismatched: Vec<String>,
}

/// Outcome of removing one record's overlays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalOutcome {
    pub record_id: String,
    /// Category the record was removed from, if the store held it
    pub category: Option<String>,
    /// Overlay nodes unwrapped
    pub unwrapped: usize,
}

/// Clear all overlays and paint every stored record of the container
pub fn repaint(container: &mut Container, store: &mut AnnotationStore) -> RepaintReport {
    let key = container.key().clone();
    let mut report = RepaintReport {
        cleared: container.clear_overlays(),
        ..RepaintReport::default()
    };

    for record in store.list(&key.document_id, &key.sub_document_key, None) {
        let Some(range) = record.range() else {
            report.skipped += 1;
            continue;
        };

        let current = container.slice(range.as_range());
        if !record.selected_text.is_empty() && current != record.selected_text {
            tracing::warn!(
                container = %key,
                record_id = %record.id,
                expected = %record.selected_text,
                found = %current,
                "Stored text differs from container text"
            );
            report.mismatched.push(record.id.clone());
        }

        let nodes = offsets_to_span(container, range.start, range.end, &record.category, &record.id);
        store.mark_rendered(&key.document_id, &key.sub_document_key, &record.id, nodes.len());
        if nodes.is_empty() {
            report.skipped += 1;
        } else {
            report.painted += 1;
        }
    }

    tracing::debug!(
        container = %key,
        painted = report.painted,
        skipped = report.skipped,
        "Repainted overlays"
    );
    report
}

/// Paint a single record without touching other overlays
pub fn paint_record(container: &mut Container, session: &mut Session, record: &AnnotationRecord) -> Vec<NodeId> {
    let Some(range) = record.range() else {
        return Vec::new();
    };
    let nodes = offsets_to_span(container, range.start, range.end, &record.category, &record.id);
    session.note_rendered(container.key(), &record.id, nodes.len());
    nodes
}

/// Remove a record from the store and unwrap its overlays.
///
/// Cost is proportional to the record's own overlay nodes. Overlays that
/// were already detached are skipped.
pub fn remove_overlay(container: &mut Container, session: &mut Session, record_id: &str) -> RemovalOutcome {
    let key = container.key().clone();
    let category = session.remove_anywhere(&key, record_id);
    let unwrapped = container.unwrap_record(record_id);

    if category.is_none() {
        tracing::debug!(container = %key, record_id = %record_id, "Overlay removed for unknown record");
    }

    RemovalOutcome {
        record_id: record_id.to_string(),
        category,
        unwrapped,
    }
}

/// Handle a click on any node: the innermost enclosing overlay is removed
pub fn remove_clicked(container: &mut Container, session: &mut Session, node: NodeId) -> Option<RemovalOutcome> {
    let record_id = container.enclosing_overlay(node)?.record_id.clone();
    Some(remove_overlay(container, session, &record_id))
}

/// Unwrap overlays of records the store already dropped (e.g. after a label
/// change voided them)
pub fn discard_overlays(container: &mut Container, records: &[AnnotationRecord]) -> usize {
    let key = container.key().clone();
    records
        .iter()
        .filter(|r| r.document_id == key.document_id && r.sub_document_key == key.sub_document_key)
        .map(|r| container.unwrap_record(&r.id))
        .sum()
}

impl Session {
    /// Repaint a container from this session's store
    pub fn repaint(&mut self, container: &mut Container) -> RepaintReport {
        repaint(container, self.store_mut())
    }
}
