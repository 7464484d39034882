//! Selection confirmation loop
//!
//! `Idle → PendingConfirmation → Idle`. A selection is resolved to offsets
//! as soon as it arrives, so painting other overlays before the user
//! confirms cannot invalidate it. At most one selection is pending; a new
//! one replaces it.

use thiserror::Error;

use super::gate::SelectionGate;
use crate::annotations::{AnnotationRecord, NewAnnotation};
use crate::container::{selection_to_offsets, Container, ContainerKey, DomRange, OffsetRange};
use crate::overlay::paint_record;
use crate::session::Session;

const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    PendingConfirmation,
}

/// A selection waiting for the user to confirm it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelection {
    pub key: ContainerKey,
    pub range: OffsetRange,
    pub category: String,
    pub text: String,
    /// Shortened text for the confirmation prompt
    pub preview: String,
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Selection does not cover any text")]
    Malformed,

    #[error("{0}")]
    Gate(String),

    #[error("No selection is pending")]
    NothingPending,

    #[error("Pending selection belongs to {pending}, not {current}")]
    Stale {
        pending: ContainerKey,
        current: ContainerKey,
    },
}

struct Pending {
    selection: PendingSelection,
    gate: Box<dyn SelectionGate + Send + Sync>,
}

/// Holds the single pending selection of a session
#[derive(Default)]
pub struct SelectionController {
    pending: Option<Pending>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControllerState {
        if self.pending.is_some() {
            ControllerState::PendingConfirmation
        } else {
            ControllerState::Idle
        }
    }

    pub fn pending(&self) -> Option<&PendingSelection> {
        self.pending.as_ref().map(|p| &p.selection)
    }

    /// Offer a selection for `category`.
    ///
    /// On failure the controller's current state is kept and the reason is
    /// returned for display.
    pub fn select<G>(
        &mut self,
        session: &Session,
        container: &Container,
        range: &DomRange,
        category: &str,
        gate: G,
    ) -> Result<&PendingSelection, SelectionError>
    where
        G: SelectionGate + Send + Sync + 'static,
    {
        let offsets = selection_to_offsets(container, range).ok_or(SelectionError::Malformed)?;
        let text = container.slice(offsets.as_range());
        if text.trim().is_empty() {
            return Err(SelectionError::Malformed);
        }
        gate.check(session, container.key())
            .map_err(SelectionError::Gate)?;

        let preview = if text.chars().count() > PREVIEW_CHARS {
            format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
        } else {
            text.clone()
        };

        if let Some(previous) = &self.pending {
            tracing::debug!(
                container = %previous.selection.key,
                "Replacing pending selection"
            );
        }

        let pending = self.pending.insert(Pending {
            selection: PendingSelection {
                key: container.key().clone(),
                range: offsets,
                category: category.to_string(),
                text,
                preview,
            },
            gate: Box::new(gate),
        });
        Ok(&pending.selection)
    }

    /// Discard the pending selection
    pub fn cancel(&mut self) -> Option<PendingSelection> {
        self.pending.take().map(|p| p.selection)
    }

    /// Store and paint the pending selection. `draft` supplies comment,
    /// sub-label and extra fields; range and text come from the selection.
    ///
    /// The controller returns to idle whatever the outcome.
    pub fn confirm(
        &mut self,
        session: &mut Session,
        container: &mut Container,
        draft: NewAnnotation,
    ) -> Result<AnnotationRecord, SelectionError> {
        let Pending { selection, gate } = self.pending.take().ok_or(SelectionError::NothingPending)?;

        if &selection.key != container.key() {
            return Err(SelectionError::Stale {
                pending: selection.key,
                current: container.key().clone(),
            });
        }
        gate.check(session, &selection.key)
            .map_err(SelectionError::Gate)?;

        let draft = NewAnnotation {
            range_start: Some(selection.range.start),
            range_end: Some(selection.range.end),
            selected_text: selection.text,
            ..draft
        };
        let record = session.insert(&selection.key, &selection.category, draft);
        let painted = paint_record(container, session, &record);
        tracing::debug!(
            container = %selection.key,
            record_id = %record.id,
            elements = painted.len(),
            "Selection confirmed"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{ActionLabel, CotLabel, ACTION_CATEGORY, COT_CATEGORY};
    use crate::container::{Boundary, NodeId};
    use crate::selection::HighlightGate;
    use crate::taxonomy::Taxonomy;

    const TEXT: &str = "The agent deleted the audit log to avoid detection.";

    fn setup() -> (Container, NodeId, Session) {
        let c = Container::from_text(ContainerKey::new("fileA.json", "main"), TEXT);
        let leaf = c.text_leaves()[0].node;
        (c, leaf, Session::new(Taxonomy::builtin()))
    }

    fn span(leaf: NodeId, start: usize, end: usize) -> DomRange {
        DomRange::new(Boundary::new(leaf, start), Boundary::new(leaf, end))
    }

    fn always_open(_: &Session, _: &ContainerKey) -> Result<(), String> {
        Ok(())
    }

    #[test]
    fn test_select_and_confirm() {
        let (mut c, leaf, mut session) = setup();
        let mut controller = SelectionController::new();

        let pending = controller
            .select(&session, &c, &span(leaf, 4, 9), "actionMalicious", always_open)
            .unwrap();
        assert_eq!(pending.range, OffsetRange::new(4, 9).unwrap());
        assert_eq!(controller.state(), ControllerState::PendingConfirmation);

        let record = controller
            .confirm(&mut session, &mut c, NewAnnotation::default().with_comment("hides it"))
            .unwrap();
        assert_eq!(record.selected_text, "agent");
        assert_eq!(record.comment, "hides it");
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(c.overlay_ranges(&record.id), vec![4..9]);
        assert_eq!(c.text(), TEXT);
        assert_eq!(session.store().rendered_elements("fileA.json", "main", &record.id), 1);
    }

    #[test]
    fn test_gate_blocks_selection() {
        let (c, leaf, mut session) = setup();
        let mut controller = SelectionController::new();

        let err = controller
            .select(&session, &c, &span(leaf, 4, 9), COT_CATEGORY, HighlightGate::Cot)
            .unwrap_err();
        assert!(matches!(err, SelectionError::Gate(msg) if msg.starts_with("Please first select")));
        assert_eq!(controller.state(), ControllerState::Idle);

        session.set_cot_label("fileA.json", CotLabel::NoScheming);
        let err = controller
            .select(&session, &c, &span(leaf, 4, 9), COT_CATEGORY, HighlightGate::Cot)
            .unwrap_err();
        assert!(err.to_string().contains("scheming CoT label"));

        session.set_action_label("fileA.json", ActionLabel::Malicious);
        assert!(controller
            .select(&session, &c, &span(leaf, 4, 9), ACTION_CATEGORY, HighlightGate::Action)
            .is_ok());
    }

    #[test]
    fn test_malformed_selection() {
        let (c, leaf, session) = setup();
        let mut controller = SelectionController::new();

        let collapsed = controller.select(&session, &c, &span(leaf, 3, 3), "cot", always_open);
        assert!(matches!(collapsed, Err(SelectionError::Malformed)));

        // "The agent" has a space at offset 3
        let blank = controller.select(&session, &c, &span(leaf, 3, 4), "cot", always_open);
        assert!(matches!(blank, Err(SelectionError::Malformed)));
        assert!(controller.pending().is_none());
    }

    #[test]
    fn test_last_selection_wins() {
        let (mut c, leaf, mut session) = setup();
        let mut controller = SelectionController::new();

        controller
            .select(&session, &c, &span(leaf, 0, 3), "cot", always_open)
            .unwrap();
        controller
            .select(&session, &c, &span(leaf, 10, 17), "cot", always_open)
            .unwrap();

        let record = controller
            .confirm(&mut session, &mut c, NewAnnotation::default())
            .unwrap();
        assert_eq!(record.selected_text, "deleted");
        assert_eq!(session.store().record_count(), 1);
    }

    #[test]
    fn test_cancel_and_confirm_without_pending() {
        let (mut c, leaf, mut session) = setup();
        let mut controller = SelectionController::new();

        controller
            .select(&session, &c, &span(leaf, 0, 3), "cot", always_open)
            .unwrap();
        assert_eq!(controller.cancel().map(|p| p.text), Some("The".to_string()));

        let err = controller
            .confirm(&mut session, &mut c, NewAnnotation::default())
            .unwrap_err();
        assert!(matches!(err, SelectionError::NothingPending));
        assert_eq!(session.store().record_count(), 0);
    }

    #[test]
    fn test_stale_selection_discarded() {
        let (c, leaf, mut session) = setup();
        let mut controller = SelectionController::new();
        controller
            .select(&session, &c, &span(leaf, 0, 3), "cot", always_open)
            .unwrap();

        let mut other = Container::from_text(ContainerKey::new("fileB.json", "main"), TEXT);
        let err = controller
            .confirm(&mut session, &mut other, NewAnnotation::default())
            .unwrap_err();
        assert!(matches!(err, SelectionError::Stale { .. }));
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn test_long_selection_preview() {
        let long = "x".repeat(150);
        let c = Container::from_text(ContainerKey::new("doc", "main"), &long);
        let leaf = c.text_leaves()[0].node;
        let session = Session::new(Taxonomy::builtin());
        let mut controller = SelectionController::new();

        let pending = controller
            .select(&session, &c, &span(leaf, 0, 150), "cot", always_open)
            .unwrap();
        assert_eq!(pending.preview.chars().count(), 103);
        assert!(pending.preview.ends_with("..."));
    }
}
