//! Gating predicates
//!
//! A gate decides, from the current label state, whether a selection may
//! become an annotation. It returns the message to show when it may not.

use crate::annotations::HighlightKind;
use crate::container::ContainerKey;
use crate::session::Session;

pub trait SelectionGate {
    fn check(&self, session: &Session, key: &ContainerKey) -> Result<(), String>;
}

impl<F> SelectionGate for F
where
    F: Fn(&Session, &ContainerKey) -> Result<(), String>,
{
    fn check(&self, session: &Session, key: &ContainerKey) -> Result<(), String> {
        self(session, key)
    }
}

/// Built-in gates for chain-of-thought and action highlights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightGate {
    Cot,
    Action,
}

impl HighlightGate {
    pub fn kind(self) -> HighlightKind {
        match self {
            HighlightGate::Cot => HighlightKind::Cot,
            HighlightGate::Action => HighlightKind::Action,
        }
    }

    /// Gate matching a store category, if it is one of the built-in kinds
    pub fn for_category(category: &str) -> Option<Self> {
        match HighlightKind::from_category(category)? {
            HighlightKind::Cot => Some(HighlightGate::Cot),
            HighlightKind::Action => Some(HighlightGate::Action),
        }
    }
}

impl SelectionGate for HighlightGate {
    fn check(&self, session: &Session, key: &ContainerKey) -> Result<(), String> {
        match session.labels(&key.document_id) {
            Some(labels) => labels.allows(self.kind()),
            None => Err("Please first select CoT and Action labels before highlighting text.".to_string()),
        }
    }
}
