//! Annotation module
//!
//! Span records anchored to character ranges of a rendered sub-document,
//! the per-document label state they depend on, and the in-memory store
//! that owns both for a session.
//!
//! # Layout
//!
//! - `types` - records, drafts and patches
//! - `labels` - chain-of-thought / action labels and completion rules
//! - `store` - nested document → sub-document → category buckets

mod labels;
mod store;
mod types;

pub use labels::{
    ActionLabel, Confidence, CotLabel, CovertType, DocumentLabels, HighlightKind, ACTION_CATEGORY,
    COT_CATEGORY,
};
pub use store::{AnnotationMap, AnnotationStore};
pub use types::{AnnotationRecord, NewAnnotation, RecordPatch, DEFAULT_SUB_DOCUMENT};
