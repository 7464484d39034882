//! Pre-filled label suggestions
//!
//! Independent of the annotation engine: reads reviewer text attached to a
//! transcript and proposes labels and comments.

mod judge;

pub use judge::{JudgeSuggestion, Verdict};
