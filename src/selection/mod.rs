//! Interactive selection handling
//!
//! Turns a user's text selection into a confirmed, stored and painted
//! annotation, subject to a gating predicate over the label state.

mod controller;
mod gate;

pub use controller::{ControllerState, PendingSelection, SelectionController, SelectionError};
pub use gate::{HighlightGate, SelectionGate};
