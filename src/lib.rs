//! Transcript Annotator
//!
//! Span annotation engine for AI-agent transcripts, plus the pieces of the
//! local server that hosts one annotation session for a browser front end.
//!
//! # Modules
//!
//! - `container`: rendered text tree and offset mapping
//! - `annotations`: records, document labels and the record store
//! - `migrate`: legacy save normalization and schema upgrades
//! - `overlay`: overlay replay, click removal and HTML output
//! - `selection`: the selection confirmation loop and its gates
//! - `session`: the explicit session context tying the above together
//! - `persist`, `taxonomy`, `suggest`: snapshots, categories, judge hints

pub mod annotations;
pub mod config;
pub mod container;
pub mod error;
pub mod migrate;
pub mod overlay;
pub mod persist;
pub mod routes;
pub mod selection;
pub mod session;
pub mod state;
pub mod suggest;
pub mod taxonomy;

pub use session::Session;
