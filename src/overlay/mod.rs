//! Overlay rendering
//!
//! Replays stored records as overlays on a freshly built container, routes
//! overlay clicks to record removal, and serializes the result as HTML.

mod html;
mod renderer;

pub use html::{render_html, OverlayStyle};
pub use renderer::{
    discard_overlays, paint_record, remove_clicked, remove_overlay, repaint, RemovalOutcome,
    RepaintReport,
};
