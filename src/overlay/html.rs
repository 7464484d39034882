//! HTML serialization of a container
//!
//! The browser front end displays the rebuilt container from this markup.
//! Overlays become `<span>` elements carrying the record id so a click can
//! be routed back to the record.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::container::{Container, NodeId, NodeKind};

/// Markup settings for overlays and blocks
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    /// Data attribute holding the record id
    pub id_attribute: String,
    /// Data attribute holding the category
    pub category_attribute: String,
    /// Element used for structural blocks
    pub block_tag: String,
    /// Whether overlays get a removal hint tooltip
    pub include_titles: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            id_attribute: "data-record-id".to_string(),
            category_attribute: "data-category".to_string(),
            block_tag: "div".to_string(),
            include_titles: true,
        }
    }
}

/// Render a container (overlays included) as HTML
pub fn render_html(container: &Container, style: &OverlayStyle) -> String {
    let mut out = String::new();
    render_node(container, container.root(), style, &mut out);
    out
}

fn render_node(container: &Container, id: NodeId, style: &OverlayStyle, out: &mut String) {
    let Some(kind) = container.kind(id) else {
        return;
    };
    match kind {
        NodeKind::Root => render_children(container, id, style, out),
        NodeKind::Block { class } => {
            out.push_str(&format!(
                "<{} class=\"{}\">",
                style.block_tag,
                encode_double_quoted_attribute(class)
            ));
            render_children(container, id, style, out);
            out.push_str(&format!("</{}>", style.block_tag));
        }
        NodeKind::Text(text) => out.push_str(&encode_text(text)),
        NodeKind::Decoration { label } => {
            out.push_str(&format!(
                "<span class=\"decoration\" data-label=\"{}\" aria-hidden=\"true\"></span>",
                encode_double_quoted_attribute(label)
            ));
        }
        NodeKind::Overlay(mark) => {
            let title = if style.include_titles {
                format!(" title=\"Click to remove {} highlight\"", encode_double_quoted_attribute(&mark.category))
            } else {
                String::new()
            };
            out.push_str(&format!(
                "<span class=\"{}\" {}=\"{}\" {}=\"{}\"{}>",
                encode_double_quoted_attribute(&mark.class),
                style.id_attribute,
                encode_double_quoted_attribute(&mark.record_id),
                style.category_attribute,
                encode_double_quoted_attribute(&mark.category),
                title
            ));
            render_children(container, id, style, out);
            out.push_str("</span>");
        }
    }
}

fn render_children(container: &Container, id: NodeId, style: &OverlayStyle, out: &mut String) {
    for child in container.children(id) {
        render_node(container, *child, style, out);
    }
}
