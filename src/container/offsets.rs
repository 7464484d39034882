//! Offset mapping
//!
//! Converts between boundary points in a container tree and character
//! offsets into the container's logical text. The offset space is defined
//! by leaf concatenation order at the moment of the call: it survives a
//! re-render that keeps the same text, not one that changes it.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::tree::{Container, NodeId, NodeKind, OverlayMark};

/// Half-open character range `[start, end)` with `start < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    /// Returns `None` for empty or reversed ranges
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A point in the tree.
///
/// For a text node `offset` counts characters into the leaf; for any other
/// node it is a child index, as in a DOM range boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A user selection expressed as two tree boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl DomRange {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Resolve a tree selection to character offsets.
///
/// Returns `None` when the selection is collapsed, when it covers no
/// characters (e.g. it landed on a decoration), or when either boundary
/// refers to a node that is no longer attached to the container.
pub fn selection_to_offsets(container: &Container, range: &DomRange) -> Option<OffsetRange> {
    if range.is_collapsed() {
        return None;
    }
    let start = resolve_boundary(container, &range.start)?;
    let end = resolve_boundary(container, &range.end)?;
    OffsetRange::new(start, end)
}

fn resolve_boundary(container: &Container, boundary: &Boundary) -> Option<usize> {
    if !container.is_attached(boundary.node) {
        return None;
    }
    let before = container.offset_before(boundary.node)?;
    match container.kind(boundary.node)? {
        NodeKind::Text(text) => Some(before + boundary.offset.min(text.chars().count())),
        NodeKind::Decoration { .. } => Some(before),
        NodeKind::Root | NodeKind::Block { .. } | NodeKind::Overlay(_) => {
            match container.children(boundary.node).get(boundary.offset) {
                Some(child) => container.offset_before(*child),
                None => Some(before + container.subtree_len(boundary.node)),
            }
        }
    }
}

/// Rendering class for a style key: `actionMalicious` becomes
/// `highlight highlight-action-malicious`
pub fn overlay_class(style_key: &str) -> String {
    let mut kebab = String::with_capacity(style_key.len() + 4);
    for (i, ch) in style_key.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                kebab.push('-');
            }
            kebab.extend(ch.to_lowercase());
        } else if ch == '_' || ch.is_whitespace() {
            kebab.push('-');
        } else {
            kebab.push(ch);
        }
    }
    format!("highlight highlight-{}", kebab)
}

/// Wrap every leaf segment intersecting `[start, end)` in an overlay for
/// `record_id`. Offsets beyond the text length are clamped. Returns the new
/// overlay nodes; an empty result means nothing was painted.
pub fn offsets_to_span(
    container: &mut Container,
    start: usize,
    end: usize,
    style_key: &str,
    record_id: &str,
) -> Vec<NodeId> {
    let total = container.text_len();
    let end = end.min(total);
    let start = start.min(end);
    if start == end {
        return Vec::new();
    }

    let class = overlay_class(style_key);
    let mut painted = Vec::new();

    // Leaves are collected up front; wrapping detaches them but never shifts
    // the character intervals of the ones not yet visited.
    for leaf in container.text_leaves() {
        if end <= leaf.range.start {
            break;
        }
        if leaf.range.end <= start {
            continue;
        }
        let local_start = start.saturating_sub(leaf.range.start);
        let local_end = end.min(leaf.range.end) - leaf.range.start;
        let mark = OverlayMark {
            record_id: record_id.to_string(),
            category: style_key.to_string(),
            class: class.clone(),
        };
        if let Some(overlay) = container.wrap_leaf_segment(leaf.node, local_start..local_end, mark)
        {
            painted.push(overlay);
        }
    }

    painted
}
