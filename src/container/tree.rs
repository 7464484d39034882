//! Container tree
//!
//! A container is the rendered text of one sub-document held as an arena of
//! nodes. Only `Text` nodes carry characters; the logical text is the
//! pre-order concatenation of those leaves. Overlays wrap text and never
//! change it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;

/// Index of a node in a container's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Identity of a container: (document id, sub-document key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerKey {
    #[serde(rename = "documentId")]
    pub document_id: String,
    #[serde(rename = "subDocumentKey")]
    pub sub_document_key: String,
}

impl ContainerKey {
    pub fn new(document_id: impl Into<String>, sub_document_key: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            sub_document_key: sub_document_key.into(),
        }
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.document_id, self.sub_document_key)
    }
}

/// Marker carried by an overlay node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayMark {
    /// Record this overlay belongs to
    pub record_id: String,
    /// Style key (the record's category)
    pub category: String,
    /// Rendering class derived from the style key
    pub class: String,
}

/// What a node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    /// Structural grouping such as a conversation turn
    Block { class: String },
    /// A text leaf
    Text(String),
    /// Non-text decoration (icons, separators); contributes no characters
    Decoration { label: String },
    Overlay(OverlayMark),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A text leaf and its character interval in the logical text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLeaf {
    pub node: NodeId,
    pub range: Range<usize>,
}

/// Rendered text tree for one sub-document
#[derive(Debug, Clone)]
pub struct Container {
    key: ContainerKey,
    nodes: Vec<Node>,
    /// Overlay nodes by record id
    overlays: HashMap<String, Vec<NodeId>>,
    /// Text pieces cut out of a leaf by wrapping, mapped to that leaf
    fragments: HashMap<NodeId, NodeId>,
}

const ROOT: NodeId = NodeId(0);

impl Container {
    /// Create an empty container
    pub fn new(key: ContainerKey) -> Self {
        Self {
            key,
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            overlays: HashMap::new(),
            fragments: HashMap::new(),
        }
    }

    /// Create a container holding a single text leaf
    pub fn from_text(key: ContainerKey, text: &str) -> Self {
        let mut container = Self::new(key);
        container.append_text(ROOT, text);
        container
    }

    pub fn key(&self) -> &ContainerKey {
        &self.key
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    /// Append a block under `parent`
    pub fn append_block(&mut self, parent: NodeId, class: &str) -> NodeId {
        self.push_child(
            parent,
            NodeKind::Block {
                class: class.to_string(),
            },
        )
    }

    /// Append a text leaf under `parent`
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_child(parent, NodeKind::Text(text.to_string()))
    }

    /// Append a decoration under `parent`
    pub fn append_decoration(&mut self, parent: NodeId, label: &str) -> NodeId {
        self.push_child(
            parent,
            NodeKind::Decoration {
                label: label.to_string(),
            },
        )
    }

    fn push_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.alloc(kind, Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        id
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the node is still reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == ROOT {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Nodes in document order (pre-order), root first
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    /// All text leaves in document order with their character intervals
    pub fn text_leaves(&self) -> Vec<TextLeaf> {
        let mut counter = 0;
        let mut leaves = Vec::new();
        for id in self.descendants(ROOT) {
            if let NodeKind::Text(text) = &self.nodes[id.0].kind {
                let len = text.chars().count();
                leaves.push(TextLeaf {
                    node: id,
                    range: counter..counter + len,
                });
                counter += len;
            }
        }
        leaves
    }

    /// The logical text
    pub fn text(&self) -> String {
        self.subtree_text(ROOT)
    }

    /// Length of the logical text in characters
    pub fn text_len(&self) -> usize {
        self.subtree_len(ROOT)
    }

    /// Text between two character offsets (clamped)
    pub fn slice(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.text_len());
        let start = range.start.min(end);
        self.text().chars().skip(start).take(end - start).collect()
    }

    /// Concatenated text below a node
    pub fn subtree_text(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match &self.nodes[n.0].kind {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Character count below a node
    pub fn subtree_len(&self, id: NodeId) -> usize {
        self.descendants(id)
            .into_iter()
            .map(|n| match &self.nodes[n.0].kind {
                NodeKind::Text(text) => text.chars().count(),
                _ => 0,
            })
            .sum()
    }

    /// Running character counter at the point just before `id`
    pub fn offset_before(&self, id: NodeId) -> Option<usize> {
        let mut counter = 0;
        for n in self.descendants(ROOT) {
            if n == id {
                return Some(counter);
            }
            if let NodeKind::Text(text) = &self.nodes[n.0].kind {
                counter += text.chars().count();
            }
        }
        None
    }

    /// Character interval covered by a node's subtree
    pub fn node_range(&self, id: NodeId) -> Option<Range<usize>> {
        if !self.is_attached(id) {
            return None;
        }
        let start = self.offset_before(id)?;
        Some(start..start + self.subtree_len(id))
    }

    /// Attached overlay nodes for a record
    pub fn overlay_nodes(&self, record_id: &str) -> Vec<NodeId> {
        self.overlays
            .get(record_id)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.is_attached(*id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Character intervals currently highlighted for a record
    pub fn overlay_ranges(&self, record_id: &str) -> Vec<Range<usize>> {
        self.overlay_nodes(record_id)
            .into_iter()
            .filter_map(|id| self.node_range(id))
            .collect()
    }

    /// Record ids with at least one attached overlay
    pub fn rendered_record_ids(&self) -> BTreeSet<String> {
        self.overlays
            .keys()
            .filter(|id| !self.overlay_nodes(id).is_empty())
            .cloned()
            .collect()
    }

    /// Innermost overlay enclosing a node, the node itself included
    pub fn enclosing_overlay(&self, id: NodeId) -> Option<&OverlayMark> {
        let mut current = Some(id);
        while let Some(n) = current {
            if let NodeKind::Overlay(mark) = &self.nodes.get(n.0)?.kind {
                return Some(mark);
            }
            current = self.parent(n);
        }
        None
    }

    /// Innermost overlay covering the character at `offset`
    pub fn overlay_at(&self, offset: usize) -> Option<&OverlayMark> {
        self.text_leaves()
            .into_iter()
            .find(|leaf| leaf.range.contains(&offset))
            .and_then(|leaf| self.enclosing_overlay(leaf.node))
    }

    // ------------------------------------------------------------------
    // Overlay mutation
    // ------------------------------------------------------------------

    /// Wrap `local` (character offsets within the leaf) of a text leaf in a
    /// new overlay node. The leaf is replaced in its parent by up to three
    /// nodes: before, overlay, after.
    pub(crate) fn wrap_leaf_segment(
        &mut self,
        leaf: NodeId,
        local: Range<usize>,
        mark: OverlayMark,
    ) -> Option<NodeId> {
        let parent = self.parent(leaf)?;
        let text = match &self.nodes[leaf.0].kind {
            NodeKind::Text(text) => text.clone(),
            _ => return None,
        };
        let len = text.chars().count();
        let end = local.end.min(len);
        let start = local.start.min(end);
        if start == end {
            return None;
        }

        let before: String = text.chars().take(start).collect();
        let matched: String = text.chars().skip(start).take(end - start).collect();
        let after: String = text.chars().skip(end).collect();

        let origin = self.fragments.remove(&leaf).unwrap_or(leaf);
        let record_id = mark.record_id.clone();
        let mut replacement = Vec::with_capacity(3);
        if !before.is_empty() {
            replacement.push(self.alloc_fragment(before, parent, origin));
        }
        let overlay = self.alloc(NodeKind::Overlay(mark), Some(parent));
        let inner = self.alloc_fragment(matched, overlay, origin);
        self.nodes[overlay.0].children.push(inner);
        replacement.push(overlay);
        if !after.is_empty() {
            replacement.push(self.alloc_fragment(after, parent, origin));
        }

        let position = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == leaf)?;
        self.nodes[parent.0]
            .children
            .splice(position..=position, replacement);
        self.nodes[leaf.0].parent = None;

        self.overlays.entry(record_id).or_default().push(overlay);
        Some(overlay)
    }

    fn alloc_fragment(&mut self, text: String, parent: NodeId, origin: NodeId) -> NodeId {
        let id = self.alloc(NodeKind::Text(text), Some(parent));
        self.fragments.insert(id, origin);
        id
    }

    fn drop_fragment(&mut self, id: NodeId) {
        self.nodes[id.0].parent = None;
        self.fragments.remove(&id);
    }

    /// Replace an overlay by its children. Returns `false` for nodes that
    /// are not overlays or are already detached.
    pub(crate) fn unwrap_overlay(&mut self, overlay: NodeId) -> bool {
        if !matches!(self.kind(overlay), Some(NodeKind::Overlay(_))) {
            return false;
        }
        let Some(parent) = self.parent(overlay) else {
            return false;
        };
        let Some(position) = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == overlay)
        else {
            return false;
        };

        let children = std::mem::take(&mut self.nodes[overlay.0].children);
        for child in &children {
            self.nodes[child.0].parent = Some(parent);
        }
        self.nodes[parent.0]
            .children
            .splice(position..=position, children);
        self.nodes[overlay.0].parent = None;
        true
    }

    /// Unwrap every overlay belonging to a record. Touches only that
    /// record's overlay nodes and their parents.
    pub(crate) fn unwrap_record(&mut self, record_id: &str) -> usize {
        let Some(ids) = self.overlays.remove(record_id) else {
            return 0;
        };
        ids.into_iter()
            .filter(|id| self.unwrap_overlay(*id))
            .count()
    }

    /// Remove every overlay and merge the text leaves they split
    pub(crate) fn clear_overlays(&mut self) -> usize {
        let record_ids: Vec<String> = self.overlays.keys().cloned().collect();
        let removed = record_ids
            .iter()
            .map(|record_id| self.unwrap_record(record_id))
            .sum();
        self.normalize();
        removed
    }

    /// Merge adjacent pieces of the same split leaf. A run that holds the
    /// whole text of its leaf is replaced by that leaf, so handles taken
    /// before painting are valid again. Leaves built by the caller are
    /// never merged with each other.
    pub(crate) fn normalize(&mut self) {
        if self.fragments.is_empty() {
            return;
        }
        for id in self.descendants(ROOT) {
            if matches!(self.nodes[id.0].kind, NodeKind::Text(_)) {
                continue;
            }
            let children = std::mem::take(&mut self.nodes[id.0].children);
            let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());
            for child in children {
                let origin = self.fragments.get(&child).copied();
                let prev = merged.last().copied();
                match (origin, prev) {
                    (Some(origin), Some(prev)) if self.fragments.get(&prev) == Some(&origin) => {
                        let text = match &self.nodes[child.0].kind {
                            NodeKind::Text(text) => text.clone(),
                            _ => String::new(),
                        };
                        if let NodeKind::Text(prev_text) = &mut self.nodes[prev.0].kind {
                            prev_text.push_str(&text);
                        }
                        self.drop_fragment(child);
                    }
                    _ => merged.push(child),
                }
            }

            for slot in merged.iter_mut() {
                let Some(origin) = self.fragments.get(slot).copied() else {
                    continue;
                };
                let whole = self.nodes[origin.0].parent.is_none()
                    && self.nodes[origin.0].kind == self.nodes[slot.0].kind;
                if whole {
                    self.drop_fragment(*slot);
                    self.nodes[origin.0].parent = Some(id);
                    *slot = origin;
                }
            }
            self.nodes[id.0].children = merged;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(record_id: &str) -> OverlayMark {
        OverlayMark {
            record_id: record_id.to_string(),
            category: "cot".to_string(),
            class: "highlight highlight-cot".to_string(),
        }
    }

    fn turn_container() -> (Container, NodeId, NodeId) {
        let mut c = Container::new(ContainerKey::new("doc", "main"));
        let turn = c.append_block(c.root(), "turn");
        c.append_decoration(turn, "assistant-icon");
        let first = c.append_text(turn, "Hello ");
        let second = c.append_text(turn, "world");
        (c, first, second)
    }

    #[test]
    fn test_text_leaves_in_document_order() {
        let (c, first, second) = turn_container();
        let leaves = c.text_leaves();

        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0], TextLeaf { node: first, range: 0..6 });
        assert_eq!(leaves[1], TextLeaf { node: second, range: 6..11 });
        assert_eq!(c.text(), "Hello world");
    }

    #[test]
    fn test_wrap_splits_leaf() {
        let (mut c, first, _) = turn_container();
        let overlay = c.wrap_leaf_segment(first, 1..4, mark("r1")).unwrap();

        assert_eq!(c.text(), "Hello world");
        assert!(!c.is_attached(first));
        assert_eq!(c.subtree_text(overlay), "ell");
        assert_eq!(c.overlay_ranges("r1"), vec![1..4]);
    }

    #[test]
    fn test_unwrap_record_restores_text() {
        let (mut c, first, _) = turn_container();
        c.wrap_leaf_segment(first, 0..6, mark("r1")).unwrap();

        assert_eq!(c.unwrap_record("r1"), 1);
        assert_eq!(c.text(), "Hello world");
        assert!(c.overlay_nodes("r1").is_empty());
        assert_eq!(c.unwrap_record("r1"), 0);
    }

    #[test]
    fn test_unwrap_detached_overlay_is_noop() {
        let (mut c, first, _) = turn_container();
        let overlay = c.wrap_leaf_segment(first, 0..2, mark("r1")).unwrap();

        assert!(c.unwrap_overlay(overlay));
        assert!(!c.unwrap_overlay(overlay));
    }

    #[test]
    fn test_clear_overlays_restores_leaves() {
        let (mut c, first, second) = turn_container();
        c.wrap_leaf_segment(first, 2..6, mark("r1")).unwrap();
        c.wrap_leaf_segment(second, 0..3, mark("r2")).unwrap();
        assert!(!c.is_attached(first));

        assert_eq!(c.clear_overlays(), 2);
        let leaves = c.text_leaves();
        assert_eq!(leaves[0], TextLeaf { node: first, range: 0..6 });
        assert_eq!(leaves[1], TextLeaf { node: second, range: 6..11 });
        assert!(c.rendered_record_ids().is_empty());
    }

    #[test]
    fn test_clear_without_overlays_keeps_caller_leaves() {
        let (mut c, first, second) = turn_container();
        let empty = c.append_text(c.children(c.root())[0], "");

        assert_eq!(c.clear_overlays(), 0);
        assert!(c.is_attached(first));
        assert!(c.is_attached(second));
        assert!(c.is_attached(empty));
        assert_eq!(c.text_leaves().len(), 3);
    }

    #[test]
    fn test_nested_split_merges_back_to_leaf() {
        let mut c = Container::from_text(ContainerKey::new("doc", "main"), "abcdefgh");
        let leaf = c.text_leaves()[0].node;
        let outer = c.wrap_leaf_segment(leaf, 1..7, mark("outer")).unwrap();
        let inner_leaf = c.children(outer)[0];
        c.wrap_leaf_segment(inner_leaf, 2..4, mark("inner")).unwrap();

        c.unwrap_record("outer");
        assert!(!c.is_attached(leaf));
        c.clear_overlays();
        assert_eq!(c.text_leaves(), vec![TextLeaf { node: leaf, range: 0..8 }]);
    }

    #[test]
    fn test_overlay_at_prefers_innermost() {
        let mut c = Container::from_text(ContainerKey::new("doc", "main"), "abcdefgh");
        let leaf = c.text_leaves()[0].node;
        let outer = c.wrap_leaf_segment(leaf, 0..8, mark("outer")).unwrap();
        let inner_leaf = c.children(outer)[0];
        c.wrap_leaf_segment(inner_leaf, 2..4, mark("inner")).unwrap();

        assert_eq!(c.overlay_at(3).map(|m| m.record_id.as_str()), Some("inner"));
        assert_eq!(c.overlay_at(6).map(|m| m.record_id.as_str()), Some("outer"));
        assert_eq!(c.overlay_at(20), None);
    }

    #[test]
    fn test_offset_before_decoration() {
        let (c, _, second) = turn_container();
        let decoration = c.children(c.children(c.root())[0])[0];

        assert_eq!(c.offset_before(decoration), Some(0));
        assert_eq!(c.offset_before(second), Some(6));
        assert_eq!(c.node_range(second), Some(6..11));
    }
}
