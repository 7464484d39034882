//! Rendered container model
//!
//! A container holds the displayed text of one sub-document as a tree of
//! text leaves, structural blocks, decorations and overlays. Offsets into
//! the container's logical text are the stable anchor for annotations.

mod offsets;
mod tree;

pub use offsets::{
    offsets_to_span, overlay_class, selection_to_offsets, Boundary, DomRange, OffsetRange,
};
pub use tree::{Container, ContainerKey, NodeId, NodeKind, OverlayMark, TextLeaf};
