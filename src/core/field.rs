//! Decoded field tree
//!
//! Decoders append labelled, typed items with their absolute byte range.
//! Nesting is expressed by a depth counter so the tree stays a flat,
//! ordered list that serializes cleanly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed value of a decoded field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Subtree header, no value of its own
    None,
    /// Unsigned integer (any width up to 64 bits)
    Unsigned(u64),
    /// Signed integer
    Signed(i64),
    /// Flag
    Bool(bool),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Free text
    Text(String),
    /// Coded value with its name
    Enum { value: u64, name: String },
}

impl FieldValue {
    /// Shorthand for an enum value
    pub fn named(value: impl Into<u64>, name: impl Into<String>) -> Self {
        Self::Enum {
            value: value.into(),
            name: name.into(),
        }
    }

    /// Numeric view, if the value has one
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            Self::Enum { value, .. } => Some(*value),
            Self::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Signed(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Bytes(v) => write!(f, "{}", hex::encode(v)),
            Self::Text(v) => f.write_str(v),
            Self::Enum { value, name } => write!(f, "{name} ({value})"),
        }
    }
}

/// One decoded item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNode {
    /// Human-readable label
    pub label: String,
    /// Decoded value
    pub value: FieldValue,
    /// Absolute byte offset in the frame buffer
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
    /// Nesting depth (0 = top level)
    pub depth: u8,
}

impl FieldNode {
    /// One text line, indented by depth
    pub fn to_line(&self) -> String {
        let indent = "  ".repeat(self.depth as usize);
        let range = format!("[{}..{}]", self.offset, self.offset + self.length);
        match self.value {
            FieldValue::None => format!("{indent}{} {range}", self.label),
            _ => format!("{indent}{}: {} {range}", self.label, self.value),
        }
    }
}

/// Ordered list of decoded items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTree {
    nodes: Vec<FieldNode>,
    #[serde(skip)]
    depth: u8,
}

impl FieldTree {
    /// Empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item at the current depth
    pub fn add(&mut self, label: impl Into<String>, value: FieldValue, offset: usize, length: usize) {
        self.nodes.push(FieldNode {
            label: label.into(),
            value,
            offset,
            length,
            depth: self.depth,
        });
    }

    /// Append an unsigned value
    pub fn add_uint(&mut self, label: &str, value: impl Into<u64>, offset: usize, length: usize) {
        self.add(label, FieldValue::Unsigned(value.into()), offset, length);
    }

    /// Append a flag
    pub fn add_bool(&mut self, label: &str, value: bool, offset: usize, length: usize) {
        self.add(label, FieldValue::Bool(value), offset, length);
    }

    /// Append raw bytes
    pub fn add_bytes(&mut self, label: &str, bytes: &[u8], offset: usize) {
        self.add(label, FieldValue::Bytes(bytes.to_vec()), offset, bytes.len());
    }

    /// Open a subtree; returns its index so the length can be fixed up later
    pub fn open(&mut self, label: impl Into<String>, offset: usize) -> usize {
        self.add(label, FieldValue::None, offset, 0);
        self.depth = self.depth.saturating_add(1);
        self.nodes.len() - 1
    }

    /// Close the innermost subtree, setting its final length
    pub fn close(&mut self, index: usize, end: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.length = end.saturating_sub(node.offset);
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Drop back to `depth` when subtrees were left open by an early return
    pub fn unwind_to(&mut self, depth: u8) {
        self.depth = self.depth.min(depth);
    }

    /// Current nesting depth
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// All items in order
    pub fn nodes(&self) -> &[FieldNode] {
        &self.nodes
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First item with the given label
    pub fn find(&self, label: &str) -> Option<&FieldNode> {
        self.nodes.iter().find(|n| n.label == label)
    }

    /// All items with the given label
    pub fn find_all<'s>(&'s self, label: &'s str) -> impl Iterator<Item = &'s FieldNode> + 's {
        self.nodes.iter().filter(move |n| n.label == label)
    }

    /// Render as indented text
    pub fn to_text(&self) -> String {
        self.nodes
            .iter()
            .map(FieldNode::to_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
