//! # Node Tree
//!
//! Parsed documents are stored in an arena: every node lives in a `Vec` and is
//! addressed by a [`NodeId`]. Besides the tree structure (sections own their
//! children, commands own their argument sections) each node is chained to its
//! predecessor and successor in document order, i.e. in the order the parser
//! created them. The parser inspects that chain to decide paragraph closure; the
//! chain never forms reference cycles because links are plain indices.

use std::collections::{BTreeMap, BTreeSet};

pub mod dump;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Arguments of a command: all anonymous or all named, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arguments {
    /// Each entry is a `Section` holding one argument block.
    Anonymous(Vec<NodeId>),
    Named(BTreeMap<String, NodeId>),
}

impl Arguments {
    pub fn len(&self) -> usize {
        match self {
            Arguments::Anonymous(list) => list.len(),
            Arguments::Named(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Arguments {
    fn default() -> Self {
        Arguments::Anonymous(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub format: String,
    pub flags: BTreeSet<String>,
    pub is_system: bool,
    pub is_block: bool,
    pub is_series: bool,
    pub arguments: Arguments,
}

impl Command {
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            flags: BTreeSet::new(),
            is_system: false,
            is_block: false,
            is_series: false,
            arguments: Arguments::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Section { children: Vec<NodeId> },
    Text { value: String },
    Command(Command),
    /// Inline diagnostic rendered verbatim; does not abort the document.
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub line: usize,
    pub offset: usize,
    next: Option<NodeId>,
}

/// An arena-backed node tree whose root is a `Section`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a tree holding only an empty root section.
    pub fn new() -> Self {
        let root = Node {
            kind: NodeKind::Section {
                children: Vec::new(),
            },
            line: 1,
            offset: 0,
            next: None,
        };
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Appends a node at the end of the document-order chain.
    pub fn push(&mut self, kind: NodeKind, line: usize, offset: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        let prev = NodeId(self.nodes.len() - 1);
        self.nodes.push(Node {
            kind,
            line,
            offset,
            next: None,
        });
        self.nodes[prev.0].next = Some(id);
        id
    }

    /// The most recently created node, the root excluded.
    pub fn last(&self) -> Option<NodeId> {
        (self.nodes.len() > 1).then(|| NodeId(self.nodes.len() - 1))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// Replaces a node's payload in place, keeping its position in the chain.
    pub fn replace(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.0].kind = kind;
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].next
    }

    pub fn set_children(&mut self, section: NodeId, list: Vec<NodeId>) {
        if let NodeKind::Section { children } = &mut self.nodes[section.0].kind {
            *children = list;
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Section { children } => children,
            _ => &[],
        }
    }

    pub fn command(&self, id: NodeId) -> Option<&Command> {
        match &self.nodes[id.0].kind {
            NodeKind::Command(command) => Some(command),
            _ => None,
        }
    }

    pub fn command_mut(&mut self, id: NodeId) -> Option<&mut Command> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Command(command) => Some(command),
            _ => None,
        }
    }

    /// Text of a node when it is a `Text` node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_blank_text(&self, id: NodeId) -> bool {
        self.text(id).is_some_and(|t| t.trim().is_empty())
    }

    pub fn is_command_named(&self, id: NodeId, name: &str) -> bool {
        self.command(id).is_some_and(|c| c.name == name)
    }

    /// All nodes after the root in document order.
    pub fn document_order(&self) -> DocumentOrder<'_> {
        DocumentOrder {
            tree: self,
            cursor: self.next(self.root()),
        }
    }

    /// Concatenation of every text node, in document order.
    pub fn plain_text(&self) -> String {
        self.document_order()
            .filter_map(|id| self.text(id))
            .collect()
    }
}

pub struct DocumentOrder<'a> {
    tree: &'a Tree,
    cursor: Option<NodeId>,
}

impl Iterator for DocumentOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cursor?;
        self.cursor = self.tree.next(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_links_document_order() {
        let mut tree = Tree::new();
        let a = tree.push(NodeKind::Text { value: "a".into() }, 1, 0);
        let b = tree.push(NodeKind::Text { value: "b".into() }, 1, 1);
        tree.set_children(tree.root(), vec![a, b]);
        assert_eq!(tree.next(tree.root()), Some(a));
        assert_eq!(tree.next(a), Some(b));
        assert_eq!(tree.next(b), None);
        assert_eq!(tree.document_order().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(tree.plain_text(), "ab");
    }

    #[test]
    fn replace_keeps_chain_position() {
        let mut tree = Tree::new();
        let a = tree.push(NodeKind::Text { value: " ".into() }, 1, 0);
        tree.replace(a, NodeKind::Command(Command::new("x", "")));
        let b = tree.push(NodeKind::Text { value: "b".into() }, 1, 1);
        assert!(tree.is_command_named(a, "x"));
        assert_eq!(tree.next(a), Some(b));
    }
}
