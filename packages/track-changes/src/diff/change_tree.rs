use super::text::TextDelta;
use manuscript_model::{Node, NodeKind};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Identity of a node among its siblings
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    Id(String),
    Index(usize),
}

impl NodeKey {
    /// `attrs.id` when present, the sibling index otherwise
    pub fn of(node: &Node, index: usize) -> Self {
        match node.id() {
            Some(id) => NodeKey::Id(id.to_string()),
            None => NodeKey::Index(index),
        }
    }

    pub fn is_id(&self) -> bool {
        matches!(self, NodeKey::Id(_))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Id(id) => f.write_str(id),
            NodeKey::Index(index) => write!(f, "$$index:{}", index),
        }
    }
}

impl Serialize for NodeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Structural change of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Delta {
    Added,
    Removed,
    /// Same identity at another sibling index, or under another parent
    #[serde(rename_all = "camelCase")]
    Moved {
        from: usize,
        to: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_parent: Option<NodeKey>,
    },
    Modified,
}

impl Delta {
    pub fn symbol(&self) -> char {
        match self {
            Delta::Added => '+',
            Delta::Removed => '-',
            Delta::Moved { .. } => '>',
            Delta::Modified => '~',
        }
    }
}

/// Change of one attribute; `None` means absent on that side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttrDelta {
    pub key: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// One entry of a change tree.
///
/// Entries without a delta are containers of changed descendants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNode {
    pub key: NodeKey,
    pub kind: NodeKind,
    /// Position before the node in the current document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<AttrDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextDelta>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChangeNode>,
}

impl ChangeNode {
    pub(crate) fn new(key: NodeKey, kind: NodeKind, pos: Option<usize>) -> Self {
        Self {
            key,
            kind,
            pos,
            delta: None,
            attrs: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn with_delta(mut self, delta: Delta) -> Self {
        self.delta = Some(delta);
        self
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a ChangeNode>) {
        if self.delta.is_some() {
            out.push(self);
        }
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// Hierarchical diff mirroring the current document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeTree {
    pub root: ChangeNode,
}

impl ChangeTree {
    /// Every entry carrying a delta, in tree order
    pub fn deltas(&self) -> Vec<&ChangeNode> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.root.delta.is_none() && self.root.children.is_empty()
    }

    /// The first entry with the given key
    pub fn find(&self, key: &NodeKey) -> Option<&ChangeNode> {
        fn find_in<'a>(node: &'a ChangeNode, key: &NodeKey) -> Option<&'a ChangeNode> {
            if &node.key == key {
                return Some(node);
            }
            node.children.iter().find_map(|child| find_in(child, key))
        }
        find_in(&self.root, key)
    }
}
