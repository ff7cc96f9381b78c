//! # Positions
//!
//! Integer positions address the gaps between nodes. The content of the root
//! starts at 0, entering a container node costs one position and leaving it
//! costs one more. Text occupies one position per character and leaf nodes
//! occupy exactly one.
//!
//! ```text
//! <paragraph> H e l l o <inline_footnote/> </paragraph>
//! 0          1 2 3 4 5 6                  7            8
//! ```

use crate::error::{ModelError, ModelResult};
use crate::node::{Node, NodeKind};

/// A node together with the position right before it
#[derive(Debug, Clone, Copy)]
pub struct NodeWithPos<'a> {
    pub node: &'a Node,
    pub pos: usize,
}

impl<'a> NodeWithPos<'a> {
    /// Position right after the node
    pub fn end(&self) -> usize {
        self.pos + self.node.node_size()
    }
}

/// One level of the ancestor chain of a resolved position
#[derive(Debug, Clone, Copy)]
pub struct Ancestor<'a> {
    pub node: &'a Node,
    /// Position before the node (`None` for the root)
    pub pos: Option<usize>,
    /// Index of the node inside its own parent (0 for the root)
    pub index: usize,
}

impl<'a> Ancestor<'a> {
    /// Position where the node's content starts
    pub fn content_start(&self) -> usize {
        self.pos.map(|p| p + 1).unwrap_or(0)
    }
}

/// A position with its surrounding tree context
#[derive(Debug, Clone)]
pub struct ResolvedPos<'a> {
    pub pos: usize,
    ancestors: Vec<Ancestor<'a>>,
    /// Index of the child the position points at inside the innermost parent
    pub index: usize,
    /// Offset inside the text node at `index` (0 when between nodes)
    pub text_offset: usize,
}

impl<'a> ResolvedPos<'a> {
    /// Depth of the innermost parent (the root has depth 0)
    pub fn depth(&self) -> usize {
        self.ancestors.len() - 1
    }

    pub fn node(&self, depth: usize) -> &'a Node {
        self.ancestors[depth].node
    }

    pub fn parent(&self) -> &'a Node {
        self.ancestors[self.depth()].node
    }

    pub fn ancestors(&self) -> &[Ancestor<'a>] {
        &self.ancestors
    }

    /// Start of the content of the innermost parent
    pub fn start(&self) -> usize {
        self.ancestors[self.depth()].content_start()
    }

    /// Child indices leading from the root to the innermost parent
    pub fn path(&self) -> Vec<usize> {
        self.ancestors.iter().skip(1).map(|a| a.index).collect()
    }

    pub fn is_inside_text(&self) -> bool {
        self.text_offset > 0
    }

    /// The node starting exactly at this position, if any
    pub fn node_after(&self) -> Option<&'a Node> {
        if self.is_inside_text() {
            return None;
        }
        self.parent().child(self.index)
    }

    /// Innermost ancestor (including the root) matching `pred`
    pub fn closest(&self, pred: impl Fn(&Node) -> bool) -> Option<Ancestor<'a>> {
        self.ancestors.iter().rev().find(|a| pred(a.node)).copied()
    }

    /// Innermost ancestor of the given kind
    pub fn closest_of_kind(&self, kind: &NodeKind) -> Option<Ancestor<'a>> {
        self.closest(|node| &node.kind == kind)
    }
}

impl Node {
    /// Walk all descendants depth-first in document order.
    ///
    /// The callback receives the node, the position before it and its parent.
    /// Returning `false` skips the node's children.
    pub fn descendants<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a Node, usize, &'a Node) -> bool,
    {
        walk(self, 0, &mut f);
    }

    /// All descendants matching `pred`, positions relative to this node's content
    pub fn find_children(&self, pred: impl Fn(&Node) -> bool) -> Vec<NodeWithPos<'_>> {
        let mut found = Vec::new();
        self.descendants(|node, pos, _| {
            if pred(node) {
                found.push(NodeWithPos { node, pos });
            }
            true
        });
        found
    }

    pub fn find_children_of_kind(&self, kind: &NodeKind) -> Vec<NodeWithPos<'_>> {
        self.find_children(|node| &node.kind == kind)
    }

    /// Resolve a position inside this node's content
    pub fn resolve(&self, pos: usize) -> ModelResult<ResolvedPos<'_>> {
        let size = self.content_size();
        if pos > size {
            return Err(ModelError::PositionOutOfRange { pos, size });
        }

        let mut ancestors = vec![Ancestor {
            node: self,
            pos: None,
            index: 0,
        }];
        let mut node = self;
        let mut start = 0;

        loop {
            let mut offset = start;
            let mut hit = None;
            for (i, child) in node.content.iter().enumerate() {
                let end = offset + child.node_size();
                if pos < end {
                    hit = Some((i, child, offset));
                    break;
                }
                offset = end;
            }

            let Some((index, child, child_start)) = hit else {
                return Ok(ResolvedPos {
                    pos,
                    ancestors,
                    index: node.content.len(),
                    text_offset: 0,
                });
            };

            if pos == child_start {
                return Ok(ResolvedPos {
                    pos,
                    ancestors,
                    index,
                    text_offset: 0,
                });
            }

            if child.is_text() {
                return Ok(ResolvedPos {
                    pos,
                    ancestors,
                    index,
                    text_offset: pos - child_start,
                });
            }

            ancestors.push(Ancestor {
                node: child,
                pos: Some(child_start),
                index,
            });
            node = child;
            start = child_start + 1;
        }
    }

    /// The node starting exactly at `pos`
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        self.resolve(pos).ok().and_then(|rp| rp.node_after())
    }

    pub(crate) fn node_at_path_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let mut node = self;
        for &index in path {
            node = node.content.get_mut(index)?;
        }
        Some(node)
    }

    /// Mutable access to the node starting exactly at `pos`
    pub fn node_at_mut(&mut self, pos: usize) -> ModelResult<&mut Node> {
        let (path, index) = {
            let rp = self.resolve(pos)?;
            if rp.node_after().is_none() {
                return Err(ModelError::NoNodeAt { pos });
            }
            (rp.path(), rp.index)
        };
        self.node_at_path_mut(&path)
            .and_then(|parent| parent.content.get_mut(index))
            .ok_or(ModelError::NoNodeAt { pos })
    }
}

fn walk<'a, F>(parent: &'a Node, start: usize, f: &mut F)
where
    F: FnMut(&'a Node, usize, &'a Node) -> bool,
{
    let mut pos = start;
    for child in &parent.content {
        if f(child, pos, parent) && !child.content.is_empty() {
            walk(child, pos + 1, f);
        }
        pos += child.node_size();
    }
}
