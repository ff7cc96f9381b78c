//! Raw in-place edits on a document tree.
//!
//! These never consult a change tracker; [`crate::Transaction`] layers
//! tracking on top of them.

use crate::error::{ModelError, ModelResult};
use crate::mapping::StepMap;
use crate::node::{Attrs, Node};

/// Sibling range addressed by a pair of positions
pub(crate) struct SiblingRange {
    pub path: Vec<usize>,
    pub start_index: usize,
    pub end_index: usize,
}

impl Node {
    /// Insert nodes at `pos`, splitting a text node when `pos` falls inside one
    pub fn insert(&mut self, pos: usize, nodes: Vec<Node>) -> ModelResult<StepMap> {
        let (path, index, text_offset) = {
            let rp = self.resolve(pos)?;
            (rp.path(), rp.index, rp.text_offset)
        };

        let parent = self
            .node_at_path_mut(&path)
            .ok_or(ModelError::NoNodeAt { pos })?;
        if parent.is_leaf() {
            return Err(ModelError::LeafInsertion {
                pos,
                kind: parent.kind.to_string(),
            });
        }

        let mut index = index;
        if text_offset > 0 {
            split_text(parent, index, text_offset);
            index += 1;
        }

        let inserted = nodes.iter().map(Node::node_size).sum();
        parent.content.splice(index..index, nodes);

        Ok(StepMap::new(pos, 0, inserted))
    }

    /// Delete the content between `from` and `to`.
    ///
    /// The range must either cover whole sibling nodes or stay within a single
    /// text node.
    pub fn delete(&mut self, from: usize, to: usize) -> ModelResult<StepMap> {
        if from > to {
            return Err(ModelError::invalid_range(from, to, "start after end"));
        }
        if from == to {
            return Ok(StepMap::identity());
        }

        if let Some((path, index, start, end)) = self.text_range(from, to)? {
            let parent = self
                .node_at_path_mut(&path)
                .ok_or(ModelError::NoNodeAt { pos: from })?;
            if let Some(text) = parent.content[index].text.as_mut() {
                let chars: Vec<char> = text.chars().collect();
                *text = chars[..start].iter().chain(&chars[end..]).collect();
            }
            return Ok(StepMap::new(from, to - from, 0));
        }

        let range = self.sibling_range(from, to)?;
        let parent = self
            .node_at_path_mut(&range.path)
            .ok_or(ModelError::NoNodeAt { pos: from })?;
        parent.content.drain(range.start_index..range.end_index);

        Ok(StepMap::new(from, to - from, 0))
    }

    /// Replace the attributes of the node starting at `pos`
    pub fn set_node_attrs(&mut self, pos: usize, attrs: Attrs) -> ModelResult<StepMap> {
        let node = self.node_at_mut(pos)?;
        node.attrs = attrs;
        Ok(StepMap::identity())
    }

    /// `Some` when both ends fall inside (or on the edges of) one text node
    fn text_range(
        &self,
        from: usize,
        to: usize,
    ) -> ModelResult<Option<(Vec<usize>, usize, usize, usize)>> {
        let rf = self.resolve(from)?;
        if !rf.is_inside_text() {
            let rt = self.resolve(to)?;
            if !rt.is_inside_text() {
                return Ok(None);
            }
        }

        // Find the text node containing `from` (or starting at it)
        let rp = self.resolve(from)?;
        let parent = rp.parent();
        let Some(text_node) = parent.child(rp.index).filter(|n| n.is_text()) else {
            return Err(ModelError::invalid_range(from, to, "range crosses node boundaries"));
        };
        let node_start = from - rp.text_offset;
        let node_end = node_start + text_node.node_size();
        if to > node_end {
            return Err(ModelError::invalid_range(from, to, "range crosses node boundaries"));
        }

        Ok(Some((rp.path(), rp.index, rp.text_offset, to - node_start)))
    }

    pub(crate) fn sibling_range(&self, from: usize, to: usize) -> ModelResult<SiblingRange> {
        let rf = self.resolve(from)?;
        let rt = self.resolve(to)?;

        if rf.is_inside_text() || rt.is_inside_text() {
            return Err(ModelError::invalid_range(from, to, "range splits a text node"));
        }
        if rf.path() != rt.path() {
            return Err(ModelError::invalid_range(from, to, "range crosses node boundaries"));
        }

        Ok(SiblingRange {
            path: rf.path(),
            start_index: rf.index,
            end_index: rt.index,
        })
    }
}

fn split_text(parent: &mut Node, index: usize, offset: usize) {
    let node = &mut parent.content[index];
    let chars: Vec<char> = node.text.as_deref().unwrap_or_default().chars().collect();
    let tail: String = chars[offset..].iter().collect();
    node.text = Some(chars[..offset].iter().collect());

    let mut rest = node.clone();
    rest.text = Some(tail);
    parent.content.insert(index + 1, rest);
}
