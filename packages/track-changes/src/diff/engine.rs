use super::change_tree::{AttrDelta, ChangeNode, ChangeTree, Delta, NodeKey};
use super::text::diff_text;
use super::DiffOptions;
use manuscript_model::Node;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Where an identified node lives in one snapshot
struct Location<'a> {
    node: &'a Node,
    parent: NodeKey,
    index: usize,
    /// Parent's children are diffed against an original counterpart.
    /// Always `false` in the original snapshot.
    parent_compared: bool,
}

/// Every identified node of a snapshot, by id
struct IdIndex<'a> {
    nodes: HashMap<&'a str, Location<'a>>,
}

impl<'a> IdIndex<'a> {
    fn build(doc: &'a Node) -> Self {
        let mut nodes = HashMap::new();
        collect_ids(doc, NodeKey::of(doc, 0), &mut nodes);
        Self { nodes }
    }

    /// Index the current snapshot, recording which parents get compared
    fn build_compared(original: &'a Node, current: &'a Node, old_ids: &IdIndex<'a>) -> Self {
        let mut nodes = HashMap::new();
        collect_compared_ids(Some(original), current, NodeKey::of(current, 0), old_ids, &mut nodes);
        Self { nodes }
    }

    fn get(&self, id: &str) -> Option<&Location<'a>> {
        self.nodes.get(id)
    }
}

fn collect_ids<'a>(parent: &'a Node, parent_key: NodeKey, out: &mut HashMap<&'a str, Location<'a>>) {
    for (index, child) in parent.content.iter().enumerate() {
        if let Some(id) = child.id() {
            out.entry(id).or_insert(Location {
                node: child,
                parent: parent_key.clone(),
                index,
                parent_compared: false,
            });
        }
        collect_ids(child, NodeKey::of(child, index), out);
    }
}

/// Walk the current snapshot alongside the original, pairing nodes the way
/// `Differ::diff_children` does
fn collect_compared_ids<'a>(
    old_parent: Option<&'a Node>,
    parent: &'a Node,
    parent_key: NodeKey,
    old_ids: &IdIndex<'a>,
    out: &mut HashMap<&'a str, Location<'a>>,
) {
    let siblings = old_parent.map(|old| (old, sibling_keys(old).1, sibling_keys(parent).1));

    for (index, child) in parent.content.iter().enumerate() {
        let key = NodeKey::of(child, index);
        if let Some(id) = child.id() {
            out.entry(id).or_insert(Location {
                node: child,
                parent: parent_key.clone(),
                index,
                parent_compared: old_parent.is_some(),
            });
        }

        let mut counterpart: Option<&'a Node> = None;
        if let Some((old, old_first, new_first)) = &siblings {
            let old: &'a Node = *old;
            if new_first.get(&key) == Some(&index) {
                counterpart = old_first
                    .get(&key)
                    .map(|&i| &old.content[i])
                    .filter(|old_child| old_child.kind == child.kind);
            }
            if counterpart.is_none() {
                counterpart = child
                    .id()
                    .and_then(|id| old_ids.get(id))
                    .filter(|location| {
                        location.parent != parent_key && location.node.kind == child.kind
                    })
                    .map(|location| location.node);
            }
        }
        collect_compared_ids(counterpart, child, key, old_ids, out);
    }
}

/// Index pairs of a longest common subsequence
fn lcs<T: PartialEq>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    let width = b.len() + 1;
    let mut lengths = vec![0usize; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lengths[i * width + j] = if a[i] == b[j] {
                lengths[(i + 1) * width + j + 1] + 1
            } else {
                lengths[(i + 1) * width + j].max(lengths[i * width + j + 1])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if lengths[(i + 1) * width + j] >= lengths[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

/// Keys of a child list; repeated keys after the first one count as unmatched
fn sibling_keys(parent: &Node) -> (Vec<NodeKey>, HashMap<NodeKey, usize>) {
    let keys: Vec<NodeKey> = parent
        .content
        .iter()
        .enumerate()
        .map(|(i, child)| NodeKey::of(child, i))
        .collect();
    let mut first = HashMap::new();
    for (i, key) in keys.iter().enumerate() {
        first.entry(key.clone()).or_insert(i);
    }
    (keys, first)
}

pub(super) struct Differ<'a, 'o> {
    options: &'o DiffOptions,
    old_ids: IdIndex<'a>,
    new_ids: IdIndex<'a>,
}

impl<'a, 'o> Differ<'a, 'o> {
    pub(super) fn new(original: &'a Node, current: &'a Node, options: &'o DiffOptions) -> Self {
        let old_ids = IdIndex::build(original);
        let new_ids = IdIndex::build_compared(original, current, &old_ids);
        Self {
            options,
            old_ids,
            new_ids,
        }
    }

    pub(super) fn diff(&self, original: &'a Node, current: &'a Node) -> ChangeTree {
        let key = NodeKey::of(current, 0);
        let root = self
            .diff_pair(original, current, key.clone(), None, None)
            .unwrap_or_else(|| ChangeNode::new(key, current.kind.clone(), None));
        ChangeTree { root }
    }

    /// Compare two nodes sharing a key; `None` when nothing changed below them
    fn diff_pair(
        &self,
        old: &'a Node,
        new: &'a Node,
        key: NodeKey,
        pos: Option<usize>,
        moved: Option<Delta>,
    ) -> Option<ChangeNode> {
        let mut entry = ChangeNode::new(key.clone(), new.kind.clone(), pos);
        entry.attrs = attr_deltas(old, new);

        if old.is_text() || new.is_text() {
            let (old_text, new_text) = (
                old.text.as_deref().unwrap_or_default(),
                new.text.as_deref().unwrap_or_default(),
            );
            if old_text != new_text {
                entry.text = Some(diff_text(
                    old_text,
                    new_text,
                    self.options.text_diff_min_length,
                ));
            }
        } else {
            let content_start = pos.map(|p| p + 1).unwrap_or(0);
            entry.children = self.diff_children(old, new, &key, content_start);
        }

        entry.delta = match moved {
            Some(delta) => Some(delta),
            None if !entry.attrs.is_empty() || entry.text.is_some() => Some(Delta::Modified),
            None => None,
        };

        if entry.delta.is_none() && entry.children.is_empty() {
            return None;
        }
        Some(entry)
    }

    fn diff_children(
        &self,
        old_parent: &'a Node,
        new_parent: &'a Node,
        parent_key: &NodeKey,
        content_start: usize,
    ) -> Vec<ChangeNode> {
        let (old_keys, old_first) = sibling_keys(old_parent);
        let (new_keys, new_first) = sibling_keys(new_parent);

        // Keys present once on both sides with the same node kind
        let is_common = |old_index: usize, new_index: usize| {
            old_parent.content[old_index].kind == new_parent.content[new_index].kind
        };
        let old_common: Vec<usize> = (0..old_keys.len())
            .filter(|&i| old_first.get(&old_keys[i]) == Some(&i))
            .filter(|&i| {
                new_first
                    .get(&old_keys[i])
                    .is_some_and(|&j| is_common(i, j))
            })
            .collect();
        let new_common: Vec<usize> = (0..new_keys.len())
            .filter(|&j| new_first.get(&new_keys[j]) == Some(&j))
            .filter(|&j| {
                old_first
                    .get(&new_keys[j])
                    .is_some_and(|&i| is_common(i, j))
            })
            .collect();

        let in_order: HashSet<usize> = {
            let a: Vec<&NodeKey> = old_common.iter().map(|&i| &old_keys[i]).collect();
            let b: Vec<&NodeKey> = new_common.iter().map(|&j| &new_keys[j]).collect();
            lcs(&a, &b).into_iter().map(|(_, j)| new_common[j]).collect()
        };
        let common: HashSet<usize> = new_common.iter().copied().collect();

        let mut entries = Vec::new();
        let mut matched_old: BTreeSet<usize> = BTreeSet::new();
        let mut pos = content_start;

        for (j, child) in new_parent.content.iter().enumerate() {
            let key = new_keys[j].clone();
            let child_pos = Some(pos);
            pos += child.node_size();

            if common.contains(&j) {
                let i = old_first[&key];
                let old_child = &old_parent.content[i];
                if in_order.contains(&j) {
                    matched_old.insert(i);
                    entries.extend(self.diff_pair(old_child, child, key, child_pos, None));
                    continue;
                }
                if self.options.detect_moves {
                    matched_old.insert(i);
                    let moved = Delta::Moved {
                        from: i,
                        to: j,
                        from_parent: None,
                    };
                    entries.extend(self.diff_pair(old_child, child, key, child_pos, Some(moved)));
                    continue;
                }
            } else if let Some(moved) = self.moved_in(child, j, parent_key) {
                let (old_child, delta) = moved;
                entries.extend(self.diff_pair(old_child, child, key, child_pos, Some(delta)));
                continue;
            }

            entries.push(ChangeNode::new(key, child.kind.clone(), child_pos).with_delta(Delta::Added));
        }

        for (i, child) in old_parent.content.iter().enumerate() {
            if matched_old.contains(&i) || self.moved_out(child, parent_key) {
                continue;
            }
            entries.push(
                ChangeNode::new(old_keys[i].clone(), child.kind.clone(), None)
                    .with_delta(Delta::Removed),
            );
        }

        entries
    }

    /// Old location of an identified node that arrived from another parent
    fn moved_in(&self, child: &'a Node, to: usize, parent_key: &NodeKey) -> Option<(&'a Node, Delta)> {
        if !self.options.detect_moves {
            return None;
        }
        let location = self.old_ids.get(child.id()?)?;
        if &location.parent == parent_key || location.node.kind != child.kind {
            return None;
        }
        Some((
            location.node,
            Delta::Moved {
                from: location.index,
                to,
                from_parent: Some(location.parent.clone()),
            },
        ))
    }

    /// Whether a vanished child is reported as moved under another parent.
    ///
    /// Only parents that are themselves compared report moves; a child that
    /// landed in an added subtree stays a removal here.
    fn moved_out(&self, child: &Node, parent_key: &NodeKey) -> bool {
        if !self.options.detect_moves {
            return false;
        }
        let Some(location) = child.id().and_then(|id| self.new_ids.get(id)) else {
            return false;
        };
        location.parent_compared
            && &location.parent != parent_key
            && location.node.kind == child.kind
    }
}

fn attr_deltas(old: &Node, new: &Node) -> Vec<AttrDelta> {
    let keys: BTreeSet<&String> = old.attrs.keys().chain(new.attrs.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let (before, after) = (old.attrs.get(key), new.attrs.get(key));
            (before != after).then(|| AttrDelta {
                key: key.clone(),
                old: before.cloned(),
                new: after.cloned(),
            })
        })
        .collect()
}

/// Baseline-free diff: every top-level child is new
pub(super) fn all_added(current: &Node) -> ChangeTree {
    let mut root = ChangeNode::new(NodeKey::of(current, 0), current.kind.clone(), None);
    let mut pos = 0;
    for (index, child) in current.content.iter().enumerate() {
        root.children.push(
            ChangeNode::new(NodeKey::of(child, index), child.kind.clone(), Some(pos))
                .with_delta(Delta::Added),
        );
        pos += child.node_size();
    }
    ChangeTree { root }
}
