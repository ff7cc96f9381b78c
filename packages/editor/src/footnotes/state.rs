use manuscript_model::{Node, NodeKind};
use manuscript_track_changes::is_hidden;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// Numbering boundary of footnotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FootnoteScope {
    /// Footnotes sections, numbered across the whole document
    Document,
    /// Footnotes of one table element, numbered locally
    Table { pos: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FootnoteEntry {
    pub id: String,
    pub pos: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineFootnoteEntry {
    pub pos: usize,
    pub rids: Vec<String>,
    pub contents: String,
}

impl InlineFootnoteEntry {
    pub fn references(&self, id: &str) -> bool {
        self.rids.iter().any(|rid| rid == id)
    }
}

/// Derived state of one footnotes element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FootnotesElementState {
    pub id: Option<String>,
    pub pos: usize,
    pub size: usize,
    pub scope: FootnoteScope,
    pub footnotes: Vec<FootnoteEntry>,
    /// Visible inline footnotes of the same scope, in document order
    pub inline_footnotes: Vec<InlineFootnoteEntry>,
    /// Display index of every referenced footnote of the scope
    pub labels: BTreeMap<String, usize>,
    pub unused_footnote_ids: BTreeSet<String>,
}

impl FootnotesElementState {
    pub fn contains(&self, footnote_id: &str) -> bool {
        self.footnotes.iter().any(|f| f.id == footnote_id)
    }

    /// Where a footnote that will get display index `index` belongs.
    ///
    /// Labels are those of the revision before the insertion, so the new
    /// footnote goes right before the first one currently holding `index`
    /// or a later index. Defaults to the end of the element.
    pub fn get_new_footnote_pos(&self, index: usize) -> usize {
        self.footnotes
            .iter()
            .find(|f| self.labels.get(&f.id).is_some_and(|&label| label >= index))
            .map(|f| f.pos)
            .unwrap_or(self.pos + self.size - 1)
    }
}

/// Footnote numbering of one document revision
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FootnotesState {
    elements: Vec<FootnotesElementState>,
    scopes: BTreeMap<FootnoteScope, ScopeState>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ScopeState {
    inline_footnotes: Vec<InlineFootnoteEntry>,
    labels: BTreeMap<String, usize>,
}

struct Collector {
    elements: Vec<FootnotesElementState>,
    inline_footnotes: Vec<(FootnoteScope, InlineFootnoteEntry)>,
}

impl Collector {
    fn walk(&mut self, parent: &Node, start: usize, scope: FootnoteScope, element: Option<usize>) {
        let mut pos = start;
        for child in &parent.content {
            let child_pos = pos;
            pos += child.node_size();

            if is_hidden(child) {
                continue;
            }

            match child.kind {
                NodeKind::TableElement => {
                    self.walk(child, child_pos + 1, FootnoteScope::Table { pos: child_pos }, None);
                }
                NodeKind::FootnotesElement => {
                    self.elements.push(FootnotesElementState {
                        id: child.id().map(str::to_string),
                        pos: child_pos,
                        size: child.node_size(),
                        scope,
                        footnotes: Vec::new(),
                        inline_footnotes: Vec::new(),
                        labels: BTreeMap::new(),
                        unused_footnote_ids: BTreeSet::new(),
                    });
                    let index = self.elements.len() - 1;
                    self.walk(child, child_pos + 1, scope, Some(index));
                }
                NodeKind::Footnote => {
                    if let (Some(index), Some(id)) = (element, child.id()) {
                        self.elements[index].footnotes.push(FootnoteEntry {
                            id: id.to_string(),
                            pos: child_pos,
                            size: child.node_size(),
                        });
                    }
                }
                NodeKind::InlineFootnote => {
                    self.inline_footnotes.push((
                        scope,
                        InlineFootnoteEntry {
                            pos: child_pos,
                            rids: child.attr_strings("rids"),
                            contents: child.attr_str("contents").unwrap_or_default().to_string(),
                        },
                    ));
                }
                _ if !child.is_leaf() && !child.is_text() => {
                    self.walk(child, child_pos + 1, scope, element);
                }
                _ => {}
            }
        }
    }
}

impl FootnotesState {
    /// Number the footnotes of a document revision
    #[instrument(skip_all)]
    pub fn build(doc: &Node) -> Self {
        let mut collector = Collector {
            elements: Vec::new(),
            inline_footnotes: Vec::new(),
        };
        collector.walk(doc, 0, FootnoteScope::Document, None);

        let mut scopes: BTreeMap<FootnoteScope, ScopeState> = BTreeMap::new();
        for element in &collector.elements {
            scopes.entry(element.scope).or_default();
        }
        for (scope, inline) in collector.inline_footnotes {
            scopes.entry(scope).or_default().inline_footnotes.push(inline);
        }

        for (scope, state) in scopes.iter_mut() {
            let known: BTreeSet<&str> = collector
                .elements
                .iter()
                .filter(|e| e.scope == *scope)
                .flat_map(|e| e.footnotes.iter().map(|f| f.id.as_str()))
                .collect();

            for inline in &state.inline_footnotes {
                for rid in &inline.rids {
                    if known.contains(rid.as_str()) && !state.labels.contains_key(rid) {
                        let next = state.labels.len() + 1;
                        state.labels.insert(rid.clone(), next);
                    }
                }
            }
        }

        let mut elements = collector.elements;
        for element in &mut elements {
            if let Some(scope) = scopes.get(&element.scope) {
                element.inline_footnotes = scope.inline_footnotes.clone();
                element.labels = scope.labels.clone();
            }
            element.unused_footnote_ids = element
                .footnotes
                .iter()
                .filter(|f| !element.labels.contains_key(&f.id))
                .map(|f| f.id.clone())
                .collect();
        }

        debug!(
            elements = elements.len(),
            scopes = scopes.len(),
            "Built footnotes state"
        );
        Self { elements, scopes }
    }

    pub fn elements(&self) -> &[FootnotesElementState] {
        &self.elements
    }

    /// Elements of a scope, in document order
    pub fn elements_in(&self, scope: FootnoteScope) -> impl Iterator<Item = &FootnotesElementState> {
        self.elements.iter().filter(move |e| e.scope == scope)
    }

    /// The element holding a footnote
    pub fn for_footnote(&self, footnote_id: &str) -> Option<&FootnotesElementState> {
        self.elements.iter().find(|e| e.contains(footnote_id))
    }

    pub fn labels(&self, scope: FootnoteScope) -> Option<&BTreeMap<String, usize>> {
        self.scopes.get(&scope).map(|s| &s.labels)
    }

    pub fn label(&self, footnote_id: &str) -> Option<usize> {
        self.for_footnote(footnote_id)
            .and_then(|e| e.labels.get(footnote_id).copied())
    }

    pub fn is_unused(&self, footnote_id: &str) -> bool {
        self.for_footnote(footnote_id)
            .is_some_and(|e| e.unused_footnote_ids.contains(footnote_id))
    }

    pub fn unused_footnote_ids(&self) -> BTreeSet<&str> {
        self.elements
            .iter()
            .flat_map(|e| e.unused_footnote_ids.iter().map(String::as_str))
            .collect()
    }

    /// Visible inline footnotes of a scope, in document order
    pub fn inline_footnotes(&self, scope: FootnoteScope) -> &[InlineFootnoteEntry] {
        self.scopes
            .get(&scope)
            .map(|s| s.inline_footnotes.as_slice())
            .unwrap_or_default()
    }

    /// Every visible inline footnote of any scope, with its scope
    pub fn all_inline_footnotes(&self) -> impl Iterator<Item = (FootnoteScope, &InlineFootnoteEntry)> {
        self.scopes
            .iter()
            .flat_map(|(scope, s)| s.inline_footnotes.iter().map(move |i| (*scope, i)))
    }

    pub fn inline_footnotes_referencing(&self, footnote_id: &str) -> Vec<&InlineFootnoteEntry> {
        let mut found: Vec<&InlineFootnoteEntry> = self
            .all_inline_footnotes()
            .map(|(_, inline)| inline)
            .filter(|inline| inline.references(footnote_id))
            .collect();
        found.sort_by_key(|inline| inline.pos);
        found
    }

    /// Display index for a marker inserted at `pos`: one past the highest
    /// label referenced before it
    pub fn next_index(&self, scope: FootnoteScope, pos: usize) -> usize {
        let labels = self.labels(scope);
        self.inline_footnotes(scope)
            .iter()
            .filter(|inline| inline.pos < pos)
            .flat_map(|inline| inline.rids.iter())
            .filter_map(|rid| labels.and_then(|l| l.get(rid)).copied())
            .max()
            .unwrap_or(0)
            + 1
    }
}
