//! Footnote commands.
//!
//! Every command takes a transaction started on `state`'s revision and
//! computes positions against `state.doc`, mapping them through the steps
//! already issued on the same transaction.

use super::state::{FootnoteScope, FootnotesElementState};
use crate::mutations::MutationError;
use crate::state::EditorState;
use manuscript_model::{IdGenerator, Node, NodeKind, NodeWithPos, ObjectType, Selection, Transaction};
use manuscript_track_changes::{effective_child_count, is_hidden, visible_descendants};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FootnoteKind {
    #[default]
    Footnote,
    Endnote,
}

impl FootnoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FootnoteKind::Footnote => "footnote",
            FootnoteKind::Endnote => "endnote",
        }
    }
}

const FOOTNOTES_TITLE: &str = "Footnotes";

fn new_footnote(ids: &mut IdGenerator, id: &str, kind: FootnoteKind) -> Node {
    Node::new(NodeKind::Footnote)
        .with_attr("id", id)
        .with_attr("kind", kind.as_str())
        .with_child(Node::new(NodeKind::Paragraph).with_attr("id", ids.new_id(ObjectType::Paragraph)))
}

fn new_footnotes_element(ids: &mut IdGenerator, footnote: Node) -> Node {
    Node::new(NodeKind::FootnotesElement)
        .with_attr("id", ids.new_id(ObjectType::FootnotesElement))
        .with_child(footnote)
}

/// An inline footnote selected as a node, if any
fn selected_inline_footnote(state: &EditorState) -> Option<usize> {
    match state.selection {
        Selection::Node { from, .. } => state
            .doc
            .node_at(from)
            .filter(|node| node.is(&NodeKind::InlineFootnote))
            .map(|_| from),
        Selection::Text { .. } => None,
    }
}

/// Insert or extend the marker, returning the display index of the new footnote
fn place_marker(
    tr: &mut Transaction,
    state: &EditorState,
    scope: FootnoteScope,
    marker_pos: Option<usize>,
    cursor: usize,
    footnote_id: &str,
) -> Result<usize, MutationError> {
    if let Some(pos) = marker_pos {
        let marker = state
            .doc
            .node_at(pos)
            .ok_or(MutationError::NodeNotFound { pos })?;
        let index = state.footnotes.next_index(scope, pos + 1);

        let mut rids = marker.attr_strings("rids");
        rids.push(footnote_id.to_string());
        let contents = match marker.attr_str("contents").filter(|c| !c.is_empty()) {
            Some(contents) => format!("{contents},{index}"),
            None => index.to_string(),
        };

        let mut attrs = marker.attrs.clone();
        attrs.insert("rids".into(), json!(rids));
        attrs.insert("contents".into(), json!(contents));
        tr.set_node_attrs(tr.mapping().map(pos), attrs)?;
        return Ok(index);
    }

    let index = state.footnotes.next_index(scope, cursor);
    let marker = Node::new(NodeKind::InlineFootnote)
        .with_attr("rids", json!([footnote_id]))
        .with_attr("contents", index.to_string());
    tr.insert(tr.mapping().map(cursor), marker)?;
    Ok(index)
}

/// Put the cursor inside the new footnote's paragraph
fn focus_footnote(tr: &mut Transaction, footnote_pos: usize) {
    tr.set_selection(Selection::cursor(footnote_pos + 2))
        .scroll_into_view();
}

/// Insert a footnote into an existing element, ordered by display index
fn insert_into_element(
    tr: &mut Transaction,
    element: &FootnotesElementState,
    index: usize,
    footnote: Node,
) -> Result<(), MutationError> {
    let pos = tr.mapping().map(element.get_new_footnote_pos(index));
    tr.insert(pos, footnote)?;
    focus_footnote(tr, pos);
    Ok(())
}

/// Insert a footnote referenced from the cursor (or the selected marker).
///
/// A cursor inside a table element creates a table footnote instead.
/// Returns the id of the new footnote.
pub fn insert_inline_footnote(
    tr: &mut Transaction,
    state: &EditorState,
    ids: &mut IdGenerator,
    kind: FootnoteKind,
) -> Result<String, MutationError> {
    let marker_pos = selected_inline_footnote(state);
    let cursor = marker_pos.unwrap_or_else(|| state.selection.to());

    let table = state
        .doc
        .resolve(cursor)?
        .closest_of_kind(&NodeKind::TableElement)
        .and_then(|ancestor| ancestor.pos);
    if let Some(table_pos) = table {
        return insert_table_footnote(tr, state, ids, table_pos, marker_pos);
    }

    let footnote_id = ids.new_id(ObjectType::Footnote);
    let index = place_marker(
        tr,
        state,
        FootnoteScope::Document,
        marker_pos,
        cursor,
        &footnote_id,
    )?;
    let footnote = new_footnote(ids, &footnote_id, kind);

    if let Some(element) = state.footnotes.elements_in(FootnoteScope::Document).next() {
        insert_into_element(tr, element, index, footnote)?;
    } else if let Some(section) = footnotes_section(state) {
        // The section outlives its last element
        let title_size = section
            .node
            .first_child()
            .filter(|child| child.is(&NodeKind::SectionTitle))
            .map_or(0, Node::node_size);
        let at = tr.mapping().map(section.pos + 1 + title_size);
        tr.insert(at, new_footnotes_element(ids, footnote))?;
        focus_footnote(tr, at + 1);
        debug!(section = ?section.node.id(), "Added footnotes element to existing section");
    } else {
        create_footnotes_section(tr, state, ids, footnote)?;
    }

    debug!(footnote = %footnote_id, index, "Inserted footnote");
    Ok(footnote_id)
}

/// The first visible footnotes section of the document
fn footnotes_section(state: &EditorState) -> Option<NodeWithPos<'_>> {
    let mut found = None;
    visible_descendants(&state.doc, |node, pos, _| {
        if found.is_none() && node.is(&NodeKind::FootnotesSection) {
            found = Some(NodeWithPos { node, pos });
        }
        found.is_none()
    });
    found
}

/// Create the footnotes section at the end of the backmatter, creating the
/// backmatter too when the document has none
fn create_footnotes_section(
    tr: &mut Transaction,
    state: &EditorState,
    ids: &mut IdGenerator,
    footnote: Node,
) -> Result<(), MutationError> {
    let title = Node::new(NodeKind::SectionTitle).with_child(Node::text(FOOTNOTES_TITLE));
    let title_size = title.node_size();
    let section = Node::new(NodeKind::FootnotesSection)
        .with_attr("id", ids.new_id(ObjectType::Section))
        .with_content(vec![title, new_footnotes_element(ids, footnote)]);

    let backmatter_end = state
        .doc
        .find_children(|node| node.is(&NodeKind::Backmatter) && !is_hidden(node))
        .into_iter()
        .next()
        .map(|found| found.end() - 1);

    let (insert_at, inserted, section_pos) = match backmatter_end {
        Some(end) => {
            let at = tr.mapping().map(end);
            (at, section, at)
        }
        None => {
            let at = tr.mapping().map(state.doc.content_size());
            let backmatter = Node::new(NodeKind::Backmatter)
                .with_attr("id", ids.new_id(ObjectType::Backmatter))
                .with_child(section);
            (at, backmatter, at + 1)
        }
    };
    tr.insert(insert_at, inserted)?;

    // section > title, element > footnote
    focus_footnote(tr, section_pos + 1 + title_size + 1);
    info!(created_backmatter = backmatter_end.is_none(), "Created footnotes section");
    Ok(())
}

/// Insert a footnote numbered within one table element.
///
/// `inline_footnote_pos` extends an existing marker of the table; otherwise a
/// new marker goes at the cursor, which must lie inside the table.
pub fn insert_table_footnote(
    tr: &mut Transaction,
    state: &EditorState,
    ids: &mut IdGenerator,
    table_pos: usize,
    inline_footnote_pos: Option<usize>,
) -> Result<String, MutationError> {
    let table = state
        .doc
        .node_at(table_pos)
        .ok_or(MutationError::NodeNotFound { pos: table_pos })?;
    if !table.is(&NodeKind::TableElement) {
        return Err(MutationError::UnexpectedNode {
            pos: table_pos,
            expected: NodeKind::TableElement.to_string(),
            found: table.kind.to_string(),
        });
    }
    let table_end = table_pos + table.node_size();

    if let Some(pos) = inline_footnote_pos {
        let marker = state
            .doc
            .node_at(pos)
            .ok_or(MutationError::NodeNotFound { pos })?;
        if !marker.is(&NodeKind::InlineFootnote) {
            return Err(MutationError::UnexpectedNode {
                pos,
                expected: NodeKind::InlineFootnote.to_string(),
                found: marker.kind.to_string(),
            });
        }
    }

    let cursor = inline_footnote_pos.unwrap_or_else(|| state.selection.to());
    if cursor <= table_pos || cursor >= table_end {
        return Err(MutationError::SelectionOutsideTable { pos: cursor });
    }

    let scope = FootnoteScope::Table { pos: table_pos };
    let footnote_id = ids.new_id(ObjectType::Footnote);
    let index = place_marker(tr, state, scope, inline_footnote_pos, cursor, &footnote_id)?;
    let footnote = new_footnote(ids, &footnote_id, FootnoteKind::Footnote);

    if let Some(element) = state.footnotes.elements_in(scope).last() {
        insert_into_element(tr, element, index, footnote)?;
        debug!(footnote = %footnote_id, index, "Inserted table footnote");
        return Ok(footnote_id);
    }

    let element = new_footnotes_element(ids, footnote);
    let mut pos = table_pos + 1;
    let mut footer_end = None;
    let mut after_colgroup = None;
    let mut after_first = None;
    for (i, child) in table.content.iter().enumerate() {
        let end = pos + child.node_size();
        match child.kind {
            NodeKind::TableElementFooter if !is_hidden(child) && footer_end.is_none() => {
                footer_end = Some(end - 1);
            }
            NodeKind::TableColgroup => after_colgroup = Some(end),
            _ if i == 0 => after_first = Some(end),
            _ => {}
        }
        pos = end;
    }

    match footer_end {
        Some(end) => {
            let at = tr.mapping().map(end);
            tr.insert(at, element)?;
            focus_footnote(tr, at + 1);
        }
        None => {
            let at = tr
                .mapping()
                .map(after_colgroup.or(after_first).unwrap_or(table_pos + 1));
            let footer = Node::new(NodeKind::TableElementFooter)
                .with_attr("id", ids.new_id(ObjectType::TableElementFooter))
                .with_child(element);
            tr.insert(at, footer)?;
            focus_footnote(tr, at + 2);
        }
    }

    debug!(footnote = %footnote_id, index, "Inserted table footnote");
    Ok(footnote_id)
}

/// Delete a footnote and every reference to it.
///
/// Markers left without references are deleted. When the footnote is the
/// last visible one of its element, the whole element goes.
pub fn delete_footnote(
    tr: &mut Transaction,
    state: &EditorState,
    footnote_id: &str,
) -> Result<(), MutationError> {
    let element = state
        .footnotes
        .for_footnote(footnote_id)
        .ok_or_else(|| MutationError::FootnoteNotFound(footnote_id.to_string()))?;
    let footnote = element
        .footnotes
        .iter()
        .find(|f| f.id == footnote_id)
        .ok_or_else(|| MutationError::FootnoteNotFound(footnote_id.to_string()))?;

    for inline in state.footnotes.inline_footnotes_referencing(footnote_id) {
        let pos = tr.mapping().map(inline.pos);
        let parts: Vec<&str> = inline.contents.split(',').filter(|p| !p.is_empty()).collect();

        let mut rids = Vec::with_capacity(inline.rids.len());
        let mut contents = Vec::with_capacity(parts.len());
        for (i, rid) in inline.rids.iter().enumerate() {
            if rid != footnote_id {
                rids.push(rid.clone());
                if let Some(part) = parts.get(i) {
                    contents.push(*part);
                }
            }
        }

        if rids.is_empty() {
            tr.delete(pos, pos + 1)?;
            continue;
        }

        let node = tr.doc().node_at(pos).ok_or(MutationError::NodeNotFound { pos })?;
        let mut attrs = node.attrs.clone();
        attrs.insert("rids".into(), json!(rids));
        attrs.insert("contents".into(), json!(contents.join(",")));
        tr.set_node_attrs(pos, attrs)?;
    }

    let element_node = state
        .doc
        .node_at(element.pos)
        .ok_or(MutationError::NodeNotFound { pos: element.pos })?;
    if effective_child_count(element_node) <= 1 {
        let from = tr.mapping().map(element.pos);
        tr.delete(from, from + element.size)?;
        info!(footnote = %footnote_id, "Deleted footnote with its element");
    } else {
        let from = tr.mapping().map(footnote.pos);
        tr.delete(from, from + footnote.size)?;
        debug!(footnote = %footnote_id, "Deleted footnote");
    }
    Ok(())
}

/// Select the first marker referencing a footnote.
///
/// Returns the marker position, or `None` when nothing references it.
pub fn focus_footnote_marker(
    tr: &mut Transaction,
    state: &EditorState,
    footnote_id: &str,
) -> Result<Option<usize>, MutationError> {
    let Some(marker) = state
        .footnotes
        .inline_footnotes_referencing(footnote_id)
        .first()
        .map(|inline| inline.pos)
    else {
        return Ok(None);
    };

    let pos = tr.mapping().map(marker);
    let selection = Selection::node(tr.doc(), pos)?;
    tr.skip_tracking().set_selection(selection).scroll_into_view();
    Ok(Some(pos))
}
