//! # Document Nodes
//!
//! Typed tree nodes in the native JSON node format:
//!
//! ```json
//! { "type": "paragraph", "attrs": { "id": "MPParagraph:1" }, "content": [
//!     { "type": "text", "text": "Hello" }
//! ] }
//! ```
//!
//! Node types form a closed set. Anything the editor does not know about
//! deserializes to [`NodeKind::Other`] so documents round-trip unchanged.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Node attributes, kept as an ordered JSON object
pub type Attrs = Map<String, Value>;

/// Attribute holding the tracked-change records of a node
pub const DATA_TRACKED: &str = "dataTracked";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Manuscript,
    Abstracts,
    Body,
    Backmatter,
    Section,
    SectionTitle,
    GraphicalAbstractSection,
    FootnotesSection,
    BibliographySection,
    Paragraph,
    Text,
    FigureElement,
    Figure,
    Figcaption,
    TableElement,
    Table,
    TableRow,
    TableCell,
    TableColgroup,
    TableElementFooter,
    EquationElement,
    Equation,
    ListingElement,
    Listing,
    BulletList,
    OrderedList,
    ListItem,
    FootnotesElement,
    Footnote,
    InlineFootnote,
    CrossReference,
    Citation,
    InlineEquation,
    HardBreak,
    Placeholder,
    Other(String),
}

impl NodeKind {
    pub fn name(&self) -> &str {
        match self {
            NodeKind::Manuscript => "manuscript",
            NodeKind::Abstracts => "abstracts",
            NodeKind::Body => "body",
            NodeKind::Backmatter => "backmatter",
            NodeKind::Section => "section",
            NodeKind::SectionTitle => "section_title",
            NodeKind::GraphicalAbstractSection => "graphical_abstract_section",
            NodeKind::FootnotesSection => "footnotes_section",
            NodeKind::BibliographySection => "bibliography_section",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Text => "text",
            NodeKind::FigureElement => "figure_element",
            NodeKind::Figure => "figure",
            NodeKind::Figcaption => "figcaption",
            NodeKind::TableElement => "table_element",
            NodeKind::Table => "table",
            NodeKind::TableRow => "table_row",
            NodeKind::TableCell => "table_cell",
            NodeKind::TableColgroup => "table_colgroup",
            NodeKind::TableElementFooter => "table_element_footer",
            NodeKind::EquationElement => "equation_element",
            NodeKind::Equation => "equation",
            NodeKind::ListingElement => "listing_element",
            NodeKind::Listing => "listing",
            NodeKind::BulletList => "bullet_list",
            NodeKind::OrderedList => "ordered_list",
            NodeKind::ListItem => "list_item",
            NodeKind::FootnotesElement => "footnotes_element",
            NodeKind::Footnote => "footnote",
            NodeKind::InlineFootnote => "inline_footnote",
            NodeKind::CrossReference => "cross_reference",
            NodeKind::Citation => "citation",
            NodeKind::InlineEquation => "inline_equation",
            NodeKind::HardBreak => "hard_break",
            NodeKind::Placeholder => "placeholder",
            NodeKind::Other(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "manuscript" => NodeKind::Manuscript,
            "abstracts" => NodeKind::Abstracts,
            "body" => NodeKind::Body,
            "backmatter" => NodeKind::Backmatter,
            "section" => NodeKind::Section,
            "section_title" => NodeKind::SectionTitle,
            "graphical_abstract_section" => NodeKind::GraphicalAbstractSection,
            "footnotes_section" => NodeKind::FootnotesSection,
            "bibliography_section" => NodeKind::BibliographySection,
            "paragraph" => NodeKind::Paragraph,
            "text" => NodeKind::Text,
            "figure_element" => NodeKind::FigureElement,
            "figure" => NodeKind::Figure,
            "figcaption" => NodeKind::Figcaption,
            "table_element" => NodeKind::TableElement,
            "table" => NodeKind::Table,
            "table_row" => NodeKind::TableRow,
            "table_cell" => NodeKind::TableCell,
            "table_colgroup" => NodeKind::TableColgroup,
            "table_element_footer" => NodeKind::TableElementFooter,
            "equation_element" => NodeKind::EquationElement,
            "equation" => NodeKind::Equation,
            "listing_element" => NodeKind::ListingElement,
            "listing" => NodeKind::Listing,
            "bullet_list" => NodeKind::BulletList,
            "ordered_list" => NodeKind::OrderedList,
            "list_item" => NodeKind::ListItem,
            "footnotes_element" => NodeKind::FootnotesElement,
            "footnote" => NodeKind::Footnote,
            "inline_footnote" => NodeKind::InlineFootnote,
            "cross_reference" => NodeKind::CrossReference,
            "citation" => NodeKind::Citation,
            "inline_equation" => NodeKind::InlineEquation,
            "hard_break" => NodeKind::HardBreak,
            "placeholder" => NodeKind::Placeholder,
            other => NodeKind::Other(other.to_string()),
        }
    }

    /// Leaf nodes occupy a single position and never hold content
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            NodeKind::Figure
                | NodeKind::Equation
                | NodeKind::Listing
                | NodeKind::TableColgroup
                | NodeKind::InlineFootnote
                | NodeKind::CrossReference
                | NodeKind::Citation
                | NodeKind::InlineEquation
                | NodeKind::HardBreak
                | NodeKind::Placeholder
        )
    }

    pub fn is_list(&self) -> bool {
        matches!(self, NodeKind::BulletList | NodeKind::OrderedList)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        if name.is_empty() {
            return Err(de::Error::custom("node type must not be empty"));
        }
        Ok(NodeKind::from_name(&name))
    }
}

/// Inline mark (emphasis, links, comment anchors...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Attrs,
}

/// A document tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: NodeKind,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Attrs,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attrs: Attrs::new(),
            content: Vec::new(),
            text: None,
            marks: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(NodeKind::Text)
        }
    }

    /// Parse a node from its native JSON form
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        Node::deserialize(value)
    }

    pub fn to_json(&self) -> Value {
        // Serializing plain maps, strings and vectors cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_content(mut self, content: Vec<Node>) -> Self {
        self.content = content;
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.content.push(child);
        self
    }

    pub fn is(&self, kind: &NodeKind) -> bool {
        &self.kind == kind
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn is_leaf(&self) -> bool {
        self.is_text() || self.kind.is_leaf()
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }

    /// The node's `id` attribute, when it has a non-empty one
    pub fn id(&self) -> Option<&str> {
        self.attr_str("id").filter(|id| !id.is_empty())
    }

    /// String items of an array attribute; non-string entries are skipped
    pub fn attr_strings(&self, key: &str) -> Vec<String> {
        match self.attrs.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn child_count(&self) -> usize {
        self.content.len()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.content.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.content.first()
    }

    fn text_len(&self) -> usize {
        self.text.as_deref().map(|t| t.chars().count()).unwrap_or(0)
    }

    /// Size of the node's content in positions
    pub fn content_size(&self) -> usize {
        if self.is_text() {
            return self.text_len();
        }
        self.content.iter().map(Node::node_size).sum()
    }

    /// Number of positions the node occupies in its parent
    pub fn node_size(&self) -> usize {
        if self.is_text() {
            self.text_len()
        } else if self.kind.is_leaf() {
            1
        } else {
            self.content_size() + 2
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in &self.content {
            child.collect_text(out);
        }
    }

    /// Attributes with the tracked-change records removed
    pub fn attrs_without_tracking(&self) -> Attrs {
        let mut attrs = self.attrs.clone();
        attrs.remove(DATA_TRACKED);
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_sizes() {
        let paragraph = Node::new(NodeKind::Paragraph).with_content(vec![
            Node::text("Hello"),
            Node::new(NodeKind::InlineFootnote),
        ]);

        assert_eq!(paragraph.content_size(), 6);
        assert_eq!(paragraph.node_size(), 8);
        assert_eq!(Node::new(NodeKind::Figure).node_size(), 1);
        assert_eq!(Node::new(NodeKind::Paragraph).node_size(), 2);
    }

    #[test]
    fn test_json_round_trip_keeps_unknown_types() {
        let value = json!({
            "type": "manuscript",
            "attrs": { "id": "MPManuscript:1" },
            "content": [
                { "type": "keywords_element", "attrs": { "id": "kw" } },
                { "type": "paragraph", "content": [{ "type": "text", "text": "Hi" }] }
            ]
        });

        let node = Node::from_json(&value).unwrap();
        assert_eq!(node.content[0].kind, NodeKind::Other("keywords_element".into()));
        assert_eq!(node.to_json(), value);
    }

    #[test]
    fn test_id_ignores_empty_strings() {
        let node = Node::new(NodeKind::Figure).with_attr("id", "");
        assert_eq!(node.id(), None);

        let node = Node::new(NodeKind::Figure).with_attr("id", "MPFigure:1");
        assert_eq!(node.id(), Some("MPFigure:1"));
    }
}
