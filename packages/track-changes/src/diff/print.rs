use super::change_tree::{ChangeNode, ChangeTree, Delta};
use super::text::{TextDelta, TextOp};
use std::fmt::Write;

/// Render a change tree as an indented list, one line per entry.
///
/// ```text
/// · manuscript [$$index:0]
///   · section [MPSection:1] @0
///     ~ paragraph [MPParagraphElement:2] @1 id: "a" → "b"
///       ~ text [$$index:0] @2 "Hel[-l-]{+p+}o"
///   + figure_element [MPFigureElement:3] @40
///   - table_element [MPTableElement:4]
/// ```
pub fn print(tree: &ChangeTree) -> String {
    let mut out = String::new();
    print_node(&tree.root, 0, &mut out);
    out
}

fn print_node(node: &ChangeNode, depth: usize, out: &mut String) {
    let symbol = node.delta.as_ref().map(Delta::symbol).unwrap_or('·');
    let _ = write!(
        out,
        "{}{} {} [{}]",
        "  ".repeat(depth),
        symbol,
        node.kind,
        node.key
    );
    if let Some(pos) = node.pos {
        let _ = write!(out, " @{}", pos);
    }
    if let Some(Delta::Moved {
        from,
        to,
        from_parent,
    }) = &node.delta
    {
        match from_parent {
            Some(parent) => {
                let _ = write!(out, " moved from {}#{} to #{}", parent, from, to);
            }
            None => {
                let _ = write!(out, " moved #{} → #{}", from, to);
            }
        }
    }
    for attr in &node.attrs {
        let _ = write!(out, " {}: {} → {}", attr.key, show(&attr.old), show(&attr.new));
    }
    if let Some(text) = &node.text {
        let _ = write!(out, " \"{}\"", show_text(text));
    }
    out.push('\n');

    for child in &node.children {
        print_node(child, depth + 1, out);
    }
}

fn show(value: &Option<serde_json::Value>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "∅".to_string())
}

fn show_text(text: &TextDelta) -> String {
    match text {
        TextDelta::Replace { old, new } => format!("[-{}-]{{+{}+}}", old, new),
        TextDelta::Ops { ops } => ops
            .iter()
            .map(|op| match op {
                TextOp::Equal(t) => t.clone(),
                TextOp::Delete(t) => format!("[-{}-]", t),
                TextOp::Insert(t) => format!("{{+{}+}}", t),
            })
            .collect(),
    }
}
