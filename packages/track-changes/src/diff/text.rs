//! Character-level diff of text leaves.

use serde::Serialize;

/// Largest LCS table computed before falling back to a plain replacement
const MAX_TABLE_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "text", rename_all = "camelCase")]
pub enum TextOp {
    Equal(String),
    Delete(String),
    Insert(String),
}

impl TextOp {
    fn text(&self) -> &str {
        match self {
            TextOp::Equal(t) | TextOp::Delete(t) | TextOp::Insert(t) => t,
        }
    }

    fn text_mut(&mut self) -> &mut String {
        match self {
            TextOp::Equal(t) | TextOp::Delete(t) | TextOp::Insert(t) => t,
        }
    }

    fn same_kind(&self, other: &TextOp) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TextDelta {
    /// Whole-value replacement for runs shorter than the diff threshold
    Replace { old: String, new: String },
    Ops { ops: Vec<TextOp> },
}

impl TextDelta {
    /// The text before the change
    pub fn old_text(&self) -> String {
        match self {
            TextDelta::Replace { old, .. } => old.clone(),
            TextDelta::Ops { ops } => ops
                .iter()
                .filter(|op| !matches!(op, TextOp::Insert(_)))
                .map(TextOp::text)
                .collect(),
        }
    }

    /// The text after the change
    pub fn new_text(&self) -> String {
        match self {
            TextDelta::Replace { new, .. } => new.clone(),
            TextDelta::Ops { ops } => ops
                .iter()
                .filter(|op| !matches!(op, TextOp::Delete(_)))
                .map(TextOp::text)
                .collect(),
        }
    }
}

/// Diff two strings.
///
/// When either side is shorter than `min_length` characters the change is a
/// single [`TextDelta::Replace`].
pub fn diff_text(old: &str, new: &str, min_length: usize) -> TextDelta {
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();
    if a.len() < min_length || b.len() < min_length {
        return TextDelta::Replace {
            old: old.to_string(),
            new: new.to_string(),
        };
    }

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mut ops = vec![TextOp::Equal(a[..prefix].iter().collect())];
    ops.extend(diff_middle(
        &a[prefix..a.len() - suffix],
        &b[prefix..b.len() - suffix],
    ));
    ops.push(TextOp::Equal(a[a.len() - suffix..].iter().collect()));

    TextDelta::Ops { ops: normalize(ops) }
}

fn diff_middle(a: &[char], b: &[char]) -> Vec<TextOp> {
    if a.is_empty() || b.is_empty() || a.len() * b.len() > MAX_TABLE_CELLS {
        return vec![
            TextOp::Delete(a.iter().collect()),
            TextOp::Insert(b.iter().collect()),
        ];
    }

    // lengths[i][j] = LCS length of a[i..] and b[j..]
    let width = b.len() + 1;
    let mut lengths = vec![0u32; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lengths[i * width + j] = if a[i] == b[j] {
                lengths[(i + 1) * width + j + 1] + 1
            } else {
                lengths[(i + 1) * width + j].max(lengths[i * width + j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            ops.push(TextOp::Equal(a[i].to_string()));
            i += 1;
            j += 1;
        } else if lengths[(i + 1) * width + j] >= lengths[i * width + j + 1] {
            ops.push(TextOp::Delete(a[i].to_string()));
            i += 1;
        } else {
            ops.push(TextOp::Insert(b[j].to_string()));
            j += 1;
        }
    }
    ops.extend(a[i..].iter().map(|c| TextOp::Delete(c.to_string())));
    ops.extend(b[j..].iter().map(|c| TextOp::Insert(c.to_string())));
    ops
}

/// Merge adjacent operations of the same kind and drop empty ones
fn normalize(ops: Vec<TextOp>) -> Vec<TextOp> {
    let mut normalized: Vec<TextOp> = Vec::with_capacity(ops.len());
    for op in ops {
        if op.text().is_empty() {
            continue;
        }
        match normalized.last_mut() {
            Some(last) if last.same_kind(&op) => last.text_mut().push_str(op.text()),
            _ => normalized.push(op),
        }
    }
    normalized
}
