//! # Review
//!
//! Reviewers first set the status of change records, then finalize the
//! review. Finalization is the only operation that shrinks a change log:
//!
//! | operation | accepted        | rejected          |
//! |-----------|-----------------|-------------------|
//! | insert    | drop record     | remove node       |
//! | delete    | remove node     | drop record       |
//! | set_attrs | drop record     | restore oldAttrs  |
//!
//! Pending records are left untouched. Both operations produce untracked
//! transactions.

use crate::record::{ChangeLog, ChangeOperation, ChangeStatus};
use manuscript_model::{Attrs, ModelResult, Node, Transaction};
use tracing::{debug, info, instrument};

/// Set the status of every record whose id is in `change_ids`
#[instrument(skip(doc, change_ids), fields(changes = change_ids.len()))]
pub fn set_change_status(
    doc: &Node,
    change_ids: &[String],
    status: ChangeStatus,
    at: i64,
) -> ModelResult<Transaction> {
    let mut updates: Vec<(usize, Attrs)> = Vec::new();
    doc.descendants(|node, pos, _| {
        let mut log = ChangeLog::of(node);
        if log.set_status(change_ids, status, at) > 0 {
            let mut attrs = node.attrs.clone();
            log.write_to(&mut attrs);
            updates.push((pos, attrs));
        }
        true
    });

    let mut tr = Transaction::new(doc.clone());
    tr.skip_tracking();
    for (pos, attrs) in updates {
        tr.set_node_attrs(pos, attrs)?;
    }

    debug!(updated = tr.steps().len(), status = %status, "Updated change status");
    Ok(tr)
}

enum Resolution {
    Remove,
    Update(Attrs),
}

fn resolve(node: &Node) -> Option<Resolution> {
    let mut log = ChangeLog::of(node);
    if !log.any(|r| r.status != ChangeStatus::Pending) {
        return None;
    }

    let remove = log.any(|r| {
        r.is(ChangeOperation::Insert, ChangeStatus::Rejected)
            || r.is(ChangeOperation::Delete, ChangeStatus::Accepted)
    });
    if remove {
        return Some(Resolution::Remove);
    }

    let restored = log
        .iter()
        .filter(|r| r.operation == ChangeOperation::SetAttrs && r.status != ChangeStatus::Pending)
        .max_by_key(|r| r.status_update_at)
        .filter(|r| r.status == ChangeStatus::Rejected)
        .and_then(|r| r.old_attrs.clone());

    log.retain(|r| r.status == ChangeStatus::Pending);
    let mut attrs = restored.unwrap_or_else(|| node.attrs_without_tracking());
    log.write_to(&mut attrs);
    Some(Resolution::Update(attrs))
}

/// Apply every accepted and rejected change and clear their records
#[instrument(skip(doc))]
pub fn finalize_review(doc: &Node) -> ModelResult<Transaction> {
    let mut resolutions: Vec<(usize, Resolution)> = Vec::new();
    doc.descendants(|node, pos, _| match resolve(node) {
        Some(Resolution::Remove) => {
            resolutions.push((pos, Resolution::Remove));
            false
        }
        Some(resolution) => {
            resolutions.push((pos, resolution));
            true
        }
        None => true,
    });

    let mut tr = Transaction::new(doc.clone());
    tr.skip_tracking();

    let mut removed = 0;
    let mut updated = 0;
    // Back to front so earlier positions stay valid
    for (pos, resolution) in resolutions.into_iter().rev() {
        match resolution {
            Resolution::Remove => {
                let size = tr.doc().node_at(pos).map(Node::node_size).unwrap_or(0);
                tr.delete(pos, pos + size)?;
                removed += 1;
            }
            Resolution::Update(attrs) => {
                tr.set_node_attrs(pos, attrs)?;
                updated += 1;
            }
        }
    }

    info!(removed, updated, "Finalized review");
    Ok(tr)
}
