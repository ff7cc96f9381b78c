//! # Change Records
//!
//! Every tracked edit leaves a [`ChangeRecord`] in the `dataTracked`
//! attribute of the node it touched. The records of one node form a
//! [`ChangeLog`]: an append-only sequence that only review finalization is
//! allowed to shrink.
//!
//! Parsing is lenient. A record with an unknown operation or status, or with
//! a missing field, is dropped so that every predicate reads it as
//! "not tracked".

use manuscript_model::{Attrs, Node, DATA_TRACKED};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Insert,
    Delete,
    SetAttrs,
}

impl ChangeOperation {
    /// Class name used when rendering the change
    pub fn class_name(&self) -> &'static str {
        match self {
            ChangeOperation::Insert => "inserted",
            ChangeOperation::Delete => "deleted",
            ChangeOperation::SetAttrs => "set_attrs",
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeOperation::Insert => "insert",
            ChangeOperation::Delete => "delete",
            ChangeOperation::SetAttrs => "set_attrs",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Pending,
    Accepted,
    Rejected,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeStatus::Pending => "pending",
            ChangeStatus::Accepted => "accepted",
            ChangeStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// One authored edit on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    #[serde(default)]
    pub id: String,
    pub operation: ChangeOperation,
    pub status: ChangeStatus,
    #[serde(rename = "authorID", default)]
    pub author_id: String,
    /// Milliseconds since the Unix epoch
    #[serde(default, deserialize_with = "timestamp")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "timestamp")]
    pub status_update_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_attrs: Option<Attrs>,
}

impl ChangeRecord {
    pub fn pending(
        id: impl Into<String>,
        operation: ChangeOperation,
        author_id: impl Into<String>,
        at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            operation,
            status: ChangeStatus::Pending,
            author_id: author_id.into(),
            created_at: at,
            status_update_at: at,
            old_attrs: None,
        }
    }

    pub fn with_old_attrs(mut self, old_attrs: Attrs) -> Self {
        self.old_attrs = Some(old_attrs);
        self
    }

    pub fn is(&self, operation: ChangeOperation, status: ChangeStatus) -> bool {
        self.operation == operation && self.status == status
    }
}

// Timestamps written by other clients may be floating point milliseconds
fn timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        _ => 0,
    })
}

/// The ordered change records of one node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeLog {
    records: Vec<ChangeRecord>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the log stored on a node
    pub fn of(node: &Node) -> Self {
        node.attr(DATA_TRACKED)
            .map(Self::from_value)
            .unwrap_or_default()
    }

    pub fn from_attrs(attrs: &Attrs) -> Self {
        attrs
            .get(DATA_TRACKED)
            .map(Self::from_value)
            .unwrap_or_default()
    }

    pub fn from_value(value: &Value) -> Self {
        let Value::Array(items) = value else {
            return Self::default();
        };
        let records = items
            .iter()
            .filter_map(|item| ChangeRecord::deserialize(item).ok())
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&ChangeRecord> {
        self.records.last()
    }

    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    pub fn any(&self, pred: impl Fn(&ChangeRecord) -> bool) -> bool {
        self.records.iter().any(pred)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    /// The most recently updated record of an operation.
    ///
    /// Records with equal `statusUpdateAt` resolve to the one appended last.
    pub fn latest(&self, operation: ChangeOperation) -> Option<&ChangeRecord> {
        self.records
            .iter()
            .filter(|r| r.operation == operation)
            .max_by_key(|r| r.status_update_at)
    }

    pub(crate) fn set_status(&mut self, ids: &[String], status: ChangeStatus, at: i64) -> usize {
        let mut updated = 0;
        for record in &mut self.records {
            if ids.iter().any(|id| id == &record.id) && record.status != status {
                record.status = status;
                record.status_update_at = at;
                updated += 1;
            }
        }
        updated
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&ChangeRecord) -> bool) {
        self.records.retain(f);
    }

    pub fn to_value(&self) -> Value {
        Value::Array(
            self.records
                .iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect(),
        )
    }

    /// Store the log in `attrs`, removing the attribute when the log is empty
    pub fn write_to(&self, attrs: &mut Attrs) {
        if self.records.is_empty() {
            attrs.remove(DATA_TRACKED);
        } else {
            attrs.insert(DATA_TRACKED.to_string(), self.to_value());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_model::NodeKind;
    use serde_json::json;

    #[test]
    fn test_parse_camel_case_record() {
        let node = Node::new(NodeKind::Paragraph).with_attr(
            DATA_TRACKED,
            json!([{
                "id": "c1",
                "operation": "set_attrs",
                "status": "rejected",
                "authorID": "user-1",
                "createdAt": 10,
                "statusUpdateAt": 20.0,
                "oldAttrs": { "x": 1 }
            }]),
        );

        let log = ChangeLog::of(&node);
        assert_eq!(log.len(), 1);
        let record = &log.records()[0];
        assert_eq!(record.author_id, "user-1");
        assert_eq!(record.status_update_at, 20);
        assert_eq!(record.old_attrs.as_ref().unwrap()["x"], json!(1));
    }

    #[test]
    fn test_malformed_records_are_dropped() {
        let value = json!([
            { "operation": "rename", "status": "pending" },
            { "operation": "delete", "status": "maybe" },
            { "status": "pending" },
            "garbage",
            { "operation": "insert", "status": "pending" }
        ]);

        let log = ChangeLog::from_value(&value);
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].operation, ChangeOperation::Insert);
        assert!(ChangeLog::from_value(&json!({ "operation": "insert" })).is_empty());
    }

    #[test]
    fn test_latest_prefers_last_on_ties() {
        let mut log = ChangeLog::new();
        log.push(ChangeRecord::pending("a", ChangeOperation::SetAttrs, "u", 5));
        log.push(ChangeRecord::pending("b", ChangeOperation::SetAttrs, "u", 5));
        log.push(ChangeRecord::pending("c", ChangeOperation::Insert, "u", 9));

        assert_eq!(log.latest(ChangeOperation::SetAttrs).unwrap().id, "b");
    }

    #[test]
    fn test_write_to_removes_empty_log() {
        let mut attrs = Attrs::new();
        attrs.insert(DATA_TRACKED.into(), json!([]));
        ChangeLog::new().write_to(&mut attrs);
        assert!(!attrs.contains_key(DATA_TRACKED));

        let mut log = ChangeLog::new();
        log.push(ChangeRecord::pending("a", ChangeOperation::Delete, "u", 1));
        log.write_to(&mut attrs);
        assert_eq!(attrs[DATA_TRACKED][0]["operation"], json!("delete"));
        assert_eq!(attrs[DATA_TRACKED][0]["authorID"], json!("u"));
        assert!(attrs[DATA_TRACKED][0].get("oldAttrs").is_none());
    }
}
