//! # Word and Character Statistics
//!
//! Counting runs off the edit path. The [`StatisticsWorker`] owns at most one
//! pending task: a new request aborts the previous one, waits out the
//! debounce window and publishes its report on a watch channel.

use manuscript_model::Node;
use manuscript_track_changes::is_hidden;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeStatistics {
    pub text: String,
    pub words: usize,
    pub characters: usize,
}

impl NodeStatistics {
    pub fn of(node: &Node) -> Self {
        let text = build_text(node);
        Self {
            words: count_words(&text),
            characters: count_characters(&text),
            text,
        }
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn count_characters(text: &str) -> usize {
    text.chars().count()
}

/// Visible text of a node, one line per text block
pub fn build_text(node: &Node) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out.truncate(out.trim_end_matches('\n').len());
    out
}

fn collect_text(node: &Node, out: &mut String) {
    for child in &node.content {
        if is_hidden(child) {
            continue;
        }
        match &child.text {
            Some(text) => out.push_str(text),
            None => {
                collect_text(child, out);
                if child.content.iter().any(Node::is_text) {
                    out.push('\n');
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountBounds {
    #[serde(default)]
    pub minimum: Option<usize>,
    #[serde(default)]
    pub maximum: Option<usize>,
}

impl CountBounds {
    pub fn is_set(&self) -> bool {
        self.minimum.is_some() || self.maximum.is_some()
    }
}

/// Active count requirements of a manuscript or section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountRequirements {
    #[serde(default)]
    pub words: CountBounds,
    #[serde(default)]
    pub characters: CountBounds,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequirementAlerts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characters: Option<String>,
}

impl RequirementAlerts {
    pub fn is_empty(&self) -> bool {
        self.words.is_none() && self.characters.is_none()
    }
}

/// `12345` → `"12,345"`
fn format_count(count: usize) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn alert(node_type: &str, count: usize, bounds: &CountBounds, unit: &str) -> Option<String> {
    // A violated minimum wins over a violated maximum
    if let Some(minimum) = bounds.minimum.filter(|&min| count < min) {
        return Some(format!(
            "The {node_type} should have a minimum of {} {unit}",
            format_count(minimum)
        ));
    }
    bounds.maximum.filter(|&max| count > max).map(|maximum| {
        format!(
            "The {node_type} should have a maximum of {} {unit}",
            format_count(maximum)
        )
    })
}

pub fn build_requirement_alerts(
    node_type: &str,
    statistics: &NodeStatistics,
    requirements: &CountRequirements,
) -> RequirementAlerts {
    RequirementAlerts {
        words: alert(node_type, statistics.words, &requirements.words, "words"),
        characters: alert(
            node_type,
            statistics.characters,
            &requirements.characters,
            "characters",
        ),
    }
}

/// Published result of one statistics request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    /// Sequence number of the request that produced it
    pub request: u64,
    pub statistics: NodeStatistics,
    pub alerts: RequirementAlerts,
}

/// Debounced background counter with cancel-on-supersede
#[derive(Debug)]
pub struct StatisticsWorker {
    debounce: Duration,
    pending: Option<JoinHandle<()>>,
    requests: u64,
    tx: Arc<watch::Sender<Option<StatisticsReport>>>,
}

impl StatisticsWorker {
    pub fn new(debounce: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            debounce,
            pending: None,
            requests: 0,
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StatisticsReport>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<StatisticsReport> {
        self.tx.borrow().clone()
    }

    /// Count `node` after the debounce window, superseding any pending request.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&mut self, node: Node, requirements: CountRequirements) -> u64 {
        self.cancel();
        self.requests += 1;

        let request = self.requests;
        let debounce = self.debounce;
        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;

            let statistics = NodeStatistics::of(&node);
            let alerts = build_requirement_alerts(node.kind.name(), &statistics, &requirements);
            debug!(
                request,
                words = statistics.words,
                characters = statistics.characters,
                "Counted statistics"
            );
            tx.send_replace(Some(StatisticsReport {
                request,
                statistics,
                alerts,
            }));
        }));
        request
    }

    /// Abort the pending request, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            if !handle.is_finished() {
                trace!(request = self.requests, "Superseding statistics request");
            }
            handle.abort();
        }
    }
}

impl Drop for StatisticsWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_model::{NodeKind, DATA_TRACKED};
    use serde_json::json;

    fn section() -> Node {
        Node::new(NodeKind::Section).with_content(vec![
            Node::new(NodeKind::SectionTitle).with_child(Node::text("Intro")),
            Node::new(NodeKind::Paragraph).with_content(vec![
                Node::text("Hello brave "),
                Node::text("deleted ").with_attr(
                    DATA_TRACKED,
                    json!([{ "operation": "delete", "status": "pending" }]),
                ),
                Node::text("new world"),
            ]),
        ])
    }

    #[test]
    fn test_build_text_skips_hidden_content() {
        let stats = NodeStatistics::of(&section());
        assert_eq!(stats.text, "Intro\nHello brave new world");
        assert_eq!(stats.words, 5);
        assert_eq!(stats.characters, 27);
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(7), "7");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_requirement_alerts() {
        let stats = NodeStatistics {
            text: String::new(),
            words: 1500,
            characters: 20,
        };
        let requirements = CountRequirements {
            words: CountBounds {
                minimum: None,
                maximum: Some(1000),
            },
            characters: CountBounds {
                minimum: Some(50),
                maximum: Some(10),
            },
        };

        let alerts = build_requirement_alerts("section", &stats, &requirements);
        assert_eq!(
            alerts.words.as_deref(),
            Some("The section should have a maximum of 1,000 words")
        );
        assert_eq!(
            alerts.characters.as_deref(),
            Some("The section should have a minimum of 50 characters")
        );

        let none = build_requirement_alerts("section", &stats, &CountRequirements::default());
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_worker_publishes_latest_request_only() {
        let mut worker = StatisticsWorker::new(Duration::from_millis(20));
        let mut rx = worker.subscribe();

        worker.request(
            Node::new(NodeKind::Paragraph).with_child(Node::text("stale")),
            CountRequirements::default(),
        );
        let latest = worker.request(section(), CountRequirements::default());

        rx.changed().await.unwrap();
        let report = rx.borrow().clone().unwrap();
        assert_eq!(report.request, latest);
        assert_eq!(report.statistics.words, 5);
        assert_eq!(worker.latest(), Some(report));
    }

    #[tokio::test]
    async fn test_cancelled_request_never_publishes() {
        let mut worker = StatisticsWorker::new(Duration::from_millis(10));
        worker.request(section(), CountRequirements::default());
        worker.cancel();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(worker.latest().is_none());
    }
}
