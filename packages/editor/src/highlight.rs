//! Transient marker highlights.
//!
//! Purely presentational: highlights live next to the document, never in it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct MarkerHighlights {
    duration: Duration,
    active: HashMap<String, Instant>,
}

impl MarkerHighlights {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            active: HashMap::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Highlight the markers of a footnote, restarting the timer if already lit
    pub fn highlight(&mut self, footnote_id: &str, now: Instant) {
        self.active.insert(footnote_id.to_string(), now + self.duration);
    }

    pub fn is_highlighted(&self, footnote_id: &str, now: Instant) -> bool {
        self.active
            .get(footnote_id)
            .is_some_and(|expires| now < *expires)
    }

    pub fn active_ids(&self, now: Instant) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .active
            .iter()
            .filter(|(_, expires)| now < **expires)
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of stored highlights, expired ones included
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Drop expired highlights, returning how many were removed
    pub fn clear_expired(&mut self, now: Instant) -> usize {
        let before = self.active.len();
        self.active.retain(|_, expires| now < *expires);
        before - self.active.len()
    }
}

impl Default for MarkerHighlights {
    fn default() -> Self {
        Self::new(Duration::from_millis(3000))
    }
}
