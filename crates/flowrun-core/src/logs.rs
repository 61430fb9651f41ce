//! Run log pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single event from a run's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Absolute position in the run's log. Defines the ordering.
    pub sequence: u64,
    /// When the event was recorded.
    pub date: DateTime<Utc>,
    /// Service-assigned event identifier.
    pub event_id: String,
    /// Event text.
    pub message_text: String,
    /// Event type (e.g. `info`, `warning`, `error`).
    pub event_type: String,
}

/// One page of a run's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPage {
    /// Entries in sequence order.
    pub entries: Vec<LogEntry>,
    /// Offset of the first entry.
    pub offset: u64,
    /// Total number of entries in the log at the time of the request.
    pub total_count: u64,
}

impl LogPage {
    /// Offset to request next.
    pub fn next_offset(&self) -> u64 {
        self.offset + self.entries.len() as u64
    }

    /// Whether entries remain after this page.
    pub fn has_more(&self) -> bool {
        !self.entries.is_empty() && self.next_offset() < self.total_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sequence: u64) -> LogEntry {
        LogEntry {
            sequence,
            date: Utc::now(),
            event_id: format!("evt-{sequence}"),
            message_text: "rows copied".into(),
            event_type: "info".into(),
        }
    }

    #[test]
    fn test_page_navigation() {
        let page = LogPage {
            entries: vec![entry(10), entry(11)],
            offset: 10,
            total_count: 15,
        };
        assert_eq!(page.next_offset(), 12);
        assert!(page.has_more());

        let last = LogPage {
            entries: vec![entry(13), entry(14)],
            offset: 13,
            total_count: 15,
        };
        assert!(!last.has_more());
    }

    #[test]
    fn test_empty_page_stops_paging() {
        let page = LogPage {
            entries: vec![],
            offset: 4,
            total_count: 10,
        };
        assert!(!page.has_more());
    }
}
