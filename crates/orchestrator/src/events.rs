use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const EVENT_CAPACITY: usize = 10;

/// One entry of an NSR's `operational_events` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsEvent {
    pub timestamp: String,
    pub event: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The most recent [`EVENT_CAPACITY`] lifecycle events of an NSR.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: VecDeque<NsEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: &str, description: &str, details: Option<String>) {
        if self.entries.len() == EVENT_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(NsEvent {
            timestamp: now_rfc3339(),
            event: event.to_string(),
            description: description.to_string(),
            details,
        });
    }

    pub fn entries(&self) -> Vec<NsEvent> {
        self.entries.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&NsEvent> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_ten_most_recent() {
        let mut log = EventLog::new();
        for i in 0..13 {
            log.record(&format!("e{}", i), "d", None);
        }
        let entries = log.entries();
        assert_eq!(entries.len(), EVENT_CAPACITY);
        assert_eq!(entries[0].event, "e3");
        assert_eq!(log.last().unwrap().event, "e12");
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let mut log = EventLog::new();
        log.record("ns-failed", "boom", Some("vm error".into()));
        let entry = log.last().unwrap();
        assert!(OffsetDateTime::parse(&entry.timestamp, &Rfc3339).is_ok());
        assert_eq!(entry.details.as_deref(), Some("vm error"));
    }
}
