//! In-memory record of reminders already delivered in this run

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Delivered (event, recipient) pairs with their dispatch time
///
/// Lives only as long as the process; a restart may resend reminders for
/// events still inside the lookahead window.
#[derive(Debug, Default)]
pub struct NotificationLedger {
    records: HashMap<(String, String), DateTime<Utc>>,
}

impl NotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_notified(&self, event_id: &str, recipient: &str) -> bool {
        self.records
            .contains_key(&(event_id.to_string(), recipient.to_string()))
    }

    /// Record a delivery; an existing record keeps its original time
    pub fn record(&mut self, event_id: &str, recipient: &str, at: DateTime<Utc>) {
        self.records
            .entry((event_id.to_string(), recipient.to_string()))
            .or_insert(at);
    }

    /// Drop records dispatched before `cutoff`; returns how many were dropped
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, at| *at >= cutoff);
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_record_and_lookup() {
        let mut ledger = NotificationLedger::new();
        let now = Utc::now();

        assert!(!ledger.is_notified("evt-1", "U1"));
        ledger.record("evt-1", "U1", now);
        assert!(ledger.is_notified("evt-1", "U1"));
        assert!(!ledger.is_notified("evt-1", "U2"));
        assert!(!ledger.is_notified("evt-2", "U1"));

        ledger.record("evt-1", "U1", now + Duration::minutes(5));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_prune_before() {
        let mut ledger = NotificationLedger::new();
        let now = Utc::now();
        ledger.record("old", "U1", now - Duration::hours(25));
        ledger.record("new", "U1", now - Duration::hours(1));

        assert_eq!(ledger.prune_before(now - Duration::hours(24)), 1);
        assert!(!ledger.is_notified("old", "U1"));
        assert!(ledger.is_notified("new", "U1"));
        assert!(!ledger.is_empty());
    }
}
