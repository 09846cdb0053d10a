//! Recipient set computation for a single event

use serde::Serialize;
use std::sync::Arc;

use super::resolver::{NameResolver, Resolution};
use super::RosterSnapshot;
use crate::metrics;
use crate::parser::ParsedCourseRecord;

/// One resolved recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    /// Messaging address
    pub address: String,
    /// Roster name the address was resolved through (first one wins)
    pub name: String,
}

/// Address-unique, ordered set of recipients for one event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecipientSet {
    members: Vec<Recipient>,
    unresolved: Vec<String>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a recipient; returns false if the address is already present
    pub fn insert(&mut self, address: impl Into<String>, name: impl Into<String>) -> bool {
        let address = address.into();
        if self.contains(&address) {
            return false;
        }
        self.members.push(Recipient {
            address,
            name: name.into(),
        });
        true
    }

    pub fn contains(&self, address: &str) -> bool {
        self.members.iter().any(|r| r.address == address)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recipient> {
        self.members.iter()
    }

    /// Addresses in insertion order
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|r| r.address.as_str())
    }

    /// Names that could not be resolved
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    fn mark_unresolved(&mut self, name: &str) {
        if !self.unresolved.iter().any(|n| n == name) {
            self.unresolved.push(name.to_string());
        }
    }
}

/// Combines the calendar owner and the parsed instructors into a recipient set
#[derive(Clone)]
pub struct RecipientResolver {
    names: Arc<NameResolver>,
}

impl RecipientResolver {
    pub fn new(names: Arc<NameResolver>) -> Self {
        Self { names }
    }

    pub fn name_resolver(&self) -> &Arc<NameResolver> {
        &self.names
    }

    /// Resolve owner, teachers and assistants against one snapshot
    ///
    /// Pure with respect to the snapshot: the same inputs always give the
    /// same set.
    pub fn resolve_with(
        &self,
        snapshot: &RosterSnapshot,
        owner: &str,
        record: &ParsedCourseRecord,
    ) -> RecipientSet {
        let mut set = RecipientSet::new();

        self.add(&mut set, snapshot, owner, "owner");
        for teacher in &record.teachers {
            self.add(&mut set, snapshot, teacher, "teacher");
        }
        for assistant in &record.assistants {
            self.add(&mut set, snapshot, assistant, "assistant");
        }

        set
    }

    /// Resolve only the calendar owner against one snapshot
    pub fn resolve_owner_with(&self, snapshot: &RosterSnapshot, owner: &str) -> RecipientSet {
        let mut set = RecipientSet::new();
        self.add(&mut set, snapshot, owner, "owner");
        set
    }

    /// Resolve against the current roster snapshot
    pub async fn resolve(&self, owner: &str, record: &ParsedCourseRecord) -> RecipientSet {
        let snapshot = self.names.snapshot(false).await;
        self.resolve_with(&snapshot, owner, record)
    }

    /// Resolve only the owner against the current roster snapshot
    pub async fn resolve_owner(&self, owner: &str) -> RecipientSet {
        let snapshot = self.names.snapshot(false).await;
        self.resolve_owner_with(&snapshot, owner)
    }

    fn add(&self, set: &mut RecipientSet, snapshot: &RosterSnapshot, name: &str, role: &str) {
        if name.trim().is_empty() {
            return;
        }

        match self.names.resolve_in(snapshot, name) {
            Resolution::Exact {
                canonical_name,
                address,
            }
            | Resolution::Fuzzy {
                canonical_name,
                address,
                ..
            } => {
                if !set.insert(address.as_str(), canonical_name) {
                    tracing::debug!(candidate = %name, role, recipient = %address, "Recipient already in set");
                }
            }
            Resolution::Unresolved { best_score } => {
                metrics::record_unresolved_name();
                tracing::warn!(
                    candidate = %name,
                    role,
                    best_score = format!("{best_score:.2}"),
                    "Name not found in roster"
                );
                set.mark_unresolved(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{ResolverConfig, RosterRow, RosterSource};
    use crate::utils::error::FetchError;
    use async_trait::async_trait;
    use chrono::Utc;

    struct NoRoster;

    #[async_trait]
    impl RosterSource for NoRoster {
        async fn fetch_roster(&self) -> Result<Vec<RosterRow>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn resolver() -> RecipientResolver {
        RecipientResolver::new(Arc::new(NameResolver::new(
            Arc::new(NoRoster),
            ResolverConfig::default(),
        )))
    }

    fn snapshot() -> RosterSnapshot {
        RosterSnapshot::from_rows(
            vec![
                RosterRow::new("TIM", "U-tim"),
                RosterRow::new("BOB", "U-bob"),
                RosterRow::new("ALICE", "U-alice"),
            ],
            Utc::now(),
        )
    }

    fn record(teachers: &[&str], assistants: &[&str]) -> ParsedCourseRecord {
        ParsedCourseRecord {
            date: "2025/01/01".to_string(),
            time_range: "0900-1000".to_string(),
            class_name: "ABC".to_string(),
            teachers: teachers.iter().map(|s| s.to_string()).collect(),
            teacher_link: None,
            assistants: assistants.iter().map(|s| s.to_string()).collect(),
            assistant_link: None,
            lesson_summary: "Algebra".to_string(),
            lesson_link: None,
        }
    }

    #[test]
    fn test_owner_and_teacher_collapse() {
        let set = resolver().resolve_with(&snapshot(), "TIM", &record(&["TIM"], &["BOB"]));
        assert_eq!(set.len(), 2);
        let addresses: Vec<&str> = set.addresses().collect();
        assert_eq!(addresses, vec!["U-tim", "U-bob"]);
    }

    #[test]
    fn test_spellings_collapse_by_address() {
        let set = resolver().resolve_with(&snapshot(), "tim", &record(&["Tim", "TIMM"], &[]));
        assert_eq!(set.len(), 1);
        assert!(set.contains("U-tim"));
    }

    #[test]
    fn test_unresolved_names_are_excluded() {
        let set = resolver().resolve_with(
            &snapshot(),
            "Marketing",
            &record(&["ZORRO", "ALICE"], &[]),
        );
        let addresses: Vec<&str> = set.addresses().collect();
        assert_eq!(addresses, vec!["U-alice"]);
        assert_eq!(set.unresolved(), &["Marketing".to_string(), "ZORRO".to_string()]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = resolver();
        let snapshot = snapshot();
        let record = record(&["TIM", "ALICE"], &["BOB"]);
        let first = resolver.resolve_with(&snapshot, "BOB", &record);
        let second = resolver.resolve_with(&snapshot, "BOB", &record);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_owner_only() {
        let set = resolver().resolve_owner_with(&snapshot(), "alice");
        assert_eq!(set.addresses().collect::<Vec<_>>(), vec!["U-alice"]);
        assert!(resolver().resolve_owner_with(&snapshot(), "").is_empty());
    }

    #[test]
    fn test_set_insert_dedups() {
        let mut set = RecipientSet::new();
        assert!(set.insert("U1", "TIM"));
        assert!(!set.insert("U1", "TIMOTHY"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().map(|r| r.name.as_str()), Some("TIM"));
    }
}
