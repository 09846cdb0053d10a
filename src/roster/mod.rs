//! Roster snapshot and identity resolution
//!
//! The roster maps human names to messaging recipient addresses. It lives in
//! an external spreadsheet-backed store and is cached here as an immutable
//! [`RosterSnapshot`]; the [`NameResolver`] swaps in a new snapshot when the
//! cache expires and keeps serving the old one when a refresh fails.
//!
//! # Resolution
//!
//! ```text
//! candidate ──normalize──▶ exact lookup ──hit──▶ address
//!                               │
//!                              miss
//!                               ▼
//!                  similarity vs every roster name
//!                               │
//!                 best ≥ threshold ? address : unresolved
//! ```

pub mod recipients;
pub mod resolver;
pub mod sheet;
pub mod similarity;

pub use recipients::{RecipientResolver, RecipientSet};
pub use resolver::{NameResolver, Resolution, ResolverConfig};
pub use sheet::{SheetConfig, SheetRosterSource};
pub use similarity::{SequenceRatio, Similarity};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::error::FetchError;
use crate::utils::normalize_whitespace;

/// Normalize a name for comparison: trimmed, single-spaced, uppercase
pub fn normalize_name(name: &str) -> String {
    normalize_whitespace(name).to_uppercase()
}

/// One row read from the roster store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub name: String,
    pub address: String,
}

impl RosterRow {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Cached roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    /// Normalized name
    pub canonical_name: String,
    /// Opaque recipient address
    pub address: String,
    /// When the snapshot holding this entry was fetched
    pub cached_at: DateTime<Utc>,
}

/// Immutable roster view, in store order
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    entries: Vec<RosterEntry>,
    index: HashMap<String, usize>,
    fetched_at: Option<DateTime<Utc>>,
}

impl RosterSnapshot {
    /// Build a snapshot from store rows
    ///
    /// Rows with a blank name or address are skipped. A name that appears
    /// more than once keeps its first position and takes the latest address.
    pub fn from_rows<I>(rows: I, fetched_at: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = RosterRow>,
    {
        let mut entries: Vec<RosterEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for row in rows {
            let canonical_name = normalize_name(&row.name);
            let address = row.address.trim().to_string();
            if canonical_name.is_empty() || address.is_empty() {
                continue;
            }

            match index.get(&canonical_name) {
                Some(&pos) => entries[pos].address = address,
                None => {
                    index.insert(canonical_name.clone(), entries.len());
                    entries.push(RosterEntry {
                        canonical_name,
                        address,
                        cached_at: fetched_at,
                    });
                }
            }
        }

        Self {
            entries,
            index,
            fetched_at: Some(fetched_at),
        }
    }

    /// Exact lookup by already-normalized name
    pub fn get(&self, canonical_name: &str) -> Option<&RosterEntry> {
        self.index.get(canonical_name).map(|&pos| &self.entries[pos])
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When the snapshot was fetched (`None` for the initial empty snapshot)
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }
}

/// Source of roster rows
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Fetch all roster rows
    async fn fetch_roster(&self) -> Result<Vec<RosterRow>, FetchError>;
}
