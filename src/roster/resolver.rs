//! Name resolver: exact lookup first, fuzzy similarity second

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::similarity::{SequenceRatio, Similarity};
use super::{normalize_name, RosterEntry, RosterSnapshot, RosterSource};
use crate::metrics;
use crate::utils::error::FetchError;

/// Resolver settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How long a fetched roster stays fresh
    pub refresh_interval: Duration,
    /// Minimum similarity for a fuzzy match to be accepted
    pub fuzzy_threshold: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(300),
            fuzzy_threshold: 0.6,
        }
    }
}

/// Outcome of resolving one candidate name
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Normalized candidate equals a roster name
    Exact {
        canonical_name: String,
        address: String,
    },
    /// Best similarity score reached the threshold
    Fuzzy {
        canonical_name: String,
        address: String,
        score: f64,
    },
    /// No acceptable match
    Unresolved { best_score: f64 },
}

impl Resolution {
    /// Resolved address, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Exact { address, .. } | Self::Fuzzy { address, .. } => Some(address),
            Self::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.address().is_some()
    }

    /// Short label of the resolution path
    pub fn path(&self) -> &'static str {
        match self {
            Self::Exact { .. } => "exact",
            Self::Fuzzy { .. } => "fuzzy",
            Self::Unresolved { .. } => "unresolved",
        }
    }
}

struct CacheState {
    snapshot: Arc<RosterSnapshot>,
    refreshed_at: Option<Instant>,
}

/// Maps free-text names to roster addresses
///
/// Holds the roster cache. Refresh failures are logged and the previous
/// snapshot keeps being served; resolution itself never fails.
pub struct NameResolver {
    source: Arc<dyn RosterSource>,
    similarity: Box<dyn Similarity>,
    config: ResolverConfig,
    cache: Mutex<CacheState>,
}

impl NameResolver {
    /// Create a resolver with the default similarity function
    pub fn new(source: Arc<dyn RosterSource>, config: ResolverConfig) -> Self {
        Self {
            source,
            similarity: Box::new(SequenceRatio),
            config,
            cache: Mutex::new(CacheState {
                snapshot: Arc::new(RosterSnapshot::default()),
                refreshed_at: None,
            }),
        }
    }

    /// Replace the similarity function
    pub fn with_similarity(mut self, similarity: Box<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Current roster snapshot, refreshed if stale or `force` is set
    pub async fn snapshot(&self, force: bool) -> Arc<RosterSnapshot> {
        let mut cache = self.cache.lock().await;

        let fresh = cache
            .refreshed_at
            .is_some_and(|at| at.elapsed() < self.config.refresh_interval);
        if fresh && !force {
            return Arc::clone(&cache.snapshot);
        }

        if let Err(e) = self.refresh(&mut cache).await {
            metrics::record_roster_refresh_failure();
            tracing::warn!(
                error = %e,
                cached_entries = cache.snapshot.len(),
                "Roster refresh failed, serving cached roster"
            );
        }

        Arc::clone(&cache.snapshot)
    }

    /// Force a refresh and report its outcome
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn reload(&self) -> Result<usize, FetchError> {
        let mut cache = self.cache.lock().await;
        self.refresh(&mut cache).await?;
        Ok(cache.snapshot.len())
    }

    async fn refresh(&self, cache: &mut CacheState) -> Result<(), FetchError> {
        let rows = self.source.fetch_roster().await?;
        let snapshot = RosterSnapshot::from_rows(rows, Utc::now());
        tracing::info!(entries = snapshot.len(), "Roster refreshed");
        cache.snapshot = Arc::new(snapshot);
        cache.refreshed_at = Some(Instant::now());
        Ok(())
    }

    /// Resolve a name against a given snapshot
    pub fn resolve_in(&self, snapshot: &RosterSnapshot, name: &str) -> Resolution {
        let candidate = normalize_name(name);
        if candidate.is_empty() {
            return Resolution::Unresolved { best_score: 0.0 };
        }

        if let Some(entry) = snapshot.get(&candidate) {
            return Resolution::Exact {
                canonical_name: entry.canonical_name.clone(),
                address: entry.address.clone(),
            };
        }

        let mut best: Option<(&RosterEntry, f64)> = None;
        for entry in snapshot.entries() {
            let score = self.similarity.score(&candidate, &entry.canonical_name);
            // strict comparison keeps the earliest entry on ties
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((entry, score));
            }
        }

        match best {
            Some((entry, score)) if score >= self.config.fuzzy_threshold => {
                tracing::debug!(
                    candidate = %name,
                    matched = %entry.canonical_name,
                    score = format!("{score:.2}"),
                    similarity = self.similarity.name(),
                    "Fuzzy roster match"
                );
                Resolution::Fuzzy {
                    canonical_name: entry.canonical_name.clone(),
                    address: entry.address.clone(),
                    score,
                }
            }
            Some((_, score)) => Resolution::Unresolved { best_score: score },
            None => Resolution::Unresolved { best_score: 0.0 },
        }
    }

    /// Resolve a name against the current snapshot
    pub async fn resolve(&self, name: &str) -> Resolution {
        let snapshot = self.snapshot(false).await;
        self.resolve_in(&snapshot, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RosterRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticRoster(Vec<RosterRow>);

    #[async_trait]
    impl RosterSource for StaticRoster {
        async fn fetch_roster(&self) -> Result<Vec<RosterRow>, FetchError> {
            Ok(self.0.clone())
        }
    }

    /// Scores from a fixed table, counting calls
    struct TableSimilarity {
        calls: Arc<AtomicUsize>,
        table: Vec<(&'static str, f64)>,
    }

    impl Similarity for TableSimilarity {
        fn score(&self, _a: &str, b: &str) -> f64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table
                .iter()
                .find(|(name, _)| *name == b)
                .map(|(_, s)| *s)
                .unwrap_or(0.0)
        }
    }

    fn roster(names: &[(&str, &str)]) -> Arc<dyn RosterSource> {
        Arc::new(StaticRoster(
            names.iter().map(|(n, a)| RosterRow::new(*n, *a)).collect(),
        ))
    }

    #[tokio::test]
    async fn test_exact_is_case_insensitive() {
        let resolver = NameResolver::new(roster(&[("Tim", "U-tim")]), ResolverConfig::default());
        let resolution = resolver.resolve("  tim ").await;
        assert_eq!(resolution.path(), "exact");
        assert_eq!(resolution.address(), Some("U-tim"));
    }

    #[tokio::test]
    async fn test_exact_skips_similarity() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = NameResolver::new(
            roster(&[("TIM", "U1"), ("ALICE", "U2")]),
            ResolverConfig::default(),
        )
        .with_similarity(Box::new(TableSimilarity {
            calls: Arc::clone(&calls),
            table: vec![],
        }));

        assert!(resolver.resolve("Alice").await.is_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(!resolver.resolve("Zed").await.is_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fuzzy_picks_highest_above_threshold() {
        let resolver = NameResolver::new(
            roster(&[("AAA", "U1"), ("BBB", "U2")]),
            ResolverConfig::default(),
        )
        .with_similarity(Box::new(TableSimilarity {
            calls: Arc::new(AtomicUsize::new(0)),
            table: vec![("AAA", 0.7), ("BBB", 0.9)],
        }));

        match resolver.resolve("XYZ").await {
            Resolution::Fuzzy { address, score, .. } => {
                assert_eq!(address, "U2");
                assert!((score - 0.9).abs() < 1e-9);
            }
            other => panic!("expected fuzzy match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fuzzy_tie_prefers_first_entry() {
        let resolver = NameResolver::new(
            roster(&[("AAA", "U1"), ("BBB", "U2")]),
            ResolverConfig::default(),
        )
        .with_similarity(Box::new(TableSimilarity {
            calls: Arc::new(AtomicUsize::new(0)),
            table: vec![("AAA", 0.8), ("BBB", 0.8)],
        }));

        assert_eq!(resolver.resolve("XYZ").await.address(), Some("U1"));
    }

    #[tokio::test]
    async fn test_all_below_threshold_unresolved() {
        let resolver = NameResolver::new(
            roster(&[("AAA", "U1"), ("BBB", "U2")]),
            ResolverConfig::default(),
        )
        .with_similarity(Box::new(TableSimilarity {
            calls: Arc::new(AtomicUsize::new(0)),
            table: vec![("AAA", 0.3), ("BBB", 0.59)],
        }));

        match resolver.resolve("XYZ").await {
            Resolution::Unresolved { best_score } => assert!((best_score - 0.59).abs() < 1e-9),
            other => panic!("expected unresolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let resolver = NameResolver::new(roster(&[("AAA", "U1")]), ResolverConfig::default())
            .with_similarity(Box::new(TableSimilarity {
                calls: Arc::new(AtomicUsize::new(0)),
                table: vec![("AAA", 0.6)],
            }));

        assert_eq!(resolver.resolve("XYZ").await.address(), Some("U1"));
    }

    #[tokio::test]
    async fn test_sequence_ratio_typo() {
        let resolver = NameResolver::new(
            roster(&[("TIM", "U1"), ("GILLIAN", "U2")]),
            ResolverConfig::default(),
        );
        assert_eq!(resolver.resolve("Gilian").await.address(), Some("U2"));
        assert_eq!(resolver.resolve("Tom").await.address(), None);
    }

    /// Serves rows once, then fails
    struct FailAfterFirst {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RosterSource for FailAfterFirst {
        async fn fetch_roster(&self) -> Result<Vec<RosterRow>, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![RosterRow::new("TIM", "U1")])
            } else {
                Err(FetchError::Remote("connection reset".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_refresh_failure_serves_cached_roster() {
        let resolver = NameResolver::new(
            Arc::new(FailAfterFirst {
                calls: AtomicUsize::new(0),
            }),
            ResolverConfig {
                refresh_interval: Duration::ZERO,
                ..ResolverConfig::default()
            },
        );

        assert_eq!(resolver.resolve("TIM").await.address(), Some("U1"));
        // stale interval forces a refresh that fails
        assert_eq!(resolver.resolve("TIM").await.address(), Some("U1"));
        assert!(resolver.reload().await.is_err());
        assert_eq!(resolver.snapshot(true).await.len(), 1);
    }

    #[tokio::test]
    async fn test_cached_snapshot_is_reused() {
        let source = Arc::new(FailAfterFirst {
            calls: AtomicUsize::new(0),
        });
        let resolver = NameResolver::new(source.clone(), ResolverConfig::default());

        resolver.resolve("TIM").await;
        resolver.resolve("TIM").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_candidate() {
        let resolver = NameResolver::new(roster(&[("TIM", "U1")]), ResolverConfig::default());
        assert!(!resolver.resolve("   ").await.is_resolved());
    }
}
