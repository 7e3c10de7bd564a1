use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    joiner,
    language::{LanguageResolver, ScanOptions},
    loader::{LoadStats, RecordSource},
    models::CatalogEntry,
};

#[derive(Clone, Debug, Serialize)]
pub struct SnapshotStats {
    pub generation: u64,
    pub loaded_at: jiff::Timestamp,
    pub titles: LoadStats,
    pub ratings: LoadStats,
    pub entries: usize,
}

/// One immutable, fully joined catalog.
pub struct Snapshot {
    entries: Vec<CatalogEntry>,
    languages: LanguageResolver,
    source: Arc<dyn RecordSource>,
    stats: SnapshotStats,
}

impl Snapshot {
    pub fn build(source: Arc<dyn RecordSource>, options: ScanOptions, generation: u64) -> Result<Self> {
        let started = Instant::now();

        let titles = source.titles()?;
        let ratings = source.ratings()?;
        let entries = joiner::join(titles.records, &ratings.records);

        let wanted: HashSet<String> = entries.iter().map(|e| e.id.clone()).collect();
        let languages = LanguageResolver::new(source.clone(), options, wanted);

        let stats = SnapshotStats {
            generation,
            loaded_at: jiff::Timestamp::now(),
            titles: titles.stats,
            ratings: ratings.stats,
            entries: entries.len(),
        };
        info!(
            generation,
            entries = stats.entries,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built catalog snapshot"
        );

        Ok(Self { entries, languages, source, stats })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn languages(&self) -> &LanguageResolver {
        &self.languages
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }

    pub fn generation(&self) -> u64 {
        self.stats.generation
    }
}

/// Holder of the current snapshot.
///
/// Readers take an `Arc` to the whole snapshot under a short read lock and
/// never see a partially replaced catalog. Reloads build the next snapshot
/// without holding any lock and publish it only if no newer snapshot was
/// published in the meantime.
pub struct Catalog {
    current: RwLock<Arc<Snapshot>>,
    next_generation: AtomicU64,
    options: ScanOptions,
}

impl Catalog {
    pub fn load(source: Arc<dyn RecordSource>, options: ScanOptions) -> Result<Self> {
        let snapshot = Snapshot::build(source, options, 1)?;
        Ok(Self::from_snapshot(snapshot, options))
    }

    pub fn from_snapshot(snapshot: Snapshot, options: ScanOptions) -> Self {
        let next = snapshot.generation() + 1;
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            next_generation: AtomicU64::new(next),
            options,
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Rebuilds from the current snapshot's source.
    pub fn reload(&self) -> Result<bool> {
        let source = self.snapshot().source.clone();
        self.reload_from(source)
    }

    /// Builds a snapshot from `source` and publishes it. Returns `false` when
    /// the result was discarded because a newer snapshot won the race.
    pub fn reload_from(&self, source: Arc<dyn RecordSource>) -> Result<bool> {
        let base = self.snapshot().generation();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        debug!(base, generation, "reloading catalog");

        let snapshot = Snapshot::build(source, self.options, generation)?;
        Ok(self.publish(snapshot, base))
    }

    /// Swaps in `snapshot` if the current one is still generation `expected`.
    pub fn publish(&self, snapshot: Snapshot, expected: u64) -> bool {
        let mut current = self.current.write();
        if current.generation() != expected {
            warn!(
                expected,
                current = current.generation(),
                discarded = snapshot.generation(),
                "catalog changed during reload, discarding stale snapshot"
            );
            return false;
        }
        info!(from = expected, to = snapshot.generation(), entries = snapshot.entries.len(), "published catalog snapshot");
        *current = Arc::new(snapshot);
        true
    }
}
