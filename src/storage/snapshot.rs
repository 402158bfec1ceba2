//! Immutable hierarchy snapshots
//!
//! A [`Snapshot`] bundles one built [`HierarchyIndex`] with the load warnings
//! that went into it. The [`SnapshotStore`] hands out `Arc`s; a rebuild swaps
//! the pointer, so readers holding an older snapshot keep a consistent view.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::config::ProjectConfig;
use crate::domain::{HierarchyIndex, LoadWarning};

/// Identifies the inputs a snapshot was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotKey(blake3::Hash);

impl SnapshotKey {
    /// Hashes both table digests, the requested evaluation date and the
    /// settings that affect loading and building
    pub fn new(
        units: &blake3::Hash,
        relationships: &blake3::Hash,
        requested_date: Option<NaiveDate>,
        config: &ProjectConfig,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(units.as_bytes());
        hasher.update(relationships.as_bytes());
        match requested_date {
            Some(date) => hasher.update(date.to_string().as_bytes()),
            None => hasher.update(b"auto"),
        };
        let settings = format!(
            "{:?}|{:?}|{:?}",
            config.input.date_formats, config.columns, config.hierarchy
        );
        hasher.update(settings.as_bytes());
        Self(hasher.finalize())
    }

    pub fn short(&self) -> String {
        self.0.to_hex()[..12].to_string()
    }
}

/// One built hierarchy plus what the loader reported while building it
pub struct Snapshot {
    pub key: SnapshotKey,
    pub index: HierarchyIndex,
    pub warnings: Vec<LoadWarning>,
    pub built_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(key: SnapshotKey, index: HierarchyIndex, warnings: Vec<LoadWarning>) -> Self {
        Self {
            key,
            index,
            warnings,
            built_at: Utc::now(),
        }
    }
}

/// Holds the current snapshot and swaps it atomically
#[derive(Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    /// Installs a new snapshot and returns the one it replaced
    pub fn replace(&self, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        self.install(Arc::new(snapshot))
    }

    fn install(&self, snapshot: Arc<Snapshot>) -> Option<Arc<Snapshot>> {
        info!(
            key = %snapshot.key.short(),
            units = snapshot.index.len(),
            "installed hierarchy snapshot"
        );
        self.current.write().replace(snapshot)
    }

    /// Returns the current snapshot if its key matches, otherwise builds and installs one
    pub fn get_or_build<F, E>(&self, key: SnapshotKey, build: F) -> Result<Arc<Snapshot>, E>
    where
        F: FnOnce() -> Result<Snapshot, E>,
    {
        if let Some(current) = self.current() {
            if current.key == key {
                debug!(key = %key.short(), "snapshot unchanged");
                return Ok(current);
            }
        }

        let snapshot = Arc::new(build()?);
        self.install(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BuildOptions, HierarchyBuilder, OrgUnit, Relationship, UnitId};
    use std::thread;

    fn id(s: &str) -> UnitId {
        UnitId::new(s).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn key(units: &str) -> SnapshotKey {
        SnapshotKey::new(
            &blake3::hash(units.as_bytes()),
            &blake3::hash(b"rels"),
            None,
            &ProjectConfig::default(),
        )
    }

    fn snapshot(key: SnapshotKey, names: &[&str]) -> Snapshot {
        let units: Vec<_> = names.iter().map(|n| OrgUnit::new(id(n), *n)).collect();
        let rels: Vec<Relationship> = Vec::new();
        let graph = HierarchyBuilder::new(BuildOptions::new(date())).build(&units, &rels);
        Snapshot::new(key, HierarchyIndex::new(graph), Vec::new())
    }

    #[test]
    fn key_depends_on_inputs() {
        assert_eq!(key("a"), key("a"));
        assert_ne!(key("a"), key("b"));

        let dated = SnapshotKey::new(
            &blake3::hash(b"a"),
            &blake3::hash(b"rels"),
            Some(date()),
            &ProjectConfig::default(),
        );
        assert_ne!(dated, key("a"));

        let mut config = ProjectConfig::default();
        config.hierarchy.planning_statuses.clear();
        let unfiltered = SnapshotKey::new(
            &blake3::hash(b"a"),
            &blake3::hash(b"rels"),
            None,
            &config,
        );
        assert_ne!(unfiltered, key("a"));
        assert_eq!(key("a").short().len(), 12);
    }

    #[test]
    fn get_or_build_reuses_matching_snapshot() {
        let store = SnapshotStore::new();
        assert!(store.current().is_none());

        let first = store
            .get_or_build::<_, ()>(key("a"), || Ok(snapshot(key("a"), &["1"])))
            .unwrap();
        let again = store
            .get_or_build::<_, ()>(key("a"), || panic!("should not rebuild"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let rebuilt = store
            .get_or_build::<_, ()>(key("b"), || Ok(snapshot(key("b"), &["1", "2"])))
            .unwrap();
        assert_eq!(rebuilt.index.len(), 2);

        let failed = store.get_or_build(key("c"), || Err("boom"));
        assert_eq!(failed.err(), Some("boom"));
        assert_eq!(store.current().map(|s| s.key), Some(key("b")));
    }

    #[test]
    fn readers_keep_old_snapshot_across_swap() {
        let store = Arc::new(SnapshotStore::new());
        store.replace(snapshot(key("a"), &["1"]));
        let held = store.current().unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let old = store.replace(snapshot(key("b"), &["1", "2", "3"]));
                old.map(|s| s.key)
            })
        };
        assert_eq!(writer.join().unwrap(), Some(key("a")));

        assert_eq!(held.index.len(), 1);
        assert!(held.index.contains(&id("1")));
        assert_eq!(store.current().unwrap().index.len(), 3);
    }
}
