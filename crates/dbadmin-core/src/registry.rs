//! Cached index of the cluster's databases.
//!
//! The registry is a cheap, cloneable handle around the last snapshot. A
//! refresh builds a complete new snapshot and swaps it in; readers (the
//! completer, mid-keystroke) hold an `Arc` to whichever snapshot was current
//! and never observe a half-built one.

use crate::api::ControlPlane;
use crate::error::{CommandError, RemoteError};
use crate::grammar::Capabilities;
use crate::model::{ClusterInfo, Database};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One consistent view of names, ids and cluster capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    by_name: BTreeMap<String, u64>,
    capabilities: Capabilities,
}

impl RegistrySnapshot {
    pub fn from_records(databases: &[Database], cluster: &ClusterInfo) -> Self {
        let mut by_name = BTreeMap::new();
        for db in databases {
            if let Some(previous) = by_name.insert(db.name.clone(), db.uid) {
                warn!(
                    name = %db.name,
                    previous,
                    uid = db.uid,
                    "duplicate database name in listing; keeping the later uid"
                );
            }
        }
        Self {
            by_name,
            capabilities: Capabilities {
                rack_awareness: cluster.rack_aware,
            },
        }
    }

    /// Numeric tokens are taken as uids directly; anything else must be a
    /// known name.
    pub fn resolve(&self, token: &str) -> Result<u64, CommandError> {
        if let Ok(uid) = token.parse::<u64>() {
            return Ok(uid);
        }
        self.by_name
            .get(token)
            .copied()
            .ok_or_else(|| CommandError::UnknownEntity(token.to_string()))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Completion candidates: every name, then every uid, skipping `exclude`.
    pub fn candidates(&self, exclude: Option<u64>) -> Vec<String> {
        let kept: Vec<(&String, &u64)> = self
            .by_name
            .iter()
            .filter(|(_, uid)| Some(**uid) != exclude)
            .collect();
        let mut out: Vec<String> = kept.iter().map(|(name, _)| (*name).clone()).collect();
        out.extend(kept.iter().map(|(_, uid)| uid.to_string()));
        out
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Shared handle to the current [`RegistrySnapshot`].
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    current: Arc<RwLock<Arc<RegistrySnapshot>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().clone()
    }

    pub fn replace(&self, snapshot: RegistrySnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }

    /// Re-read databases and cluster capabilities and swap in a new snapshot.
    ///
    /// On failure the previous snapshot stays in place.
    pub fn refresh(&self, api: &dyn ControlPlane) -> Result<(), RemoteError> {
        let databases = api.list_databases()?;
        let cluster = api.cluster_info()?;
        let snapshot = RegistrySnapshot::from_records(&databases, &cluster);
        info!(
            databases = snapshot.len(),
            rack_awareness = snapshot.capabilities.rack_awareness,
            "registry refreshed"
        );
        self.replace(snapshot);
        Ok(())
    }

    pub fn resolve(&self, token: &str) -> Result<u64, CommandError> {
        let snapshot = self.snapshot();
        let resolved = snapshot.resolve(token);
        if resolved.is_err() {
            debug!(token, "entity reference did not resolve");
        }
        resolved
    }

    pub fn candidates(&self, exclude: Option<u64>) -> Vec<String> {
        self.snapshot().candidates(exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{db, FakeControlPlane};

    fn sample() -> RegistrySnapshot {
        RegistrySnapshot::from_records(
            &[db(1, "orders"), db(2, "cache"), db(7, "sessions")],
            &ClusterInfo::default(),
        )
    }

    #[test]
    fn resolves_names_and_numeric_ids() {
        let snap = sample();
        assert_eq!(snap.resolve("cache").unwrap(), 2);
        assert_eq!(snap.resolve("7").unwrap(), 7);
        // Numeric tokens are accepted even when unknown locally.
        assert_eq!(snap.resolve("99").unwrap(), 99);
        assert!(matches!(
            snap.resolve("missing"),
            Err(CommandError::UnknownEntity(t)) if t == "missing"
        ));
    }

    #[test]
    fn candidates_list_names_then_ids() {
        let snap = sample();
        assert_eq!(
            snap.candidates(None),
            vec!["cache", "orders", "sessions", "2", "1", "7"]
        );
        assert_eq!(snap.candidates(Some(1)), vec!["cache", "sessions", "2", "7"]);
    }

    #[test]
    fn refresh_replaces_instead_of_merging() {
        let api = FakeControlPlane::new(vec![db(1, "orders"), db(2, "cache")]);
        let registry = EntityRegistry::new();
        registry.refresh(&api).unwrap();
        assert!(registry.snapshot().contains_name("cache"));

        api.set_databases(vec![db(3, "fresh")]);
        let before = registry.snapshot();
        registry.refresh(&api).unwrap();

        let after = registry.snapshot();
        assert!(!after.contains_name("cache"));
        assert!(!after.contains_name("orders"));
        assert_eq!(after.resolve("fresh").unwrap(), 3);
        // A reader holding the old snapshot keeps a consistent view.
        assert!(before.contains_name("cache"));
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let api = FakeControlPlane::new(vec![db(1, "orders")]);
        let registry = EntityRegistry::new();
        registry.refresh(&api).unwrap();

        api.fail_reads(true);
        assert!(registry.refresh(&api).is_err());
        assert!(registry.snapshot().contains_name("orders"));
    }

    #[test]
    fn refresh_reads_rack_capability() {
        let api = FakeControlPlane::new(vec![]).with_rack_awareness(true);
        let registry = EntityRegistry::new();
        registry.refresh(&api).unwrap();
        assert!(registry.snapshot().capabilities().rack_awareness);
    }
}
