//! The metadata pool: single-flight memoization of version-range lookups and
//! descriptor reads, coordinate interning, and the subgraph cache.
//!
//! A pool is injected into the resolver rather than held globally. It can be
//! kept across resolution passes; cached failures then stay cached too.

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use graven_core::coordinate::{Coordinate, LogicalId};
use graven_core::dependency::VersionConstraint;
use graven_core::repository::Repository;
use graven_core::scope::Scope;
use graven_core::source::{Descriptor, FetchError};
use graven_core::version::MavenVersion;
use tokio::sync::OnceCell;

use crate::node::Children;
use crate::policy::{DependencyManager, DependencySelector};

type Slot<T> = Arc<OnceCell<Result<Arc<T>, FetchError>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeKey {
    pub id: LogicalId,
    pub constraint: VersionConstraint,
    pub repositories: Vec<Repository>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorKey {
    pub coordinate: Coordinate,
    pub repositories: Vec<Repository>,
}

/// Identity of a subgraph: the package, where its children are looked up,
/// and every piece of derived policy state that shapes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubgraphKey {
    pub coordinate: Arc<Coordinate>,
    pub repositories: Vec<Repository>,
    pub scope: Scope,
    pub selector: DependencySelector,
    pub manager: DependencyManager,
}

/// Outcome of [`Pool::claim_subgraph`].
#[derive(Debug)]
pub enum SubgraphClaim {
    /// A complete list built earlier; share it.
    Sealed(Arc<Children>),
    /// The caller now owns this placeholder and must fill then seal it, or
    /// give it back with [`Pool::abandon_subgraph`].
    Claimed(Arc<Children>),
    /// Another branch is still building this key.
    Busy,
}

#[derive(Debug, Default)]
struct Counters {
    range_lookups: AtomicU64,
    range_fetches: AtomicU64,
    descriptor_lookups: AtomicU64,
    descriptor_fetches: AtomicU64,
    subgraph_reuses: AtomicU64,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub range_lookups: u64,
    pub range_fetches: u64,
    pub descriptor_lookups: u64,
    pub descriptor_fetches: u64,
    pub subgraph_reuses: u64,
}

impl PoolStats {
    /// Cache hits across both lookup kinds.
    pub fn hits(&self) -> u64 {
        // Counters are loaded one at a time, so a fetch can be newer than
        // the lookup it is compared with.
        self.range_lookups.saturating_sub(self.range_fetches)
            + self.descriptor_lookups.saturating_sub(self.descriptor_fetches)
    }

    /// Counter deltas between `earlier` and `self`.
    pub fn since(&self, earlier: &PoolStats) -> PoolStats {
        PoolStats {
            range_lookups: self.range_lookups.saturating_sub(earlier.range_lookups),
            range_fetches: self.range_fetches.saturating_sub(earlier.range_fetches),
            descriptor_lookups: self.descriptor_lookups.saturating_sub(earlier.descriptor_lookups),
            descriptor_fetches: self.descriptor_fetches.saturating_sub(earlier.descriptor_fetches),
            subgraph_reuses: self.subgraph_reuses.saturating_sub(earlier.subgraph_reuses),
        }
    }
}

#[derive(Debug, Default)]
pub struct Pool {
    ranges: DashMap<RangeKey, Slot<Vec<MavenVersion>>>,
    descriptors: DashMap<DescriptorKey, Slot<Descriptor>>,
    coordinates: DashMap<Coordinate, Arc<Coordinate>>,
    subgraphs: DashMap<SubgraphKey, Arc<Children>>,
    in_flight: DashMap<u64, String>,
    next_op: AtomicU64,
    counters: Counters,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Versions matching `key`, fetching at most once per key.
    ///
    /// Concurrent callers for one key wait for the first caller's fetch and
    /// all observe the same `Arc`.
    pub async fn versions<F, Fut>(
        &self,
        key: RangeKey,
        fetch: F,
    ) -> Result<Arc<Vec<MavenVersion>>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<MavenVersion>, FetchError>>,
    {
        self.counters.range_lookups.fetch_add(1, Ordering::Relaxed);
        let what = format!("versions of {} matching {}", key.id, key.constraint);
        let slot = slot_for(&self.ranges, key);
        let result = slot
            .get_or_init(move || async move {
                self.counters.range_fetches.fetch_add(1, Ordering::Relaxed);
                let _op = self.track(what);
                fetch().await.map(Arc::new)
            })
            .await;
        result.clone()
    }

    /// The descriptor for `key`, read at most once per key.
    pub async fn descriptor<F, Fut>(
        &self,
        key: DescriptorKey,
        fetch: F,
    ) -> Result<Arc<Descriptor>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Descriptor, FetchError>>,
    {
        self.counters.descriptor_lookups.fetch_add(1, Ordering::Relaxed);
        let what = format!("descriptor of {}", key.coordinate);
        let slot = slot_for(&self.descriptors, key);
        let result = slot
            .get_or_init(move || async move {
                self.counters.descriptor_fetches.fetch_add(1, Ordering::Relaxed);
                let _op = self.track(what);
                fetch().await.map(Arc::new)
            })
            .await;
        result.clone()
    }

    /// The canonical shared instance of `coordinate`.
    pub fn intern(&self, coordinate: Coordinate) -> Arc<Coordinate> {
        if let Some(existing) = self.coordinates.get(&coordinate) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.coordinates
                .entry(coordinate.clone())
                .or_insert_with(|| Arc::new(coordinate))
                .value(),
        )
    }

    /// Look up a subgraph, claiming the key with an empty placeholder when
    /// nobody has built it yet.
    pub fn claim_subgraph(&self, key: SubgraphKey) -> SubgraphClaim {
        match self.subgraphs.entry(key) {
            Entry::Occupied(entry) => {
                if entry.get().is_sealed() {
                    self.counters.subgraph_reuses.fetch_add(1, Ordering::Relaxed);
                    SubgraphClaim::Sealed(Arc::clone(entry.get()))
                } else {
                    SubgraphClaim::Busy
                }
            }
            Entry::Vacant(entry) => {
                let placeholder = Arc::new(Children::new());
                entry.insert(Arc::clone(&placeholder));
                SubgraphClaim::Claimed(placeholder)
            }
        }
    }

    /// Withdraw a claimed placeholder that must not be shared.
    pub fn abandon_subgraph(&self, key: &SubgraphKey, placeholder: &Arc<Children>) {
        self.subgraphs
            .remove_if(key, |_, current| Arc::ptr_eq(current, placeholder));
    }

    /// Drop every placeholder that was claimed but never sealed, e.g. after
    /// an aborted pass.
    pub fn discard_unsealed(&self) {
        self.subgraphs.retain(|_, children| children.is_sealed());
    }

    /// Descriptions of the fetches currently running.
    pub fn in_flight(&self) -> Vec<String> {
        let mut ops: Vec<String> = self.in_flight.iter().map(|e| e.value().clone()).collect();
        ops.sort();
        ops
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            range_lookups: self.counters.range_lookups.load(Ordering::Relaxed),
            range_fetches: self.counters.range_fetches.load(Ordering::Relaxed),
            descriptor_lookups: self.counters.descriptor_lookups.load(Ordering::Relaxed),
            descriptor_fetches: self.counters.descriptor_fetches.load(Ordering::Relaxed),
            subgraph_reuses: self.counters.subgraph_reuses.load(Ordering::Relaxed),
        }
    }

    fn track(&self, what: String) -> InFlight<'_> {
        let id = self.next_op.fetch_add(1, Ordering::Relaxed);
        self.in_flight.insert(id, what);
        InFlight { pool: self, id }
    }
}

/// Clone the slot out so no map shard stays locked across the await.
fn slot_for<K: Hash + Eq, T>(map: &DashMap<K, Slot<T>>, key: K) -> Slot<T> {
    Arc::clone(map.entry(key).or_default().value())
}

/// Removes its in-flight entry when the fetch finishes or is cancelled.
struct InFlight<'a> {
    pool: &'a Pool,
    id: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.pool.in_flight.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(coord: &str) -> DescriptorKey {
        DescriptorKey {
            coordinate: Coordinate::parse(coord).unwrap(),
            repositories: vec![Repository::maven_central()],
        }
    }

    #[tokio::test]
    async fn failures_are_cached() {
        let pool = Pool::new();
        let first = pool
            .descriptor(key("g:a:1"), || async { Err(FetchError::not_found("g:a:1")) })
            .await;
        let second = pool
            .descriptor(key("g:a:1"), || async {
                Ok(Descriptor::new(Coordinate::new("g", "a", "1")))
            })
            .await;
        assert_eq!(first.unwrap_err(), FetchError::not_found("g:a:1"));
        assert_eq!(second.unwrap_err(), FetchError::not_found("g:a:1"));
        let stats = pool.stats();
        assert_eq!(stats.descriptor_lookups, 2);
        assert_eq!(stats.descriptor_fetches, 1);
        assert_eq!(stats.hits(), 1);
    }

    #[test]
    fn hits_tolerate_a_torn_snapshot() {
        let torn = PoolStats {
            range_lookups: 3,
            range_fetches: 4,
            descriptor_lookups: 5,
            descriptor_fetches: 2,
            subgraph_reuses: 0,
        };
        assert_eq!(torn.hits(), 3);
    }

    #[tokio::test]
    async fn repository_list_is_part_of_the_key() {
        let pool = Pool::new();
        let mut other = key("g:a:1");
        other.repositories.push(Repository::new("extra", "https://extra.example.com"));
        for k in [key("g:a:1"), other] {
            pool.descriptor(k, || async { Ok(Descriptor::new(Coordinate::new("g", "a", "1"))) })
                .await
                .unwrap();
        }
        assert_eq!(pool.stats().descriptor_fetches, 2);
    }

    #[test]
    fn interning_returns_one_instance() {
        let pool = Pool::new();
        let a = pool.intern(Coordinate::new("g", "a", "1"));
        let b = pool.intern(Coordinate::new("g", "a", "1"));
        let c = pool.intern(Coordinate::new("g", "a", "2"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn subgraph_claim_lifecycle() {
        let pool = Pool::new();
        let key = SubgraphKey {
            coordinate: pool.intern(Coordinate::new("g", "a", "1")),
            repositories: Vec::new(),
            scope: Scope::Compile,
            selector: DependencySelector::default(),
            manager: DependencyManager::default(),
        };

        let SubgraphClaim::Claimed(placeholder) = pool.claim_subgraph(key.clone()) else {
            panic!("first claim must win");
        };
        assert!(matches!(pool.claim_subgraph(key.clone()), SubgraphClaim::Busy));

        placeholder.seal();
        match pool.claim_subgraph(key.clone()) {
            SubgraphClaim::Sealed(shared) => assert!(Arc::ptr_eq(&shared, &placeholder)),
            other => panic!("expected sealed reuse, got {other:?}"),
        }
        assert_eq!(pool.stats().subgraph_reuses, 1);
    }

    #[test]
    fn abandoned_and_unsealed_claims_are_released() {
        let pool = Pool::new();
        let key = SubgraphKey {
            coordinate: pool.intern(Coordinate::new("g", "a", "1")),
            repositories: Vec::new(),
            scope: Scope::Runtime,
            selector: DependencySelector::default(),
            manager: DependencyManager::default(),
        };
        let SubgraphClaim::Claimed(placeholder) = pool.claim_subgraph(key.clone()) else {
            panic!("first claim must win");
        };
        pool.abandon_subgraph(&key, &placeholder);
        assert!(matches!(pool.claim_subgraph(key.clone()), SubgraphClaim::Claimed(_)));

        pool.discard_unsealed();
        assert!(matches!(pool.claim_subgraph(key), SubgraphClaim::Claimed(_)));
    }
}
