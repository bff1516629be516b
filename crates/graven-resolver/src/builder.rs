//! The parallel graph builder.
//!
//! Every dependency edge becomes a task: resolve its version constraint,
//! filter the candidates, then fan out one task per candidate that reads
//! the descriptor, follows relocations, appends a node to the parent's child
//! list and recurses into the declared dependencies. Each fan-out is joined
//! through a `JoinSet`; dropping a set aborts whatever it still holds, so a
//! fatal error or the caller's deadline cancels the whole tree.
//!
//! Only collaborator calls take a semaphore permit. Waiting on another
//! task's fetch or joining children never holds one.

use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt};
use graven_core::config::CyclePolicy;
use graven_core::coordinate::{Coordinate, LogicalId};
use graven_core::dependency::{Dependency, VersionConstraint};
use graven_core::repository::Repository;
use graven_core::scope::{self, Scope};
use graven_core::source::{
    Descriptor, DescriptorReader, FetchError, RepositoryAggregator, VersionRangeResolver,
};
use graven_core::version::MavenVersion;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinSet;

use crate::error::ResolveError;
use crate::node::{Children, DependencyNode};
use crate::policy::{
    DependencyManager, DependencySelector, DependencyTraverser, Managed, Policies, VersionFilter,
};
use crate::pool::{DescriptorKey, Pool, RangeKey, SubgraphClaim, SubgraphKey};

/// Lowest ancestor index a cycle cut below referred to, if any. A subtree
/// whose cuts all point inside itself is independent of its ancestors.
type Outcome = Result<Option<usize>, ResolveError>;

/// The dirty graph: every candidate version of every reachable package.
#[derive(Debug)]
pub struct BuiltGraph {
    pub root: Arc<DependencyNode>,
    /// Cycles cut under [`CyclePolicy::Cut`], each from the repeated
    /// package back to itself.
    pub cycles: Vec<Vec<Arc<Coordinate>>>,
}

struct Context<R, D, A> {
    pool: Arc<Pool>,
    ranges: Arc<R>,
    reader: Arc<D>,
    aggregator: Arc<A>,
    permits: Semaphore,
    traverser: DependencyTraverser,
    filter: VersionFilter,
    cycle_policy: CyclePolicy,
    cycles: Mutex<Vec<Vec<Arc<Coordinate>>>>,
}

pub struct GraphBuilder<R, D, A> {
    ctx: Arc<Context<R, D, A>>,
    selector: DependencySelector,
    manager: DependencyManager,
}

impl<R, D, A> GraphBuilder<R, D, A>
where
    R: VersionRangeResolver,
    D: DescriptorReader,
    A: RepositoryAggregator,
{
    pub fn new(
        pool: Arc<Pool>,
        ranges: Arc<R>,
        reader: Arc<D>,
        aggregator: Arc<A>,
        policies: Policies,
        jobs: usize,
        cycle_policy: CyclePolicy,
    ) -> Self {
        let Policies {
            selector,
            manager,
            traverser,
            filter,
        } = policies;
        Self {
            ctx: Arc::new(Context {
                pool,
                ranges,
                reader,
                aggregator,
                permits: Semaphore::new(jobs.max(1)),
                traverser,
                filter,
                cycle_policy,
                cycles: Mutex::new(Vec::new()),
            }),
            selector,
            manager,
        }
    }

    /// Build the graph below `root`. The caller bounds this with a deadline.
    pub async fn build(
        &self,
        root: Coordinate,
        dependencies: &[Dependency],
        repositories: Vec<Repository>,
    ) -> Result<BuiltGraph, ResolveError> {
        let root = Arc::new(DependencyNode::root(self.ctx.pool.intern(root)));
        let ancestors = Arc::new(vec![Arc::clone(&root.coordinate)]);
        let repositories = Arc::new(repositories);

        let mut tasks = JoinSet::new();
        for dependency in dependencies {
            tasks.spawn(process_edge(
                Arc::clone(&self.ctx),
                Edge {
                    dependency: dependency.clone(),
                    premanaged_scope: None,
                    parent_scope: None,
                    selector: self.selector.clone(),
                    manager: self.manager.clone(),
                    repositories: Arc::clone(&repositories),
                    ancestors: Arc::clone(&ancestors),
                    relocations: Vec::new(),
                    target: Arc::clone(root.child_list()),
                },
            ));
        }
        join_all(tasks).await?;
        root.child_list().seal();

        let cycles = std::mem::take(&mut *lock(&self.ctx.cycles));
        Ok(BuiltGraph { root, cycles })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<R, D, A> Context<R, D, A>
where
    R: VersionRangeResolver,
    D: DescriptorReader,
    A: RepositoryAggregator,
{
    async fn permit(&self) -> Result<SemaphorePermit<'_>, FetchError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| FetchError::failed("metadata", "resolver is shutting down"))
    }

    async fn versions(
        &self,
        id: &LogicalId,
        query: &VersionConstraint,
        repositories: &[Repository],
    ) -> Result<Arc<Vec<MavenVersion>>, FetchError> {
        let key = RangeKey {
            id: id.clone(),
            constraint: query.clone(),
            repositories: repositories.to_vec(),
        };
        self.pool
            .versions(key, move || async move {
                let _permit = self.permit().await?;
                self.ranges
                    .resolve_version_range(id, query, repositories)
                    .await
            })
            .await
    }

    async fn descriptor(
        &self,
        coordinate: &Coordinate,
        repositories: &[Repository],
    ) -> Result<Arc<Descriptor>, FetchError> {
        let key = DescriptorKey {
            coordinate: coordinate.clone(),
            repositories: repositories.to_vec(),
        };
        self.pool
            .descriptor(key, move || async move {
                let _permit = self.permit().await?;
                self.reader.read_descriptor(coordinate, repositories).await
            })
            .await
    }
}

/// A dependency edge waiting to be expanded, with the policy state it was
/// declared under.
#[derive(Clone)]
struct Edge {
    dependency: Dependency,
    premanaged_scope: Option<Scope>,
    parent_scope: Option<Scope>,
    selector: DependencySelector,
    manager: DependencyManager,
    repositories: Arc<Vec<Repository>>,
    /// Coordinates from the root down to the declaring node.
    ancestors: Arc<Vec<Arc<Coordinate>>>,
    relocations: Vec<Coordinate>,
    /// The child list nodes for this edge are appended to.
    target: Arc<Children>,
}

impl Edge {
    fn parent(&self) -> String {
        self.ancestors
            .last()
            .map(|c| c.to_string())
            .unwrap_or_default()
    }

    fn attach(&self, coordinate: Arc<Coordinate>, children: Arc<Children>, cycle_cut: bool) {
        let mut node = DependencyNode::new(
            coordinate,
            scope::derive(self.parent_scope, self.dependency.scope),
            self.dependency.clone(),
            self.premanaged_scope,
            self.relocations.clone(),
            children,
        );
        node.cycle_cut = cycle_cut;
        self.target.push(Arc::new(node));
    }

    fn attach_leaf(&self, coordinate: Arc<Coordinate>) {
        self.attach(coordinate, Arc::new(Children::sealed_empty()), false);
    }
}

fn process_edge<R, D, A>(ctx: Arc<Context<R, D, A>>, mut edge: Edge) -> BoxFuture<'static, Outcome>
where
    R: VersionRangeResolver,
    D: DescriptorReader,
    A: RepositoryAggregator,
{
    async move {
        if !edge.selector.select(&edge.dependency) {
            tracing::debug!("Skipping {} under {}", edge.dependency, edge.parent());
            return Ok(None);
        }
        let Managed {
            dependency,
            premanaged_scope,
        } = edge.manager.manage(&edge.dependency);
        edge.dependency = dependency;
        edge.premanaged_scope = premanaged_scope.or(edge.premanaged_scope);

        if edge.dependency.lacks_descriptor() {
            if let Err(reason) = edge.dependency.validate() {
                tracing::warn!("Dropping {} under {}: {reason}", edge.dependency, edge.parent());
                return Ok(None);
            }
            let version = edge.dependency.constraint.to_string();
            let coordinate = ctx.pool.intern(edge.dependency.at(&version));
            edge.attach_leaf(coordinate);
            return Ok(None);
        }

        let id = edge.dependency.logical_id();
        let query = edge.dependency.constraint.to_query();
        let found = ctx.versions(&id, &query, &edge.repositories).await;
        let available = match found {
            Ok(versions) => versions,
            Err(e) => {
                tracing::warn!("Dropping {} under {}: {e}", edge.dependency, edge.parent());
                return Ok(None);
            }
        };

        let candidates = ctx.filter.apply(&edge.dependency.constraint, &available);
        if candidates.is_empty() {
            tracing::warn!(
                "No version of {id} matches {} (needed by {})",
                edge.dependency.constraint,
                edge.parent()
            );
            return Ok(None);
        }
        tracing::debug!(
            "{} -> {} candidate(s) for {}",
            edge.parent(),
            candidates.len(),
            edge.dependency
        );

        let edge = Arc::new(edge);
        if let [only] = candidates.as_slice() {
            return process_version(ctx, edge, only.clone()).await;
        }
        let mut tasks = JoinSet::new();
        for version in candidates {
            tasks.spawn(process_version(Arc::clone(&ctx), Arc::clone(&edge), version));
        }
        join_all(tasks).await
    }
    .boxed()
}

fn process_version<R, D, A>(
    ctx: Arc<Context<R, D, A>>,
    edge: Arc<Edge>,
    version: MavenVersion,
) -> BoxFuture<'static, Outcome>
where
    R: VersionRangeResolver,
    D: DescriptorReader,
    A: RepositoryAggregator,
{
    async move {
        let coordinate = edge.dependency.at(version.as_str());
        let id = coordinate.logical_id();

        if let Some(index) = edge.ancestors.iter().position(|a| a.logical_id() == id) {
            let coordinate = ctx.pool.intern(coordinate);
            let mut cycle = edge.ancestors[index..].to_vec();
            cycle.push(Arc::clone(&coordinate));
            return match ctx.cycle_policy {
                CyclePolicy::Fail => Err(ResolveError::DependencyCycle {
                    path: cycle.iter().map(|c| Coordinate::clone(c)).collect(),
                }),
                CyclePolicy::Cut => {
                    tracing::warn!(
                        "Cutting dependency cycle {}",
                        cycle.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" -> ")
                    );
                    lock(&ctx.cycles).push(cycle);
                    edge.attach(coordinate, Arc::new(Children::sealed_empty()), true);
                    Ok(Some(index))
                }
            };
        }

        let descriptor = match ctx.descriptor(&coordinate, &edge.repositories).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::warn!("Keeping {coordinate} as a leaf: {e}");
                edge.attach_leaf(ctx.pool.intern(coordinate));
                return Ok(None);
            }
        };

        if descriptor.relocates(&coordinate) {
            let target = descriptor.coordinate.clone();
            let mut chain = edge.relocations.clone();
            chain.push(coordinate);
            chain.extend(descriptor.relocations.iter().cloned());
            if chain.contains(&target) {
                chain.push(target);
                return Err(ResolveError::RelocationCycle { chain });
            }
            tracing::debug!("{} relocated to {target}", chain[chain.len() - 1]);
            let relocated = Edge {
                dependency: edge.dependency.relocated_to(&target),
                relocations: chain,
                ..Edge::clone(&edge)
            };
            return process_edge(ctx, relocated).await;
        }

        let coordinate = ctx.pool.intern(coordinate);
        if !ctx.traverser.traverse(&edge.dependency) || descriptor.dependencies.is_empty() {
            edge.attach_leaf(coordinate);
            return Ok(None);
        }

        let derived = scope::derive(edge.parent_scope, edge.dependency.scope);
        let repositories = ctx
            .aggregator
            .aggregate(&edge.repositories, &descriptor.repositories);
        let selector = edge.selector.derive_child(&edge.dependency);
        let manager = edge.manager.derive_child(&descriptor.managed);
        let key = SubgraphKey {
            coordinate: Arc::clone(&coordinate),
            repositories: repositories.clone(),
            scope: derived,
            selector: selector.clone(),
            manager: manager.clone(),
        };

        let (children, claimed) = match ctx.pool.claim_subgraph(key.clone()) {
            SubgraphClaim::Sealed(children) => {
                tracing::debug!("Reusing subgraph of {coordinate}");
                edge.attach(coordinate, children, false);
                return Ok(None);
            }
            SubgraphClaim::Claimed(children) => (children, true),
            SubgraphClaim::Busy => (Arc::new(Children::new()), false),
        };
        edge.attach(Arc::clone(&coordinate), Arc::clone(&children), false);

        let depth = edge.ancestors.len();
        let mut ancestors = Vec::clone(&edge.ancestors);
        ancestors.push(coordinate);
        let ancestors = Arc::new(ancestors);
        let repositories = Arc::new(repositories);

        let mut tasks = JoinSet::new();
        for dependency in &descriptor.dependencies {
            tasks.spawn(process_edge(
                Arc::clone(&ctx),
                Edge {
                    dependency: dependency.clone(),
                    premanaged_scope: None,
                    parent_scope: Some(derived),
                    selector: selector.clone(),
                    manager: manager.clone(),
                    repositories: Arc::clone(&repositories),
                    ancestors: Arc::clone(&ancestors),
                    relocations: Vec::new(),
                    target: Arc::clone(&children),
                },
            ));
        }
        let lowest_cut = join_all(tasks).await?.filter(|&index| index < depth);
        children.seal();
        if claimed && lowest_cut.is_some() {
            // Built around a cut that depends on this path's ancestors.
            ctx.pool.abandon_subgraph(&key, &children);
        }
        Ok(lowest_cut)
    }
    .boxed()
}

/// Await every task. The first fatal error wins; returning drops the set,
/// which aborts the remaining siblings.
async fn join_all(mut tasks: JoinSet<Outcome>) -> Outcome {
    let mut lowest: Option<usize> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(cut)) => lowest = lowest.into_iter().chain(cut).min(),
            Ok(Err(e)) => return Err(e),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => {}
        }
    }
    Ok(lowest)
}
