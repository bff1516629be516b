//! The resolution entry point: validate a request, build the dirty graph
//! under a deadline, pick one version per package, then flatten.

use std::sync::Arc;
use std::time::Instant;

use graven_core::config::ResolverSettings;
use graven_core::coordinate::{Coordinate, LogicalId};
use graven_core::dependency::{Dependency, Exclusion, ManagedDependency};
use graven_core::repository::Repository;
use graven_core::scope::Scope;
use graven_core::source::{AppendRepositories, DescriptorReader, RepositoryAggregator, VersionRangeResolver};
use graven_util::errors::GravenError;

use crate::builder::GraphBuilder;
use crate::conflict::{resolve_conflicts, ConflictReport, ConflictResolution};
use crate::error::ResolveError;
use crate::flatten::{flatten, ResolvedArtifact};
use crate::graph::DependencyGraph;
use crate::node::DependencyNode;
use crate::policy::Policies;
use crate::pool::{Pool, PoolStats};

/// What to resolve.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    /// The package being resolved for; it is never part of the output.
    pub root: Coordinate,
    pub dependencies: Vec<Dependency>,
    /// Version and scope overrides for transitive dependencies. These win
    /// over anything a descriptor manages.
    pub managed: Vec<ManagedDependency>,
    /// Applied to the whole graph.
    pub exclusions: Vec<Exclusion>,
    pub repositories: Vec<Repository>,
    /// Output filter; empty keeps every scope.
    pub scopes: Vec<Scope>,
}

impl ResolveRequest {
    pub fn new(root: Coordinate) -> Self {
        Self {
            root,
            dependencies: Vec::new(),
            managed: Vec::new(),
            exclusions: Vec::new(),
            repositories: Vec::new(),
            scopes: Vec::new(),
        }
    }

    /// A request for a root given as `group:name:version`.
    pub fn parse(root: &str) -> Result<Self, ResolveError> {
        Coordinate::parse(root)
            .map(Self::new)
            .map_err(|e| malformed(root, e))
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Add a dependency given as `group:name[:classifier]:constraint`.
    pub fn dependency(self, spec: &str, scope: Scope) -> Result<Self, ResolveError> {
        let dependency = Dependency::parse(spec).map_err(|e| malformed(spec, e))?;
        Ok(self.with_dependency(dependency.with_scope(scope)))
    }

    pub fn with_managed(mut self, managed: ManagedDependency) -> Self {
        self.managed.push(managed);
        self
    }

    pub fn with_exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repositories.push(repository);
        self
    }

    pub fn with_repositories(mut self, repositories: impl IntoIterator<Item = Repository>) -> Self {
        self.repositories.extend(repositories);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scopes.push(scope);
        self
    }

    fn validate(&self) -> Result<(), ResolveError> {
        self.root
            .validate()
            .map_err(|reason| ResolveError::MalformedCoordinate {
                input: self.root.to_string(),
                reason,
            })?;
        for dependency in &self.dependencies {
            dependency
                .validate()
                .map_err(|reason| ResolveError::MalformedCoordinate {
                    input: dependency.to_string(),
                    reason,
                })?;
        }
        Ok(())
    }
}

fn malformed(input: &str, error: GravenError) -> ResolveError {
    match error {
        GravenError::Coordinate { input, reason } => ResolveError::MalformedCoordinate { input, reason },
        other => ResolveError::MalformedCoordinate {
            input: input.to_string(),
            reason: other.to_string(),
        },
    }
}

/// The outcome of one resolution pass.
#[derive(Debug)]
pub struct Resolution {
    /// The dirty graph, every candidate version included.
    pub root: Arc<DependencyNode>,
    /// Selected packages passing the scope filter, breadth-first order.
    pub artifacts: Vec<ResolvedArtifact>,
    /// The winning version per package and the conflict report.
    pub selection: ConflictResolution,
    /// Dependency cycles that were cut.
    pub cycles: Vec<Vec<Arc<Coordinate>>>,
    /// Pool activity during this pass.
    pub stats: PoolStats,
}

impl Resolution {
    pub fn conflicts(&self) -> &ConflictReport {
        &self.selection.report
    }

    pub fn artifact(&self, id: &LogicalId) -> Option<&ResolvedArtifact> {
        self.artifacts
            .iter()
            .find(|a| a.coordinate.logical_id() == *id)
    }

    /// A package-level view of the selected graph.
    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::from_resolution(&self.root, &self.selection)
    }
}

/// Resolves requests against a pair of metadata collaborators.
pub struct Resolver<R, D, A = AppendRepositories> {
    ranges: Arc<R>,
    reader: Arc<D>,
    aggregator: Arc<A>,
    pool: Arc<Pool>,
    settings: ResolverSettings,
}

impl<R, D> Resolver<R, D>
where
    R: VersionRangeResolver,
    D: DescriptorReader,
{
    pub fn new(ranges: R, reader: D, settings: ResolverSettings) -> Self {
        Self::from_shared(Arc::new(ranges), Arc::new(reader), settings)
    }

    /// Share collaborators, e.g. one source implementing both traits.
    pub fn from_shared(ranges: Arc<R>, reader: Arc<D>, settings: ResolverSettings) -> Self {
        Self {
            ranges,
            reader,
            aggregator: Arc::new(AppendRepositories),
            pool: Arc::new(Pool::new()),
            settings,
        }
    }
}

#[cfg(feature = "maven")]
impl Resolver<graven_maven::source::MavenSource, graven_maven::source::MavenSource> {
    /// A resolver backed by the Maven repositories and cache in `config`.
    pub fn maven(config: &graven_core::config::GravenConfig) -> miette::Result<Self> {
        let source = Arc::new(graven_maven::source::MavenSource::from_config(config)?);
        Ok(Self::from_shared(Arc::clone(&source), source, config.resolver.clone()))
    }
}

impl<R, D, A> Resolver<R, D, A>
where
    R: VersionRangeResolver,
    D: DescriptorReader,
    A: RepositoryAggregator,
{
    pub fn with_aggregator<B: RepositoryAggregator>(self, aggregator: B) -> Resolver<R, D, B> {
        Resolver {
            ranges: self.ranges,
            reader: self.reader,
            aggregator: Arc::new(aggregator),
            pool: self.pool,
            settings: self.settings,
        }
    }

    /// Use a pool shared with earlier passes or other resolvers.
    pub fn with_pool(mut self, pool: Arc<Pool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub async fn resolve(&self, request: &ResolveRequest) -> Result<Resolution, ResolveError> {
        request.validate()?;
        if self.settings.jobs == 0 {
            return Err(ResolveError::Config {
                message: "resolver.jobs must be at least 1".to_string(),
            });
        }

        let started = Instant::now();
        let before = self.pool.stats();
        let builder = GraphBuilder::new(
            Arc::clone(&self.pool),
            Arc::clone(&self.ranges),
            Arc::clone(&self.reader),
            Arc::clone(&self.aggregator),
            Policies::from_settings(&self.settings, &request.exclusions, &request.managed),
            self.settings.jobs as usize,
            self.settings.cycles,
        );

        let deadline = self.settings.timeout();
        let build = builder.build(
            request.root.clone(),
            &request.dependencies,
            request.repositories.clone(),
        );
        let built = match tokio::time::timeout(deadline, build).await {
            Ok(Ok(built)) => built,
            Ok(Err(e)) => {
                self.pool.discard_unsealed();
                return Err(e);
            }
            Err(_) => {
                let in_flight = self.pool.in_flight();
                self.pool.discard_unsealed();
                return Err(ResolveError::Timeout {
                    after: deadline,
                    in_flight,
                });
            }
        };

        let selection = resolve_conflicts(&built.root, self.settings.strategy)?;
        let artifacts = flatten(&built.root, &selection, &request.scopes);
        let stats = self.pool.stats().since(&before);

        tracing::info!(
            "Resolved {} artifact(s) for {} in {:.2?}: {} conflict(s), {} cycle(s) cut, {} cache hit(s)",
            artifacts.len(),
            request.root,
            started.elapsed(),
            selection.report.len(),
            built.cycles.len(),
            stats.hits()
        );

        Ok(Resolution {
            root: built.root,
            artifacts,
            selection,
            cycles: built.cycles,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reports_malformed_root() {
        let err = ResolveRequest::parse("com.example:app").unwrap_err();
        match err {
            ResolveError::MalformedCoordinate { input, reason } => {
                assert_eq!(input, "com.example:app");
                assert!(reason.contains("segments"), "got: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dependency_strings_are_parsed_with_scope() {
        let request = ResolveRequest::parse("com.example:app:1.0")
            .unwrap()
            .dependency("org.example:lib:[1.0,2.0)", Scope::Runtime)
            .unwrap();
        assert_eq!(request.dependencies.len(), 1);
        assert_eq!(request.dependencies[0].scope, Scope::Runtime);
        assert!(request.dependencies[0].constraint.is_hard());

        let err = ResolveRequest::parse("com.example:app:1.0")
            .unwrap()
            .dependency("org.example:lib name:1.0", Scope::Compile)
            .unwrap_err();
        assert!(matches!(err, ResolveError::MalformedCoordinate { .. }));
    }

    #[test]
    fn validation_catches_hand_built_coordinates() {
        let request = ResolveRequest::new(Coordinate::new("com.example", "app", "1.0"))
            .with_dependency(Dependency::new("org:example", "lib", graven_core::dependency::VersionConstraint::Latest));
        assert!(matches!(
            request.validate(),
            Err(ResolveError::MalformedCoordinate { .. })
        ));
    }
}
