//! Collaborator interfaces the resolution engine consumes.
//!
//! The engine never talks to a repository directly. It asks a
//! [`VersionRangeResolver`] which versions exist, a [`DescriptorReader`]
//! what a concrete package depends on, and a [`RepositoryAggregator`] how to
//! combine repository lists when a descriptor declares its own.

use std::future::Future;

use thiserror::Error;

use crate::coordinate::{Coordinate, LogicalId};
use crate::dependency::{Dependency, ManagedDependency, VersionConstraint};
use crate::repository::Repository;
use crate::version::MavenVersion;

/// A branch-local lookup failure.
///
/// Cloneable so the metadata pool can cache it and hand the same failure to
/// every caller of the same key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("{what} not found in any repository")]
    NotFound { what: String },

    #[error("failed to fetch {what}: {message}")]
    Failed { what: String, message: String },
}

impl FetchError {
    pub fn not_found(what: impl ToString) -> Self {
        Self::NotFound {
            what: what.to_string(),
        }
    }

    pub fn failed(what: impl ToString, message: impl ToString) -> Self {
        Self::Failed {
            what: what.to_string(),
            message: message.to_string(),
        }
    }
}

/// Metadata for a concrete package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// The coordinate the descriptor describes. Differs from the requested
    /// coordinate when the package has been relocated.
    pub coordinate: Coordinate,
    /// Relocations the reader followed on its own before answering.
    pub relocations: Vec<Coordinate>,
    pub dependencies: Vec<Dependency>,
    /// Dependency-management overrides for this package's subtree.
    pub managed: Vec<ManagedDependency>,
    /// Repositories the descriptor declares for its own dependencies.
    pub repositories: Vec<Repository>,
}

impl Descriptor {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            relocations: Vec::new(),
            dependencies: Vec::new(),
            managed: Vec::new(),
            repositories: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_managed(mut self, managed: ManagedDependency) -> Self {
        self.managed.push(managed);
        self
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repositories.push(repository);
        self
    }

    /// Whether reading `requested` produced a descriptor for another package.
    pub fn relocates(&self, requested: &Coordinate) -> bool {
        &self.coordinate != requested
    }
}

/// Lists the concrete versions matching a constraint.
pub trait VersionRangeResolver: Send + Sync + 'static {
    /// Return matching versions, ascending. An empty list is a valid answer.
    fn resolve_version_range(
        &self,
        id: &LogicalId,
        constraint: &VersionConstraint,
        repositories: &[Repository],
    ) -> impl Future<Output = Result<Vec<MavenVersion>, FetchError>> + Send;
}

/// Reads the descriptor of a concrete package.
pub trait DescriptorReader: Send + Sync + 'static {
    fn read_descriptor(
        &self,
        coordinate: &Coordinate,
        repositories: &[Repository],
    ) -> impl Future<Output = Result<Descriptor, FetchError>> + Send;
}

/// Combines an inherited repository list with descriptor-declared ones.
pub trait RepositoryAggregator: Send + Sync + 'static {
    fn aggregate(&self, base: &[Repository], additional: &[Repository]) -> Vec<Repository>;
}

/// Appends unseen repositories after the inherited ones; ids decide identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendRepositories;

impl RepositoryAggregator for AppendRepositories {
    fn aggregate(&self, base: &[Repository], additional: &[Repository]) -> Vec<Repository> {
        let mut merged = base.to_vec();
        for repo in additional {
            if !merged.iter().any(|r| r.id == repo.id) {
                merged.push(repo.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_keeps_base_order_and_dedupes_by_id() {
        let base = vec![Repository::maven_central()];
        let extra = vec![
            Repository::new("central", "https://mirror.example.com/maven2"),
            Repository::new("google", "https://maven.google.com"),
        ];
        let merged = AppendRepositories.aggregate(&base, &extra);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], Repository::maven_central());
        assert_eq!(merged[1].id, "google");
    }

    #[test]
    fn relocation_is_coordinate_inequality() {
        let requested = Coordinate::new("old", "lib", "1.0");
        let same = Descriptor::new(requested.clone());
        let moved = Descriptor::new(Coordinate::new("new", "lib", "1.0"));
        assert!(!same.relocates(&requested));
        assert!(moved.relocates(&requested));
    }
}
