//! Policies steering graph construction. Each is a small hashable value;
//! the state derived for a child subtree is part of the subgraph cache key.

use std::collections::{BTreeMap, BTreeSet};

use graven_core::config::ResolverSettings;
use graven_core::coordinate::LogicalId;
use graven_core::dependency::{Dependency, Exclusion, ManagedDependency, VersionConstraint};
use graven_core::scope::Scope;
use graven_core::version::MavenVersion;

/// Decides which declared dependencies become edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DependencySelector {
    exclusions: BTreeSet<Exclusion>,
    excluded_transitive_scopes: BTreeSet<Scope>,
    /// Depth saturated to direct (`false`) or transitive (`true`).
    transitive: bool,
}

impl DependencySelector {
    pub fn new(
        exclusions: impl IntoIterator<Item = Exclusion>,
        excluded_transitive_scopes: impl IntoIterator<Item = Scope>,
    ) -> Self {
        Self {
            exclusions: exclusions.into_iter().collect(),
            excluded_transitive_scopes: excluded_transitive_scopes.into_iter().collect(),
            transitive: false,
        }
    }

    pub fn select(&self, dependency: &Dependency) -> bool {
        let id = dependency.logical_id();
        if self.exclusions.iter().any(|e| e.matches(&id)) {
            return false;
        }
        if !self.transitive {
            return true;
        }
        !dependency.optional && !self.excluded_transitive_scopes.contains(&dependency.scope)
    }

    /// State for the children of `dependency`: its exclusions accumulate.
    pub fn derive_child(&self, dependency: &Dependency) -> Self {
        let mut exclusions = self.exclusions.clone();
        exclusions.extend(dependency.exclusions.iter().cloned());
        Self {
            exclusions,
            excluded_transitive_scopes: self.excluded_transitive_scopes.clone(),
            transitive: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct Override {
    constraint: Option<VersionConstraint>,
    scope: Option<Scope>,
}

/// Applies dependency management to transitive edges.
///
/// Version and scope overrides are tracked separately; for each, the first
/// declaration met walking down from the root wins, so caller-supplied
/// entries beat every descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DependencyManager {
    entries: BTreeMap<LogicalId, Override>,
    transitive: bool,
}

/// A dependency after management.
#[derive(Debug, Clone)]
pub struct Managed {
    pub dependency: Dependency,
    /// The declared scope, when management replaced it.
    pub premanaged_scope: Option<Scope>,
}

impl DependencyManager {
    pub fn new(managed: impl IntoIterator<Item = ManagedDependency>) -> Self {
        let mut manager = Self::default();
        manager.absorb(managed);
        manager
    }

    fn absorb(&mut self, managed: impl IntoIterator<Item = ManagedDependency>) {
        for entry in managed {
            let slot = self.entries.entry(entry.id).or_default();
            if slot.constraint.is_none() {
                slot.constraint = entry.constraint;
            }
            if slot.scope.is_none() {
                slot.scope = entry.scope;
            }
        }
    }

    pub fn manage(&self, dependency: &Dependency) -> Managed {
        let mut managed = Managed {
            dependency: dependency.clone(),
            premanaged_scope: None,
        };
        if !self.transitive {
            return managed;
        }
        let Some(entry) = self.entries.get(&dependency.logical_id()) else {
            return managed;
        };
        if let Some(ref constraint) = entry.constraint {
            if constraint != &dependency.constraint {
                tracing::debug!(
                    "Managing {} from {} to {constraint}",
                    dependency.logical_id(),
                    dependency.constraint
                );
                managed.dependency.constraint = constraint.clone();
            }
        }
        if let Some(scope) = entry.scope {
            if scope != dependency.scope {
                managed.premanaged_scope = Some(dependency.scope);
                managed.dependency.scope = scope;
            }
        }
        managed
    }

    /// State for the children of a node whose descriptor manages `declared`.
    pub fn derive_child(&self, declared: &[ManagedDependency]) -> Self {
        let mut child = self.clone();
        child.absorb(declared.iter().cloned());
        child.transitive = true;
        child
    }
}

/// Decides whether the children of a dependency are collected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyTraverser {
    leaf_scopes: BTreeSet<Scope>,
}

impl Default for DependencyTraverser {
    fn default() -> Self {
        Self::new([Scope::System])
    }
}

impl DependencyTraverser {
    pub fn new(leaf_scopes: impl IntoIterator<Item = Scope>) -> Self {
        Self {
            leaf_scopes: leaf_scopes.into_iter().collect(),
        }
    }

    pub fn traverse(&self, dependency: &Dependency) -> bool {
        !dependency.lacks_descriptor() && !self.leaf_scopes.contains(&dependency.scope)
    }
}

/// Narrows the candidates a range lookup returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionFilter {
    pub snapshots: bool,
    pub highest_only: bool,
}

impl Default for VersionFilter {
    fn default() -> Self {
        Self {
            snapshots: true,
            highest_only: false,
        }
    }
}

impl VersionFilter {
    /// Filter candidates for `constraint`. An exact version is never
    /// filtered; `latest` always keeps only the highest.
    pub fn apply(&self, constraint: &VersionConstraint, versions: &[MavenVersion]) -> Vec<MavenVersion> {
        if constraint.soft_version().is_some() {
            return versions.to_vec();
        }
        let kept = versions
            .iter()
            .filter(|v| self.snapshots || !v.is_snapshot())
            .cloned();
        if self.highest_only || matches!(constraint, VersionConstraint::Latest) {
            kept.max().into_iter().collect()
        } else {
            kept.collect()
        }
    }
}

/// The policy set a resolution starts from.
#[derive(Debug, Clone, Default)]
pub struct Policies {
    pub selector: DependencySelector,
    pub manager: DependencyManager,
    pub traverser: DependencyTraverser,
    pub filter: VersionFilter,
}

impl Policies {
    pub fn from_settings(
        settings: &ResolverSettings,
        exclusions: &[Exclusion],
        managed: &[ManagedDependency],
    ) -> Self {
        Self {
            selector: DependencySelector::new(
                exclusions.iter().cloned(),
                settings.excluded_transitive_scopes.iter().copied(),
            ),
            manager: DependencyManager::new(managed.iter().cloned()),
            traverser: DependencyTraverser::new(settings.leaf_scopes.iter().copied()),
            filter: VersionFilter {
                snapshots: settings.version_filter.snapshots,
                highest_only: settings.version_filter.highest_only,
            },
        }
    }
}
