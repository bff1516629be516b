//! An in-memory repository standing in for both metadata collaborators.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use graven_core::config::ResolverSettings;
use graven_core::coordinate::{Coordinate, LogicalId};
use graven_core::dependency::{Dependency, VersionConstraint};
use graven_core::repository::Repository;
use graven_core::scope::Scope;
use graven_core::source::{Descriptor, DescriptorReader, FetchError, VersionRangeResolver};
use graven_core::version::MavenVersion;
use graven_resolver::{ResolveRequest, Resolver};

/// A published version, visible everywhere or only in one repository.
struct Listed {
    version: String,
    repository: Option<String>,
}

impl Listed {
    fn visible_in(&self, repositories: &[Repository]) -> bool {
        match self.repository {
            Some(ref id) => repositories.iter().any(|r| &r.id == id),
            None => true,
        }
    }
}

#[derive(Default)]
pub struct FakeRepository {
    versions: HashMap<LogicalId, Vec<Listed>>,
    descriptors: HashMap<Coordinate, (Descriptor, Option<String>)>,
    delays: HashMap<Coordinate, Duration>,
    hanging: HashSet<Coordinate>,
    /// Every lookup as `(id or coordinate, repository ids)`.
    lookups: Mutex<Vec<(String, Vec<String>)>>,
    pub range_calls: AtomicUsize,
    pub descriptor_calls: AtomicUsize,
}

pub fn coord(s: &str) -> Coordinate {
    Coordinate::parse(s).unwrap()
}

pub fn dep(spec: &str, scope: Scope) -> Dependency {
    Dependency::parse(spec).unwrap().with_scope(scope)
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// List the descriptor's version and serve it.
    pub fn publish(self, descriptor: Descriptor) -> Self {
        self.host(None, descriptor)
    }

    /// Publish `coordinate` in the repository `repository` only.
    pub fn publish_in(self, repository: &str, coordinate: &str, dependencies: &[&str]) -> Self {
        let mut descriptor = Descriptor::new(coord(coordinate));
        for d in dependencies {
            descriptor = descriptor.with_dependency(dep(d, Scope::Compile));
        }
        self.host(Some(repository.to_string()), descriptor)
    }

    fn host(mut self, repository: Option<String>, descriptor: Descriptor) -> Self {
        let coordinate = descriptor.coordinate.clone();
        self.list_in(&coordinate, repository.clone());
        self.descriptors.insert(coordinate, (descriptor, repository));
        self
    }

    /// Publish `coordinate` with compile-scoped dependencies.
    pub fn package(self, coordinate: &str, dependencies: &[&str]) -> Self {
        let mut descriptor = Descriptor::new(coord(coordinate));
        for d in dependencies {
            descriptor = descriptor.with_dependency(dep(d, Scope::Compile));
        }
        self.publish(descriptor)
    }

    /// Serve `to`'s coordinate when `from` is read.
    pub fn relocate(mut self, from: &str, to: &str) -> Self {
        let from = coord(from);
        self.list_in(&from, None);
        self.descriptors.insert(from, (Descriptor::new(coord(to)), None));
        self
    }

    pub fn delay(mut self, coordinate: &str, delay: Duration) -> Self {
        self.delays.insert(coord(coordinate), delay);
        self
    }

    /// Reading this descriptor never completes.
    pub fn hang(mut self, coordinate: &str) -> Self {
        let coordinate = coord(coordinate);
        self.list_in(&coordinate, None);
        self.hanging.insert(coordinate);
        self
    }

    fn list_in(&mut self, coordinate: &Coordinate, repository: Option<String>) {
        let listed = self.versions.entry(coordinate.logical_id()).or_default();
        if !listed
            .iter()
            .any(|l| l.version == coordinate.version && l.repository == repository)
        {
            listed.push(Listed {
                version: coordinate.version.clone(),
                repository,
            });
        }
    }

    fn record(&self, key: String, repositories: &[Repository]) {
        let ids = repositories.iter().map(|r| r.id.clone()).collect();
        self.lookups.lock().unwrap().push((key, ids));
    }

    /// The distinct repository lists `key` was looked up with, sorted.
    pub fn repositories_seen(&self, key: &str) -> Vec<Vec<String>> {
        let mut seen: Vec<Vec<String>> = self
            .lookups
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, ids)| ids.clone())
            .collect();
        seen.sort();
        seen.dedup();
        seen
    }
}

impl VersionRangeResolver for FakeRepository {
    async fn resolve_version_range(
        &self,
        id: &LogicalId,
        constraint: &VersionConstraint,
        repositories: &[Repository],
    ) -> Result<Vec<MavenVersion>, FetchError> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        self.record(id.to_string(), repositories);
        if let Some(version) = constraint.soft_version() {
            return Ok(vec![version.clone()]);
        }
        let listed = self
            .versions
            .get(id)
            .ok_or_else(|| FetchError::not_found(id))?;
        let mut matching: Vec<MavenVersion> = listed
            .iter()
            .filter(|l| l.visible_in(repositories))
            .map(|l| MavenVersion::parse(&l.version))
            .filter(|v| constraint.allows(v))
            .collect();
        matching.sort();
        matching.dedup_by(|a, b| a.as_str() == b.as_str());
        Ok(matching)
    }
}

impl DescriptorReader for FakeRepository {
    async fn read_descriptor(
        &self,
        coordinate: &Coordinate,
        repositories: &[Repository],
    ) -> Result<Descriptor, FetchError> {
        self.descriptor_calls.fetch_add(1, Ordering::SeqCst);
        self.record(coordinate.to_string(), repositories);
        if let Some(delay) = self.delays.get(coordinate) {
            tokio::time::sleep(*delay).await;
        }
        if self.hanging.contains(coordinate) {
            std::future::pending::<()>().await;
        }
        match self.descriptors.get(coordinate) {
            Some((descriptor, None)) => Ok(descriptor.clone()),
            Some((descriptor, Some(id))) if repositories.iter().any(|r| &r.id == id) => {
                Ok(descriptor.clone())
            }
            _ => Err(FetchError::not_found(coordinate)),
        }
    }
}

pub fn settings() -> ResolverSettings {
    ResolverSettings {
        jobs: 4,
        timeout_secs: 10,
        ..ResolverSettings::default()
    }
}

pub fn resolver(
    repository: FakeRepository,
    settings: ResolverSettings,
) -> (Arc<FakeRepository>, Resolver<FakeRepository, FakeRepository>) {
    let repository = Arc::new(repository);
    let resolver = Resolver::from_shared(Arc::clone(&repository), Arc::clone(&repository), settings);
    (repository, resolver)
}

pub fn request() -> ResolveRequest {
    ResolveRequest::parse("com.example:app:1.0")
        .unwrap()
        .with_repository(Repository::maven_central())
}

/// `group:name:version scope` for each artifact, in output order.
pub fn rendered(resolution: &graven_resolver::Resolution) -> Vec<String> {
    resolution
        .artifacts
        .iter()
        .map(|a| format!("{} {}", a.coordinate, a.scope))
        .collect()
}
