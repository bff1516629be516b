//! [`MavenSource`]: the Maven 2 repository implementation of the engine's
//! version-range and descriptor collaborators.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

use graven_core::config::{CredentialEntry, GravenConfig};
use graven_core::coordinate::{Coordinate, LogicalId};
use graven_core::dependency::VersionConstraint;
use graven_core::repository::Repository;
use graven_core::source::{Descriptor, DescriptorReader, FetchError, VersionRangeResolver};
use graven_core::version::MavenVersion;
use graven_util::errors::GravenError;

use crate::cache::LocalCache;
use crate::pom::{self, Pom, PomDependency};
use crate::repository::MavenRepository;
use crate::download::Downloader;
use crate::metadata::{self, VersionListing};
use crate::checksum;

const MAX_PARENT_DEPTH: usize = 32;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Reads POMs and version listings from Maven repositories through a local
/// descriptor cache.
#[derive(Debug, Clone)]
pub struct MavenSource {
    downloader: Downloader,
    cache: LocalCache,
    credentials: BTreeMap<String, CredentialEntry>,
    verify_checksums: bool,
}

impl MavenSource {
    pub fn new(downloader: Downloader, cache: LocalCache) -> Self {
        Self {
            downloader,
            cache,
            credentials: BTreeMap::new(),
            verify_checksums: true,
        }
    }

    /// A source using the cache directory and credentials from `config`.
    pub fn from_config(config: &GravenConfig) -> miette::Result<Self> {
        let downloader = Downloader::new(REQUEST_TIMEOUT)?;
        Ok(Self::new(downloader, LocalCache::new(config.cache_dir()))
            .with_credentials(config.credentials.clone()))
    }

    /// Credentials by repository id.
    pub fn with_credentials(mut self, credentials: BTreeMap<String, CredentialEntry>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    fn remote(&self, repo: &Repository) -> MavenRepository {
        MavenRepository::from_repository(repo, self.credentials.get(&repo.id))
    }

    /// POM XML from the cache, else from the first repository that has it.
    ///
    /// A repository that errors is skipped; the error surfaces only when no
    /// other repository has the file.
    async fn fetch_pom_xml(
        &self,
        coordinate: &Coordinate,
        repositories: &[Repository],
    ) -> miette::Result<Option<String>> {
        if let Some(xml) = self.cache.get_pom_xml(coordinate) {
            tracing::debug!("POM cache hit for {coordinate}");
            return Ok(Some(xml));
        }

        let mut last_err = None;
        for repo in repositories {
            let remote = self.remote(repo);
            let url = remote.pom_url(coordinate);
            let bytes = match self.downloader.fetch(&remote, &url).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Fetching {coordinate} from {} failed: {e}", remote.name);
                    last_err = Some(e);
                    continue;
                }
            };
            if self.verify_checksums {
                if let Err(e) = checksum::verify(&self.downloader, &remote, &url, &bytes).await {
                    tracing::warn!("Rejecting {coordinate} from {}: {e}", remote.name);
                    last_err = Some(e);
                    continue;
                }
            }
            let xml = String::from_utf8_lossy(&bytes).to_string();
            self.cache.put_pom(coordinate, &xml)?;
            tracing::debug!("Fetched POM for {coordinate} from {}", remote.name);
            return Ok(Some(xml));
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn load_pom(
        &self,
        coordinate: &Coordinate,
        repositories: &[Repository],
    ) -> miette::Result<Option<Pom>> {
        match self.fetch_pom_xml(coordinate, repositories).await? {
            Some(xml) => pom::parse_pom(&xml).map(Some),
            None => Ok(None),
        }
    }

    /// The POM of `coordinate` with its parent chain and BOM imports merged
    /// and properties interpolated.
    pub async fn effective_pom(
        &self,
        coordinate: &Coordinate,
        repositories: &[Repository],
    ) -> miette::Result<Option<Pom>> {
        let Some(mut pom) = self.load_pom(coordinate, repositories).await? else {
            return Ok(None);
        };
        let search = searched_repositories(repositories, &pom);
        self.merge_parents(&mut pom, coordinate, &search).await?;
        pom.resolve_properties();
        self.merge_boms(&mut pom, &search).await?;
        Ok(Some(pom))
    }

    async fn merge_parents(
        &self,
        pom: &mut Pom,
        coordinate: &Coordinate,
        repositories: &[Repository],
    ) -> miette::Result<()> {
        let mut seen = vec![coordinate.clone()];
        let mut next = pom.parent.clone();
        while let Some(parent_ref) = next {
            let parent_coord = parent_ref.coordinate();
            if seen.contains(&parent_coord) || seen.len() > MAX_PARENT_DEPTH {
                return Err(GravenError::Descriptor {
                    message: format!("parent chain of {coordinate} loops at {parent_coord}"),
                }
                .into());
            }
            let Some(parent) = self.load_pom(&parent_coord, repositories).await? else {
                return Err(GravenError::Descriptor {
                    message: format!("parent POM {parent_coord} of {coordinate} not found"),
                }
                .into());
            };
            pom.apply_parent(&parent);
            seen.push(parent_coord);
            next = parent.parent;
        }
        Ok(())
    }

    /// Merge `import`-scoped BOMs, breadth first: earlier imports win.
    async fn merge_boms(&self, pom: &mut Pom, repositories: &[Repository]) -> miette::Result<()> {
        let mut queue: VecDeque<Coordinate> = bom_coordinates(&pom.bom_imports()).collect();
        let mut seen = HashSet::new();
        while let Some(bom_coord) = queue.pop_front() {
            if !seen.insert(bom_coord.clone()) {
                continue;
            }
            let Some(mut bom) = self.load_pom(&bom_coord, repositories).await? else {
                tracing::warn!("BOM {bom_coord} not found; its managed versions are ignored");
                continue;
            };
            self.merge_parents(&mut bom, &bom_coord, repositories).await?;
            bom.resolve_properties();
            queue.extend(bom_coordinates(&bom.bom_imports()));
            pom.apply_bom(&bom);
        }
        Ok(())
    }
}

fn bom_coordinates<'a>(
    imports: &'a [&'a PomDependency],
) -> impl Iterator<Item = Coordinate> + 'a {
    imports.iter().filter_map(|d| {
        let version = d.version.as_deref()?;
        (!version.contains("${"))
            .then(|| Coordinate::new(&d.group_id, &d.artifact_id, version))
    })
}

/// Repositories to search for a POM's parents and BOMs: the inherited list
/// followed by the ones the POM declares.
fn searched_repositories(inherited: &[Repository], pom: &Pom) -> Vec<Repository> {
    let mut repos = inherited.to_vec();
    for declared in &pom.repositories {
        if !declared.url.is_empty() && !repos.iter().any(|r| r.id == declared.id) {
            repos.push(Repository::new(declared.id.clone(), declared.url.clone()));
        }
    }
    repos
}

impl VersionRangeResolver for MavenSource {
    async fn resolve_version_range(
        &self,
        id: &LogicalId,
        constraint: &VersionConstraint,
        repositories: &[Repository],
    ) -> Result<Vec<MavenVersion>, FetchError> {
        if let Some(version) = constraint.soft_version() {
            return Ok(vec![version.clone()]);
        }

        let mut listings = Vec::new();
        let mut last_err = None;
        for repo in repositories {
            let remote = self.remote(repo);
            let url = remote.metadata_url(&id.group, &id.name);
            match self.downloader.fetch_text(&remote, &url).await {
                Ok(Some(xml)) => match VersionListing::parse(&xml) {
                    Ok(meta) => listings.push(meta),
                    Err(e) => {
                        tracing::warn!("Unreadable metadata for {id} in {}: {e}", remote.name);
                        last_err = Some(e.to_string());
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Listing versions of {id} in {} failed: {e}", remote.name);
                    last_err = Some(e.to_string());
                }
            }
        }

        if listings.is_empty() {
            return Err(match last_err {
                Some(message) => FetchError::failed(format!("versions of {id}"), message),
                None => FetchError::not_found(format!("versions of {id}")),
            });
        }
        Ok(metadata::matching_versions(&listings, constraint))
    }
}

impl DescriptorReader for MavenSource {
    async fn read_descriptor(
        &self,
        coordinate: &Coordinate,
        repositories: &[Repository],
    ) -> Result<Descriptor, FetchError> {
        match self.effective_pom(coordinate, repositories).await {
            Ok(Some(pom)) => Ok(pom.to_descriptor(coordinate)),
            Ok(None) => Err(FetchError::not_found(coordinate)),
            Err(e) => Err(FetchError::failed(coordinate, e)),
        }
    }
}
