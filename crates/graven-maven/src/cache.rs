//! On-disk descriptor cache mirroring the Maven repository layout.
//!
//! Released POMs never change, so a cached copy is served without touching
//! the network. Version listings are not cached here: they change over time
//! and are memoized per resolution pass by the engine's pool instead.

use std::fs;
use std::path::{Path, PathBuf};

use graven_core::coordinate::Coordinate;
use graven_util::errors::GravenError;

use crate::pom::{self, Pom};

/// Descriptor cache rooted at the configured `[cache] dir`.
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of this cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory within the cache for a given Maven coordinate.
    pub fn version_dir(&self, group: &str, artifact: &str, version: &str) -> PathBuf {
        self.root
            .join(group.replace('.', "/"))
            .join(artifact)
            .join(version)
    }

    /// Path of the cached POM for a coordinate.
    pub fn pom_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.version_dir(&coordinate.group, &coordinate.name, &coordinate.version)
            .join(format!("{}-{}.pom", coordinate.name, coordinate.version))
    }

    /// Raw POM XML if cached.
    pub fn get_pom_xml(&self, coordinate: &Coordinate) -> Option<String> {
        let path = self.pom_path(coordinate);
        if !path.is_file() {
            return None;
        }
        fs::read_to_string(&path).ok()
    }

    /// Parsed POM if cached and well-formed. A corrupt entry reads as a miss.
    pub fn get_pom(&self, coordinate: &Coordinate) -> Option<Pom> {
        let xml = self.get_pom_xml(coordinate)?;
        match pom::parse_pom(&xml) {
            Ok(pom) => Some(pom),
            Err(e) => {
                tracing::warn!("Ignoring corrupt cached POM for {coordinate}: {e}");
                None
            }
        }
    }

    /// Store a POM, replacing any previous copy atomically.
    pub fn put_pom(&self, coordinate: &Coordinate, pom_xml: &str) -> miette::Result<PathBuf> {
        let path = self.pom_path(coordinate);
        graven_util::fs::write_atomic(&path, pom_xml.as_bytes()).map_err(GravenError::Io)?;
        Ok(path)
    }
}
