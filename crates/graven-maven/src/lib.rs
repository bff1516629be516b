//! Maven repository collaborator: POM parsing, version metadata, artifact
//! layout, authenticated download, checksum verification, and a local
//! descriptor cache, wired together by [`source::MavenSource`].

pub mod cache;
pub mod checksum;
pub mod download;
pub mod metadata;
pub mod pom;
pub mod repository;
pub mod source;
