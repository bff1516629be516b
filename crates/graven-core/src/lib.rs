//! Core data types for graven.
//!
//! This crate defines the vocabulary shared by the resolution engine and its
//! collaborators: coordinates and logical identities, scopes and the scope
//! derivation table, dependency edges with version constraints, Maven version
//! ordering, the collaborator traits, and user configuration.
//!
//! This crate is intentionally free of network I/O.

pub mod config;
pub mod coordinate;
pub mod dependency;
pub mod repository;
pub mod scope;
pub mod source;
pub mod version;
