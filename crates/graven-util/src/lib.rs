//! Shared utilities for graven.
//!
//! This crate provides cross-cutting concerns used by the other graven crates:
//! the ambient error type, filesystem helpers for the metadata cache, and
//! checksum hashing for downloaded descriptors.

pub mod errors;
pub mod fs;
pub mod hash;
