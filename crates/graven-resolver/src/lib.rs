//! Dependency resolution engine: a memoizing metadata pool, a parallel graph
//! builder driven by pluggable policies, Maven scope derivation, conflict
//! resolution with backtracking, and scope-filtered flattening.

pub mod builder;
pub mod conflict;
pub mod error;
pub mod flatten;
pub mod graph;
pub mod node;
pub mod policy;
pub mod pool;
pub mod resolver;

pub use conflict::{ConflictReport, ConflictResolution};
pub use error::{ConflictError, ResolveError};
pub use flatten::ResolvedArtifact;
pub use node::DependencyNode;
pub use pool::{Pool, PoolStats};
pub use resolver::{Resolution, ResolveRequest, Resolver};
