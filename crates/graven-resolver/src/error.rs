//! Fatal resolution errors. Branch-local lookup failures never reach this
//! type: they are logged and the branch is dropped.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use graven_core::coordinate::{Coordinate, LogicalId};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Unsolvable(#[from] ConflictError),

    #[error("resolution timed out after {after:?} with {} operation(s) in flight{}", .in_flight.len(), bullet_list(.in_flight))]
    #[diagnostic(
        code(graven::resolve::timeout),
        help("Raise `resolver.timeout-secs` in ~/.graven/config.toml or check repository connectivity")
    )]
    Timeout {
        after: Duration,
        in_flight: Vec<String>,
    },

    #[error("relocation cycle: {}", render_chain(.chain))]
    #[diagnostic(code(graven::resolve::relocation_cycle))]
    RelocationCycle { chain: Vec<Coordinate> },

    #[error("dependency cycle: {}", render_chain(.path))]
    #[diagnostic(
        code(graven::resolve::dependency_cycle),
        help("Set `resolver.cycles = \"cut\"` to keep the repeated package as a leaf instead")
    )]
    DependencyCycle { path: Vec<Coordinate> },

    #[error("malformed coordinate `{input}`: {reason}")]
    #[diagnostic(
        code(graven::resolve::coordinate),
        help("Coordinates look like `group:name:version` or `group:name:classifier:version`")
    )]
    MalformedCoordinate { input: String, reason: String },

    #[error("invalid resolver configuration: {message}")]
    #[diagnostic(code(graven::resolve::config))]
    Config { message: String },
}

/// No candidate of a package satisfies every hard constraint placed on it.
#[derive(Debug, Error, Diagnostic)]
#[error("no version of {id} satisfies every constraint{}{}", render_constraints(.constraints), render_candidates(.candidates))]
#[diagnostic(
    code(graven::resolve::unsolvable),
    help("Widen one of the version ranges, or pin the package with a managed dependency")
)]
pub struct ConflictError {
    pub id: LogicalId,
    /// Every hard constraint with the path of the node that declared it.
    pub constraints: Vec<ConstraintPath>,
    /// Every candidate the group considered, with its root path.
    pub candidates: Vec<CandidatePath>,
}

#[derive(Debug, Clone)]
pub struct ConstraintPath {
    pub constraint: String,
    pub path: Vec<Arc<Coordinate>>,
}

#[derive(Debug, Clone)]
pub struct CandidatePath {
    pub coordinate: Arc<Coordinate>,
    pub path: Vec<Arc<Coordinate>>,
}

fn render_chain<T: std::fmt::Display>(chain: &[T]) -> String {
    chain
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn bullet_list(items: &[String]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = write!(out, "\n  - {item}");
    }
    out
}

fn render_constraints(constraints: &[ConstraintPath]) -> String {
    let mut out = String::new();
    for c in constraints {
        let _ = write!(out, "\n  {} required by {}", c.constraint, render_chain(&c.path));
    }
    out
}

fn render_candidates(candidates: &[CandidatePath]) -> String {
    let mut out = String::new();
    for c in candidates {
        let _ = write!(out, "\n  candidate {} via {}", c.coordinate, render_chain(&c.path));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocation_cycle_renders_chain() {
        let err = ResolveError::RelocationCycle {
            chain: vec![
                Coordinate::new("a", "a", "1"),
                Coordinate::new("b", "b", "1"),
                Coordinate::new("a", "a", "1"),
            ],
        };
        assert_eq!(err.to_string(), "relocation cycle: a:a:1 -> b:b:1 -> a:a:1");
    }

    #[test]
    fn timeout_lists_pending_operations() {
        let err = ResolveError::Timeout {
            after: Duration::from_secs(2),
            in_flight: vec!["descriptor of g:a:1.0".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("1 operation(s) in flight"), "got: {msg}");
        assert!(msg.contains("- descriptor of g:a:1.0"), "got: {msg}");
    }

    #[test]
    fn unsolvable_lists_every_path() {
        let root = Arc::new(Coordinate::new("com.example", "app", "1.0"));
        let lib = Arc::new(Coordinate::new("org.example", "lib", "1.0"));
        let err = ConflictError {
            id: LogicalId::new("org.example", "lib"),
            constraints: vec![ConstraintPath {
                constraint: "[3.0,)".to_string(),
                path: vec![root.clone()],
            }],
            candidates: vec![CandidatePath {
                coordinate: lib.clone(),
                path: vec![root, lib],
            }],
        };
        let msg = err.to_string();
        assert!(msg.contains("no version of org.example:lib"));
        assert!(msg.contains("[3.0,) required by com.example:app:1.0"));
        assert!(msg.contains("candidate org.example:lib:1.0 via com.example:app:1.0 -> org.example:lib:1.0"));
    }
}
