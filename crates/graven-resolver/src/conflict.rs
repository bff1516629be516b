//! Conflict resolution: one winning version per logical package, with
//! backtracking when a range invalidates the current winner.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use graven_core::config::ConflictStrategy;
use graven_core::coordinate::{Coordinate, LogicalId};
use graven_core::dependency::VersionConstraint;
use graven_core::version::MavenVersion;

use crate::error::{CandidatePath, ConflictError, ConstraintPath};
use crate::node::DependencyNode;

/// One node offered to a conflict group.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub coordinate: Arc<Coordinate>,
    pub version: MavenVersion,
    /// Edges from the root; direct dependencies sit at depth 1.
    pub depth: usize,
    /// Coordinates from the root down to this node, inclusive.
    pub path: Vec<Arc<Coordinate>>,
}

impl Candidate {
    pub fn new(coordinate: Arc<Coordinate>, depth: usize, path: Vec<Arc<Coordinate>>) -> Self {
        Self {
            version: MavenVersion::parse(&coordinate.version),
            coordinate,
            depth,
            path,
        }
    }

    fn path_text(&self) -> String {
        self.path
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(">")
    }
}

/// Total order over candidates: `Less` means `a` beats `b`. Ties on the
/// strategy's own criteria fall back to the version text and then the path
/// text, so the winner never depends on traversal order.
pub fn compare(strategy: ConflictStrategy, a: &Candidate, b: &Candidate) -> Ordering {
    let primary = match strategy {
        ConflictStrategy::Highest => b.version.cmp(&a.version).then(a.depth.cmp(&b.depth)),
        ConflictStrategy::Nearest => a.depth.cmp(&b.depth).then(b.version.cmp(&a.version)),
    };
    primary
        .then_with(|| a.coordinate.version.cmp(&b.coordinate.version))
        .then_with(|| a.path_text().cmp(&b.path_text()))
}

#[derive(Debug, Clone)]
struct Constraint {
    constraint: VersionConstraint,
    path: Vec<Arc<Coordinate>>,
}

/// Every node sharing one logical identity.
#[derive(Debug)]
pub struct ConflictGroup {
    id: LogicalId,
    strategy: ConflictStrategy,
    constraints: Vec<Constraint>,
    considered: Vec<Candidate>,
    /// Indices into `considered` that satisfy every constraint so far.
    pool: Vec<usize>,
    winner: Option<usize>,
}

impl ConflictGroup {
    pub fn new(id: LogicalId, strategy: ConflictStrategy) -> Self {
        Self {
            id,
            strategy,
            constraints: Vec::new(),
            considered: Vec::new(),
            pool: Vec::new(),
            winner: None,
        }
    }

    fn satisfies(&self, candidate: &Candidate) -> bool {
        self.constraints
            .iter()
            .all(|c| c.constraint.allows(&candidate.version))
    }

    fn better(&self, a: usize, b: usize) -> usize {
        match compare(self.strategy, &self.considered[a], &self.considered[b]) {
            Ordering::Greater => b,
            _ => a,
        }
    }

    /// Offer a node. It joins the pool when it satisfies every constraint
    /// recorded so far.
    pub fn offer(&mut self, candidate: Candidate) {
        let index = self.considered.len();
        let eligible = self.satisfies(&candidate);
        self.considered.push(candidate);
        if !eligible {
            return;
        }
        self.pool.push(index);
        self.winner = Some(match self.winner {
            Some(current) => self.better(index, current),
            None => index,
        });
    }

    /// Record a hard constraint. When it invalidates the winner, the pool is
    /// narrowed and a new winner elected. An empty pool is not yet an error:
    /// a later offer may still satisfy every constraint, so only
    /// [`finish`](Self::finish) decides the group is unsolvable.
    pub fn add_constraint(&mut self, constraint: VersionConstraint, path: Vec<Arc<Coordinate>>) {
        if !constraint.is_hard() {
            return;
        }
        if self
            .constraints
            .iter()
            .any(|c| c.constraint == constraint && c.path == path)
        {
            return;
        }
        self.constraints.push(Constraint { constraint, path });

        let considered = &self.considered;
        let constraints = &self.constraints;
        self.pool.retain(|&i| {
            constraints
                .iter()
                .all(|c| c.constraint.allows(&considered[i].version))
        });

        if let Some(current) = self.winner {
            if !self.pool.contains(&current) {
                tracing::debug!(
                    "Backtracking {}: {} excluded by {}",
                    self.id,
                    self.considered[current].coordinate,
                    self.constraints[self.constraints.len() - 1].constraint
                );
                self.winner = self
                    .pool
                    .iter()
                    .copied()
                    .reduce(|a, b| self.better(a, b));
            }
        }
    }

    pub fn winner(&self) -> Option<&Candidate> {
        self.winner.map(|i| &self.considered[i])
    }

    /// Distinct versions offered, ascending.
    pub fn versions(&self) -> Vec<&str> {
        let mut seen: Vec<&Candidate> = Vec::new();
        for candidate in &self.considered {
            if !seen.iter().any(|c| c.coordinate.version == candidate.coordinate.version) {
                seen.push(candidate);
            }
        }
        seen.sort_by(|a, b| a.version.cmp(&b.version));
        seen.into_iter().map(|c| c.coordinate.version.as_str()).collect()
    }

    pub fn finish(self) -> Result<Option<Candidate>, ConflictError> {
        if self.winner.is_none() && !self.considered.is_empty() {
            return Err(self.unsolvable());
        }
        let Self {
            mut considered,
            winner,
            ..
        } = self;
        Ok(winner.map(|i| considered.swap_remove(i)))
    }

    fn unsolvable(&self) -> ConflictError {
        ConflictError {
            id: self.id.clone(),
            constraints: self
                .constraints
                .iter()
                .map(|c| ConstraintPath {
                    constraint: c.constraint.to_string(),
                    path: c.path.clone(),
                })
                .collect(),
            candidates: self
                .considered
                .iter()
                .map(|c| CandidatePath {
                    coordinate: Arc::clone(&c.coordinate),
                    path: c.path.clone(),
                })
                .collect(),
        }
    }
}

/// The winning version of every logical package in a graph.
#[derive(Debug, Default)]
pub struct ConflictResolution {
    pub winners: BTreeMap<LogicalId, Candidate>,
    pub report: ConflictReport,
}

impl ConflictResolution {
    /// Whether `node` is at its group's winning version.
    pub fn is_selected(&self, node: &DependencyNode) -> bool {
        self.winners
            .get(&node.logical_id())
            .is_some_and(|w| w.coordinate.version == node.coordinate.version)
    }
}

/// A node reached by the breadth-first walk, at its shallowest depth.
pub(crate) struct Visit {
    pub node: Arc<DependencyNode>,
    pub depth: usize,
    pub path: Vec<Arc<Coordinate>>,
}

/// Breadth-first walk over sorted children visiting each node instance once.
pub(crate) fn walk(root: &Arc<DependencyNode>) -> Vec<Visit> {
    let mut seen: HashSet<*const DependencyNode> = HashSet::new();
    let mut queue = VecDeque::new();
    let mut visits = Vec::new();
    seen.insert(Arc::as_ptr(root));
    queue.push_back(Visit {
        node: Arc::clone(root),
        depth: 0,
        path: vec![Arc::clone(&root.coordinate)],
    });
    while let Some(visit) = queue.pop_front() {
        for child in visit.node.sorted_children() {
            if !seen.insert(Arc::as_ptr(&child)) {
                continue;
            }
            let mut path = visit.path.clone();
            path.push(Arc::clone(&child.coordinate));
            queue.push_back(Visit {
                node: child,
                depth: visit.depth + 1,
                path,
            });
        }
        visits.push(visit);
    }
    visits
}

/// Pick one version per logical package across the whole dirty graph.
///
/// Nodes are offered in breadth-first order with each node's own range
/// recorded right after it. Groups are only judged once the walk is over,
/// so the outcome does not depend on which sibling is visited first.
pub fn resolve_conflicts(
    root: &Arc<DependencyNode>,
    strategy: ConflictStrategy,
) -> Result<ConflictResolution, ConflictError> {
    let mut groups: BTreeMap<LogicalId, ConflictGroup> = BTreeMap::new();
    for visit in walk(root) {
        let id = visit.node.logical_id();
        let group = groups
            .entry(id.clone())
            .or_insert_with(|| ConflictGroup::new(id, strategy));
        let declaring = visit.path[..visit.path.len() - 1].to_vec();
        group.offer(Candidate::new(
            Arc::clone(&visit.node.coordinate),
            visit.depth,
            visit.path,
        ));
        if let Some(ref dependency) = visit.node.dependency {
            if !dependency.lacks_descriptor() {
                group.add_constraint(dependency.constraint.clone(), declaring);
            }
        }
    }

    let mut resolution = ConflictResolution::default();
    for (id, group) in groups {
        let versions: Vec<String> = group.versions().into_iter().map(str::to_string).collect();
        let constrained: Vec<String> = group
            .constraints
            .iter()
            .map(|c| c.constraint.to_string())
            .collect();
        let Some(winner) = group.finish()? else {
            continue;
        };
        if versions.len() > 1 {
            let mut reason = match strategy {
                ConflictStrategy::Nearest => format!("nearest wins (depth {})", winner.depth),
                ConflictStrategy::Highest => "highest version wins".to_string(),
            };
            if !constrained.is_empty() {
                reason.push_str(&format!(", within {}", constrained.join(" and ")));
            }
            resolution.report.add(VersionConflict {
                id: id.clone(),
                requested: versions,
                resolved: winner.coordinate.version.clone(),
                reason,
            });
        }
        resolution.winners.insert(id, winner);
    }
    Ok(resolution)
}

/// Every package that was seen at more than one version.
#[derive(Debug, Default)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

/// A package seen at several versions and the one that was kept.
#[derive(Debug, Clone)]
pub struct VersionConflict {
    pub id: LogicalId,
    /// Distinct versions seen, ascending.
    pub requested: Vec<String>,
    pub resolved: String,
    pub reason: String,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(f, "  {c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requested {} but resolved {} ({})",
            self.id,
            self.requested.join(", "),
            self.resolved,
            self.reason
        )
    }
}
