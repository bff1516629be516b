//! The selected graph as a petgraph `DiGraph`: one node per logical
//! package. Backs tree rendering and "why is this here" queries.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use graven_core::coordinate::{Coordinate, LogicalId};
use graven_core::scope::Scope;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::conflict::ConflictResolution;
use crate::node::DependencyNode;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResolvedNode {
    pub coordinate: Arc<Coordinate>,
    /// Scope where the package was first reached; `None` for the root.
    pub scope: Option<Scope>,
}

impl fmt::Display for ResolvedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.coordinate)
    }
}

#[derive(Debug, Clone)]
pub struct DepEdge {
    pub scope: Scope,
    pub optional: bool,
    /// Points back at an ancestor; the build cut the cycle here.
    pub cycle: bool,
}

impl DepEdge {
    fn marker(&self) -> &'static str {
        if self.cycle {
            " (cycle)"
        } else if self.optional {
            " (optional)"
        } else {
            ""
        }
    }
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ResolvedNode, DepEdge>,
    index: BTreeMap<LogicalId, NodeIndex>,
    pub root: Option<NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project the selected nodes reachable from `root`. Losing versions
    /// are skipped together with everything below them.
    pub fn from_resolution(root: &Arc<DependencyNode>, resolution: &ConflictResolution) -> Self {
        let mut projected = Self::new();
        let top = projected.add_node(ResolvedNode {
            coordinate: Arc::clone(&root.coordinate),
            scope: None,
        });
        projected.set_root(top);

        let mut expanded = HashSet::from([Arc::as_ptr(root)]);
        let mut pending = VecDeque::from([(Arc::clone(root), top)]);
        while let Some((parent, from)) = pending.pop_front() {
            for child in parent.sorted_children() {
                if !resolution.is_selected(&child) {
                    continue;
                }
                let to = projected.add_node(ResolvedNode {
                    coordinate: Arc::clone(&child.coordinate),
                    scope: child.scope,
                });
                let edge = DepEdge {
                    scope: child.scope.unwrap_or_default(),
                    optional: child.dependency.as_ref().is_some_and(|d| d.optional),
                    cycle: child.cycle_cut,
                };
                projected.add_edge(from, to, edge);
                if expanded.insert(Arc::as_ptr(&child)) {
                    pending.push_back((child, to));
                }
            }
        }
        projected
    }

    /// Insert a package, or return the index it already has.
    pub fn add_node(&mut self, node: ResolvedNode) -> NodeIndex {
        let id = node.coordinate.logical_id();
        *self
            .index
            .entry(id)
            .or_insert_with(|| self.graph.add_node(node))
    }

    pub fn set_root(&mut self, idx: NodeIndex) {
        self.root = Some(idx);
    }

    /// Connect two packages; a second edge between the same pair is ignored.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: DepEdge) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, edge);
        }
    }

    pub fn find(&self, id: &LogicalId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &ResolvedNode {
        &self.graph[idx]
    }

    /// Neighbours in one direction, oldest edge first.
    fn neighbours(&self, idx: NodeIndex, direction: Direction) -> Vec<(NodeIndex, &DepEdge)> {
        let mut found: Vec<_> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (other, e.weight())
            })
            .collect();
        found.reverse();
        found
    }

    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        self.neighbours(idx, Direction::Outgoing)
    }

    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        self.neighbours(idx, Direction::Incoming)
    }

    /// Render the tree below the root. Direct dependencies are grouped
    /// under `[scope]` headers when they span more than one scope.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let Some(root) = self.root else {
            return String::new();
        };
        let direct = self.dependencies_of(root);
        let groups: Vec<(Scope, Vec<(NodeIndex, &DepEdge)>)> = Scope::ALL
            .into_iter()
            .map(|scope| {
                let members = direct.iter().filter(|(_, e)| e.scope == scope).cloned();
                (scope, members.collect::<Vec<_>>())
            })
            .filter(|(_, members)| !members.is_empty())
            .collect();

        let mut tree = TreeWriter::new(self, Direction::Outgoing, max_depth);
        tree.heading(root);
        let headed = groups.len() > 1;
        let last_group = groups.len().saturating_sub(1);
        for (g, (scope, members)) in groups.iter().enumerate() {
            if headed {
                tree.out.push_str(&format!("[{scope}]\n"));
            }
            for (i, (idx, edge)) in members.iter().enumerate() {
                let last = g == last_group && i + 1 == members.len();
                tree.branch(*idx, Some(*edge), "", last, 1);
            }
        }
        tree.out
    }

    /// Everything that (transitively) depends on `key`, up to the root.
    pub fn print_inverted_tree(&self, key: &str) -> String {
        let Some(target) = self.lookup(key) else {
            return String::new();
        };
        let mut tree = TreeWriter::new(self, Direction::Incoming, None);
        tree.heading(target);
        tree.children(target, "", 1);
        tree.out
    }

    /// The shortest chain of packages from the root to `key`.
    ///
    /// `key` is `group:name[:classifier]`, or a bare name matching the
    /// first package called that.
    pub fn find_path(&self, key: &str) -> Option<Vec<&ResolvedNode>> {
        let root = self.root?;
        let target = self.lookup(key)?;
        let (_, path) = astar(&self.graph, root, |n| n == target, |_| 1, |_| 0)?;
        Some(path.into_iter().map(|idx| &self.graph[idx]).collect())
    }

    fn lookup(&self, key: &str) -> Option<NodeIndex> {
        let exact = self.index.iter().find(|(id, _)| id.to_string() == key);
        exact
            .or_else(|| self.index.iter().find(|(id, _)| id.name == key))
            .map(|(_, &idx)| idx)
    }

    /// Packages below the root.
    pub fn len(&self) -> usize {
        self.graph.node_count() - usize::from(self.root.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Box-drawing renderer shared by the normal and the inverted tree.
struct TreeWriter<'g> {
    graph: &'g DependencyGraph,
    direction: Direction,
    max_depth: Option<usize>,
    /// Packages on the current branch; revisiting one stops the descent.
    on_branch: HashSet<NodeIndex>,
    out: String,
}

impl<'g> TreeWriter<'g> {
    fn new(graph: &'g DependencyGraph, direction: Direction, max_depth: Option<usize>) -> Self {
        Self {
            graph,
            direction,
            max_depth,
            on_branch: HashSet::new(),
            out: String::new(),
        }
    }

    fn heading(&mut self, idx: NodeIndex) {
        self.out.push_str(&format!("{}\n", self.graph.node(idx)));
        self.on_branch.insert(idx);
    }

    fn branch(&mut self, idx: NodeIndex, edge: Option<&DepEdge>, prefix: &str, last: bool, depth: usize) {
        let connector = if last { "└── " } else { "├── " };
        let marker = edge.map_or("", DepEdge::marker);
        self.out
            .push_str(&format!("{prefix}{connector}{}{marker}\n", self.graph.node(idx)));

        let stop = edge.is_some_and(|e| e.cycle) || self.max_depth.is_some_and(|max| depth >= max);
        if stop || !self.on_branch.insert(idx) {
            return;
        }
        let indent = format!("{prefix}{}", if last { "    " } else { "│   " });
        self.children(idx, &indent, depth + 1);
        self.on_branch.remove(&idx);
    }

    fn children(&mut self, idx: NodeIndex, prefix: &str, depth: usize) {
        let graph = self.graph;
        let next = graph.neighbours(idx, self.direction);
        let count = next.len();
        for (i, (other, edge)) in next.into_iter().enumerate() {
            // Walking upwards, edge labels describe the child, not us.
            let edge = (self.direction == Direction::Outgoing).then_some(edge);
            self.branch(other, edge, prefix, i + 1 == count, depth);
        }
    }
}
