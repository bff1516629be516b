//! Nodes of the dirty (multi-version) dependency graph.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use graven_core::coordinate::{Coordinate, LogicalId};
use graven_core::dependency::Dependency;
use graven_core::scope::Scope;

/// One resolved package version in the graph.
///
/// The child list may be shared by several nodes with the same subgraph key.
/// It is append-only while being built and immutable once sealed.
#[derive(Debug)]
pub struct DependencyNode {
    /// Interned coordinate.
    pub coordinate: Arc<Coordinate>,
    /// Derived scope; `None` for the root.
    pub scope: Option<Scope>,
    /// The edge that produced this node, after management; `None` for the root.
    pub dependency: Option<Dependency>,
    /// Declared scope before dependency management changed it.
    pub premanaged_scope: Option<Scope>,
    /// Coordinates relocated away from on the way to this one, oldest first.
    pub relocations: Vec<Coordinate>,
    /// Set when the node repeats an ancestor and was kept as a leaf.
    pub cycle_cut: bool,
    children: Arc<Children>,
}

impl DependencyNode {
    pub fn root(coordinate: Arc<Coordinate>) -> Self {
        Self {
            coordinate,
            scope: None,
            dependency: None,
            premanaged_scope: None,
            relocations: Vec::new(),
            cycle_cut: false,
            children: Arc::new(Children::new()),
        }
    }

    pub(crate) fn new(
        coordinate: Arc<Coordinate>,
        scope: Scope,
        dependency: Dependency,
        premanaged_scope: Option<Scope>,
        relocations: Vec<Coordinate>,
        children: Arc<Children>,
    ) -> Self {
        Self {
            coordinate,
            scope: Some(scope),
            dependency: Some(dependency),
            premanaged_scope,
            relocations,
            cycle_cut: false,
            children,
        }
    }

    pub fn logical_id(&self) -> LogicalId {
        self.coordinate.logical_id()
    }

    /// A snapshot of the children.
    pub fn children(&self) -> Vec<Arc<DependencyNode>> {
        self.children.snapshot()
    }

    /// Children ordered by coordinate then scope, so walks are reproducible
    /// regardless of the order concurrent branches appended them in.
    pub fn sorted_children(&self) -> Vec<Arc<DependencyNode>> {
        let mut children = self.children();
        children.sort_by(|a, b| {
            (&a.coordinate, a.scope).cmp(&(&b.coordinate, b.scope))
        });
        children
    }

    pub fn has_children(&self) -> bool {
        !self.children.lock().is_empty()
    }

    /// Whether this node and `other` share one child list.
    pub fn shares_children_with(&self, other: &DependencyNode) -> bool {
        Arc::ptr_eq(&self.children, &other.children)
    }

    pub(crate) fn child_list(&self) -> &Arc<Children> {
        &self.children
    }
}

/// A mutex-guarded, append-only child list that can be sealed.
#[derive(Debug, Default)]
pub struct Children {
    nodes: Mutex<Vec<Arc<DependencyNode>>>,
    sealed: AtomicBool,
}

impl Children {
    pub fn new() -> Self {
        Self::default()
    }

    /// An already sealed empty list, for leaves.
    pub fn sealed_empty() -> Self {
        let children = Self::new();
        children.seal();
        children
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<DependencyNode>>> {
        // A panicking appender cannot leave a half-pushed Vec behind.
        self.nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, node: Arc<DependencyNode>) {
        debug_assert!(!self.is_sealed(), "append to sealed child list");
        self.lock().push(node);
    }

    pub fn snapshot(&self) -> Vec<Arc<DependencyNode>> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graven_core::dependency::VersionConstraint;

    fn leaf(coord: &str, scope: Scope) -> Arc<DependencyNode> {
        let coordinate = Arc::new(Coordinate::parse(coord).unwrap());
        let dep = Dependency::new(
            coordinate.group.clone(),
            coordinate.name.clone(),
            VersionConstraint::parse(&coordinate.version).unwrap(),
        );
        Arc::new(DependencyNode::new(
            coordinate,
            scope,
            dep,
            None,
            Vec::new(),
            Arc::new(Children::sealed_empty()),
        ))
    }

    #[test]
    fn children_are_sorted_for_walks() {
        let root = DependencyNode::root(Arc::new(Coordinate::new("r", "r", "1")));
        root.child_list().push(leaf("b:b:1", Scope::Compile));
        root.child_list().push(leaf("a:a:2", Scope::Runtime));
        root.child_list().push(leaf("a:a:1", Scope::Compile));
        let order: Vec<String> = root
            .sorted_children()
            .iter()
            .map(|n| n.coordinate.to_string())
            .collect();
        assert_eq!(order, vec!["a:a:1", "a:a:2", "b:b:1"]);
    }

    #[test]
    fn sealing_is_observable() {
        let list = Children::new();
        assert!(!list.is_sealed());
        list.push(leaf("a:a:1", Scope::Compile));
        list.seal();
        assert!(list.is_sealed());
        assert_eq!(list.len(), 1);
        assert!(Children::sealed_empty().is_sealed());
    }
}
