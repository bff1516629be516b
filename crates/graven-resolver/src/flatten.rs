//! Reduce a conflict-resolved graph to the flat artifact set a caller asked for.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use graven_core::coordinate::{Coordinate, LogicalId};
use graven_core::scope::Scope;
use graven_core::version::MavenVersion;

use crate::conflict::ConflictResolution;
use crate::node::DependencyNode;

/// A selected package and the scope it was reached under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub coordinate: Arc<Coordinate>,
    pub scope: Scope,
}

/// Walk the selected nodes breadth-first and keep those accepted by any of
/// `scopes` (all of them when `scopes` is empty).
///
/// Nodes not at their group's winning version are skipped along with their
/// subtrees. Each logical package appears once: the greater version wins,
/// and on equal versions the shallowest occurrence.
pub fn flatten(
    root: &Arc<DependencyNode>,
    resolution: &ConflictResolution,
    scopes: &[Scope],
) -> Vec<ResolvedArtifact> {
    let root_id = root.logical_id();
    let mut seen: HashSet<*const DependencyNode> = HashSet::new();
    let mut queue = VecDeque::from([Arc::clone(root)]);
    let mut index: HashMap<LogicalId, usize> = HashMap::new();
    let mut artifacts: Vec<ResolvedArtifact> = Vec::new();
    seen.insert(Arc::as_ptr(root));

    while let Some(node) = queue.pop_front() {
        for child in node.sorted_children() {
            if !seen.insert(Arc::as_ptr(&child)) || !resolution.is_selected(&child) {
                continue;
            }
            queue.push_back(child);
        }
        let Some(scope) = node.scope else {
            continue;
        };
        let id = node.logical_id();
        if id == root_id || !accepted(scopes, scope) {
            continue;
        }
        let artifact = ResolvedArtifact {
            coordinate: Arc::clone(&node.coordinate),
            scope,
        };
        match index.get(&id) {
            Some(&at) => {
                let kept = MavenVersion::parse(&artifacts[at].coordinate.version);
                if MavenVersion::parse(&node.coordinate.version) > kept {
                    artifacts[at] = artifact;
                }
            }
            None => {
                index.insert(id, artifacts.len());
                artifacts.push(artifact);
            }
        }
    }
    artifacts
}

fn accepted(scopes: &[Scope], scope: Scope) -> bool {
    scopes.is_empty() || scopes.iter().any(|s| s.accepts_scope(scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::resolve_conflicts;
    use crate::node::Children;
    use graven_core::config::ConflictStrategy;
    use graven_core::dependency::Dependency;

    fn node(coord: &str, scope: Scope, children: Vec<Arc<DependencyNode>>) -> Arc<DependencyNode> {
        let coordinate = Coordinate::parse(coord).unwrap();
        let dependency = Dependency::parse(coord).unwrap().with_scope(scope);
        let list = Children::new();
        for c in children {
            list.push(c);
        }
        list.seal();
        Arc::new(DependencyNode::new(
            Arc::new(coordinate),
            scope,
            dependency,
            None,
            Vec::new(),
            Arc::new(list),
        ))
    }

    fn root(children: Vec<Arc<DependencyNode>>) -> Arc<DependencyNode> {
        let root = DependencyNode::root(Arc::new(Coordinate::new("com.example", "app", "1.0")));
        for c in children {
            root.child_list().push(c);
        }
        root.child_list().seal();
        Arc::new(root)
    }

    fn rendered(artifacts: &[ResolvedArtifact]) -> Vec<String> {
        artifacts
            .iter()
            .map(|a| format!("{} {}", a.coordinate, a.scope))
            .collect()
    }

    #[test]
    fn scope_filter_keeps_only_accepted_scopes() {
        let graph = root(vec![
            node("g:compile:1.0", Scope::Compile, vec![]),
            node("g:runtime:1.0", Scope::Runtime, vec![]),
            node("g:test:1.0", Scope::Test, vec![]),
            node("g:provided:1.0", Scope::Provided, vec![]),
        ]);
        let resolution = resolve_conflicts(&graph, ConflictStrategy::Nearest).unwrap();
        let runtime = flatten(&graph, &resolution, &[Scope::Runtime]);
        assert_eq!(
            rendered(&runtime),
            vec!["g:compile:1.0 compile", "g:runtime:1.0 runtime"]
        );
        assert!(runtime
            .iter()
            .all(|a| matches!(a.scope, Scope::Runtime | Scope::Compile)));

        let everything = flatten(&graph, &resolution, &[]);
        assert_eq!(everything.len(), 4);
    }

    #[test]
    fn loser_subtrees_are_not_descended() {
        // lib 1.0 (depth 1) beats lib 2.0 (depth 2); only 2.0 pulls in extra.
        let extra = node("g:extra:1.0", Scope::Compile, vec![]);
        let graph = root(vec![
            node("g:lib:1.0", Scope::Compile, vec![]),
            node(
                "g:mid:1.0",
                Scope::Compile,
                vec![node("g:lib:2.0", Scope::Compile, vec![extra])],
            ),
        ]);
        let resolution = resolve_conflicts(&graph, ConflictStrategy::Nearest).unwrap();
        let artifacts = flatten(&graph, &resolution, &[]);
        assert_eq!(
            rendered(&artifacts),
            vec!["g:lib:1.0 compile", "g:mid:1.0 compile"]
        );
        assert_eq!(resolution.report.len(), 1);
    }

    #[test]
    fn each_package_appears_once() {
        let shared = node("g:common:1.0", Scope::Compile, vec![]);
        let graph = root(vec![
            node("g:a:1.0", Scope::Compile, vec![Arc::clone(&shared)]),
            node("g:b:1.0", Scope::Compile, vec![node("g:common:1.0", Scope::Runtime, vec![])]),
        ]);
        let resolution = resolve_conflicts(&graph, ConflictStrategy::Highest).unwrap();
        let artifacts = flatten(&graph, &resolution, &[]);
        let common: Vec<_> = artifacts
            .iter()
            .filter(|a| a.coordinate.name == "common")
            .collect();
        assert_eq!(common.len(), 1);
        assert_eq!(common[0].scope, Scope::Compile);
        assert!(resolution.report.is_empty());
    }
}
