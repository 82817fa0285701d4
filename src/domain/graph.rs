//! Module graph for script bundles
//!
//! Nodes are resolved module paths, edges run from an importing module to
//! the module a specifier resolved to. Node indices double as module ids in
//! the emitted bundle, so the entry (added first) is always id 0.
//! Uses petgraph for graph operations.

use petgraph::algo::{is_cyclic_directed, kosaraju_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Module not in graph: {0}")]
    ModuleNotFound(PathBuf),
}

/// Directed graph of modules reachable from an entry
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// Edge weight is the specifier as written in the importing module
    graph: DiGraph<PathBuf, String>,

    /// Map from module path to node index
    node_map: HashMap<PathBuf, NodeIndex>,
}

impl ModuleGraph {
    /// Creates an empty module graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Adds a module, returning its id and whether it was newly added
    pub fn add_module(&mut self, path: &Path) -> (usize, bool) {
        if let Some(idx) = self.node_map.get(path) {
            return (idx.index(), false);
        }
        let idx = self.graph.add_node(path.to_path_buf());
        self.node_map.insert(path.to_path_buf(), idx);
        (idx.index(), true)
    }

    /// Records that `from` imports `to` through `specifier`
    pub fn add_dependency(&mut self, from: &Path, to: &Path, specifier: &str) -> Result<(), GraphError> {
        let from_idx = *self
            .node_map
            .get(from)
            .ok_or_else(|| GraphError::ModuleNotFound(from.to_path_buf()))?;
        let to_idx = *self
            .node_map
            .get(to)
            .ok_or_else(|| GraphError::ModuleNotFound(to.to_path_buf()))?;

        let exists = self
            .graph
            .edges(from_idx)
            .any(|edge| edge.target() == to_idx && edge.weight() == specifier);
        if !exists {
            self.graph.add_edge(from_idx, to_idx, specifier.to_string());
        }
        Ok(())
    }

    /// Returns the id of a module
    pub fn id_of(&self, path: &Path) -> Option<usize> {
        self.node_map.get(path).map(|idx| idx.index())
    }

    /// Returns the `specifier -> module id` table of a module, sorted by specifier
    pub fn dependency_table(&self, path: &Path) -> Vec<(String, usize)> {
        let Some(idx) = self.node_map.get(path) else {
            return vec![];
        };

        let mut table: Vec<(String, usize)> = self
            .graph
            .edges(*idx)
            .map(|edge| (edge.weight().clone(), edge.target().index()))
            .collect();
        table.sort();
        table
    }

    /// Modules in id order
    pub fn modules(&self) -> impl Iterator<Item = (usize, &Path)> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx).map(|p| (idx.index(), p.as_path())))
    }

    /// Returns true if any import cycle exists
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Groups of modules that import each other, each sorted by path
    pub fn cycles(&self) -> Vec<Vec<PathBuf>> {
        let mut cycles: Vec<Vec<PathBuf>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|idx| self.graph.find_edge(*idx, *idx).is_some())
            })
            .map(|component| {
                let mut paths: Vec<PathBuf> = component
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).cloned())
                    .collect();
                paths.sort();
                paths
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Returns true if the graph contains the module
    pub fn contains(&self, path: &Path) -> bool {
        self.node_map.contains_key(path)
    }

    /// Returns the number of modules in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> PathBuf {
        PathBuf::from(format!("/src/{}", name))
    }

    #[test]
    fn empty_graph() {
        let graph = ModuleGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
        assert!(!graph.has_cycles());
    }

    #[test]
    fn ids_follow_insertion_order() {
        let mut graph = ModuleGraph::new();
        assert_eq!(graph.add_module(&p("index.js")), (0, true));
        assert_eq!(graph.add_module(&p("a.js")), (1, true));
        assert_eq!(graph.add_module(&p("index.js")), (0, false));

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.id_of(&p("a.js")), Some(1));
        assert!(graph.contains(&p("index.js")));

        let modules: Vec<_> = graph.modules().map(|(id, path)| (id, path.to_path_buf())).collect();
        assert_eq!(modules, vec![(0, p("index.js")), (1, p("a.js"))]);
    }

    #[test]
    fn dependency_tables() {
        let mut graph = ModuleGraph::new();
        graph.add_module(&p("index.js"));
        graph.add_module(&p("b.js"));
        graph.add_module(&p("a.js"));

        graph.add_dependency(&p("index.js"), &p("b.js"), "./b").unwrap();
        graph.add_dependency(&p("index.js"), &p("a.js"), "./a.js").unwrap();
        graph.add_dependency(&p("index.js"), &p("a.js"), "./a.js").unwrap();

        assert_eq!(
            graph.dependency_table(&p("index.js")),
            vec![("./a.js".to_string(), 2), ("./b".to_string(), 1)]
        );
        assert!(graph.dependency_table(&p("a.js")).is_empty());
    }

    #[test]
    fn unknown_module_returns_error() {
        let mut graph = ModuleGraph::new();
        graph.add_module(&p("index.js"));

        let result = graph.add_dependency(&p("index.js"), &p("missing.js"), "./missing");
        assert_eq!(result, Err(GraphError::ModuleNotFound(p("missing.js"))));
    }

    #[test]
    fn cycles_are_allowed_and_reported() {
        let mut graph = ModuleGraph::new();
        for name in ["index.js", "a.js", "b.js"] {
            graph.add_module(&p(name));
        }
        graph.add_dependency(&p("index.js"), &p("a.js"), "./a").unwrap();
        graph.add_dependency(&p("a.js"), &p("b.js"), "./b").unwrap();
        assert!(!graph.has_cycles());

        graph.add_dependency(&p("b.js"), &p("a.js"), "./a").unwrap();
        assert!(graph.has_cycles());
        assert_eq!(graph.cycles(), vec![vec![p("a.js"), p("b.js")]]);
    }

    #[test]
    fn self_import_is_a_cycle() {
        let mut graph = ModuleGraph::new();
        graph.add_module(&p("index.js"));
        graph.add_dependency(&p("index.js"), &p("index.js"), "./index.js").unwrap();

        assert!(graph.has_cycles());
        assert_eq!(graph.cycles(), vec![vec![p("index.js")]]);
    }
}
