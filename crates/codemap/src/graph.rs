//! Derived lookup structures over the index
//!
//! Five maps are computed from the raw document in one pass each:
//! symbol ownership, forward and reverse call graphs, per-file imports and
//! per-module importers.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use crate::exclude::ExclusionPatterns;
use crate::index::IndexDocument;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivedGraph {
    /// Symbol name -> files defining a symbol with that name
    pub symbol_to_files: BTreeMap<String, BTreeSet<String>>,
    /// Caller -> callees
    pub call_graph: BTreeMap<String, BTreeSet<String>>,
    /// Callee -> callers, the exact transpose of `call_graph`
    pub reverse_call_graph: BTreeMap<String, BTreeSet<String>>,
    /// File -> imported module specifiers, in document order
    pub file_imports: BTreeMap<String, Vec<String>>,
    /// Module specifier -> importing files
    pub module_importers: BTreeMap<String, BTreeSet<String>>,
}

impl DerivedGraph {
    /// Build all lookup maps for `doc`.
    ///
    /// Symbol ownership and imports skip excluded files. Call edges are taken
    /// as-is from the document, so callers/callees/trace can surface symbols
    /// whose only definitions live in excluded files.
    pub fn derive(doc: &IndexDocument, patterns: &ExclusionPatterns) -> Self {
        let mut graph = Self::default();
        let mut excluded_files = 0usize;

        for (path, entry) in &doc.files {
            if patterns.is_excluded(path) {
                excluded_files += 1;
                continue;
            }
            for symbol in &entry.symbols {
                graph
                    .symbol_to_files
                    .entry(symbol.name.clone())
                    .or_default()
                    .insert(path.clone());
            }
        }

        for edge in &doc.edges {
            graph
                .call_graph
                .entry(edge.caller.clone())
                .or_default()
                .insert(edge.callee.clone());
            graph
                .reverse_call_graph
                .entry(edge.callee.clone())
                .or_default()
                .insert(edge.caller.clone());
        }

        for (path, modules) in &doc.deps {
            if patterns.is_excluded(path) {
                continue;
            }
            graph.file_imports.insert(path.clone(), modules.clone());
            for module in modules {
                graph
                    .module_importers
                    .entry(module.clone())
                    .or_default()
                    .insert(path.clone());
            }
        }

        debug!(
            symbols = graph.symbol_to_files.len(),
            callers = graph.call_graph.len(),
            importing_files = graph.file_imports.len(),
            excluded_files,
            "derived graph"
        );

        graph
    }

    /// Symbols that call `name`
    pub fn callers(&self, name: &str) -> Vec<&str> {
        lookup(&self.reverse_call_graph, name)
    }

    /// Symbols that `name` calls
    pub fn callees(&self, name: &str) -> Vec<&str> {
        lookup(&self.call_graph, name)
    }

    /// Files defining `name`
    pub fn files_for(&self, name: &str) -> Vec<&str> {
        lookup(&self.symbol_to_files, name)
    }

    /// A symbol with no known caller
    pub fn is_dead(&self, name: &str) -> bool {
        !self.reverse_call_graph.contains_key(name)
    }

    /// Every owned symbol that nothing calls, sorted by name
    pub fn dead_symbols(&self) -> Vec<&str> {
        self.symbol_to_files
            .keys()
            .filter(|name| self.is_dead(name))
            .map(String::as_str)
            .collect()
    }

    /// Shortest call chain from `start` to `target` along forward edges.
    ///
    /// Nodes are marked visited when enqueued, so each is expanded at most
    /// once and cyclic graphs terminate. Among equal-length chains the one
    /// returned is the first found in adjacency order: deterministic for a
    /// given graph, not canonical.
    pub fn shortest_path<'a>(&'a self, start: &'a str, target: &str) -> Option<Vec<String>> {
        if start == target {
            return Some(vec![start.to_string()]);
        }

        let mut parent: HashMap<&'a str, &'a str> = HashMap::new();
        let mut visited: HashSet<&'a str> = HashSet::from([start]);
        let mut queue: VecDeque<&'a str> = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            let Some(callees) = self.call_graph.get(current) else {
                continue;
            };
            for callee in callees {
                let callee = callee.as_str();
                if !visited.insert(callee) {
                    continue;
                }
                parent.insert(callee, current);
                if callee == target {
                    return Some(walk_back(&parent, start, callee));
                }
                queue.push_back(callee);
            }
        }

        None
    }
}

fn lookup<'a, C>(map: &'a BTreeMap<String, C>, key: &str) -> Vec<&'a str>
where
    &'a C: IntoIterator<Item = &'a String>,
{
    map.get(key)
        .map(|set| set.into_iter().map(String::as_str).collect())
        .unwrap_or_default()
}

fn walk_back<'a>(parent: &HashMap<&'a str, &'a str>, start: &str, end: &'a str) -> Vec<String> {
    let mut path = vec![end.to_string()];
    let mut node = end;
    while node != start {
        match parent.get(node) {
            Some(&prev) => {
                node = prev;
                path.push(node.to_string());
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> IndexDocument {
        IndexDocument::from_json(&value.to_string()).unwrap()
    }

    fn no_excludes() -> ExclusionPatterns {
        ExclusionPatterns::new(Vec::new())
    }

    fn edges_graph(edges: &[(&str, &str)]) -> DerivedGraph {
        let edges: Vec<_> = edges.iter().map(|(a, b)| json!([a, b])).collect();
        DerivedGraph::derive(&doc(json!({ "edges": edges })), &no_excludes())
    }

    #[test]
    fn test_symbol_ownership_across_files() {
        let d = doc(json!({
            "files": {
                "a.ts": ["ts", ["init:1::", "run:5::"]],
                "b.ts": ["ts", ["init:3::"]]
            }
        }));
        let g = DerivedGraph::derive(&d, &no_excludes());

        assert_eq!(g.files_for("init"), vec!["a.ts", "b.ts"]);
        assert_eq!(g.files_for("run"), vec!["a.ts"]);
        assert!(g.files_for("missing").is_empty());
    }

    #[test]
    fn test_excluded_files_skip_symbols_and_imports() {
        let d = doc(json!({
            "files": {
                "src/app.ts": ["ts", ["main:1::"]],
                "build/app.js": ["js", ["bundled:1::"]]
            },
            "deps": {
                "src/app.ts": ["./util"],
                "build/app.js": ["./util", "react"]
            }
        }));
        let patterns = ExclusionPatterns::new(vec!["build/".into()]);
        let g = DerivedGraph::derive(&d, &patterns);

        assert!(g.symbol_to_files.contains_key("main"));
        assert!(!g.symbol_to_files.contains_key("bundled"));
        assert_eq!(g.file_imports.len(), 1);
        assert_eq!(g.module_importers["./util"].len(), 1);
        assert!(!g.module_importers.contains_key("react"));
    }

    // Edges are not filtered by file exclusion; symbols owned only by
    // excluded files still show up as callers and callees.
    #[test]
    fn test_edges_ignore_file_exclusion() {
        let d = doc(json!({
            "files": {
                "src/app.ts": ["ts", ["main:1::"]],
                "build/app.js": ["js", ["bundled:1::"]]
            },
            "edges": [["main", "bundled"]]
        }));
        let patterns = ExclusionPatterns::new(vec!["build/".into()]);
        let g = DerivedGraph::derive(&d, &patterns);

        assert_eq!(g.callees("main"), vec!["bundled"]);
        assert_eq!(g.callers("bundled"), vec!["main"]);
        assert!(g.files_for("bundled").is_empty());
    }

    #[test]
    fn test_module_importers_transpose_file_imports() {
        let d = doc(json!({
            "deps": {
                "a.py": ["os", "json"],
                "b.py": ["os"]
            }
        }));
        let g = DerivedGraph::derive(&d, &no_excludes());

        assert_eq!(g.file_imports["a.py"], vec!["os", "json"]);
        let importers: Vec<_> = g.module_importers["os"].iter().cloned().collect();
        assert_eq!(importers, vec!["a.py", "b.py"]);
    }

    #[test]
    fn test_dead_symbols() {
        let d = doc(json!({
            "files": {"a.ts": ["ts", ["foo:1::", "bar:2::"]]},
            "edges": [["foo", "bar"]]
        }));
        let g = DerivedGraph::derive(&d, &no_excludes());

        assert_eq!(g.dead_symbols(), vec!["foo"]);
        assert!(!g.is_dead("bar"));
    }

    #[test]
    fn test_derive_is_idempotent() {
        let d = doc(json!({
            "files": {"a.ts": ["ts", ["foo:1::", "bar:2::"]]},
            "deps": {"a.ts": ["./b"]},
            "edges": [["foo", "bar"], ["bar", "baz"]]
        }));
        let patterns = ExclusionPatterns::new(vec!["*.bak".into()]);
        assert_eq!(DerivedGraph::derive(&d, &patterns), DerivedGraph::derive(&d, &patterns));
    }

    #[test]
    fn test_shortest_path_chain() {
        let g = edges_graph(&[("foo", "bar"), ("bar", "baz")]);
        assert_eq!(g.shortest_path("foo", "baz"), Some(vec!["foo".into(), "bar".into(), "baz".into()]));
    }

    #[test]
    fn test_shortest_path_prefers_fewer_hops() {
        let g = edges_graph(&[("a", "b"), ("b", "c"), ("c", "d"), ("a", "d")]);
        assert_eq!(g.shortest_path("a", "d"), Some(vec!["a".into(), "d".into()]));
    }

    #[test]
    fn test_shortest_path_to_self() {
        let g = edges_graph(&[("a", "b")]);
        assert_eq!(g.shortest_path("a", "a"), Some(vec!["a".into()]));
        assert_eq!(g.shortest_path("ghost", "ghost"), Some(vec!["ghost".into()]));
    }

    #[test]
    fn test_shortest_path_terminates_on_cycles() {
        let g = edges_graph(&[("a", "b"), ("b", "c"), ("c", "a"), ("c", "c"), ("x", "target")]);
        assert_eq!(g.shortest_path("a", "target"), None);
    }

    #[test]
    fn test_shortest_path_does_not_walk_backwards() {
        let g = edges_graph(&[("a", "b")]);
        assert_eq!(g.shortest_path("b", "a"), None);
    }

    proptest! {
        #[test]
        fn prop_reverse_call_graph_is_transpose(
            edges in prop::collection::vec(("[a-e]", "[a-e]"), 0..30)
        ) {
            let pairs: Vec<(&str, &str)> = edges.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
            let g = edges_graph(&pairs);

            for (caller, callees) in &g.call_graph {
                for callee in callees {
                    prop_assert!(g.reverse_call_graph[callee].contains(caller));
                }
            }
            for (callee, callers) in &g.reverse_call_graph {
                for caller in callers {
                    prop_assert!(g.call_graph[caller].contains(callee));
                }
            }
        }

        #[test]
        fn prop_shortest_path_is_a_real_chain(
            edges in prop::collection::vec(("[a-f]", "[a-f]"), 0..25),
            start in "[a-f]",
            target in "[a-f]",
        ) {
            let pairs: Vec<(&str, &str)> = edges.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
            let g = edges_graph(&pairs);

            if let Some(path) = g.shortest_path(&start, &target) {
                prop_assert_eq!(path.first(), Some(&start));
                prop_assert_eq!(path.last(), Some(&target));
                for hop in path.windows(2) {
                    prop_assert!(g.call_graph[&hop[0]].contains(&hop[1]));
                }
            }
        }
    }
}
