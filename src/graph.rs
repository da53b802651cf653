use crate::scanner::FileRecord;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Syntactic form of the import that produced an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportKind {
    Absolute,
    Relative,
    Aliased,
}

/// One resolved intra-project dependency, as plain data for the result.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EdgeRecord {
    pub from: String,
    pub to: String,
    pub kind: ImportKind,
}

/// Directed module-dependency graph. Nodes are module identifiers; edges
/// point from importer to imported. Imports that do not resolve to a
/// project module land in the external tally instead.
pub struct DependencyGraph {
    pub graph: DiGraph<String, ImportKind>,
    pub indices: BTreeMap<String, NodeIndex>,
    /// Deduplicated top-level names of unresolved imports.
    pub externals: BTreeSet<String>,
    /// Imports that matched more than one candidate module. The tie-break
    /// is deterministic; this count is diagnostic only.
    pub ambiguous_imports: usize,
}

impl DependencyGraph {
    /// Builds the graph from scan records. Callers sort records by module
    /// identifier first, which makes node and edge order independent of
    /// scan completion order.
    pub fn build(records: &[FileRecord]) -> Self {
        let mut graph = DiGraph::new();
        let mut indices: BTreeMap<String, NodeIndex> = BTreeMap::new();
        let mut packages: BTreeSet<String> = BTreeSet::new();

        for record in records {
            indices
                .entry(record.module.clone())
                .or_insert_with(|| graph.add_node(record.module.clone()));
            if record.is_package {
                packages.insert(record.module.clone());
            }
        }

        let mut externals = BTreeSet::new();
        let mut ambiguous_imports = 0;
        let mut seen: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();

        for record in records {
            let is_package = packages.contains(&record.module);
            for import in &record.imports {
                let (resolved, ambiguous) = if import.level > 0 {
                    (
                        resolve_relative(&indices, &record.module, is_package, import.level, &import.target),
                        false,
                    )
                } else {
                    resolve_absolute(&indices, &import.target)
                };
                if ambiguous {
                    ambiguous_imports += 1;
                }

                match resolved {
                    // Self-imports are discarded rather than kept as loops.
                    Some(target) if target == record.module => {}
                    Some(target) => {
                        let kind = if import.alias.is_some() {
                            ImportKind::Aliased
                        } else if import.level > 0 {
                            ImportKind::Relative
                        } else {
                            ImportKind::Absolute
                        };
                        let from = indices[&record.module];
                        let to = indices[&target];
                        if seen.insert((from, to)) {
                            graph.add_edge(from, to, kind);
                        }
                    }
                    None => {
                        let top = import.target.split('.').next().unwrap_or("");
                        if !top.is_empty() {
                            externals.insert(top.to_string());
                        }
                    }
                }
            }
        }

        Self {
            graph,
            indices,
            externals,
            ambiguous_imports,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_index(&self, module: &str) -> Option<NodeIndex> {
        self.indices.get(module).copied()
    }

    /// Edges as sorted plain records for the result object.
    pub fn edge_records(&self) -> Vec<EdgeRecord> {
        let mut edges: Vec<EdgeRecord> = self
            .graph
            .edge_references()
            .map(|edge| EdgeRecord {
                from: self.graph[edge.source()].clone(),
                to: self.graph[edge.target()].clone(),
                kind: *edge.weight(),
            })
            .collect();
        edges.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));
        edges
    }
}

/// Absolute resolution: exact identifier, then the longest known prefix of
/// the dotted path (`app.models.User` resolves to `app.models`), then a
/// dotted-suffix match for bare names. A suffix match with several
/// candidates is ambiguous: the longest identifier wins, ties broken
/// lexicographically.
fn resolve_absolute(
    indices: &BTreeMap<String, NodeIndex>,
    target: &str,
) -> (Option<String>, bool) {
    if indices.contains_key(target) {
        return (Some(target.to_string()), false);
    }

    let parts: Vec<&str> = target.split('.').collect();
    for len in (1..parts.len()).rev() {
        let prefix = parts[..len].join(".");
        if indices.contains_key(&prefix) {
            return (Some(prefix), false);
        }
    }

    let suffix = format!(".{target}");
    let mut candidates: Vec<&String> = indices.keys().filter(|id| id.ends_with(&suffix)).collect();
    if candidates.is_empty() {
        return (None, false);
    }
    let ambiguous = candidates.len() > 1;
    candidates.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    (Some(candidates[0].clone()), ambiguous)
}

/// Relative resolution from the importer's package position. One dot names
/// the current package; each further dot climbs one level. Package
/// initializers are their own package, so `from . import x` inside
/// `pkg/__init__.py` starts at `pkg`.
fn resolve_relative(
    indices: &BTreeMap<String, NodeIndex>,
    importer: &str,
    importer_is_package: bool,
    level: usize,
    target: &str,
) -> Option<String> {
    let mut parts: Vec<&str> = importer.split('.').collect();
    if !importer_is_package {
        parts.pop();
    }
    for _ in 1..level {
        parts.pop()?;
    }

    if !target.is_empty() {
        parts.extend(target.split('.'));
    }
    if parts.is_empty() {
        return None;
    }

    let dotted = parts.join(".");
    indices.contains_key(&dotted).then_some(dotted)
}
