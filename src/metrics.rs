use crate::graph::DependencyGraph;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Structural metrics for one module.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModuleMetrics {
    /// Modules importing this one.
    pub in_degree: usize,
    /// Modules this one imports.
    pub out_degree: usize,
    /// (in + out) / (N - 1); hubs score high.
    pub degree_centrality: f64,
    /// Fraction of shortest paths between other pairs passing through this
    /// module; bridges score high.
    pub betweenness: f64,
}

/// Metrics record for the whole graph, keyed by module identifier.
/// Read-only derivation; the graph itself is not touched.
#[derive(Debug, Clone, Serialize)]
pub struct GraphMetrics {
    pub per_module: BTreeMap<String, ModuleMetrics>,
    /// Import cycles as node sequences, back-edge target first.
    pub cycles: Vec<Vec<String>>,
    /// True when enumeration stopped at the configured bound, meaning the
    /// cycle list and count are a floor, not a total.
    pub cycles_saturated: bool,
    pub is_dag: bool,
}

impl GraphMetrics {
    /// Top `n` modules by degree centrality, ties by identifier.
    pub fn top_degree_centrality(&self, n: usize) -> Vec<(String, f64)> {
        let mut rows: Vec<(String, f64)> = self
            .per_module
            .iter()
            .map(|(id, m)| (id.clone(), m.degree_centrality))
            .collect();
        rows.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        rows.truncate(n);
        rows
    }
}

/// Computes all metrics over the finished graph. `max_cycles` bounds cycle
/// enumeration, which is combinatorial on dense graphs.
pub fn compute(deps: &DependencyGraph, max_cycles: usize) -> GraphMetrics {
    let n = deps.node_count();
    let ids: Vec<String> = (0..n).map(|i| deps.graph[NodeIndex::new(i)].clone()).collect();

    // Node indices were assigned while iterating records sorted by module
    // id, so index order is lexicographic and the adjacency lists below are
    // deterministic.
    let adj: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            let mut out: Vec<usize> = deps
                .graph
                .neighbors_directed(NodeIndex::new(i), Direction::Outgoing)
                .map(|x| x.index())
                .collect();
            out.sort_unstable();
            out
        })
        .collect();

    let betweenness = betweenness_centrality(&adj);
    let (cycles, cycles_saturated) = enumerate_cycles(&adj, &ids, max_cycles);

    let mut per_module = BTreeMap::new();
    for (i, id) in ids.iter().enumerate() {
        let idx = NodeIndex::new(i);
        let in_degree = deps.graph.neighbors_directed(idx, Direction::Incoming).count();
        let out_degree = adj[i].len();
        let degree_centrality = if n > 1 {
            (in_degree + out_degree) as f64 / (n - 1) as f64
        } else {
            0.0
        };
        per_module.insert(
            id.clone(),
            ModuleMetrics {
                in_degree,
                out_degree,
                degree_centrality,
                betweenness: betweenness[i],
            },
        );
    }

    let is_dag = cycles.is_empty();
    GraphMetrics {
        per_module,
        cycles,
        cycles_saturated,
        is_dag,
    }
}

/// Brandes' algorithm: one BFS per source counting shortest paths, then
/// dependency accumulation walking the BFS stack backwards. Scores are
/// normalized by (N-1)(N-2) for N > 2, else everything is 0.
fn betweenness_centrality(adj: &[Vec<usize>]) -> Vec<f64> {
    let n = adj.len();
    let mut scores = vec![0.0; n];
    if n <= 2 {
        return scores;
    }

    for source in 0..n {
        let mut stack: Vec<usize> = Vec::new();
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut num_paths: Vec<f64> = vec![0.0; n];
        num_paths[source] = 1.0;
        let mut distance: Vec<i64> = vec![-1; n];
        distance[source] = 0;

        let mut queue = VecDeque::new();
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &adj[v] {
                if distance[w] < 0 {
                    distance[w] = distance[v] + 1;
                    queue.push_back(w);
                }
                if distance[w] == distance[v] + 1 {
                    num_paths[w] += num_paths[v];
                    predecessors[w].push(v);
                }
            }
        }

        let mut dependency = vec![0.0; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                dependency[v] += (num_paths[v] / num_paths[w]) * (1.0 + dependency[w]);
            }
            if w != source {
                scores[w] += dependency[w];
            }
        }
    }

    let scale = ((n - 1) * (n - 2)) as f64;
    for score in &mut scores {
        *score /= scale;
    }
    scores
}

/// DFS with an on-stack marker; a back-edge to an on-stack node yields the
/// path slice from that node to the current one. Duplicate rotations of the
/// same cycle are dropped via a canonical-rotation key.
struct CycleFinder<'a> {
    adj: &'a [Vec<usize>],
    ids: &'a [String],
    visited: Vec<bool>,
    on_stack: Vec<bool>,
    path: Vec<usize>,
    seen: HashSet<Vec<usize>>,
    cycles: Vec<Vec<String>>,
    saturated: bool,
    bound: usize,
}

fn enumerate_cycles(
    adj: &[Vec<usize>],
    ids: &[String],
    max_cycles: usize,
) -> (Vec<Vec<String>>, bool) {
    let n = adj.len();
    let mut finder = CycleFinder {
        adj,
        ids,
        visited: vec![false; n],
        on_stack: vec![false; n],
        path: Vec::new(),
        seen: HashSet::new(),
        cycles: Vec::new(),
        saturated: false,
        bound: max_cycles,
    };
    for v in 0..n {
        if finder.saturated {
            break;
        }
        if !finder.visited[v] {
            finder.dfs(v);
        }
    }
    (finder.cycles, finder.saturated)
}

impl CycleFinder<'_> {
    fn dfs(&mut self, v: usize) {
        self.visited[v] = true;
        self.on_stack[v] = true;
        self.path.push(v);

        for i in 0..self.adj[v].len() {
            if self.saturated {
                break;
            }
            let w = self.adj[v][i];
            if self.on_stack[w] {
                self.record(w);
            } else if !self.visited[w] {
                self.dfs(w);
            }
        }

        self.path.pop();
        self.on_stack[v] = false;
    }

    fn record(&mut self, start: usize) {
        let Some(pos) = self.path.iter().position(|&x| x == start) else {
            return;
        };
        let cycle = self.path[pos..].to_vec();
        if !self.seen.insert(canonical_rotation(&cycle)) {
            return;
        }
        if self.cycles.len() >= self.bound {
            self.saturated = true;
            return;
        }
        self.cycles
            .push(cycle.into_iter().map(|i| self.ids[i].clone()).collect());
    }
}

/// Rotates the cycle so its smallest node comes first, giving every
/// rotation of the same cycle the same key.
fn canonical_rotation(cycle: &[usize]) -> Vec<usize> {
    let min_pos = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, &v)| v)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut rotated = Vec::with_capacity(cycle.len());
    rotated.extend_from_slice(&cycle[min_pos..]);
    rotated.extend_from_slice(&cycle[..min_pos]);
    rotated
}
