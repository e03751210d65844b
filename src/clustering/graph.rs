//! Stage 2: the eventlet similarity graph and its structure.
//!
//! Node `i` of an [`EventletGraph`] is the `i`-th eventlet of the run. Every
//! eventlet is a node, including ones with no edges.

use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};

use super::eventlets::Eventlet;
use super::similarity::cosine_distance;
use crate::config::Stage2Config;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventletGraph {
    /// Sorted neighbour lists.
    adjacency: Vec<Vec<usize>>,
}

/// Seconds between the closer ends of two intervals; 0 when they overlap.
pub fn time_gap(a: &Eventlet, b: &Eventlet) -> i64 {
    0i64.max(a.min_time - b.max_time).max(b.min_time - a.max_time)
}

/// Whether two eventlets pass both the time gate and the similarity gate.
pub fn should_merge(a: &Eventlet, b: &Eventlet, config: &Stage2Config) -> bool {
    if time_gap(a, b) as f64 > config.merge_time_window_seconds() {
        return false;
    }

    match cosine_distance(a.mean_embedding.view(), b.mean_embedding.view()) {
        Some(distance) => distance < config.merge_similarity_threshold,
        None => false,
    }
}

/// Connect every pair of eventlets that passes [`should_merge`].
pub fn build_similarity_graph(eventlets: &[Eventlet], config: &Stage2Config) -> EventletGraph {
    let n = eventlets.len();

    let later_neighbors: Vec<Vec<usize>> = (0..n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..n)
                .filter(|&j| should_merge(&eventlets[i], &eventlets[j], config))
                .collect()
        })
        .collect();

    let mut graph = EventletGraph::with_nodes(n);
    for (i, neighbors) in later_neighbors.into_iter().enumerate() {
        for j in neighbors {
            graph.add_edge(i, j);
        }
    }
    graph
}

impl EventletGraph {
    pub fn with_nodes(n: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); n],
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.adjacency
            .get(a)
            .is_some_and(|neighbors| neighbors.binary_search(&b).is_ok())
    }

    /// Add an undirected edge; self loops and duplicates are ignored.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        if a == b || self.has_edge(a, b) {
            return;
        }
        for (from, to) in [(a, b), (b, a)] {
            let neighbors = &mut self.adjacency[from];
            let at = neighbors.partition_point(|&n| n < to);
            neighbors.insert(at, to);
        }
    }

    /// Connected components, ordered by their lowest node; members ascending.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.node_count()];
        let mut components = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..self.node_count() {
            if seen[start] {
                continue;
            }

            seen[start] = true;
            queue.push_back(start);
            let mut component = Vec::new();

            while let Some(node) = queue.pop_front() {
                component.push(node);
                for &next in &self.adjacency[node] {
                    if !seen[next] {
                        seen[next] = true;
                        queue.push_back(next);
                    }
                }
            }

            component.sort_unstable();
            components.push(component);
        }

        components
    }

    /// Cut vertices of the subgraph induced by `nodes`, ascending.
    ///
    /// Subgraphs with fewer than three nodes have none: removing either end
    /// of a single edge leaves a singleton, which is not a split.
    pub fn articulation_points(&self, nodes: &[usize]) -> Vec<usize> {
        const UNVISITED: usize = usize::MAX;

        if nodes.len() < 3 {
            return Vec::new();
        }

        let local: HashMap<usize, usize> = nodes.iter().enumerate().map(|(l, &g)| (g, l)).collect();
        let n = nodes.len();
        let mut disc = vec![UNVISITED; n];
        let mut low = vec![0; n];
        let mut is_cut = vec![false; n];
        let mut timer = 0;

        for root in 0..n {
            if disc[root] != UNVISITED {
                continue;
            }
            disc[root] = timer;
            low[root] = timer;
            timer += 1;

            let mut root_children = 0;
            // (node, parent, index of the next neighbour to look at)
            let mut stack: Vec<(usize, usize, usize)> = vec![(root, UNVISITED, 0)];

            while let Some(frame) = stack.last_mut() {
                let (node, parent) = (frame.0, frame.1);
                let neighbors = &self.adjacency[nodes[node]];

                if frame.2 < neighbors.len() {
                    let global = neighbors[frame.2];
                    frame.2 += 1;

                    let Some(&next) = local.get(&global) else {
                        continue;
                    };

                    if disc[next] == UNVISITED {
                        disc[next] = timer;
                        low[next] = timer;
                        timer += 1;
                        if node == root {
                            root_children += 1;
                        }
                        stack.push((next, node, 0));
                    } else if next != parent {
                        low[node] = low[node].min(disc[next]);
                    }
                } else {
                    stack.pop();
                    if let Some(&(up, _, _)) = stack.last() {
                        low[up] = low[up].min(low[node]);
                        if up != root && low[node] >= disc[up] {
                            is_cut[up] = true;
                        }
                    }
                }
            }

            if root_children > 1 {
                is_cut[root] = true;
            }
        }

        let mut cuts: Vec<usize> = (0..n).filter(|&l| is_cut[l]).map(|l| nodes[l]).collect();
        cuts.sort_unstable();
        cuts
    }
}
