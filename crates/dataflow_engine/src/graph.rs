// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module dependency graph built from a network snapshot.

use crate::error::NetworkHasCycles;
use dataflow_network::{ModuleFilter, ModuleId, Network, NetworkSnapshot};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Directed graph whose vertices are the modules passing a filter and whose
/// edges are the connections between two such modules.
///
/// Vertices keep network insertion order; parallel connections between the
/// same pair of modules collapse into one edge.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    vertices: Vec<ModuleId>,
    index: HashMap<ModuleId, usize>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build from a snapshot, keeping only modules accepted by `filter`
    pub fn from_snapshot(snapshot: &NetworkSnapshot, filter: &ModuleFilter) -> Self {
        let vertices: Vec<ModuleId> = snapshot
            .modules()
            .iter()
            .filter(|module| filter.accepts(module))
            .map(|module| module.id().clone())
            .collect();
        let mut graph = Self::with_vertices(vertices);
        for connection in snapshot.connections() {
            if let (Some(from), Some(to)) = (
                graph.index_of(connection.output_module()),
                graph.index_of(connection.input_module()),
            ) {
                graph.add_edge(from, to);
            }
        }
        graph
    }

    /// Build from the current state of a network
    pub fn from_network(network: &Network, filter: &ModuleFilter) -> Self {
        Self::from_snapshot(&network.snapshot(), filter)
    }

    /// Build directly from ids and edges; edges naming unknown ids are ignored
    pub fn from_edges(
        vertices: impl IntoIterator<Item = ModuleId>,
        edges: impl IntoIterator<Item = (ModuleId, ModuleId)>,
    ) -> Self {
        let mut graph = Self::with_vertices(vertices.into_iter().collect());
        for (from, to) in edges {
            if let (Some(from), Some(to)) = (graph.index_of(&from), graph.index_of(&to)) {
                graph.add_edge(from, to);
            }
        }
        graph
    }

    fn with_vertices(vertices: Vec<ModuleId>) -> Self {
        let index = vertices
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let n = vertices.len();
        Self {
            vertices,
            index,
            successors: vec![Vec::new(); n],
            predecessors: vec![Vec::new(); n],
        }
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if !self.successors[from].contains(&to) {
            self.successors[from].push(to);
            self.predecessors[to].push(from);
        }
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the graph has no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of distinct edges
    pub fn nedges(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    /// Vertex ids, in network order
    pub fn vertices(&self) -> &[ModuleId] {
        &self.vertices
    }

    /// Position of a vertex
    pub fn index_of(&self, id: &ModuleId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Whether a module is part of the graph
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.index.contains_key(id)
    }

    /// Direct successors of a module
    pub fn successors(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.neighbours(id, &self.successors)
    }

    /// Direct predecessors of a module
    pub fn predecessors(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.neighbours(id, &self.predecessors)
    }

    fn neighbours(&self, id: &ModuleId, adjacency: &[Vec<usize>]) -> Vec<ModuleId> {
        self.index_of(id)
            .map(|v| {
                adjacency[v]
                    .iter()
                    .map(|&n| self.vertices[n].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every edge as `(from, to)`
    pub fn edges(&self) -> impl Iterator<Item = (&ModuleId, &ModuleId)> + '_ {
        self.successors.iter().enumerate().flat_map(move |(from, tos)| {
            tos.iter()
                .map(move |&to| (&self.vertices[from], &self.vertices[to]))
        })
    }

    /// Kahn's algorithm with the lowest ready vertex index taken first.
    ///
    /// Ties are broken by network insertion order, so an unchanged graph
    /// always yields the same order.
    pub fn topological_order(&self) -> Result<Vec<ModuleId>, NetworkHasCycles> {
        let mut in_degree = self.in_degrees();
        let mut ready: BTreeSet<usize> = (0..self.len()).filter(|&v| in_degree[v] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(v) = ready.pop_first() {
            order.push(self.vertices[v].clone());
            for &s in &self.successors[v] {
                in_degree[s] -= 1;
                if in_degree[s] == 0 {
                    ready.insert(s);
                }
            }
        }

        self.check_complete(order.len(), &in_degree)?;
        Ok(order)
    }

    /// Kahn's algorithm taking the whole ready set at once.
    ///
    /// Each wave holds every vertex whose predecessors all sit in earlier
    /// waves, giving the coarsest legal partition.
    pub fn waves(&self) -> Result<Vec<Vec<ModuleId>>, NetworkHasCycles> {
        let mut in_degree = self.in_degrees();
        let mut ready: Vec<usize> = (0..self.len()).filter(|&v| in_degree[v] == 0).collect();
        let mut waves = Vec::new();
        let mut emitted = 0;

        while !ready.is_empty() {
            let mut next = Vec::new();
            for &v in &ready {
                for &s in &self.successors[v] {
                    in_degree[s] -= 1;
                    if in_degree[s] == 0 {
                        next.push(s);
                    }
                }
            }
            emitted += ready.len();
            waves.push(ready.iter().map(|&v| self.vertices[v].clone()).collect());
            next.sort_unstable();
            ready = next;
        }

        self.check_complete(emitted, &in_degree)?;
        Ok(waves)
    }

    fn in_degrees(&self) -> Vec<usize> {
        self.predecessors.iter().map(Vec::len).collect()
    }

    fn check_complete(&self, emitted: usize, in_degree: &[usize]) -> Result<(), NetworkHasCycles> {
        if emitted == self.len() {
            return Ok(());
        }
        let modules: Vec<ModuleId> = (0..self.len())
            .filter(|&v| in_degree[v] > 0)
            .map(|v| self.vertices[v].clone())
            .collect();
        tracing::warn!(modules = modules.len(), "network has cycles");
        Err(NetworkHasCycles { modules })
    }

    fn reachable(&self, start: usize, adjacency: &[Vec<usize>]) -> Vec<bool> {
        let mut seen = vec![false; self.len()];
        let mut queue: VecDeque<usize> = adjacency[start].iter().copied().collect();
        while let Some(v) = queue.pop_front() {
            if !seen[v] {
                seen[v] = true;
                queue.extend(adjacency[v].iter().copied());
            }
        }
        seen
    }

    fn collect(&self, seen: &[bool]) -> Vec<ModuleId> {
        seen.iter()
            .enumerate()
            .filter(|(_, seen)| **seen)
            .map(|(v, _)| self.vertices[v].clone())
            .collect()
    }

    /// Every module with a path into `id`, in network order
    pub fn upstream_of(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.index_of(id)
            .map(|v| self.collect(&self.reachable(v, &self.predecessors)))
            .unwrap_or_default()
    }

    /// Every module reachable from `id`, in network order
    pub fn downstream_of(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.index_of(id)
            .map(|v| self.collect(&self.reachable(v, &self.successors)))
            .unwrap_or_default()
    }

    /// Whether a directed path of at least one edge leads from `from` to `to`
    pub fn has_path(&self, from: &ModuleId, to: &ModuleId) -> bool {
        match (self.index_of(from), self.index_of(to)) {
            (Some(f), Some(t)) => self.reachable(f, &self.successors)[t],
            _ => false,
        }
    }
}
