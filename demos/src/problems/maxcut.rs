//! Weighted Max-Cut.

use std::fmt;

use arvak_varopt::Outcome;

use super::Problem;

/// An undirected weighted graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    /// Number of nodes.
    pub n_nodes: usize,
    /// Edges as `(i, j, weight)`.
    pub edges: Vec<(usize, usize, f64)>,
}

impl Graph {
    /// Create a graph without edges.
    pub fn new(n_nodes: usize) -> Self {
        Self {
            n_nodes,
            edges: Vec::new(),
        }
    }

    /// Add a weighted edge.
    pub fn with_edge(mut self, i: usize, j: usize, weight: f64) -> Self {
        self.edges.push((i, j, weight));
        self
    }

    /// 4-cycle; maximum cut 4.
    pub fn square_4() -> Self {
        Self::ring(4)
    }

    /// Complete graph on 4 nodes; maximum cut 4.
    pub fn complete_4() -> Self {
        Self::complete(4)
    }

    /// 6-cycle; maximum cut 6.
    pub fn ring_6() -> Self {
        Self::ring(6)
    }

    /// Cycle on `n` nodes with unit weights.
    pub fn ring(n: usize) -> Self {
        (0..n).fold(Self::new(n), |g, i| g.with_edge(i, (i + 1) % n, 1.0))
    }

    /// Complete graph on `n` nodes with unit weights.
    pub fn complete(n: usize) -> Self {
        let mut g = Self::new(n);
        for i in 0..n {
            for j in i + 1..n {
                g.edges.push((i, j, 1.0));
            }
        }
        g
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Total weight of edges crossing the partition.
    pub fn cut_value(&self, outcome: Outcome) -> f64 {
        self.edges
            .iter()
            .filter(|&&(i, j, _)| outcome.bit(i) != outcome.bit(j))
            .map(|&(_, _, w)| w)
            .sum()
    }

    /// Node sets of the two sides of a partition.
    pub fn partition(&self, outcome: Outcome) -> (Vec<usize>, Vec<usize>) {
        (0..self.n_nodes).partition(|&q| !outcome.bit(q))
    }
}

impl Problem for Graph {
    fn identity(&self) -> String {
        let edges: Vec<String> = self
            .edges
            .iter()
            .map(|(i, j, w)| format!("{}-{}:{}", i, j, w))
            .collect();
        format!("maxcut/n{}/{}", self.n_nodes, edges.join(","))
    }

    fn num_qubits(&self) -> usize {
        self.n_nodes
    }

    fn cost(&self, outcome: Outcome) -> f64 {
        self.cut_value(outcome)
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Graph with {} nodes, {} edges:", self.n_nodes, self.num_edges())?;
        for (i, j, w) in &self.edges {
            writeln!(f, "    {} -- {} (weight {})", i, j, w)?;
        }
        Ok(())
    }
}
