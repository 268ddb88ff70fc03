use crate::clearing::liability::LiabilityMatrix;
use crate::core::entity::BankId;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// A set of banks that all owe, directly or through a chain, every other
/// bank in the set.
///
/// A default anywhere in a cluster can feed back on itself, so the clearing
/// vector has to resolve the whole cluster jointly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContagionCluster {
    /// Sorted by id.
    pub banks: Vec<BankId>,
    /// Sum of obligations between members of the cluster.
    pub internal_obligations: f64,
}

impl ContagionCluster {
    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    pub fn contains(&self, bank: BankId) -> bool {
        self.banks.binary_search(&bank).is_ok()
    }
}

/// Directed view of a liability matrix: an edge `i -> j` weighted by what
/// bank `i` owes bank `j`.
///
/// # Examples
///
/// ```
/// use credit_contagion::clearing::liability::LiabilityMatrix;
/// use credit_contagion::graph::exposure::ExposureGraph;
///
/// let matrix = LiabilityMatrix::from_rows(&[
///     vec![0.0, 10.0, 0.0],
///     vec![5.0, 0.0, 0.0],
///     vec![0.0, 0.0, 0.0],
/// ])
/// .unwrap();
/// let graph = ExposureGraph::from_matrix(&matrix);
/// let clusters = graph.contagion_clusters();
/// assert_eq!(clusters.len(), 1);
/// assert_eq!(clusters[0].internal_obligations, 15.0);
/// ```
#[derive(Debug, Clone)]
pub struct ExposureGraph {
    graph: DiGraph<BankId, f64>,
}

impl ExposureGraph {
    pub fn from_matrix(matrix: &LiabilityMatrix) -> Self {
        let mut graph = DiGraph::with_capacity(matrix.size(), 0);
        for i in 0..matrix.size() {
            graph.add_node(BankId::new(i));
        }
        for (from, to, amount) in matrix.edges() {
            if from != to {
                graph.add_edge(node(from), node(to), amount);
            }
        }
        Self { graph }
    }

    pub fn bank_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Strongly connected components with more than one bank, largest first.
    pub fn contagion_clusters(&self) -> Vec<ContagionCluster> {
        let mut clusters: Vec<ContagionCluster> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut banks: Vec<BankId> = component.iter().map(|&n| self.graph[n]).collect();
                banks.sort();
                let internal_obligations = component
                    .iter()
                    .flat_map(|&n| self.graph.edges_directed(n, Direction::Outgoing))
                    .filter(|edge| component.contains(&edge.target()))
                    .map(|edge| *edge.weight())
                    .sum();
                ContagionCluster {
                    banks,
                    internal_obligations,
                }
            })
            .collect();
        clusters.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.banks.cmp(&b.banks)));
        clusters
    }

    /// Banks that would be short of payments, directly or down the chain,
    /// if `bank` paid nothing.
    pub fn exposed_to(&self, bank: BankId) -> Vec<BankId> {
        let mut exposed = Vec::new();
        let mut bfs = Bfs::new(&self.graph, node(bank));
        while let Some(n) = bfs.next(&self.graph) {
            if self.graph[n] != bank {
                exposed.push(self.graph[n]);
            }
        }
        exposed.sort();
        exposed
    }

    /// Direct creditors of `bank` with the amount owed to each.
    pub fn creditors(&self, bank: BankId) -> Vec<(BankId, f64)> {
        let mut creditors: Vec<(BankId, f64)> = self
            .graph
            .edges_directed(node(bank), Direction::Outgoing)
            .map(|edge| (self.graph[edge.target()], *edge.weight()))
            .collect();
        creditors.sort_by_key(|(id, _)| *id);
        creditors
    }
}

fn node(bank: BankId) -> NodeIndex {
    NodeIndex::new(bank.index())
}
