use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::WorkflowError;

/// Graph structure for traversal and analysis.
///
/// Neighbour lists are kept sorted by node id so every traversal is
/// deterministic regardless of edge declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
  /// Build a graph from node ids and edges.
  ///
  /// Edges must already reference known nodes; `Workflow::from_def` checks that.
  pub fn new<'a>(node_ids: impl IntoIterator<Item = &'a String>, edges: &[(String, String)]) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node_id in node_ids {
      adjacency.entry(node_id.clone()).or_default();
      reverse_adjacency.entry(node_id.clone()).or_default();
    }

    for (from, to) in edges {
      adjacency.entry(from.clone()).or_default().push(to.clone());
      reverse_adjacency
        .entry(to.clone())
        .or_default()
        .push(from.clone());
    }

    for list in adjacency.values_mut().chain(reverse_adjacency.values_mut()) {
      list.sort();
    }

    Self {
      adjacency,
      reverse_adjacency,
    }
  }

  /// Nodes with no downstream edges.
  pub fn terminal_nodes(&self) -> Vec<String> {
    let mut terminals: Vec<String> = self
      .adjacency
      .iter()
      .filter(|(_, outgoing)| outgoing.is_empty())
      .map(|(id, _)| id.clone())
      .collect();
    terminals.sort();
    terminals
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Kahn's algorithm, picking the smallest ready id first.
  ///
  /// Returns the nodes left unordered when the graph is cyclic.
  pub fn topological_order(&self) -> Result<Vec<String>, WorkflowError> {
    let mut in_degree: BTreeMap<&str, usize> = self
      .reverse_adjacency
      .iter()
      .map(|(id, incoming)| (id.as_str(), incoming.len()))
      .collect();

    let mut ready: BTreeSet<&str> = in_degree
      .iter()
      .filter(|(_, degree)| **degree == 0)
      .map(|(id, _)| *id)
      .collect();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(node_id) = ready.pop_first() {
      order.push(node_id.to_string());
      for next in self.downstream(node_id) {
        if let Some(degree) = in_degree.get_mut(next.as_str()) {
          *degree -= 1;
          if *degree == 0 {
            ready.insert(next.as_str());
          }
        }
      }
    }

    if order.len() < in_degree.len() {
      let remaining = in_degree
        .into_iter()
        .filter(|(_, degree)| *degree > 0)
        .map(|(id, _)| id.to_string())
        .collect();
      return Err(WorkflowError::Cycle(remaining));
    }

    Ok(order)
  }
}
