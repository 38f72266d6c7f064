use std::collections::{BTreeMap, HashSet};

use concord_config::{NodeDef, NodeType, WorkflowDef};

use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::node::{DEFAULT_PROMPT_TEMPLATE, GenerateSpec, Node, NodeKind};

/// A validated workflow ready for execution.
///
/// Construction fails unless the graph is acyclic, every edge endpoint exists
/// and every non-source node has at least one incoming edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  nodes: BTreeMap<String, Node>,
  edges: Vec<(String, String)>,
  graph: Graph,
  order: Vec<String>,
}

impl Workflow {
  pub fn from_def(def: &WorkflowDef) -> Result<Self, WorkflowError> {
    if def.nodes.is_empty() {
      return Err(WorkflowError::Empty);
    }

    let mut nodes = BTreeMap::new();
    for node_def in &def.nodes {
      let node = lock_node(node_def)?;
      if nodes.insert(node.node_id.clone(), node).is_some() {
        return Err(WorkflowError::DuplicateNode(node_def.node_id.clone()));
      }
    }

    let mut seen = HashSet::new();
    let mut edges = Vec::with_capacity(def.edges.len());
    for edge in &def.edges {
      if !nodes.contains_key(&edge.from) || !nodes.contains_key(&edge.to) {
        return Err(WorkflowError::InvalidEdge {
          from: edge.from.clone(),
          to: edge.to.clone(),
        });
      }
      if !seen.insert((edge.from.as_str(), edge.to.as_str())) {
        return Err(WorkflowError::DuplicateEdge {
          from: edge.from.clone(),
          to: edge.to.clone(),
        });
      }
      edges.push((edge.from.clone(), edge.to.clone()));
    }

    let graph = Graph::new(nodes.keys(), &edges);
    let order = graph.topological_order()?;

    for node in nodes.values() {
      let has_incoming = !graph.upstream(&node.node_id).is_empty();
      match &node.kind {
        NodeKind::Source { .. } if has_incoming => {
          return Err(invalid(&node.node_id, "source nodes cannot have incoming edges"));
        }
        NodeKind::Sink if !graph.downstream(&node.node_id).is_empty() => {
          return Err(invalid(&node.node_id, "sink nodes cannot have outgoing edges"));
        }
        kind if !kind.is_source() && !has_incoming => {
          return Err(WorkflowError::MissingDependency(node.node_id.clone()));
        }
        _ => {}
      }
    }

    Ok(Self {
      workflow_id: def.workflow_id.clone(),
      name: def.name.clone(),
      nodes,
      edges,
      graph,
      order,
    })
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.get(node_id)
  }

  /// Nodes keyed by id, in id order.
  pub fn nodes(&self) -> &BTreeMap<String, Node> {
    &self.nodes
  }

  pub fn edges(&self) -> &[(String, String)] {
    &self.edges
  }

  pub fn topological_order(&self) -> &[String] {
    &self.order
  }

  /// Distinct provider names referenced by generate nodes.
  pub fn providers(&self) -> Vec<&str> {
    let mut providers: Vec<&str> = self
      .nodes
      .values()
      .filter_map(|node| match &node.kind {
        NodeKind::Generate(params) => Some(params.provider.as_str()),
        _ => None,
      })
      .collect();
    providers.sort_unstable();
    providers.dedup();
    providers
  }
}

fn invalid(node_id: &str, reason: &str) -> WorkflowError {
  WorkflowError::InvalidNode {
    node_id: node_id.to_string(),
    reason: reason.to_string(),
  }
}

fn lock_node(def: &NodeDef) -> Result<Node, WorkflowError> {
  if def.node_id.trim().is_empty() {
    return Err(invalid(&def.node_id, "node id must not be empty"));
  }

  let kind = match &def.node_type {
    NodeType::Source { default_text } => NodeKind::Source {
      default_text: default_text.clone(),
    },
    NodeType::Generate {
      provider,
      model,
      prompt_template,
      max_unit_size,
      chunk_policy,
    } => {
      if provider.trim().is_empty() {
        return Err(invalid(&def.node_id, "provider must not be empty"));
      }
      if model.trim().is_empty() {
        return Err(invalid(&def.node_id, "model must not be empty"));
      }
      if *max_unit_size == Some(0) {
        return Err(invalid(&def.node_id, "max_unit_size must be positive"));
      }
      NodeKind::Generate(GenerateSpec {
        provider: provider.clone(),
        model: model.clone(),
        prompt_template: prompt_template
          .clone()
          .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
        max_unit_size: *max_unit_size,
        chunk_policy: *chunk_policy,
      })
    }
    NodeType::Compare { mode } => NodeKind::Compare { mode: *mode },
    NodeType::Sink => NodeKind::Sink,
  };

  Ok(Node {
    node_id: def.node_id.clone(),
    best_effort: def.is_best_effort(),
    kind,
  })
}
