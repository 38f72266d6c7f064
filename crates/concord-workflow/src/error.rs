use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
  #[error("workflow has no nodes")]
  Empty,

  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("node not found: {0}")]
  NodeNotFound(String),

  #[error("edge references unknown node: from={from}, to={to}")]
  InvalidEdge { from: String, to: String },

  #[error("duplicate edge: from={from}, to={to}")]
  DuplicateEdge { from: String, to: String },

  #[error("node {0} has no incoming edge and is not a source")]
  MissingDependency(String),

  #[error("invalid node {node_id}: {reason}")]
  InvalidNode { node_id: String, reason: String },

  #[error("graph contains a cycle through: {}", .0.join(", "))]
  Cycle(Vec<String>),
}
