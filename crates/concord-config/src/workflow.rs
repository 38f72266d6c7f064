use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::node::NodeDef;

/// A workflow graph definition as produced by the graph editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub workflow_id: String,
  pub name: String,
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub edges: Vec<Edge>,
}
