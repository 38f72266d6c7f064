//! Executes one node once its upstream is settled.

use std::collections::BTreeMap;
use std::sync::Arc;

use concord_config::{ComparisonMode, SourceInputs};
use concord_consensus::Analyzer;
use concord_workflow::{Node, NodeKind};
use minijinja::Environment;
use tracing::{debug, instrument};

use crate::budget::CostTracker;
use crate::context::ExecutionContext;
use crate::credentials::SuppliedCredentials;
use crate::generate;
use crate::result::{ComparisonOutput, FailureReason, NodeOutput};

/// State shared by every node task of one run.
pub(crate) struct RunEnv {
  pub run_id: String,
  pub context: Arc<ExecutionContext>,
  pub credentials: SuppliedCredentials,
  pub inputs: SourceInputs,
  pub budget: CostTracker,
  pub default_max_unit_size: usize,
  pub templates: Environment<'static>,
}

/// What a node sees of its predecessors.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeInputs {
  /// Outputs of predecessors that finished `done`, keyed by node id.
  pub upstream: BTreeMap<String, NodeOutput>,
  /// Predecessors that failed or were skipped.
  pub missing: Vec<String>,
}

#[instrument(
  name = "node_execute",
  skip(node, inputs, env),
  fields(run_id = %env.run_id, node_id = %node.node_id, kind = node.kind.name())
)]
pub(crate) async fn run_node(
  node: &Node,
  inputs: NodeInputs,
  env: &RunEnv,
) -> Result<NodeOutput, FailureReason> {
  match &node.kind {
    NodeKind::Source { default_text } => env
      .inputs
      .get(&node.node_id)
      .or(default_text.as_ref())
      .cloned()
      .map(NodeOutput::Text)
      .ok_or(FailureReason::MissingInput),
    NodeKind::Generate(params) => generate::run(&node.node_id, params, &inputs, env)
      .await
      .map(NodeOutput::Generation),
    NodeKind::Compare { mode } => Ok(NodeOutput::Comparison(compare(*mode, inputs))),
    NodeKind::Sink => Ok(NodeOutput::Sink(inputs.upstream)),
  }
}

fn compare(mode: ComparisonMode, inputs: NodeInputs) -> ComparisonOutput {
  let texts: BTreeMap<String, String> = inputs
    .upstream
    .iter()
    .map(|(node_id, output)| (node_id.clone(), output.text()))
    .collect();
  let labelled: Vec<(String, &str)> = texts
    .iter()
    .map(|(node_id, text)| (node_id.clone(), text.as_str()))
    .collect();

  let result = Analyzer::new(mode).compare(&labelled);
  debug!(
    compared = labelled.len(),
    missing = inputs.missing.len(),
    label = result.consensus_label.as_str(),
    "comparison_finished"
  );

  ComparisonOutput {
    inputs: texts,
    missing: inputs.missing,
    result,
  }
}
