use std::collections::HashMap;
use std::fmt;

use concord_config::{ExecutionOptions, SourceInputs, WorkflowDef};
use serde::{Deserialize, Serialize};

/// Everything a caller hands the engine for one run.
#[derive(Clone, Serialize, Deserialize)]
pub struct Submission {
  pub workflow: WorkflowDef,
  /// Source node id -> input text.
  #[serde(default)]
  pub inputs: SourceInputs,
  /// Provider name -> opaque secret. Never serialized back out.
  #[serde(default, skip_serializing)]
  pub credentials: HashMap<String, String>,
  #[serde(default)]
  pub options: ExecutionOptions,
}

impl Submission {
  pub fn new(workflow: WorkflowDef) -> Self {
    Self {
      workflow,
      inputs: SourceInputs::new(),
      credentials: HashMap::new(),
      options: ExecutionOptions::default(),
    }
  }

  pub fn with_input(mut self, node_id: impl Into<String>, text: impl Into<String>) -> Self {
    self.inputs.insert(node_id.into(), text.into());
    self
  }

  pub fn with_credential(mut self, provider: impl Into<String>, secret: impl Into<String>) -> Self {
    self.credentials.insert(provider.into(), secret.into());
    self
  }

  pub fn with_options(mut self, options: ExecutionOptions) -> Self {
    self.options = options;
    self
  }
}

impl fmt::Debug for Submission {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut providers: Vec<&String> = self.credentials.keys().collect();
    providers.sort();
    f.debug_struct("Submission")
      .field("workflow", &self.workflow.workflow_id)
      .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
      .field("credentials_for", &providers)
      .field("options", &self.options)
      .finish()
  }
}
