//! Prompt rendering using minijinja templates.
//!
//! A generate node's `prompt_template` is rendered once per chunk with:
//! - `input`: the current chunk of the node's joined upstream text
//! - `inputs`: every completed upstream node's text, keyed by node id
//!
//! ```text
//! Answer strictly yes or no.\n\n{{ input }}
//! Compare {{ inputs.question }} with {{ inputs.context }}
//! ```

use std::collections::BTreeMap;

use minijinja::{Environment, context};

use crate::result::FailureReason;

pub(crate) fn render_prompt(
  env: &Environment<'_>,
  template: &str,
  input: &str,
  inputs: &BTreeMap<String, String>,
) -> Result<String, FailureReason> {
  env
    .render_str(template, context! { input => input, inputs => inputs })
    .map_err(|e| FailureReason::Template {
      message: e.to_string(),
    })
}
