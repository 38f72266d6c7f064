//! The generate pipeline: join upstream text, segment it, and submit each
//! chunk through the resilience layers.
//!
//! Admission happens once per node, before any call: render every prompt,
//! check the budget, resolve the credential, then take one rate-limit permit
//! costing one token per submitted chunk. A node whose chunks cannot all be
//! admitted fails without spending anything. Each chunk then re-checks the
//! budget and calls through the breaker with the adaptive timeout.

use std::collections::BTreeMap;
use std::time::Duration;

use concord_config::ChunkPolicy;
use concord_provider::{Credential, GenerationResult, Provider, TokenUsage};
use concord_segment::segment;
use concord_workflow::GenerateSpec;
use tracing::{debug, warn};

use crate::node::{NodeInputs, RunEnv};
use crate::result::{FailureReason, GenerationOutput};
use crate::template::render_prompt;

const UPSTREAM_SEPARATOR: &str = "\n\n";
const CHUNK_SEPARATOR: &str = "\n";

pub(crate) async fn run(
  node_id: &str,
  params: &GenerateSpec,
  inputs: &NodeInputs,
  env: &RunEnv,
) -> Result<GenerationOutput, FailureReason> {
  let provider = env
    .context
    .providers
    .get(&params.provider)
    .ok_or_else(|| FailureReason::Internal {
      message: format!("provider '{}' is not registered", params.provider),
    })?;

  let upstream: BTreeMap<String, String> = inputs
    .upstream
    .iter()
    .map(|(id, output)| (id.clone(), output.text()))
    .collect();
  let joined = upstream
    .values()
    .map(String::as_str)
    .collect::<Vec<_>>()
    .join(UPSTREAM_SEPARATOR);

  let max_unit_size = params.max_unit_size.unwrap_or(env.default_max_unit_size);
  let mut chunks: Vec<&str> = segment(&joined, max_unit_size).collect();
  if chunks.is_empty() {
    chunks.push("");
  }

  let submitted = match params.chunk_policy {
    ChunkPolicy::SubmitAll => chunks.len(),
    ChunkPolicy::FirstOnly => 1,
  };
  let truncated_chunks = chunks.len() - submitted;
  if truncated_chunks > 0 {
    warn!(
      node_id = %node_id,
      total = chunks.len(),
      truncated = truncated_chunks,
      "chunks_truncated"
    );
  }

  let prompts = chunks
    .iter()
    .take(submitted)
    .map(|chunk| render_prompt(&env.templates, &params.prompt_template, chunk, &upstream))
    .collect::<Result<Vec<_>, _>>()?;

  env.budget.check()?;
  let credential = env
    .credentials
    .resolve(&params.provider, env.context.credentials.as_ref())?;
  let largest = prompts.iter().map(String::len).max().unwrap_or(0);
  let tokens = u32::try_from(prompts.len()).unwrap_or(u32::MAX);
  env
    .context
    .governor
    .admit(&params.provider, credential.fingerprint(), largest, tokens)
    .map_err(|err| {
      warn!(node_id = %node_id, chunks = prompts.len(), error = %err, "admission_rejected");
      FailureReason::from(err)
    })?;

  let pricing = provider.pricing();
  let mut texts = Vec::with_capacity(submitted);
  let mut usage = TokenUsage::default();
  let mut latency = Duration::ZERO;
  let mut estimated_cost = 0.0;

  for (index, prompt) in prompts.iter().enumerate() {
    env.budget.check()?;
    let result = submit(provider.as_ref(), params, prompt, &credential, env).await?;

    let cost = pricing.cost(&result.usage);
    env.budget.record(&result.usage, cost);
    debug!(
      node_id = %node_id,
      chunk = index,
      latency_ms = result.latency_ms,
      total_tokens = result.usage.total,
      "chunk_generated"
    );

    usage.add(&result.usage);
    latency += Duration::from_millis(result.latency_ms);
    estimated_cost += cost;
    texts.push(result.text);
  }

  Ok(GenerationOutput {
    provider: params.provider.clone(),
    model: params.model.clone(),
    text: texts.join(CHUNK_SEPARATOR),
    usage,
    latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
    estimated_cost,
    chunks: submitted,
    truncated_chunks,
  })
}

async fn submit(
  provider: &dyn Provider,
  params: &GenerateSpec,
  prompt: &str,
  credential: &Credential,
  env: &RunEnv,
) -> Result<GenerationResult, FailureReason> {
  let fingerprint = credential.fingerprint();
  let context = env.context.as_ref();

  let breaker = context.breakers.get_or_create(&params.provider, fingerprint);
  let name = params.provider.as_str();
  let model = params.model.as_str();
  let timeouts = &context.timeouts;

  context
    .breakers
    .call_through(&breaker, move || {
      timeouts.with_timeout(name, move || provider.generate(model, prompt, credential))
    })
    .await
    .map_err(|err| {
      warn!(
        provider = %name,
        credential = %fingerprint,
        error = %err,
        "provider_call_failed"
      );
      FailureReason::from(err)
    })
}
