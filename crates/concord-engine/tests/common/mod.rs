#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use concord_config::{ChunkPolicy, WorkflowDef};
use concord_engine::{
  ChannelNotifier, Engine, EngineConfig, ExecutionContext, ExecutionEvent, MemoryCredentialStore,
};
use concord_provider::{
  Credential, GenerationResult, Pricing, Provider, ProviderError, ProviderRegistry, TokenUsage,
};
use serde_json::json;
use tokio::sync::mpsc;

pub enum Script {
  Reply(String),
  /// Return the rendered prompt as the generated text.
  Echo,
  Fail(ProviderError),
}

/// In-process provider with a fixed behavior that counts its calls.
pub struct ScriptedProvider {
  name: String,
  script: Script,
  pricing: Pricing,
  delay: Option<Duration>,
  calls: AtomicUsize,
  in_flight: AtomicUsize,
  peak: AtomicUsize,
}

impl ScriptedProvider {
  fn with_script(name: &str, script: Script) -> Self {
    Self {
      name: name.to_string(),
      script,
      pricing: Pricing::default(),
      delay: None,
      calls: AtomicUsize::new(0),
      in_flight: AtomicUsize::new(0),
      peak: AtomicUsize::new(0),
    }
  }

  pub fn replying(name: &str, text: &str) -> Self {
    Self::with_script(name, Script::Reply(text.to_string()))
  }

  pub fn echo(name: &str) -> Self {
    Self::with_script(name, Script::Echo)
  }

  pub fn failing(name: &str, err: ProviderError) -> Self {
    Self::with_script(name, Script::Fail(err))
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn with_pricing(mut self, pricing: Pricing) -> Self {
    self.pricing = pricing;
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  /// Highest number of calls observed in flight at once.
  pub fn peak_in_flight(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Provider for ScriptedProvider {
  fn name(&self) -> &str {
    &self.name
  }

  fn pricing(&self) -> Pricing {
    self.pricing
  }

  async fn generate(
    &self,
    _model: &str,
    prompt: &str,
    _credential: &Credential,
  ) -> Result<GenerationResult, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);

    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    let text = match &self.script {
      Script::Reply(text) => text.clone(),
      Script::Echo => prompt.to_string(),
      Script::Fail(err) => return Err(err.clone()),
    };
    Ok(GenerationResult {
      text,
      usage: TokenUsage::new(10, 5),
      latency_ms: 1,
    })
  }
}

pub fn secret(provider: &str) -> String {
  format!("test-secret-{}", provider)
}

pub struct Harness {
  pub engine: Engine<ChannelNotifier>,
  pub events: mpsc::UnboundedReceiver<ExecutionEvent>,
  pub credentials: Arc<MemoryCredentialStore>,
}

pub fn harness(config: EngineConfig, providers: &[Arc<ScriptedProvider>]) -> Harness {
  let mut registry = ProviderRegistry::new();
  for provider in providers {
    registry.register(provider.name().to_string(), provider.clone() as Arc<dyn Provider>);
  }
  let credentials = Arc::new(MemoryCredentialStore::new());
  let context = ExecutionContext::new(&config, registry).with_credential_store(credentials.clone());
  let (notifier, events) = ChannelNotifier::channel();
  Harness {
    engine: Engine::with_notifier(config, Arc::new(context), notifier),
    events,
    credentials,
  }
}

pub fn drain(events: &mut mpsc::UnboundedReceiver<ExecutionEvent>) -> Vec<ExecutionEvent> {
  let mut collected = Vec::new();
  while let Ok(event) = events.try_recv() {
    collected.push(event);
  }
  collected
}

/// source → generate(p1), source → generate(p2), both → compare → sink.
pub fn consensus_workflow() -> WorkflowDef {
  serde_json::from_value(json!({
    "workflow_id": "consensus",
    "name": "Two-provider consensus",
    "nodes": [
      { "node_id": "question", "type": "source" },
      { "node_id": "gen_p1", "type": "generate", "provider": "p1", "model": "m1" },
      { "node_id": "gen_p2", "type": "generate", "provider": "p2", "model": "m2" },
      { "node_id": "compare", "type": "compare" },
      { "node_id": "report", "type": "sink" }
    ],
    "edges": [
      { "from": "question", "to": "gen_p1" },
      { "from": "question", "to": "gen_p2" },
      { "from": "gen_p1", "to": "compare" },
      { "from": "gen_p2", "to": "compare" },
      { "from": "compare", "to": "report" }
    ]
  }))
  .unwrap()
}

/// source → generate(p1) → sink.
pub fn single_generate(max_unit_size: usize, chunk_policy: ChunkPolicy) -> WorkflowDef {
  serde_json::from_value(json!({
    "workflow_id": "single",
    "name": "Single generation",
    "nodes": [
      { "node_id": "doc", "type": "source" },
      {
        "node_id": "gen",
        "type": "generate",
        "provider": "p1",
        "model": "m1",
        "max_unit_size": max_unit_size,
        "chunk_policy": chunk_policy
      },
      { "node_id": "out", "type": "sink" }
    ],
    "edges": [
      { "from": "doc", "to": "gen" },
      { "from": "gen", "to": "out" }
    ]
  }))
  .unwrap()
}
