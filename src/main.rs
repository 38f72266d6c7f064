use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use concord_config::{SourceInputs, WorkflowDef};
use concord_engine::{Engine, EngineConfig, ExecutionContext, Submission};
use concord_workflow::Workflow;

/// Concord - multi-provider generation workflows with consensus checking
#[derive(Parser)]
#[command(name = "concord")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the engine config (default: ~/.concord/config.json if present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow and print the execution result as JSON
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// JSON object mapping source node ids to input text
    #[arg(long)]
    inputs: Option<PathBuf>,

    /// JSON object mapping provider names to credentials
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Maximum number of nodes running at once
    #[arg(long)]
    max_parallelism: Option<usize>,

    /// Ceiling on the estimated cost of the run, in USD
    #[arg(long)]
    budget: Option<f64>,
  },

  /// Check a workflow's structure without running it
  Validate {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },
}

fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run {
      workflow_file,
      inputs,
      credentials,
      max_parallelism,
      budget,
    }) => {
      let config = load_config(cli.config.as_deref())?;
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async {
        let mut submission = Submission::new(read_workflow(&workflow_file)?);
        if let Some(path) = inputs {
          submission.inputs = read_json::<SourceInputs>(&path, "inputs")?;
        }
        if let Some(path) = credentials {
          submission.credentials = read_json::<HashMap<String, String>>(&path, "credentials")?;
        }
        submission.options.max_parallelism = max_parallelism;
        submission.options.budget_ceiling = budget;
        run_workflow(config, submission).await
      })?;
    }
    Some(Commands::Validate { workflow_file }) => {
      validate_workflow(&workflow_file)?;
    }
    None => {
      println!("concord - use --help to see available commands");
    }
  }

  Ok(())
}

/// Logs go to stderr; stdout carries only the JSON result.
fn init_tracing() {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("concord=info,warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
  let path = match path {
    Some(path) => path.to_path_buf(),
    None => match dirs::home_dir().map(|home| home.join(".concord").join("config.json")) {
      Some(default) if default.exists() => default,
      _ => return Ok(EngineConfig::default()),
    },
  };
  info!(path = %path.display(), "config_loaded");
  read_json(&path, "config")
}

fn read_workflow(path: &Path) -> Result<WorkflowDef> {
  read_json(path, "workflow")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {} file: {}", what, path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse {} file: {}", what, path.display()))
}

async fn run_workflow(config: EngineConfig, submission: Submission) -> Result<()> {
  let context = Arc::new(ExecutionContext::from_config(&config));
  let engine = Engine::new(config, context);

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling run");
      on_interrupt.cancel();
    }
  });

  let result = engine
    .execute_with_cancel(submission, cancel)
    .await
    .context("workflow rejected")?;

  println!("{}", serde_json::to_string_pretty(&result)?);
  Ok(())
}

fn validate_workflow(path: &Path) -> Result<()> {
  let def = read_workflow(path)?;
  let workflow = Workflow::from_def(&def).context("invalid workflow graph")?;

  println!(
    "{}",
    serde_json::to_string_pretty(&serde_json::json!({
      "workflow_id": workflow.workflow_id,
      "nodes": workflow.nodes().len(),
      "edges": workflow.edges().len(),
      "order": workflow.topological_order(),
      "providers": workflow.providers(),
    }))?
  );
  Ok(())
}
