//! Concord Engine
//!
//! This crate executes Concord workflows: it schedules a validated graph,
//! runs each generate node's chunks through the resilience layers, and
//! compares the outputs it collects.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │  - execute(submission, cancel) → ExecutionResult            │
//! │  - validates graph, providers and credentials up front      │
//! │  - bounds concurrent runs, emits events, hands to RunStore  │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Scheduler                           │
//! │  - topological walk, max_parallelism node tasks             │
//! │  - skips nodes whose required upstream failed               │
//! │  - cancellation: running → failed, pending → skipped        │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Node dispatch                         │
//! │  - source / generate / compare / sink                       │
//! │  - generate: segment → template → budget → credential →     │
//! │    rate governor → circuit breaker → adaptive timeout       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use concord_engine::{Engine, EngineConfig, ExecutionContext, Submission};
//!
//! let config = EngineConfig::default();
//! let context = Arc::new(ExecutionContext::from_config(&config));
//! let engine = Engine::new(config, context);
//!
//! let submission = Submission::new(workflow)
//!   .with_input("question", "Should we ship on Friday?")
//!   .with_credential("openai", api_key);
//! let result = engine.execute(submission).await?;
//! ```

mod budget;
mod config;
mod context;
mod credentials;
mod engine;
mod error;
mod events;
mod generate;
mod node;
mod result;
mod run;
mod store;
mod submission;
mod template;

pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use credentials::{CredentialStore, EnvCredentialStore, MemoryCredentialStore};
pub use engine::Engine;
pub use error::ExecutionError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use result::{
  ComparisonOutput, ExecutionResult, FailureReason, GenerationOutput, NodeExecutionState,
  NodeOutput, NodeStatus, RunStatus,
};
pub use store::{InMemoryRunStore, RunStore, StoreError};
pub use submission::Submission;
