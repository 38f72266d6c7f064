//! Concord Workflow
//!
//! This crate provides the validated workflow representation for Concord.
//! A workflow is built once from a `concord-config` definition and stays
//! immutable for every run that uses it.
//!
//! Key differences from `concord-config`:
//! - Graph structure is validated (acyclic, valid edges, no orphan consumers)
//! - Per-kind defaults are applied (prompt template, best-effort flag)
//! - Neighbour lists are sorted and a deterministic topological order is precomputed

mod error;
mod graph;
mod node;
mod workflow;

pub use error::WorkflowError;
pub use graph::Graph;
pub use node::{DEFAULT_PROMPT_TEMPLATE, GenerateSpec, Node, NodeKind};
pub use workflow::Workflow;
