//! Concord Config
//!
//! This crate contains the serializable workflow configuration types for Concord.
//! These types represent workflow definitions as produced by the graph editor,
//! before they are validated and locked by `concord-workflow`.
//!
//! Configuration can be loaded from:
//! - JSON files (via the CLI `run` and `validate` subcommands)
//! - Any external persistence layer (as JSON blobs)
//!
//! The engine takes these configuration types, validates the graph structure,
//! and resolves them into runtime structures for execution.

mod edge;
mod enums;
mod input;
mod node;
mod options;
mod workflow;

pub use edge::Edge;
pub use enums::{ChunkPolicy, ComparisonMode};
pub use input::{PromptTemplate, SourceInputs};
pub use node::{NodeDef, NodeType};
pub use options::ExecutionOptions;
pub use workflow::WorkflowDef;
