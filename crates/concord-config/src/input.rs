//! Input value types for workflow submission.
//!
//! Source nodes take their text from the per-node inputs supplied with a
//! submission. Generate nodes build their prompt from a minijinja template
//! rendered against upstream node text.
//!
//! # Examples
//!
//! ```json
//! { "prompt_template": "Answer strictly yes or no.\n\n{{ input }}" }
//! ```
//!
//! ```json
//! { "prompt_template": "Compare {{ inputs.question }} with {{ inputs.context }}" }
//! ```
//!
//! The template context has two keys:
//! - `input`: the current chunk of the joined upstream text
//! - `inputs`: upstream node text keyed by node id

use std::collections::HashMap;

/// A prompt template string resolved by minijinja at runtime.
pub type PromptTemplate = String;

/// Per-node input text supplied with a submission, keyed by source node id.
pub type SourceInputs = HashMap<String, String>;
