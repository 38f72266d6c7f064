//! Concord Provider
//!
//! The uniform contract every text-generation provider is called through.
//! Adapters normalize their provider's request, response and error shapes so
//! the engine only ever sees a [`GenerationResult`] or a [`ProviderError`].
//!
//! Credential values never leave this crate in any returned data: errors are
//! scrubbed and only the [`Fingerprint`] is used for keys and logs.

mod anthropic;
mod credential;
mod error;
mod http;
mod openai;
mod provider;
mod registry;
mod types;

pub use anthropic::AnthropicProvider;
pub use credential::{Credential, CredentialError, Fingerprint};
pub use error::{ProviderError, ProviderErrorKind};
pub use openai::OpenAiProvider;
pub use provider::Provider;
pub use registry::{ProviderKind, ProviderRegistry, ProviderSettings};
pub use types::{GenerationResult, Pricing, TokenUsage};
