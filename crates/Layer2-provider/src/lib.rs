//! # taskhook-provider
//!
//! Downstream collaborators the worker calls while running a task.
//!
//! ## Features
//! - Ollama-style text generation (non-streaming)
//! - Interest-over-time trends lookups
//! - Reasoning output parsing (`<think>` blocks)
//!
//! Every failure surfaces as [`ProviderError`], which converts into a
//! retryable `taskhook_foundation::Error::UpstreamFailure`.

pub mod error;
pub mod prompt;
pub mod providers;
pub mod r#trait;

// Core traits and types
pub use r#trait::{GenerationOptions, HealthReport, HealthStatus, TextGenerator, TrendsSource};

// Error
pub use error::ProviderError;

// Prompting
pub use prompt::{build_think_prompt, split_think_content};

// Provider implementations
pub use providers::ollama::OllamaClient;
pub use providers::trends::{QueryValue, TrendPoint, TrendsClient, TrendsProperty, TrendsQuery};
