//! Semantic crosswalk engine: embedding-based candidate narrowing followed by
//! LLM pairwise verification, guardrails, best-match selection, and
//! aggregation.

pub mod aggregator;
pub mod config;
pub mod dispatcher;
pub mod embedder;
pub mod engine;
pub mod guardrails;
pub mod prompt;
pub mod ranker;
pub mod selector;
pub mod verifier;

#[cfg(feature = "http")]
pub mod client;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, EngineConfig};
pub use embedder::{EmbedError, EmbeddingProvider};
pub use engine::{CrosswalkEngine, EngineError};
pub use guardrails::Violation;
pub use verifier::{JudgeRequest, JudgmentProvider, PairwiseVerifier, VerifyError};

#[cfg(feature = "http")]
pub use client::{ClientConfig, OpenAiClient};
