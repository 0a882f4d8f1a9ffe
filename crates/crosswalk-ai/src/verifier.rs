//! Pairwise verification of a single candidate pair.
//!
//! [`PairwiseVerifier::verify`] always yields a [`Mapping`]: transport
//! errors, timeouts, unparseable replies and guardrail violations all turn
//! into a fallback abstain mapping for that pair alone.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crosswalk_core::{Item, Mapping, SectionHierarchy};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::guardrails::{JudgmentContext, ParseError, parse_judgment};
use crate::prompt::{self, PairContext};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("verifier returned no content")]
    EmptyResponse,

    #[error("verification timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Other(String),
}

/// One chat-style judgment request.
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Structured pair description the user prompt was rendered from.
    pub payload: Value,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl JudgeRequest {
    pub fn for_payload(payload: Value) -> Self {
        Self {
            system_prompt: prompt::SYSTEM_PROMPT.to_string(),
            user_prompt: prompt::build_user_prompt(&payload),
            payload,
            max_tokens: prompt::MAX_TOKENS,
            temperature: prompt::TEMPERATURE,
        }
    }
}

/// Produces a JSON judgment for a request.
#[async_trait]
pub trait JudgmentProvider: Send + Sync {
    async fn judge(&self, request: &JudgeRequest) -> Result<String, VerifyError>;
}

/// A candidate pair queued for verification.
#[derive(Debug, Clone)]
pub struct VerificationTask {
    pub source: Arc<Item>,
    pub target: Arc<Item>,
    pub embedding_similarity: f32,
    /// 1-based rank among the source's candidates.
    pub candidate_rank: usize,
}

impl VerificationTask {
    /// Fallback mapping for this pair with the given rationale.
    pub fn fallback(&self, run: &RunContext, rationale: impl Into<String>) -> Mapping {
        Mapping::fallback(
            &run.run_id,
            self.source.anchor(),
            self.target.anchor(),
            self.embedding_similarity.clamp(0.0, 1.0),
            rationale,
        )
    }
}

/// Read-only state shared by every verification of a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub hierarchy: SectionHierarchy,
}

pub struct PairwiseVerifier {
    provider: Arc<dyn JudgmentProvider>,
    timeout: Duration,
}

impl PairwiseVerifier {
    pub fn new(provider: Arc<dyn JudgmentProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Verify a pair, falling back to an abstain mapping on any failure.
    pub async fn verify(&self, task: &VerificationTask, run: &RunContext) -> Mapping {
        match self.try_verify(task, run).await {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!(
                    source = task.source.id(),
                    target = task.target.id(),
                    error = %e,
                    "verification failed, using fallback"
                );
                task.fallback(run, fallback_rationale(&e))
            }
        }
    }

    /// Verify a pair, surfacing the failure instead of falling back.
    pub async fn try_verify(
        &self,
        task: &VerificationTask,
        run: &RunContext,
    ) -> Result<Mapping, VerifyError> {
        let payload = prompt::build_payload(&PairContext {
            run_id: &run.run_id,
            source: &task.source,
            target: &task.target,
            hierarchy: &run.hierarchy,
            embedding_similarity: task.embedding_similarity,
            candidate_rank: task.candidate_rank,
        });
        let request = JudgeRequest::for_payload(payload);

        let reply = tokio::time::timeout(self.timeout, self.provider.judge(&request))
            .await
            .map_err(|_| VerifyError::Timeout(self.timeout))??;
        debug!(source = task.source.id(), target = task.target.id(), bytes = reply.len(), "judgment received");

        let (source_anchor, target_anchor) = (task.source.anchor(), task.target.anchor());
        let mapping = parse_judgment(
            &reply,
            &JudgmentContext {
                run_id: &run.run_id,
                source_anchor: &source_anchor,
                target_anchor: &target_anchor,
                embedding_similarity: task.embedding_similarity,
            },
        )?;
        Ok(mapping)
    }
}

/// Human-readable rationale recorded on a fallback mapping.
pub fn fallback_rationale(error: &VerifyError) -> String {
    match error {
        VerifyError::Parse(ParseError::Violation(v)) => format!("Validation failed: {v}"),
        other => format!("LLM verification failed: {other}"),
    }
}
