//! Stub capabilities and item builders shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use crosswalk_core::{
    CompletionStatus, Election, ElectionOption, ElectionPayload, Item, Provenance, Provision,
    ProvisionType, SingleSelectValue,
};
use serde_json::{Value, json};

use crate::embedder::{EmbedError, EmbeddingProvider};
use crate::verifier::{JudgeRequest, JudgmentProvider, VerificationTask, VerifyError};

// ── Items ──

pub fn provision(id: &str, text: &str) -> Item {
    Item::Provision(Provision {
        provision_id: id.into(),
        document_id: "bpd".into(),
        section_reference: format!("Section {id}"),
        section_title: None,
        provision_text: text.into(),
        provision_type: ProvisionType::Other,
        confidence_score: 0.9,
        page_number: Some(1),
        vendor: None,
    })
}

/// Single-select election; the first selected option becomes the value.
pub fn select_election(id: &str, question: &str, options: &[(&str, &str, bool)]) -> Item {
    let options: Vec<ElectionOption> = options
        .iter()
        .enumerate()
        .map(|(i, (label, text, selected))| ElectionOption {
            option_id: format!("{id}_opt{i}"),
            label: (*label).into(),
            option_text: (*text).into(),
            is_selected: *selected,
            fill_ins: vec![],
        })
        .collect();
    let value = SingleSelectValue {
        option_id: options.iter().find(|o| o.is_selected).map(|o| o.option_id.clone()),
    };
    Item::Election(Election {
        id: id.into(),
        question_number: "1.01".into(),
        question_text: question.into(),
        section_context: "Part A".into(),
        status: CompletionStatus::Answered,
        confidence: 1.0,
        provenance: Provenance {
            page: 1,
            question_number: "1.01".into(),
        },
        payload: ElectionPayload::SingleSelect { options, value },
    })
}

pub fn task(source: Item, target: Item, similarity: f32) -> VerificationTask {
    VerificationTask {
        source: Arc::new(source),
        target: Arc::new(target),
        embedding_similarity: similarity,
        candidate_rank: 1,
    }
}

/// A judgment that passes every guardrail for non-abstain match types.
pub fn judgment(match_type: &str, impact: &str, confidence: &str, rationale: &str) -> Value {
    json!({
        "structure_analysis": {
            "question_alignment": {"value": true, "reasons": ["same plan feature"]},
            "requires_definition": [],
            "election_dependency": {"status": "none", "evidence": []}
        },
        "option_mappings": [],
        "value_alignment": {"source_selected": [], "target_selected": [], "compatible": true, "justification": null},
        "classification": {
            "match_type": match_type,
            "impact": impact,
            "confidence_level": confidence,
            "confidence_rationale": rationale,
            "abstain_reasons": []
        }
    })
}

// ── Judges ──

type JudgeFn = dyn Fn(&JudgeRequest) -> Result<String, VerifyError> + Send + Sync;

pub struct FnJudge {
    f: Box<JudgeFn>,
    pub calls: AtomicUsize,
}

impl FnJudge {
    pub fn new(f: impl Fn(&JudgeRequest) -> Result<String, VerifyError> + Send + Sync + 'static) -> Self {
        Self {
            f: Box::new(f),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl JudgmentProvider for FnJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<String, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(request)
    }
}

/// Ids of the pair a request is about.
pub fn pair_ids(request: &JudgeRequest) -> (String, String) {
    let id = |side: &str| {
        request.payload[side]["item_id"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    };
    (id("source"), id("target"))
}

// ── Embedders ──

/// Embeds text as keyword presence over a fixed vocabulary, plus a small
/// constant component so no vector is all zeros.
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let mut v: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|w| if text.contains(w.as_str()) { 1.0 } else { 0.0 })
            .collect();
        v.push(0.1);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Other("embedding service unavailable".into()))
    }
}

/// Returns one vector too few.
pub struct ShortEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
    }
}
