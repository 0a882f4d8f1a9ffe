//! Verified judgments about source/target pairs and their per-document
//! aggregate.
//!
//! A [`Mapping`] is created once per verification call and never edited;
//! a failed verification produces a separate fallback mapping via
//! [`Mapping::fallback`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::Anchor;

/// Abstain reason recorded on every fallback mapping.
pub const LLM_FAILURE: &str = "llm_failure";

/// Schema tag written on every mapping.
pub const SCHEMA_VERSION: &str = "aa-v1";

// ── Tags ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Compatible,
    Conditional,
    NoMatch,
    Abstain,
}

impl MatchType {
    pub const ALL: [MatchType; 5] = [
        Self::Exact,
        Self::Compatible,
        Self::Conditional,
        Self::NoMatch,
        Self::Abstain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Compatible => "compatible",
            Self::Conditional => "conditional",
            Self::NoMatch => "no_match",
            Self::Abstain => "abstain",
        }
    }

    /// Whether this classification counts towards matched totals.
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Exact | Self::Compatible | Self::Conditional)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    None,
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Verifier confidence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    #[serde(alias = "High", alias = "HIGH")]
    High,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Low", alias = "LOW")]
    Low,
}

impl ConfidenceLevel {
    /// Ordinal used for best-match ordering (High=3, Medium=2, Low=1).
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// How a source option relates to its target counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionRelationship {
    Exact,
    Compatible,
    Partial,
    Missing,
    Incompatible,
}

impl OptionRelationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Compatible => "compatible",
            Self::Partial => "partial",
            Self::Missing => "missing",
            Self::Incompatible => "incompatible",
        }
    }

    /// Relationships that contradict an `exact` classification.
    pub fn conflicts_with_exact(&self) -> bool {
        matches!(self, Self::Partial | Self::Missing | Self::Incompatible)
    }
}

/// Which side of the pair depends on another election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    #[default]
    None,
    SourceOnly,
    TargetOnly,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    #[default]
    Passed,
    Failed,
}

// ── Judgment sections ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAlignment {
    pub value: bool,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElectionDependency {
    #[serde(default)]
    pub status: DependencyStatus,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureAnalysis {
    pub question_alignment: QuestionAlignment,
    /// External definitions the pair depends on (e.g. "Compensation").
    #[serde(default)]
    pub requires_definition: Vec<String>,
    #[serde(default)]
    pub election_dependency: ElectionDependency,
}

/// Normalized option rendering used in option mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDescriptor {
    #[serde(default)]
    pub label: Option<String>,
    pub text: String,
    #[serde(default)]
    pub is_selected: Option<bool>,
    #[serde(default)]
    pub fill_ins: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionMapping {
    pub source: OptionDescriptor,
    #[serde(default)]
    pub target: Option<OptionDescriptor>,
    pub relationship: OptionRelationship,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueAlignment {
    #[serde(default)]
    pub source_selected: Vec<serde_json::Value>,
    #[serde(default)]
    pub target_selected: Vec<serde_json::Value>,
    #[serde(default)]
    pub compatible: bool,
    #[serde(default)]
    pub justification: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub match_type: MatchType,
    pub impact: ImpactLevel,
    pub confidence_level: ConfidenceLevel,
    pub confidence_rationale: String,
    /// Non-empty exactly when `match_type` is `abstain`.
    #[serde(default)]
    pub abstain_reasons: Vec<String>,
}

/// Outcome of the guardrail checks applied to the verifier's judgment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyChecks {
    /// `exact` carries no partial/missing/incompatible option.
    pub exact_options_consistent: CheckOutcome,
    /// An incompatible option forces a non-`none` impact.
    pub incompatible_has_impact: CheckOutcome,
    /// `abstain` carries at least one reason.
    pub abstain_has_reasons: CheckOutcome,
    #[serde(default)]
    pub violations: Vec<String>,
}

impl ConsistencyChecks {
    pub fn passed() -> Self {
        Self::default()
    }

    pub fn failed(violation: impl Into<String>) -> Self {
        Self {
            exact_options_consistent: CheckOutcome::Failed,
            incompatible_has_impact: CheckOutcome::Failed,
            abstain_has_reasons: CheckOutcome::Failed,
            violations: vec![violation.into()],
        }
    }
}

// ── Mapping ──

/// One verified (or fallback) judgment for one source/target pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub schema_version: String,
    pub run_id: String,
    /// Anchors come from the items themselves, never from the verifier.
    pub source_anchor: Anchor,
    pub target_anchor: Anchor,
    pub structure_analysis: StructureAnalysis,
    #[serde(default)]
    pub option_mappings: Vec<OptionMapping>,
    #[serde(default)]
    pub value_alignment: ValueAlignment,
    pub classification: Classification,
    pub consistency_checks: ConsistencyChecks,
    /// Cosine similarity of the two fingerprints, in [0, 1].
    pub embedding_similarity: f32,
}

impl Mapping {
    /// Safe abstain judgment used whenever verification cannot be trusted.
    pub fn fallback(
        run_id: &str,
        source_anchor: Anchor,
        target_anchor: Anchor,
        embedding_similarity: f32,
        rationale: impl Into<String>,
    ) -> Self {
        let rationale = rationale.into();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: run_id.to_string(),
            source_anchor,
            target_anchor,
            structure_analysis: StructureAnalysis {
                question_alignment: QuestionAlignment {
                    value: false,
                    reasons: vec![LLM_FAILURE.to_string()],
                },
                requires_definition: Vec::new(),
                election_dependency: ElectionDependency::default(),
            },
            option_mappings: Vec::new(),
            value_alignment: ValueAlignment::default(),
            classification: Classification {
                match_type: MatchType::Abstain,
                impact: ImpactLevel::Low,
                confidence_level: ConfidenceLevel::Low,
                confidence_rationale: rationale.clone(),
                abstain_reasons: vec![LLM_FAILURE.to_string()],
            },
            consistency_checks: ConsistencyChecks::failed(rationale),
            embedding_similarity,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_anchor.item_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_anchor.item_id
    }

    pub fn is_match(&self) -> bool {
        self.classification.match_type.is_match()
    }

    /// Produced by the fallback path rather than an accepted judgment.
    pub fn is_fallback(&self) -> bool {
        self.classification.match_type == MatchType::Abstain
            && self.classification.abstain_reasons.iter().any(|r| r == LLM_FAILURE)
    }

    /// Whether an analyst should look at this mapping.
    pub fn needs_review(&self) -> bool {
        self.classification.match_type == MatchType::Abstain
            || self.classification.confidence_level == ConfidenceLevel::Low
            || matches!(
                self.classification.impact,
                ImpactLevel::Medium | ImpactLevel::High
            )
    }
}

// ── Comparison ──

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactCounts {
    pub none: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTypeCounts {
    pub exact: usize,
    pub compatible: usize,
    pub conditional: usize,
    pub no_match: usize,
    pub abstain: usize,
}

/// Totals and distributions over the selected mappings of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonStatistics {
    pub total_source: usize,
    pub total_target: usize,
    pub matched: usize,
    pub unmatched_source: usize,
    pub unmatched_target: usize,
    pub confidence: ConfidenceCounts,
    pub impact: ImpactCounts,
    pub match_types: MatchTypeCounts,
    pub needs_review: usize,
}

/// Aggregate result for one document pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub run_id: String,
    pub source_document_id: String,
    pub target_document_id: String,
    /// At most one mapping per source item, in source order.
    pub mappings: Vec<Mapping>,
    pub statistics: ComparisonStatistics,
    /// Source items with a blank fingerprint; never ranked.
    #[serde(default)]
    pub excluded_source_ids: Vec<String>,
    #[serde(default)]
    pub excluded_target_ids: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl Comparison {
    /// Share of source items with a matching mapping.
    pub fn match_rate(&self) -> f64 {
        if self.statistics.total_source == 0 {
            return 0.0;
        }
        self.statistics.matched as f64 / self.statistics.total_source as f64
    }
}
