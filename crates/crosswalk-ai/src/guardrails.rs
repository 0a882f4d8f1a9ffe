//! Parsing and consistency checks for verifier output.
//!
//! The verifier's reply is first read into loosely typed `Raw*` structs,
//! then its tags are mapped onto the closed enums through explicit
//! allow-lists, and only then are the consistency rules applied. A
//! [`Mapping`] is built only from a judgment that passed every rule.
//!
//! Rules, checked in order (first failure wins):
//!
//! 1. `confidence_rationale` is non-empty
//! 2. `abstain` carries at least one abstain reason
//! 3. question misalignment carries at least one reason
//! 4. `exact` has no partial, missing or incompatible option
//! 5. an incompatible option forces an impact other than `none`

use crosswalk_core::{
    Anchor, Classification, ConfidenceLevel, ConsistencyChecks, DependencyStatus,
    ElectionDependency, ImpactLevel, Mapping, MatchType, OptionDescriptor, OptionMapping,
    OptionRelationship, QuestionAlignment, SCHEMA_VERSION, StructureAnalysis, ValueAlignment,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Abstain reason added when the verifier used a match type outside the
/// allowed set.
pub const UNRECOGNIZED_MATCH_TYPE: &str = "unrecognized_match_type";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("confidence_rationale is empty")]
    EmptyRationale,
    #[error("abstain_reasons is empty when match_type=abstain")]
    AbstainWithoutReasons,
    #[error("question_alignment.reasons is empty when alignment is false")]
    MisalignedWithoutReasons,
    #[error("exact match has {} relationship", .0.as_str())]
    ExactWithConflictingOption(OptionRelationship),
    #[error("incompatible relationship present but impact=none")]
    IncompatibleWithoutImpact,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("response does not match the mapping shape: {0}")]
    Shape(#[source] serde_json::Error),
    #[error(transparent)]
    Violation(#[from] Violation),
}

// ── Raw verifier output ──

#[derive(Debug, Deserialize)]
struct RawJudgment {
    structure_analysis: RawStructure,
    #[serde(default)]
    option_mappings: Vec<RawOptionMapping>,
    #[serde(default)]
    value_alignment: Option<ValueAlignment>,
    classification: RawClassification,
}

#[derive(Debug, Deserialize)]
struct RawStructure {
    question_alignment: RawAlignment,
    #[serde(default)]
    requires_definition: Vec<String>,
    #[serde(default)]
    election_dependency: Option<RawDependency>,
}

#[derive(Debug, Deserialize)]
struct RawAlignment {
    value: bool,
    #[serde(default)]
    reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawOptionMapping {
    #[serde(alias = "source_option")]
    source: RawOption,
    #[serde(default, alias = "target_option")]
    target: Option<RawOption>,
    relationship: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    is_selected: Option<bool>,
    #[serde(default)]
    fill_ins: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    match_type: String,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    confidence_level: Option<String>,
    #[serde(default)]
    confidence_rationale: Option<String>,
    #[serde(default)]
    abstain_reasons: Vec<String>,
}

// ── Allow-lists ──

fn normalize_tag(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

pub fn parse_match_type(raw: &str) -> Option<MatchType> {
    match normalize_tag(raw).as_str() {
        "exact" => Some(MatchType::Exact),
        "compatible" => Some(MatchType::Compatible),
        "conditional" => Some(MatchType::Conditional),
        "no_match" | "nomatch" => Some(MatchType::NoMatch),
        "abstain" => Some(MatchType::Abstain),
        _ => None,
    }
}

/// Unknown or missing impact reads as `medium` so the pair gets reviewed.
pub fn parse_impact(raw: Option<&str>) -> ImpactLevel {
    match raw.map(normalize_tag).as_deref() {
        Some("none") => ImpactLevel::None,
        Some("low") => ImpactLevel::Low,
        Some("high") => ImpactLevel::High,
        _ => ImpactLevel::Medium,
    }
}

pub fn parse_confidence(raw: Option<&str>) -> ConfidenceLevel {
    match raw.map(normalize_tag).as_deref() {
        Some("high") => ConfidenceLevel::High,
        Some("medium") => ConfidenceLevel::Medium,
        _ => ConfidenceLevel::Low,
    }
}

/// Unknown relationships read as `incompatible`, the most conservative tag.
pub fn parse_relationship(raw: &str) -> OptionRelationship {
    match normalize_tag(raw).as_str() {
        "exact" => OptionRelationship::Exact,
        "compatible" => OptionRelationship::Compatible,
        "partial" => OptionRelationship::Partial,
        "missing" => OptionRelationship::Missing,
        _ => OptionRelationship::Incompatible,
    }
}

pub fn parse_dependency(raw: Option<&str>) -> DependencyStatus {
    match raw.map(normalize_tag).as_deref() {
        Some("source_only") => DependencyStatus::SourceOnly,
        Some("target_only") => DependencyStatus::TargetOnly,
        Some("both") => DependencyStatus::Both,
        _ => DependencyStatus::None,
    }
}

/// Remove a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    // Any other bare info string on the opening fence line.
    let rest = match rest.split_once('\n') {
        Some((info, body)) if info.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body,
        _ => rest,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

// ── Checks ──

/// Tags after allow-list mapping; what the rules look at.
struct Normalized {
    match_type: MatchType,
    impact: ImpactLevel,
    confidence: ConfidenceLevel,
    relationships: Vec<OptionRelationship>,
    abstain_reasons: Vec<String>,
}

impl Normalized {
    fn from_raw(raw: &RawJudgment) -> Self {
        let class = &raw.classification;
        let mut abstain_reasons = class.abstain_reasons.clone();
        let match_type = match parse_match_type(&class.match_type) {
            Some(t) => t,
            None => {
                abstain_reasons.push(UNRECOGNIZED_MATCH_TYPE.to_string());
                MatchType::Abstain
            }
        };
        Self {
            match_type,
            impact: parse_impact(class.impact.as_deref()),
            confidence: parse_confidence(class.confidence_level.as_deref()),
            relationships: raw
                .option_mappings
                .iter()
                .map(|m| parse_relationship(&m.relationship))
                .collect(),
            abstain_reasons,
        }
    }
}

fn check(raw: &RawJudgment, tags: &Normalized) -> Result<(), Violation> {
    let rationale = raw.classification.confidence_rationale.as_deref().unwrap_or("");
    if rationale.trim().is_empty() {
        return Err(Violation::EmptyRationale);
    }
    if tags.match_type == MatchType::Abstain && tags.abstain_reasons.is_empty() {
        return Err(Violation::AbstainWithoutReasons);
    }
    let alignment = &raw.structure_analysis.question_alignment;
    if !alignment.value && alignment.reasons.is_empty() {
        return Err(Violation::MisalignedWithoutReasons);
    }
    if tags.match_type == MatchType::Exact
        && let Some(rel) = tags.relationships.iter().find(|r| r.conflicts_with_exact())
    {
        return Err(Violation::ExactWithConflictingOption(*rel));
    }
    if tags.impact == ImpactLevel::None
        && tags.relationships.contains(&OptionRelationship::Incompatible)
    {
        return Err(Violation::IncompatibleWithoutImpact);
    }
    Ok(())
}

// ── Entry point ──

/// Identity of the pair a judgment is about. Anchors always come from the
/// items, never from the verifier's reply.
pub struct JudgmentContext<'a> {
    pub run_id: &'a str,
    pub source_anchor: &'a Anchor,
    pub target_anchor: &'a Anchor,
    pub embedding_similarity: f32,
}

/// Parse a verifier reply, enforce the rules, and build the mapping.
pub fn parse_judgment(text: &str, ctx: &JudgmentContext<'_>) -> Result<Mapping, ParseError> {
    let value: Value = serde_json::from_str(strip_code_fences(text)).map_err(ParseError::Json)?;
    let raw: RawJudgment = serde_json::from_value(value).map_err(ParseError::Shape)?;
    let tags = Normalized::from_raw(&raw);
    check(&raw, &tags)?;
    Ok(build_mapping(raw, tags, ctx))
}

fn build_mapping(raw: RawJudgment, tags: Normalized, ctx: &JudgmentContext<'_>) -> Mapping {
    let dependency = raw.structure_analysis.election_dependency;
    let option_mappings = raw
        .option_mappings
        .into_iter()
        .zip(&tags.relationships)
        .map(|(m, rel)| OptionMapping {
            source: descriptor(m.source),
            target: m.target.map(descriptor),
            relationship: *rel,
            notes: m.notes,
        })
        .collect();

    Mapping {
        schema_version: SCHEMA_VERSION.to_string(),
        run_id: ctx.run_id.to_string(),
        source_anchor: ctx.source_anchor.clone(),
        target_anchor: ctx.target_anchor.clone(),
        structure_analysis: StructureAnalysis {
            question_alignment: QuestionAlignment {
                value: raw.structure_analysis.question_alignment.value,
                reasons: raw.structure_analysis.question_alignment.reasons,
            },
            requires_definition: raw.structure_analysis.requires_definition,
            election_dependency: ElectionDependency {
                status: parse_dependency(dependency.as_ref().and_then(|d| d.status.as_deref())),
                evidence: dependency.map(|d| d.evidence).unwrap_or_default(),
            },
        },
        option_mappings,
        value_alignment: raw.value_alignment.unwrap_or_default(),
        classification: Classification {
            match_type: tags.match_type,
            impact: tags.impact,
            confidence_level: tags.confidence,
            confidence_rationale: raw
                .classification
                .confidence_rationale
                .unwrap_or_default()
                .trim()
                .to_string(),
            abstain_reasons: if tags.match_type == MatchType::Abstain {
                tags.abstain_reasons
            } else {
                Vec::new()
            },
        },
        consistency_checks: ConsistencyChecks::passed(),
        embedding_similarity: ctx.embedding_similarity.clamp(0.0, 1.0),
    }
}

fn descriptor(raw: RawOption) -> OptionDescriptor {
    OptionDescriptor {
        label: raw.label,
        text: raw.text.unwrap_or_default(),
        is_selected: raw.is_selected,
        fill_ins: raw.fill_ins,
    }
}
