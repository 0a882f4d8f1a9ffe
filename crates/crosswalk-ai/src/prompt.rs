//! Verification prompt and the structured pair payload sent with it.

use crosswalk_core::{Election, ElectionOption, ElectionPayload, Item, Provision, SectionHierarchy};
use serde_json::{Value, json};

pub const SYSTEM_PROMPT: &str = "\
You are an ERISA compliance specialist analyzing Adoption Agreement elections and Basic Plan \
Document provisions. You compare one SOURCE item with one TARGET item from a different plan \
document and judge whether they govern the same plan feature.

Respond ONLY with a JSON object. No markdown fences, no explanation, just raw JSON:
{
  \"structure_analysis\": {
    \"question_alignment\": {\"value\": true or false, \"reasons\": [\"why they do or do not ask the same question\"]},
    \"requires_definition\": [\"defined terms the pair depends on, e.g. Compensation\"],
    \"election_dependency\": {\"status\": \"none\" | \"source_only\" | \"target_only\" | \"both\", \"evidence\": [\"...\"]}
  },
  \"option_mappings\": [
    {
      \"source_option\": {\"label\": \"a\", \"text\": \"...\", \"is_selected\": true, \"fill_ins\": []},
      \"target_option\": {\"label\": \"b\", \"text\": \"...\", \"is_selected\": false, \"fill_ins\": []} or null,
      \"relationship\": \"exact\" | \"compatible\" | \"partial\" | \"missing\" | \"incompatible\",
      \"notes\": \"short explanation\" or null
    }
  ],
  \"value_alignment\": {
    \"source_selected\": [], \"target_selected\": [], \"compatible\": true or false, \"justification\": \"...\" or null
  },
  \"classification\": {
    \"match_type\": \"exact\" | \"compatible\" | \"conditional\" | \"no_match\" | \"abstain\",
    \"impact\": \"none\" | \"low\" | \"medium\" | \"high\",
    \"confidence_level\": \"high\" | \"medium\" | \"low\",
    \"confidence_rationale\": \"one or two sentences\",
    \"abstain_reasons\": [\"required when match_type is abstain\"]
  }
}

Rules:
- Question and page numbers are provenance only. Never use them as evidence of a match.
- An exact match cannot contain a partial, missing or incompatible option.
- Any incompatible option means impact is at least low.
- When question_alignment.value is false, give at least one reason.
- Abstain when the texts do not carry enough information, and say why in abstain_reasons.";

/// Generation limits for one verification call.
pub const MAX_TOKENS: u32 = 1000;
pub const TEMPERATURE: f32 = 0.0;

/// Everything the prompt says about one candidate pair.
pub struct PairContext<'a> {
    pub run_id: &'a str,
    pub source: &'a Item,
    pub target: &'a Item,
    pub hierarchy: &'a SectionHierarchy,
    pub embedding_similarity: f32,
    /// 1-based rank of the target among the source's candidates.
    pub candidate_rank: usize,
}

/// Build the JSON payload describing a candidate pair.
pub fn build_payload(pair: &PairContext<'_>) -> Value {
    json!({
        "run_id": pair.run_id,
        "source": item_payload(pair.source),
        "target": item_payload(pair.target),
        "context": {
            "section_hierarchy": pair.hierarchy,
            "stage1": {
                "candidate_rank": pair.candidate_rank,
                "embedding_similarity": pair.embedding_similarity,
                "notes": "top-k from embeddings",
            },
        },
    })
}

/// Render the user prompt for a payload.
pub fn build_user_prompt(payload: &Value) -> String {
    let body = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    format!(
        "Compare the SOURCE and TARGET items below and return the JSON judgment.\n\
         \n\
         {body}"
    )
}

pub fn item_payload(item: &Item) -> Value {
    match item {
        Item::Provision(p) => provision_payload(p),
        Item::Election(e) => election_payload(e),
    }
}

fn provision_payload(p: &Provision) -> Value {
    json!({
        "item_id": p.provision_id,
        "kind": "provision",
        "section_reference": p.section_reference,
        "section_title": p.section_title,
        "provision_type": p.provision_type.as_str(),
        "text": p.provision_text,
        "provenance": {"page": p.page_number},
    })
}

fn election_payload(e: &Election) -> Value {
    let value = match &e.payload {
        ElectionPayload::Text { value } => json!(value),
        ElectionPayload::SingleSelect { value, .. } => json!(value.option_id),
        ElectionPayload::MultiSelect { value, .. } => json!(value.option_ids),
    };
    json!({
        "item_id": e.id,
        "kind": e.payload.kind(),
        "question_number": e.question_number,
        "question_text": e.question_text,
        "section_context": e.section_context,
        "status": e.status,
        "provenance": {
            "page": e.provenance.page,
            "question_number": e.provenance.question_number,
        },
        "value": value,
        "options": e.payload.options().iter().map(option_payload).collect::<Vec<_>>(),
    })
}

fn option_payload(option: &ElectionOption) -> Value {
    json!({
        "option_id": option.option_id,
        "label": normalize_option_label(&option.label),
        "text": option.option_text,
        "is_selected": option.is_selected,
        "fill_ins": option.fill_ins.iter().map(|f| json!({
            "id": f.id,
            "question_text": f.question_text,
            "status": f.status,
            "value": f.value,
            "confidence": f.confidence,
        })).collect::<Vec<_>>(),
    })
}

/// Reduce a printed option label to its bare marker: "(a)", "a." and "a)"
/// all become "a".
pub fn normalize_option_label(label: &str) -> String {
    label
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(['.', ')'])
        .trim()
        .to_lowercase()
}
