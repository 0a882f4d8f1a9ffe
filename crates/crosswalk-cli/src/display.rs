//! Vertical summary card for a comparison run.
//!
//! Renders run totals and distributions grouped into sections, followed by
//! the mappings flagged for analyst review.

use std::fmt::Write;

use crosswalk_core::{Comparison, Mapping};

const MAX_LIST_ITEMS: usize = 10;
const MAX_RATIONALE: usize = 80;

// ── Public API ──

pub fn print_comparison_card(comparison: &Comparison) {
    print!("{}", render_comparison_card(comparison));
}

/// Render a comparison as a card grouped by section.
pub fn render_comparison_card(comparison: &Comparison) -> String {
    let stats = &comparison.statistics;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "=== {} → {} ===",
        comparison.source_document_id, comparison.target_document_id
    );
    let _ = writeln!(out, "run {} ({})", comparison.run_id, comparison.completed_at.to_rfc3339());
    let _ = writeln!(out);

    section(
        &mut out,
        "Coverage",
        &[
            ("source items", stats.total_source.to_string()),
            ("target items", stats.total_target.to_string()),
            ("matched", stats.matched.to_string()),
            ("match rate", format!("{:.1}%", comparison.match_rate() * 100.0)),
            ("unmatched source", stats.unmatched_source.to_string()),
            ("unmatched target", stats.unmatched_target.to_string()),
            ("excluded source", comparison.excluded_source_ids.len().to_string()),
            ("excluded target", comparison.excluded_target_ids.len().to_string()),
        ],
    );

    let mt = &stats.match_types;
    section(
        &mut out,
        "Match Types",
        &[
            ("exact", mt.exact.to_string()),
            ("compatible", mt.compatible.to_string()),
            ("conditional", mt.conditional.to_string()),
            ("no_match", mt.no_match.to_string()),
            ("abstain", mt.abstain.to_string()),
        ],
    );

    section(
        &mut out,
        "Confidence",
        &[
            ("high", stats.confidence.high.to_string()),
            ("medium", stats.confidence.medium.to_string()),
            ("low", stats.confidence.low.to_string()),
        ],
    );

    section(
        &mut out,
        "Impact",
        &[
            ("none", stats.impact.none.to_string()),
            ("low", stats.impact.low.to_string()),
            ("medium", stats.impact.medium.to_string()),
            ("high", stats.impact.high.to_string()),
        ],
    );

    review_list(&mut out, comparison);
    out
}

// ── Section rendering ──

fn section(out: &mut String, header: &str, rows: &[(&str, String)]) {
    let _ = writeln!(out, "{header}");
    for (name, value) in rows {
        let _ = writeln!(out, "  {name:<26} {value}");
    }
    let _ = writeln!(out);
}

fn review_list(out: &mut String, comparison: &Comparison) {
    let flagged: Vec<&Mapping> = comparison.mappings.iter().filter(|m| m.needs_review()).collect();
    let _ = writeln!(out, "Needs Review ({})", flagged.len());

    for m in flagged.iter().take(MAX_LIST_ITEMS) {
        let class = &m.classification;
        let _ = writeln!(
            out,
            "  {:<20} → {:<20} {:<12} {:<6} sim {:.2}",
            m.source_id(),
            m.target_id(),
            class.match_type.as_str(),
            class.confidence_level.as_str(),
            m.embedding_similarity,
        );
        let rationale = truncate(&class.confidence_rationale, MAX_RATIONALE);
        if !rationale.is_empty() {
            let _ = writeln!(out, "      {rationale}");
        }
    }
    if flagged.len() > MAX_LIST_ITEMS {
        let _ = writeln!(out, "  ... and {} more", flagged.len() - MAX_LIST_ITEMS);
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}
