//! Canonical fingerprint text for embedding.
//!
//! A fingerprint keeps only the semantic content of an item. Question
//! numbers, section numbers, page numbers, option ids/labels and fill-in
//! values are provenance, and leaving them in makes unrelated items that
//! share a position number (e.g. "1.04 Age" vs "1.04 State") embed as
//! near-duplicates.
//!
//! # Election layout
//!
//! 1. Section context with any leading numeric prefix removed ("1. Eligibility" → "Eligibility")
//! 2. Question text with any leading "Question N.NN:" label removed
//! 3. For select kinds, each option's display text in document order
//!
//! Parts are joined with single spaces; empty parts are skipped.

use serde::{Deserialize, Serialize};

use crate::item::{Election, Item, Provision};

/// How provision fingerprints are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintStyle {
    /// Provision text verbatim.
    #[default]
    Plain,
    /// Provision text followed by a `[type: ...; vendor: ...]` tag.
    Tagged,
}

/// Build the fingerprint of an item.
pub fn fingerprint(item: &Item, style: FingerprintStyle) -> String {
    match item {
        Item::Provision(p) => provision_fingerprint(p, style),
        Item::Election(e) => election_fingerprint(e),
    }
}

/// True when the fingerprint carries nothing to embed.
pub fn is_blank(fingerprint: &str) -> bool {
    fingerprint.trim().is_empty()
}

fn provision_fingerprint(provision: &Provision, style: FingerprintStyle) -> String {
    let text = provision.provision_text.trim();
    match style {
        FingerprintStyle::Plain => text.to_string(),
        FingerprintStyle::Tagged if text.is_empty() => String::new(),
        FingerprintStyle::Tagged => {
            let vendor = provision.vendor.as_deref().unwrap_or("unknown");
            format!(
                "{text} [type: {}; vendor: {vendor}]",
                provision.provision_type.as_str()
            )
        }
    }
}

fn election_fingerprint(election: &Election) -> String {
    let mut parts: Vec<&str> = Vec::new();

    let context = strip_numeric_prefix(&election.section_context);
    if !context.is_empty() {
        parts.push(context);
    }

    let question = strip_question_label(&election.question_text);
    if !question.is_empty() {
        parts.push(question);
    }

    for option in election.payload.options() {
        let text = option.option_text.trim();
        if !text.is_empty() {
            parts.push(text);
        }
    }

    parts.join(" ")
}

/// Strip a leading run of digits and dots ("1.", "2.04", "3)") from a heading.
///
/// Only strips when the run is followed by whitespace, punctuation or the end
/// of the string, so headings like "401(k) Deferrals" keep their number.
pub fn strip_numeric_prefix(s: &str) -> &str {
    let s = s.trim();
    let bytes = s.as_bytes();

    let end = bytes
        .iter()
        .position(|b| !(b.is_ascii_digit() || *b == b'.'))
        .unwrap_or(bytes.len());
    if end == 0 || !bytes[0].is_ascii_digit() {
        return s;
    }

    let rest = &s[end..];
    let (rest, closed) = match rest.strip_prefix(')') {
        Some(stripped) => (stripped, true),
        None => (rest, false),
    };
    let ends_number = closed
        || rest.is_empty()
        || rest.starts_with(char::is_whitespace)
        || (end > 1 && bytes[end - 1] == b'.');
    if !ends_number {
        return s;
    }
    rest.trim_start_matches([' ', '\t', '-', ':']).trim()
}

/// Strip a leading "Question N.NN:" label from question text.
///
/// "Question 1.04: Age ___" → "Age ___". Text without the label is returned
/// trimmed but otherwise unchanged.
pub fn strip_question_label(s: &str) -> &str {
    let s = s.trim();
    let Some((label, rest)) = s.split_once(':') else {
        return s;
    };

    const LABEL: &str = "question";
    let label = label.trim();
    let is_question_label = match (label.get(..LABEL.len()), label.get(LABEL.len()..)) {
        (Some(word), Some(number)) => {
            word.eq_ignore_ascii_case(LABEL)
                && number
                    .trim()
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'(' | b')'))
        }
        _ => false,
    };

    if is_question_label { rest.trim() } else { s }
}
