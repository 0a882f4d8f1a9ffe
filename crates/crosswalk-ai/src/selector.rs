//! Best-match selection: at most one mapping per source item.
//!
//! Candidates are ordered by confidence tier, then embedding similarity,
//! then target id (lowest first) so identical inputs always select the
//! same mapping regardless of completion order.

use std::cmp::Ordering;
use std::collections::HashMap;

use crosswalk_core::Mapping;

/// Ordering with the preferred mapping first.
pub fn preference(a: &Mapping, b: &Mapping) -> Ordering {
    let conf = |m: &Mapping| m.classification.confidence_level.ordinal();
    conf(b)
        .cmp(&conf(a))
        .then_with(|| b.embedding_similarity.total_cmp(&a.embedding_similarity))
        .then_with(|| a.target_id().cmp(b.target_id()))
}

/// Pick the preferred mapping among the candidates of one source.
pub fn select_best<'a>(candidates: impl IntoIterator<Item = &'a Mapping>) -> Option<&'a Mapping> {
    candidates.into_iter().min_by(|a, b| preference(a, b))
}

/// Reduce all mappings of a run to one per source item, in `source_order`.
///
/// Sources without any mapping are simply absent from the result.
pub fn select_best_matches(mappings: Vec<Mapping>, source_order: &[String]) -> Vec<Mapping> {
    let mut groups: HashMap<String, Vec<Mapping>> = HashMap::new();
    for m in mappings {
        groups.entry(m.source_id().to_string()).or_default().push(m);
    }

    source_order
        .iter()
        .filter_map(|id| groups.remove(id))
        .filter_map(|group| group.into_iter().min_by(preference))
        .collect()
}
