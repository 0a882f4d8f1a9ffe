//! Statistics over the selected mappings of one run.

use std::collections::HashSet;

use crosswalk_core::{ComparisonStatistics, ConfidenceLevel, ImpactLevel, Mapping, MatchType};

/// Compute run statistics from the best-match mappings.
///
/// `matched` counts selected mappings whose match type is a match.
/// `unmatched_target` counts target items no matching mapping points at.
pub fn aggregate(selected: &[Mapping], total_source: usize, total_target: usize) -> ComparisonStatistics {
    let mut stats = ComparisonStatistics {
        total_source,
        total_target,
        ..Default::default()
    };

    let mut matched_targets: HashSet<&str> = HashSet::new();
    for m in selected {
        let class = &m.classification;
        if m.is_match() {
            stats.matched += 1;
            matched_targets.insert(m.target_id());
        }

        match class.confidence_level {
            ConfidenceLevel::High => stats.confidence.high += 1,
            ConfidenceLevel::Medium => stats.confidence.medium += 1,
            ConfidenceLevel::Low => stats.confidence.low += 1,
        }
        match class.impact {
            ImpactLevel::None => stats.impact.none += 1,
            ImpactLevel::Low => stats.impact.low += 1,
            ImpactLevel::Medium => stats.impact.medium += 1,
            ImpactLevel::High => stats.impact.high += 1,
        }
        match class.match_type {
            MatchType::Exact => stats.match_types.exact += 1,
            MatchType::Compatible => stats.match_types.compatible += 1,
            MatchType::Conditional => stats.match_types.conditional += 1,
            MatchType::NoMatch => stats.match_types.no_match += 1,
            MatchType::Abstain => stats.match_types.abstain += 1,
        }
        if m.needs_review() {
            stats.needs_review += 1;
        }
    }

    stats.unmatched_source = total_source.saturating_sub(stats.matched);
    stats.unmatched_target = total_target.saturating_sub(matched_targets.len());
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosswalk_core::Anchor;

    fn mapping(source: &str, target: &str, match_type: MatchType, confidence: ConfidenceLevel, impact: ImpactLevel) -> Mapping {
        let anchor = |id: &str| Anchor {
            item_id: id.into(),
            section_context: None,
            page: None,
        };
        let mut m = Mapping::fallback("run-1", anchor(source), anchor(target), 0.5, "x");
        m.classification.match_type = match_type;
        m.classification.confidence_level = confidence;
        m.classification.impact = impact;
        m.classification.abstain_reasons.clear();
        m
    }

    #[test]
    fn counts_distributions() {
        let selected = vec![
            mapping("s1", "t1", MatchType::Exact, ConfidenceLevel::High, ImpactLevel::None),
            mapping("s2", "t2", MatchType::Compatible, ConfidenceLevel::Medium, ImpactLevel::Low),
            mapping("s3", "t2", MatchType::Conditional, ConfidenceLevel::Medium, ImpactLevel::Medium),
            mapping("s4", "t3", MatchType::NoMatch, ConfidenceLevel::Low, ImpactLevel::High),
        ];
        let stats = aggregate(&selected, 6, 5);

        assert_eq!(stats.matched, 3);
        assert_eq!(stats.unmatched_source, 3);
        // t1 and t2 are matched; t3 only has a no_match.
        assert_eq!(stats.unmatched_target, 3);
        assert_eq!(stats.confidence.high, 1);
        assert_eq!(stats.confidence.medium, 2);
        assert_eq!(stats.confidence.low, 1);
        assert_eq!(stats.impact.none + stats.impact.low + stats.impact.medium + stats.impact.high, 4);
        assert_eq!(stats.match_types.exact, 1);
        assert_eq!(stats.match_types.no_match, 1);
        assert_eq!(stats.needs_review, 2);
    }

    #[test]
    fn match_counts_sum_to_selected() {
        let selected = vec![
            mapping("s1", "t1", MatchType::Abstain, ConfidenceLevel::Low, ImpactLevel::Low),
            mapping("s2", "t2", MatchType::Exact, ConfidenceLevel::High, ImpactLevel::None),
        ];
        let stats = aggregate(&selected, 2, 2);
        let mt = &stats.match_types;
        assert_eq!(mt.exact + mt.compatible + mt.conditional + mt.no_match + mt.abstain, 2);
        assert!(stats.matched <= stats.total_source);
    }

    #[test]
    fn empty_run() {
        let stats = aggregate(&[], 0, 4);
        assert_eq!(stats.matched, 0);
        assert_eq!(stats.unmatched_source, 0);
        assert_eq!(stats.unmatched_target, 4);
    }
}
