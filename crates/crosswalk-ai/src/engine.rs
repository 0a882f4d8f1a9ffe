//! End-to-end comparison of two documents.
//!
//! validate → hierarchy → rank → verify (bounded fan-out) → select → aggregate.
//! Embedding failures abort the run; verification failures never do.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use crosswalk_core::{Comparison, DocumentItems, Item, ItemError, SectionHierarchy};
use thiserror::Error;
use tracing::info;

use crate::aggregator::aggregate;
use crate::config::{ConfigError, EngineConfig};
use crate::dispatcher::Dispatcher;
use crate::embedder::{EmbedError, EmbeddingProvider};
use crate::ranker::{CandidateRanker, Ranking};
use crate::selector::select_best_matches;
use crate::verifier::{JudgmentProvider, PairwiseVerifier, RunContext, VerificationTask};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("document {document}: {source}")]
    InvalidItem { document: String, source: ItemError },

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),
}

pub struct CrosswalkEngine {
    config: EngineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    verifier: Arc<PairwiseVerifier>,
}

impl CrosswalkEngine {
    pub fn new(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        judge: Arc<dyn JudgmentProvider>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let verifier = Arc::new(PairwiseVerifier::new(judge, config.verify_timeout));
        Ok(Self {
            config,
            embedder,
            verifier,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compare two documents under a freshly generated run id.
    pub async fn compare(
        &self,
        source: &DocumentItems,
        target: &DocumentItems,
    ) -> Result<Comparison, EngineError> {
        self.compare_with_run_id(&new_run_id(), source, target).await
    }

    pub async fn compare_with_run_id(
        &self,
        run_id: &str,
        source: &DocumentItems,
        target: &DocumentItems,
    ) -> Result<Comparison, EngineError> {
        let source_items = checked_items(source)?;
        let target_items = checked_items(target)?;
        info!(
            run_id,
            source = %source.document_id,
            target = %target.document_id,
            source_items = source_items.len(),
            target_items = target_items.len(),
            "starting comparison"
        );

        let hierarchy = SectionHierarchy::build(
            source_items.iter().chain(&target_items).map(|item| item.as_ref()),
        );

        let ranker = CandidateRanker::new(self.config.top_k, self.config.fingerprint_style);
        let ranking = ranker
            .rank(self.embedder.as_ref(), &source_items, &target_items)
            .await?;

        let tasks = verification_tasks(&ranking, &source_items, &target_items);
        let run = Arc::new(RunContext {
            run_id: run_id.to_string(),
            hierarchy,
        });
        let mappings = Dispatcher::new(self.config.max_workers)
            .run(Arc::clone(&self.verifier), run, tasks)
            .await;

        let source_order: Vec<String> = source_items.iter().map(|i| i.id().to_string()).collect();
        let selected = select_best_matches(mappings, &source_order);
        let statistics = aggregate(&selected, source_items.len(), target_items.len());

        info!(
            run_id,
            matched = statistics.matched,
            selected = selected.len(),
            needs_review = statistics.needs_review,
            "comparison complete"
        );

        Ok(Comparison {
            run_id: run_id.to_string(),
            source_document_id: source.document_id.clone(),
            target_document_id: target.document_id.clone(),
            mappings: selected,
            statistics,
            excluded_source_ids: ranking.excluded_source_ids,
            excluded_target_ids: ranking.excluded_target_ids,
            completed_at: Utc::now(),
        })
    }
}

/// Validated items of one document. Ids must be unique within the document,
/// since selection groups mappings by source id.
fn checked_items(doc: &DocumentItems) -> Result<Vec<Arc<Item>>, EngineError> {
    let invalid = |source: ItemError| EngineError::InvalidItem {
        document: doc.document_id.clone(),
        source,
    };
    let mut seen = HashSet::new();
    doc.items()
        .into_iter()
        .map(|item| {
            item.validate().map_err(invalid)?;
            if !seen.insert(item.id().to_string()) {
                return Err(invalid(ItemError::DuplicateId(item.id().to_string())));
            }
            Ok(Arc::new(item))
        })
        .collect()
}

fn verification_tasks(
    ranking: &Ranking,
    sources: &[Arc<Item>],
    targets: &[Arc<Item>],
) -> Vec<VerificationTask> {
    ranking
        .ranked
        .iter()
        .flat_map(|ranked| {
            ranked.candidates.iter().map(move |c| VerificationTask {
                source: Arc::clone(&sources[ranked.source_index]),
                target: Arc::clone(&targets[c.target_index]),
                embedding_similarity: c.similarity,
                candidate_rank: c.rank,
            })
        })
        .collect()
}

pub fn new_run_id() -> String {
    format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, FnJudge, KeywordEmbedder, judgment, pair_ids};
    use crosswalk_core::{ConfidenceLevel, MatchType, Provision, ProvisionType};
    use std::sync::atomic::Ordering;

    fn doc(id: &str, texts: &[(&str, &str)]) -> DocumentItems {
        DocumentItems {
            document_id: id.into(),
            provisions: texts
                .iter()
                .map(|(pid, text)| Provision {
                    provision_id: (*pid).into(),
                    document_id: id.into(),
                    section_reference: format!("Section {pid}"),
                    section_title: None,
                    provision_text: (*text).into(),
                    provision_type: ProvisionType::Other,
                    confidence_score: 0.9,
                    page_number: Some(1),
                    vendor: None,
                })
                .collect(),
            elections: vec![],
        }
    }

    fn vocabulary() -> KeywordEmbedder {
        KeywordEmbedder::new(&["age", "vesting", "loan", "hardship"])
    }

    /// Judges a pair `exact` when both texts share the leading keyword.
    fn keyword_judge() -> FnJudge {
        FnJudge::new(|req| {
            let text = |side: &str| req.payload[side]["text"].as_str().unwrap_or_default().to_lowercase();
            let (s, t) = (text("source"), text("target"));
            let same = s.split_whitespace().next() == t.split_whitespace().next();
            let value = if same {
                judgment("exact", "none", "high", "Same provision.")
            } else {
                judgment("no_match", "low", "medium", "Different provision.")
            };
            Ok(value.to_string())
        })
    }

    fn engine(embedder: Arc<dyn EmbeddingProvider>, judge: Arc<dyn JudgmentProvider>) -> CrosswalkEngine {
        CrosswalkEngine::new(EngineConfig::default(), embedder, judge).unwrap()
    }

    #[tokio::test]
    async fn compares_documents_end_to_end() {
        let source = doc("bpd-a", &[("a1", "age 21 minimum"), ("a2", "vesting graded"), ("a3", "  ")]);
        let target = doc("bpd-b", &[("b1", "loan program"), ("b2", "age 18 minimum"), ("b3", "vesting cliff")]);
        let embedder = Arc::new(vocabulary());
        let judge = Arc::new(keyword_judge());
        let engine = engine(embedder.clone(), judge.clone());

        let cmp = engine.compare_with_run_id("run-7", &source, &target).await.unwrap();

        assert_eq!(cmp.run_id, "run-7");
        assert_eq!(cmp.mappings.len(), 2);
        assert_eq!(cmp.mappings[0].source_id(), "a1");
        assert_eq!(cmp.mappings[0].target_id(), "b2");
        assert_eq!(cmp.mappings[1].target_id(), "b3");
        assert!(cmp.mappings.iter().all(|m| m.run_id == "run-7"));
        assert_eq!(cmp.excluded_source_ids, vec!["a3"]);
        assert_eq!(cmp.statistics.total_source, 3);
        assert_eq!(cmp.statistics.matched, 2);
        assert_eq!(cmp.statistics.unmatched_target, 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        // Two ranked sources, three targets each with K=3.
        assert_eq!(judge.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn same_inputs_same_result() {
        let source = doc("a", &[("a1", "age 21"), ("a2", "hardship withdrawals"), ("a3", "loan limits")]);
        let target = doc("b", &[("b1", "loan cap"), ("b2", "hardship rules"), ("b3", "age 18")]);
        let engine = engine(Arc::new(vocabulary()), Arc::new(keyword_judge()));

        let first = engine.compare_with_run_id("run-1", &source, &target).await.unwrap();
        let second = engine.compare_with_run_id("run-1", &source, &target).await.unwrap();
        assert_eq!(first.mappings, second.mappings);
        assert_eq!(first.statistics, second.statistics);
    }

    #[tokio::test]
    async fn failing_pair_does_not_abort_run() {
        let source = doc("a", &[("a1", "age 21"), ("a2", "loan limits")]);
        let target = doc("b", &[("b1", "age 18"), ("b2", "loan cap")]);
        let judge = FnJudge::new(|req| {
            let (s, t) = pair_ids(req);
            if s == "a1" {
                panic!("verifier crashed on {t}");
            }
            Ok(judgment("compatible", "low", "high", "Close.").to_string())
        });
        let engine = engine(Arc::new(vocabulary()), Arc::new(judge));
        let cmp = engine.compare(&source, &target).await.unwrap();

        assert_eq!(cmp.mappings.len(), 2);
        let a1 = &cmp.mappings[0];
        assert_eq!(a1.source_id(), "a1");
        assert!(a1.is_fallback());
        assert_eq!(a1.classification.confidence_level, ConfidenceLevel::Low);
        assert_eq!(cmp.mappings[1].classification.match_type, MatchType::Compatible);
        assert_eq!(cmp.statistics.matched, 1);
    }

    #[tokio::test]
    async fn best_match_prefers_confidence() {
        let source = doc("a", &[("s", "age")]);
        let target = doc("b", &[("t1", "age x"), ("t2", "age y"), ("t3", "age z")]);
        let judge = FnJudge::new(|req| {
            let (_, t) = pair_ids(req);
            let confidence = if t == "t2" { "high" } else { "medium" };
            Ok(judgment("compatible", "low", confidence, "Close.").to_string())
        });
        let engine = engine(Arc::new(vocabulary()), Arc::new(judge));
        let cmp = engine.compare(&source, &target).await.unwrap();
        assert_eq!(cmp.mappings.len(), 1);
        assert_eq!(cmp.mappings[0].target_id(), "t2");
    }

    #[tokio::test]
    async fn embedding_failure_aborts_before_verification() {
        let judge = Arc::new(keyword_judge());
        let engine = engine(Arc::new(FailingEmbedder), judge.clone());
        let err = engine
            .compare(&doc("a", &[("a1", "age")]), &doc("b", &[("b1", "age")]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Embedding(_)));
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_documents() {
        let engine = engine(Arc::new(vocabulary()), Arc::new(keyword_judge()));
        let cmp = engine.compare(&doc("a", &[]), &doc("b", &[("b1", "age")])).await.unwrap();
        assert!(cmp.mappings.is_empty());
        assert_eq!(cmp.statistics.matched, 0);
        assert_eq!(cmp.statistics.unmatched_target, 1);
        assert_eq!(cmp.match_rate(), 0.0);

        let cmp = engine.compare(&doc("a", &[("a1", "age")]), &doc("b", &[])).await.unwrap();
        assert!(cmp.mappings.is_empty());
        assert_eq!(cmp.statistics.unmatched_source, 1);
    }

    #[tokio::test]
    async fn invalid_item_rejected() {
        let mut source = doc("a", &[("a1", "age")]);
        source.provisions[0].confidence_score = 2.0;
        let engine = engine(Arc::new(vocabulary()), Arc::new(keyword_judge()));
        let err = engine.compare(&source, &doc("b", &[])).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidItem { .. }));
    }

    #[tokio::test]
    async fn duplicate_ids_rejected_per_document() {
        let judge = Arc::new(keyword_judge());
        let engine = engine(Arc::new(vocabulary()), judge.clone());
        let source = doc("a", &[("s1", "age 21"), ("s1", "loan limits")]);
        let target = doc("b", &[("t1", "age 18"), ("t2", "loan cap")]);

        let err = engine.compare(&source, &target).await.unwrap_err();
        match err {
            EngineError::InvalidItem { document, source } => {
                assert_eq!(document, "a");
                assert_eq!(source, ItemError::DuplicateId("s1".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);

        let target = doc("b", &[("t1", "age 18"), ("t1", "loan cap")]);
        let err = engine.compare(&doc("a", &[("s1", "age")]), &target).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidItem { ref document, .. } if document == "b"));

        // The same id on both sides is fine.
        let cmp = engine
            .compare(&doc("a", &[("x1", "age 21")]), &doc("b", &[("x1", "age 18")]))
            .await
            .unwrap();
        assert_eq!(cmp.mappings.len(), 1);
    }

    #[test]
    fn invalid_config_rejected() {
        let config = EngineConfig {
            top_k: 0,
            ..Default::default()
        };
        let result = CrosswalkEngine::new(config, Arc::new(vocabulary()), Arc::new(keyword_judge()));
        assert!(matches!(result, Err(EngineError::Config(ConfigError::ZeroTopK))));
    }
}
