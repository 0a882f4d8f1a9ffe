//! Embedding-based candidate narrowing.
//!
//! Every non-blank fingerprint of both documents goes to the embedding
//! provider in one batched call. Each source item then keeps its top-K
//! targets by cosine similarity. Ties keep target extraction order.

use std::sync::Arc;

use crosswalk_core::{FingerprintStyle, Item, fingerprint};
use tracing::info;

use crate::embedder::{EmbedError, EmbeddingProvider, check_embeddings};

/// Cosine similarity clamped to [0, 1]. A zero vector scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let sim = dot / (norm_a * norm_b);
    if sim.is_nan() { 0.0 } else { sim.clamp(0.0, 1.0) }
}

/// One ranked target for a source item.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source_id: String,
    pub target_id: String,
    /// Index into the target item slice.
    pub target_index: usize,
    pub similarity: f32,
    /// 1-based position in the source's candidate list.
    pub rank: usize,
}

/// Candidates of one source item, best first.
#[derive(Debug, Clone)]
pub struct RankedSource {
    pub source_index: usize,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// Non-blank source items in source order.
    pub ranked: Vec<RankedSource>,
    /// Items whose fingerprint was blank; never embedded or verified.
    pub excluded_source_ids: Vec<String>,
    pub excluded_target_ids: Vec<String>,
}

impl Ranking {
    pub fn candidate_count(&self) -> usize {
        self.ranked.iter().map(|r| r.candidates.len()).sum()
    }
}

pub struct CandidateRanker {
    top_k: usize,
    style: FingerprintStyle,
}

impl CandidateRanker {
    pub fn new(top_k: usize, style: FingerprintStyle) -> Self {
        Self { top_k, style }
    }

    /// Rank targets for every source item.
    ///
    /// Fails if the provider fails or returns vectors of the wrong count or
    /// dimensionality; nothing is verified in that case.
    pub async fn rank(
        &self,
        embedder: &dyn EmbeddingProvider,
        sources: &[Arc<Item>],
        targets: &[Arc<Item>],
    ) -> Result<Ranking, EmbedError> {
        let (source_idx, source_texts, excluded_source_ids) = self.fingerprints(sources);
        let (target_idx, target_texts, excluded_target_ids) = self.fingerprints(targets);

        let mut ranking = Ranking {
            ranked: Vec::new(),
            excluded_source_ids,
            excluded_target_ids,
        };
        if source_texts.is_empty() {
            return Ok(ranking);
        }

        let texts: Vec<String> = source_texts.into_iter().chain(target_texts).collect();
        let vectors = embedder.embed(&texts).await?;
        let dim = check_embeddings(texts.len(), &vectors)?;
        let (source_vecs, target_vecs) = vectors.split_at(source_idx.len());

        for (&si, sv) in source_idx.iter().zip(source_vecs) {
            let scored: Vec<(usize, f32)> = target_idx
                .iter()
                .zip(target_vecs)
                .map(|(&ti, tv)| (ti, cosine_similarity(sv, tv)))
                .collect();
            let candidates = top_k(scored, self.top_k)
                .into_iter()
                .enumerate()
                .map(|(pos, (ti, similarity))| Candidate {
                    source_id: sources[si].id().to_string(),
                    target_id: targets[ti].id().to_string(),
                    target_index: ti,
                    similarity,
                    rank: pos + 1,
                })
                .collect();
            ranking.ranked.push(RankedSource {
                source_index: si,
                candidates,
            });
        }

        info!(
            sources = source_idx.len(),
            targets = target_idx.len(),
            excluded_sources = ranking.excluded_source_ids.len(),
            excluded_targets = ranking.excluded_target_ids.len(),
            candidates = ranking.candidate_count(),
            dim,
            "ranked candidates"
        );
        Ok(ranking)
    }

    /// Indices and fingerprints of non-blank items, plus ids of blank ones.
    fn fingerprints(&self, items: &[Arc<Item>]) -> (Vec<usize>, Vec<String>, Vec<String>) {
        let mut indices = Vec::new();
        let mut texts = Vec::new();
        let mut excluded = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let fp = fingerprint(item, self.style);
            if crosswalk_core::fingerprint::is_blank(&fp) {
                excluded.push(item.id().to_string());
            } else {
                indices.push(i);
                texts.push(fp);
            }
        }
        (indices, texts, excluded)
    }
}

/// Keep the `k` highest scores, stable with respect to input order on ties.
pub fn top_k(mut scored: Vec<(usize, f32)>, k: usize) -> Vec<(usize, f32)> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, KeywordEmbedder, ShortEmbedder, provision};
    use std::sync::atomic::Ordering;

    fn items(list: &[(&str, &str)]) -> Vec<Arc<Item>> {
        list.iter().map(|(id, text)| Arc::new(provision(id, text))).collect()
    }

    #[test]
    fn cosine_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = [0.3, 0.9, 0.1, 0.4];
        let b = [0.7, 0.2, 0.5, 0.0];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn top_k_is_stable_on_ties() {
        let scored = vec![(0, 0.5), (1, 0.9), (2, 0.5), (3, 0.5)];
        assert_eq!(top_k(scored, 3), vec![(1, 0.9), (0, 0.5), (2, 0.5)]);
    }

    #[tokio::test]
    async fn ranks_top_k_with_one_embedding_call() {
        let embedder = KeywordEmbedder::new(&["age", "vesting", "loan"]);
        let sources = items(&[("s1", "Minimum age 21"), ("s2", "Vesting schedule")]);
        let targets = items(&[
            ("t1", "Loan policy"),
            ("t2", "Graded vesting"),
            ("t3", "Eligibility age"),
        ]);
        let ranker = CandidateRanker::new(2, FingerprintStyle::Plain);
        let ranking = ranker.rank(&embedder, &sources, &targets).await.unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ranking.ranked.len(), 2);
        let first = &ranking.ranked[0].candidates;
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].target_id, "t3");
        assert_eq!(first[0].rank, 1);
        assert_eq!(first[1].rank, 2);
        assert!(first[0].similarity >= first[1].similarity);
        assert_eq!(ranking.ranked[1].candidates[0].target_id, "t2");
        assert_eq!(ranking.candidate_count(), 4);
    }

    #[tokio::test]
    async fn k_larger_than_targets_keeps_all() {
        let embedder = KeywordEmbedder::new(&["age"]);
        let sources = items(&[("s1", "age")]);
        let targets = items(&[("t1", "age"), ("t2", "other")]);
        let ranking = CandidateRanker::new(10, FingerprintStyle::Plain)
            .rank(&embedder, &sources, &targets)
            .await
            .unwrap();
        assert_eq!(ranking.ranked[0].candidates.len(), 2);
    }

    #[tokio::test]
    async fn blank_items_excluded() {
        let embedder = KeywordEmbedder::new(&["age"]);
        let sources = items(&[("s1", "  "), ("s2", "age")]);
        let targets = items(&[("t1", ""), ("t2", "age")]);
        let ranking = CandidateRanker::new(3, FingerprintStyle::Plain)
            .rank(&embedder, &sources, &targets)
            .await
            .unwrap();
        assert_eq!(ranking.excluded_source_ids, vec!["s1"]);
        assert_eq!(ranking.excluded_target_ids, vec!["t1"]);
        assert_eq!(ranking.ranked.len(), 1);
        assert_eq!(ranking.ranked[0].source_index, 1);
        assert_eq!(ranking.ranked[0].candidates[0].target_id, "t2");
    }

    #[tokio::test]
    async fn empty_source_skips_embedding() {
        let embedder = KeywordEmbedder::new(&["age"]);
        let targets = items(&[("t1", "age")]);
        let ranking = CandidateRanker::new(3, FingerprintStyle::Plain)
            .rank(&embedder, &[], &targets)
            .await
            .unwrap();
        assert!(ranking.ranked.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_target_gives_no_candidates() {
        let embedder = KeywordEmbedder::new(&["age"]);
        let sources = items(&[("s1", "age")]);
        let ranking = CandidateRanker::new(3, FingerprintStyle::Plain)
            .rank(&embedder, &sources, &[])
            .await
            .unwrap();
        assert_eq!(ranking.ranked.len(), 1);
        assert!(ranking.ranked[0].candidates.is_empty());
    }

    #[tokio::test]
    async fn provider_failures_are_fatal() {
        let sources = items(&[("s1", "age")]);
        let targets = items(&[("t1", "age")]);
        let ranker = CandidateRanker::new(3, FingerprintStyle::Plain);
        assert!(ranker.rank(&FailingEmbedder, &sources, &targets).await.is_err());
        assert!(matches!(
            ranker.rank(&ShortEmbedder, &sources, &targets).await,
            Err(EmbedError::CountMismatch { expected: 2, actual: 1 })
        ));
    }
}
