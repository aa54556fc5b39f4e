//! Hybrid lexical + embedding score fusion.
//!
//! Lexical scores are raw BM25 values, min-max normalized over the fixed
//! range `[0, ceiling]` and clamped. Embedding scores are cosine similarities
//! rescaled from `[-1, 1]` to `[0, 1]`. A candidate found by only one side
//! scores 0 on the other.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chatskill_types::retrieval::{CandidateKey, LexicalHit, NearestHit};

/// A fused candidate with both component scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub key: CandidateKey,
    pub lexical: f32,
    pub embedding: f32,
    pub combined: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct HybridScorer {
    ceiling: f32,
}

impl HybridScorer {
    /// `ceiling` is the raw lexical score that maps to 1.0.
    pub fn new(ceiling: f32) -> Self {
        Self { ceiling }
    }

    pub fn normalize_lexical(&self, raw: f32) -> f32 {
        if !raw.is_finite() || self.ceiling <= 0.0 {
            return 0.0;
        }
        (raw / self.ceiling).clamp(0.0, 1.0)
    }

    pub fn rescale_cosine(cosine: f32) -> f32 {
        if !cosine.is_finite() {
            return 0.0;
        }
        ((cosine + 1.0) / 2.0).clamp(0.0, 1.0)
    }

    /// Merge both candidate lists and rank them.
    ///
    /// `combined = weight * lexical + (1 - weight) * embedding`. Candidates
    /// below `threshold` are dropped; the rest are sorted by descending
    /// combined score, ties by ascending key, and cut to `top_k`.
    pub fn fuse(
        &self,
        lexical: &[LexicalHit],
        nearest: &[NearestHit],
        weight: f32,
        threshold: f32,
        top_k: usize,
    ) -> Vec<ScoredCandidate> {
        let mut components: BTreeMap<CandidateKey, (f32, f32)> = BTreeMap::new();

        for hit in lexical {
            let score = self.normalize_lexical(hit.score);
            let entry = components.entry(hit.key).or_insert((0.0, 0.0));
            entry.0 = entry.0.max(score);
        }
        for hit in nearest {
            let score = Self::rescale_cosine(hit.cosine);
            let entry = components.entry(hit.key).or_insert((0.0, 0.0));
            entry.1 = entry.1.max(score);
        }

        let mut ranked: Vec<ScoredCandidate> = components
            .into_iter()
            .map(|(key, (lexical, embedding))| ScoredCandidate {
                key,
                lexical,
                embedding,
                combined: weight * lexical + (1.0 - weight) * embedding,
            })
            .filter(|candidate| candidate.combined >= threshold)
            .collect();

        ranked.sort_by(|a, b| match b.combined.total_cmp(&a.combined) {
            Ordering::Equal => a.key.cmp(&b.key),
            other => other,
        });
        ranked.truncate(top_k);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexical(document_id: i64, score: f32) -> LexicalHit {
        LexicalHit {
            key: CandidateKey::document(document_id),
            text: String::new(),
            score,
        }
    }

    fn nearest(document_id: i64, cosine: f32) -> NearestHit {
        NearestHit {
            key: CandidateKey::document(document_id),
            cosine,
        }
    }

    #[test]
    fn test_normalize_lexical_clamps_to_unit_range() {
        let scorer = HybridScorer::new(6.4);
        assert_eq!(scorer.normalize_lexical(0.0), 0.0);
        assert_eq!(scorer.normalize_lexical(3.2), 0.5);
        assert_eq!(scorer.normalize_lexical(12.8), 1.0);
        assert_eq!(scorer.normalize_lexical(-1.0), 0.0);
        assert_eq!(scorer.normalize_lexical(f32::NAN), 0.0);
        assert_eq!(HybridScorer::new(0.0).normalize_lexical(5.0), 0.0);
    }

    #[test]
    fn test_rescale_cosine() {
        assert_eq!(HybridScorer::rescale_cosine(-1.0), 0.0);
        assert_eq!(HybridScorer::rescale_cosine(0.0), 0.5);
        assert_eq!(HybridScorer::rescale_cosine(1.0), 1.0);
    }

    #[test]
    fn test_weight_one_equals_normalized_lexical() {
        let scorer = HybridScorer::new(6.4);
        let ranked = scorer.fuse(
            &[lexical(1, 3.2), lexical(2, 6.4)],
            &[nearest(1, 0.9), nearest(3, 0.2)],
            1.0,
            0.0,
            10,
        );
        for candidate in &ranked {
            assert_eq!(candidate.combined, candidate.lexical);
        }
        assert_eq!(ranked[0].key.document_id, 2);
        assert_eq!(ranked[0].combined, 1.0);
    }

    #[test]
    fn test_weight_zero_equals_embedding_similarity() {
        let scorer = HybridScorer::new(6.4);
        let ranked = scorer.fuse(
            &[lexical(1, 6.4)],
            &[nearest(1, 0.0), nearest(2, 0.6)],
            0.0,
            0.0,
            10,
        );
        for candidate in &ranked {
            assert_eq!(candidate.combined, candidate.embedding);
        }
        assert_eq!(ranked[0].key.document_id, 2);
        assert!((ranked[0].combined - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_union_scores_missing_side_as_zero() {
        let scorer = HybridScorer::new(4.0);
        let ranked = scorer.fuse(&[lexical(1, 4.0)], &[nearest(2, 1.0)], 0.5, 0.0, 10);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|c| c.combined == 0.5));
        // equal scores fall back to ascending document id
        assert_eq!(ranked[0].key.document_id, 1);
        assert_eq!(ranked[1].key.document_id, 2);
    }

    #[test]
    fn test_threshold_and_top_k() {
        let scorer = HybridScorer::new(1.0);
        let ranked = scorer.fuse(
            &[lexical(1, 1.0), lexical(2, 0.5), lexical(3, 0.1)],
            &[],
            1.0,
            0.3,
            10,
        );
        assert_eq!(ranked.len(), 2);

        let ranked = scorer.fuse(
            &[lexical(1, 1.0), lexical(2, 0.5), lexical(3, 0.1)],
            &[],
            1.0,
            0.0,
            1,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].key.document_id, 1);
    }

    #[test]
    fn test_scores_are_non_increasing() {
        let scorer = HybridScorer::new(6.4);
        let ranked = scorer.fuse(
            &[lexical(4, 1.0), lexical(2, 5.0), lexical(9, 2.5)],
            &[nearest(2, 0.1), nearest(7, 0.9), nearest(4, -0.3)],
            0.5,
            0.0,
            10,
        );
        assert!(ranked.windows(2).all(|w| w[0].combined >= w[1].combined));
    }

    #[test]
    fn test_sentence_ties_break_by_position() {
        let scorer = HybridScorer::new(1.0);
        let hits = [
            LexicalHit {
                key: CandidateKey::sentence(5, 2),
                text: String::new(),
                score: 1.0,
            },
            LexicalHit {
                key: CandidateKey::sentence(5, 0),
                text: String::new(),
                score: 1.0,
            },
        ];
        let ranked = scorer.fuse(&hits, &[], 1.0, 0.0, 10);
        assert_eq!(ranked[0].key, CandidateKey::sentence(5, 0));
        assert_eq!(ranked[1].key, CandidateKey::sentence(5, 2));
    }

    #[test]
    fn test_empty_inputs_yield_empty_result() {
        let scorer = HybridScorer::new(6.4);
        assert!(scorer.fuse(&[], &[], 0.5, 0.0, 10).is_empty());
    }
}
