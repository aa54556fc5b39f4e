//! Vocabulary-based correction of a question before SLU inference.
//!
//! Terms are drawn from a lexical term index. Each candidate term is aligned
//! with the best same-length character window of the question; windows that
//! are close but not equal are rewritten to the term. Windows already
//! matched or rewritten are never touched again.

use std::ops::Range;

use chatskill_types::config::SluConfig;
use chatskill_types::error::SkillError;
use chatskill_types::slu::Correction;

use crate::capability::search::SearchEngine;

/// Correct `question` against the terms stored in `term_index`.
///
/// Returns the corrected question and one [`Correction`] per rewrite, in
/// question order.
pub async fn correct<S: SearchEngine>(
    search: &S,
    term_index: &str,
    question: &str,
    config: &SluConfig,
) -> Result<(String, Vec<Correction>), SkillError> {
    let hits = search
        .lexical_query(
            std::slice::from_ref(&term_index.to_string()),
            question,
            config.correction_candidates.max(1),
        )
        .await?;
    let terms: Vec<String> = hits.into_iter().map(|hit| hit.text).collect();
    Ok(apply_terms(question, &terms, config.correction_min_similarity))
}

/// Align each term with the question, best-ranked term first.
pub(crate) fn apply_terms(
    question: &str,
    terms: &[String],
    min_similarity: f32,
) -> (String, Vec<Correction>) {
    let chars: Vec<char> = question.chars().collect();
    let mut protected: Vec<Range<usize>> = Vec::new();
    let mut rewrites: Vec<(Range<usize>, Correction)> = Vec::new();

    for term in terms {
        let term_chars: Vec<char> = term.chars().collect();
        let width = term_chars.len();
        if width == 0 || width > chars.len() {
            continue;
        }

        let mut best: Option<(Range<usize>, f32)> = None;
        for start in 0..=chars.len() - width {
            let window = start..start + width;
            if protected.iter().any(|p| overlaps(p, &window)) {
                continue;
            }
            let similarity = edit_similarity(&chars[window.clone()], &term_chars);
            if best.as_ref().is_none_or(|(_, s)| similarity > *s) {
                best = Some((window, similarity));
            }
        }

        let Some((window, similarity)) = best else {
            continue;
        };
        if similarity >= 1.0 {
            protected.push(window);
        } else if similarity >= min_similarity {
            let original: String = chars[window.clone()].iter().collect();
            rewrites.push((
                window.clone(),
                Correction {
                    original,
                    corrected: term.clone(),
                    similarity,
                },
            ));
            protected.push(window);
        }
    }

    if rewrites.is_empty() {
        return (question.to_string(), Vec::new());
    }

    rewrites.sort_by_key(|(window, _)| window.start);
    let mut corrected = String::with_capacity(question.len());
    let mut cursor = 0;
    for (window, correction) in &rewrites {
        corrected.extend(&chars[cursor..window.start]);
        corrected.push_str(&correction.corrected);
        cursor = window.end;
    }
    corrected.extend(&chars[cursor..]);

    tracing::debug!(rewrites = rewrites.len(), "corrected question");
    (
        corrected,
        rewrites.into_iter().map(|(_, correction)| correction).collect(),
    )
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// `1 - levenshtein(a, b) / max(len)`, case-insensitive.
pub(crate) fn edit_similarity(a: &[char], b: &[char]) -> f32 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let fold = |c: &char| c.to_lowercase().next().unwrap_or(*c);
    let a: Vec<char> = a.iter().map(fold).collect();
    let b: Vec<char> = b.iter().map(fold).collect();

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    1.0 - previous[b.len()] as f32 / longest as f32
}
