//! Hybrid document retrieval: datasets, the scorer, and the retrieval skill.

pub mod dataset;
pub mod manager;
pub mod runtime;
pub mod scorer;

use std::collections::HashSet;

use chatskill_types::dataset::{DatasetId, Document};
use chatskill_types::retrieval::CandidateKey;

/// Every rankable unit of `documents`: each document, plus each sentence of
/// documents belonging to a segmented dataset.
pub(crate) fn rankable_units(
    documents: &[Document],
    segmented: &HashSet<DatasetId>,
) -> Vec<(CandidateKey, String)> {
    let mut units = Vec::with_capacity(documents.len());
    for document in documents {
        units.push((CandidateKey::document(document.id), document.content.clone()));
        if segmented.contains(&document.dataset_id) {
            for (position, sentence) in document.sentences.iter().enumerate() {
                units.push((
                    CandidateKey::sentence(document.id, position as u32),
                    sentence.clone(),
                ));
            }
        }
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: i64, dataset_id: &DatasetId, sentences: &[&str]) -> Document {
        Document {
            id,
            dataset_id: dataset_id.clone(),
            content: sentences.join(" "),
            attributes: serde_json::Map::new(),
            sentences: sentences.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_rankable_units_expand_only_segmented_datasets() {
        let plain = DatasetId::new();
        let segmented = DatasetId::new();
        let docs = vec![
            document(1, &plain, &["a.", "b."]),
            document(2, &segmented, &["c.", "d."]),
        ];
        let units = rankable_units(&docs, &HashSet::from([segmented.clone()]));
        let keys: Vec<CandidateKey> = units.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                CandidateKey::document(1),
                CandidateKey::document(2),
                CandidateKey::sentence(2, 0),
                CandidateKey::sentence(2, 1),
            ]
        );
        assert_eq!(units[3].1, "d.");
    }
}
