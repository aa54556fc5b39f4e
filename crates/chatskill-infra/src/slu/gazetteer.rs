//! Slot tagging by exact value lookup.

use chatskill_types::model::TrainingExample;
use chatskill_types::slu::SlotValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub label: String,
    pub value: String,
}

/// Known slot values, longest first so longer values win overlaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
}

impl Gazetteer {
    pub fn from_examples<'a>(examples: impl IntoIterator<Item = &'a TrainingExample>) -> Self {
        let mut entries: Vec<GazetteerEntry> = Vec::new();
        for slot in examples.into_iter().flat_map(|e| &e.slots) {
            let value = slot.value.trim();
            if value.is_empty() {
                continue;
            }
            let entry = GazetteerEntry {
                label: slot.label.clone(),
                value: value.to_string(),
            };
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| {
            b.value
                .chars()
                .count()
                .cmp(&a.value.chars().count())
                .then_with(|| a.value.cmp(&b.value))
        });
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Every non-overlapping occurrence of a known value, ordered by
    /// position. `start` is a character offset.
    pub fn tag(&self, text: &str) -> Vec<SlotValue> {
        let mut taken: Vec<(usize, usize)> = Vec::new();
        let mut slots = Vec::new();
        for entry in &self.entries {
            for (byte, _) in text.match_indices(&entry.value) {
                let start = text[..byte].chars().count();
                let end = start + entry.value.chars().count();
                if taken.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                taken.push((start, end));
                slots.push(SlotValue {
                    label: entry.label.clone(),
                    value: entry.value.clone(),
                    start,
                });
            }
        }
        slots.sort_by_key(|s| s.start);
        slots
    }
}

#[cfg(test)]
mod tests {
    use chatskill_types::model::SlotAnnotation;

    use super::*;

    fn example(text: &str, slots: &[(&str, &str)]) -> TrainingExample {
        TrainingExample {
            text: text.to_string(),
            intent: None,
            slots: slots
                .iter()
                .map(|(label, value)| SlotAnnotation {
                    label: label.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_longest_value_wins() {
        let examples = [
            example("fly to new york", &[("city", "new york")]),
            example("fly to york", &[("city", "york")]),
            example("fly to york", &[("city", "york")]),
        ];
        let gazetteer = Gazetteer::from_examples(&examples);
        assert_eq!(gazetteer.len(), 2);

        let slots = gazetteer.tag("from york to new york");
        assert_eq!(
            slots,
            vec![
                SlotValue {
                    label: "city".into(),
                    value: "york".into(),
                    start: 5
                },
                SlotValue {
                    label: "city".into(),
                    value: "new york".into(),
                    start: 13
                },
            ]
        );
    }

    #[test]
    fn test_offsets_count_characters() {
        let gazetteer = Gazetteer::from_examples(&[example("去台北", &[("city", "台北")])]);
        let slots = gazetteer.tag("我要去台北");
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, 3);
        assert!(gazetteer.tag("hello").is_empty());
    }
}
