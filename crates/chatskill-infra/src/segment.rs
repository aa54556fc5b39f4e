//! Sentence segmentation for segmented datasets.
//!
//! Uses `text-splitter`, which breaks at the coarsest semantic boundary
//! (paragraph, sentence, word) that keeps a segment under the limit.
//! Adjacent short sentences may share one segment.

use chatskill_types::dataset::CreateDatasetRequest;
use text_splitter::TextSplitter;

/// Split `text` into ordered segments of at most `max_chars` characters.
pub fn segment_text(text: &str, max_chars: usize) -> Vec<String> {
    let splitter = TextSplitter::new(max_chars.max(1));
    splitter
        .chunks(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fill in sentences for every document of a segmented request that came
/// without them. Non-segmented requests are left untouched.
pub fn segment_request(request: &mut CreateDatasetRequest, max_chars: usize) {
    if !request.segment {
        return;
    }
    for doc in request.documents.iter_mut().filter(|d| d.sentences.is_empty()) {
        doc.sentences = segment_text(&doc.content, max_chars);
    }
}
