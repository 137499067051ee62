use crate::model::CandidateSpan;

pub fn filter_subsumed(spans: &[CandidateSpan]) -> Vec<CandidateSpan> {
    spans
        .iter()
        .enumerate()
        .filter(|(position, span)| !is_subsumed(spans, *position, span))
        .map(|(_, span)| span.clone())
        .collect()
}

fn is_subsumed(spans: &[CandidateSpan], position: usize, span: &CandidateSpan) -> bool {
    spans.iter().enumerate().any(|(other_position, other)| {
        if other_position == position || !other.text.contains(&span.text) {
            return false;
        }
        if other.text.len() > span.text.len() {
            return true;
        }
        other.offset == span.offset && other_position < position
    })
}
