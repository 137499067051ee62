use regex::Regex;

use super::Field;
use crate::document::{Section, SectionIndex, SectionKind};
use crate::model::{CandidateSpan, NOT_LOCATED};
use crate::util::{first_words, word_count};

pub const MAX_SPAN_WORDS: usize = 700;
pub const ANCHOR_WORDS: usize = 200;

pub fn extract_field_spans(
    index: &SectionIndex,
    visible: &str,
    field: &Field,
) -> Vec<CandidateSpan> {
    let mut spans = Vec::<CandidateSpan>::new();

    for kind in SectionKind::ALL {
        let sections = index.sections(kind);
        let mut search_from = 0usize;

        for (position, section) in sections.iter().enumerate() {
            if !field.pattern.is_match(&section.spaced_text) {
                continue;
            }

            let offset = locate_from(visible, &section.raw_text, &mut search_from);
            let grown = grow_span(sections, position);
            let truncated = first_words(&grown, MAX_SPAN_WORDS);
            if !anchored(&truncated, &field.pattern) {
                continue;
            }
            spans.push(CandidateSpan::new(truncated, offset));
        }
    }

    spans
}

fn locate_from(visible: &str, needle: &str, search_from: &mut usize) -> i64 {
    if needle.is_empty() {
        return NOT_LOCATED;
    }
    match visible
        .get(*search_from..)
        .and_then(|rest| rest.find(needle))
    {
        Some(relative) => {
            let offset = *search_from + relative;
            *search_from = offset + needle.len();
            offset as i64
        }
        None => NOT_LOCATED,
    }
}

fn anchored(span: &str, pattern: &Regex) -> bool {
    pattern.is_match(&first_words(span, ANCHOR_WORDS))
}

pub fn grow_span(sections: &[Section], start: usize) -> String {
    let mut span = format!("{}\n", sections[start].spaced_text);
    let mut cursor = sections[start].next_sibling;

    while let Some(position) = cursor {
        let sibling = &sections[position];
        cursor = sibling.next_sibling;
        let text = sibling.raw_text.as_str();

        if is_page_marker(text) || span.contains(text) {
            continue;
        }

        span.push_str(text);
        span.push(' ');
        if looks_like_header(text) || word_count(&span) > MAX_SPAN_WORDS {
            break;
        }
    }

    span
}

pub fn is_page_marker(text: &str) -> bool {
    let trimmed = text.trim();
    let numeric = !trimmed.is_empty() && trimmed.chars().all(|character| character.is_ascii_digit());
    numeric || trimmed.to_lowercase().contains("table of contents")
}

pub fn looks_like_header(text: &str) -> bool {
    let Some(first_letter) = text.find(|character: char| character.is_ascii_alphabetic()) else {
        return false;
    };
    if text.split(' ').count() < 3 {
        return true;
    }

    let lead = text[first_letter..]
        .chars()
        .take(3)
        .filter(|character| character.is_alphabetic())
        .collect::<Vec<char>>();
    !lead.is_empty() && lead.iter().all(|character| character.is_uppercase())
}
