use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use crate::document::Document;
use crate::model::{EntityRecord, NOT_LOCATED};

const OBJECTIVE_HEADERS: &[&str] = &[
    "The Fund’s Investment Goal",
    "Investment Objectives",
    "Investment Objective",
    "Investment Goal",
];

const HEADER_WINDOW: usize = 300;
const FEES_WINDOW: usize = 50;

const MARKUP_CONTEXT_PHRASES: &[&str] = &[
    "Fees and Expenses",
    "INVESTMENT OBJECTIVE",
    "Investment Objective",
    "Investment Objectives",
    "Investment Goal",
    "nvestment Objective",
];
const MARKUP_WINDOW: usize = 1750;
const MARKUP_FALLBACK_OCCURRENCE: usize = 2;

pub struct OffsetLocator {
    header: Regex,
    fees: Regex,
}

impl OffsetLocator {
    pub fn new() -> Result<Self> {
        let alternation = OBJECTIVE_HEADERS
            .iter()
            .map(|header| regex::escape(header))
            .collect::<Vec<String>>()
            .join("|");
        let header = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()
            .context("failed to compile objective header pattern")?;
        let fees = RegexBuilder::new("fees")
            .case_insensitive(true)
            .build()
            .context("failed to compile fees pattern")?;
        Ok(Self { header, fees })
    }

    pub fn locate_text_offset(&self, visible: &str, name: &str) -> Result<i64> {
        let mention = name_pattern(name)?;
        for found in mention.find_iter(visible) {
            if self.header_follows(visible, found.start()) {
                return Ok(found.start() as i64);
            }
        }
        Ok(NOT_LOCATED)
    }

    fn header_follows(&self, visible: &str, mention_start: usize) -> bool {
        let Some(header) = self.header.find_at(visible, mention_start) else {
            return false;
        };
        if char_distance(visible, mention_start, header.start()) > HEADER_WINDOW {
            return false;
        }
        match self.fees.find_at(visible, header.start()) {
            Some(fees) => char_distance(visible, header.start(), fees.start()) >= FEES_WINDOW,
            None => true,
        }
    }
}

pub fn locate_markup_offset(raw: &str, name: &str) -> Result<i64> {
    let mention = name_pattern(name)?;
    let starts = mention
        .find_iter(raw)
        .map(|found| found.start())
        .collect::<Vec<usize>>();

    for &start in &starts {
        let window = window_after(raw, start, MARKUP_WINDOW);
        if MARKUP_CONTEXT_PHRASES
            .iter()
            .any(|phrase| window.contains(phrase))
        {
            return Ok(start as i64);
        }
    }

    Ok(starts
        .get(MARKUP_FALLBACK_OCCURRENCE)
        .map(|start| *start as i64)
        .unwrap_or(NOT_LOCATED))
}

pub fn locate_entities(
    locator: &OffsetLocator,
    document: &Document,
    names: &[String],
) -> Result<Vec<EntityRecord>> {
    if let [name] = names {
        return Ok(vec![EntityRecord {
            name: name.clone(),
            ordinal: 0,
            text_offset: 0,
            markup_offset: 0,
        }]);
    }

    names
        .iter()
        .enumerate()
        .map(|(ordinal, name)| {
            Ok(EntityRecord {
                name: name.clone(),
                ordinal,
                text_offset: locator.locate_text_offset(&document.visible, name)?,
                markup_offset: locate_markup_offset(&document.raw, name)?,
            })
        })
        .collect()
}

fn name_pattern(name: &str) -> Result<Regex> {
    RegexBuilder::new(&regex::escape(name))
        .case_insensitive(true)
        .build()
        .with_context(|| format!("failed to compile name pattern for {name}"))
}

fn char_distance(text: &str, from: usize, to: usize) -> usize {
    text[from..to].chars().count()
}

fn window_after(text: &str, start: usize, chars: usize) -> &str {
    let rest = &text[start..];
    let end = rest
        .char_indices()
        .nth(chars)
        .map(|(position, _)| position)
        .unwrap_or(rest.len());
    &rest[..end]
}
