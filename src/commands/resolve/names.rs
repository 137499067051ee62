use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use scraper::Html;
use tracing::{debug, warn};

use crate::config::PipelineSection;
use crate::document::discovery_excerpt;
use crate::services::{ChatMessage, TextGenerator};

const ANSWER_PREFIX: &str = "Fund Name: ";
const NAME_SEPARATOR: &str = ", ";

const DEFAULT_INSTRUCTION: &str = "You read the opening text of a mutual fund prospectus and list \
every fund it covers. Answer with the full fund names separated by \", \" and nothing else.";

const EXAMPLE_EXCERPT: &str = "Summary Prospectus May 1 Acme Growth Fund Class A ACGAX \
Class C ACGCX Acme Income Fund Class A ACIAX Investment Objective The fund seeks growth.";
const EXAMPLE_ANSWER: &str = "Acme Growth Fund, Acme Income Fund";

pub fn load_entity_prompt(path: Option<&Path>) -> Result<Vec<ChatMessage>> {
    let Some(path) = path else {
        return Ok(vec![
            ChatMessage::system(DEFAULT_INSTRUCTION),
            ChatMessage::user(format!("{EXAMPLE_EXCERPT}\n{ANSWER_PREFIX}")),
            ChatMessage::assistant(format!("{ANSWER_PREFIX}{EXAMPLE_ANSWER}")),
        ]);
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read entity prompt {}", path.display()))?;
    let messages: Vec<ChatMessage> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse entity prompt {}", path.display()))?;
    Ok(messages)
}

pub fn build_discovery_messages(primer: &[ChatMessage], excerpt: &str) -> Vec<ChatMessage> {
    let mut messages = primer.to_vec();
    messages.push(ChatMessage::user(format!("{excerpt}\n{ANSWER_PREFIX}")));
    messages
}

pub fn parse_entity_names(answer: &str) -> Vec<String> {
    let trimmed = answer.trim();
    let body = trimmed.strip_prefix(ANSWER_PREFIX).unwrap_or(trimmed);

    let mut names = Vec::<String>::new();
    for piece in body.split(NAME_SEPARATOR) {
        let name = piece.trim().trim_end_matches([',', '.']).trim();
        if name.is_empty() || names.iter().any(|existing| existing == name) {
            continue;
        }
        names.push(name.to_string());
    }
    names
}

pub fn discover_entity_names(
    generator: &dyn TextGenerator,
    primer: &[ChatMessage],
    html: &Html,
    settings: &PipelineSection,
) -> Vec<String> {
    let excerpt = discovery_excerpt(
        html,
        settings.entity_prompt_max_elements,
        settings.entity_prompt_max_chars,
    );
    if excerpt.trim().is_empty() {
        warn!("document has no text for entity discovery");
        return Vec::new();
    }

    let messages = build_discovery_messages(primer, &excerpt);
    match generator.generate(&messages) {
        Ok(answer) => {
            let names = parse_entity_names(&answer);
            debug!(count = names.len(), "entity names discovered");
            names
        }
        Err(err) => {
            warn!(error = %err, "entity discovery failed");
            Vec::new()
        }
    }
}
