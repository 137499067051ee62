use std::collections::BTreeMap;

use anyhow::Result;

use crate::model::NONE_ANSWER;
use crate::semantic::mean_similarity;
use crate::services::Embedder;

const UNSCORED: f64 = -1.0;

pub fn closest_answer(
    answers: &[String],
    examples: &[String],
    embedder: &dyn Embedder,
) -> Result<String> {
    let example_vectors = embedder.embed_all(examples)?;

    let mut best: Option<(&String, f64)> = None;
    for answer in answers {
        let vector = embedder.embed(answer)?;
        let score = mean_similarity(&vector, &example_vectors).unwrap_or(UNSCORED);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((answer, score));
        }
    }

    Ok(best
        .map(|(answer, _)| answer.clone())
        .unwrap_or_else(|| NONE_ANSWER.to_string()))
}

pub fn nearest_value(
    text: &str,
    groups: &BTreeMap<String, Vec<String>>,
    embedder: &dyn Embedder,
) -> Result<Option<String>> {
    let query = embedder.embed(text)?;

    let mut best: Option<(&String, f64)> = None;
    for (value, sentences) in groups {
        let vectors = embedder.embed_all(sentences)?;
        let Some(score) = mean_similarity(&query, &vectors) else {
            continue;
        };
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((value, score));
        }
    }

    Ok(best.map(|(value, _)| value.clone()))
}
