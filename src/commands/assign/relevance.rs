use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::Result;
use tracing::warn;

use super::GroundTruthTable;
use crate::semantic::mean_similarity;
use crate::services::{Embedder, RelevanceClassifier};

const LOGISTIC_SCALE: f64 = 8.0;
const LOGISTIC_MIDPOINT: f64 = 0.2;

pub struct PrototypeClassifier<'a> {
    ground_truth: &'a GroundTruthTable,
    embedder: &'a dyn Embedder,
    prototypes: RefCell<HashMap<String, Vec<Vec<f32>>>>,
}

impl<'a> PrototypeClassifier<'a> {
    pub fn new(ground_truth: &'a GroundTruthTable, embedder: &'a dyn Embedder) -> Self {
        Self {
            ground_truth,
            embedder,
            prototypes: RefCell::new(HashMap::new()),
        }
    }

    fn prototypes_for(&self, field: &str) -> Result<Vec<Vec<f32>>> {
        if let Some(cached) = self.prototypes.borrow().get(field) {
            return Ok(cached.clone());
        }
        let vectors = self
            .embedder
            .embed_all(&self.ground_truth.field_sentences(field))?;
        self.prototypes
            .borrow_mut()
            .insert(field.to_string(), vectors.clone());
        Ok(vectors)
    }
}

impl RelevanceClassifier for PrototypeClassifier<'_> {
    fn score(&self, paragraph: &str, field: &str) -> Result<f64> {
        let prototypes = self.prototypes_for(field)?;
        let query = self.embedder.embed(paragraph)?;
        let Some(similarity) = mean_similarity(&query, &prototypes) else {
            return Ok(0.5);
        };
        Ok(1.0 / (1.0 + (-LOGISTIC_SCALE * (similarity - LOGISTIC_MIDPOINT)).exp()))
    }
}

pub fn rank_paragraphs(
    paragraphs: &[String],
    field: &str,
    classifier: &dyn RelevanceClassifier,
    top_k: usize,
) -> Vec<String> {
    let mut scored = paragraphs
        .iter()
        .map(|paragraph| {
            let score = classifier.score(paragraph, field).unwrap_or_else(|err| {
                warn!(field, error = %err, "relevance scoring failed; treating as irrelevant");
                0.0
            });
            (paragraph, score)
        })
        .collect::<Vec<(&String, f64)>>();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let ranked = scored
        .into_iter()
        .take(top_k)
        .map(|(paragraph, _)| paragraph.clone())
        .collect::<Vec<String>>();
    if ranked.is_empty() {
        return paragraphs.to_vec();
    }
    ranked
}
