use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::util::alphanumeric_only;

pub const ALL_CLASSES: &str = "All Classes";
pub const NO_REFERENCE: &str = "-1";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroundTruthRow {
    pub field: String,
    pub class: String,
    pub value: String,
    pub data_string: String,
    #[serde(default)]
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GroundTruthTable {
    rows: Vec<GroundTruthRow>,
}

impl GroundTruthTable {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            warn!("no ground truth configured; disambiguation and value mapping will degrade");
            return Ok(Self::default());
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("failed to open ground truth {}", path.display()))?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<GroundTruthRow>, csv::Error>>()
            .with_context(|| format!("failed to parse ground truth {}", path.display()))?;

        info!(path = %path.display(), rows = rows.len(), "loaded ground truth");
        Ok(Self { rows })
    }

    #[cfg(test)]
    pub fn from_rows(rows: Vec<GroundTruthRow>) -> Self {
        Self { rows }
    }

    pub fn scoped_rows(&self, field: &str, class_name: &str) -> Vec<&GroundTruthRow> {
        let scope = class_scope(class_name);
        let for_field = || self.rows.iter().filter(move |row| row.field == field);

        for_field()
            .filter(|row| row.class.contains(&scope))
            .chain(for_field().filter(|row| row.class.contains(ALL_CLASSES)))
            .collect()
    }

    pub fn example_sentences(&self, field: &str, class_name: &str) -> Vec<String> {
        self.scoped_rows(field, class_name)
            .into_iter()
            .map(|row| row.data_string.clone())
            .collect()
    }

    pub fn distinct_examples(&self, field: &str, class_name: &str, limit: usize) -> Vec<String> {
        let mut examples = Vec::<String>::new();
        for sentence in self.example_sentences(field, class_name) {
            if examples.len() >= limit {
                break;
            }
            if !examples.contains(&sentence) {
                examples.push(sentence);
            }
        }
        examples
    }

    pub fn value_groups(&self, field: &str, class_name: &str) -> BTreeMap<String, Vec<String>> {
        let mut groups = BTreeMap::<String, Vec<String>>::new();
        for row in self.scoped_rows(field, class_name) {
            groups
                .entry(row.value.clone())
                .or_default()
                .push(row.data_string.clone());
        }
        groups
    }

    pub fn field_sentences(&self, field: &str) -> Vec<String> {
        self.rows
            .iter()
            .filter(|row| row.field == field)
            .map(|row| row.data_string.clone())
            .collect()
    }

    pub fn reference_value(&self, document_id: &str, field: &str, class_name: &str) -> String {
        let scope = class_scope(class_name);
        let for_document = || {
            self.rows.iter().filter(move |row| {
                row.field == field && row.document_id.as_deref() == Some(document_id)
            })
        };

        for_document()
            .find(|row| row.class.contains(&scope))
            .or_else(|| for_document().find(|row| row.class.contains(ALL_CLASSES)))
            .map(|row| row.value.clone())
            .unwrap_or_else(|| NO_REFERENCE.to_string())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

pub fn class_scope(class_name: &str) -> String {
    let compact = alphanumeric_only(class_name);
    let remainder = compact.strip_prefix("Class").unwrap_or(&compact);
    format!("Class {remainder}")
}
