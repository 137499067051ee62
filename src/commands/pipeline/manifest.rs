use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::commands::{BatchSummary, StageOutcome};

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct StageStep {
    pub stage: String,
    pub outcome: StageOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentProgress {
    pub document_id: String,
    pub stages: Vec<StageStep>,
    pub failure: Option<String>,
}

impl DocumentProgress {
    pub fn new(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            stages: Vec::new(),
            failure: None,
        }
    }

    pub fn record(&mut self, stage: &str, outcome: StageOutcome) {
        self.stages.push(StageStep {
            stage: stage.to_string(),
            outcome,
        });
    }

    pub fn overall(&self) -> StageOutcome {
        let outcomes = self.stages.iter().map(|step| step.outcome);
        if outcomes.clone().any(|outcome| outcome == StageOutcome::Empty) {
            StageOutcome::Empty
        } else if outcomes.clone().any(|outcome| outcome == StageOutcome::Stored) {
            StageOutcome::Stored
        } else {
            StageOutcome::AlreadyPresent
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub force: bool,
    pub relevance: String,
    pub db_path: String,
    pub report_path: String,
    pub summary: BatchSummary,
    pub documents: Vec<DocumentProgress>,
}

impl RunManifest {
    pub fn status_for(summary: &BatchSummary) -> &'static str {
        if summary.failed > 0 {
            "completed_with_failures"
        } else {
            "completed"
        }
    }
}

pub fn manifest_dir(db_path: &Path) -> PathBuf {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join("manifests"),
        _ => PathBuf::from("manifests"),
    }
}
