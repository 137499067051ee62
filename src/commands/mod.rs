pub mod assign;
pub mod attribute;
pub mod classify;
pub mod pipeline;
pub mod resolve;
pub mod status;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::util::is_valid_document_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Stored,
    AlreadyPresent,
    Empty,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub stored: usize,
    pub already_present: usize,
    pub empty: usize,
    pub failed: usize,
    pub rejected: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: StageOutcome) {
        match outcome {
            StageOutcome::Stored => self.stored += 1,
            StageOutcome::AlreadyPresent => self.already_present += 1,
            StageOutcome::Empty => self.empty += 1,
        }
    }
}

pub fn run_batch<F>(stage_name: &str, ids: &[String], mut stage: F) -> BatchSummary
where
    F: FnMut(&str) -> anyhow::Result<StageOutcome>,
{
    let mut summary = BatchSummary::default();

    for document_id in ids {
        let document_id = document_id.trim();
        if !is_valid_document_id(document_id) {
            warn!(stage = stage_name, document_id, "invalid identifier format; skipping");
            summary.rejected += 1;
            continue;
        }

        match stage(document_id) {
            Ok(outcome) => {
                info!(stage = stage_name, document_id, outcome = ?outcome, "identifier processed");
                summary.record(outcome);
            }
            Err(err) => {
                error!(stage = stage_name, document_id, error = %err, "identifier failed");
                for cause in err.chain().skip(1) {
                    error!(cause = %cause, "caused by");
                }
                summary.failed += 1;
            }
        }
    }

    info!(
        stage = stage_name,
        stored = summary.stored,
        already_present = summary.already_present,
        empty = summary.empty,
        failed = summary.failed,
        rejected = summary.rejected,
        "stage batch completed"
    );
    summary
}
