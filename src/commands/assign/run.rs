use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::{
    ALL_CLASSES, GroundTruthTable, MAX_PROMPT_EXAMPLES, PrototypeClassifier, ValuePolicy,
    append_report, apply_keyword_rule, closest_answer, extract_answers, nearest_value,
    parse_amount, policy_for, rank_paragraphs,
};
use crate::cli::{AssignArgs, RelevanceMode};
use crate::commands::attribute::FieldCatalog;
use crate::commands::{StageOutcome, run_batch};
use crate::config::PipelineConfig;
use crate::model::{
    AssignedValue, CandidateSpan, ClassStageRecord, EntityBuckets, FieldLevel, NONE_ANSWER,
    NOT_VALID, OTHERS_BUCKET, SpanStageRecord,
};
use crate::services::{
    ChatCompletionClient, Embedder, ModelRole, PassthroughClassifier, RelevanceClassifier,
    TextGenerator, build_embedder,
};
use crate::store::RecordStore;

pub fn run(config: &PipelineConfig, args: AssignArgs) -> Result<()> {
    let store = RecordStore::open(&config.store.db_path)?;
    let generator = ChatCompletionClient::new(&config.generation, ModelRole::ValueExtraction)?;
    let embedder = build_embedder(&config.embedding)?;
    let ground_truth = GroundTruthTable::load(config.pipeline.ground_truth_path.as_deref())?;
    let catalog = FieldCatalog::builtin()?;
    let classifier = relevance_classifier(args.relevance, &ground_truth, embedder.as_ref());
    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| config.pipeline.report_path.clone());

    let assigner = ValueAssigner {
        config,
        store: &store,
        generator: &generator,
        embedder: embedder.as_ref(),
        classifier: classifier.as_ref(),
        ground_truth: &ground_truth,
        catalog: &catalog,
        report_path: &report_path,
    };

    info!(
        ids = args.stage.ids.len(),
        relevance = args.relevance.as_str(),
        embedder = embedder.name(),
        ground_truth_rows = ground_truth.len(),
        report = %report_path.display(),
        "starting value assignment"
    );
    run_batch("assign", &args.stage.ids, |document_id| {
        assigner.assign(document_id, args.stage.force)
    });
    Ok(())
}

pub fn relevance_classifier<'a>(
    mode: RelevanceMode,
    ground_truth: &'a GroundTruthTable,
    embedder: &'a dyn Embedder,
) -> Box<dyn RelevanceClassifier + 'a> {
    match mode {
        RelevanceMode::Prototype => Box::new(PrototypeClassifier::new(ground_truth, embedder)),
        RelevanceMode::Passthrough => Box::new(PassthroughClassifier),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub value: String,
    pub ground_truth: String,
    pub evidence: String,
}

pub struct ValueAssigner<'a> {
    pub config: &'a PipelineConfig,
    pub store: &'a RecordStore,
    pub generator: &'a dyn TextGenerator,
    pub embedder: &'a dyn Embedder,
    pub classifier: &'a dyn RelevanceClassifier,
    pub ground_truth: &'a GroundTruthTable,
    pub catalog: &'a FieldCatalog,
    pub report_path: &'a Path,
}

impl ValueAssigner<'_> {
    pub fn assign(&self, document_id: &str, force: bool) -> Result<StageOutcome> {
        let collection = &self.config.store.values_collection;
        if self.store.exists(collection, document_id)? {
            if !force {
                return Ok(StageOutcome::AlreadyPresent);
            }
            self.store.delete(collection, document_id)?;
        }

        let classes = self
            .store
            .find_all::<ClassStageRecord>(&self.config.store.classes_collection, document_id)?;
        if classes.is_empty() {
            warn!(document_id, "no class records; run classify first");
            return Ok(StageOutcome::Empty);
        }
        let Some(spans) = self
            .store
            .find_one::<SpanStageRecord>(&self.config.store.spans_collection, document_id)?
        else {
            warn!(document_id, "no span record; run attribute first");
            return Ok(StageOutcome::Empty);
        };

        let rows = self.assign_document(document_id, &classes, &spans)?;
        if rows.is_empty() {
            warn!(document_id, "no values assigned");
            return Ok(StageOutcome::Empty);
        }

        self.store.insert_many(collection, document_id, &rows)?;
        append_report(self.report_path, &rows)?;
        info!(document_id, rows = rows.len(), "values stored and reported");
        Ok(StageOutcome::Stored)
    }

    pub fn assign_document(
        &self,
        document_id: &str,
        classes: &[ClassStageRecord],
        spans: &SpanStageRecord,
    ) -> Result<Vec<AssignedValue>> {
        let mut rows = Vec::<AssignedValue>::new();

        for record in classes {
            let mut fund_fields_done = HashSet::<&str>::new();

            for (class_name, fields) in &record.field_list {
                let mut class_fields_done = HashSet::<&str>::new();

                for field in fields {
                    if !class_fields_done.insert(field.as_str()) {
                        continue;
                    }
                    let Some(spec) = self.catalog.get(field) else {
                        warn!(document_id, field = %field, "field not in catalog; skipping");
                        continue;
                    };
                    let Some(buckets) = spans.fields.get(field) else {
                        debug!(document_id, field = %field, "no spans extracted for field");
                        continue;
                    };
                    let candidates = spans_for_entity(buckets, &record.entity);
                    if candidates.is_empty() {
                        debug!(document_id, field = %field, entity = %record.entity, "no spans for entity");
                        continue;
                    }

                    let (entity, scope) = match spec.level {
                        FieldLevel::Fund => {
                            if !fund_fields_done.insert(field.as_str()) {
                                continue;
                            }
                            (record.entity.clone(), ALL_CLASSES)
                        }
                        FieldLevel::Class => {
                            (format!("{} / {class_name}", record.entity), class_name.as_str())
                        }
                    };

                    let assignment = self.assign_field(document_id, field, scope, candidates)?;
                    debug!(
                        document_id,
                        field = %field,
                        entity = %entity,
                        value = %assignment.value,
                        "value assigned"
                    );
                    rows.push(AssignedValue {
                        document_id: document_id.to_string(),
                        field: field.clone(),
                        entity,
                        value: assignment.value,
                        ground_truth: assignment.ground_truth,
                        evidence: assignment.evidence,
                    });
                }
            }
        }

        Ok(rows)
    }

    pub fn assign_field(
        &self,
        document_id: &str,
        field: &str,
        class_name: &str,
        candidates: &[CandidateSpan],
    ) -> Result<Assignment> {
        let paragraphs = candidates
            .iter()
            .map(|span| span.text.clone())
            .collect::<Vec<String>>();
        let ranked = rank_paragraphs(
            &paragraphs,
            field,
            self.classifier,
            self.config.pipeline.relevance_top_k,
        );
        let ground_truth = self
            .ground_truth
            .reference_value(document_id, field, class_name);

        let policy = policy_for(field);
        if let ValuePolicy::Keyword(rule) = policy {
            let outcome = apply_keyword_rule(rule, &ranked);
            return Ok(Assignment {
                value: outcome.value,
                ground_truth,
                evidence: outcome.evidence,
            });
        }

        let examples = self
            .ground_truth
            .distinct_examples(field, class_name, MAX_PROMPT_EXAMPLES);
        let answers = extract_answers(self.generator, &ranked, field, class_name, &examples);
        let sentences = self.ground_truth.example_sentences(field, class_name);
        let evidence = closest_answer(&answers, &sentences, self.embedder)?;

        let value = match policy {
            ValuePolicy::AnswerAsValue if evidence == NONE_ANSWER => NOT_VALID.to_string(),
            ValuePolicy::AnswerAsValue => evidence.clone(),
            ValuePolicy::Amount => parse_amount(&evidence),
            _ => {
                let groups = self.ground_truth.value_groups(field, class_name);
                nearest_value(&evidence, &groups, self.embedder)?
                    .unwrap_or_else(|| NOT_VALID.to_string())
            }
        };

        Ok(Assignment {
            value,
            ground_truth,
            evidence,
        })
    }
}

fn spans_for_entity<'b>(buckets: &'b EntityBuckets, entity: &str) -> &'b [CandidateSpan] {
    match buckets.get(entity) {
        Some(spans) if !spans.is_empty() => spans.as_slice(),
        _ => buckets
            .get(OTHERS_BUCKET)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
    }
}
