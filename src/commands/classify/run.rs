use anyhow::Result;
use scraper::Html;
use tracing::{debug, info, warn};

use super::{classify_loads, extract_fee_tables, field_list_for, read_class_loads};
use crate::cli::StageArgs;
use crate::commands::{StageOutcome, run_batch};
use crate::config::{PipelineConfig, PipelineSection};
use crate::document::{DocumentSource, HttpDocumentSource, fetch_document};
use crate::model::{ClassStageRecord, EntityStageRecord};
use crate::store::RecordStore;
use crate::util::now_utc_string;

pub fn run(config: &PipelineConfig, args: StageArgs) -> Result<()> {
    let store = RecordStore::open(&config.store.db_path)?;
    let source = HttpDocumentSource::from_pipeline(config)?;
    let classifier = LoadClassifier {
        config,
        store: &store,
        source: &source,
    };

    info!(ids = args.ids.len(), force = args.force, "starting class load classification");
    run_batch("classify", &args.ids, |document_id| {
        classifier.classify(document_id, args.force)
    });
    Ok(())
}

pub struct LoadClassifier<'a> {
    pub config: &'a PipelineConfig,
    pub store: &'a RecordStore,
    pub source: &'a dyn DocumentSource,
}

impl LoadClassifier<'_> {
    pub fn classify(&self, document_id: &str, force: bool) -> Result<StageOutcome> {
        let collection = &self.config.store.classes_collection;
        if self.store.exists(collection, document_id)? {
            if !force {
                return Ok(StageOutcome::AlreadyPresent);
            }
            self.store.delete(collection, document_id)?;
        }

        let Some(entities) = self
            .store
            .find_one::<EntityStageRecord>(&self.config.store.entities_collection, document_id)?
        else {
            warn!(document_id, "no entity record; run resolve first");
            return Ok(StageOutcome::Empty);
        };

        let Some(document) = fetch_document(self.source, document_id) else {
            return Ok(StageOutcome::Empty);
        };

        let records = classify_document(
            document_id,
            &document.parse(),
            &entities.ordered_names(),
            &self.config.pipeline,
        )?;
        if records.is_empty() {
            return Ok(StageOutcome::Empty);
        }

        self.store.insert_many(collection, document_id, &records)?;
        info!(document_id, funds = records.len(), "class loads stored");
        Ok(StageOutcome::Stored)
    }
}

pub fn classify_document(
    document_id: &str,
    html: &Html,
    ordered_entities: &[String],
    settings: &PipelineSection,
) -> Result<Vec<ClassStageRecord>> {
    let tables = extract_fee_tables(html)?;
    if tables.is_empty() {
        warn!(document_id, "no shareholder fee tables found");
        return Ok(Vec::new());
    }

    let mut warnings = Vec::<String>::new();
    if tables.len() != ordered_entities.len() {
        let message = format!(
            "found {} fee tables for {} entities; pairing the first {}",
            tables.len(),
            ordered_entities.len(),
            tables.len().min(ordered_entities.len())
        );
        warn!(document_id, "{message}");
        warnings.push(message);
    }

    let created_at = now_utc_string();
    let records = tables
        .iter()
        .zip(ordered_entities)
        .enumerate()
        .map(|(table_index, (table, entity))| {
            let reading = read_class_loads(table);
            let load_type = classify_loads(&reading);
            let skipped = reading.classes.len().saturating_sub(load_type.len());
            for (class, load) in &load_type {
                debug!(document_id, entity = %entity, class = %class, load_type = %load, "class classified");
            }
            let mut entity_warnings = warnings.clone();
            if skipped > 0 {
                entity_warnings.push(format!(
                    "{skipped} classes lacked a front or back charge reading"
                ));
            }
            let field_list = load_type
                .iter()
                .map(|(class, load)| (class.clone(), field_list_for(*load, settings)))
                .collect();

            ClassStageRecord {
                document_id: document_id.to_string(),
                entity: entity.clone(),
                table_index,
                created_at: created_at.clone(),
                load_type,
                field_list,
                warnings: entity_warnings,
            }
        })
        .collect();

    Ok(records)
}
