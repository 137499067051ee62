use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::{FieldCatalog, OwnershipPartition, extract_field_spans, filter_subsumed};
use crate::cli::AttributeArgs;
use crate::commands::{StageOutcome, run_batch};
use crate::config::PipelineConfig;
use crate::document::{Document, DocumentSource, HttpDocumentSource, SectionIndex, fetch_document};
use crate::model::{EntityBuckets, EntityStageRecord, SpanStageRecord};
use crate::store::RecordStore;
use crate::util::now_utc_string;

pub fn run(config: &PipelineConfig, args: AttributeArgs) -> Result<()> {
    let store = RecordStore::open(&config.store.db_path)?;
    let source = HttpDocumentSource::from_pipeline(config)?;
    let catalog = active_catalog(config, &args.fields)?;
    let attributor = SpanAttributor {
        config,
        store: &store,
        source: &source,
        catalog: &catalog,
    };

    info!(
        ids = args.stage.ids.len(),
        fields = catalog.fields().len(),
        force = args.stage.force,
        "starting span attribution"
    );
    run_batch("attribute", &args.stage.ids, |document_id| {
        attributor.attribute(document_id, args.stage.force)
    });
    Ok(())
}

pub fn active_catalog(config: &PipelineConfig, overrides: &[String]) -> Result<FieldCatalog> {
    let names = if overrides.is_empty() {
        &config.pipeline.fields
    } else {
        overrides
    };
    FieldCatalog::builtin()?.select(names)
}

pub struct SpanAttributor<'a> {
    pub config: &'a PipelineConfig,
    pub store: &'a RecordStore,
    pub source: &'a dyn DocumentSource,
    pub catalog: &'a FieldCatalog,
}

impl SpanAttributor<'_> {
    pub fn attribute(&self, document_id: &str, force: bool) -> Result<StageOutcome> {
        let collection = &self.config.store.spans_collection;
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

        let partition = OwnershipPartition::from_entities(&entities.entities);
        let fields = attribute_document(&document, self.catalog, &partition);
        let record = SpanStageRecord {
            document_id: document_id.to_string(),
            source_hash: document.source_hash.clone(),
            created_at: now_utc_string(),
            fields,
        };
        self.store.insert_one(collection, document_id, &record)?;

        info!(document_id, fields = record.fields.len(), "attributed spans stored");
        Ok(StageOutcome::Stored)
    }
}

pub fn attribute_document(
    document: &Document,
    catalog: &FieldCatalog,
    partition: &OwnershipPartition,
) -> BTreeMap<String, EntityBuckets> {
    let index = SectionIndex::from_html(&document.parse());
    debug!(document_id = %document.id, sections = index.total(), "section index built");

    catalog
        .fields()
        .iter()
        .map(|field| {
            let extracted = extract_field_spans(&index, &document.visible, field);
            let kept = filter_subsumed(&extracted);
            debug!(
                document_id = %document.id,
                field = %field.name,
                group = %field.group,
                level = field.level.as_str(),
                extracted = extracted.len(),
                kept = kept.len(),
                "field spans filtered"
            );
            (field.name.clone(), partition.attribute(kept))
        })
        .collect()
}
