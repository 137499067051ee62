use anyhow::Result;
use tracing::{info, warn};

use super::{OffsetLocator, discover_entity_names, load_entity_prompt, locate_entities};
use crate::cli::StageArgs;
use crate::commands::{StageOutcome, run_batch};
use crate::config::PipelineConfig;
use crate::document::{DocumentSource, HttpDocumentSource, fetch_document};
use crate::model::EntityStageRecord;
use crate::services::{ChatCompletionClient, ChatMessage, ModelRole, TextGenerator};
use crate::store::RecordStore;
use crate::util::now_utc_string;

pub fn run(config: &PipelineConfig, args: StageArgs) -> Result<()> {
    let store = RecordStore::open(&config.store.db_path)?;
    let source = HttpDocumentSource::from_pipeline(config)?;
    let generator = ChatCompletionClient::new(&config.generation, ModelRole::EntityDiscovery)?;
    let primer = load_entity_prompt(config.pipeline.entity_prompt_path.as_deref())?;
    let locator = OffsetLocator::new()?;

    let resolver = EntityResolver {
        config,
        store: &store,
        source: &source,
        generator: &generator,
        primer: &primer,
        locator: &locator,
    };

    info!(ids = args.ids.len(), force = args.force, "starting entity resolution");
    run_batch("resolve", &args.ids, |document_id| {
        resolver.resolve(document_id, args.force)
    });
    Ok(())
}

pub struct EntityResolver<'a> {
    pub config: &'a PipelineConfig,
    pub store: &'a RecordStore,
    pub source: &'a dyn DocumentSource,
    pub generator: &'a dyn TextGenerator,
    pub primer: &'a [ChatMessage],
    pub locator: &'a OffsetLocator,
}

impl EntityResolver<'_> {
    pub fn resolve(&self, document_id: &str, force: bool) -> Result<StageOutcome> {
        let collection = &self.config.store.entities_collection;
        if self.store.exists(collection, document_id)? {
            if !force {
                return Ok(StageOutcome::AlreadyPresent);
            }
            self.store.delete(collection, document_id)?;
        }

        let Some(document) = fetch_document(self.source, document_id) else {
            return Ok(StageOutcome::Empty);
        };

        let html = document.parse();
        let names =
            discover_entity_names(self.generator, self.primer, &html, &self.config.pipeline);
        if names.is_empty() {
            warn!(document_id, "no entity names discovered");
            return Ok(StageOutcome::Empty);
        }

        let entities = locate_entities(self.locator, &document, &names)?;
        let unlocated = entities.iter().filter(|entity| !entity.is_located()).count();
        if unlocated > 0 {
            warn!(document_id, unlocated, "some entities could not be located in visible text");
        }

        let record = EntityStageRecord {
            document_id: document_id.to_string(),
            source_hash: document.source_hash.clone(),
            created_at: now_utc_string(),
            entities,
        };
        self.store.insert_one(collection, document_id, &record)?;

        info!(
            document_id,
            entities = record.entities.len(),
            located = record.entities.len() - unlocated,
            "entities stored"
        );
        Ok(StageOutcome::Stored)
    }
}
