use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use super::{DocumentProgress, MANIFEST_VERSION, RunManifest, manifest_dir};
use crate::cli::RunArgs;
use crate::commands::assign::{GroundTruthTable, ValueAssigner, relevance_classifier};
use crate::commands::attribute::{FieldCatalog, SpanAttributor, active_catalog};
use crate::commands::classify::LoadClassifier;
use crate::commands::resolve::{EntityResolver, OffsetLocator, load_entity_prompt};
use crate::commands::{StageOutcome, run_batch};
use crate::config::PipelineConfig;
use crate::document::HttpDocumentSource;
use crate::services::{ChatCompletionClient, ModelRole, build_embedder};
use crate::store::RecordStore;
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(config: &PipelineConfig, args: RunArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let store = RecordStore::open(&config.store.db_path)?;
    let source = HttpDocumentSource::from_pipeline(config)?;
    let discovery = ChatCompletionClient::new(&config.generation, ModelRole::EntityDiscovery)?;
    let extraction = ChatCompletionClient::new(&config.generation, ModelRole::ValueExtraction)?;
    let embedder = build_embedder(&config.embedding)?;
    let primer = load_entity_prompt(config.pipeline.entity_prompt_path.as_deref())?;
    let locator = OffsetLocator::new()?;
    let span_catalog = active_catalog(config, &[])?;
    let value_catalog = FieldCatalog::builtin()?;
    let ground_truth = GroundTruthTable::load(config.pipeline.ground_truth_path.as_deref())?;
    let classifier = relevance_classifier(args.relevance, &ground_truth, embedder.as_ref());
    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| config.pipeline.report_path.clone());

    let chain = StageChain {
        resolver: EntityResolver {
            config,
            store: &store,
            source: &source,
            generator: &discovery,
            primer: &primer,
            locator: &locator,
        },
        classifier: LoadClassifier {
            config,
            store: &store,
            source: &source,
        },
        attributor: SpanAttributor {
            config,
            store: &store,
            source: &source,
            catalog: &span_catalog,
        },
        assigner: ValueAssigner {
            config,
            store: &store,
            generator: &extraction,
            embedder: embedder.as_ref(),
            classifier: classifier.as_ref(),
            ground_truth: &ground_truth,
            catalog: &value_catalog,
            report_path: &report_path,
        },
    };

    info!(
        run_id = %run_id,
        ids = args.stage.ids.len(),
        force = args.stage.force,
        relevance = args.relevance.as_str(),
        embedder = embedder.name(),
        "starting pipeline run"
    );

    let mut documents = Vec::<DocumentProgress>::new();
    let summary = run_batch("run", &args.stage.ids, |document_id| {
        let mut progress = DocumentProgress::new(document_id);
        let result = chain.process(document_id, args.stage.force, &mut progress);
        if let Err(err) = &result {
            progress.failure = Some(format!("{err:#}"));
        }
        documents.push(progress);
        result
    });

    let manifest = RunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        status: RunManifest::status_for(&summary).to_string(),
        started_at,
        updated_at: now_utc_string(),
        force: args.stage.force,
        relevance: args.relevance.as_str().to_string(),
        db_path: config.store.db_path.display().to_string(),
        report_path: report_path.display().to_string(),
        summary,
        documents,
    };
    let manifest_path = manifest_dir(&config.store.db_path)
        .join(format!("run_{}.json", utc_compact_string(started_ts)));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), status = %manifest.status, "wrote run manifest");
    Ok(())
}

pub struct StageChain<'a> {
    pub resolver: EntityResolver<'a>,
    pub classifier: LoadClassifier<'a>,
    pub attributor: SpanAttributor<'a>,
    pub assigner: ValueAssigner<'a>,
}

impl StageChain<'_> {
    pub fn process(
        &self,
        document_id: &str,
        force: bool,
        progress: &mut DocumentProgress,
    ) -> Result<StageOutcome> {
        let stages: [(&str, &dyn Fn() -> Result<StageOutcome>); 4] = [
            ("resolve", &|| self.resolver.resolve(document_id, force)),
            ("classify", &|| self.classifier.classify(document_id, force)),
            ("attribute", &|| self.attributor.attribute(document_id, force)),
            ("assign", &|| self.assigner.assign(document_id, force)),
        ];

        for (stage, step) in stages {
            let outcome = step().with_context(|| format!("{stage} stage failed"))?;
            progress.record(stage, outcome);
            if outcome == StageOutcome::Empty {
                info!(document_id, stage, "stage produced nothing; skipping later stages");
                break;
            }
        }

        Ok(progress.overall())
    }
}
