use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::pipeline::manifest_dir;
use crate::config::PipelineConfig;
use crate::store::RecordStore;

pub fn run(config: &PipelineConfig, args: StatusArgs) -> Result<()> {
    let db_path = &config.store.db_path;
    info!(path = %db_path.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "record store missing; no stage has run yet");
        return Ok(());
    }
    let store = RecordStore::open(db_path)?;

    for (stage, collection) in stage_collections(config) {
        let identifiers = store.count(collection)?;
        info!(stage, collection, identifiers, "collection status");
    }

    for document_id in &args.ids {
        let presence = stage_presence(&store, config, document_id.trim())?;
        let completed = presence
            .iter()
            .filter(|(_, present)| *present)
            .map(|(stage, _)| *stage)
            .collect::<Vec<&str>>();
        info!(
            document_id = %document_id,
            completed = %completed.join(","),
            complete = completed.len() == presence.len(),
            "identifier status"
        );
    }

    match latest_run_manifest(&manifest_dir(db_path))? {
        Some(path) => {
            let raw = fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let manifest: serde_json::Value = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            info!(
                path = %path.display(),
                run_id = %manifest["run_id"].as_str().unwrap_or_default(),
                status = %manifest["status"].as_str().unwrap_or_default(),
                updated_at = %manifest["updated_at"].as_str().unwrap_or_default(),
                failed = manifest["summary"]["failed"].as_u64().unwrap_or(0),
                "latest run manifest"
            );
        }
        None => warn!("no run manifest found"),
    }

    Ok(())
}

fn stage_collections(config: &PipelineConfig) -> [(&'static str, &str); 4] {
    [
        ("resolve", config.store.entities_collection.as_str()),
        ("classify", config.store.classes_collection.as_str()),
        ("attribute", config.store.spans_collection.as_str()),
        ("assign", config.store.values_collection.as_str()),
    ]
}

pub fn stage_presence(
    store: &RecordStore,
    config: &PipelineConfig,
    document_id: &str,
) -> Result<Vec<(&'static str, bool)>> {
    stage_collections(config)
        .into_iter()
        .map(|(stage, collection)| Ok((stage, store.exists(collection, document_id)?)))
        .collect()
}

fn latest_run_manifest(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut manifests = Vec::<PathBuf>::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("run_") && name.ends_with(".json"));
        if is_run_manifest {
            manifests.push(path);
        }
    }
    manifests.sort();
    Ok(manifests.pop())
}
