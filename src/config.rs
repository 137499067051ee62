use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_SOURCE_BASE_URL: &str =
    "https://prospectus-express.broadridge.com/getdocument.asp?rfid=";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub generation: GenerationConfig,
    pub embedding: EmbeddingConfig,
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl SourceConfig {
    pub fn document_url(&self, document_id: &str) -> String {
        format!("{}{}", self.base_url, document_id)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOURCE_BASE_URL.to_string(),
            timeout_secs: 60,
            user_agent: concat!("prospectus-extract/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub entities_collection: String,
    pub classes_collection: String,
    pub spans_collection: String,
    pub values_collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".cache/prospectus/extract.sqlite"),
            entities_collection: "stage1_entities".to_string(),
            classes_collection: "stage2_classes".to_string(),
            spans_collection: "stage3_spans".to_string(),
            values_collection: "stage4_values".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub api_key_env: String,
    pub entity_model: String,
    pub extraction_model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub timeout_secs: u64,
    pub post_call_delay_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            entity_model: "gpt-4".to_string(),
            extraction_model: "gpt-4".to_string(),
            temperature: 0.5,
            top_p: 1.0,
            max_tokens: 750,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            timeout_secs: 120,
            post_call_delay_ms: 1500,
        }
    }
}

impl GenerationConfig {
    pub fn post_call_delay(&self) -> Duration {
        Duration::from_millis(self.post_call_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Local,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub dimensions: usize,
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Local,
            dimensions: crate::semantic::DEFAULT_EMBEDDING_DIM,
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub fields: Vec<String>,
    pub fund_level_fields: Vec<String>,
    pub frontend_load_fields: Vec<String>,
    pub backend_load_fields: Vec<String>,
    pub both_load_fields: Vec<String>,
    pub entity_prompt_path: Option<PathBuf>,
    pub ground_truth_path: Option<PathBuf>,
    pub report_path: PathBuf,
    pub relevance_top_k: usize,
    pub entity_prompt_max_elements: usize,
    pub entity_prompt_max_chars: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            fields: to_strings(&[
                "NONDIVERSIFIED",
                "INCOME_FREQUENCY",
                "NAV_REINSTATEMENT_ALLOWED",
                "OBJECT_GOAL_TYPE",
                "INITPURCHASE_AMOUNT",
                "SUBPURCHASE_AMOUNT",
                "AUDITOR",
            ]),
            fund_level_fields: to_strings(&["NONDIVERSIFIED", "INCOME_FREQUENCY", "AUDITOR"]),
            frontend_load_fields: to_strings(&["INITPURCHASE_AMOUNT", "SUBPURCHASE_AMOUNT"]),
            backend_load_fields: to_strings(&["NAV_REINSTATEMENT_ALLOWED"]),
            both_load_fields: to_strings(&["OBJECT_GOAL_TYPE"]),
            entity_prompt_path: None,
            ground_truth_path: None,
            report_path: PathBuf::from("final-output.csv"),
            relevance_top_k: 10,
            entity_prompt_max_elements: 50,
            entity_prompt_max_chars: 6000,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl PipelineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("no config file given; using built-in defaults");
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        info!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults_for_missing_sections() {
        let raw = r#"
            [store]
            db_path = "/tmp/custom.sqlite"

            [generation]
            post_call_delay_ms = 0
        "#;

        let config = PipelineConfig::from_toml_str(raw).expect("config should parse");
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/custom.sqlite"));
        assert_eq!(config.store.spans_collection, "stage3_spans");
        assert_eq!(config.generation.post_call_delay(), Duration::ZERO);
        assert_eq!(config.generation.max_tokens, 750);
        assert_eq!(config.pipeline.relevance_top_k, 10);
        assert!(config.pipeline.fields.iter().any(|field| field == "AUDITOR"));
    }

    #[test]
    fn document_url_appends_identifier() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.source.document_url("2854858"),
            "https://prospectus-express.broadridge.com/getdocument.asp?rfid=2854858"
        );
    }

    #[test]
    fn embedding_backend_defaults_to_local_and_accepts_http() {
        assert_eq!(PipelineConfig::default().embedding.backend, EmbeddingBackend::Local);

        let raw = r#"
            [embedding]
            backend = "http"
            model = "all-mpnet-base-v2"
        "#;
        let config = PipelineConfig::from_toml_str(raw).expect("config should parse");
        assert_eq!(config.embedding.backend, EmbeddingBackend::Http);
        assert_eq!(config.embedding.model, "all-mpnet-base-v2");
        assert_eq!(config.embedding.dimensions, crate::semantic::DEFAULT_EMBEDDING_DIM);
    }
}
