use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "prospectus-extract",
    version,
    about = "Staged fact extraction from mutual-fund prospectus documents"
)]
pub struct Cli {
    /// TOML pipeline configuration; built-in defaults are used when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage 1: discover fund names and locate their offsets.
    Resolve(StageArgs),
    /// Stage 2: classify share classes by load type from fee tables.
    Classify(StageArgs),
    /// Stage 3: extract candidate passages per field and attribute them to funds.
    Attribute(AttributeArgs),
    /// Stage 4: assign canonical field values from attributed passages.
    Assign(AssignArgs),
    /// Run all four stages in order for each identifier.
    Run(RunArgs),
    /// Report stored records per stage and the latest run manifest.
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StageArgs {
    #[arg(long = "id", required = true)]
    pub ids: Vec<String>,

    /// Recompute even when a record for the identifier already exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AttributeArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    /// Restrict extraction to these fields (overrides the configured set).
    #[arg(long = "field")]
    pub fields: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AssignArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = RelevanceMode::Prototype)]
    pub relevance: RelevanceMode,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = RelevanceMode::Prototype)]
    pub relevance: RelevanceMode,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RelevanceMode {
    /// Score paragraphs by similarity to the field's ground-truth sentences.
    Prototype,
    /// Keep paragraphs in document order without scoring.
    Passthrough,
}

impl RelevanceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prototype => "prototype",
            Self::Passthrough => "passthrough",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Also report which stages have stored records for these identifiers.
    #[arg(long = "id")]
    pub ids: Vec<String>,
}
