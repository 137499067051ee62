mod cli;
mod commands;
mod config;
mod document;
mod model;
mod semantic;
mod services;
mod store;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::PipelineConfig;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve(args) => commands::resolve::run(&config, args),
        Commands::Classify(args) => commands::classify::run(&config, args),
        Commands::Attribute(args) => commands::attribute::run(&config, args),
        Commands::Assign(args) => commands::assign::run(&config, args),
        Commands::Run(args) => commands::pipeline::run(&config, args),
        Commands::Status(args) => commands::status::run(&config, args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
