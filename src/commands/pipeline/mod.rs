mod manifest;
mod run;

pub use manifest::{DocumentProgress, RunManifest, StageStep, manifest_dir};
pub use run::{StageChain, run};

use manifest::*;
