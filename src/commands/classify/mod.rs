mod loads;
mod run;
mod tables;
#[cfg(test)]
mod tests;

pub use run::{LoadClassifier, classify_document, run};

use loads::*;
use tables::*;
