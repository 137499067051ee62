mod extraction;
mod ground_truth;
mod relevance;
mod report;
mod rules;
mod run;
mod similarity;

pub use ground_truth::{GroundTruthRow, GroundTruthTable};
pub use run::{Assignment, ValueAssigner, relevance_classifier, run};

use extraction::*;
use ground_truth::*;
use relevance::*;
use report::*;
use rules::*;
use similarity::*;
