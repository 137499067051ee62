mod names;
mod offsets;
mod run;
#[cfg(test)]
mod tests;

pub use names::load_entity_prompt;
pub use offsets::OffsetLocator;
pub use run::{EntityResolver, run};

use names::*;
use offsets::*;
