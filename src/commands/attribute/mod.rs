mod catalog;
mod dedup;
mod extract;
mod intervals;
mod run;

pub use catalog::{Field, FieldCatalog};
pub use dedup::filter_subsumed;
pub use intervals::OwnershipPartition;
pub use run::{SpanAttributor, active_catalog, attribute_document, run};

use extract::*;
