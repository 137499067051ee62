use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const NOT_LOCATED: i64 = -1;

pub const OTHERS_BUCKET: &str = "others";

pub const NOT_VALID: &str = "NOT_VALID";

pub const NONE_ANSWER: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldLevel {
    Fund,
    Class,
}

impl FieldLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fund => "fund",
            Self::Class => "class",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadType {
    Both,
    Frontend,
    Backend,
    None,
}

impl LoadType {
    pub fn from_flags(frontend: bool, backend: bool) -> Self {
        match (frontend, backend) {
            (true, true) => Self::Both,
            (true, false) => Self::Frontend,
            (false, true) => Self::Backend,
            (false, false) => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Both => "Both",
            Self::Frontend => "Frontend",
            Self::Backend => "Backend",
            Self::None => "None",
        }
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub ordinal: usize,
    pub text_offset: i64,
    pub markup_offset: i64,
}

impl EntityRecord {
    pub fn is_located(&self) -> bool {
        self.text_offset >= 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStageRecord {
    pub document_id: String,
    pub source_hash: String,
    pub created_at: String,
    pub entities: Vec<EntityRecord>,
}

impl EntityStageRecord {
    pub fn ordered_names(&self) -> Vec<String> {
        let mut entities = self.entities.iter().collect::<Vec<&EntityRecord>>();
        entities.sort_by_key(|entity| (!entity.is_located(), entity.text_offset, entity.ordinal));
        entities.into_iter().map(|entity| entity.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassStageRecord {
    pub document_id: String,
    pub entity: String,
    pub table_index: usize,
    pub created_at: String,
    pub load_type: BTreeMap<String, LoadType>,
    pub field_list: BTreeMap<String, Vec<String>>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpan {
    pub text: String,
    pub offset: i64,
}

impl CandidateSpan {
    pub fn new(text: impl Into<String>, offset: i64) -> Self {
        Self {
            text: text.into(),
            offset,
        }
    }
}

pub type EntityBuckets = BTreeMap<String, Vec<CandidateSpan>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanStageRecord {
    pub document_id: String,
    pub source_hash: String,
    pub created_at: String,
    pub fields: BTreeMap<String, EntityBuckets>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedValue {
    pub document_id: String,
    pub field: String,
    pub entity: String,
    pub value: String,
    pub ground_truth: String,
    pub evidence: String,
}
