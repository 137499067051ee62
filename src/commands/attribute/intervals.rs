use std::collections::BTreeMap;

use crate::model::{CandidateSpan, EntityBuckets, EntityRecord, OTHERS_BUCKET};

#[derive(Debug, Clone, Default)]
pub struct OwnershipPartition {
    anchors: Vec<(i64, String)>,
}

impl OwnershipPartition {
    pub fn from_entities(entities: &[EntityRecord]) -> Self {
        let mut located = entities
            .iter()
            .filter(|entity| entity.is_located())
            .collect::<Vec<&EntityRecord>>();
        located.sort_by(|a, b| a.text_offset.cmp(&b.text_offset).then(a.ordinal.cmp(&b.ordinal)));

        Self {
            anchors: located
                .into_iter()
                .map(|entity| (entity.text_offset, entity.name.clone()))
                .collect(),
        }
    }

    pub fn owner_of(&self, offset: i64) -> &str {
        if offset < 0 {
            return OTHERS_BUCKET;
        }
        let owners = self.anchors.partition_point(|(start, _)| *start <= offset);
        match owners.checked_sub(1) {
            Some(position) => &self.anchors[position].1,
            None => OTHERS_BUCKET,
        }
    }

    pub fn attribute(&self, spans: Vec<CandidateSpan>) -> EntityBuckets {
        let mut buckets = BTreeMap::<String, Vec<CandidateSpan>>::new();
        for span in spans {
            buckets
                .entry(self.owner_of(span.offset).to_string())
                .or_default()
                .push(span);
        }
        buckets
    }
}
