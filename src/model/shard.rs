use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::identity::{ShardId, TagId};

/// A shard and the zone tags it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub id: ShardId,
    #[serde(default)]
    pub tags: BTreeSet<TagId>,
}

impl Shard {
    pub fn new<I, T>(id: impl Into<ShardId>, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TagId>,
    {
        Self {
            id: id.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn serves(&self, tag: &TagId) -> bool {
        self.tags.contains(tag)
    }
}
