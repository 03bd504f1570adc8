use crate::error::Result;
use crate::model::{CollectionNamespace, TagRange};
use crate::plan::writer::CommandPlanSink;

/// Collects the tag range changes of one collection.
///
/// A removal and an addition of the very same range cancel out. On
/// [`finish`](Self::finish) the remaining removals are written before the
/// remaining additions.
#[derive(Debug)]
pub struct TagRangeCommandBuffer {
    namespace: CollectionNamespace,
    removes: Vec<TagRange>,
    adds: Vec<TagRange>,
}

impl TagRangeCommandBuffer {
    pub fn new(namespace: CollectionNamespace) -> Self {
        Self {
            namespace,
            removes: Vec::new(),
            adds: Vec::new(),
        }
    }

    pub fn remove_tag_range(&mut self, range: TagRange) {
        if let Some(pos) = self.adds.iter().position(|r| r == &range) {
            self.adds.remove(pos);
        } else {
            self.removes.push(range);
        }
    }

    pub fn add_tag_range(&mut self, range: TagRange) {
        if let Some(pos) = self.removes.iter().position(|r| r == &range) {
            self.removes.remove(pos);
        } else {
            self.adds.push(range);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removes.is_empty() && self.adds.is_empty()
    }

    pub fn finish(self, sink: &mut dyn CommandPlanSink) -> Result<()> {
        for range in &self.removes {
            sink.remove_tag_range(&self.namespace, &range.min, &range.max, &range.tag)?;
        }
        for range in &self.adds {
            sink.add_tag_range(&self.namespace, &range.min, &range.max, &range.tag)?;
        }
        Ok(())
    }
}
