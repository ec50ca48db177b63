//! Annotation lookup and the per-source sets of conversation ids still to find.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::data::AnnotationRecord;
use crate::errors::RebuildError;
use crate::source::RowSource;
use crate::types::{ConversationId, SourceId};

/// Ids still to be found, per source, in annotation order.
///
/// Sets are handed to the matcher by value (`take`) and the remaining ids are
/// handed back (`restore`). Nothing else removes ids, and nothing adds them
/// after the index is built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetSets {
    by_source: IndexMap<SourceId, IndexSet<ConversationId>>,
}

impl TargetSets {
    /// Ids currently outstanding for `source_id`.
    #[cfg(test)]
    pub(crate) fn get(&self, source_id: &str) -> Option<&IndexSet<ConversationId>> {
        self.by_source.get(source_id)
    }

    /// Move the outstanding set for `source_id` out for scanning.
    pub fn take(&mut self, source_id: &str) -> IndexSet<ConversationId> {
        self.by_source
            .get_mut(source_id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Put back what a scan left unmatched.
    pub fn restore(&mut self, source_id: &str, remaining: IndexSet<ConversationId>) {
        if let Some(slot) = self.by_source.get_mut(source_id) {
            *slot = remaining;
        } else if !remaining.is_empty() {
            self.by_source.insert(source_id.to_string(), remaining);
        }
    }

    /// Number of outstanding ids across all sources.
    pub fn total(&self) -> usize {
        self.by_source.values().map(IndexSet::len).sum()
    }

    /// Sources with their outstanding ids, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&SourceId, &IndexSet<ConversationId>)> {
        self.by_source.iter()
    }

    fn insert(&mut self, source_id: &str, id: ConversationId) {
        self.by_source
            .entry(source_id.to_string())
            .or_default()
            .insert(id);
    }

    fn remove(&mut self, source_id: &str, id: &str) {
        if let Some(ids) = self.by_source.get_mut(source_id) {
            ids.shift_remove(id);
        }
    }
}

/// Annotation lookup by conversation id.
#[derive(Clone, Debug, Default)]
pub struct AnnotationIndex {
    by_id: HashMap<ConversationId, AnnotationRecord>,
}

impl AnnotationIndex {
    /// Index raw annotation rows, keeping those with an id and a known source.
    ///
    /// A repeated id replaces the earlier row; if its source changed, the id
    /// moves to the new source's set.
    pub fn build<I>(rows: I, known_sources: &[SourceId]) -> (Self, TargetSets)
    where
        I: IntoIterator<Item = Value>,
    {
        let mut index = Self::default();
        let mut targets = TargetSets::default();
        let mut dropped = 0usize;

        for row in rows {
            let record = match row {
                Value::Object(fields) => AnnotationRecord::from_fields(fields),
                _ => None,
            };
            let Some(record) = record.filter(|record| known_sources.contains(&record.source))
            else {
                dropped += 1;
                continue;
            };
            let id = record.conversation_id.clone();
            let source = record.source.clone();
            if let Some(previous) = index.by_id.insert(id.clone(), record) {
                debug!("[healthchat:annotations] duplicate annotation for '{id}', keeping the later row");
                if previous.source != source {
                    targets.remove(&previous.source, &id);
                }
            }
            targets.insert(&source, id);
        }

        if dropped > 0 {
            debug!(
                "[healthchat:annotations] dropped {dropped} annotation row(s) without an id or known source"
            );
        }
        (index, targets)
    }

    /// Annotation for `id`, if indexed.
    pub fn get(&self, id: &str) -> Option<&AnnotationRecord> {
        self.by_id.get(id)
    }

    /// Number of indexed annotations.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when no annotation survived filtering.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Read every annotation row from `source` and index it.
///
/// Any failure to open or decode the source is fatal: without annotations
/// there is nothing to rebuild.
pub fn load_annotations(
    source: &dyn RowSource,
    known_sources: &[SourceId],
) -> Result<(AnnotationIndex, TargetSets), RebuildError> {
    info!(
        "[healthchat:annotations] loading master annotations from {}",
        source.id()
    );
    let rows = source
        .rows()
        .map_err(|err| RebuildError::Annotations(err.to_string()))?
        .collect::<Result<Vec<Value>, RebuildError>>()
        .map_err(|err| RebuildError::Annotations(err.to_string()))?;

    let (index, targets) = AnnotationIndex::build(rows, known_sources);
    for (source_id, ids) in targets.iter() {
        info!(
            "[healthchat:annotations] found {} target conversation(s) for dataset '{}'",
            ids.len(),
            source_id
        );
    }
    Ok((index, targets))
}
