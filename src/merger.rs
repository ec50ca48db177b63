//! Merging corpus rows with annotations and appending them to the dataset file.

use serde_json::{Map, Value};
use std::io::Write;
use tracing::{debug, error};

use crate::data::{AnnotationRecord, MergedRecord, SourceRecord};
use crate::fields::DATASET_VERSION;
use crate::types::DatasetVersion;

/// Merge corpus rows with their annotations and append each result to the
/// primary dataset as one JSON line.
///
/// A write failure is logged once and persistence stops for the rest of the
/// run; merging itself never fails.
pub struct RecordMerger<W: Write> {
    version: DatasetVersion,
    sink: Option<W>,
    written: usize,
    write_error: Option<String>,
}

impl<W: Write> RecordMerger<W> {
    /// Merge with `version` stamped on every record and persist into `sink`.
    pub fn new(version: impl Into<DatasetVersion>, sink: W) -> Self {
        Self {
            version: version.into(),
            sink: Some(sink),
            written: 0,
            write_error: None,
        }
    }

    /// Merge without persisting anything (the dataset file could not be opened).
    pub fn detached(version: impl Into<DatasetVersion>, reason: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            sink: None,
            written: 0,
            write_error: Some(reason.into()),
        }
    }

    /// Union of source and annotation fields, annotation winning, plus the
    /// version stamp. Persisted before it is returned.
    pub fn merge(&mut self, source: SourceRecord, annotation: &AnnotationRecord) -> MergedRecord {
        debug!(
            "[healthchat:merge] merging corpus row '{}' with its annotation",
            source.id
        );
        let merged = MergedRecord::new(merge_fields(source.fields, annotation, &self.version));
        self.persist(&merged);
        merged
    }

    fn persist(&mut self, merged: &MergedRecord) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let result = merged
            .to_json_line()
            .map_err(|err| err.to_string())
            .and_then(|line| {
                writeln!(sink, "{line}")
                    .and_then(|_| sink.flush())
                    .map_err(|err| err.to_string())
            });
        match result {
            Ok(()) => self.written += 1,
            Err(reason) => {
                error!(
                    "[healthchat:merge] could not append '{}' to the dataset file, persistence disabled: {reason}",
                    merged.conversation_id()
                );
                self.sink = None;
                self.write_error = Some(reason);
            }
        }
    }

    /// Records persisted so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Why persistence stopped, if it did.
    pub fn write_error(&self) -> Option<&str> {
        self.write_error.as_deref()
    }

    /// Release the sink (flushed after every record).
    #[cfg(test)]
    pub(crate) fn into_sink(self) -> Option<W> {
        self.sink
    }
}

fn merge_fields(
    mut fields: Map<String, Value>,
    annotation: &AnnotationRecord,
    version: &str,
) -> Map<String, Value> {
    for (key, value) in &annotation.fields {
        fields.insert(key.clone(), value.clone());
    }
    fields.insert(
        DATASET_VERSION.as_str().to_string(),
        Value::String(version.to_string()),
    );
    fields
}
