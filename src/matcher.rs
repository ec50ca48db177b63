//! Streaming id matcher: scans one corpus for its outstanding conversation ids.

use indexmap::IndexSet;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::annotations::AnnotationIndex;
use crate::constants::scan::PROGRESS_INTERVAL_MS;
use crate::data::{AnnotationRecord, SourceRecord};
use crate::errors::RebuildError;
use crate::fields::value_to_id;
use crate::source::RowSource;
use crate::types::ConversationId;

/// Result of scanning one source for its outstanding ids.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Ids requested when the scan started.
    pub requested: usize,
    /// Ids matched (each at most once).
    pub matched: usize,
    /// Rows pulled from the stream.
    pub scanned: usize,
    /// Rows skipped because they could not be decoded.
    pub skipped: usize,
    /// Ids never seen, in annotation order.
    pub remaining: IndexSet<ConversationId>,
    /// Why the stream ended before all ids were found, if it failed.
    pub failure: Option<RebuildError>,
}

impl ScanOutcome {
    /// Outcome for a source that could not be opened: nothing scanned, every id outstanding.
    pub fn unopened(targets: IndexSet<ConversationId>, failure: RebuildError) -> Self {
        Self {
            requested: targets.len(),
            matched: 0,
            scanned: 0,
            skipped: 0,
            remaining: targets,
            failure: Some(failure),
        }
    }

    /// True when every requested id was found.
    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Scans corpus streams for annotated conversation ids.
pub struct StreamMatcher<'a> {
    index: &'a AnnotationIndex,
    progress_every: Duration,
}

impl<'a> StreamMatcher<'a> {
    /// Match against annotations in `index`.
    pub fn new(index: &'a AnnotationIndex) -> Self {
        Self {
            index,
            progress_every: Duration::from_millis(PROGRESS_INTERVAL_MS),
        }
    }

    /// Scan `source` for `targets`, keyed by `id_field`.
    ///
    /// Each hit is removed from the set before `on_match` runs, so a repeated
    /// id in the stream matches only once. The scan stops as soon as the set
    /// is empty. Undecodable rows are skipped; any other stream error ends the
    /// scan and is returned in `ScanOutcome::failure` with the remaining ids.
    pub fn scan<F>(
        &self,
        source: &dyn RowSource,
        id_field: &str,
        mut targets: IndexSet<ConversationId>,
        mut on_match: F,
    ) -> ScanOutcome
    where
        F: FnMut(SourceRecord, &AnnotationRecord),
    {
        let requested = targets.len();
        let mut outcome = ScanOutcome {
            requested,
            matched: 0,
            scanned: 0,
            skipped: 0,
            remaining: IndexSet::new(),
            failure: None,
        };
        if targets.is_empty() {
            return outcome;
        }

        info!(
            "[healthchat:scan] streaming and searching '{}' for {} conversation(s)",
            source.id(),
            requested
        );
        let mut rows = match source.rows() {
            Ok(rows) => rows,
            Err(err) => return ScanOutcome::unopened(targets, err),
        };

        let scan_start = Instant::now();
        let mut last_report = scan_start;
        while !targets.is_empty() {
            let Some(row) = rows.next() else {
                break;
            };
            outcome.scanned += 1;
            let row = match row {
                Ok(row) => row,
                Err(err) if err.is_row_level() => {
                    warn!("[healthchat:scan] skipping unreadable row: {err}");
                    outcome.skipped += 1;
                    continue;
                }
                Err(err) => {
                    outcome.failure = Some(err);
                    break;
                }
            };

            if let Some((id, fields)) = take_target(row, id_field, &mut targets)
                && let Some(annotation) = self.index.get(&id)
            {
                outcome.matched += 1;
                info!(
                    "[healthchat:scan] matched '{}' ({}/{}) in '{}'",
                    id,
                    outcome.matched,
                    requested,
                    source.id()
                );
                on_match(SourceRecord { id, fields }, annotation);
            }

            if last_report.elapsed() >= self.progress_every {
                info!(
                    "[healthchat:scan] progress source='{}' scanned={} matched={}/{} elapsed={:.1}s",
                    source.id(),
                    outcome.scanned,
                    outcome.matched,
                    requested,
                    scan_start.elapsed().as_secs_f64()
                );
                last_report = Instant::now();
            }
        }

        if targets.is_empty() {
            info!(
                "[healthchat:scan] all targets for '{}' found after {} row(s)",
                source.id(),
                outcome.scanned
            );
        }
        outcome.remaining = targets;
        outcome
    }
}

/// Remove the row's id from `targets` and return it with the row fields when
/// it was outstanding.
fn take_target(
    row: Value,
    id_field: &str,
    targets: &mut IndexSet<ConversationId>,
) -> Option<(ConversationId, serde_json::Map<String, Value>)> {
    let Value::Object(fields) = row else {
        return None;
    };
    let id = fields.get(id_field).and_then(value_to_id)?;
    if targets.shift_remove(&id) {
        Some((id, fields))
    } else {
        None
    }
}
