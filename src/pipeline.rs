//! End-to-end rebuild: annotations → corpus scans → merged dataset → review tables.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::annotations::load_annotations;
use crate::config::RebuildConfig;
use crate::errors::RebuildError;
use crate::matcher::{ScanOutcome, StreamMatcher};
use crate::merger::RecordMerger;
use crate::review::{
    FullReviewRow, ReviewTable, SycophancyProjector, SycophancyReviewRow, TurnProjector,
    write_table,
};
use crate::source::SourceProvider;
use crate::types::{ConversationId, SourceId};

/// Per-corpus outcome of a rebuild.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceReport {
    /// Corpus tag.
    pub source_id: SourceId,
    /// Ids requested from this corpus.
    pub requested: usize,
    /// Ids matched and merged.
    pub matched: usize,
    /// Rows pulled from the corpus stream.
    pub scanned: usize,
    /// Rows skipped as undecodable.
    pub skipped: usize,
    /// Requested ids never seen in the corpus, in annotation order.
    pub missing: Vec<ConversationId>,
    /// Why the corpus could not be fully scanned, if it failed.
    pub failure: Option<String>,
}

/// An output file that could not be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFailure {
    /// File that failed.
    pub path: PathBuf,
    /// Underlying error text.
    pub reason: String,
}

/// Summary of a rebuild run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebuildReport {
    /// Dataset version rebuilt.
    pub version: String,
    /// Run start time.
    pub started_at: DateTime<Utc>,
    /// Run end time.
    pub finished_at: DateTime<Utc>,
    /// Annotations that survived filtering (ids requested across all corpora).
    pub requested: usize,
    /// Merged records produced.
    pub merged: usize,
    /// Merged records persisted to the dataset file.
    pub persisted: usize,
    /// Rows in the full review table.
    pub full_review_rows: usize,
    /// Rows in the sycophancy review table.
    pub sycophancy_review_rows: usize,
    /// One entry per corpus that had ids to find, in scan order.
    pub sources: Vec<SourceReport>,
    /// Outputs that could not be written.
    pub output_failures: Vec<OutputFailure>,
}

impl RebuildReport {
    fn empty(config: &RebuildConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            version: config.version.clone(),
            started_at,
            finished_at: started_at,
            requested: 0,
            merged: 0,
            persisted: 0,
            full_review_rows: 0,
            sycophancy_review_rows: 0,
            sources: Vec::new(),
            output_failures: Vec::new(),
        }
    }

    /// Missing ids across all corpora.
    pub fn missing_total(&self) -> usize {
        self.sources.iter().map(|source| source.missing.len()).sum()
    }

    /// True when every requested conversation was merged and every file written.
    pub fn is_complete(&self) -> bool {
        self.missing_total() == 0 && self.output_failures.is_empty()
    }

    /// True when no annotation survived filtering, so nothing was scanned or written.
    pub fn is_empty_run(&self) -> bool {
        self.requested == 0
    }

    /// Log the end-of-run summary, including every missing id.
    pub fn log_summary(&self, config: &RebuildConfig) {
        if self.is_empty_run() {
            warn!(
                "[healthchat:rebuild] no conversations were requested; nothing was written to {}",
                config.output_dir.display()
            );
            return;
        }
        info!("[healthchat:rebuild] primary dataset reconstruction complete");
        info!(
            "[healthchat:rebuild] wrote {} of {} conversation(s) to {} in {:.1}s",
            self.persisted,
            self.requested,
            config.dataset_path().display(),
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
        );
        for failure in &self.output_failures {
            error!(
                "[healthchat:rebuild] could not write {}: {}",
                failure.path.display(),
                failure.reason
            );
        }
        for source in &self.sources {
            info!(
                "[healthchat:rebuild] '{}': matched {}/{} after scanning {} row(s)",
                source.source_id, source.matched, source.requested, source.scanned
            );
            if let Some(reason) = &source.failure {
                warn!(
                    "[healthchat:rebuild] '{}' scan ended early: {reason}",
                    source.source_id
                );
            }
            if !source.missing.is_empty() {
                warn!(
                    "[healthchat:rebuild] could not find {} conversation(s) from source '{}':",
                    source.missing.len(),
                    source.source_id
                );
                for id in &source.missing {
                    warn!("[healthchat:rebuild]   - {id}");
                }
            }
        }
        if self.missing_total() == 0 {
            info!("[healthchat:rebuild] all requested conversations were found and merged");
        }
    }
}

/// Runs a rebuild for one immutable configuration.
pub struct Rebuilder<'a, P: SourceProvider> {
    config: &'a RebuildConfig,
    provider: P,
}

impl<'a, P: SourceProvider> Rebuilder<'a, P> {
    /// Rebuild `config` using `provider` to open sources.
    pub fn new(config: &'a RebuildConfig, provider: P) -> Self {
        Self { config, provider }
    }

    /// Run to completion.
    ///
    /// Fails only when the configuration is invalid, the output directory
    /// cannot be created, or the annotation source cannot be read. Every other
    /// problem is recorded in the returned report.
    pub fn run(&self) -> Result<RebuildReport, RebuildError> {
        let config = self.config;
        config.validate()?;
        if !config.is_known_version() {
            warn!(
                "[healthchat:rebuild] version '{}' is not a known release; the annotation file may not exist",
                config.version
            );
        }
        let mut report = RebuildReport::empty(config, Utc::now());

        info!(
            "[healthchat:rebuild] creating output directory {}",
            config.output_dir.display()
        );
        fs::create_dir_all(&config.output_dir)?;

        let annotation_source = self
            .provider
            .annotations(config)
            .map_err(|err| RebuildError::Annotations(err.to_string()))?;
        let (index, mut targets) =
            load_annotations(annotation_source.as_ref(), &config.known_sources())?;
        if index.is_empty() {
            warn!("[healthchat:rebuild] no valid conversations to process were found");
            report.finished_at = Utc::now();
            return Ok(report);
        }
        report.requested = index.len();

        let dataset_path = config.dataset_path();
        info!(
            "[healthchat:rebuild] reconstructing dataset at {} (version {})",
            dataset_path.display(),
            config.version
        );
        let mut merger = match File::create(&dataset_path) {
            Ok(file) => RecordMerger::new(config.version.clone(), BufWriter::new(file)),
            Err(err) => {
                error!(
                    "[healthchat:rebuild] could not create {}: {err}",
                    dataset_path.display()
                );
                RecordMerger::detached(config.version.clone(), err.to_string())
            }
        };

        let matcher = StreamMatcher::new(&index);
        let mut full_rows: Vec<FullReviewRow> = Vec::new();
        let mut sycophancy_rows: Vec<SycophancyReviewRow> = Vec::new();
        for corpus in &config.corpora {
            let wanted = targets.take(&corpus.source_id);
            if wanted.is_empty() {
                continue;
            }
            let outcome = match self.provider.corpus(config, corpus) {
                Ok(source) => matcher.scan(
                    source.as_ref(),
                    &corpus.id_field,
                    wanted,
                    |record, annotation| {
                        let merged = merger.merge(record, annotation);
                        full_rows.extend(TurnProjector.project(&merged, annotation));
                        sycophancy_rows.extend(SycophancyProjector.project(&merged, annotation));
                    },
                ),
                Err(err) => ScanOutcome::unopened(wanted, err),
            };
            if let Some(err) = &outcome.failure {
                error!(
                    "[healthchat:rebuild] corpus '{}' failed: {err}",
                    corpus.source_id
                );
            } else if !outcome.is_complete() {
                warn!(
                    "[healthchat:rebuild] corpus '{}' ended with {} id(s) not found",
                    corpus.source_id,
                    outcome.remaining.len()
                );
            }
            report.merged += outcome.matched;
            report.sources.push(SourceReport {
                source_id: corpus.source_id.clone(),
                requested: outcome.requested,
                matched: outcome.matched,
                scanned: outcome.scanned,
                skipped: outcome.skipped,
                missing: outcome.remaining.iter().cloned().collect(),
                failure: outcome.failure.as_ref().map(ToString::to_string),
            });
            targets.restore(&corpus.source_id, outcome.remaining);
        }

        report.persisted = merger.written();
        if let Some(reason) = merger.write_error() {
            report.output_failures.push(OutputFailure {
                path: dataset_path,
                reason: reason.to_string(),
            });
        }
        drop(merger);

        report.full_review_rows = full_rows.len();
        report.sycophancy_review_rows = sycophancy_rows.len();
        write_review(&mut report, config.full_review_path(), &full_rows);
        write_review(&mut report, config.sycophancy_review_path(), &sycophancy_rows);

        debug_assert_eq!(targets.total(), report.missing_total());
        report.finished_at = Utc::now();
        Ok(report)
    }
}

fn write_review<T: ReviewTable>(report: &mut RebuildReport, path: PathBuf, rows: &[T]) {
    if let Err(err) = write_table(&path, rows) {
        error!("[healthchat:rebuild] {err}");
        let reason = match err {
            RebuildError::Output { reason, .. } => reason,
            other => other.to_string(),
        };
        report.output_failures.push(OutputFailure { path, reason });
    }
}
