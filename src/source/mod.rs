//! Row sources and the provider that opens them for a rebuild.
//!
//! Ownership model:
//! - `RowSource` is a re-openable, strictly sequential stream of JSON rows.
//!   Opening a stream is where retrieval happens; callers that stop pulling
//!   early leave the remainder untouched (no further shards are fetched).
//! - `SourceProvider` decides, per configuration, which concrete source backs
//!   the annotations and each corpus.

use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use crate::config::{CorpusConfig, RebuildConfig};
use crate::errors::RebuildError;
use crate::types::SourceId;

/// Hugging Face Hub backed sources.
#[cfg(feature = "huggingface")]
pub mod huggingface;
/// Shard discovery and per-file row readers.
pub mod shards;

#[cfg(feature = "huggingface")]
pub use huggingface::{HubDatasetSource, HubFileSource};

/// Boxed row stream returned by `RowSource::rows`.
///
/// Items are decoded rows; `RebuildError::SourceInconsistent` marks a single
/// unreadable row, any other error ends the stream.
pub type RowStream<'a> = Box<dyn Iterator<Item = Result<Value, RebuildError>> + 'a>;

/// Sequential source of JSON rows (annotations or corpus conversations).
pub trait RowSource {
    /// Stable source identifier used in logs and errors.
    fn id(&self) -> &str;
    /// Open a fresh stream from the first row.
    fn rows(&self) -> Result<RowStream<'_>, RebuildError>;
}

/// In-memory row source for tests and small fixtures.
pub struct InMemorySource {
    id: SourceId,
    rows: Vec<Value>,
}

impl InMemorySource {
    /// Create an in-memory source from prebuilt rows.
    pub fn new(id: impl Into<SourceId>, rows: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            rows,
        }
    }
}

impl RowSource for InMemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn rows(&self) -> Result<RowStream<'_>, RebuildError> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }
}

/// Local snapshot: a single shard file or a directory of shard files.
pub struct SnapshotSource {
    id: SourceId,
    root: PathBuf,
    split: String,
}

impl SnapshotSource {
    /// Read rows under `root`, preferring shards that belong to `split`.
    pub fn new(id: impl Into<SourceId>, root: impl Into<PathBuf>, split: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            split: split.into(),
        }
    }
}

impl RowSource for SnapshotSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn rows(&self) -> Result<RowStream<'_>, RebuildError> {
        let paths = shards::discover_shards(&self.id, &self.root, &self.split)?;
        info!(
            "[healthchat:snapshot] streaming {} local shard(s) for '{}' from {}",
            paths.len(),
            self.id,
            self.root.display()
        );
        Ok(Box::new(shards::LocalShardChain::new(self.id.clone(), paths)))
    }
}

/// Opens the annotation source and corpus sources for a configuration.
pub trait SourceProvider {
    /// Source yielding master annotation rows.
    fn annotations(&self, config: &RebuildConfig) -> Result<Box<dyn RowSource>, RebuildError>;
    /// Source yielding conversation rows for one corpus.
    fn corpus(
        &self,
        config: &RebuildConfig,
        corpus: &CorpusConfig,
    ) -> Result<Box<dyn RowSource>, RebuildError>;
}

/// Uses local paths when configured and the Hugging Face Hub otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSourceProvider;

impl SourceProvider for DefaultSourceProvider {
    fn annotations(&self, config: &RebuildConfig) -> Result<Box<dyn RowSource>, RebuildError> {
        if let Some(path) = &config.annotations.local_path {
            return Ok(Box::new(SnapshotSource::new(
                config.annotations.repo_id.clone(),
                path.clone(),
                "",
            )));
        }
        remote_annotations(config)
    }

    fn corpus(
        &self,
        config: &RebuildConfig,
        corpus: &CorpusConfig,
    ) -> Result<Box<dyn RowSource>, RebuildError> {
        if let Some(dir) = &corpus.snapshot_dir {
            return Ok(Box::new(SnapshotSource::new(
                corpus.source_id.clone(),
                dir.clone(),
                corpus.split.clone(),
            )));
        }
        remote_corpus(config, corpus)
    }
}

#[cfg(feature = "huggingface")]
fn remote_annotations(config: &RebuildConfig) -> Result<Box<dyn RowSource>, RebuildError> {
    Ok(Box::new(HubFileSource::new(
        config.annotations.repo_id.clone(),
        config.annotations_filename(),
        config.hub.clone(),
    )))
}

#[cfg(not(feature = "huggingface"))]
fn remote_annotations(config: &RebuildConfig) -> Result<Box<dyn RowSource>, RebuildError> {
    Err(RebuildError::Configuration(format!(
        "annotations from '{}' need the `huggingface` feature; pass a local annotation file instead",
        config.annotations.repo_id
    )))
}

#[cfg(feature = "huggingface")]
fn remote_corpus(
    config: &RebuildConfig,
    corpus: &CorpusConfig,
) -> Result<Box<dyn RowSource>, RebuildError> {
    Ok(Box::new(HubDatasetSource::new(corpus.clone(), config.hub.clone())))
}

#[cfg(not(feature = "huggingface"))]
fn remote_corpus(
    _config: &RebuildConfig,
    corpus: &CorpusConfig,
) -> Result<Box<dyn RowSource>, RebuildError> {
    Err(RebuildError::Configuration(format!(
        "corpus '{}' needs the `huggingface` feature; pass a local snapshot directory instead",
        corpus.source_id
    )))
}
