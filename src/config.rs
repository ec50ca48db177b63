//! Rebuild configuration: version, output location, and where each source is read from.

use std::path::PathBuf;

use crate::constants::dataset::{
    ANNOTATIONS_REPO_ID, DATASET_NAME, DEFAULT_SPLIT, DEFAULT_VERSION, KNOWN_VERSIONS,
};
use crate::constants::sources::{
    LMSYS_DATASET, LMSYS_ID_FIELD, LMSYS_SOURCE_ID, WILDCHAT_DATASET, WILDCHAT_ID_FIELD,
    WILDCHAT_SOURCE_ID,
};
use crate::errors::RebuildError;
use crate::types::{DatasetVersion, FieldName, RepoId, SourceId};

/// Where one source corpus lives and how its rows are keyed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorpusConfig {
    /// Tag used by annotation rows in `dataset_source`.
    pub source_id: SourceId,
    /// Hugging Face dataset id, e.g. `lmsys/lmsys-chat-1m`.
    pub dataset: RepoId,
    /// Split name, e.g. `train`.
    pub split: String,
    /// Row field holding the conversation id.
    pub id_field: FieldName,
    /// Local snapshot directory. When set, the Hub is not contacted for this corpus.
    pub snapshot_dir: Option<PathBuf>,
}

impl CorpusConfig {
    /// Create a Hub-backed corpus config on the default split.
    pub fn new(
        source_id: impl Into<SourceId>,
        dataset: impl Into<RepoId>,
        id_field: impl Into<FieldName>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            dataset: dataset.into(),
            split: DEFAULT_SPLIT.to_string(),
            id_field: id_field.into(),
            snapshot_dir: None,
        }
    }

    /// Read this corpus from a local snapshot directory instead of the Hub.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// The LMSYS-Chat-1M corpus.
    pub fn lmsys() -> Self {
        Self::new(LMSYS_SOURCE_ID, LMSYS_DATASET, LMSYS_ID_FIELD)
    }

    /// The WildChat-1M corpus.
    pub fn wildchat() -> Self {
        Self::new(WILDCHAT_SOURCE_ID, WILDCHAT_DATASET, WILDCHAT_ID_FIELD)
    }
}

/// Where the master annotation file comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationSourceConfig {
    /// Hub dataset repository holding the annotation files.
    pub repo_id: RepoId,
    /// Local annotation file. When set, the Hub is not contacted for annotations.
    pub local_path: Option<PathBuf>,
}

impl Default for AnnotationSourceConfig {
    fn default() -> Self {
        Self {
            repo_id: ANNOTATIONS_REPO_ID.to_string(),
            local_path: None,
        }
    }
}

/// Hub client settings shared by every remote source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HubConfig {
    /// Cache directory override for downloaded files (hf-hub default otherwise).
    pub cache_dir: Option<PathBuf>,
    /// Access token for gated datasets such as LMSYS-Chat-1M.
    pub token: Option<String>,
    /// Show download progress bars.
    pub progress: bool,
}

/// Top-level rebuild configuration, built once and passed to every component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebuildConfig {
    /// Version stamped on merged records and embedded in every file name.
    pub version: DatasetVersion,
    /// Directory receiving the dataset and both review tables.
    pub output_dir: PathBuf,
    /// Annotation file location.
    pub annotations: AnnotationSourceConfig,
    /// Source corpora in scan order.
    pub corpora: Vec<CorpusConfig>,
    /// Hub client settings.
    pub hub: HubConfig,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION)
    }
}

impl RebuildConfig {
    /// Configure a rebuild of `version` with the canonical corpora and the
    /// version-specific output directory.
    pub fn new(version: impl Into<DatasetVersion>) -> Self {
        let version = version.into();
        Self {
            output_dir: Self::default_output_dir(&version),
            version,
            annotations: AnnotationSourceConfig::default(),
            corpora: vec![CorpusConfig::lmsys(), CorpusConfig::wildchat()],
            hub: HubConfig::default(),
        }
    }

    /// Default artifacts directory for `version`, relative to the working directory.
    pub fn default_output_dir(version: &str) -> PathBuf {
        PathBuf::from(format!("{DATASET_NAME}_v{version}_artifacts"))
    }

    /// Master annotation file name inside the annotation repository.
    pub fn annotations_filename(&self) -> String {
        format!("{DATASET_NAME}_master_annotations_v{}.jsonl", self.version)
    }

    /// Primary dataset output path.
    pub fn dataset_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{DATASET_NAME}_v{}.jsonl", self.version))
    }

    /// Full review table output path.
    pub fn full_review_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{DATASET_NAME}_v{}_full_review.csv", self.version))
    }

    /// Sycophancy review table output path.
    pub fn sycophancy_review_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{DATASET_NAME}_v{}_sycophancy_review.csv",
            self.version
        ))
    }

    /// Source tags accepted by the annotation index, in scan order.
    pub fn known_sources(&self) -> Vec<SourceId> {
        self.corpora
            .iter()
            .map(|corpus| corpus.source_id.clone())
            .collect()
    }

    /// Look up a configured corpus by source tag.
    pub fn corpus(&self, source_id: &str) -> Option<&CorpusConfig> {
        self.corpora
            .iter()
            .find(|corpus| corpus.source_id == source_id)
    }

    /// True when `version` has a published annotation file.
    pub fn is_known_version(&self) -> bool {
        KNOWN_VERSIONS.contains(&self.version.as_str())
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), RebuildError> {
        if self.version.trim().is_empty() {
            return Err(RebuildError::Configuration(
                "dataset version must not be empty".to_string(),
            ));
        }
        if self.corpora.is_empty() {
            return Err(RebuildError::Configuration(
                "at least one source corpus must be configured".to_string(),
            ));
        }
        for (idx, corpus) in self.corpora.iter().enumerate() {
            if corpus.id_field.trim().is_empty() {
                return Err(RebuildError::Configuration(format!(
                    "corpus '{}' has an empty id field",
                    corpus.source_id
                )));
            }
            if self.corpora[..idx]
                .iter()
                .any(|earlier| earlier.source_id == corpus.source_id)
            {
                return Err(RebuildError::Configuration(format!(
                    "corpus '{}' is configured more than once",
                    corpus.source_id
                )));
            }
        }
        Ok(())
    }
}
