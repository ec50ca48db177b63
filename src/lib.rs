#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Annotation index and per-source target sets.
pub mod annotations;
/// Command-line entry point shared by the binary.
pub mod cli;
/// Rebuild configuration types.
pub mod config;
/// Centralized constants: dataset identity, field names, review table layout.
pub mod constants;
/// Conversation, annotation, and merged record types.
pub mod data;
/// Field keys and lenient value helpers.
pub mod fields;
/// Streaming id matcher.
pub mod matcher;
/// Record merging and dataset persistence.
pub mod merger;
/// End-to-end rebuild orchestration and run reports.
pub mod pipeline;
/// Review table projections and CSV output.
pub mod review;
/// Row sources: local snapshots, in-memory rows, and the Hugging Face Hub.
pub mod source;
/// Shared type aliases.
pub mod types;

mod errors;

pub use annotations::{AnnotationIndex, TargetSets, load_annotations};
pub use config::{AnnotationSourceConfig, CorpusConfig, HubConfig, RebuildConfig};
pub use data::{AnnotationRecord, LeadingQuestion, MergedRecord, Role, SourceRecord, Turn};
pub use errors::RebuildError;
pub use matcher::{ScanOutcome, StreamMatcher};
pub use merger::RecordMerger;
pub use pipeline::{OutputFailure, RebuildReport, Rebuilder, SourceReport};
pub use review::{
    FullReviewRow, ReviewTable, SycophancyProjector, SycophancyReviewRow, TaxonomyByUserTurn,
    TurnProjector,
};
pub use source::{DefaultSourceProvider, InMemorySource, RowSource, SnapshotSource, SourceProvider};
#[cfg(feature = "huggingface")]
pub use source::{HubDatasetSource, HubFileSource};
pub use types::{ConversationId, DatasetVersion, SourceId, TaxonomyCode};
