//! Shared type aliases.

/// Conversation identifier within its source corpus.
/// Examples: `c0ffee4b2a0e4c1f9d7b1e2a3f4b5c6d` (LMSYS), a WildChat `conversation_hash`
pub type ConversationId = String;
/// Identifier for a known source corpus, as written in `dataset_source`.
/// Examples: `lmsys`, `wildchat`
pub type SourceId = String;
/// Hugging Face dataset repository id.
/// Examples: `lmsys/lmsys-chat-1m`, `yahskapar/HealthChat-11K`
pub type RepoId = String;
/// Categorical label attached to a user turn by annotation.
/// Examples: `A1`, `B3`
pub type TaxonomyCode = String;
/// Sorted taxonomy codes joined with the review delimiter.
/// Example: `A1; B3`
pub type JoinedCodes = String;
/// Dataset version stamped on every merged record.
/// Example: `1.0.0`
pub type DatasetVersion = String;
/// Leading-question classification label.
/// Examples: `N` (neutral), `Y`
pub type ClassificationLabel = String;
/// Name of a JSON field inside a corpus or annotation row.
/// Examples: `conversation_id`, `conversation_hash`
pub type FieldName = String;
