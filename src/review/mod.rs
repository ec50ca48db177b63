//! Flattened review tables derived from merged records.
//!
//! - `TurnProjector` emits one `FullReviewRow` per conversation turn.
//! - `SycophancyProjector` emits one `SycophancyReviewRow` per non-neutral
//!   leading-question finding.
//!
//! Both derive taxonomy alignment from `TaxonomyByUserTurn`, each with its
//! own user-turn counter.

use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::constants::review::{
    FULL_REVIEW_HEADERS, NOT_AVAILABLE, SYCOPHANCY_REVIEW_HEADERS,
};
use crate::constants::specialty::SPECIALTIES;
use crate::errors::RebuildError;
use crate::types::{ClassificationLabel, ConversationId, JoinedCodes};

mod sycophancy;
mod taxonomy;
mod turns;

pub use sycophancy::SycophancyProjector;
pub use taxonomy::TaxonomyByUserTurn;
pub use turns::TurnProjector;

/// Human-readable specialty for a code; unknown or absent codes map to `N/A`.
pub fn specialty_label(code: Option<i64>) -> &'static str {
    code.and_then(|code| {
        SPECIALTIES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, label)| *label)
    })
    .unwrap_or(NOT_AVAILABLE)
}

/// One conversation turn in the full review table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FullReviewRow {
    /// Annotated conversation id.
    pub conversation_id: ConversationId,
    /// Source URL or `N/A`.
    pub web_url: String,
    /// Specialty label or `N/A`.
    pub specialty: String,
    /// Zero-based position in the conversation.
    pub turn_index: usize,
    /// Role as it appears in the source turn.
    pub role: String,
    /// Turn text.
    pub message: String,
    /// Joined codes for user turns; always empty for other roles.
    pub taxonomy_codes: JoinedCodes,
}

/// One leading-question finding in the sycophancy review table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SycophancyReviewRow {
    /// Annotated conversation id.
    pub conversation_id: ConversationId,
    /// Source URL or `N/A`.
    pub web_url: String,
    /// Referenced turn index as annotated (absent indexes stay empty).
    pub turn_index: Option<i64>,
    /// Text of the turn before the referenced one, or empty.
    pub prior_assistant_message: String,
    /// Referenced turn text, or `TEXT NOT FOUND`.
    pub user_message: String,
    /// Codes re-derived for the referenced turn.
    pub taxonomy_codes: JoinedCodes,
    /// Leading-question label.
    pub classification: ClassificationLabel,
}

/// A review row type with fixed CSV headers.
pub trait ReviewTable: Serialize {
    /// Column headers, in field order.
    const HEADERS: [&'static str; 7];
    /// Table name used in logs.
    const NAME: &'static str;
}

impl ReviewTable for FullReviewRow {
    const HEADERS: [&'static str; 7] = FULL_REVIEW_HEADERS;
    const NAME: &'static str = "full review";
}

impl ReviewTable for SycophancyReviewRow {
    const HEADERS: [&'static str; 7] = SYCOPHANCY_REVIEW_HEADERS;
    const NAME: &'static str = "sycophancy review";
}

/// Write `rows` as CSV with `T::HEADERS` to any writer.
pub fn write_table_to<T, W>(writer: W, rows: &[T]) -> Result<(), csv::Error>
where
    T: ReviewTable,
    W: std::io::Write,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(T::HEADERS)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write `rows` as a CSV file at `path`, replacing any existing file.
pub fn write_table<T: ReviewTable>(path: &Path, rows: &[T]) -> Result<(), RebuildError> {
    info!(
        "[healthchat:review] writing {} {} row(s) to {}",
        rows.len(),
        T::NAME,
        path.display()
    );
    let output_error = |reason: String| RebuildError::Output {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::create(path).map_err(|err| output_error(err.to_string()))?;
    write_table_to(file, rows).map_err(|err| output_error(err.to_string()))?;
    info!("[healthchat:review] created {}", path.display());
    Ok(())
}
