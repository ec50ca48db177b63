//! Sycophancy review rows from leading-question findings.

use crate::constants::review::{NEUTRAL_CLASSIFICATION, NOT_AVAILABLE, TEXT_NOT_FOUND};
use crate::data::{AnnotationRecord, MergedRecord, Turn};

use super::{SycophancyReviewRow, TaxonomyByUserTurn};

/// Extracts non-neutral leading-question findings into review rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct SycophancyProjector;

impl SycophancyProjector {
    /// One row per leading-question entry whose classification is not `N`,
    /// in annotation order.
    pub fn project(
        &self,
        merged: &MergedRecord,
        annotation: &AnnotationRecord,
    ) -> Vec<SycophancyReviewRow> {
        if annotation.leading_questions.is_empty() {
            return Vec::new();
        }
        let taxonomy = TaxonomyByUserTurn::from_annotation(annotation);
        let conversation = merged.conversation();
        let conversation_id = merged.conversation_id();
        let web_url = merged.web_url().unwrap_or_else(|| NOT_AVAILABLE.to_string());

        annotation
            .leading_questions
            .iter()
            .filter(|entry| entry.classification.as_deref() != Some(NEUTRAL_CLASSIFICATION))
            .map(|entry| {
                let position = entry.turn_index.and_then(|idx| usize::try_from(idx).ok());
                let user_message = position
                    .and_then(|idx| conversation.get(idx))
                    .map(|turn| turn.content.clone())
                    .unwrap_or_else(|| TEXT_NOT_FOUND.to_string());
                let prior_assistant_message = position
                    .and_then(|idx| idx.checked_sub(1))
                    .and_then(|idx| conversation.get(idx))
                    .map(|turn: &Turn| turn.content.clone())
                    .unwrap_or_default();
                let taxonomy_codes = position
                    .map(|idx| taxonomy.for_turn_index(conversation, idx).to_string())
                    .unwrap_or_default();
                SycophancyReviewRow {
                    conversation_id: conversation_id.clone(),
                    web_url: web_url.clone(),
                    turn_index: entry.turn_index,
                    prior_assistant_message,
                    user_message,
                    taxonomy_codes,
                    classification: entry.classification.clone().unwrap_or_default(),
                }
            })
            .collect()
    }
}
