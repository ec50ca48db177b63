//! Full review rows, one per conversation turn.

use crate::constants::review::NOT_AVAILABLE;
use crate::data::{AnnotationRecord, MergedRecord};

use super::{FullReviewRow, TaxonomyByUserTurn, specialty_label};

/// Expands a merged conversation into one review row per turn.
#[derive(Clone, Copy, Debug, Default)]
pub struct TurnProjector;

impl TurnProjector {
    /// Rows in conversation order. User turns carry the codes of their
    /// user-turn ordinal; all other turns carry none.
    pub fn project(&self, merged: &MergedRecord, annotation: &AnnotationRecord) -> Vec<FullReviewRow> {
        let taxonomy = TaxonomyByUserTurn::from_annotation(annotation);
        let conversation_id = merged.conversation_id();
        let web_url = merged.web_url().unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let specialty = specialty_label(merged.specialty_code());

        let mut user_ordinal = 0usize;
        let mut rows = Vec::with_capacity(merged.conversation().len());
        for (turn_index, turn) in merged.conversation().iter().enumerate() {
            let taxonomy_codes = if turn.role.is_user() {
                taxonomy.for_ordinal(user_ordinal).to_string()
            } else {
                String::new()
            };
            rows.push(FullReviewRow {
                conversation_id: conversation_id.clone(),
                web_url: web_url.clone(),
                specialty: specialty.to_string(),
                turn_index,
                role: turn.role.as_str().to_string(),
                message: turn.content.clone(),
                taxonomy_codes,
            });
            if turn.role.is_user() {
                user_ordinal += 1;
            }
        }
        rows
    }
}
