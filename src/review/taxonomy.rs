//! Taxonomy codes aligned to user turns.

use crate::constants::review::TAXONOMY_DELIMITER;
use crate::data::{AnnotationRecord, Turn};
use crate::types::JoinedCodes;

/// Taxonomy codes per user-turn ordinal, sorted and joined for review.
///
/// Ordinal `i` is the `i`-th user turn in conversation order. Ordinals past
/// the annotation's taxonomy sequence have no codes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaxonomyByUserTurn {
    joined: Vec<JoinedCodes>,
}

impl TaxonomyByUserTurn {
    /// Derive the ordinal mapping positionally from an annotation.
    pub fn from_annotation(annotation: &AnnotationRecord) -> Self {
        let joined = annotation
            .taxonomy
            .iter()
            .map(|codes| {
                let mut sorted = codes.clone();
                sorted.sort();
                sorted.join(TAXONOMY_DELIMITER)
            })
            .collect();
        Self { joined }
    }

    /// Joined codes for user-turn ordinal `ordinal`, or empty.
    pub fn for_ordinal(&self, ordinal: usize) -> &str {
        self.joined.get(ordinal).map(String::as_str).unwrap_or_default()
    }

    /// Joined codes for the turn at conversation position `turn_index`.
    ///
    /// Re-scans `conversation` from the start with its own user-turn counter.
    /// Only a user turn can match; any other turn, or a position past the end,
    /// yields empty.
    pub fn for_turn_index(&self, conversation: &[Turn], turn_index: usize) -> &str {
        let mut ordinal = 0usize;
        for (idx, turn) in conversation.iter().enumerate() {
            if !turn.role.is_user() {
                continue;
            }
            if idx == turn_index {
                return self.for_ordinal(ordinal);
            }
            ordinal += 1;
        }
        ""
    }
}
