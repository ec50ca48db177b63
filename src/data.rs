//! Conversation turns, annotation views, and merged records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::review::{ASSISTANT_ROLE, USER_ROLE};
use crate::fields::{
    CONTENT, CONVERSATION, CONVERSATION_ID, DATASET_SOURCE, DATASET_VERSION, LEADING_QUESTIONS,
    LQ_CLASSIFICATION, LQ_TURN_INDEX, ROLE, SPECIALTY, TAXONOMY_CODES, TAXONOMY_MESSAGES, WEB_URL,
    value_to_code, value_to_id, value_to_text,
};

pub use crate::types::{ClassificationLabel, ConversationId, SourceId, TaxonomyCode};

/// Speaker role of a conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// `user`
    User,
    /// `assistant`
    Assistant,
    /// Any other role string, kept verbatim (empty when the turn had none).
    Other(String),
}

impl Role {
    /// Parse a role string as written in corpus rows.
    pub fn parse(raw: &str) -> Self {
        match raw {
            USER_ROLE => Self::User,
            ASSISTANT_ROLE => Self::Assistant,
            other => Self::Other(other.to_string()),
        }
    }

    /// Role string as written in review rows.
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => USER_ROLE,
            Self::Assistant => ASSISTANT_ROLE,
            Self::Other(raw) => raw,
        }
    }

    /// True for user turns, the only turns that carry taxonomy codes.
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User)
    }
}

/// One element of a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Turn {
    /// Build a turn from a role string and message text.
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: Role::parse(role),
            content: content.into(),
        }
    }

    /// Read a turn leniently from a corpus value; missing parts become empty.
    pub fn from_value(value: &Value) -> Self {
        let role = ROLE
            .get_in(value)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let content = CONTENT
            .get_in(value)
            .map(value_to_text)
            .unwrap_or_default();
        Self::new(role, content)
    }
}

/// Read the `conversation` field of a row; absent or malformed means no turns.
pub fn conversation_from_fields(fields: &Map<String, Value>) -> Vec<Turn> {
    CONVERSATION
        .get_array(fields)
        .map(|turns| turns.iter().map(Turn::from_value).collect())
        .unwrap_or_default()
}

/// One leading-question judgment attached to a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadingQuestion {
    /// Referenced position in the full conversation (all roles counted).
    pub turn_index: Option<i64>,
    /// Classification label; `N` means no finding.
    pub classification: Option<ClassificationLabel>,
}

impl LeadingQuestion {
    fn from_value(value: &Value) -> Self {
        Self {
            turn_index: LQ_TURN_INDEX.get_in(value).and_then(value_to_code),
            classification: LQ_CLASSIFICATION.get_in(value).map(value_to_text),
        }
    }
}

/// Typed view over one master annotation row.
///
/// `fields` keeps the full raw row; it is what gets merged into the output
/// record. The typed members are read from it once, leniently.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationRecord {
    /// Annotated conversation id, matched against the corpus id field.
    pub conversation_id: ConversationId,
    /// Corpus tag from `dataset_source`.
    pub source: SourceId,
    /// Entry `i` belongs to the `i`-th user turn of the conversation.
    pub taxonomy: Vec<Vec<TaxonomyCode>>,
    /// Leading-question judgments in annotation order.
    pub leading_questions: Vec<LeadingQuestion>,
    /// The raw annotation row.
    pub fields: Map<String, Value>,
}

impl AnnotationRecord {
    /// Parse an annotation row. Returns `None` when the row has no usable id
    /// or no source tag.
    pub fn from_fields(fields: Map<String, Value>) -> Option<Self> {
        let conversation_id = CONVERSATION_ID.get(&fields).and_then(value_to_id)?;
        let source = DATASET_SOURCE.get_str(&fields)?.to_string();
        let taxonomy = TAXONOMY_MESSAGES
            .get_array(&fields)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        TAXONOMY_CODES
                            .get_in(entry)
                            .and_then(Value::as_array)
                            .map(|codes| codes.iter().map(value_to_text).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        let leading_questions = LEADING_QUESTIONS
            .get_array(&fields)
            .map(|entries| entries.iter().map(LeadingQuestion::from_value).collect())
            .unwrap_or_default();
        Some(Self {
            conversation_id,
            source,
            taxonomy,
            leading_questions,
            fields,
        })
    }
}

/// A corpus row whose id matched an annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceRecord {
    /// Id read from the corpus id field.
    pub id: ConversationId,
    /// The corpus row as read.
    pub fields: Map<String, Value>,
}

/// Union of a corpus row and its annotation, stamped with the dataset version.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedRecord {
    fields: Map<String, Value>,
    conversation: Vec<Turn>,
}

impl MergedRecord {
    /// Wrap merged fields and parse the conversation once.
    pub fn new(fields: Map<String, Value>) -> Self {
        let conversation = conversation_from_fields(&fields);
        Self {
            fields,
            conversation,
        }
    }

    /// All merged fields, source order first.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Ordered conversation turns.
    pub fn conversation(&self) -> &[Turn] {
        &self.conversation
    }

    /// `conversation_id` after merging (the annotation's value wins).
    pub fn conversation_id(&self) -> String {
        CONVERSATION_ID
            .get(&self.fields)
            .and_then(value_to_id)
            .unwrap_or_default()
    }

    /// `web_url`, when present.
    pub fn web_url(&self) -> Option<String> {
        WEB_URL.get(&self.fields).map(value_to_text)
    }

    /// Integer specialty code, when present.
    pub fn specialty_code(&self) -> Option<i64> {
        SPECIALTY.get(&self.fields).and_then(value_to_code)
    }

    /// Version stamp, when present.
    pub fn dataset_version(&self) -> Option<&str> {
        DATASET_VERSION.get_str(&self.fields)
    }

    /// Serialize as one JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn roles_round_trip_through_strings() {
        assert_eq!(Role::parse("user"), Role::User);
        assert_eq!(Role::parse("assistant").as_str(), "assistant");
        assert_eq!(Role::parse("system"), Role::Other("system".to_string()));
        assert!(!Role::parse("User").is_user());
    }

    #[test]
    fn turns_parse_leniently() {
        let turn = Turn::from_value(&json!({"role": "user", "content": null}));
        assert_eq!(turn, Turn::new("user", ""));
        let turn = Turn::from_value(&json!("not a turn"));
        assert_eq!(turn.role, Role::Other(String::new()));
        assert_eq!(turn.content, "");
    }

    #[test]
    fn annotation_requires_id_and_source() {
        assert!(AnnotationRecord::from_fields(fields(json!({"dataset_source": "lmsys"}))).is_none());
        assert!(
            AnnotationRecord::from_fields(fields(json!({"conversation_id": "", "dataset_source": "lmsys"})))
                .is_none()
        );
        assert!(AnnotationRecord::from_fields(fields(json!({"conversation_id": "a"}))).is_none());
    }

    #[test]
    fn annotation_reads_taxonomy_and_leading_questions() {
        let record = AnnotationRecord::from_fields(fields(json!({
            "conversation_id": "abc",
            "dataset_source": "lmsys",
            "specialty_conversation_classification": 4,
            "taxonomy_messages_classified": [
                {"taxonomy_codes": ["B", "A"]},
                {"taxonomy_codes": null},
                {}
            ],
            "leading_question_classifications": [
                {"user_message_original_turn_index": 2, "classification": "Y"},
                {"classification": "N"}
            ]
        })))
        .expect("annotation should parse");

        assert_eq!(
            record.taxonomy,
            vec![vec!["B".to_string(), "A".to_string()], vec![], vec![]]
        );
        assert_eq!(record.leading_questions.len(), 2);
        assert_eq!(record.leading_questions[0].turn_index, Some(2));
        assert_eq!(record.leading_questions[1].turn_index, None);
        assert_eq!(
            record.leading_questions[1].classification.as_deref(),
            Some("N")
        );
    }

    #[test]
    fn null_leading_questions_mean_none() {
        let record = AnnotationRecord::from_fields(fields(json!({
            "conversation_id": 7,
            "dataset_source": "wildchat",
            "leading_question_classifications": null
        })))
        .expect("annotation should parse");
        assert_eq!(record.conversation_id, "7");
        assert!(record.leading_questions.is_empty());
        assert!(record.taxonomy.is_empty());
    }

    #[test]
    fn merged_record_exposes_review_fields() {
        let merged = MergedRecord::new(fields(json!({
            "conversation_id": "abc",
            "conversation": [{"role": "user", "content": "hi"}],
            "dataset_version": "1.0.0",
            "specialty_conversation_classification": 2
        })));
        assert_eq!(merged.conversation_id(), "abc");
        assert_eq!(merged.web_url(), None);
        assert_eq!(merged.specialty_code(), Some(2));
        assert_eq!(merged.dataset_version(), Some("1.0.0"));
        assert_eq!(merged.conversation(), &[Turn::new("user", "hi")]);
        assert!(
            merged
                .to_json_line()
                .unwrap()
                .starts_with(r#"{"conversation_id":"abc""#)
        );
    }
}
