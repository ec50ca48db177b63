//! Dataset identity, field names, review table layout, and tuning knobs.

use crate::fields::FieldKey;

/// Constants identifying the rebuilt dataset and where its annotations live.
pub mod dataset {
    /// Human-readable dataset name used in file names.
    pub const DATASET_NAME: &str = "HealthChat-11K";
    /// Version rebuilt when none is configured.
    pub const DEFAULT_VERSION: &str = "1.0.0";
    /// Versions with a published master annotation file.
    pub const KNOWN_VERSIONS: [&str; 1] = ["1.0.0"];
    /// Hub dataset repository holding the master annotation files.
    pub const ANNOTATIONS_REPO_ID: &str = "yahskapar/HealthChat-11K";
    /// Split streamed from every source corpus.
    pub const DEFAULT_SPLIT: &str = "train";
}

/// Canonical source corpora, in the order they are scanned.
pub mod sources {
    /// Source tag for LMSYS-Chat-1M conversations.
    pub const LMSYS_SOURCE_ID: &str = "lmsys";
    /// Hub repository for LMSYS-Chat-1M.
    pub const LMSYS_DATASET: &str = "lmsys/lmsys-chat-1m";
    /// Id column in LMSYS-Chat-1M rows.
    pub const LMSYS_ID_FIELD: &str = "conversation_id";
    /// Source tag for WildChat-1M conversations.
    pub const WILDCHAT_SOURCE_ID: &str = "wildchat";
    /// Hub repository for WildChat-1M.
    pub const WILDCHAT_DATASET: &str = "allenai/WildChat-1M";
    /// Id column in WildChat-1M rows.
    pub const WILDCHAT_ID_FIELD: &str = "conversation_hash";
}

/// Field names read from annotation and corpus rows.
pub mod fields {
    use super::FieldKey;

    /// Conversation id in annotation rows (and LMSYS rows).
    pub const CONVERSATION_ID: FieldKey = FieldKey::new("conversation_id");
    /// Source corpus tag in annotation rows.
    pub const DATASET_SOURCE: FieldKey = FieldKey::new("dataset_source");
    /// Integer specialty code in annotation rows.
    pub const SPECIALTY: FieldKey = FieldKey::new("specialty_conversation_classification");
    /// Per-user-turn taxonomy entries in annotation rows.
    pub const TAXONOMY_MESSAGES: FieldKey = FieldKey::new("taxonomy_messages_classified");
    /// Code list inside one taxonomy entry.
    pub const TAXONOMY_CODES: FieldKey = FieldKey::new("taxonomy_codes");
    /// Leading-question entries in annotation rows.
    pub const LEADING_QUESTIONS: FieldKey = FieldKey::new("leading_question_classifications");
    /// Referenced conversation turn inside one leading-question entry.
    pub const LQ_TURN_INDEX: FieldKey = FieldKey::new("user_message_original_turn_index");
    /// Label inside one leading-question entry.
    pub const LQ_CLASSIFICATION: FieldKey = FieldKey::new("classification");
    /// Ordered conversation turns in corpus rows.
    pub const CONVERSATION: FieldKey = FieldKey::new("conversation");
    /// Speaker role inside one turn.
    pub const ROLE: FieldKey = FieldKey::new("role");
    /// Message text inside one turn.
    pub const CONTENT: FieldKey = FieldKey::new("content");
    /// Public conversation URL carried by annotation rows.
    pub const WEB_URL: FieldKey = FieldKey::new("web_url");
    /// Version stamp added to every merged record.
    pub const DATASET_VERSION: FieldKey = FieldKey::new("dataset_version");
}

/// Constants used by the review tables.
pub mod review {
    /// Separator between sorted taxonomy codes.
    pub const TAXONOMY_DELIMITER: &str = "; ";
    /// Leading-question classification meaning "no finding".
    pub const NEUTRAL_CLASSIFICATION: &str = "N";
    /// User text used when a referenced turn is out of range.
    pub const TEXT_NOT_FOUND: &str = "TEXT NOT FOUND";
    /// Placeholder for a missing URL or an unknown specialty.
    pub const NOT_AVAILABLE: &str = "N/A";
    /// Role string of turns that carry taxonomy codes.
    pub const USER_ROLE: &str = "user";
    /// Role string of model turns.
    pub const ASSISTANT_ROLE: &str = "assistant";

    /// Column headers of the full review table.
    pub const FULL_REVIEW_HEADERS: [&str; 7] = [
        "Conversation ID",
        "Web URL",
        "Specialty",
        "Turn Index",
        "Role",
        "Message Text",
        "Taxonomy Codes",
    ];
    /// Column headers of the sycophancy review table.
    pub const SYCOPHANCY_REVIEW_HEADERS: [&str; 7] = [
        "Conversation ID",
        "Web URL",
        "User Message Original Turn Index",
        "Prior Assistant Message Text",
        "User Message Text",
        "Taxonomy Codes",
        "LQST Classification",
    ];
}

/// Fixed enumeration of conversation specialties.
pub mod specialty {
    /// Code-to-label table; codes outside it resolve to `review::NOT_AVAILABLE`.
    pub const SPECIALTIES: [(i64, &str); 22] = [
        (1, "General Health"),
        (2, "Mental Health"),
        (3, "Allergy and Immunology"),
        (4, "Cardiology"),
        (5, "Dermatology"),
        (6, "Endocrinology"),
        (7, "Gastroenterology"),
        (8, "Hematology/Oncology"),
        (9, "Infectious Disease"),
        (10, "Nephrology"),
        (11, "Neurology"),
        (12, "Obstetrics and Gynecology (OB/GYN)"),
        (13, "Ophthalmology"),
        (14, "Fitness/Orthopedics/Sports Medicine"),
        (15, "Otolaryngology (ENT)"),
        (16, "Pediatrics"),
        (17, "Pulmonology"),
        (18, "Rheumatology"),
        (19, "Urology"),
        (20, "Dentistry"),
        (21, "Diet and Nutrition"),
        (22, "Not a Health Conversation"),
    ];
}

/// Constants used when reading shard files.
pub mod shards {
    /// File extensions accepted as shard files.
    pub const SHARD_EXTENSIONS: [&str; 3] = ["parquet", "jsonl", "ndjson"];
    /// Retries passed to the hf-hub client for each download.
    pub const HUB_RETRIES: usize = 5;
    /// Re-download attempts when hf-hub reports a cache path that does not exist.
    pub const MISSING_CACHE_RETRIES: usize = 5;
    /// Pause between missing-cache re-download attempts, in milliseconds.
    pub const MISSING_CACHE_BACKOFF_MS: u64 = 400;
}

/// Constants used by the corpus scan.
pub mod scan {
    /// Minimum interval between progress log lines, in milliseconds.
    pub const PROGRESS_INTERVAL_MS: u64 = 5_000;
}
