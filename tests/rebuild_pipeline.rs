use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use healthchat::{
    CorpusConfig, DefaultSourceProvider, RebuildConfig, RebuildError, RebuildReport, Rebuilder,
};
use parquet::data_type::{ByteArray, ByteArrayType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use serde_json::{Value, json};
use tempfile::TempDir;

fn write_lines(path: &Path, rows: &[Value]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed creating shard directory");
    }
    let body = rows
        .iter()
        .map(|row| serde_json::to_string(row).expect("failed encoding row"))
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(path, format!("{body}\n")).expect("failed writing jsonl");
}

fn write_timestamped_parquet(path: &Path, rows: &[(&str, i64)]) {
    let schema = Arc::new(
        parse_message_type(
            "message wildchat {
                REQUIRED BINARY conversation_hash (UTF8);
                OPTIONAL INT64 timestamp (TIMESTAMP(MICROS,true));
            }",
        )
        .expect("failed parsing parquet schema"),
    );
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path).expect("failed creating parquet shard");
    let mut writer =
        SerializedFileWriter::new(file, schema, props).expect("failed opening parquet writer");
    let mut row_group = writer.next_row_group().expect("failed opening row group");

    if let Some(mut col_writer) = row_group.next_column().expect("hash column") {
        let values = rows
            .iter()
            .map(|(hash, _)| ByteArray::from(*hash))
            .collect::<Vec<_>>();
        col_writer
            .typed::<ByteArrayType>()
            .write_batch(&values, None, None)
            .expect("failed writing hashes");
        col_writer.close().expect("failed closing hash column");
    }
    if let Some(mut col_writer) = row_group.next_column().expect("timestamp column") {
        let values = rows.iter().map(|(_, micros)| *micros).collect::<Vec<_>>();
        let def_levels = vec![1i16; rows.len()];
        col_writer
            .typed::<Int64Type>()
            .write_batch(&values, Some(&def_levels), None)
            .expect("failed writing timestamps");
        col_writer.close().expect("failed closing timestamp column");
    }
    row_group.close().expect("failed closing row group");
    writer.close().expect("failed closing parquet writer");
}

fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .expect("failed opening csv");
    reader
        .records()
        .map(|record| {
            record
                .expect("failed reading csv record")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect()
}

fn read_dataset(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .expect("failed reading dataset")
        .lines()
        .map(|line| serde_json::from_str(line).expect("dataset line is not json"))
        .collect()
}

struct Fixture {
    _temp: TempDir,
    config: RebuildConfig,
}

impl Fixture {
    fn new(annotations: &[Value], lmsys: &[Value], wildchat: &[Value]) -> Self {
        let temp = tempfile::tempdir().expect("failed creating tempdir");
        let root = temp.path();
        let annotations_path = root.join("annotations.jsonl");
        write_lines(&annotations_path, annotations);
        write_lines(&root.join("lmsys/data/train-00000-of-00001.jsonl"), lmsys);
        write_lines(&root.join("wildchat/data/train-00000-of-00001.jsonl"), wildchat);

        let mut config = RebuildConfig::new("1.0.0");
        config.output_dir = root.join("out");
        config.annotations.local_path = Some(annotations_path);
        config.corpora = vec![
            CorpusConfig::lmsys().with_snapshot_dir(root.join("lmsys")),
            CorpusConfig::wildchat().with_snapshot_dir(root.join("wildchat")),
        ];
        Self {
            _temp: temp,
            config,
        }
    }

    fn run(&self) -> RebuildReport {
        Rebuilder::new(&self.config, DefaultSourceProvider)
            .run()
            .expect("rebuild failed")
    }

    fn out(&self, name: &str) -> PathBuf {
        self.config.output_dir.join(name)
    }
}

fn example_annotation() -> Value {
    json!({
        "conversation_id": "abc",
        "dataset_source": "lmsys",
        "specialty_conversation_classification": 4,
        "taxonomy_messages_classified": [{"taxonomy_codes": ["B", "A"]}],
        "leading_question_classifications": [
            {"user_message_original_turn_index": 2, "classification": "Y"}
        ]
    })
}

fn example_conversation() -> Value {
    json!([
        {"role": "user", "content": "hi"},
        {"role": "assistant", "content": "hello"},
        {"role": "user", "content": "am I dying?"}
    ])
}

#[test]
fn rebuild_joins_annotations_and_writes_all_outputs() {
    let fixture = Fixture::new(
        &[
            example_annotation(),
            json!({
                "conversation_id": "wc-1",
                "dataset_source": "wildchat",
                "specialty_conversation_classification": 2
            }),
        ],
        &[
            json!({"conversation_id": "zzz", "conversation": []}),
            json!({
                "conversation_id": "abc",
                "model": "vicuna-13b",
                "conversation": example_conversation()
            }),
        ],
        &[json!({
            "conversation_hash": "wc-1",
            "web_url": "https://example.org/wc-1",
            "conversation": [{"role": "user", "content": "I can't sleep"}]
        })],
    );
    let report = fixture.run();

    assert!(report.is_complete());
    assert!(!report.is_empty_run());
    assert_eq!(report.requested, 2);
    assert_eq!(report.merged, 2);
    assert_eq!(report.persisted, 2);
    assert_eq!(report.full_review_rows, 4);
    assert_eq!(report.sycophancy_review_rows, 1);

    let dataset = read_dataset(&fixture.out("HealthChat-11K_v1.0.0.jsonl"));
    assert_eq!(dataset.len(), 2);
    assert!(
        dataset
            .iter()
            .all(|record| record["dataset_version"] == json!("1.0.0"))
    );
    assert_eq!(dataset[0]["conversation_id"], json!("abc"));
    assert_eq!(dataset[0]["model"], json!("vicuna-13b"));
    assert_eq!(dataset[1]["conversation_id"], json!("wc-1"));
    assert_eq!(dataset[1]["conversation_hash"], json!("wc-1"));

    let full = read_csv(&fixture.out("HealthChat-11K_v1.0.0_full_review.csv"));
    assert_eq!(
        full,
        vec![
            vec![
                "Conversation ID",
                "Web URL",
                "Specialty",
                "Turn Index",
                "Role",
                "Message Text",
                "Taxonomy Codes"
            ],
            vec!["abc", "N/A", "Cardiology", "0", "user", "hi", "A; B"],
            vec!["abc", "N/A", "Cardiology", "1", "assistant", "hello", ""],
            vec!["abc", "N/A", "Cardiology", "2", "user", "am I dying?", ""],
            vec![
                "wc-1",
                "https://example.org/wc-1",
                "Mental Health",
                "0",
                "user",
                "I can't sleep",
                ""
            ],
        ]
    );

    let sycophancy = read_csv(&fixture.out("HealthChat-11K_v1.0.0_sycophancy_review.csv"));
    assert_eq!(sycophancy.len(), 2);
    assert_eq!(sycophancy[0][2], "User Message Original Turn Index");
    assert_eq!(
        sycophancy[1],
        vec!["abc", "N/A", "2", "hello", "am I dying?", "", "Y"]
    );
}

#[test]
fn ids_absent_from_their_corpus_are_reported_in_annotation_order() {
    let fixture = Fixture::new(
        &[
            json!({"conversation_id": "gone-2", "dataset_source": "lmsys"}),
            json!({"conversation_id": "abc", "dataset_source": "lmsys"}),
            json!({"conversation_id": "gone-1", "dataset_source": "lmsys"}),
            json!({"conversation_id": "no-source"}),
            json!({"conversation_id": "other", "dataset_source": "sharegpt"}),
        ],
        &[json!({"conversation_id": "abc", "conversation": example_conversation()})],
        &[json!({"conversation_hash": "unrelated", "conversation": []})],
    );
    let report = fixture.run();

    assert!(!report.is_complete());
    assert_eq!(report.requested, 3);
    assert_eq!(report.merged, 1);
    assert_eq!(report.missing_total(), 2);
    let lmsys = &report.sources[0];
    assert_eq!(lmsys.source_id, "lmsys");
    assert_eq!(lmsys.missing, vec!["gone-2", "gone-1"]);
    assert!(lmsys.failure.is_none());
    // wildchat had nothing requested and is never opened
    assert_eq!(report.sources.len(), 1);
}

#[test]
fn scanning_stops_after_the_last_match() {
    let mut lmsys = vec![json!({"conversation_id": "abc", "conversation": example_conversation()})];
    // rows after the last match are not decoded, so a corrupt tail is never seen
    lmsys.push(json!({"conversation_id": "later", "conversation": []}));
    let fixture = Fixture::new(&[example_annotation()], &lmsys, &[]);
    let shard = fixture
        .config
        .corpus("lmsys")
        .and_then(|corpus| corpus.snapshot_dir.clone())
        .expect("lmsys snapshot configured")
        .join("data/train-00000-of-00001.jsonl");
    let mut body = fs::read_to_string(&shard).expect("failed reading shard");
    body.push_str("{not json\n");
    fs::write(&shard, body).expect("failed rewriting shard");

    let report = fixture.run();
    assert_eq!(report.sources[0].scanned, 1);
    assert_eq!(report.sources[0].skipped, 0);
    assert!(report.is_complete());
}

#[test]
fn undecodable_corpus_rows_are_skipped() {
    let fixture = Fixture::new(&[example_annotation()], &[], &[]);
    let shard = fixture
        .config
        .corpus("lmsys")
        .and_then(|corpus| corpus.snapshot_dir.clone())
        .expect("lmsys snapshot configured")
        .join("data/train-00000-of-00001.jsonl");
    let good = serde_json::to_string(
        &json!({"conversation_id": "abc", "conversation": example_conversation()}),
    )
    .expect("failed encoding row");
    fs::write(&shard, format!("{{broken\n\n{good}\n")).expect("failed writing shard");

    let report = fixture.run();
    assert_eq!(report.sources[0].skipped, 1);
    assert_eq!(report.merged, 1);
    assert!(report.is_complete());
}

#[test]
fn invalid_utf8_rows_are_skipped_without_ending_the_scan() {
    let fixture = Fixture::new(&[example_annotation()], &[], &[]);
    let shard = fixture
        .config
        .corpus("lmsys")
        .and_then(|corpus| corpus.snapshot_dir.clone())
        .expect("lmsys snapshot configured")
        .join("data/train-00000-of-00001.jsonl");
    let mut body = b"{\"conversation_id\":\"zzz\",\"note\":\"".to_vec();
    body.extend_from_slice(&[0xff, 0xfe]);
    body.extend_from_slice(b"\"}\n");
    let good = serde_json::to_string(
        &json!({"conversation_id": "abc", "conversation": example_conversation()}),
    )
    .expect("failed encoding row");
    body.extend_from_slice(good.as_bytes());
    body.push(b'\n');
    fs::write(&shard, body).expect("failed writing shard");

    let report = fixture.run();
    assert_eq!(report.sources[0].skipped, 1);
    assert!(report.sources[0].failure.is_none());
    assert_eq!(report.merged, 1);
    assert!(report.is_complete());
}

#[test]
fn parquet_timestamps_reach_the_dataset_as_iso_8601() {
    let fixture = Fixture::new(
        &[json!({"conversation_id": "h1", "dataset_source": "wildchat"})],
        &[],
        &[],
    );
    let shard = fixture
        .config
        .corpus("wildchat")
        .and_then(|corpus| corpus.snapshot_dir.clone())
        .expect("wildchat snapshot configured")
        .join("data/train-00001-of-00002.parquet");
    write_timestamped_parquet(&shard, &[("h0", 0), ("h1", 1_681_000_973_000_000)]);

    let report = fixture.run();
    assert_eq!(report.merged, 1);
    let dataset = read_dataset(&fixture.out("HealthChat-11K_v1.0.0.jsonl"));
    assert_eq!(dataset[0]["conversation_hash"], json!("h1"));
    assert_eq!(dataset[0]["timestamp"], json!("2023-04-09T00:42:53+00:00"));
    assert_eq!(dataset[0]["dataset_version"], json!("1.0.0"));
}

#[test]
fn unavailable_corpus_is_reported_and_other_sources_still_run() {
    let mut fixture = Fixture::new(
        &[
            example_annotation(),
            json!({"conversation_id": "wc-1", "dataset_source": "wildchat"}),
        ],
        &[],
        &[json!({"conversation_hash": "wc-1", "conversation": []})],
    );
    let missing_dir = fixture.config.output_dir.with_file_name("nowhere");
    fixture.config.corpora[0] = CorpusConfig::lmsys().with_snapshot_dir(missing_dir);

    let report = fixture.run();
    assert_eq!(report.sources.len(), 2);
    assert!(report.sources[0].failure.is_some());
    assert_eq!(report.sources[0].missing, vec!["abc"]);
    assert_eq!(report.sources[1].matched, 1);
    assert_eq!(report.merged, 1);
    assert!(fixture.out("HealthChat-11K_v1.0.0_full_review.csv").exists());
}

#[test]
fn missing_annotation_file_is_fatal_and_writes_no_dataset() {
    let mut fixture = Fixture::new(&[], &[], &[]);
    let absent = fixture.config.output_dir.with_file_name("absent.jsonl");
    fixture.config.annotations.local_path = Some(absent);

    let err = Rebuilder::new(&fixture.config, DefaultSourceProvider)
        .run()
        .expect_err("rebuild should fail without annotations");
    assert!(matches!(err, RebuildError::Annotations(_)));
    assert!(!fixture.out("HealthChat-11K_v1.0.0.jsonl").exists());
}

#[test]
fn empty_index_ends_the_run_without_outputs() {
    let fixture = Fixture::new(
        &[json!({"conversation_id": "x", "dataset_source": "unknown"})],
        &[],
        &[],
    );
    let report = fixture.run();
    assert_eq!(report.requested, 0);
    assert!(report.is_empty_run());
    assert!(report.sources.is_empty());
    assert!(!fixture.out("HealthChat-11K_v1.0.0.jsonl").exists());
    assert!(!fixture.out("HealthChat-11K_v1.0.0_full_review.csv").exists());
}

#[test]
fn cli_runs_against_local_snapshots() {
    let fixture = Fixture::new(
        &[example_annotation()],
        &[json!({"conversation_id": "abc", "conversation": example_conversation()})],
        &[],
    );
    let config = &fixture.config;
    let args = vec![
        "--dataset-version".to_string(),
        "1.0.0".to_string(),
        "--output-dir".to_string(),
        config.output_dir.display().to_string(),
        "--annotations-file".to_string(),
        config
            .annotations
            .local_path
            .as_ref()
            .expect("annotations configured")
            .display()
            .to_string(),
        "--source".to_string(),
        "lmsys".to_string(),
        "--snapshot".to_string(),
        format!(
            "lmsys={}",
            config
                .corpus("lmsys")
                .and_then(|corpus| corpus.snapshot_dir.as_ref())
                .expect("lmsys snapshot configured")
                .display()
        ),
    ];

    let report = healthchat::cli::run_rebuild(args.into_iter())
        .expect("cli rebuild failed")
        .expect("cli printed help instead of running");
    assert_eq!(report.merged, 1);
    assert_eq!(report.sources.len(), 1);
    assert_eq!(
        read_dataset(&fixture.out("HealthChat-11K_v1.0.0.jsonl")).len(),
        1
    );
}
