//! Sequential row readers over jsonl/ndjson/parquet shard files.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, Utc};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::reader::RowIter;
use parquet::record::{Field, Row};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::constants::shards::SHARD_EXTENSIONS;
use crate::errors::RebuildError;
use crate::types::SourceId;

/// True when `path` has one of the accepted shard extensions.
pub fn is_shard_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SHARD_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

fn is_parquet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
}

/// True when a shard path (local or remote) belongs to `split`.
///
/// Matches the Hub layouts `<split>/...`, `...-<split>-...` and `<split>-...`.
/// An empty split accepts everything.
pub fn belongs_to_split(path: &str, split: &str) -> bool {
    if split.is_empty() {
        return true;
    }
    let split_dir = format!("{split}/");
    let split_token = format!("-{split}-");
    let split_prefix = format!("{split}-");
    path.starts_with(&split_dir)
        || path.contains(&format!("/{split_dir}"))
        || path.contains(&split_token)
        || Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(&split_prefix))
}

/// List shard files under `root` in a stable (sorted) order.
///
/// `root` may also be a single shard file. Split filtering applies to paths
/// relative to `root`; when nothing matches the split every shard is used.
pub fn discover_shards(
    source_id: &str,
    root: &Path,
    split: &str,
) -> Result<Vec<PathBuf>, RebuildError> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        return Err(RebuildError::SourceUnavailable {
            source_id: source_id.to_string(),
            reason: format!("snapshot path {} does not exist", root.display()),
        });
    }

    let mut shard_paths = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.file_type().is_file() && is_shard_file(entry.path()) {
            shard_paths.push(entry.path().to_path_buf());
        }
    }
    shard_paths.sort();
    if shard_paths.is_empty() {
        return Err(RebuildError::SourceUnavailable {
            source_id: source_id.to_string(),
            reason: format!(
                "no shard files found under {} with extensions {:?}",
                root.display(),
                SHARD_EXTENSIONS
            ),
        });
    }

    let in_split: Vec<PathBuf> = shard_paths
        .iter()
        .filter(|path| {
            path.strip_prefix(root)
                .ok()
                .and_then(|relative| relative.to_str())
                .is_some_and(|relative| belongs_to_split(&relative.replace('\\', "/"), split))
        })
        .cloned()
        .collect();
    if in_split.is_empty() {
        Ok(shard_paths)
    } else {
        Ok(in_split)
    }
}

enum ShardKind {
    Lines(BufReader<File>),
    Parquet(RowIter<'static>),
}

/// Row iterator over one shard file, yielding JSON rows in file order.
pub struct ShardRows {
    source_id: SourceId,
    path: PathBuf,
    kind: ShardKind,
    line_no: usize,
    failed: bool,
}

impl ShardRows {
    /// Open a shard for sequential reading.
    pub fn open(source_id: &str, path: &Path) -> Result<Self, RebuildError> {
        let file = File::open(path).map_err(|err| RebuildError::SourceUnavailable {
            source_id: source_id.to_string(),
            reason: format!("failed opening shard {}: {err}", path.display()),
        })?;
        let kind = if is_parquet(path) {
            let reader =
                SerializedFileReader::new(file).map_err(|err| RebuildError::SourceUnavailable {
                    source_id: source_id.to_string(),
                    reason: format!("failed reading parquet shard {}: {err}", path.display()),
                })?;
            let reader: Box<dyn FileReader> = Box::new(reader);
            ShardKind::Parquet(RowIter::from_file_into(reader))
        } else {
            ShardKind::Lines(BufReader::new(file))
        };
        Ok(Self {
            source_id: source_id.to_string(),
            path: path.to_path_buf(),
            kind,
            line_no: 0,
            failed: false,
        })
    }

    fn next_line_row(&mut self) -> Option<Result<Value, RebuildError>> {
        let ShardKind::Lines(reader) = &mut self.kind else {
            return None;
        };
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    self.failed = true;
                    return Some(Err(RebuildError::SourceUnavailable {
                        source_id: self.source_id.clone(),
                        reason: format!("failed reading shard {}: {err}", self.path.display()),
                    }));
                }
            }
            self.line_no += 1;
            // The line is fully consumed, so a bad one only costs that row.
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(err) => {
                    return Some(Err(RebuildError::SourceInconsistent {
                        source_id: self.source_id.clone(),
                        details: format!(
                            "invalid UTF-8 in {} at line {}: {err}",
                            self.path.display(),
                            self.line_no
                        ),
                    }));
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(serde_json::from_str::<Value>(trimmed).map_err(|err| {
                RebuildError::SourceInconsistent {
                    source_id: self.source_id.clone(),
                    details: format!(
                        "failed decoding JSON row in {} at line {}: {err}",
                        self.path.display(),
                        self.line_no
                    ),
                }
            }));
        }
    }

    fn next_parquet_row(&mut self) -> Option<Result<Value, RebuildError>> {
        let ShardKind::Parquet(rows) = &mut self.kind else {
            return None;
        };
        let row = rows.next()?;
        self.line_no += 1;
        Some(match row {
            Ok(row) => Ok(row_to_json(&row)),
            Err(err) => {
                self.failed = true;
                Err(RebuildError::SourceUnavailable {
                    source_id: self.source_id.clone(),
                    reason: format!(
                        "failed reading parquet row {} in {}: {err}",
                        self.line_no,
                        self.path.display()
                    ),
                })
            }
        })
    }
}

impl Iterator for ShardRows {
    type Item = Result<Value, RebuildError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.kind {
            ShardKind::Lines(_) => self.next_line_row(),
            ShardKind::Parquet(_) => self.next_parquet_row(),
        }
    }
}

/// Convert a parquet record to a JSON object, keeping column order.
///
/// Timestamps become RFC 3339 strings with an explicit offset and dates become
/// `YYYY-MM-DD`; everything else follows parquet's own JSON rendering.
fn row_to_json(row: &Row) -> Value {
    Value::Object(
        row.get_column_iter()
            .map(|(name, field)| (name.clone(), field_to_json(field)))
            .collect(),
    )
}

fn field_to_json(field: &Field) -> Value {
    match field {
        Field::TimestampMillis(millis) => DateTime::from_timestamp_millis(*millis)
            .map(|ts| Value::String(iso_timestamp(ts)))
            .unwrap_or_else(|| field.to_json_value()),
        Field::TimestampMicros(micros) => DateTime::from_timestamp_micros(*micros)
            .map(|ts| Value::String(iso_timestamp(ts)))
            .unwrap_or_else(|| field.to_json_value()),
        Field::Date(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(TimeDelta::days(i64::from(*days))))
            .map(|date| Value::String(date.to_string()))
            .unwrap_or_else(|| field.to_json_value()),
        Field::Group(row) => row_to_json(row),
        Field::ListInternal(list) => {
            Value::Array(list.elements().iter().map(field_to_json).collect())
        }
        Field::MapInternal(map) => {
            let mut object = Map::new();
            for (key, value) in map.entries() {
                let key = match key {
                    Field::Str(key) => key.clone(),
                    other => other.to_string(),
                };
                object.insert(key, field_to_json(value));
            }
            Value::Object(object)
        }
        other => other.to_json_value(),
    }
}

/// Seconds precision unless the value carries sub-second digits, then microseconds.
fn iso_timestamp(ts: DateTime<Utc>) -> String {
    let precision = if ts.timestamp_subsec_nanos() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    ts.to_rfc3339_opts(precision, false)
}

/// Chains `ShardRows` over a list of local shard files, opening each lazily.
pub struct LocalShardChain {
    source_id: SourceId,
    pending: std::vec::IntoIter<PathBuf>,
    current: Option<ShardRows>,
}

impl LocalShardChain {
    /// Stream `paths` in order.
    pub fn new(source_id: impl Into<SourceId>, paths: Vec<PathBuf>) -> Self {
        Self {
            source_id: source_id.into(),
            pending: paths.into_iter(),
            current: None,
        }
    }
}

impl Iterator for LocalShardChain {
    type Item = Result<Value, RebuildError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                if let Some(row) = current.next() {
                    return Some(row);
                }
                self.current = None;
            }
            let path = self.pending.next()?;
            match ShardRows::open(&self.source_id, &path) {
                Ok(rows) => self.current = Some(rows),
                Err(err) => {
                    self.pending = Vec::new().into_iter();
                    return Some(Err(err));
                }
            }
        }
    }
}
