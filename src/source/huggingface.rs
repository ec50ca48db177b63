//! Hugging Face Hub sources: the annotation file and corpus shards streamed one at a time.

use hf_hub::api::sync::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{CorpusConfig, HubConfig};
use crate::constants::shards::{HUB_RETRIES, MISSING_CACHE_BACKOFF_MS, MISSING_CACHE_RETRIES};
use crate::errors::RebuildError;
use crate::types::RepoId;

use super::shards::{ShardRows, belongs_to_split, is_shard_file};
use super::{RowSource, RowStream};

fn build_api(source_id: &str, hub: &HubConfig) -> Result<Api, RebuildError> {
    let mut builder = ApiBuilder::new()
        .with_progress(hub.progress)
        .with_retries(HUB_RETRIES)
        .with_token(hub.token.clone());
    if let Some(cache_dir) = &hub.cache_dir {
        builder = builder.with_cache_dir(cache_dir.clone());
    }
    builder.build().map_err(|err| RebuildError::SourceUnavailable {
        source_id: source_id.to_string(),
        reason: format!("failed building hf-hub client: {err}"),
    })
}

fn dataset_repo(api: &Api, dataset: &str) -> ApiRepo {
    api.repo(Repo::new(dataset.to_string(), RepoType::Dataset))
}

/// Fetch `remote_path` into the hf-hub cache and return the local path.
///
/// hf-hub occasionally reports a cache path before the file is linked in;
/// a bounded number of forced downloads covers that window.
fn fetch_file(
    source_id: &str,
    repo_api: &ApiRepo,
    remote_path: &str,
) -> Result<PathBuf, RebuildError> {
    let mut local = repo_api
        .get(remote_path)
        .map_err(|err| RebuildError::SourceUnavailable {
            source_id: source_id.to_string(),
            reason: format!("failed downloading '{remote_path}' from hf-hub: {err}"),
        })?;
    let mut attempts = 0;
    while !local.exists() && attempts < MISSING_CACHE_RETRIES {
        attempts += 1;
        thread::sleep(Duration::from_millis(MISSING_CACHE_BACKOFF_MS));
        local = repo_api
            .download(remote_path)
            .map_err(|err| RebuildError::SourceUnavailable {
                source_id: source_id.to_string(),
                reason: format!(
                    "hf-hub returned missing cache path for '{remote_path}', and forced download failed: {err}"
                ),
            })?;
    }
    if !local.exists() {
        return Err(RebuildError::SourceUnavailable {
            source_id: source_id.to_string(),
            reason: format!(
                "hf-hub returned non-existent cache file for '{remote_path}' at {}",
                local.display()
            ),
        });
    }
    Ok(local)
}

/// One named file inside a Hub dataset repository, read as a single shard.
///
/// Used for the master annotation file.
pub struct HubFileSource {
    repo_id: RepoId,
    filename: String,
    hub: HubConfig,
}

impl HubFileSource {
    /// Read `filename` from dataset repository `repo_id`.
    pub fn new(repo_id: impl Into<RepoId>, filename: impl Into<String>, hub: HubConfig) -> Self {
        Self {
            repo_id: repo_id.into(),
            filename: filename.into(),
            hub,
        }
    }
}

impl RowSource for HubFileSource {
    fn id(&self) -> &str {
        &self.repo_id
    }

    fn rows(&self) -> Result<RowStream<'_>, RebuildError> {
        info!(
            "[healthchat:hf] downloading {}/{}",
            self.repo_id, self.filename
        );
        let api = build_api(&self.repo_id, &self.hub)?;
        let repo_api = dataset_repo(&api, &self.repo_id);
        let local = fetch_file(&self.repo_id, &repo_api, &self.filename)?;
        Ok(Box::new(ShardRows::open(&self.repo_id, &local)?))
    }
}

/// A Hub dataset split streamed shard by shard.
///
/// Shards are listed once per stream and downloaded only when the previous
/// shard is exhausted, so a consumer that stops early never fetches the rest.
pub struct HubDatasetSource {
    corpus: CorpusConfig,
    hub: HubConfig,
}

impl HubDatasetSource {
    /// Stream the configured corpus split from the Hub.
    pub fn new(corpus: CorpusConfig, hub: HubConfig) -> Self {
        Self { corpus, hub }
    }

    fn list_remote_shards(&self, repo_api: &ApiRepo) -> Result<Vec<String>, RebuildError> {
        info!(
            "[healthchat:hf] reading remote file list for dataset {}",
            self.corpus.dataset
        );
        let info = repo_api
            .info()
            .map_err(|err| RebuildError::SourceUnavailable {
                source_id: self.corpus.source_id.clone(),
                reason: format!("failed reading hf-hub repository info: {err}"),
            })?;

        let mut candidates: Vec<String> = info
            .siblings
            .into_iter()
            .map(|sibling| sibling.rfilename)
            .filter(|remote| is_shard_file(Path::new(remote)))
            .filter(|remote| belongs_to_split(remote, &self.corpus.split))
            .collect();
        candidates.sort();
        if candidates.is_empty() {
            return Err(RebuildError::SourceUnavailable {
                source_id: self.corpus.source_id.clone(),
                reason: format!(
                    "no shard files for split '{}' in dataset {}",
                    self.corpus.split, self.corpus.dataset
                ),
            });
        }
        Ok(candidates)
    }
}

impl RowSource for HubDatasetSource {
    fn id(&self) -> &str {
        &self.corpus.source_id
    }

    fn rows(&self) -> Result<RowStream<'_>, RebuildError> {
        let api = build_api(&self.corpus.source_id, &self.hub)?;
        let repo_api = dataset_repo(&api, &self.corpus.dataset);
        let pending: VecDeque<String> = self.list_remote_shards(&repo_api)?.into();
        info!(
            "[healthchat:hf] {} shard(s) available for '{}' split '{}'",
            pending.len(),
            self.corpus.dataset,
            self.corpus.split
        );
        Ok(Box::new(HubShardStream {
            source_id: &self.corpus.source_id,
            repo_api,
            total: pending.len(),
            pending,
            current: None,
        }))
    }
}

struct HubShardStream<'a> {
    source_id: &'a str,
    repo_api: ApiRepo,
    total: usize,
    pending: VecDeque<String>,
    current: Option<ShardRows>,
}

impl HubShardStream<'_> {
    fn open_next(&mut self) -> Option<Result<ShardRows, RebuildError>> {
        let remote = self.pending.pop_front()?;
        info!(
            "[healthchat:hf] fetching shard {}/{} for '{}': {}",
            self.total - self.pending.len(),
            self.total,
            self.source_id,
            remote
        );
        Some(
            fetch_file(self.source_id, &self.repo_api, &remote)
                .and_then(|local| ShardRows::open(self.source_id, &local)),
        )
    }
}

impl Iterator for HubShardStream<'_> {
    type Item = Result<Value, RebuildError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                if let Some(row) = current.next() {
                    return Some(row);
                }
                self.current = None;
            }
            match self.open_next()? {
                Ok(rows) => self.current = Some(rows),
                Err(err) => {
                    warn!(
                        "[healthchat:hf] abandoning remaining {} shard(s) for '{}'",
                        self.pending.len(),
                        self.source_id
                    );
                    self.pending.clear();
                    return Some(Err(err));
                }
            }
        }
    }
}
