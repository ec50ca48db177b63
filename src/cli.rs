//! `healthchat-rebuild` command line: flag parsing, logging setup, and the run.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, error::ErrorKind};

use crate::config::RebuildConfig;
use crate::constants::dataset::{ANNOTATIONS_REPO_ID, DEFAULT_VERSION};
use crate::pipeline::{RebuildReport, Rebuilder};
use crate::source::DefaultSourceProvider;
use crate::types::SourceId;

#[derive(Debug, Parser)]
#[command(
    name = "healthchat-rebuild",
    disable_help_subcommand = true,
    about = "Rebuild the HealthChat-11K dataset and its review tables",
    long_about = "Join the master annotation file with the original LMSYS-Chat-1M and WildChat-1M conversations, write the versioned dataset as JSON lines, and derive the full and sycophancy review CSVs.",
    after_help = "Sources are read from local snapshots when given with --snapshot and streamed from the Hugging Face Hub otherwise."
)]
/// CLI for `healthchat-rebuild`.
///
/// Common usage:
/// - Rebuild the default version from the Hub: `healthchat-rebuild`
/// - Use a local annotation file: `--annotations-file annotations.jsonl`
/// - Use a local corpus snapshot: `--snapshot lmsys=/data/lmsys-chat-1m`
struct RebuildCli {
    #[arg(
        long = "dataset-version",
        env = "HEALTHCHAT_VERSION",
        default_value = DEFAULT_VERSION,
        help = "Dataset version to rebuild; selects the master annotation file"
    )]
    version: String,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        help = "Output directory (defaults to HealthChat-11K_v<VERSION>_artifacts)"
    )]
    output_dir: Option<PathBuf>,
    #[arg(
        long = "annotations-repo",
        value_name = "REPO_ID",
        default_value = ANNOTATIONS_REPO_ID,
        help = "Hub dataset repository holding the master annotation files"
    )]
    annotations_repo: String,
    #[arg(
        long = "annotations-file",
        value_name = "PATH",
        help = "Read annotations from a local jsonl/parquet file instead of the Hub"
    )]
    annotations_file: Option<PathBuf>,
    #[arg(
        long = "snapshot",
        value_name = "SOURCE=DIR",
        value_parser = parse_snapshot_arg,
        help = "Read a corpus from a local snapshot directory, repeat per source"
    )]
    snapshots: Vec<(SourceId, PathBuf)>,
    #[arg(
        long = "source",
        value_name = "SOURCE",
        help = "Only scan these sources (scan order is unchanged), repeat as needed"
    )]
    only_sources: Vec<SourceId>,
    #[arg(
        long = "cache-dir",
        value_name = "DIR",
        env = "HF_HUB_CACHE",
        help = "Cache directory for Hub downloads"
    )]
    cache_dir: Option<PathBuf>,
    #[arg(
        long = "hf-token",
        env = "HF_TOKEN",
        hide_env_values = true,
        help = "Hugging Face access token (LMSYS-Chat-1M is gated)"
    )]
    hf_token: Option<String>,
    #[arg(long = "progress", help = "Show Hub download progress bars")]
    progress: bool,
}

impl RebuildCli {
    fn into_config(self) -> Result<RebuildConfig, Box<dyn Error>> {
        let mut config = RebuildConfig::new(self.version);
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        config.annotations.repo_id = self.annotations_repo;
        config.annotations.local_path = self.annotations_file;
        config.hub.cache_dir = self.cache_dir;
        config.hub.token = self.hf_token;
        config.hub.progress = self.progress;

        for (source_id, dir) in self.snapshots {
            let corpus = config
                .corpora
                .iter_mut()
                .find(|corpus| corpus.source_id == source_id)
                .ok_or_else(|| format!("--snapshot names unknown source '{source_id}'"))?;
            corpus.snapshot_dir = Some(dir);
        }
        if !self.only_sources.is_empty() {
            if let Some(unknown) = self
                .only_sources
                .iter()
                .find(|source_id| config.corpus(source_id).is_none())
            {
                return Err(format!("--source names unknown source '{unknown}'").into());
            }
            config
                .corpora
                .retain(|corpus| self.only_sources.contains(&corpus.source_id));
        }
        Ok(config)
    }
}

/// Parse CLI arguments (without the program name) into a configuration.
///
/// Returns `Ok(None)` when help or version output was printed.
pub fn parse_config<I>(args_iter: I) -> Result<Option<RebuildConfig>, Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let Some(cli) = parse_cli::<RebuildCli, _>(
        std::iter::once("healthchat-rebuild".to_string()).chain(args_iter),
    )?
    else {
        return Ok(None);
    };
    cli.into_config().map(Some)
}

/// Parse arguments, run the rebuild and log the summary.
pub fn run_rebuild<I>(args_iter: I) -> Result<Option<RebuildReport>, Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let Some(config) = parse_config(args_iter)? else {
        return Ok(None);
    };
    let report = Rebuilder::new(&config, DefaultSourceProvider).run()?;
    report.log_summary(&config);
    Ok(Some(report))
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

fn parse_snapshot_arg(raw: &str) -> Result<(SourceId, PathBuf), String> {
    let (source, dir) = raw
        .split_once('=')
        .ok_or_else(|| format!("--snapshot expects SOURCE=DIR, got '{raw}'"))?;
    let source = source.trim();
    let dir = dir.trim();
    if source.is_empty() || dir.is_empty() {
        return Err(format!("--snapshot expects SOURCE=DIR, got '{raw}'"));
    }
    Ok((source.to_string(), PathBuf::from(dir)))
}
