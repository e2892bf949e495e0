use clap::{Args, Parser, Subcommand};

use crate::config::{
    DEFAULT_DELAY_MS, DEFAULT_MAX_CHAPTERS, DEFAULT_TIMEOUT_SECS, FetchConfig, JobConfig,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover a story's metadata and chapter list without downloading chapters.
    Analyze(AnalyzeArgs),
    /// Download chapters and package them as an EPUB.
    Build(BuildArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Story root URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Output directory for `story.json` and `chapters.jsonl`.
    #[arg(long)]
    pub out: String,

    /// Keep only links that look like chapters.
    #[arg(long)]
    pub likely_chapters_only: bool,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Story root URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Output EPUB path (default: derived from the story title).
    #[arg(long)]
    pub out: Option<String>,

    /// Chapter list to use instead of discovering one (`chapters.jsonl`).
    #[arg(long)]
    pub chapters: Option<String>,

    /// Story metadata to use instead of extracting it (`story.json`).
    #[arg(long)]
    pub story: Option<String>,

    /// First chapter to include (1-based).
    #[arg(long)]
    pub first: Option<usize>,

    /// Last chapter to include (1-based, inclusive).
    #[arg(long)]
    pub last: Option<usize>,

    /// Package chapters in reverse order.
    #[arg(long)]
    pub reverse: bool,

    /// Keep only links that look like chapters.
    #[arg(long)]
    pub likely_chapters_only: bool,

    /// Stylesheet replacing the default CSS.
    #[arg(long)]
    pub stylesheet: Option<String>,

    /// Overwrite an existing output file.
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub job: JobArgs,

    #[command(flatten)]
    pub fetch: FetchArgs,

    #[command(flatten)]
    pub metadata: MetadataArgs,
}

#[derive(Debug, Clone, Args)]
pub struct JobArgs {
    /// Minimum delay between requests to the same host.
    #[arg(long, default_value_t = DEFAULT_DELAY_MS)]
    pub delay_ms: u64,

    /// Refuse to run when more chapters than this are selected.
    #[arg(long, default_value_t = DEFAULT_MAX_CHAPTERS)]
    pub max_chapters: usize,

    /// Stop at the first chapter that fails instead of inserting a placeholder.
    #[arg(long)]
    pub abort_on_failure: bool,

    /// On Ctrl-C, package the chapters retrieved so far.
    #[arg(long)]
    pub keep_partial: bool,
}

impl JobArgs {
    pub fn to_config(&self) -> JobConfig {
        JobConfig {
            min_interval: std::time::Duration::from_millis(self.delay_ms),
            max_chapters: self.max_chapters,
            abort_on_first_failure: self.abort_on_failure,
            keep_partial: self.keep_partial,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Per-request timeout.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl FetchArgs {
    /// Environment defaults with command-line overrides applied.
    pub fn to_config(&self) -> FetchConfig {
        FetchConfig::from_env().with_timeout_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Args)]
pub struct MetadataArgs {
    /// Book title (default: extracted from the story page).
    #[arg(long)]
    pub title: Option<String>,

    /// Book author (default: extracted from the story page).
    #[arg(long)]
    pub author: Option<String>,

    /// BCP-47 language tag (default: extracted, else `en`).
    #[arg(long)]
    pub language: Option<String>,

    #[arg(long)]
    pub subject: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Series name, written as `calibre:series`.
    #[arg(long)]
    pub series: Option<String>,

    /// Position within the series.
    #[arg(long, requires = "series")]
    pub series_index: Option<String>,

    /// Unique identifier (default: the story URL).
    #[arg(long, conflicts_with = "uuid")]
    pub identifier: Option<String>,

    /// Use a random `urn:uuid:` identifier.
    #[arg(long)]
    pub uuid: bool,
}
