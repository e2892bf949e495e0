use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::analyze;
use crate::chapters::ChapterList;
use crate::cli::{BuildArgs, MetadataArgs};
use crate::epub::{self, PackageOptions};
use crate::error::JobError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::formats::{ChapterStatus, StoryMetadata};
use crate::orchestrator::{Orchestrator, ProgressEvent};
use crate::registry::Registry;
use crate::strategy::default;
use crate::urls::safe_for_file_name;

const FILE_NAME_MAX_CHARS: usize = 50;

pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    let root = analyze::parse_http_url(&args.url)?;
    let job = args.job.to_config();
    let stylesheet = match &args.stylesheet {
        Some(path) => Some(
            std::fs::read_to_string(path).with_context(|| format!("read stylesheet: {path}"))?,
        ),
        None => None,
    };

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&args.fetch.to_config())?);
    let registry = Registry::with_builtin();
    let strategy = registry.resolve(&root);

    let story_file = args
        .story
        .as_deref()
        .map(|path| analyze::read_story(Path::new(path)))
        .transpose()?;
    let chapter_file = args
        .chapters
        .as_deref()
        .map(|path| ChapterList::read_jsonl(Path::new(path)))
        .transpose()?;

    let mut root_fetched_at = None;
    let (metadata, mut chapters) = match (story_file, chapter_file) {
        (Some(metadata), Some(chapters)) => (metadata, chapters),
        (story_file, chapter_file) => {
            tracing::info!(url = %root, "build: analyze");
            let analysis =
                analyze::analyze(fetcher.as_ref(), &registry, &root, args.likely_chapters_only)
                    .await
                    .context("analyze")?;
            root_fetched_at = Some(Instant::now());
            (
                story_file.unwrap_or(analysis.metadata),
                chapter_file.unwrap_or(analysis.chapters),
            )
        }
    };

    curate(&mut chapters, &args);
    let metadata = apply_overrides(metadata, &args.metadata);

    let out_path = match &args.out {
        Some(out) => PathBuf::from(out),
        None => default_output_path(&metadata.title),
    };
    if out_path.exists() && !args.force {
        anyhow::bail!("output already exists: {}", out_path.display());
    }
    job.validate(chapters.included_count())
        .context("chapter selection")?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; stopping after the current chapter");
            watcher.cancel();
        }
    });

    let (progress_tx, progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let reporter = tokio::spawn(report_progress(progress_rx));

    tracing::info!(
        strategy = strategy.name,
        chapters = chapters.included_count(),
        "build: retrieve"
    );
    let mut orchestrator = Orchestrator::new(fetcher, job).with_progress(progress_tx);
    if let Some(at) = root_fetched_at {
        orchestrator.note_request(&root, at);
    }
    let result = orchestrator.run(&strategy, &mut chapters, &cancel).await;
    drop(orchestrator);
    let _ = reporter.await;
    let outcome = result.context("retrieve chapters")?;

    tracing::info!(out = %out_path.display(), "build: package");
    let options = PackageOptions {
        modified: Utc::now(),
        stylesheet,
    };
    let bytes = epub::assemble(&metadata, &outcome.chapters, &options)
        .map_err(JobError::from)
        .context("package epub")?;
    epub::write_epub(&out_path, &bytes, args.force)?;

    tracing::info!(
        out = %out_path.display(),
        chapters = outcome.chapters.len(),
        retrieved = chapters.count_with_status(ChapterStatus::Complete),
        failed = outcome.failed,
        cancelled = outcome.cancelled,
        "build: done"
    );
    Ok(())
}

/// Applies range selection, then ordering. Positions in `--first`/`--last`
/// refer to the list before reversing.
fn curate(chapters: &mut ChapterList, args: &BuildArgs) {
    if args.likely_chapters_only && args.chapters.is_some() {
        chapters.retain(|c| default::is_likely_chapter_link(&c.source_url, &c.title));
    }
    if args.first.is_some() || args.last.is_some() {
        let first = args.first.unwrap_or(1);
        let last = args.last.unwrap_or(chapters.len());
        chapters.include_range(first, last);
    }
    if args.reverse {
        chapters.reverse();
    }
}

fn apply_overrides(mut metadata: StoryMetadata, overrides: &MetadataArgs) -> StoryMetadata {
    let set = |field: &mut String, value: &Option<String>| {
        if let Some(value) = value.as_deref().map(str::trim)
            && !value.is_empty()
        {
            *field = value.to_owned();
        }
    };
    set(&mut metadata.title, &overrides.title);
    set(&mut metadata.author, &overrides.author);
    set(&mut metadata.language, &overrides.language);

    let replace = |field: &mut Option<String>, value: &Option<String>| {
        if value.is_some() {
            field.clone_from(value);
        }
    };
    replace(&mut metadata.subject, &overrides.subject);
    replace(&mut metadata.description, &overrides.description);
    replace(&mut metadata.series_name, &overrides.series);
    replace(&mut metadata.series_index, &overrides.series_index);
    replace(&mut metadata.identifier, &overrides.identifier);
    if overrides.uuid {
        metadata.identifier = Some(format!("urn:uuid:{}", uuid::Uuid::new_v4()));
    }
    metadata
}

fn default_output_path(title: &str) -> PathBuf {
    let stem = safe_for_file_name(title, FILE_NAME_MAX_CHARS);
    if stem.is_empty() {
        PathBuf::from("story.epub")
    } else {
        PathBuf::from(format!("{stem}.epub"))
    }
}

async fn report_progress(mut events: UnboundedReceiver<ProgressEvent>) {
    let mut total = 0;
    let mut done = 0;
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Started { total: count } => total = count,
            ProgressEvent::ChapterCompleted { .. } | ProgressEvent::ChapterFailed { .. } => {
                done += 1;
                tracing::info!(done, total, "progress");
            }
            ProgressEvent::ChapterStarted { .. }
            | ProgressEvent::Finished { .. }
            | ProgressEvent::Cancelled { .. } => {}
        }
    }
}
