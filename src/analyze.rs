use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use url::Url;

use crate::chapters::ChapterList;
use crate::cli::AnalyzeArgs;
use crate::fetch::{FetchResponse, Fetcher, HttpFetcher};
use crate::formats::StoryMetadata;
use crate::page::Page;
use crate::registry::Registry;
use crate::strategy::{Strategy, default};
use crate::urls::is_http_url;

pub const STORY_FILE: &str = "story.json";
pub const CHAPTERS_FILE: &str = "chapters.jsonl";

#[derive(Debug)]
pub struct Analysis {
    pub strategy: Strategy,
    pub metadata: StoryMetadata,
    pub chapters: ChapterList,
}

pub async fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let root = parse_http_url(&args.url)?;
    let out_dir = PathBuf::from(&args.out);
    if out_dir.exists() {
        anyhow::bail!("analyze output directory already exists: {}", out_dir.display());
    }

    let fetcher = HttpFetcher::new(&args.fetch.to_config())?;
    let registry = Registry::with_builtin();
    let analysis = analyze(&fetcher, &registry, &root, args.likely_chapters_only).await?;

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create analyze dir: {}", out_dir.display()))?;
    write_story(&out_dir.join(STORY_FILE), &analysis.metadata)?;
    analysis
        .chapters
        .write_jsonl(&out_dir.join(CHAPTERS_FILE))?;

    tracing::info!(
        strategy = analysis.strategy.name,
        title = %analysis.metadata.title,
        chapters = analysis.chapters.len(),
        out = %out_dir.display(),
        "analyze: done"
    );
    Ok(())
}

pub async fn analyze(
    fetcher: &dyn Fetcher,
    registry: &Registry,
    root: &Url,
    likely_chapters_only: bool,
) -> anyhow::Result<Analysis> {
    let strategy = registry.resolve(root);
    tracing::info!(url = %root, strategy = strategy.name, "analyze: fetch root page");
    let response = fetcher
        .fetch(root)
        .await
        .with_context(|| format!("fetch story page: {root}"))?;
    Ok(analyze_page(strategy, &response, likely_chapters_only))
}

fn analyze_page(strategy: Strategy, response: &FetchResponse, likely_chapters_only: bool) -> Analysis {
    let page = Page::parse(response.final_url.clone(), &response.content);
    let metadata = strategy.extract_metadata(&page);
    let mut chapters = ChapterList::from_descriptors((strategy.discover_chapters)(&page));

    if likely_chapters_only {
        let before = chapters.len();
        chapters.retain(|c| default::is_likely_chapter_link(&c.source_url, &c.title));
        tracing::debug!(dropped = before - chapters.len(), "filtered unlikely chapter links");
    }

    Analysis {
        strategy,
        metadata,
        chapters,
    }
}

pub fn parse_http_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("parse url: {raw}"))?;
    if !is_http_url(&url) {
        anyhow::bail!("url must be http or https: {raw}");
    }
    Ok(url)
}

pub fn write_story(path: &Path, metadata: &StoryMetadata) -> anyhow::Result<()> {
    let mut out = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .with_context(|| format!("create story file: {}", path.display()))?;
    serde_json::to_writer_pretty(&mut out, metadata).context("serialize story metadata")?;
    out.write_all(b"\n").context("write story file newline")?;
    Ok(())
}

pub fn read_story(path: &Path) -> anyhow::Result<StoryMetadata> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read story file: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse story file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(url: &str, html: &str) -> FetchResponse {
        FetchResponse {
            content: html.to_owned(),
            final_url: Url::parse(url).expect("parse url"),
            status: 200,
        }
    }

    #[test]
    fn analyze_page_collects_metadata_and_chapters() {
        let response = response(
            "https://example.com/story",
            r#"<html lang="en-US"><head><title>The Story</title></head><body>
                <a href="/about">About</a>
                <a href="/story/chapter-1">Chapter 1</a>
                <a href="/story/chapter-2">Chapter 2</a>
            </body></html>"#,
        );
        let analysis = analyze_page(default::strategy(), &response, false);
        assert_eq!(analysis.metadata.title, "The Story");
        assert_eq!(analysis.metadata.language, "en-US");
        assert_eq!(analysis.chapters.len(), 3);

        let filtered = analyze_page(default::strategy(), &response, true);
        assert_eq!(filtered.chapters.len(), 2);
        assert!(filtered.chapters.is_dense());
    }

    #[test]
    fn only_http_urls_are_accepted() {
        assert!(parse_http_url("https://example.com/").is_ok());
        assert!(parse_http_url("file:///etc/passwd").is_err());
        assert!(parse_http_url("not a url").is_err());
    }

    #[test]
    fn story_file_round_trip() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join(STORY_FILE);
        let mut metadata = StoryMetadata::new("https://example.com/story");
        metadata.series_name = Some("Saga".to_owned());

        write_story(&path, &metadata)?;
        assert_eq!(read_story(&path)?, metadata);
        assert!(write_story(&path, &metadata).is_err());
        Ok(())
    }
}
