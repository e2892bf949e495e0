use std::sync::LazyLock;

use dom_query::{Document, Selection};
use regex::Regex;

use crate::chapters::ChapterList;
use crate::formats::{ChapterDescriptor, DEFAULT_LANGUAGE};
use crate::page::{Page, first_of, non_blank};
use crate::sanitize;
use crate::strategy::Strategy;
use crate::urls::resolve_href;

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    ".content",
    ".post-content",
    ".entry-content",
    ".chapter-content",
    ".story-content",
    "main",
    "#content",
    ".main-content",
    ".text-content",
    ".chapter-text",
    ".chapter-body",
    ".post-body",
    ".entry-body",
];

const MIN_CONTENT_CHARS: usize = 200;

const NAVIGATION_CLASS_WORDS: &[&str] =
    &["nav", "navigation", "menu", "sidebar", "header", "footer"];

const BODY_FURNITURE_SELECTOR: &str = "nav, header, footer, aside, .navigation, .nav, .menu, \
    .sidebar, .ads, .advertisement, .social-share, .comments";

const MAX_CHAPTER_TITLE_CHARS: usize = 200;

#[allow(clippy::expect_used)]
static LIKELY_CHAPTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?i)chapter", r"(?i)ch\s*\d+", r"(?i)episode", r"(?i)part", r"\d+"]
        .into_iter()
        .map(|pattern| Regex::new(pattern).expect("valid regex"))
        .collect()
});

pub fn strategy() -> Strategy {
    Strategy {
        name: "default",
        discover_chapters,
        locate_content_region,
        extract_title,
        extract_author,
        extract_language,
        extract_cover_url,
        extract_chapter_title,
        extract_description,
        extract_subject,
    }
}

pub fn discover_chapters(page: &Page) -> Vec<ChapterDescriptor> {
    chapters_from_links(page, &page.body().select("a[href]"))
}

pub fn chapters_from_links(page: &Page, links: &Selection) -> Vec<ChapterDescriptor> {
    let mut list = ChapterList::new();
    for node in links.nodes() {
        let link = Selection::from(*node);
        let Some(href) = link.attr("href") else {
            continue;
        };
        let Some(title) = non_blank(&link.text()) else {
            continue;
        };
        let Some(mut url) = resolve_href(&page.url, &href) else {
            continue;
        };
        url.set_fragment(None);
        list.push(ChapterDescriptor::new(url.as_str(), title));
    }
    list.into_descriptors()
}

/// Best-effort guess whether a link points at a chapter.
pub fn is_likely_chapter_link(href: &str, text: &str) -> bool {
    LIKELY_CHAPTER_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(text) || pattern.is_match(href))
}

pub fn locate_content_region(page: &Page) -> Document {
    for selector in CONTENT_SELECTORS {
        let candidate = page.doc.select(selector).first();
        if candidate.is_empty() {
            continue;
        }
        if has_significant_content(&candidate) {
            tracing::debug!(url = %page.url, selector, "content region located");
            return Document::from(candidate.inner_html().to_string());
        }
        tracing::debug!(url = %page.url, selector, "content region candidate rejected");
    }

    tracing::debug!(url = %page.url, "no content region matched; using document body");
    let region = Document::from(page.body().inner_html().to_string());
    sanitize::remove_matching(&region.select("body"), BODY_FURNITURE_SELECTOR, false);
    region
}

fn has_significant_content(candidate: &Selection) -> bool {
    candidate.text().trim().chars().count() > MIN_CONTENT_CHARS && !is_navigation(candidate)
}

fn is_navigation(element: &Selection) -> bool {
    let class = element.attr("class").unwrap_or_default().to_lowercase();
    NAVIGATION_CLASS_WORDS.iter().any(|word| class.contains(word))
}

pub fn extract_title(page: &Page) -> Option<String> {
    first_of(
        page,
        &[
            |p| p.first_attr(r#"meta[property="og:title"]"#, "content"),
            |p| p.first_text("h1"),
            |p| p.first_text(".title"),
            |p| p.first_text(".story-title"),
            |p| p.first_text("title"),
        ],
    )
}

pub fn extract_author(page: &Page) -> Option<String> {
    first_of(
        page,
        &[
            |p| p.first_attr(r#"meta[name="author"]"#, "content"),
            |p| p.first_text(".author"),
            |p| p.first_text(".story-author"),
            |p| p.first_text(r#"[rel="author"]"#),
        ],
    )
}

/// `og:locale`, then `<html lang>`, then "en"; underscores become hyphens.
pub fn extract_language(page: &Page) -> String {
    first_of(
        page,
        &[
            |p| p.first_attr(r#"meta[property="og:locale"]"#, "content"),
            |p| p.first_attr("html", "lang"),
        ],
    )
    .map(|lang| lang.replace('_', "-"))
    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned())
}

pub fn extract_cover_url(page: &Page) -> Option<String> {
    first_of(
        page,
        &[
            |p| {
                let content = p.first_attr(r#"meta[property="og:image"]"#, "content")?;
                p.url.join(&content).ok().map(|u| u.to_string())
            },
            |p| p.first_img_src(".cover-image"),
            |p| p.first_img_src(".story-cover"),
            |p| {
                let src = p.first_attr(r#"img[alt*="cover" i]"#, "src")?;
                p.url.join(&src).ok().map(|u| u.to_string())
            },
            |p| {
                let src = p.first_attr("img", "src")?;
                p.url.join(&src).ok().map(|u| u.to_string())
            },
        ],
    )
}

pub fn extract_chapter_title(page: &Page) -> Option<String> {
    ["h1", "h2", "h3", ".chapter-title", ".title"]
        .iter()
        .filter_map(|selector| page.first_text(selector))
        .find(|title| title.chars().count() < MAX_CHAPTER_TITLE_CHARS)
}

pub fn extract_description(page: &Page) -> Option<String> {
    first_of(
        page,
        &[
            |p| p.first_attr(r#"meta[name="description"]"#, "content"),
            |p| p.first_attr(r#"meta[property="og:description"]"#, "content"),
        ],
    )
}

pub fn extract_subject(page: &Page) -> Option<String> {
    first_of(
        page,
        &[
            |p| p.first_attr(r#"meta[name="keywords"]"#, "content"),
            |p| p.first_attr(r#"meta[property="article:section"]"#, "content"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(html: &str) -> Page {
        Page::parse(
            Url::parse("https://example.com/story/").expect("parse url"),
            html,
        )
    }

    #[test]
    fn discovers_links_in_document_order() {
        let page = page(
            r##"<body>
                <a href="c1">Chapter 1</a>
                <a href="https://example.com/story/c2#top">Chapter 2</a>
                <a href="c3">   </a>
                <a href="">Empty</a>
                <a href="mailto:me@example.com">Mail</a>
            </body>"##,
        );
        let chapters = discover_chapters(&page);
        let urls = chapters
            .iter()
            .map(|c| c.source_url.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            urls,
            [
                "https://example.com/story/c1",
                "https://example.com/story/c2"
            ]
        );
        assert_eq!(chapters[1].ordinal, 1);
    }

    #[test]
    fn trailing_slash_variant_collapses_to_one_descriptor() {
        let page = page(
            r#"<body><a href="/story/a">Chapter 1</a><a href="/story/a/">Chapter 1 </a></body>"#,
        );
        let chapters = discover_chapters(&page);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].source_url, "https://example.com/story/a");
        assert_eq!(chapters[0].title, "Chapter 1");
    }

    #[test]
    fn no_links_means_no_chapters() {
        let page = page("<body><p>Nothing to see here.</p></body>");
        assert!(discover_chapters(&page).is_empty());
        assert!(discover_chapters(&self::page("")).is_empty());
    }

    #[test]
    fn likely_chapter_heuristic() {
        assert!(is_likely_chapter_link("https://x/read/ch-1", "Read"));
        assert!(is_likely_chapter_link("https://x/a", "Episode Five"));
        assert!(is_likely_chapter_link("https://x/a", "Ch 12"));
        assert!(!is_likely_chapter_link("https://x/about", "About us"));
    }

    #[test]
    fn content_region_prefers_significant_matches() {
        let long = "word ".repeat(60);
        let html = format!(
            r#"<body><article class="nav-list">{long}</article><div class="entry-content"><p>{long}</p></div></body>"#
        );
        let region = locate_content_region(&page(&html));
        let body = region.select("body");
        assert!(body.select("p").exists());
        assert!(!body.inner_html().contains("nav-list"));
    }

    #[test]
    fn content_region_falls_back_to_body_without_furniture() {
        let region = locate_content_region(&page(
            "<body><nav>Home</nav><p>Short story.</p><footer>(c)</footer></body>",
        ));
        let html = region.select("body").inner_html().to_string();
        assert!(html.contains("Short story."));
        assert!(!html.contains("Home"));
        assert!(!html.contains("(c)"));
    }

    #[test]
    fn metadata_sources_in_order() {
        let page = page(
            r#"<html lang="fr_CA"><head>
                <title>Doc Title</title>
                <meta name="author" content=" Jane Doe ">
                <meta name="description" content="A tale.">
                <meta property="og:image" content="/img/cover.jpg">
            </head><body><h1>Heading Title</h1></body></html>"#,
        );
        assert_eq!(extract_title(&page).as_deref(), Some("Heading Title"));
        assert_eq!(extract_author(&page).as_deref(), Some("Jane Doe"));
        assert_eq!(extract_language(&page), "fr-CA");
        assert_eq!(extract_description(&page).as_deref(), Some("A tale."));
        assert_eq!(
            extract_cover_url(&page).as_deref(),
            Some("https://example.com/img/cover.jpg")
        );
    }

    #[test]
    fn og_locale_wins_over_html_lang() {
        let page = page(
            r#"<html lang="de"><head><meta property="og:locale" content="en_GB"></head></html>"#,
        );
        assert_eq!(extract_language(&page), "en-GB");
    }

    #[test]
    fn metadata_defaults_when_absent() {
        let metadata = strategy().extract_metadata(&page("<body></body>"));
        assert_eq!(metadata.title, "Untitled Story");
        assert_eq!(metadata.author, "Unknown Author");
        assert_eq!(metadata.language, "en");
        assert_eq!(metadata.cover_url, None);
    }

    #[test]
    fn chapter_title_skips_overlong_headings() {
        let long = "x".repeat(250);
        let page = page(&format!("<h1>{long}</h1><h2>The Return</h2>"));
        assert_eq!(extract_chapter_title(&page).as_deref(), Some("The Return"));
    }
}
