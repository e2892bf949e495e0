use std::sync::LazyLock;

use dom_query::{Document, Selection};
use regex::Regex;

use crate::formats::ChapterDescriptor;
use crate::page::{Page, first_of, non_blank};
use crate::strategy::{Strategy, default};

#[allow(clippy::expect_used)]
static WORK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"works/(\d+)").expect("valid regex"));

pub fn strategy() -> Strategy {
    Strategy {
        name: "ao3",
        discover_chapters,
        locate_content_region,
        extract_title,
        extract_author,
        ..default::strategy()
    }
}

fn discover_chapters(page: &Page) -> Vec<ChapterDescriptor> {
    let options = page.doc.select("#selected_id option");
    let work_id = WORK_ID
        .captures(page.url.as_str())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned());

    let Some(work_id) = work_id.filter(|_| !options.is_empty()) else {
        let title = extract_title(page).unwrap_or_else(|| "Chapter 1".to_owned());
        return vec![ChapterDescriptor::new(page.url.as_str(), title)];
    };

    let mut chapters = Vec::new();
    for node in options.nodes() {
        let option = Selection::from(*node);
        let Some(value) = option.attr("value").and_then(|v| non_blank(&v)) else {
            continue;
        };
        if value == "0" {
            continue;
        }
        let title = non_blank(&option.text())
            .unwrap_or_else(|| format!("Chapter {}", chapters.len() + 1));
        let mut chapter = ChapterDescriptor::new(
            format!("https://archiveofourown.org/works/{work_id}/chapters/{value}"),
            title,
        );
        chapter.ordinal = chapters.len();
        chapters.push(chapter);
    }
    chapters
}

fn locate_content_region(page: &Page) -> Document {
    for selector in ["#workskin", ".userstuff"] {
        let content = page.doc.select(selector).first();
        if !content.is_empty() {
            return Document::from(content.inner_html().to_string());
        }
    }
    default::locate_content_region(page)
}

fn extract_title(page: &Page) -> Option<String> {
    first_of(
        page,
        &[
            |p| p.first_text("h2.title"),
            |p| p.first_text(".title a"),
            default::extract_title,
        ],
    )
}

fn extract_author(page: &Page) -> Option<String> {
    first_of(
        page,
        &[
            |p| p.first_text(r#"a[rel="author"]"#),
            |p| p.first_text(".byline a"),
            default::extract_author,
        ],
    )
}
