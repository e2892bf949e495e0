use dom_query::Document;

use crate::formats::ChapterDescriptor;
use crate::page::{Page, first_of};
use crate::strategy::{Strategy, default};

pub fn strategy() -> Strategy {
    Strategy {
        name: "royalroad",
        discover_chapters,
        locate_content_region,
        extract_title,
        extract_author,
        extract_cover_url,
        ..default::strategy()
    }
}

fn discover_chapters(page: &Page) -> Vec<ChapterDescriptor> {
    let toc = page.doc.select(r#"tbody tr td a[href*="/chapter/"]"#);
    if !toc.is_empty() {
        return default::chapters_from_links(page, &toc);
    }

    let mut chapters = default::chapters_from_links(
        page,
        &page.doc.select(r#"a[href*="/chapter/"]"#),
    );
    chapters.retain(|chapter| {
        let title = chapter.title.to_lowercase();
        !title.contains("next") && !title.contains("previous")
    });
    for (ordinal, chapter) in chapters.iter_mut().enumerate() {
        chapter.ordinal = ordinal;
    }
    chapters
}

fn locate_content_region(page: &Page) -> Document {
    let content = page.doc.select(".chapter-content").first();
    if content.is_empty() {
        return default::locate_content_region(page);
    }
    Document::from(content.inner_html().to_string())
}

fn extract_title(page: &Page) -> Option<String> {
    first_of(
        page,
        &[
            |p| p.first_text(r#"h1[property="name"]"#),
            |p| p.first_text("h1.font-white"),
            default::extract_title,
        ],
    )
}

fn extract_author(page: &Page) -> Option<String> {
    first_of(
        page,
        &[
            |p| p.first_text(r#"h4[property="author"] a"#),
            |p| p.first_text(".author a"),
            default::extract_author,
        ],
    )
}

fn extract_cover_url(page: &Page) -> Option<String> {
    first_of(
        page,
        &[
            |p| {
                let src = p.first_attr("img.thumbnail", "src")?;
                p.url.join(&src).ok().map(|u| u.to_string())
            },
            default::extract_cover_url,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(html: &str) -> Page {
        Page::parse(
            Url::parse("https://www.royalroad.com/fiction/1234/a-story").expect("parse url"),
            html,
        )
    }

    #[test]
    fn table_of_contents_links_are_used() {
        let page = page(
            r#"<body>
                <a href="/fiction/1234/a-story/chapter/9/start">Start Reading</a>
                <table id="chapters"><tbody>
                    <tr><td><a href="/fiction/1234/a-story/chapter/1/one">One</a></td></tr>
                    <tr><td><a href="/fiction/1234/a-story/chapter/2/two">Two</a></td></tr>
                </tbody></table>
            </body>"#,
        );
        let chapters = (strategy().discover_chapters)(&page);
        let titles = chapters.iter().map(|c| c.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, ["One", "Two"]);
        assert_eq!(
            chapters[0].source_url,
            "https://www.royalroad.com/fiction/1234/a-story/chapter/1/one"
        );
    }

    #[test]
    fn chapter_links_skip_navigation_controls() {
        let page = page(
            r#"<body>
                <a href="/fiction/1/s/chapter/1/a">Previous Chapter</a>
                <a href="/fiction/1/s/chapter/2/b">The Middle</a>
                <a href="/fiction/1/s/chapter/3/c">Next Chapter</a>
            </body>"#,
        );
        let chapters = (strategy().discover_chapters)(&page);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "The Middle");
        assert_eq!(chapters[0].ordinal, 0);
    }

    #[test]
    fn metadata_overrides_fall_back_to_default() {
        let page = page(
            r#"<html><head><meta name="author" content="Meta Author"></head><body>
                <h1 property="name">Fiction Name</h1>
                <img class="thumbnail" src="/covers/1.jpg">
            </body></html>"#,
        );
        let metadata = strategy().extract_metadata(&page);
        assert_eq!(metadata.title, "Fiction Name");
        assert_eq!(metadata.author, "Meta Author");
        assert_eq!(
            metadata.cover_url.as_deref(),
            Some("https://www.royalroad.com/covers/1.jpg")
        );
    }

    #[test]
    fn chapter_content_is_taken_directly() {
        let page = page(r#"<body><div class="chapter-content"><p>Short.</p></div></body>"#);
        let region = (strategy().locate_content_region)(&page);
        assert_eq!(region.select("body").inner_html().trim(), "<p>Short.</p>");
    }
}
