use dom_query::{Document, Selection};
use url::Url;

pub struct Page {
    pub url: Url,
    pub doc: Document,
}

impl Page {
    pub fn parse(url: Url, html: &str) -> Self {
        Self {
            url,
            doc: Document::from(html),
        }
    }

    pub fn body(&self) -> Selection<'_> {
        self.doc.select("body")
    }

    pub fn first_text(&self, selector: &str) -> Option<String> {
        non_blank(&self.doc.select(selector).first().text())
    }

    pub fn first_attr(&self, selector: &str, attr: &str) -> Option<String> {
        let value = self.doc.select(selector).first().attr(attr)?;
        non_blank(&value)
    }

    pub fn first_img_src(&self, selector: &str) -> Option<String> {
        let src = self
            .doc
            .select(selector)
            .first()
            .select("img")
            .first()
            .attr("src")?;
        self.url.join(src.trim()).ok().map(|u| u.to_string())
    }
}

pub fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

pub fn first_of(page: &Page, sources: &[fn(&Page) -> Option<String>]) -> Option<String> {
    sources.iter().find_map(|source| source(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> Page {
        Page::parse(
            Url::parse("https://example.com/story/").expect("parse url"),
            html,
        )
    }

    #[test]
    fn first_text_skips_blank_values() {
        let page = page("<html><body><h1>  </h1><p class=\"a\"> hi </p></body></html>");
        assert_eq!(page.first_text("h1"), None);
        assert_eq!(page.first_text("p.a").as_deref(), Some("hi"));
        assert_eq!(page.first_text("missing"), None);
    }

    #[test]
    fn first_img_src_resolves_relative_urls() {
        let page = page(r#"<div class="cover"><img src="img/c.png"></div>"#);
        assert_eq!(
            page.first_img_src(".cover").as_deref(),
            Some("https://example.com/story/img/c.png")
        );
    }

    #[test]
    fn first_of_takes_the_first_hit() {
        let page = page("<title>T</title><h1>H</h1>");
        let sources: [fn(&Page) -> Option<String>; 2] =
            [|p| p.first_text("h2"), |p| p.first_text("h1")];
        assert_eq!(first_of(&page, &sources).as_deref(), Some("H"));
    }
}
