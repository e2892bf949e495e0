use std::fs::OpenOptions;
use std::io::{Cursor, Write as _};
use std::path::Path;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use zip::write::SimpleFileOptions;

use crate::error::PackagingError;
use crate::formats::{PackagedChapter, StoryMetadata};

pub const MIMETYPE: &str = "application/epub+zip";
const STYLESHEET_HREF: &str = "Styles/stylesheet.css";

#[derive(Debug, Clone)]
pub struct PackageOptions {
    pub modified: DateTime<Utc>,
    pub stylesheet: Option<String>,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            modified: Utc::now(),
            stylesheet: None,
        }
    }
}

#[derive(Debug)]
struct ChapterEntry<'a> {
    id: String,
    href: String,
    title: &'a str,
    chapter: &'a PackagedChapter,
}

/// Builds the complete archive in memory. Nothing is written unless every
/// entry was produced.
pub fn assemble(
    metadata: &StoryMetadata,
    chapters: &[PackagedChapter],
    options: &PackageOptions,
) -> Result<Vec<u8>, PackagingError> {
    if chapters.is_empty() {
        return Err(PackagingError::NoChapters);
    }

    let entries = chapters
        .iter()
        .enumerate()
        .map(|(idx, chapter)| {
            let number = format!("{:03}", idx + 1);
            ChapterEntry {
                id: format!("chapter{number}"),
                href: format!("Text/Chapter{number}.xhtml"),
                title: &chapter.title,
                chapter,
            }
        })
        .collect::<Vec<_>>();

    let manifest_items = entries
        .iter()
        .map(|e| {
            format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\" />\n",
                e.id, e.href
            )
        })
        .collect::<Vec<_>>();
    let spine_items = entries
        .iter()
        .map(|e| format!("    <itemref idref=\"{}\" />\n", e.id))
        .collect::<Vec<_>>();
    if manifest_items.len() != spine_items.len() || spine_items.len() != chapters.len() {
        return Err(PackagingError::Inconsistent {
            manifest: manifest_items.len(),
            spine: spine_items.len(),
            chapters: chapters.len(),
        });
    }

    let lang = metadata.language.as_str();
    let container_xml = render_container_xml();
    let content_opf = render_content_opf(metadata, options, &manifest_items, &spine_items);
    let nav_xhtml = render_nav_xhtml(&metadata.title, lang, &entries);
    let css = options
        .stylesheet
        .clone()
        .unwrap_or_else(default_style_css);

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

    // `mimetype` must be the first entry and stored without compression.
    let mimetype_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    zip.start_file("mimetype", mimetype_options)?;
    zip.write_all(MIMETYPE.as_bytes())?;

    let deflated_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    zip.start_file("META-INF/container.xml", deflated_options)?;
    zip.write_all(container_xml.as_bytes())?;

    zip.start_file("OEBPS/content.opf", deflated_options)?;
    zip.write_all(content_opf.as_bytes())?;

    zip.start_file("OEBPS/nav.xhtml", deflated_options)?;
    zip.write_all(nav_xhtml.as_bytes())?;

    zip.start_file(format!("OEBPS/{STYLESHEET_HREF}"), deflated_options)?;
    zip.write_all(css.as_bytes())?;

    for entry in &entries {
        let body = xhtml_fragment(&entry.chapter.fragment.html);
        let xhtml = wrap_xhtml_document(entry.title, lang, &body);
        zip.start_file(format!("OEBPS/{}", entry.href), deflated_options)?;
        zip.write_all(xhtml.as_bytes())?;
    }

    let cursor = zip.finish()?;
    tracing::debug!(chapters = entries.len(), "archive assembled");
    Ok(cursor.into_inner())
}

/// Writes a finished archive; refuses to replace an existing file unless
/// `force` is set.
pub fn write_epub(out_path: &Path, bytes: &[u8], force: bool) -> anyhow::Result<()> {
    let mut out_options = OpenOptions::new();
    out_options.write(true);
    if force {
        out_options.create(true).truncate(true);
    } else {
        out_options.create_new(true);
    }
    let mut out_file = out_options
        .open(out_path)
        .with_context(|| format!("open epub output: {}", out_path.display()))?;
    out_file
        .write_all(bytes)
        .with_context(|| format!("write epub output: {}", out_path.display()))?;
    out_file.flush().context("flush epub output")?;
    Ok(())
}

fn render_container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    .to_string()
}

pub fn default_style_css() -> String {
    r#"@charset "utf-8";

body { font-family: Georgia, serif; line-height: 1.6; margin: 1em; color: #333; }
h1, h2, h3, h4, h5, h6 { color: #2c3e50; margin-top: 1.5em; margin-bottom: 0.5em; }
h1 { font-size: 1.8em; border-bottom: 2px solid #3498db; padding-bottom: 0.3em; }
p { margin: 1em 0; text-align: justify; }
img { max-width: 100%; height: auto; display: block; margin: 1em auto; }
blockquote { margin: 1em 2em; padding: 0.5em 1em; border-left: 4px solid #3498db; background-color: #f8f9fa; font-style: italic; }
code { background-color: #f1f2f6; padding: 0.2em 0.4em; border-radius: 3px; font-family: monospace; }
pre { background-color: #f1f2f6; padding: 1em; border-radius: 5px; overflow-x: auto; }
a { color: #3498db; text-decoration: none; }
.chapter-error { border: 1px solid #c0392b; padding: 0.5em 1em; color: #c0392b; }
"#
    .to_string()
}

fn render_nav_xhtml(title: &str, lang: &str, entries: &[ChapterEntry<'_>]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(lang),
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str(&format!(
        "  <link rel=\"stylesheet\" type=\"text/css\" href=\"{STYLESHEET_HREF}\" />\n"
    ));
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    out.push_str("    <h1>Table of Contents</h1>\n");
    out.push_str("    <ol>\n");
    for entry in entries {
        out.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            xml_escape(&entry.href),
            xml_escape(entry.title)
        ));
    }
    out.push_str("    </ol>\n");
    out.push_str("  </nav>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn render_content_opf(
    metadata: &StoryMetadata,
    options: &PackageOptions,
    manifest_items: &[String],
    spine_items: &[String],
) -> String {
    let modified = options
        .modified
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"BookId\" version=\"3.0\" xml:lang=\"{}\">\n",
        xml_escape(&metadata.language)
    ));
    out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        xml_escape(metadata.unique_identifier())
    ));
    out.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        xml_escape(&metadata.title)
    ));
    out.push_str(&format!(
        "    <dc:creator>{}</dc:creator>\n",
        xml_escape(&metadata.author)
    ));
    out.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        xml_escape(&metadata.language)
    ));
    out.push_str(&format!(
        "    <dc:source>{}</dc:source>\n",
        xml_escape(&metadata.source_url)
    ));
    out.push_str(&format!("    <dc:date>{}</dc:date>\n", xml_escape(&modified)));
    if let Some(subject) = non_empty(&metadata.subject) {
        out.push_str(&format!("    <dc:subject>{}</dc:subject>\n", xml_escape(subject)));
    }
    if let Some(description) = non_empty(&metadata.description) {
        out.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            xml_escape(description)
        ));
    }
    if let Some(series) = non_empty(&metadata.series_name) {
        out.push_str(&format!(
            "    <meta name=\"calibre:series\" content=\"{}\" />\n",
            xml_escape(series)
        ));
        if let Some(index) = non_empty(&metadata.series_index) {
            out.push_str(&format!(
                "    <meta name=\"calibre:series_index\" content=\"{}\" />\n",
                xml_escape(index)
            ));
        }
    }
    out.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        xml_escape(&modified)
    ));
    out.push_str("  </metadata>\n");
    out.push_str("  <manifest>\n");
    out.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
    );
    out.push_str(&format!(
        "    <item id=\"stylesheet\" href=\"{STYLESHEET_HREF}\" media-type=\"text/css\" />\n"
    ));
    for item in manifest_items {
        out.push_str(item);
    }
    out.push_str("  </manifest>\n");
    out.push_str("  <spine>\n");
    for item in spine_items {
        out.push_str(item);
    }
    out.push_str("  </spine>\n");
    out.push_str("</package>\n");
    out
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn wrap_xhtml_document(title: &str, lang: &str, body_html: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(lang),
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str(&format!(
        "  <link rel=\"stylesheet\" type=\"text/css\" href=\"../{STYLESHEET_HREF}\" />\n"
    ));
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(&format!("<h1>{}</h1>\n", xml_escape(title)));
    out.push_str(body_html);
    if !body_html.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn xhtml_fragment(html: &str) -> String {
    ensure_xhtml_void_tags(&html.replace("&nbsp;", "&#160;"))
}

fn ensure_xhtml_void_tags(html: &str) -> String {
    // `<img ...>` becomes `<img ... />`.
    const VOID_TAGS: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ];

    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(rel_lt) = html[cursor..].find('<') {
        let lt = cursor + rel_lt;
        out.push_str(&html[cursor..lt]);

        // End of the tag, skipping quoted attribute values.
        let mut in_quote: Option<u8> = None;
        let mut gt = lt + 1;
        while gt < bytes.len() {
            let b = bytes[gt];
            match in_quote {
                Some(q) if b == q => in_quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => in_quote = Some(b),
                None if b == b'>' => break,
                None => {}
            }
            gt += 1;
        }
        if gt >= bytes.len() {
            out.push_str(&html[lt..]);
            return out;
        }

        let raw_tag = &html[lt..=gt];
        let name_start = lt + 1;
        let name_end = html[name_start..gt]
            .find(|c: char| !c.is_ascii_alphanumeric())
            .map_or(gt, |offset| name_start + offset);
        let tag_name = html[name_start..name_end].to_ascii_lowercase();

        let tag_without_gt = &html[lt..gt];
        if VOID_TAGS.contains(&tag_name.as_str()) && !tag_without_gt.trim_end().ends_with('/') {
            out.push_str(tag_without_gt);
            out.push_str(" />");
        } else {
            out.push_str(raw_tag);
        }
        cursor = gt + 1;
    }

    out.push_str(&html[cursor..]);
    out
}

pub fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
