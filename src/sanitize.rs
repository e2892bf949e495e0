use dom_query::{Document, NodeRef, Selection};

use crate::formats::ContentFragment;

const SCRIPTABLE_SELECTOR: &str = "script, noscript, style, iframe, frame, frameset, object, \
    embed, applet, input, button, select, textarea, link, meta, base";

const BOILERPLATE_SELECTOR: &str = "div.sharedaddy, div.wpcnt, ul.post-categories, \
    div.mistape_caption, div.wpulike, div.wp-next-post-navi, .ezoic-adpicker-ad, .ezoic-ad, \
    ins.adsbygoogle, div.sharepost";

pub(crate) const FURNITURE_SELECTOR: &str = "nav, header, footer, aside, .navigation, .nav, \
    .menu, .sidebar, .ads, .advertisement, .social-share, .comments, .comment-section, \
    .related-posts";

const EMPTY_BLOCK_SELECTOR: &str = "div, p, section, article, blockquote, figure";

const BLOCK_SELECTOR: &str = "p, div, table, ul, ol, dl, blockquote, h1, h2, h3, h4, h5, h6, \
    section, article, pre, figure, hr, center";

const IMAGE_TAGS: &[&str] = &["img", "image", "svg", "picture"];

pub fn sanitize_document(doc: &Document) -> ContentFragment {
    let body = doc.select("body");
    sanitize(&body);
    ContentFragment::new(body.inner_html().to_string())
}

pub fn sanitize_html(html: &str) -> ContentFragment {
    sanitize_document(&Document::from(html))
}

pub fn sanitize(root: &Selection) {
    remove_scriptable(root);
    remove_comments(root);
    remove_matching(root, BOILERPLATE_SELECTOR, true);
    remove_matching(root, FURNITURE_SELECTOR, true);
    replace_legacy_elements(root);
    remove_empty_attributes(root);
    unwrap_bare_spans(root);
    remove_empty_blocks(root);
    trim_whitespace_children(root);
}

fn remove_scriptable(root: &Selection) {
    remove_matching(root, SCRIPTABLE_SELECTOR, true);

    for node in root.select("*").nodes().to_vec() {
        let el = Selection::from(node);
        for attr in node.attrs() {
            let name = attr.name.local.to_ascii_lowercase();
            let is_handler = name.starts_with("on");
            let is_script_link = matches!(&*name, "href" | "src")
                && attr
                    .value
                    .trim_start()
                    .to_ascii_lowercase()
                    .starts_with("javascript:");
            if is_handler || is_script_link {
                el.remove_attr(&attr.name.local);
            }
        }
    }
}

fn remove_comments(root: &Selection) {
    let comments = root
        .nodes()
        .iter()
        .flat_map(|node| node.descendants())
        .filter(|node| node.is_comment())
        .collect::<Vec<_>>();
    for comment in comments {
        Selection::from(comment).remove();
    }
}

pub(crate) fn remove_matching(root: &Selection, selector: &str, keep_images: bool) {
    let matched = root.select(selector).nodes().to_vec();
    for node in matched {
        if keep_images && contains_image(&node) {
            continue;
        }
        Selection::from(node).remove();
    }
}

fn replace_legacy_elements(root: &Selection) {
    convert_centers(root);
    convert_elements(root, "u", "span", "text-decoration: underline;");
    convert_elements(root, "s, strike", "span", "text-decoration: line-through;");
}

/// `center` becomes `p` around inline content and `div` around blocks, so the
/// output never nests a block inside a paragraph.
fn convert_centers(root: &Selection) {
    for node in root.select("center").nodes().to_vec() {
        let el = Selection::from(node);
        let tag = if el.select(BLOCK_SELECTOR).exists() {
            "div"
        } else {
            "p"
        };
        restyle(&el, tag, "text-align: center;");
    }
}

fn convert_elements(root: &Selection, selector: &str, tag: &str, style: &str) {
    for node in root.select(selector).nodes().to_vec() {
        restyle(&Selection::from(node), tag, style);
    }
}

fn restyle(el: &Selection, tag: &str, style: &str) {
    el.rename(tag);
    if !el.has_attr("style") {
        el.set_attr("style", style);
    }
}

fn remove_empty_attributes(root: &Selection) {
    for node in root.select("*").nodes().to_vec() {
        let el = Selection::from(node);
        for attr in node.attrs() {
            let name = &attr.name.local;
            if attr.value.trim().is_empty() || !is_xml_attribute_name(name) {
                el.remove_attr(name);
            }
        }
    }
}

fn is_xml_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')) {
        return false;
    }
    match name.split_once(':') {
        Some((prefix, _)) => matches!(prefix, "xml" | "xlink"),
        None => true,
    }
}

/// Flattens `span` elements without attributes into their parent. Innermost
/// spans go first so a parent's markup never carries a bare span.
fn unwrap_bare_spans(root: &Selection) {
    let spans = root.select("span").nodes().to_vec();
    for node in spans.into_iter().rev() {
        if !node.attrs().is_empty() {
            continue;
        }
        let span = Selection::from(node);
        let inner = span.inner_html();
        span.replace_with_html(inner);
    }
}

fn remove_empty_blocks(root: &Selection) {
    let blocks = root.select(EMPTY_BLOCK_SELECTOR).nodes().to_vec();
    let empty = blocks
        .into_iter()
        .filter(|node| is_whitespace_node(node))
        .collect::<Vec<_>>();
    for node in empty {
        Selection::from(node).remove();
    }
}

fn trim_whitespace_children(root: &Selection) {
    for parent in root.nodes() {
        let children = parent.children();
        let leading = children.iter().take_while(|c| is_whitespace_node(c)).count();
        let trailing = children[leading..]
            .iter()
            .rev()
            .take_while(|c| is_whitespace_node(c))
            .count();

        let doomed = children[..leading]
            .iter()
            .chain(children[children.len() - trailing..].iter())
            .copied()
            .collect::<Vec<_>>();
        for node in doomed {
            Selection::from(node).remove();
        }
    }
}

fn is_whitespace_node(node: &NodeRef) -> bool {
    if node.is_comment() {
        return true;
    }
    if node.is_text() {
        return node.text().trim().is_empty();
    }
    if !node.is_element() {
        return false;
    }
    !contains_image(node) && node.text().trim().is_empty()
}

pub(crate) fn contains_image(node: &NodeRef) -> bool {
    let is_image = |n: &NodeRef| {
        n.node_name()
            .is_some_and(|name| IMAGE_TAGS.contains(&name.to_ascii_lowercase().as_str()))
    };
    is_image(node) || node.descendants().iter().any(is_image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(html: &str) -> String {
        sanitize_html(html).html
    }

    #[test]
    fn removes_scripts_frames_and_event_handlers() {
        let out = clean(
            r#"<p onclick="steal()">Hello <script>alert(1)</script>world</p><iframe src="x"></iframe><a href="javascript:go()">x</a>"#,
        );
        assert!(!out.contains("script"));
        assert!(!out.contains("iframe"));
        assert!(!out.contains("onclick"));
        assert!(!out.contains("javascript:"));
        assert!(out.contains("<p>Hello world</p>"));
    }

    #[test]
    fn removes_comments() {
        let out = clean("<p>a<!-- hidden -->b</p>");
        assert_eq!(out, "<p>ab</p>");
    }

    #[test]
    fn removes_boilerplate_and_furniture() {
        let out = clean(
            r#"<nav>menu</nav><div class="sharedaddy">share</div><p>Story text.</p><div class="sidebar">links</div><footer>copyright</footer><ins class="adsbygoogle">ad</ins>"#,
        );
        assert_eq!(out, "<p>Story text.</p>");
    }

    #[test]
    fn furniture_holding_an_image_is_kept() {
        let out = clean(r#"<header><img src="map.png"></header><p>Story</p>"#);
        assert!(out.contains("map.png"));
    }

    #[test]
    fn legacy_elements_become_styled_equivalents() {
        let out = clean(
            r#"<center class="x">Centered <b>bold</b></center><p><u>under</u> <s>gone</s></p>"#,
        );
        assert!(out.contains(r#"<p class="x" style="text-align: center;">Centered <b>bold</b></p>"#));
        assert!(out.contains(r#"<span style="text-decoration: underline;">under</span>"#));
        assert!(out.contains(r#"<span style="text-decoration: line-through;">gone</span>"#));
        assert!(!out.contains("<center"));
        assert!(!out.contains("<u>"));
    }

    #[test]
    fn center_around_blocks_becomes_a_div() {
        assert_eq!(
            clean("<center><p>Scene one.</p></center>"),
            r#"<div style="text-align: center;"><p>Scene one.</p></div>"#
        );
        let out = clean("<center><table><tr><td>cell</td></tr></table></center>");
        assert!(out.starts_with(r#"<div style="text-align: center;"><table>"#));
        assert!(!out.contains("<p"));
    }

    #[test]
    fn legacy_element_keeps_its_own_style() {
        let out = clean(r#"<center style="color: red;">x</center>"#);
        assert_eq!(out, r#"<p style="color: red;">x</p>"#);
    }

    #[test]
    fn empty_attributes_are_stripped_and_bare_spans_unwrapped() {
        let out = clean(r#"<p class=" " id="keep"><span>one</span> <span class="">two</span> <span lang="fr">trois</span></p>"#);
        assert_eq!(out, r#"<p id="keep">one two <span lang="fr">trois</span></p>"#);
    }

    #[test]
    fn nested_bare_spans_unwrap_completely() {
        let out = clean("<p><span><span>deep</span></span></p>");
        assert_eq!(out, "<p>deep</p>");
    }

    #[test]
    fn empty_blocks_are_removed_but_image_blocks_survive() {
        let out = clean(r#"<div> <div>  </div> </div><p>text</p><div><img src="a.png"></div><p>&nbsp;</p>"#);
        assert!(!out.contains("<div> "));
        assert!(out.contains(r#"<div><img src="a.png"></div>"#));
        assert!(out.contains("<p>text</p>"));
        assert!(!out.contains("&nbsp;"));
    }

    #[test]
    fn leading_and_trailing_whitespace_is_trimmed() {
        let out = clean("\n  <br>\n<p>first</p>\n<p>last</p>\n\n");
        assert!(out.starts_with("<p>first</p>"));
        assert!(out.ends_with("<p>last</p>"));
    }

    #[test]
    fn sibling_order_is_preserved() {
        let out = clean("<p>1</p><nav>x</nav><p>2</p><script>y</script><p>3</p>");
        assert_eq!(out, "<p>1</p><p>2</p><p>3</p>");
    }

    #[test]
    fn invalid_xml_attribute_names_are_dropped() {
        let out = clean(r#"<p @click="x" data-ok="1" v:bind="y">t</p>"#);
        assert_eq!(out, r#"<p data-ok="1">t</p>"#);
    }

    #[test]
    fn sanitizing_twice_is_a_no_op() {
        let inputs = [
            r#"<div class="post"><!-- c --><center>Title</center><p>  <span>Para</span> <u>one</u></p><div class="">  </div><aside>side</aside><p><img src="i.png" alt=""></p>  </div>"#,
            "<p>plain</p>",
            "  text only  ",
            r#"<table><tr><td><s>cell</s></td></tr></table><div><span><span class="k">x</span></span></div>"#,
            "<center><p>Scene one.</p></center>",
            "<center><div>* * *</div><p>Scene two.</p></center>",
            "<center><table><tr><td>cell</td></tr></table></center>",
            "<center><center>nested</center></center>",
        ];
        for input in inputs {
            let once = sanitize_html(input);
            let twice = sanitize_html(&once.html);
            assert_eq!(once, twice, "input: {input}");
        }
    }
}
