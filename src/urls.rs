use url::Url;

/// Comparison key for chapter de-duplication: drops the fragment, one
/// trailing slash, and everything up to and including `://`.
pub fn normalize_for_compare(url: &str) -> String {
    let without_fragment = match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    };
    let without_slash = without_fragment
        .strip_suffix('/')
        .unwrap_or(without_fragment);
    match without_slash.find("://") {
        Some(idx) => without_slash[idx + 3..].to_owned(),
        None => without_slash.to_owned(),
    }
}

pub fn normalized_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").map(str::to_owned).unwrap_or(host);
    if host.is_empty() { None } else { Some(host) }
}

pub fn is_http_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let url = base.join(href).ok()?;
    is_http_url(&url).then_some(url)
}

pub fn safe_for_file_name(title: &str, max_len: usize) -> String {
    let cleaned = title
        .chars()
        .map(|c| if c == ' ' || c == '\u{a0}' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect::<String>();

    let chars = cleaned.chars().collect::<Vec<_>>();
    if chars.len() <= max_len {
        return cleaned;
    }
    const ELLIPSIS: &str = "...";
    let half = max_len.saturating_sub(ELLIPSIS.len()) / 2;
    let head = chars[..half].iter().collect::<String>();
    let tail = chars[chars.len() - half..].iter().collect::<String>();
    format!("{head}{ELLIPSIS}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_key_ignores_scheme_fragment_and_trailing_slash() {
        assert_eq!(
            normalize_for_compare("https://example.com/story/1/#comments"),
            "example.com/story/1"
        );
        assert_eq!(
            normalize_for_compare("http://example.com/story/1"),
            normalize_for_compare("https://example.com/story/1/")
        );
        assert_eq!(normalize_for_compare("relative/path/"), "relative/path");
    }

    #[test]
    fn host_is_lowercased_and_www_stripped() {
        let url = Url::parse("https://WWW.RoyalRoad.com/fiction/1").expect("parse url");
        assert_eq!(normalized_host(&url).as_deref(), Some("royalroad.com"));

        let url = Url::parse("https://archiveofourown.org/works/1").expect("parse url");
        assert_eq!(normalized_host(&url).as_deref(), Some("archiveofourown.org"));
    }

    #[test]
    fn resolve_href_drops_non_http_targets() {
        let base = Url::parse("https://example.com/story/").expect("parse url");
        assert_eq!(
            resolve_href(&base, "chapter-2").map(|u| u.to_string()),
            Some("https://example.com/story/chapter-2".to_owned())
        );
        assert!(resolve_href(&base, "mailto:a@example.com").is_none());
        assert!(resolve_href(&base, "javascript:void(0)").is_none());
        assert!(resolve_href(&base, "   ").is_none());
    }

    #[test]
    fn file_names_are_sanitized_and_shortened() {
        assert_eq!(safe_for_file_name("My Story: Part 1!", 50), "My_Story_Part_1");
        let long = "a".repeat(30) + &"b".repeat(30);
        let short = safe_for_file_name(&long, 50);
        assert_eq!(short.len(), 49);
        assert!(short.starts_with("aaaa"));
        assert!(short.ends_with("bbbb"));
        assert!(short.contains("..."));
    }
}
