use url::Url;

/// Canonical key form for every URL set: trimmed, fragment stripped.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.split_once('#') {
        Some((before, _)) => before.to_string(),
        None => trimmed.to_string(),
    }
}

/// Host with port when present. Robots caching, rate limiting, and the
/// same-domain filter all key on this.
pub fn netloc(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

pub fn netloc_of(raw: &str) -> String {
    Url::parse(raw).map(|u| netloc(&u)).unwrap_or_default()
}

/// First path segment as `/seg/`, or `/` for an empty path.
pub fn path_prefix(raw: &str) -> String {
    let path = Url::parse(raw)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    match path.split('/').find(|seg| !seg.is_empty()) {
        Some(seg) => format!("/{seg}/"),
        None => "/".to_string(),
    }
}

/// Extension of the URL's path, leading dot included, case preserved.
/// Queries and fragments are not part of the path and never match.
pub fn path_suffix(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let last = url.path().rsplit('/').next().unwrap_or("");
    let dot = last.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(last[dot..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_fragment_and_whitespace() {
        assert_eq!(normalize_url(" http://a/b#frag "), "http://a/b");
        assert_eq!(normalize_url("http://a/b"), "http://a/b");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn netloc_includes_port() {
        let u = Url::parse("http://example.com:8080/x").unwrap();
        assert_eq!(netloc(&u), "example.com:8080");
        assert_eq!(netloc_of("https://example.com/x"), "example.com");
        assert_eq!(netloc_of("not a url"), "");
    }

    #[test]
    fn path_prefix_takes_first_segment() {
        assert_eq!(path_prefix("http://h/gikai/minutes/2024.html"), "/gikai/");
        assert_eq!(path_prefix("http://h/"), "/");
        assert_eq!(path_prefix("http://h"), "/");
    }

    #[test]
    fn path_suffix_ignores_query() {
        assert_eq!(path_suffix("http://h/a/m.PDF"), Some(".PDF".to_string()));
        assert_eq!(path_suffix("http://h/a/page?f=x.pdf"), None);
        assert_eq!(path_suffix("http://h/a/"), None);
        assert_eq!(path_suffix("http://h/a/.hidden"), None);
    }
}
