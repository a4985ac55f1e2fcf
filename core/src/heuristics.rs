use std::collections::HashSet;

/// Anchor-text and URL keywords that mark a link as minutes-like. Matching is
/// case-sensitive: these are multi-byte strings where case folding does not
/// apply.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "議事録", "会議録", "会議資料", "会議結果", "会議概要", "審議会",
    "委員会", "本会議", "定例会", "臨時会", "会議", "録",
    "令和", "平成", "議会", "会期", "質疑", "答弁",
];

pub const DEFAULT_FILE_EXTS: &[&str] = &[
    ".csv", ".doc", ".docx", ".pdf", ".ppt", ".pptx", ".txt", ".xls", ".xlsx", ".zip",
];

pub const DEFAULT_URL_HINTS: &[&str] = &[
    "giji", "gijiroku", "kaigi", "minutes", "meeting", "gikai", "iin",
    "shingikai", "kaigiroku",
];

/// A link is minutes-like when any clause matches: the lowercased URL ends
/// with a known file extension, the lowercased URL contains a hint substring,
/// the trimmed anchor text contains a keyword, or the original URL contains a
/// keyword. Empty anchor text is allowed.
pub fn looks_like_minutes_link(
    url: &str,
    anchor_text: &str,
    keywords: &[String],
    file_exts: &HashSet<String>,
    url_hints: &[String],
) -> bool {
    let lower = url.to_lowercase();
    let text = anchor_text.trim();

    if file_exts.iter().any(|ext| lower.ends_with(ext.as_str())) {
        return true;
    }
    if url_hints.iter().any(|hint| lower.contains(hint.as_str())) {
        return true;
    }
    if keywords.iter().any(|kw| text.contains(kw.as_str())) {
        return true;
    }
    if keywords.iter().any(|kw| url.contains(kw.as_str())) {
        return true;
    }
    false
}

/// Whether a response content-type denotes a downloadable document rather
/// than a page. `application/vnd*` counts only without a leading `text/*`
/// hint: some municipal CMSs emit vnd-flavored types on HTML-ish responses.
pub fn is_binary_content_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    if ct.contains("application/pdf")
        || ct.contains("application/msword")
        || ct.contains("application/zip")
        || ct.contains("octet-stream")
    {
        return true;
    }
    ct.contains("application/vnd") && !ct.starts_with("text/")
}

pub fn ext_from_content_type(content_type: &str) -> Option<&'static str> {
    let ct = content_type.to_lowercase();
    if ct.contains("application/pdf") {
        Some(".pdf")
    } else if ct.contains("application/zip") {
        Some(".zip")
    } else if ct.contains("msword") {
        Some(".doc")
    } else if ct.contains("officedocument.wordprocessingml") {
        Some(".docx")
    } else if ct.contains("officedocument.spreadsheetml") {
        Some(".xlsx")
    } else if ct.contains("officedocument.presentationml") {
        Some(".pptx")
    } else if ct.contains("text/plain") {
        Some(".txt")
    } else if ct.contains("text/csv") {
        Some(".csv")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> (Vec<String>, HashSet<String>, Vec<String>) {
        (
            DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_FILE_EXTS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_URL_HINTS.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn extension_matches_case_insensitively() {
        let (kw, exts, hints) = defaults();
        assert!(looks_like_minutes_link("http://h/docs/M.PDF", "", &kw, &exts, &hints));
    }

    #[test]
    fn empty_anchor_with_extension_is_a_hit() {
        let (kw, exts, hints) = defaults();
        assert!(looks_like_minutes_link("http://h/a.zip", "", &kw, &exts, &hints));
    }

    #[test]
    fn url_hint_matches() {
        let (kw, exts, hints) = defaults();
        assert!(looks_like_minutes_link("http://h/GIKAI/index.html", "top", &kw, &exts, &hints));
    }

    #[test]
    fn anchor_keyword_matches() {
        let (kw, exts, hints) = defaults();
        assert!(looks_like_minutes_link("http://h/page1", " 議事録一覧 ", &kw, &exts, &hints));
    }

    #[test]
    fn multibyte_url_keyword_is_case_sensitive_substring() {
        let (kw, exts, hints) = defaults();
        assert!(looks_like_minutes_link("http://h/資料/議事録.html", "", &kw, &exts, &hints));
        assert!(!looks_like_minutes_link("http://h/page2", "ordinary", &kw, &exts, &hints));
    }

    #[test]
    fn binary_content_types() {
        assert!(is_binary_content_type("application/pdf"));
        assert!(is_binary_content_type("application/octet-stream"));
        assert!(is_binary_content_type("application/vnd.ms-excel"));
        assert!(!is_binary_content_type("text/html; charset=utf-8"));
        assert!(!is_binary_content_type("text/html; profile=application/vnd.example"));
    }

    #[test]
    fn content_type_extension_mapping() {
        assert_eq!(ext_from_content_type("application/pdf; charset=binary"), Some(".pdf"));
        assert_eq!(
            ext_from_content_type(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ),
            Some(".xlsx")
        );
        assert_eq!(ext_from_content_type("text/plain"), Some(".txt"));
        assert_eq!(ext_from_content_type("image/png"), None);
    }
}
