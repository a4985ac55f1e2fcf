use scraper::{Html, Selector};

/// Every `<a>` with a non-empty `href`, paired with its visible text.
/// Text nested in child elements is included; surrounding whitespace is
/// trimmed. The html5ever-backed parser recovers from malformed markup, so a
/// broken page simply yields whatever anchors survive recovery.
pub fn extract_links(html: &str) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse("a") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() {
            continue;
        }
        let text = element.text().collect::<String>().trim().to_string();
        links.push((href.to_string(), text));
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_href_and_text() {
        let html = r#"<html><body>
            <a href="a.pdf">議事録</a>
            <a href="/b/">  spaced  </a>
        </body></html>"#;
        let links = extract_links(html);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0], ("a.pdf".to_string(), "議事録".to_string()));
        assert_eq!(links[1], ("/b/".to_string(), "spaced".to_string()));
    }

    #[test]
    fn nested_tags_contribute_text() {
        let html = r#"<a href="x"><span>令和6年</span> <b>本会議</b></a>"#;
        let links = extract_links(html);
        assert_eq!(links[0].1, "令和6年 本会議");
    }

    #[test]
    fn anchors_without_href_are_dropped() {
        let html = r#"<a name="top">anchor</a><a href="">empty</a><a href="ok">ok</a>"#;
        let links = extract_links(html);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].0, "ok");
    }

    #[test]
    fn malformed_html_does_not_panic() {
        let html = "<html><a href='broken'>text<div></a><td>< <a href=2nd>x";
        let links = extract_links(html);
        assert!(links.iter().any(|(href, _)| href == "broken"));
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(extract_links("").is_empty());
    }
}
