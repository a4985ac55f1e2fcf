use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};

use minutes_core::resume::SeedMeta;
use minutes_core::store::sha1_bytes;

use crate::fetch;

pub struct SeedCheck {
    pub changed: bool,
    pub meta: SeedMeta,
}

/// Conditional GET against a completed seed. 304 means unchanged; a 200 body
/// is compared by SHA-1 and by stored validators. Anything that goes wrong is
/// treated as changed so the seed gets re-crawled rather than silently
/// skipped.
pub async fn fetch_seed_state(client: &Client, url: &str, prev: Option<&SeedMeta>) -> SeedCheck {
    let mut headers = HeaderMap::new();
    if let Some(prev) = prev {
        if !prev.etag.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&prev.etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }
        if !prev.last_modified.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&prev.last_modified) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }
    }

    match fetch::fetch_url(client, url, Some(headers)).await {
        Ok(res) if res.status == StatusCode::NOT_MODIFIED => {
            SeedCheck { changed: false, meta: prev.cloned().unwrap_or_default() }
        }
        Ok(res) if res.status.is_success() => {
            let meta = SeedMeta {
                etag: header_value(&res.headers, ETAG),
                last_modified: header_value(&res.headers, LAST_MODIFIED),
                content_sha1: sha1_bytes(&res.body),
            };
            let changed = match prev {
                Some(prev) => !is_unchanged(prev, &meta),
                None => true,
            };
            SeedCheck { changed, meta }
        }
        _ => SeedCheck { changed: true, meta: prev.cloned().unwrap_or_default() },
    }
}

/// Unchanged when the body hash matches, or a validator was recorded on both
/// sides and matches. Sites with no validator headers still get change
/// detection through the hash.
pub fn is_unchanged(prev: &SeedMeta, new: &SeedMeta) -> bool {
    if !prev.content_sha1.is_empty() && prev.content_sha1 == new.content_sha1 {
        return true;
    }
    if !prev.etag.is_empty() && !new.etag.is_empty() && prev.etag == new.etag {
        return true;
    }
    if !prev.last_modified.is_empty()
        && !new.last_modified.is_empty()
        && prev.last_modified == new.last_modified
    {
        return true;
    }
    false
}

fn header_value(headers: &HeaderMap, name: reqwest::header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(etag: &str, last_modified: &str, sha1: &str) -> SeedMeta {
        SeedMeta {
            etag: etag.into(),
            last_modified: last_modified.into(),
            content_sha1: sha1.into(),
        }
    }

    #[test]
    fn matching_body_hash_is_unchanged() {
        assert!(is_unchanged(&meta("", "", "abc"), &meta("\"new\"", "", "abc")));
    }

    #[test]
    fn matching_etag_is_unchanged_despite_new_body() {
        assert!(is_unchanged(&meta("\"v1\"", "", "old"), &meta("\"v1\"", "", "new")));
    }

    #[test]
    fn matching_last_modified_is_unchanged() {
        let lm = "Wed, 01 Jan 2025 00:00:00 GMT";
        assert!(is_unchanged(&meta("", lm, "old"), &meta("", lm, "new")));
    }

    #[test]
    fn validator_must_be_present_on_both_sides() {
        // Empty on either side never counts as a match.
        assert!(!is_unchanged(&meta("", "", "old"), &meta("", "", "new")));
        assert!(!is_unchanged(&meta("\"v1\"", "", "old"), &meta("", "", "new")));
    }

    #[test]
    fn all_different_is_changed() {
        let prev = meta("\"v1\"", "Wed, 01 Jan 2025 00:00:00 GMT", "aaa");
        let new = meta("\"v2\"", "Thu, 02 Jan 2025 00:00:00 GMT", "bbb");
        assert!(!is_unchanged(&prev, &new));
    }
}
