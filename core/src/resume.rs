use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::urls::normalize_url;

/// Validator snapshot for one seed. Empty strings mean "never observed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedMeta {
    pub etag: String,
    pub last_modified: String,
    pub content_sha1: String,
}

/// Everything resume needs, rebuilt from the journal at startup. The journal
/// is the single source of truth; these sets are only caches of it.
#[derive(Debug, Default)]
pub struct ResumeIndex {
    pub downloaded_file_urls: HashSet<String>,
    pub saved_page_urls: HashSet<String>,
    pub completed_seeds: HashSet<String>,
    pub seed_meta: HashMap<String, SeedMeta>,
}

/// Linear replay. Unknown events are ignored and unparsable lines (including
/// a partially written trailing line from a crashed run) are skipped.
pub fn load(manifest_path: &Path) -> ResumeIndex {
    let mut index = ResumeIndex::default();
    let Ok(file) = File::open(manifest_path) else {
        return index;
    };
    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let Some(event) = value.get("event").and_then(Value::as_str) else {
            continue;
        };
        match event {
            "downloaded_file" => {
                if let Some(url) = str_field(&value, "file_url") {
                    index.downloaded_file_urls.insert(normalize_url(url));
                }
            }
            "saved_page" => {
                if let Some(url) = str_field(&value, "page_url") {
                    index.saved_page_urls.insert(normalize_url(url));
                }
            }
            "seed_done" => {
                if let Some(url) = str_field(&value, "seed_url") {
                    index.completed_seeds.insert(normalize_url(url));
                }
            }
            "seed_state" => {
                if let Some(seed) = str_field(&value, "seed_url") {
                    let meta = SeedMeta {
                        etag: str_field(&value, "etag").unwrap_or_default().to_string(),
                        last_modified: str_field(&value, "last_modified")
                            .unwrap_or_default()
                            .to_string(),
                        content_sha1: str_field(&value, "content_sha1")
                            .unwrap_or_default()
                            .to_string(),
                    };
                    index.seed_meta.insert(normalize_url(seed), meta);
                }
            }
            _ => {}
        }
    }
    tracing::debug!(
        downloaded = index.downloaded_file_urls.len(),
        pages = index.saved_page_urls.len(),
        seeds = index.completed_seeds.len(),
        "manifest replayed"
    );
    index
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestEvent, ManifestWriter};
    use crate::seeds::SeedMode;
    use std::fs;

    #[test]
    fn missing_manifest_yields_empty_index() {
        let index = load(Path::new("/nonexistent/manifest.jsonl"));
        assert!(index.completed_seeds.is_empty());
    }

    #[test]
    fn replay_rebuilds_sets_from_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.jsonl");
        let writer = ManifestWriter::open(&path).unwrap();

        writer
            .append(&ManifestEvent::DownloadedFile {
                prefecture: "P".into(),
                city: "C".into(),
                source_page: "http://h/x/".into(),
                file_url: "http://h/x/m.pdf".into(),
                content_type: "application/pdf".into(),
                path: "out/P/C/files/x.pdf".into(),
            })
            .unwrap();
        writer
            .append(&ManifestEvent::SavedPage {
                prefecture: "P".into(),
                city: "C".into(),
                page_url: "http://h/x/".into(),
                path: "out/P/C/pages/x.html".into(),
                content_type: "text/html".into(),
            })
            .unwrap();
        writer
            .append(&ManifestEvent::SeedState {
                seed_url: "http://h/x/".into(),
                etag: "\"v1\"".into(),
                last_modified: "".into(),
                content_sha1: "aaa".into(),
            })
            .unwrap();
        writer
            .append(&ManifestEvent::SeedState {
                seed_url: "http://h/x/".into(),
                etag: "\"v2\"".into(),
                last_modified: "".into(),
                content_sha1: "bbb".into(),
            })
            .unwrap();
        writer
            .append(&ManifestEvent::SeedDone {
                prefecture: "P".into(),
                city: "C".into(),
                mode: SeedMode::Parent,
                seed_url: "http://h/x/".into(),
                found_count: 1,
            })
            .unwrap();

        let index = load(&path);
        assert!(index.downloaded_file_urls.contains("http://h/x/m.pdf"));
        assert!(index.saved_page_urls.contains("http://h/x/"));
        assert!(index.completed_seeds.contains("http://h/x/"));
        // Last seed_state wins.
        assert_eq!(index.seed_meta["http://h/x/"].etag, "\"v2\"");
        assert_eq!(index.seed_meta["http://h/x/"].content_sha1, "bbb");
    }

    #[test]
    fn partial_trailing_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.jsonl");
        fs::write(
            &path,
            "{\"ts\":\"t\",\"event\":\"seed_done\",\"seed_url\":\"http://h/\"}\n{\"ts\":\"t\",\"event\":\"downloaded_fi",
        )
        .unwrap();
        let index = load(&path);
        assert!(index.completed_seeds.contains("http://h/"));
        assert!(index.downloaded_file_urls.is_empty());
    }
}
