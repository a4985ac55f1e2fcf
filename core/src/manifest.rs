use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use parking_lot::Mutex;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::seeds::SeedMode;

#[derive(Debug, Clone, Serialize)]
pub struct StartConfig {
    pub max_depth: usize,
    pub max_pages: usize,
    pub delay_sec: f64,
    pub timeout_sec: u64,
    pub same_domain_only: bool,
    pub same_path_prefix_only: bool,
}

/// One journal record. The tag doubles as the `event` field on the wire;
/// payload fields are fixed per tag so any run can be replayed forensically.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ManifestEvent {
    Start {
        input: String,
        outdir: String,
        threshold: i64,
        resume: bool,
        skip_completed_seeds: bool,
        recheck_seeds: bool,
        force_download: bool,
        force_crawl: bool,
        respect_robots: bool,
        parallel_workers: usize,
        save_pages: bool,
        download_files: bool,
        config: StartConfig,
    },
    CityStart {
        prefecture: String,
        city: String,
        mode: SeedMode,
        seed_count: usize,
        parent_total: i64,
        grand_parent_total: i64,
    },
    CitySkipNoSeed {
        prefecture: String,
        city: String,
    },
    RobotsLoaded {
        netloc: String,
        robots_url: String,
    },
    RobotsLoadFailedAllowAll {
        netloc: String,
        robots_url: String,
        error: String,
    },
    RobotsDisallow {
        prefecture: String,
        city: String,
        url: String,
    },
    FetchError {
        prefecture: String,
        city: String,
        url: String,
        error: String,
    },
    SavedPage {
        prefecture: String,
        city: String,
        page_url: String,
        path: String,
        content_type: String,
    },
    SkipSavePageAlreadyDone {
        prefecture: String,
        city: String,
        page_url: String,
    },
    DownloadedFile {
        prefecture: String,
        city: String,
        source_page: String,
        file_url: String,
        content_type: String,
        path: String,
    },
    SkipDownloadAlreadyDone {
        prefecture: String,
        city: String,
        file_url: String,
    },
    DownloadError {
        prefecture: String,
        city: String,
        source_page: String,
        file_url: String,
        error: String,
    },
    FoundMinutesLink {
        prefecture: String,
        city: String,
        source_page: String,
        link_url: String,
        anchor_text: String,
    },
    SeedState {
        seed_url: String,
        etag: String,
        last_modified: String,
        content_sha1: String,
    },
    SeedChangedReCrawl {
        prefecture: String,
        city: String,
        mode: SeedMode,
        seed_url: String,
    },
    SkipSeedAlreadyDone {
        prefecture: String,
        city: String,
        mode: SeedMode,
        seed_url: String,
    },
    SkipSeedAlreadyDoneNotModified {
        prefecture: String,
        city: String,
        mode: SeedMode,
        seed_url: String,
    },
    SkipSeedAlreadyDoneRobotsDisallow {
        prefecture: String,
        city: String,
        mode: SeedMode,
        seed_url: String,
    },
    SeedDone {
        prefecture: String,
        city: String,
        mode: SeedMode,
        seed_url: String,
        found_count: usize,
    },
    SeedTaskException {
        error: String,
    },
    RobotsReportWritten {
        report_dir: String,
        robots_disallow_total: usize,
    },
    Done {
        total_found_links: usize,
        skipped_seed_count: usize,
        robots_disallow_total: usize,
        save_pages: bool,
        download_files: bool,
        recheck_seeds: bool,
    },
}

#[derive(Serialize)]
struct Record<'a> {
    ts: String,
    #[serde(flatten)]
    event: &'a ManifestEvent,
}

/// Append-only JSONL journal shared by all workers. Each append serializes,
/// writes, and flushes one line under the mutex; the lock is never held
/// across network I/O.
pub struct ManifestWriter {
    file: Mutex<File>,
    offset: UtcOffset,
}

impl ManifestWriter {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        // Resolved once; falls back to UTC when the local offset is not
        // determinable (e.g. multi-threaded startup on some unixes).
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        Ok(Self { file: Mutex::new(file), offset })
    }

    pub fn now_iso(&self) -> String {
        let now = OffsetDateTime::now_utc().to_offset(self.offset);
        let now = now.replace_nanosecond(0).unwrap_or(now);
        now.format(&Rfc3339).unwrap_or_default()
    }

    pub fn append(&self, event: &ManifestEvent) -> Result<()> {
        let mut line = serde_json::to_string(&Record { ts: self.now_iso(), event })?;
        line.push('\n');
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn records_are_tagged_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.jsonl");
        let writer = ManifestWriter::open(&path).unwrap();
        writer
            .append(&ManifestEvent::CitySkipNoSeed { prefecture: "P".into(), city: "C".into() })
            .unwrap();
        writer
            .append(&ManifestEvent::SeedDone {
                prefecture: "P".into(),
                city: "C".into(),
                mode: SeedMode::GrandParent,
                seed_url: "http://h/".into(),
                found_count: 3,
            })
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "city_skip_no_seed");
        assert!(first["ts"].as_str().unwrap().contains('T'));

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "seed_done");
        assert_eq!(second["mode"], "grand_parent");
        assert_eq!(second["found_count"], 3);
    }

    #[test]
    fn append_mode_preserves_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.jsonl");
        fs::write(&path, "{\"event\":\"old\"}\n").unwrap();
        let writer = ManifestWriter::open(&path).unwrap();
        writer
            .append(&ManifestEvent::SeedTaskException { error: "boom".into() })
            .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("{\"event\":\"old\"}\n"));
    }
}
