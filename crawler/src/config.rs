use std::collections::HashSet;
use std::path::PathBuf;

use minutes_core::heuristics::{DEFAULT_FILE_EXTS, DEFAULT_KEYWORDS, DEFAULT_URL_HINTS};

pub const DEFAULT_USER_AGENT: &str =
    "minutes-crawler/0.1 (+https://github.com/local/minutes-pipeline)";

/// Per-request crawl behavior, identical for every seed in a run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub max_depth: usize,
    pub max_pages: usize,
    pub delay_sec: f64,
    pub timeout_sec: u64,
    pub user_agent: String,
    pub keywords: Vec<String>,
    pub file_exts: HashSet<String>,
    pub url_hints: Vec<String>,
    pub same_domain_only: bool,
    pub same_path_prefix_only: bool,
    pub respect_robots: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 200,
            delay_sec: 0.5,
            timeout_sec: 20,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            file_exts: DEFAULT_FILE_EXTS.iter().map(|s| s.to_string()).collect(),
            url_hints: DEFAULT_URL_HINTS.iter().map(|s| s.to_string()).collect(),
            same_domain_only: false,
            same_path_prefix_only: false,
            respect_robots: true,
        }
    }
}

/// One run of the crawler. The boolean fields hold the effective values after
/// the CLI's on/off flag pairs are folded together.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub overwrite_manifest: bool,
    pub threshold: i64,
    pub resume: bool,
    pub skip_completed_seeds: bool,
    pub recheck_seeds: bool,
    pub force_crawl: bool,
    pub force_download: bool,
    pub save_pages: bool,
    pub download_files: bool,
    pub report_dir: Option<PathBuf>,
    pub workers: usize,
    pub crawl: CrawlConfig,
}
