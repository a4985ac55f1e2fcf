use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use minutes_core::heuristics::{DEFAULT_FILE_EXTS, DEFAULT_KEYWORDS, DEFAULT_URL_HINTS};
use minutes_crawler::config::{CrawlConfig, RunOptions, DEFAULT_USER_AGENT};
use minutes_crawler::runner;

#[derive(Parser)]
#[command(name = "minutes-crawler")]
#[command(about = "Collect municipal assembly minutes from seeded council sites", long_about = None)]
struct Cli {
    /// Seed list JSON produced by the site-discovery stage
    #[arg(long, default_value = "data/minute_site_list.json")]
    input: String,
    /// Directory for downloaded files and saved pages
    #[arg(long, default_value = "data/minutes_out")]
    outdir: String,
    /// Append-only crawl journal (JSONL)
    #[arg(long, default_value = "data/minutes_out/manifest.jsonl")]
    manifest: String,
    /// Truncate the journal instead of appending to it
    #[arg(long)]
    overwrite_manifest: bool,
    /// Prefer parent seeds when their hit counts sum to at least this
    #[arg(long, default_value_t = 5)]
    threshold: i64,
    /// Crawl depth from each seed (0 = the seed page only)
    #[arg(long, default_value_t = 2)]
    max_depth: usize,
    /// Page fetch budget per seed
    #[arg(long, default_value_t = 200)]
    max_pages: usize,
    /// Minimum seconds between requests to one host; a larger robots
    /// Crawl-delay wins
    #[arg(long, default_value_t = 0.5)]
    delay: f64,
    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 20)]
    timeout: u64,
    /// Collect links and journal only; save neither pages nor files
    #[arg(long)]
    no_download: bool,
    /// Skip downloading minutes files (pages may still be saved)
    #[arg(long)]
    no_download_files: bool,
    /// Resume from the journal (default on)
    #[arg(long, default_value_t = true)]
    resume: bool,
    /// Start fresh, ignoring prior journal state
    #[arg(long)]
    no_resume: bool,
    /// Skip seeds already journaled as done (default on)
    #[arg(long, default_value_t = true)]
    skip_completed_seeds: bool,
    /// Process completed seeds again
    #[arg(long)]
    no_skip_completed_seeds: bool,
    /// Re-crawl a completed seed when its listing page changed (default on)
    #[arg(long, default_value_t = true)]
    recheck_seeds: bool,
    /// Never revalidate; completed seeds are always skipped
    #[arg(long)]
    no_recheck_seeds: bool,
    /// Crawl every seed even if completed
    #[arg(long)]
    force_crawl: bool,
    /// Re-download files even if already on disk
    #[arg(long)]
    force_download: bool,
    /// Honor robots.txt (default on)
    #[arg(long, default_value_t = true)]
    respect_robots: bool,
    /// Ignore robots.txt
    #[arg(long)]
    no_respect_robots: bool,
    /// Stay on each seed's host
    #[arg(long)]
    same_domain_only: bool,
    /// Stay under each seed's path prefix
    #[arg(long)]
    same_path_prefix_only: bool,
    /// User-Agent for all requests, robots.txt included
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
    /// Comma-separated anchor/URL keywords that mark minutes links
    #[arg(long, default_value_t = DEFAULT_KEYWORDS.join(","))]
    keywords: String,
    /// Comma-separated file extensions to download
    #[arg(long, default_value_t = DEFAULT_FILE_EXTS.join(","))]
    file_exts: String,
    /// Comma-separated URL substrings that mark minutes links
    #[arg(long, default_value_t = DEFAULT_URL_HINTS.join(","))]
    url_hints: String,
    /// Robots-disallow report directory (default: <outdir>/reports)
    #[arg(long)]
    report_dir: Option<String>,
    /// Number of parallel seed workers
    #[arg(long, default_value_t = 8)]
    workers: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let keywords: Vec<String> = cli
        .keywords
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let file_exts: HashSet<String> = cli
        .file_exts
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    let url_hints: Vec<String> = cli
        .url_hints
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let opts = RunOptions {
        input: PathBuf::from(&cli.input),
        out_dir: PathBuf::from(&cli.outdir),
        manifest_path: PathBuf::from(&cli.manifest),
        overwrite_manifest: cli.overwrite_manifest,
        threshold: cli.threshold,
        resume: cli.resume && !cli.no_resume,
        skip_completed_seeds: cli.skip_completed_seeds
            && !cli.no_skip_completed_seeds
            && !cli.force_crawl,
        recheck_seeds: cli.recheck_seeds && !cli.no_recheck_seeds,
        force_crawl: cli.force_crawl,
        force_download: cli.force_download,
        save_pages: !cli.no_download,
        download_files: !cli.no_download && !cli.no_download_files,
        report_dir: cli.report_dir.map(PathBuf::from),
        workers: cli.workers,
        crawl: CrawlConfig {
            max_depth: cli.max_depth,
            max_pages: cli.max_pages,
            delay_sec: cli.delay,
            timeout_sec: cli.timeout,
            user_agent: cli.user_agent,
            keywords,
            file_exts,
            url_hints,
            same_domain_only: cli.same_domain_only,
            same_path_prefix_only: cli.same_path_prefix_only,
            respect_robots: cli.respect_robots && !cli.no_respect_robots,
        },
    };

    let code = runner::run(opts).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
