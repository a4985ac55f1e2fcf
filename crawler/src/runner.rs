use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::task::JoinSet;

use minutes_core::manifest::{ManifestEvent, ManifestWriter, StartConfig};
use minutes_core::report::DisallowReport;
use minutes_core::resume::{self, ResumeIndex};
use minutes_core::seeds::{choose_seed_urls, load_seed_records, round_robin_by_netloc, sum_counts, SeedTask};
use minutes_core::urls::normalize_url;

use crate::config::RunOptions;
use crate::limiter::HostRateLimiter;
use crate::robots::RobotsRegistry;
use crate::worker::{self, SharedState};

/// Execute one full crawl. Returns the process exit code: 0 on success, 2
/// when the input seed list does not exist.
pub async fn run(opts: RunOptions) -> Result<i32> {
    if opts.overwrite_manifest {
        if let Some(parent) = opts.manifest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&opts.manifest_path, "")?;
    }

    if !opts.input.exists() {
        tracing::error!(input = %opts.input.display(), "input not found");
        return Ok(2);
    }

    let records = load_seed_records(&opts.input)?;

    let manifest = Arc::new(ManifestWriter::open(&opts.manifest_path)?);
    let cache = if opts.resume { resume::load(&opts.manifest_path) } else { ResumeIndex::default() };

    let client = reqwest::Client::builder()
        .user_agent(opts.crawl.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(opts.crawl.timeout_sec))
        .build()?;

    let robots = opts
        .crawl
        .respect_robots
        .then(|| RobotsRegistry::new(client.clone(), opts.crawl.user_agent.clone(), manifest.clone()));

    let state = Arc::new(SharedState {
        client,
        manifest: manifest.clone(),
        cache: Mutex::new(cache),
        report: DisallowReport::new(),
        limiter: HostRateLimiter::new(),
        robots,
        total_found_links: AtomicUsize::new(0),
        skipped_seed_count: AtomicUsize::new(0),
    });

    manifest.append(&ManifestEvent::Start {
        input: opts.input.display().to_string(),
        outdir: opts.out_dir.display().to_string(),
        threshold: opts.threshold,
        resume: opts.resume,
        skip_completed_seeds: opts.skip_completed_seeds,
        recheck_seeds: opts.recheck_seeds,
        force_download: opts.force_download,
        force_crawl: opts.force_crawl,
        respect_robots: opts.crawl.respect_robots,
        parallel_workers: opts.workers,
        save_pages: opts.save_pages,
        download_files: opts.download_files,
        config: StartConfig {
            max_depth: opts.crawl.max_depth,
            max_pages: opts.crawl.max_pages,
            delay_sec: opts.crawl.delay_sec,
            timeout_sec: opts.crawl.timeout_sec,
            same_domain_only: opts.crawl.same_domain_only,
            same_path_prefix_only: opts.crawl.same_path_prefix_only,
        },
    })?;

    let mut tasks: Vec<SeedTask> = Vec::new();
    for record in &records {
        if record.prefecture.is_empty() || record.city.is_empty() {
            continue;
        }
        let (mode, url_map) = choose_seed_urls(record, opts.threshold);
        let seed_urls: Vec<String> = url_map
            .keys()
            .map(|u| normalize_url(u))
            .filter(|u| !u.is_empty())
            .collect();

        manifest.append(&ManifestEvent::CityStart {
            prefecture: record.prefecture.clone(),
            city: record.city.clone(),
            mode,
            seed_count: seed_urls.len(),
            parent_total: sum_counts(&record.parent),
            grand_parent_total: sum_counts(&record.grand_parent),
        })?;

        if seed_urls.is_empty() {
            manifest.append(&ManifestEvent::CitySkipNoSeed {
                prefecture: record.prefecture.clone(),
                city: record.city.clone(),
            })?;
            continue;
        }

        for seed_url in seed_urls {
            tasks.push(SeedTask {
                prefecture: record.prefecture.clone(),
                city: record.city.clone(),
                mode,
                seed_url,
            });
        }
    }

    let tasks = round_robin_by_netloc(tasks);
    tracing::info!(tasks = tasks.len(), workers = opts.workers, "seed tasks scheduled");

    let queue = Arc::new(Mutex::new(tasks.into_iter().collect::<VecDeque<SeedTask>>()));
    let opts = Arc::new(opts);
    let mut pool = JoinSet::new();
    for _ in 0..opts.workers.max(1) {
        let queue = queue.clone();
        let state = state.clone();
        let opts = opts.clone();
        pool.spawn(async move {
            loop {
                let task = { queue.lock().pop_front() };
                let Some(task) = task else { break };
                match worker::process_seed(&state, &opts, &task).await {
                    Ok(found) => {
                        state.total_found_links.fetch_add(found, Ordering::Relaxed);
                    }
                    Err(err) => {
                        tracing::warn!(seed = %task.seed_url, error = %err, "seed task failed");
                        if let Err(write_err) = state
                            .manifest
                            .append(&ManifestEvent::SeedTaskException { error: err.to_string() })
                        {
                            tracing::error!(error = %write_err, "manifest write failed");
                        }
                    }
                }
            }
        });
    }
    while let Some(joined) = pool.join_next().await {
        if let Err(err) = joined {
            let _ = manifest.append(&ManifestEvent::SeedTaskException { error: err.to_string() });
        }
    }

    let report_dir = opts.report_dir.clone().unwrap_or_else(|| opts.out_dir.join("reports"));
    state.report.write_reports(&report_dir, &manifest.now_iso())?;
    manifest.append(&ManifestEvent::RobotsReportWritten {
        report_dir: report_dir.display().to_string(),
        robots_disallow_total: state.report.total(),
    })?;

    let total_found_links = state.total_found_links.load(Ordering::Relaxed);
    let skipped_seed_count = state.skipped_seed_count.load(Ordering::Relaxed);
    manifest.append(&ManifestEvent::Done {
        total_found_links,
        skipped_seed_count,
        robots_disallow_total: state.report.total(),
        save_pages: opts.save_pages,
        download_files: opts.download_files,
        recheck_seeds: opts.recheck_seeds,
    })?;

    println!(
        "done: total_found_links={total_found_links} skipped_seed_count={skipped_seed_count} robots_disallow={} (reports: {})",
        state.report.total(),
        report_dir.display()
    );
    println!("manifest: {}", opts.manifest_path.display());
    println!("outdir: {}", opts.out_dir.display());
    Ok(0)
}
