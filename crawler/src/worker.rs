use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use reqwest::Client;
use url::Url;

use minutes_core::heuristics::{ext_from_content_type, is_binary_content_type, looks_like_minutes_link};
use minutes_core::links::extract_links;
use minutes_core::manifest::{ManifestEvent, ManifestWriter};
use minutes_core::report::DisallowReport;
use minutes_core::resume::ResumeIndex;
use minutes_core::seeds::SeedTask;
use minutes_core::store::{save_bytes, sha1_hex, OutputLayout};
use minutes_core::urls::{netloc, normalize_url, path_suffix};

use crate::config::{CrawlConfig, RunOptions};
use crate::fetch;
use crate::limiter::HostRateLimiter;
use crate::revalidate;
use crate::robots::RobotsRegistry;

/// Process-global state shared by every worker. Mutexes guard only
/// membership tests and inserts; nothing here is held across a network call.
pub struct SharedState {
    pub client: Client,
    pub manifest: Arc<ManifestWriter>,
    pub cache: Mutex<ResumeIndex>,
    pub report: DisallowReport,
    pub limiter: HostRateLimiter,
    pub robots: Option<RobotsRegistry>,
    pub total_found_links: AtomicUsize,
    pub skipped_seed_count: AtomicUsize,
}

/// Floor delay raised to the host's robots crawl-delay when one is known.
async fn effective_delay(state: &SharedState, cfg: &CrawlConfig, url: &str) -> f64 {
    let mut delay = cfg.delay_sec;
    if cfg.respect_robots {
        if let Some(robots) = &state.robots {
            if let Some(robots_delay) = robots.crawl_delay(url).await {
                if robots_delay > delay {
                    delay = robots_delay;
                }
            }
        }
    }
    delay
}

/// Drive one seed to completion: optional revalidation, then the bounded BFS.
/// Returns the number of distinct minutes-like URLs discovered.
pub async fn process_seed(state: &SharedState, opts: &RunOptions, task: &SeedTask) -> Result<usize> {
    let cfg = &opts.crawl;
    let seed = normalize_url(&task.seed_url);

    if opts.skip_completed_seeds {
        let (done, prev_meta) = {
            let cache = state.cache.lock();
            (cache.completed_seeds.contains(&seed), cache.seed_meta.get(&seed).cloned())
        };

        if done {
            if opts.recheck_seeds {
                if cfg.respect_robots {
                    if let Some(robots) = &state.robots {
                        if !robots.can_fetch(&seed).await {
                            state.manifest.append(&ManifestEvent::SkipSeedAlreadyDoneRobotsDisallow {
                                prefecture: task.prefecture.clone(),
                                city: task.city.clone(),
                                mode: task.mode,
                                seed_url: seed,
                            })?;
                            state.skipped_seed_count.fetch_add(1, Ordering::Relaxed);
                            return Ok(0);
                        }
                    }
                }

                let delay = effective_delay(state, cfg, &seed).await;
                state.limiter.wait(&seed, delay).await;
                let check =
                    revalidate::fetch_seed_state(&state.client, &seed, prev_meta.as_ref()).await;

                state.manifest.append(&ManifestEvent::SeedState {
                    seed_url: seed.clone(),
                    etag: check.meta.etag.clone(),
                    last_modified: check.meta.last_modified.clone(),
                    content_sha1: check.meta.content_sha1.clone(),
                })?;
                state.cache.lock().seed_meta.insert(seed.clone(), check.meta);

                if !check.changed {
                    state.manifest.append(&ManifestEvent::SkipSeedAlreadyDoneNotModified {
                        prefecture: task.prefecture.clone(),
                        city: task.city.clone(),
                        mode: task.mode,
                        seed_url: seed,
                    })?;
                    state.skipped_seed_count.fetch_add(1, Ordering::Relaxed);
                    return Ok(0);
                }

                state.manifest.append(&ManifestEvent::SeedChangedReCrawl {
                    prefecture: task.prefecture.clone(),
                    city: task.city.clone(),
                    mode: task.mode,
                    seed_url: seed.clone(),
                })?;
            } else {
                state.manifest.append(&ManifestEvent::SkipSeedAlreadyDone {
                    prefecture: task.prefecture.clone(),
                    city: task.city.clone(),
                    mode: task.mode,
                    seed_url: seed,
                })?;
                state.skipped_seed_count.fetch_add(1, Ordering::Relaxed);
                return Ok(0);
            }
        }
    }

    let found = crawl_seed(state, opts, task, &seed).await?;

    state.manifest.append(&ManifestEvent::SeedDone {
        prefecture: task.prefecture.clone(),
        city: task.city.clone(),
        mode: task.mode,
        seed_url: seed.clone(),
        found_count: found,
    })?;
    state.cache.lock().completed_seeds.insert(seed);
    tracing::info!(
        prefecture = %task.prefecture,
        city = %task.city,
        seed = %task.seed_url,
        found,
        "seed done"
    );
    Ok(found)
}

async fn crawl_seed(
    state: &SharedState,
    opts: &RunOptions,
    task: &SeedTask,
    seed: &str,
) -> Result<usize> {
    let cfg = &opts.crawl;
    let out = OutputLayout::new(&opts.out_dir);

    let (base_netloc, base_path) = match Url::parse(seed) {
        Ok(url) => (netloc(&url), url.path().to_string()),
        Err(_) => (String::new(), String::new()),
    };
    let base_prefix = format!("{}/", base_path.trim_end_matches('/'));

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((seed.to_string(), 0));
    let mut pages_fetched = 0usize;
    let mut found: Vec<String> = Vec::new();
    let mut found_set: HashSet<String> = HashSet::new();

    while pages_fetched < cfg.max_pages {
        let Some((url, depth)) = queue.pop_front() else { break };
        let url = normalize_url(&url);
        if !visited.insert(url.clone()) {
            continue;
        }

        if let Ok(parsed) = Url::parse(&url) {
            let loc = netloc(&parsed);
            if cfg.same_domain_only && !loc.is_empty() && loc != base_netloc {
                continue;
            }
            let path = parsed.path();
            if cfg.same_path_prefix_only
                && !path.is_empty()
                && !path.starts_with(&base_prefix)
                && path != base_path
            {
                continue;
            }
        }

        if cfg.respect_robots {
            if let Some(robots) = &state.robots {
                if !robots.can_fetch(&url).await {
                    state.report.add(&task.prefecture, &task.city, &url);
                    state.manifest.append(&ManifestEvent::RobotsDisallow {
                        prefecture: task.prefecture.clone(),
                        city: task.city.clone(),
                        url: url.clone(),
                    })?;
                    continue;
                }
            }
        }

        let delay = effective_delay(state, cfg, &url).await;
        state.limiter.wait(&url, delay).await;

        let res = match fetch::fetch_url(&state.client, &url, None).await {
            Ok(res) if res.status.is_success() => {
                pages_fetched += 1;
                res
            }
            Ok(res) => {
                state.manifest.append(&ManifestEvent::FetchError {
                    prefecture: task.prefecture.clone(),
                    city: task.city.clone(),
                    url: url.clone(),
                    error: format!("http status {}", res.status.as_u16()),
                })?;
                continue;
            }
            Err(err) => {
                state.manifest.append(&ManifestEvent::FetchError {
                    prefecture: task.prefecture.clone(),
                    city: task.city.clone(),
                    url: url.clone(),
                    error: fetch::classify(&err),
                })?;
                continue;
            }
        };

        let final_page_url = normalize_url(&res.final_url);
        let content_type = res.content_type.to_lowercase();

        // A seed or intermediate URL that turns out to be the document itself.
        if is_binary_content_type(&content_type) {
            let file_final = final_page_url;
            if found_set.insert(file_final.clone()) {
                found.push(file_final.clone());
            }

            if opts.download_files {
                let already = {
                    let cache = state.cache.lock();
                    opts.resume
                        && !opts.force_download
                        && cache.downloaded_file_urls.contains(&file_final)
                };
                if already {
                    state.manifest.append(&ManifestEvent::SkipDownloadAlreadyDone {
                        prefecture: task.prefecture.clone(),
                        city: task.city.clone(),
                        file_url: file_final,
                    })?;
                } else {
                    let ext = ext_from_content_type(&content_type)
                        .map(str::to_string)
                        .or_else(|| path_suffix(&file_final))
                        .unwrap_or_else(|| ".bin".to_string());
                    let name = format!("{}{}", sha1_hex(&file_final), ext);
                    let path = out.file_path(&task.prefecture, &task.city, &name);
                    match save_bytes(&path, &res.body) {
                        Ok(()) => {
                            state.cache.lock().downloaded_file_urls.insert(file_final.clone());
                            state.manifest.append(&ManifestEvent::DownloadedFile {
                                prefecture: task.prefecture.clone(),
                                city: task.city.clone(),
                                source_page: url.clone(),
                                file_url: file_final,
                                content_type: res.content_type.clone(),
                                path: path.display().to_string(),
                            })?;
                        }
                        Err(err) => {
                            state.manifest.append(&ManifestEvent::DownloadError {
                                prefecture: task.prefecture.clone(),
                                city: task.city.clone(),
                                source_page: url.clone(),
                                file_url: file_final,
                                error: err.to_string(),
                            })?;
                        }
                    }
                }
            }
            continue;
        }

        let html = String::from_utf8_lossy(&res.body).to_string();

        if opts.save_pages {
            let already = {
                let cache = state.cache.lock();
                opts.resume && cache.saved_page_urls.contains(&final_page_url)
            };
            if already {
                state.manifest.append(&ManifestEvent::SkipSavePageAlreadyDone {
                    prefecture: task.prefecture.clone(),
                    city: task.city.clone(),
                    page_url: final_page_url.clone(),
                })?;
            } else {
                let page_path = out.page_path(&task.prefecture, &task.city, &final_page_url);
                match save_bytes(&page_path, &res.body) {
                    Ok(()) => {
                        state.cache.lock().saved_page_urls.insert(final_page_url.clone());
                        state.manifest.append(&ManifestEvent::SavedPage {
                            prefecture: task.prefecture.clone(),
                            city: task.city.clone(),
                            page_url: final_page_url.clone(),
                            path: page_path.display().to_string(),
                            content_type: res.content_type.clone(),
                        })?;
                    }
                    Err(err) => {
                        state.manifest.append(&ManifestEvent::FetchError {
                            prefecture: task.prefecture.clone(),
                            city: task.city.clone(),
                            url: final_page_url.clone(),
                            error: format!("save page: {err}"),
                        })?;
                        continue;
                    }
                }
            }
        }

        let Ok(base_url) = Url::parse(&final_page_url) else { continue };
        for (href, anchor_text) in extract_links(&html) {
            let Ok(mut joined) = base_url.join(&href) else { continue };
            joined.set_fragment(None);
            let abs_url = normalize_url(joined.as_str());
            if abs_url.is_empty() {
                continue;
            }
            if matches!(joined.scheme(), "mailto" | "javascript" | "tel") {
                continue;
            }

            let loc = netloc(&joined);
            if cfg.same_domain_only && !loc.is_empty() && loc != base_netloc {
                continue;
            }

            if looks_like_minutes_link(
                &abs_url,
                &anchor_text,
                &cfg.keywords,
                &cfg.file_exts,
                &cfg.url_hints,
            ) {
                if found_set.insert(abs_url.clone()) {
                    found.push(abs_url.clone());
                    state.manifest.append(&ManifestEvent::FoundMinutesLink {
                        prefecture: task.prefecture.clone(),
                        city: task.city.clone(),
                        source_page: final_page_url.clone(),
                        link_url: abs_url.clone(),
                        anchor_text: anchor_text.clone(),
                    })?;
                }

                if opts.download_files {
                    let link_ext = path_suffix(&abs_url).map(|s| s.to_lowercase());
                    if let Some(link_ext) = link_ext.filter(|e| cfg.file_exts.contains(e)) {
                        download_minutes_file(state, opts, task, &final_page_url, &abs_url, &link_ext, &out)
                            .await?;
                    }
                }
                continue;
            }

            if depth < cfg.max_depth {
                let path = joined.path();
                if cfg.same_path_prefix_only
                    && !path.is_empty()
                    && !path.starts_with(&base_prefix)
                    && path != base_path
                {
                    continue;
                }
                if !visited.contains(&abs_url) {
                    queue.push_back((abs_url, depth + 1));
                }
            }
        }
    }

    Ok(found.len())
}

/// Fetch and store one minutes file linked from a page. Membership is checked
/// on the link URL before the fetch and on the final URL after it, so a
/// redirect to an already-stored document is still skipped.
async fn download_minutes_file(
    state: &SharedState,
    opts: &RunOptions,
    task: &SeedTask,
    source_page: &str,
    file_url: &str,
    link_ext: &str,
    out: &OutputLayout,
) -> Result<()> {
    let cfg = &opts.crawl;

    if cfg.respect_robots {
        if let Some(robots) = &state.robots {
            if !robots.can_fetch(file_url).await {
                state.report.add(&task.prefecture, &task.city, file_url);
                state.manifest.append(&ManifestEvent::RobotsDisallow {
                    prefecture: task.prefecture.clone(),
                    city: task.city.clone(),
                    url: file_url.to_string(),
                })?;
                return Ok(());
            }
        }
    }

    let already = {
        let cache = state.cache.lock();
        opts.resume && !opts.force_download && cache.downloaded_file_urls.contains(file_url)
    };
    if already {
        state.manifest.append(&ManifestEvent::SkipDownloadAlreadyDone {
            prefecture: task.prefecture.clone(),
            city: task.city.clone(),
            file_url: file_url.to_string(),
        })?;
        return Ok(());
    }

    let delay = effective_delay(state, cfg, file_url).await;
    state.limiter.wait(file_url, delay).await;

    let res = match fetch::fetch_url(&state.client, file_url, None).await {
        Ok(res) if res.status.is_success() => res,
        Ok(res) => {
            state.manifest.append(&ManifestEvent::DownloadError {
                prefecture: task.prefecture.clone(),
                city: task.city.clone(),
                source_page: source_page.to_string(),
                file_url: file_url.to_string(),
                error: format!("http status {}", res.status.as_u16()),
            })?;
            return Ok(());
        }
        Err(err) => {
            state.manifest.append(&ManifestEvent::DownloadError {
                prefecture: task.prefecture.clone(),
                city: task.city.clone(),
                source_page: source_page.to_string(),
                file_url: file_url.to_string(),
                error: fetch::classify(&err),
            })?;
            return Ok(());
        }
    };

    let file_final = normalize_url(&res.final_url);
    let already_final = {
        let cache = state.cache.lock();
        opts.resume && !opts.force_download && cache.downloaded_file_urls.contains(&file_final)
    };
    if already_final {
        state.manifest.append(&ManifestEvent::SkipDownloadAlreadyDone {
            prefecture: task.prefecture.clone(),
            city: task.city.clone(),
            file_url: file_final,
        })?;
        return Ok(());
    }

    let content_type = res.content_type.to_lowercase();
    let ext = path_suffix(&file_final)
        .map(|s| s.to_lowercase())
        .or_else(|| ext_from_content_type(&content_type).map(str::to_string))
        .unwrap_or_else(|| link_ext.to_string());
    let name = format!("{}{}", sha1_hex(&file_final), ext);
    let path = out.file_path(&task.prefecture, &task.city, &name);

    match save_bytes(&path, &res.body) {
        Ok(()) => {
            state.cache.lock().downloaded_file_urls.insert(file_final.clone());
            state.manifest.append(&ManifestEvent::DownloadedFile {
                prefecture: task.prefecture.clone(),
                city: task.city.clone(),
                source_page: source_page.to_string(),
                file_url: file_final,
                content_type: res.content_type.clone(),
                path: path.display().to_string(),
            })?;
        }
        Err(err) => {
            state.manifest.append(&ManifestEvent::DownloadError {
                prefecture: task.prefecture.clone(),
                city: task.city.clone(),
                source_page: source_page.to_string(),
                file_url: file_url.to_string(),
                error: err.to_string(),
            })?;
        }
    }
    Ok(())
}
