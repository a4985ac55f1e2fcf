use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use tokio::sync::OnceCell;
use url::Url;

use minutes_core::manifest::{ManifestEvent, ManifestWriter};
use minutes_core::urls::{netloc, normalize_url};

use crate::fetch;

/// Cached robots state for one host. `body: None` records a load failure,
/// which is sticky for the process lifetime and means allow-all with no
/// crawl-delay.
#[derive(Debug)]
pub struct RobotsEntry {
    body: Option<String>,
    crawl_delay: Option<f64>,
}

/// Shared robots.txt cache. The first visit to a host fetches and parses its
/// policy exactly once; concurrent first visits share the same in-flight load
/// through the per-host cell.
pub struct RobotsRegistry {
    client: Client,
    user_agent: String,
    manifest: Arc<ManifestWriter>,
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<RobotsEntry>>>>>,
}

impl RobotsRegistry {
    pub fn new(client: Client, user_agent: String, manifest: Arc<ManifestWriter>) -> Self {
        Self { client, user_agent, manifest, cells: Mutex::new(HashMap::new()) }
    }

    pub async fn can_fetch(&self, url: &str) -> bool {
        let url = normalize_url(url);
        match self.entry_for(&url).await {
            Some(entry) => match &entry.body {
                Some(body) => {
                    let mut matcher = DefaultMatcher::default();
                    matcher.one_agent_allowed_by_robots(body, &self.user_agent, &url)
                }
                None => true,
            },
            None => true,
        }
    }

    pub async fn crawl_delay(&self, url: &str) -> Option<f64> {
        self.entry_for(&normalize_url(url)).await.and_then(|entry| entry.crawl_delay)
    }

    async fn entry_for(&self, url: &str) -> Option<Arc<RobotsEntry>> {
        let parsed = Url::parse(url).ok()?;
        let loc = netloc(&parsed);
        if loc.is_empty() {
            return None;
        }
        let cell = { self.cells.lock().entry(loc.clone()).or_default().clone() };
        let entry = cell
            .get_or_init(|| self.load(parsed.scheme().to_string(), loc))
            .await
            .clone();
        Some(entry)
    }

    async fn load(&self, scheme: String, loc: String) -> Arc<RobotsEntry> {
        let scheme = if scheme.is_empty() { "https".to_string() } else { scheme };
        let robots_url = format!("{scheme}://{loc}/robots.txt");

        let outcome = match fetch::fetch_url(&self.client, &robots_url, None).await {
            Ok(res) if res.status.is_success() => Ok(String::from_utf8_lossy(&res.body).to_string()),
            Ok(res) => Err(format!("http status {}", res.status.as_u16())),
            Err(err) => Err(fetch::classify(&err)),
        };

        match outcome {
            Ok(body) => {
                let crawl_delay = parse_crawl_delay(&body, &self.user_agent);
                let event = ManifestEvent::RobotsLoaded { netloc: loc, robots_url };
                if let Err(err) = self.manifest.append(&event) {
                    tracing::warn!(error = %err, "manifest write failed for robots_loaded");
                }
                Arc::new(RobotsEntry { body: Some(body), crawl_delay })
            }
            Err(error) => {
                let event =
                    ManifestEvent::RobotsLoadFailedAllowAll { netloc: loc, robots_url, error };
                if let Err(err) = self.manifest.append(&event) {
                    tracing::warn!(error = %err, "manifest write failed for robots_load_failed");
                }
                Arc::new(RobotsEntry { body: None, crawl_delay: None })
            }
        }
    }
}

/// Crawl-delay for the configured user agent. The matcher crate does not
/// surface it, so groups are scanned directly: a group naming (a substring
/// of) the agent token beats the `*` group, first value wins within each,
/// fractional values allowed.
pub fn parse_crawl_delay(body: &str, user_agent: &str) -> Option<f64> {
    let token = user_agent.split('/').next().unwrap_or("").trim().to_lowercase();
    let mut specific: Option<f64> = None;
    let mut wildcard: Option<f64> = None;
    let mut agents: Vec<String> = Vec::new();
    let mut in_agent_run = false;

    for raw in body.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        match key.as_str() {
            "user-agent" => {
                if !in_agent_run {
                    agents.clear();
                }
                agents.push(value.to_lowercase());
                in_agent_run = true;
            }
            "crawl-delay" => {
                in_agent_run = false;
                if let Ok(delay) = value.parse::<f64>() {
                    if agents.iter().any(|a| a != "*" && !a.is_empty() && token.contains(a.as_str()))
                    {
                        specific.get_or_insert(delay);
                    } else if agents.iter().any(|a| a == "*") {
                        wildcard.get_or_insert(delay);
                    }
                }
            }
            _ => {
                in_agent_run = false;
            }
        }
    }
    specific.or(wildcard)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "minutes-crawler/0.1 (+test)";

    #[test]
    fn wildcard_group_delay() {
        let body = "User-agent: *\nCrawl-delay: 2\nDisallow: /private/\n";
        assert_eq!(parse_crawl_delay(body, UA), Some(2.0));
    }

    #[test]
    fn specific_group_beats_wildcard() {
        let body = "User-agent: *\nCrawl-delay: 1\n\nUser-agent: minutes-crawler\nCrawl-delay: 7.5\n";
        assert_eq!(parse_crawl_delay(body, UA), Some(7.5));
    }

    #[test]
    fn stacked_agent_lines_share_a_group() {
        let body = "User-agent: googlebot\nUser-agent: minutes-crawler\nCrawl-delay: 3\n";
        assert_eq!(parse_crawl_delay(body, UA), Some(3.0));
    }

    #[test]
    fn unrelated_group_is_ignored() {
        let body = "User-agent: googlebot\nCrawl-delay: 10\n";
        assert_eq!(parse_crawl_delay(body, UA), None);
    }

    #[test]
    fn fractional_and_comments() {
        let body = "# site policy\nUser-agent: * # everyone\nCrawl-delay: 0.5\n";
        assert_eq!(parse_crawl_delay(body, UA), Some(0.5));
    }

    #[test]
    fn no_delay_directive() {
        let body = "User-agent: *\nDisallow: /tmp/\n";
        assert_eq!(parse_crawl_delay(body, UA), None);
    }
}
