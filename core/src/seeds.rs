use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::urls::netloc_of;

/// One municipality from the site-discovery stage. `parent` maps candidate
/// listing pages to the number of minutes-like links found on them;
/// `grand_parent` maps the pages one level up. URL order is preserved.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRecord {
    #[serde(default)]
    pub prefecture: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub parent: IndexMap<String, i64>,
    #[serde(default)]
    pub grand_parent: IndexMap<String, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    Parent,
    GrandParent,
}

impl SeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedMode::Parent => "parent",
            SeedMode::GrandParent => "grand_parent",
        }
    }
}

/// A unit of crawl work, owned by exactly one worker after dispatch.
#[derive(Debug, Clone)]
pub struct SeedTask {
    pub prefecture: String,
    pub city: String,
    pub mode: SeedMode,
    pub seed_url: String,
}

pub fn load_seed_records(path: &Path) -> Result<Vec<SeedRecord>> {
    let file = File::open(path).with_context(|| format!("open seed list {}", path.display()))?;
    let records = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parse seed list {}", path.display()))?;
    Ok(records)
}

pub fn sum_counts(counts: &IndexMap<String, i64>) -> i64 {
    counts.values().sum()
}

/// Parent seeds win when they are dense enough, otherwise fall back one level.
pub fn choose_seed_urls(record: &SeedRecord, threshold: i64) -> (SeedMode, &IndexMap<String, i64>) {
    if sum_counts(&record.parent) >= threshold && !record.parent.is_empty() {
        (SeedMode::Parent, &record.parent)
    } else {
        (SeedMode::GrandParent, &record.grand_parent)
    }
}

/// Interleave tasks across hosts: one task per host per round, hosts in
/// first-seen order, tasks without a host at the tail. Keeps consecutive
/// dispatches off the same municipal server even at low worker counts.
pub fn round_robin_by_netloc(tasks: Vec<SeedTask>) -> Vec<SeedTask> {
    let mut buckets: IndexMap<String, VecDeque<SeedTask>> = IndexMap::new();
    for task in tasks {
        buckets
            .entry(netloc_of(&task.seed_url))
            .or_default()
            .push_back(task);
    }
    let mut hostless = buckets.shift_remove("").unwrap_or_default();

    let mut ordered = Vec::new();
    loop {
        let mut took_any = false;
        for bucket in buckets.values_mut() {
            if let Some(task) = bucket.pop_front() {
                ordered.push(task);
                took_any = true;
            }
        }
        if !took_any {
            break;
        }
    }
    ordered.extend(hostless.drain(..));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(parent: &[(&str, i64)], grand: &[(&str, i64)]) -> SeedRecord {
        SeedRecord {
            prefecture: "P".into(),
            city: "C".into(),
            parent: parent.iter().map(|(u, n)| (u.to_string(), *n)).collect(),
            grand_parent: grand.iter().map(|(u, n)| (u.to_string(), *n)).collect(),
        }
    }

    #[test]
    fn threshold_boundary_selects_parent_mode() {
        let rec = record(&[("http://h/a", 2), ("http://h/b", 3)], &[("http://h/", 1)]);
        assert_eq!(choose_seed_urls(&rec, 5).0, SeedMode::Parent);
        assert_eq!(choose_seed_urls(&rec, 6).0, SeedMode::GrandParent);
    }

    #[test]
    fn empty_parent_map_falls_back_even_at_zero_threshold() {
        let rec = record(&[], &[("http://h/", 1)]);
        let (mode, urls) = choose_seed_urls(&rec, 0);
        assert_eq!(mode, SeedMode::GrandParent);
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"[{"prefecture":"P","city":"C","parent":{"http://h/":3},"grand_parent":{},"score":0.9}]"#;
        let records: Vec<SeedRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].parent.len(), 1);
    }

    #[test]
    fn round_robin_interleaves_hosts() {
        let tasks = vec![
            task("http://a/1"),
            task("http://a/2"),
            task("http://b/1"),
            task("nohost"),
            task("http://b/2"),
            task("http://c/1"),
        ];
        let ordered: Vec<String> = round_robin_by_netloc(tasks)
            .into_iter()
            .map(|t| t.seed_url)
            .collect();
        assert_eq!(
            ordered,
            vec!["http://a/1", "http://b/1", "http://c/1", "http://a/2", "http://b/2", "nohost"]
        );
    }

    fn task(url: &str) -> SeedTask {
        SeedTask {
            prefecture: "P".into(),
            city: "C".into(),
            mode: SeedMode::Parent,
            seed_url: url.into(),
        }
    }
}
