use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::urls::{netloc_of, normalize_url, path_prefix};

#[derive(Debug, Clone, Serialize)]
pub struct DisallowEntry {
    pub prefecture: String,
    pub city: String,
    pub netloc: String,
    pub path_prefix: String,
    pub url: String,
}

#[derive(Default)]
struct Inner {
    seen: HashSet<String>,
    entries: Vec<DisallowEntry>,
}

/// Audit trail of robots-blocked URLs, deduplicated by
/// `prefecture|city|url`, shared across workers.
#[derive(Default)]
pub struct DisallowReport {
    inner: Mutex<Inner>,
}

#[derive(Debug, Serialize)]
pub struct DisallowSummary {
    pub generated_at: String,
    pub robots_disallow_total: usize,
    pub top_by_city: Vec<CityCount>,
    pub top_by_domain: Vec<DomainCount>,
    pub top_by_path_prefix: Vec<PrefixCount>,
}

#[derive(Debug, Serialize)]
pub struct CityCount {
    pub prefecture: String,
    pub city: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DomainCount {
    pub netloc: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PrefixCount {
    pub netloc: String,
    pub path_prefix: String,
    pub count: usize,
}

impl DisallowReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prefecture: &str, city: &str, url: &str) {
        let url = normalize_url(url);
        let key = format!("{prefecture}|{city}|{url}");
        let entry = DisallowEntry {
            prefecture: prefecture.to_string(),
            city: city.to_string(),
            netloc: netloc_of(&url),
            path_prefix: path_prefix(&url),
            url,
        };
        let mut inner = self.inner.lock();
        if inner.seen.insert(key) {
            inner.entries.push(entry);
        }
    }

    pub fn total(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn snapshot(&self) -> Vec<DisallowEntry> {
        self.inner.lock().entries.clone()
    }

    pub fn summary(&self, generated_at: &str) -> DisallowSummary {
        let entries = self.snapshot();
        DisallowSummary {
            generated_at: generated_at.to_string(),
            robots_disallow_total: entries.len(),
            top_by_city: by_city(&entries)
                .into_iter()
                .take(50)
                .map(|((prefecture, city), count)| CityCount { prefecture, city, count })
                .collect(),
            top_by_domain: by_domain(&entries)
                .into_iter()
                .take(50)
                .map(|(netloc, count)| DomainCount { netloc, count })
                .collect(),
            top_by_path_prefix: by_prefix(&entries)
                .into_iter()
                .take(50)
                .map(|((netloc, path_prefix), count)| PrefixCount { netloc, path_prefix, count })
                .collect(),
        }
    }

    /// JSONL of unique entries, a pretty JSON summary, and one CSV per
    /// aggregation (every row, count descending, first-seen order on ties).
    pub fn write_reports(&self, report_dir: &Path, generated_at: &str) -> Result<()> {
        fs::create_dir_all(report_dir)?;
        let entries = self.snapshot();

        let mut jsonl = BufWriter::new(File::create(report_dir.join("robots_disallow_urls.jsonl"))?);
        for entry in &entries {
            serde_json::to_writer(&mut jsonl, entry)?;
            jsonl.write_all(b"\n")?;
        }
        jsonl.flush()?;

        fs::write(
            report_dir.join("robots_disallow_summary.json"),
            serde_json::to_string_pretty(&self.summary(generated_at))?,
        )?;

        let mut city_csv = csv::Writer::from_path(report_dir.join("robots_disallow_by_city.csv"))?;
        city_csv.write_record(["prefecture", "city", "count"])?;
        for ((prefecture, city), count) in by_city(&entries) {
            city_csv.write_record([prefecture.as_str(), city.as_str(), &count.to_string()])?;
        }
        city_csv.flush()?;

        let mut domain_csv =
            csv::Writer::from_path(report_dir.join("robots_disallow_by_domain.csv"))?;
        domain_csv.write_record(["netloc", "count"])?;
        for (netloc, count) in by_domain(&entries) {
            domain_csv.write_record([netloc.as_str(), &count.to_string()])?;
        }
        domain_csv.flush()?;

        let mut prefix_csv =
            csv::Writer::from_path(report_dir.join("robots_disallow_by_path_prefix.csv"))?;
        prefix_csv.write_record(["netloc", "path_prefix", "count"])?;
        for ((netloc, path_prefix), count) in by_prefix(&entries) {
            prefix_csv.write_record([netloc.as_str(), path_prefix.as_str(), &count.to_string()])?;
        }
        prefix_csv.flush()?;

        Ok(())
    }
}

fn by_city(entries: &[DisallowEntry]) -> Vec<((String, String), usize)> {
    ranked(entries.iter().map(|e| (e.prefecture.clone(), e.city.clone())))
}

fn by_domain(entries: &[DisallowEntry]) -> Vec<(String, usize)> {
    ranked(entries.iter().map(|e| e.netloc.clone()))
}

fn by_prefix(entries: &[DisallowEntry]) -> Vec<((String, String), usize)> {
    ranked(entries.iter().map(|e| (e.netloc.clone(), e.path_prefix.clone())))
}

fn ranked<K: Eq + std::hash::Hash>(keys: impl Iterator<Item = K>) -> Vec<(K, usize)> {
    let mut counts: IndexMap<K, usize> = IndexMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut ranked: Vec<(K, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}
