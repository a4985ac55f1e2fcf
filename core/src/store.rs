use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use sha1::{Digest, Sha1};

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r#"[\\/:*?"<>|]+"#).expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Sanitize a prefecture or city name into a path component: forbidden
/// character runs become `_`, whitespace runs collapse to one space,
/// capped at 80 characters.
pub fn safe_name(name: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(name.trim(), "_");
    let collapsed = WHITESPACE.replace_all(&replaced, " ");
    collapsed.chars().take(80).collect()
}

pub fn sha1_hex(text: &str) -> String {
    sha1_bytes(text.as_bytes())
}

pub fn sha1_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Per-municipality output layout: `<root>/<pref>/<city>/files` for
/// downloaded minutes and `<root>/<pref>/<city>/pages` for saved HTML.
pub struct OutputLayout {
    pub root: PathBuf,
}

impl OutputLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn city_dir(&self, prefecture: &str, city: &str) -> PathBuf {
        self.root.join(safe_name(prefecture)).join(safe_name(city))
    }

    pub fn file_path(&self, prefecture: &str, city: &str, file_name: &str) -> PathBuf {
        self.city_dir(prefecture, city).join("files").join(file_name)
    }

    pub fn page_path(&self, prefecture: &str, city: &str, final_url: &str) -> PathBuf {
        self.city_dir(prefecture, city)
            .join("pages")
            .join(format!("{}.html", sha1_hex(final_url)))
    }
}

pub fn save_bytes(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    Ok(())
}
