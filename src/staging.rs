//! Durable staging area
//!
//! File-based output of the pipeline, one directory per stage:
//!
//! - `follows/<did>_follows.jsonl`: raw follow entries, appended per discovery run
//! - `profiles/<did>.json`: one profile object, overwritten per collection
//! - `posts/<did>_posts.jsonl`: post records, appended per collection
//!
//! Appends never rewrite earlier lines, so repeated runs accumulate duplicates that
//! downstream consumers are expected to tolerate.

use crate::error::StagingError;
use crate::models::{PostRecord, ProfileRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const FOLLOWS_DIR: &str = "follows";
const PROFILES_DIR: &str = "profiles";
const POSTS_DIR: &str = "posts";

#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn follows_path(&self, subject: &str) -> PathBuf {
        self.root
            .join(FOLLOWS_DIR)
            .join(format!("{}_follows.jsonl", file_stem(subject)))
    }

    pub fn profile_path(&self, did: &str) -> PathBuf {
        self.root
            .join(PROFILES_DIR)
            .join(format!("{}.json", file_stem(did)))
    }

    pub fn posts_path(&self, did: &str) -> PathBuf {
        self.root
            .join(POSTS_DIR)
            .join(format!("{}_posts.jsonl", file_stem(did)))
    }

    /// Append raw follow entries discovered for `subject`.
    pub fn append_follows(&self, subject: &str, entries: &[Value]) -> Result<(), StagingError> {
        append_lines(&self.follows_path(subject), entries)
    }

    /// Write the profile for its DID, replacing any earlier copy.
    pub fn write_profile(&self, profile: &ProfileRecord) -> Result<PathBuf, StagingError> {
        let path = self.profile_path(&profile.did);
        ensure_parent(&path)?;
        // Write-then-rename so a crash never leaves a truncated profile behind
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(profile)?)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Append post records to the author's log.
    pub fn append_posts(&self, did: &str, posts: &[PostRecord]) -> Result<(), StagingError> {
        append_lines(&self.posts_path(did), posts)
    }

    pub fn read_profile(&self, did: &str) -> Result<Option<ProfileRecord>, StagingError> {
        let path = self.profile_path(did);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn read_posts(&self, did: &str) -> Result<Vec<PostRecord>, StagingError> {
        read_lines(&self.posts_path(did))
    }

    pub fn read_follows(&self, subject: &str) -> Result<Vec<Value>, StagingError> {
        read_lines(&self.follows_path(subject))
    }
}

/// Filename-safe form of an identifier. DIDs keep their `:` separators.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn ensure_parent(path: &Path) -> Result<(), StagingError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn append_lines<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StagingError> {
    ensure_parent(path)?;
    let mut buf = Vec::new();
    for item in items {
        serde_json::to_writer(&mut buf, item)?;
        buf.push(b'\n');
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&buf)?;
    file.flush()?;
    Ok(())
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StagingError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        items.push(serde_json::from_str(&line)?);
    }
    Ok(items)
}
