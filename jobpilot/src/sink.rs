//! Append-only result records and screenshot evidence.

use crate::error::Result;
use crate::model::{ApplicationOutcome, Evidence, JobRecord, RunSummary, SessionVerification};
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const SLUG_MAX: usize = 48;

/// File-name slug for a job: path and query of its URL, lowercased, with
/// runs of anything but ASCII alphanumerics collapsed to `-`.
fn job_slug(job: &JobRecord) -> String {
    let tail = match url::Url::parse(&job.url) {
        Ok(url) => format!("{}?{}", url.path(), url.query().unwrap_or_default()),
        Err(_) => job.url.clone(),
    };
    let mut slug = String::with_capacity(tail.len());
    for c in tail.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    // Keep the end: ids live there.
    let trimmed = slug.trim_end_matches('-');
    let start = trimmed.len().saturating_sub(SLUG_MAX);
    match trimmed[start..].trim_start_matches('-') {
        "" => "job".to_string(),
        s => s.to_string(),
    }
}

/// Add an ISO-8601 `timestamp` to an object record that lacks one.
pub fn stamp(mut record: Value) -> Value {
    if let Value::Object(map) = &mut record {
        let missing = map.get("timestamp").map(Value::is_null).unwrap_or(true);
        if missing {
            map.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
        }
    }
    record
}

/// Destination for outcome and summary records.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Append one record. Implementations stamp it first.
    async fn push(&self, record: Value) -> Result<()>;
}

/// Serialize and push, logging instead of failing.
pub async fn push_logged<T: Serialize + Sync>(sink: &dyn ResultSink, record: &T) {
    let value = match serde_json::to_value(record) {
        Ok(value) => value,
        Err(e) => {
            log::error!("Failed to serialize result record: {}", e);
            return;
        }
    };
    if let Err(e) = sink.push(value).await {
        log::error!("Failed to push result record: {}", e);
    }
}

/// Pre-flight record with per-platform checks and counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionValidationRecord {
    /// Always `session_validation`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// When the check finished.
    pub timestamp: String,
    /// Check per platform key.
    pub platforms: BTreeMap<String, SessionVerification>,
    /// Aggregate counts.
    pub summary: SessionValidationSummary,
}

/// Counts inside a [`SessionValidationRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionValidationSummary {
    /// Platforms checked.
    pub total_platforms: usize,
    /// Platforms with an authenticated session.
    pub valid_sessions: usize,
    /// Platforms without one.
    pub invalid_sessions: usize,
}

impl SessionValidationRecord {
    /// Build the record from per-platform results.
    pub fn new(platforms: BTreeMap<String, SessionVerification>) -> Self {
        let valid = platforms.values().filter(|v| v.authenticated).count();
        Self {
            kind: "session_validation",
            timestamp: Utc::now().to_rfc3339(),
            summary: SessionValidationSummary {
                total_platforms: platforms.len(),
                valid_sessions: valid,
                invalid_sessions: platforms.len() - valid,
            },
            platforms,
        }
    }
}

/// Closing record of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSummaryRecord {
    /// Always `final_summary`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// When the run finished.
    pub timestamp: String,
    /// The counts.
    #[serde(flatten)]
    pub summary: RunSummary,
}

impl FinalSummaryRecord {
    /// Wrap a summary.
    pub fn new(summary: RunSummary) -> Self {
        Self {
            kind: "final_summary",
            timestamp: Utc::now().to_rfc3339(),
            summary,
        }
    }
}

/// Appends one JSON object per line to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonLinesSink {
    /// Open (or create) `path` for appending.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    /// Path being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonLinesSink {
    async fn push(&self, record: Value) -> Result<()> {
        let mut line = serde_json::to_vec(&stamp(record))?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: parking_lot::Mutex<Vec<Value>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record pushed so far.
    pub fn records(&self) -> Vec<Value> {
        self.records.lock().clone()
    }

    /// Records carrying `"type": kind`.
    pub fn records_of_type(&self, kind: &str) -> Vec<Value> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.get("type").and_then(Value::as_str) == Some(kind))
            .cloned()
            .collect()
    }

    /// Per-job outcome records, decoded.
    pub fn outcomes(&self) -> Vec<ApplicationOutcome> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.get("type").is_none())
            .filter_map(|r| serde_json::from_value(r.clone()).ok())
            .collect()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn push(&self, record: Value) -> Result<()> {
        self.records.lock().push(stamp(record));
        Ok(())
    }
}

/// Where screenshot evidence goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EvidenceStore {
    /// Keep PNGs inline as base64.
    #[default]
    Inline,
    /// Write PNGs into a directory and reference them by path.
    Directory(PathBuf),
}

impl EvidenceStore {
    /// Store a directory-backed evidence set.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::Directory(path.into())
    }

    /// Persist a screenshot and return its reference.
    pub async fn store(&self, job: &JobRecord, label: &str, png: &[u8]) -> Result<Evidence> {
        match self {
            Self::Inline => Ok(Evidence::Inline {
                png_base64: base64::engine::general_purpose::STANDARD.encode(png),
            }),
            Self::Directory(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let name = format!(
                    "{}-{}-{}-{}.png",
                    job.platform_key().unwrap_or_else(|| "other".to_string()),
                    job_slug(job),
                    label,
                    Utc::now().timestamp_millis()
                );
                let path = dir.join(name);
                tokio::fs::write(&path, png).await?;
                Ok(Evidence::File { path })
            }
        }
    }
}
