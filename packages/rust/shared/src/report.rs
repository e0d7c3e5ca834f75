//! Structured per-stage outcome reports.
//!
//! Every stage is best-effort: item failures are recorded here and the batch
//! carries on. The report is the machine-readable counterpart of the log.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AlmanacError, Result};

/// The three pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Scrape,
    Clean,
    Load,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scrape => "scrape",
            Self::Clean => "clean",
            Self::Load => "load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one item (metric or file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Completed,
    Skipped { reason: String },
    Failed { error: String },
}

/// Outcome of one item within a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    /// Metric name or file name.
    pub item: String,
    #[serde(flatten)]
    pub status: ItemStatus,
    /// Rows read (cleaner, loader).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_in: Option<usize>,
    /// Records written (scraper), rows written (cleaner) or rows counted
    /// after load (loader).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_out: Option<usize>,
}

impl ItemReport {
    pub fn completed(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            status: ItemStatus::Completed,
            rows_in: None,
            rows_out: None,
        }
    }

    pub fn skipped(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            status: ItemStatus::Skipped {
                reason: reason.into(),
            },
            rows_in: None,
            rows_out: None,
        }
    }

    pub fn failed(item: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            item: item.into(),
            status: ItemStatus::Failed {
                error: error.to_string(),
            },
            rows_in: None,
            rows_out: None,
        }
    }

    pub fn with_rows(mut self, rows_in: Option<usize>, rows_out: Option<usize>) -> Self {
        self.rows_in = rows_in;
        self.rows_out = rows_out;
        self
    }
}

/// Summary of one stage run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub items: Vec<ItemReport>,
}

impl StageReport {
    pub fn new(stage: Stage, run_id: Uuid) -> Self {
        Self {
            stage,
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, item: ItemReport) {
        self.items.push(item);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn completed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Completed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Failed { .. }))
    }

    /// Items that failed, as `(item, error)`.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().filter_map(|i| match &i.status {
            ItemStatus::Failed { error } => Some((i.item.as_str(), error.as_str())),
            _ => None,
        })
    }

    /// Look up the report for one item.
    pub fn item(&self, name: &str) -> Option<&ItemReport> {
        self.items.iter().find(|i| i.item == name)
    }

    /// Write the report as pretty JSON to `<dir>/<stage>_<run_id>.report.json`.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| AlmanacError::io(dir, e))?;
        let path = dir.join(format!("{}_{}.report.json", self.stage, self.run_id));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AlmanacError::validation(format!("report serialization failed: {e}")))?;
        std::fs::write(&path, json).map_err(|e| AlmanacError::io(&path, e))?;
        Ok(path)
    }

    fn count(&self, pred: impl Fn(&ItemStatus) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.status)).count()
    }
}
