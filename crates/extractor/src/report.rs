//! Batch progress persistence. One report JSON per playlist directory,
//! written atomically so a crash mid-write never corrupts resume state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TranscriptErrorKind;

pub const REPORT_FILE: &str = "_extraction_report.json";

/// Outcome of one attempted video in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub index: u32,
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<TranscriptErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A prior run already extracted this video.
    AlreadyDone,
    /// An IP block fired earlier in this run; no further requests were made.
    BlockActive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub index: u32,
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    pub reason: SkipReason,
}

/// Full record of one batch run over a playlist. Every video id appears at
/// most once across `successful`/`failed`/`skipped`. A resumed run records
/// prior successes as `AlreadyDone` skips; `extracted_ids` counts those as
/// done, so resume state survives chained runs through a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub playlist_id: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub playlist: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_videos: usize,
    pub accessible_videos: usize,
    #[serde(default)]
    pub successful: Vec<ReportEntry>,
    #[serde(default)]
    pub failed: Vec<ReportEntry>,
    #[serde(default)]
    pub skipped: Vec<SkippedEntry>,
    #[serde(default)]
    pub ip_blocked: bool,
}

impl ExtractionReport {
    pub fn begin(
        playlist_id: impl Into<String>,
        channel: impl Into<String>,
        playlist: impl Into<String>,
        total_videos: usize,
        accessible_videos: usize,
    ) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            channel: channel.into(),
            playlist: playlist.into(),
            started_at: Utc::now(),
            completed_at: None,
            total_videos,
            accessible_videos,
            successful: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            ip_blocked: false,
        }
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn add_success(&mut self, entry: ReportEntry) {
        debug_assert!(entry.success);
        self.successful.push(entry);
    }

    pub fn add_failure(&mut self, entry: ReportEntry) {
        debug_assert!(!entry.success);
        self.failed.push(entry);
    }

    pub fn add_skipped(&mut self, entry: SkippedEntry) {
        self.skipped.push(entry);
    }

    /// Video ids already extracted, this run or any earlier one; the skip
    /// set for resumed runs. `AlreadyDone` skips count, they stand in for
    /// successes of prior runs.
    pub fn extracted_ids(&self) -> HashSet<String> {
        self.successful
            .iter()
            .map(|e| e.video_id.clone())
            .chain(
                self.skipped
                    .iter()
                    .filter(|s| s.reason == SkipReason::AlreadyDone)
                    .map(|s| s.video_id.clone()),
            )
            .collect()
    }

    /// Video ids worth another attempt: failures plus block-skipped videos.
    /// `AlreadyDone` skips are excluded, they need no retry.
    pub fn retry_ids(&self) -> HashSet<String> {
        self.failed
            .iter()
            .map(|e| e.video_id.clone())
            .chain(
                self.skipped
                    .iter()
                    .filter(|s| s.reason == SkipReason::BlockActive)
                    .map(|s| s.video_id.clone()),
            )
            .collect()
    }
}

pub fn report_path(dir: &Path) -> PathBuf {
    dir.join(REPORT_FILE)
}

/// Write the report atomically: serialize to a sibling temp file, then
/// rename over the final name.
pub async fn save_report(report: &ExtractionReport, dir: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = report_path(dir);
    let tmp = dir.join(format!("{REPORT_FILE}.tmp"));

    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, &path).await?;

    debug!(path = %path.display(), "extraction report saved");
    Ok(path)
}

/// Load a prior report. Missing or unreadable files mean a fresh start,
/// never an error.
pub async fn load_report(dir: &Path) -> Option<ExtractionReport> {
    let path = report_path(dir);
    let raw = tokio::fs::read_to_string(&path).await.ok()?;
    match serde_json::from_str(&raw) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt extraction report");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ExtractionReport {
        let mut report = ExtractionReport::begin("PLtest", "Some Creator", "Market Basics", 5, 4);
        report.add_success(ReportEntry {
            index: 1,
            video_id: "aaaaaaaaaaa".into(),
            title: "Intro".into(),
            success: true,
            chars: Some(1234),
            file: Some("01_Intro.md".into()),
            error_kind: None,
            error: None,
        });
        report.add_failure(ReportEntry {
            index: 2,
            video_id: "bbbbbbbbbbb".into(),
            title: "Part Two".into(),
            success: false,
            chars: None,
            file: None,
            error_kind: Some(TranscriptErrorKind::TranscriptsDisabled),
            error: Some("transcripts are disabled for this video".into()),
        });
        report.add_skipped(SkippedEntry {
            index: 3,
            video_id: "ccccccccccc".into(),
            title: "Part Three".into(),
            reason: SkipReason::BlockActive,
        });
        report.add_skipped(SkippedEntry {
            index: 4,
            video_id: "ddddddddddd".into(),
            title: "Part Four".into(),
            reason: SkipReason::AlreadyDone,
        });
        report
    }

    #[test]
    fn resume_sets() {
        let report = sample_report();
        // AlreadyDone skips count as extracted; BlockActive skips do not.
        assert_eq!(
            report.extracted_ids(),
            HashSet::from(["aaaaaaaaaaa".to_owned(), "ddddddddddd".to_owned()])
        );
        assert_eq!(
            report.retry_ids(),
            HashSet::from(["bbbbbbbbbbb".to_owned(), "ccccccccccc".to_owned()])
        );
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut report = sample_report();
        report.finish();

        let path = save_report(&report, dir.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), REPORT_FILE);
        // No temp file left behind.
        assert!(!dir.path().join(format!("{REPORT_FILE}.tmp")).exists());

        let loaded = load_report(dir.path()).await.unwrap();
        assert_eq!(loaded.playlist_id, "PLtest");
        assert_eq!(loaded.successful.len(), 1);
        assert_eq!(loaded.failed.len(), 1);
        assert_eq!(loaded.skipped.len(), 2);
        assert!(loaded.completed_at.is_some());
        assert_eq!(
            loaded.failed[0].error_kind,
            Some(TranscriptErrorKind::TranscriptsDisabled)
        );
    }

    #[tokio::test]
    async fn corrupt_report_means_fresh_start() {
        let dir = tempfile::TempDir::new().unwrap();
        tokio::fs::write(report_path(dir.path()), b"{not json")
            .await
            .unwrap();
        assert!(load_report(dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn missing_report_means_fresh_start() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(load_report(dir.path()).await.is_none());
    }
}
