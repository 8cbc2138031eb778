//! Sequential batch extraction over a playlist, with adaptive throttling
//! and IP-block short-circuiting.
//!
//! Items are processed strictly in playlist order on a single sequence:
//! the throttle decisions depend on the outcomes of the immediately
//! preceding items, so there is deliberately no intra-batch concurrency.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::TranscriptErrorKind;
use crate::playlist::{PlaylistInfo, PlaylistVideo};
use crate::report::{ExtractionReport, ReportEntry, SkipReason, SkippedEntry};
use crate::transcript::{TranscriptResult, TranscriptSource};

/// How a batch treats videos recorded in a prior report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Process everything except previously successful videos.
    #[default]
    SkipExisting,
    /// Process only previously failed or block-skipped videos.
    RetryFailed,
}

/// Inter-item pacing. The delay stretches by `slow_multiplier` once
/// `failure_threshold` consecutive failures accumulate, and relaxes back
/// on the next success.
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    pub base_delay: Duration,
    pub slow_multiplier: u32,
    pub failure_threshold: u32,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            slow_multiplier: 3,
            failure_threshold: 3,
        }
    }
}

impl RatePolicy {
    fn delay_for(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures >= self.failure_threshold {
            self.base_delay * self.slow_multiplier
        } else {
            self.base_delay
        }
    }
}

/// Where successful transcripts go. Separated from the runner so tests can
/// capture output in memory.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn persist(
        &self,
        video: &PlaylistVideo,
        transcript: &TranscriptResult,
    ) -> std::io::Result<PathBuf>;
}

pub struct BatchRunner<'a> {
    source: &'a dyn TranscriptSource,
    policy: RatePolicy,
    language: Option<String>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(source: &'a dyn TranscriptSource) -> Self {
        Self {
            source,
            policy: RatePolicy::default(),
            language: None,
        }
    }

    pub fn with_policy(mut self, policy: RatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Run the batch. Each video id is recorded at most once in the
    /// returned report: prior successes become `AlreadyDone` skips (which
    /// `extracted_ids` still counts as done), so saving the new report
    /// over the old one preserves resume state. In retry mode, videos
    /// outside the retry set are left out of the report entirely.
    pub async fn run(
        &self,
        playlist: &PlaylistInfo,
        prior: Option<&ExtractionReport>,
        mode: BatchMode,
        sink: &dyn TranscriptSink,
    ) -> ExtractionReport {
        let mut report = ExtractionReport::begin(
            &playlist.playlist_id,
            &playlist.channel_name,
            &playlist.title,
            playlist.video_count as usize,
            playlist.accessible_count(),
        );

        let done: HashSet<String> = prior.map(|p| p.extracted_ids()).unwrap_or_default();
        let retry: Option<HashSet<String>> = match mode {
            BatchMode::RetryFailed => Some(prior.map(|p| p.retry_ids()).unwrap_or_default()),
            BatchMode::SkipExisting => None,
        };

        let mut blocked = false;
        let mut consecutive_failures = 0u32;
        let last = playlist.videos.len().saturating_sub(1);

        for (i, video) in playlist.videos.iter().enumerate() {
            match &retry {
                // Retry mode processes the retry set and nothing else.
                Some(retry) => {
                    if !retry.contains(&video.video_id) {
                        continue;
                    }
                }
                None => {
                    if done.contains(&video.video_id) {
                        report.add_skipped(SkippedEntry {
                            index: video.index,
                            video_id: video.video_id.clone(),
                            title: video.title.clone(),
                            reason: SkipReason::AlreadyDone,
                        });
                        continue;
                    }
                }
            }
            if blocked {
                report.add_skipped(SkippedEntry {
                    index: video.index,
                    video_id: video.video_id.clone(),
                    title: video.title.clone(),
                    reason: SkipReason::BlockActive,
                });
                continue;
            }

            match self
                .source
                .extract(&video.video_id, self.language.as_deref())
                .await
            {
                Ok(transcript) => {
                    consecutive_failures = 0;
                    match sink.persist(video, &transcript).await {
                        Ok(path) => {
                            info!(video_id = %video.video_id, index = video.index, "extracted");
                            report.add_success(ReportEntry {
                                index: video.index,
                                video_id: video.video_id.clone(),
                                title: video.title.clone(),
                                success: true,
                                chars: Some(transcript.full_text.len()),
                                file: path
                                    .file_name()
                                    .map(|f| f.to_string_lossy().into_owned()),
                                error_kind: None,
                                error: None,
                            });
                        }
                        Err(e) => {
                            warn!(video_id = %video.video_id, error = %e, "failed to persist transcript");
                            report.add_failure(ReportEntry {
                                index: video.index,
                                video_id: video.video_id.clone(),
                                title: video.title.clone(),
                                success: false,
                                chars: None,
                                file: None,
                                error_kind: Some(TranscriptErrorKind::Other),
                                error: Some(format!("failed to write output: {e}")),
                            });
                        }
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    let kind = e.kind();
                    warn!(video_id = %video.video_id, error = %e, "extraction failed");
                    report.add_failure(ReportEntry {
                        index: video.index,
                        video_id: video.video_id.clone(),
                        title: video.title.clone(),
                        success: false,
                        chars: None,
                        file: None,
                        error_kind: Some(kind),
                        error: Some(e.to_string()),
                    });
                    if kind == TranscriptErrorKind::IpBlocked {
                        warn!("IP block detected, skipping the rest of the batch");
                        blocked = true;
                        report.ip_blocked = true;
                        continue;
                    }
                }
            }

            if i < last {
                tokio::time::sleep(self.policy.delay_for(consecutive_failures)).await;
            }
        }

        report.finish();
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::error::TranscriptError;

    use super::*;

    enum Outcome {
        Ok,
        Disabled,
        Blocked,
        Transient,
    }

    /// Scripted source keyed by video id; records the call order.
    struct Scripted {
        outcomes: Vec<(&'static str, Outcome)>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<(&'static str, Outcome)>) -> Self {
            Self {
                outcomes,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TranscriptSource for Scripted {
        async fn extract(
            &self,
            video_id: &str,
            _language: Option<&str>,
        ) -> Result<TranscriptResult, TranscriptError> {
            self.calls.lock().unwrap().push(video_id.to_owned());
            let outcome = self
                .outcomes
                .iter()
                .find(|(id, _)| *id == video_id)
                .map(|(_, o)| o)
                .unwrap_or(&Outcome::Ok);
            match outcome {
                Outcome::Ok => Ok(TranscriptResult {
                    video_id: video_id.to_owned(),
                    language: "en".to_owned(),
                    segments: Vec::new(),
                    full_text: "some words".to_owned(),
                }),
                Outcome::Disabled => Err(TranscriptError::TranscriptsDisabled),
                Outcome::Blocked => Err(TranscriptError::IpBlocked),
                Outcome::Transient => Err(TranscriptError::RequestFailed("timeout".to_owned())),
            }
        }
    }

    struct MemorySink {
        persisted: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MemorySink {
        fn new() -> Self {
            Self {
                persisted: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl TranscriptSink for MemorySink {
        async fn persist(
            &self,
            video: &PlaylistVideo,
            _transcript: &TranscriptResult,
        ) -> std::io::Result<PathBuf> {
            if self.fail {
                return Err(std::io::Error::other("disk full"));
            }
            self.persisted.lock().unwrap().push(video.video_id.clone());
            Ok(PathBuf::from(format!("{:02}_x.md", video.index)))
        }
    }

    fn playlist(ids: &[&str]) -> PlaylistInfo {
        PlaylistInfo {
            playlist_id: "PLtest".into(),
            title: "List".into(),
            channel_name: "Creator".into(),
            video_count: ids.len() as u32,
            videos: ids
                .iter()
                .enumerate()
                .map(|(i, id)| PlaylistVideo {
                    index: i as u32 + 1,
                    video_id: (*id).to_owned(),
                    title: format!("Video {}", i + 1),
                    duration: None,
                })
                .collect(),
            ..PlaylistInfo::default()
        }
    }

    fn fast_policy() -> RatePolicy {
        RatePolicy {
            base_delay: Duration::ZERO,
            ..RatePolicy::default()
        }
    }

    #[tokio::test]
    async fn mixed_outcomes_are_recorded_in_order() {
        let source = Scripted::new(vec![
            ("aaaaaaaaaaa", Outcome::Ok),
            ("bbbbbbbbbbb", Outcome::Disabled),
            ("ccccccccccc", Outcome::Ok),
        ]);
        let sink = MemorySink::new();
        let runner = BatchRunner::new(&source).with_policy(fast_policy());

        let report = runner
            .run(
                &playlist(&["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]),
                None,
                BatchMode::SkipExisting,
                &sink,
            )
            .await;

        assert_eq!(report.successful.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(
            report.failed[0].error_kind,
            Some(TranscriptErrorKind::TranscriptsDisabled)
        );
        assert!(report.completed_at.is_some());
        assert_eq!(
            source.calls(),
            vec!["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]
        );
        assert_eq!(report.successful[0].file.as_deref(), Some("01_x.md"));
        assert_eq!(report.successful[0].chars, Some(10));
    }

    #[tokio::test]
    async fn ip_block_skips_the_remainder_without_requests() {
        let source = Scripted::new(vec![
            ("aaaaaaaaaaa", Outcome::Ok),
            ("bbbbbbbbbbb", Outcome::Blocked),
        ]);
        let sink = MemorySink::new();
        let runner = BatchRunner::new(&source).with_policy(fast_policy());

        let report = runner
            .run(
                &playlist(&["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc", "ddddddddddd"]),
                None,
                BatchMode::SkipExisting,
                &sink,
            )
            .await;

        assert!(report.ip_blocked);
        assert_eq!(report.successful.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(report
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::BlockActive));
        // Nothing after the block touched the network.
        assert_eq!(source.calls(), vec!["aaaaaaaaaaa", "bbbbbbbbbbb"]);
    }

    #[tokio::test]
    async fn skip_existing_is_idempotent() {
        let source = Scripted::new(vec![]);
        let sink = MemorySink::new();
        let runner = BatchRunner::new(&source).with_policy(fast_policy());
        let list = playlist(&["aaaaaaaaaaa", "bbbbbbbbbbb"]);

        let first = runner
            .run(&list, None, BatchMode::SkipExisting, &sink)
            .await;
        assert_eq!(first.successful.len(), 2);

        let second = runner
            .run(&list, Some(&first), BatchMode::SkipExisting, &sink)
            .await;
        // Skipped, not re-fetched and not re-recorded as successes.
        assert_eq!(second.successful.len(), 0);
        assert_eq!(second.skipped.len(), 2);
        assert!(second
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::AlreadyDone));
        assert_eq!(source.calls(), vec!["aaaaaaaaaaa", "bbbbbbbbbbb"]);

        // The skips keep counting as done on the next resume.
        let third = runner
            .run(&list, Some(&second), BatchMode::SkipExisting, &sink)
            .await;
        assert_eq!(third.successful.len(), 0);
        assert_eq!(third.skipped.len(), 2);
        assert_eq!(source.calls(), vec!["aaaaaaaaaaa", "bbbbbbbbbbb"]);
    }

    #[tokio::test]
    async fn resumed_report_records_each_id_once() {
        let source = Scripted::new(vec![("bbbbbbbbbbb", Outcome::Transient)]);
        let sink = MemorySink::new();
        let runner = BatchRunner::new(&source).with_policy(fast_policy());
        let list = playlist(&["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]);

        let first = runner
            .run(&list, None, BatchMode::SkipExisting, &sink)
            .await;
        let second = runner
            .run(&list, Some(&first), BatchMode::SkipExisting, &sink)
            .await;

        for report in [&first, &second] {
            let mut ids: Vec<&str> = report
                .successful
                .iter()
                .chain(report.failed.iter())
                .map(|e| e.video_id.as_str())
                .chain(report.skipped.iter().map(|s| s.video_id.as_str()))
                .collect();
            ids.sort_unstable();
            let before = ids.len();
            ids.dedup();
            assert_eq!(ids.len(), before, "duplicate video id in report");
        }
        assert_eq!(second.skipped.len(), 2);
        assert_eq!(second.failed.len(), 1);
    }

    #[tokio::test]
    async fn retry_failed_only_touches_the_retry_set() {
        let source = Scripted::new(vec![("bbbbbbbbbbb", Outcome::Transient)]);
        let sink = MemorySink::new();
        let runner = BatchRunner::new(&source).with_policy(fast_policy());
        let list = playlist(&["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]);

        let first = runner
            .run(&list, None, BatchMode::SkipExisting, &sink)
            .await;
        assert_eq!(first.failed.len(), 1);

        let fixed = Scripted::new(vec![]);
        let second = BatchRunner::new(&fixed)
            .with_policy(fast_policy())
            .run(&list, Some(&first), BatchMode::RetryFailed, &sink)
            .await;

        assert_eq!(fixed.calls(), vec!["bbbbbbbbbbb"]);
        // Only the retried video appears; prior successes are filtered
        // silently rather than re-recorded.
        assert_eq!(second.successful.len(), 1);
        assert_eq!(second.successful[0].video_id, "bbbbbbbbbbb");
        assert_eq!(second.failed.len(), 0);
        assert!(second.skipped.is_empty());
    }

    #[tokio::test]
    async fn persist_failure_is_a_recorded_failure() {
        let source = Scripted::new(vec![]);
        let sink = MemorySink {
            persisted: Mutex::new(Vec::new()),
            fail: true,
        };
        let runner = BatchRunner::new(&source).with_policy(fast_policy());

        let report = runner
            .run(
                &playlist(&["aaaaaaaaaaa"]),
                None,
                BatchMode::SkipExisting,
                &sink,
            )
            .await;

        assert_eq!(report.successful.len(), 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].error_kind, Some(TranscriptErrorKind::Other));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_escalates_after_consecutive_failures_and_resets() {
        let source = Scripted::new(vec![
            ("aaaaaaaaaaa", Outcome::Transient),
            ("bbbbbbbbbbb", Outcome::Transient),
            ("ccccccccccc", Outcome::Transient),
            ("ddddddddddd", Outcome::Ok),
            ("eeeeeeeeeee", Outcome::Ok),
        ]);
        let sink = MemorySink::new();
        let runner = BatchRunner::new(&source).with_policy(RatePolicy {
            base_delay: Duration::from_secs(1),
            slow_multiplier: 3,
            failure_threshold: 3,
        });

        let start = tokio::time::Instant::now();
        let report = runner
            .run(
                &playlist(&[
                    "aaaaaaaaaaa",
                    "bbbbbbbbbbb",
                    "ccccccccccc",
                    "ddddddddddd",
                    "eeeeeeeeeee",
                ]),
                None,
                BatchMode::SkipExisting,
                &sink,
            )
            .await;

        // 1s + 1s after the first two failures, 3s once the third
        // consecutive failure crosses the threshold, back to 1s after the
        // success resets the counter, nothing after the last item.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
        assert_eq!(report.failed.len(), 3);
        assert_eq!(report.successful.len(), 2);
    }

    #[test]
    fn delay_stretches_after_threshold() {
        let policy = RatePolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(3));
        assert_eq!(policy.delay_for(2), Duration::from_secs(3));
        assert_eq!(policy.delay_for(3), Duration::from_secs(9));
        assert_eq!(policy.delay_for(7), Duration::from_secs(9));
    }
}
