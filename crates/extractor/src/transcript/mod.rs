//! Single-video transcript extraction with retry, language fallback, and
//! typed failure classification.
//!
//! The watch page embeds a player-response JSON blob whose caption track
//! list points at timedtext resources. Both the blob marker and the
//! timedtext format are external contracts that change without notice;
//! parsing degrades field by field rather than crashing.

mod models;

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{TranscriptError, TranscriptErrorKind};
use crate::session::WebSession;
use crate::utils::decode_entities;

pub use models::{CaptionTrack, LanguageInfo, PlayerResponse, Segment, TranscriptResult};

static PLAYER_RESPONSE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)var ytInitialPlayerResponse\s*=\s*(\{.*?\});").unwrap()
});
static TIMEDTEXT_SEGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<text start="([\d.]+)" dur="([\d.]+)"[^>]*>(.*?)</text>"#).unwrap()
});

const DEFAULT_MAX_RETRIES: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Seam between the batch runner and the network. Lets batches be driven
/// by a scripted source in tests.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn extract(
        &self,
        video_id: &str,
        language: Option<&str>,
    ) -> Result<TranscriptResult, TranscriptError>;
}

pub struct TranscriptExtractor {
    session: WebSession,
    default_language: String,
    max_retries: u32,
}

impl TranscriptExtractor {
    pub fn new(session: WebSession, default_language: impl Into<String>) -> Self {
        Self {
            session,
            default_language: default_language.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Extract a transcript, retrying transient failures with exponential
    /// backoff (1s, 2s, 4s, ...). Terminal classifications (disabled,
    /// unavailable, blocked, no transcript after the language fallback)
    /// return immediately.
    pub async fn extract(
        &self,
        video_id: &str,
        language: Option<&str>,
    ) -> Result<TranscriptResult, TranscriptError> {
        let lang = language.unwrap_or(&self.default_language);
        let mut last_err = None;

        for attempt in 0..self.max_retries {
            match self.try_extract(video_id, lang).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => {
                    warn!(video_id, attempt = attempt + 1, error = %e, "transcript fetch failed");
                    last_err = Some(e);
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt)).await;
                    }
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| TranscriptError::Other("exhausted retries".to_owned())))
    }

    async fn try_extract(
        &self,
        video_id: &str,
        lang: &str,
    ) -> Result<TranscriptResult, TranscriptError> {
        let tracks = self.fetch_caption_tracks(video_id).await?;

        let (track, resolved) = select_track(&tracks, lang)?;
        if resolved == "auto" {
            debug!(video_id, lang, fallback = %track.language_code,
                "no transcript in preferred language, using fallback track");
        }

        let segments = self.fetch_segments(&track.base_url).await?;
        let full_text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(TranscriptResult {
            video_id: video_id.to_owned(),
            language: resolved,
            segments,
            full_text,
        })
    }

    /// List the caption languages available for a video.
    pub async fn list_languages(
        &self,
        video_id: &str,
    ) -> Result<Vec<LanguageInfo>, TranscriptError> {
        let tracks = self.fetch_caption_tracks(video_id).await?;
        Ok(tracks
            .iter()
            .map(|t| LanguageInfo {
                language_code: t.language_code.clone(),
                language: t.display_name(),
                is_generated: t.is_generated(),
            })
            .collect())
    }

    async fn fetch_caption_tracks(
        &self,
        video_id: &str,
    ) -> Result<Vec<CaptionTrack>, TranscriptError> {
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        let response = self.session.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TranscriptError::IpBlocked);
        }
        let html = response.text().await?;

        classify_page_markers(&html)?;

        let blob = PLAYER_RESPONSE_REGEX
            .captures(&html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| {
                TranscriptError::RequestFailed(
                    "player response marker not found in watch page".to_owned(),
                )
            })?;

        let player: PlayerResponse = serde_json::from_str(blob)?;
        tracks_from_player(player)
    }

    async fn fetch_segments(&self, base_url: &str) -> Result<Vec<Segment>, TranscriptError> {
        let response = self.session.get(base_url).send().await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TranscriptError::IpBlocked);
        }
        let xml = response.text().await?;
        Ok(parse_timedtext(&xml))
    }
}

#[async_trait]
impl TranscriptSource for TranscriptExtractor {
    async fn extract(
        &self,
        video_id: &str,
        language: Option<&str>,
    ) -> Result<TranscriptResult, TranscriptError> {
        TranscriptExtractor::extract(self, video_id, language).await
    }
}

/// Classify the player response into caption tracks or a typed failure.
/// Captions absent entirely means the uploader disabled them; a present
/// but empty track list means no transcript exists in any language.
fn tracks_from_player(player: PlayerResponse) -> Result<Vec<CaptionTrack>, TranscriptError> {
    if let Some(status) = player.playability_status.as_ref() {
        match status.status.as_deref() {
            Some("ERROR") => return Err(TranscriptError::VideoUnavailable),
            Some("LOGIN_REQUIRED") => {
                let reason = status.reason.as_deref().unwrap_or_default();
                if reason.to_uppercase().contains("BOT") {
                    return Err(TranscriptError::IpBlocked);
                }
                return Err(TranscriptError::VideoUnavailable);
            }
            _ => {}
        }
    }

    let renderer = player
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .ok_or(TranscriptError::TranscriptsDisabled)?;
    Ok(renderer.caption_tracks)
}

/// Preferred language first; otherwise fall back once to whatever track is
/// available and report the language as `auto`.
fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    lang: &str,
) -> Result<(&'a CaptionTrack, String), TranscriptError> {
    if let Some(track) = tracks.iter().find(|t| t.language_code == lang) {
        return Ok((track, lang.to_owned()));
    }
    match tracks.first() {
        Some(track) => Ok((track, "auto".to_owned())),
        None => Err(TranscriptError::NoTranscriptFound(lang.to_owned())),
    }
}

/// Page-level block and consent markers, checked before any JSON work.
fn classify_page_markers(html: &str) -> Result<(), TranscriptError> {
    if html.contains("class=\"g-recaptcha\"")
        || html.contains("unusual traffic from your computer network")
    {
        return Err(TranscriptError::IpBlocked);
    }
    if html.contains("action=\"https://consent.youtube.com") {
        // Consent negotiation failure is transient; the consent cookie
        // normally prevents this page entirely.
        return Err(TranscriptError::RequestFailed(
            "consent interstitial served despite consent cookie".to_owned(),
        ));
    }
    Ok(())
}

fn parse_timedtext(xml: &str) -> Vec<Segment> {
    TIMEDTEXT_SEGMENT_REGEX
        .captures_iter(xml)
        .filter_map(|caps| {
            let start = caps.get(1)?.as_str().parse().ok()?;
            let duration = caps.get(2)?.as_str().parse().ok()?;
            let text = decode_entities(caps.get(3)?.as_str());
            Some(Segment {
                text,
                start,
                duration,
            })
        })
        .filter(|s| !s.text.trim().is_empty())
        .collect()
}
