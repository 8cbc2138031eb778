use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::renderer_text;

/// The slice of the watch-page player response this crate cares about.
/// Every field is optional; absent fields degrade, they never fail the
/// parse.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    #[serde(default)]
    pub playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    pub captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayabilityStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Captions {
    #[serde(default)]
    pub player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracklistRenderer {
    #[serde(default)]
    pub caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    #[serde(default)]
    pub name: Option<Value>,
    /// "asr" marks an auto-generated track.
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    pub fn display_name(&self) -> String {
        self.name
            .as_ref()
            .and_then(renderer_text)
            .unwrap_or(&self.language_code)
            .to_owned()
    }

    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// One available caption language for a video.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageInfo {
    pub language_code: String,
    pub language: String,
    pub is_generated: bool,
}

/// A single timed segment of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

impl Segment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A fully extracted transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub video_id: String,
    /// Language code actually used; `auto` when the preferred language was
    /// unavailable and the extractor fell back to any available track.
    pub language: String,
    pub segments: Vec<Segment>,
    pub full_text: String,
}

impl TranscriptResult {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn total_duration(&self) -> f64 {
        self.segments.last().map(Segment::end).unwrap_or(0.0)
    }
}
