use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified outcome kinds for a transcript extraction attempt.
///
/// Downstream control flow (retry, language fallback, batch abort) keys on
/// this closed set, never on error message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptErrorKind {
    /// The uploader has disabled transcripts for this video. Terminal.
    TranscriptsDisabled,
    /// Video is private, deleted, or region-locked. Terminal.
    VideoUnavailable,
    /// No transcript in the requested language nor any other. Terminal
    /// (only reported after the single any-language fallback).
    NoTranscriptFound,
    /// Transport or consent-negotiation failure. Retried with backoff.
    RequestFailed,
    /// YouTube has rate-limited or blocked this network origin. Terminal
    /// for the current batch; the batch runner owns the abort policy.
    IpBlocked,
    /// Anything else. Retried with backoff, message preserved verbatim.
    Other,
}

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcripts are disabled for this video")]
    TranscriptsDisabled,
    #[error("video is unavailable (private, deleted, or region-locked)")]
    VideoUnavailable,
    #[error("no transcript found for language '{0}' or any other language")]
    NoTranscriptFound(String),
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("IP blocked or rate-limited by YouTube, wait and retry later")]
    IpBlocked,
    #[error("{0}")]
    Other(String),
}

impl TranscriptError {
    pub fn kind(&self) -> TranscriptErrorKind {
        match self {
            Self::TranscriptsDisabled => TranscriptErrorKind::TranscriptsDisabled,
            Self::VideoUnavailable => TranscriptErrorKind::VideoUnavailable,
            Self::NoTranscriptFound(_) => TranscriptErrorKind::NoTranscriptFound,
            Self::RequestFailed(_) => TranscriptErrorKind::RequestFailed,
            Self::IpBlocked => TranscriptErrorKind::IpBlocked,
            Self::Other(_) => TranscriptErrorKind::Other,
        }
    }

    /// Terminal errors are never retried by the extractor itself.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self.kind(),
            TranscriptErrorKind::RequestFailed | TranscriptErrorKind::Other
        )
    }
}

impl From<reqwest::Error> for TranscriptError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Self::IpBlocked;
            }
        }
        Self::RequestFailed(e.to_string())
    }
}

impl From<serde_json::Error> for TranscriptError {
    fn from(e: serde_json::Error) -> Self {
        Self::Other(format!("malformed payload: {e}"))
    }
}

impl From<std::io::Error> for TranscriptError {
    fn from(e: std::io::Error) -> Self {
        Self::Other(format!("io error: {e}"))
    }
}

/// Input string did not match any recognizable YouTube reference.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a recognizable YouTube reference: {0}")]
pub struct InvalidReference(pub String);

/// Internal failures inside a discovery strategy. Strategies catch these at
/// their own boundary and surface them through `ChannelDiscovery::error`.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metadata API error: {0}")]
    Api(String),
    #[error("browser engine unavailable or failed: {0}")]
    Browser(String),
    #[error("blocked by consent page, use the browser or api strategy instead")]
    ConsentBlocked,
    #[error("could not parse page data: {0}")]
    MissingData(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_kinds_do_not_retry() {
        assert!(TranscriptError::TranscriptsDisabled.is_terminal());
        assert!(TranscriptError::VideoUnavailable.is_terminal());
        assert!(TranscriptError::IpBlocked.is_terminal());
        assert!(TranscriptError::NoTranscriptFound("en".into()).is_terminal());
        assert!(!TranscriptError::RequestFailed("timeout".into()).is_terminal());
        assert!(!TranscriptError::Other("???".into()).is_terminal());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&TranscriptErrorKind::IpBlocked).unwrap();
        assert_eq!(json, "\"ip_blocked\"");
    }
}
