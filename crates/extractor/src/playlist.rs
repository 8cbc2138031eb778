//! Playlist resolution: recover the ordered video list for a playlist.
//!
//! Primary tier parses the `ytInitialData` blob embedded in the playlist
//! page; every field along the fixed path degrades individually when the
//! markup contract drifts. Secondary tier falls back to scanning raw
//! markup for watch hrefs scoped to the playlist id, which recovers ids
//! (in first-seen order, deduplicated) but no titles.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::session::WebSession;
use crate::utils::{capture_group_1_owned, leading_int, renderer_text};

pub(crate) static INITIAL_DATA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)var ytInitialData\s*=\s*(\{.*?\});").unwrap());
pub(crate) static INITIAL_DATA_WINDOW_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)window\["ytInitialData"\]\s*=\s*(\{.*?\});"#).unwrap());
static PAGE_TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>([^<]+)</title>").unwrap());

/// One video inside a playlist. `index` is the 1-based playlist position
/// and stays stable across runs; `video_id` is the resume/dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistVideo {
    pub index: u32,
    #[serde(rename = "id")]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub playlist_id: String,
    pub title: String,
    pub channel_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_url: Option<String>,
    /// Item count the page declares; may exceed `videos.len()` when some
    /// entries are private or deleted.
    pub video_count: u32,
    pub videos: Vec<PlaylistVideo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlaylistInfo {
    pub fn accessible_count(&self) -> usize {
        self.videos.len()
    }

    fn failed(playlist_id: &str, error: String) -> Self {
        Self {
            playlist_id: playlist_id.to_owned(),
            error: Some(error),
            ..Self::default()
        }
    }
}

pub struct PlaylistResolver {
    session: WebSession,
}

impl PlaylistResolver {
    pub fn new(session: WebSession) -> Self {
        Self { session }
    }

    /// Fetch and parse a playlist. Failures are reported through the
    /// `error` field, never raised.
    pub async fn resolve(&self, playlist_id: &str) -> PlaylistInfo {
        let url = format!("https://www.youtube.com/playlist?list={playlist_id}");

        let html = match self.fetch_page(&url).await {
            Ok(html) => html,
            Err(e) => {
                return PlaylistInfo::failed(playlist_id, format!("failed to fetch playlist: {e}"));
            }
        };

        parse_playlist_html(playlist_id, &html)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.session.get(url).send().await?;
        let response = response.error_for_status()?;
        response.text().await
    }
}

pub(crate) fn parse_playlist_html(playlist_id: &str, html: &str) -> PlaylistInfo {
    let blob = capture_group_1_owned(&INITIAL_DATA_REGEX, html)
        .or_else(|| capture_group_1_owned(&INITIAL_DATA_WINDOW_REGEX, html));

    if let Some(blob) = blob {
        match serde_json::from_str::<Value>(&blob) {
            Ok(data) => return parse_initial_data(playlist_id, &data),
            Err(e) => {
                warn!(playlist_id, error = %e, "ytInitialData blob did not parse, using markup fallback");
            }
        }
    } else {
        debug!(playlist_id, "no ytInitialData marker found, using markup fallback");
    }

    parse_markup_fallback(playlist_id, html)
}

/// Walk the fixed renderer path of `ytInitialData`. Every step is optional;
/// missing fields produce empty/zero values rather than failing the parse.
fn parse_initial_data(playlist_id: &str, data: &Value) -> PlaylistInfo {
    let mut info = PlaylistInfo {
        playlist_id: playlist_id.to_owned(),
        ..PlaylistInfo::default()
    };

    let header = data
        .get("header")
        .and_then(|h| h.get("playlistHeaderRenderer"));

    if let Some(header) = header {
        info.title = header
            .get("title")
            .and_then(renderer_text)
            .unwrap_or_default()
            .to_owned();

        if let Some(stats) = header.get("stats").and_then(Value::as_array) {
            for stat in stats {
                let text = renderer_text(stat).unwrap_or_default();
                if text.to_lowercase().contains("video")
                    && let Some(count) = leading_int(text)
                {
                    info.video_count = count as u32;
                    break;
                }
            }
        }

        if let Some(owner) = header
            .get("ownerText")
            .and_then(|o| o.get("runs"))
            .and_then(|r| r.get(0))
        {
            info.channel_name = owner
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let base_url = owner
                .get("navigationEndpoint")
                .and_then(|n| n.get("browseEndpoint"))
                .and_then(|b| b.get("canonicalBaseUrl"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !base_url.is_empty() {
                info.channel_url = Some(format!("https://www.youtube.com{base_url}"));
                if let Some(handle) = base_url.strip_prefix("/@") {
                    info.channel_handle = Some(handle.to_owned());
                }
            }
        }
    }

    let items = data
        .get("contents")
        .and_then(|c| c.get("twoColumnBrowseResultsRenderer"))
        .and_then(|c| c.get("tabs"))
        .and_then(|t| t.get(0))
        .and_then(|t| t.get("tabRenderer"))
        .and_then(|t| t.get("content"))
        .and_then(|c| c.get("sectionListRenderer"))
        .and_then(|s| s.get("contents"))
        .and_then(|c| c.get(0))
        .and_then(|i| i.get("itemSectionRenderer"))
        .and_then(|i| i.get("contents"))
        .and_then(|c| c.get(0))
        .and_then(|p| p.get("playlistVideoListRenderer"))
        .and_then(|p| p.get("contents"))
        .and_then(Value::as_array);

    if let Some(items) = items {
        for (i, item) in items.iter().enumerate() {
            let Some(renderer) = item.get("playlistVideoRenderer") else {
                continue;
            };
            let Some(video_id) = renderer.get("videoId").and_then(Value::as_str) else {
                continue;
            };

            let title = renderer
                .get("title")
                .and_then(renderer_text)
                .unwrap_or_default()
                .to_owned();
            let duration = renderer
                .get("lengthText")
                .and_then(renderer_text)
                .map(ToOwned::to_owned);
            let index = renderer
                .get("index")
                .and_then(renderer_text)
                .and_then(|t| t.parse().ok())
                .unwrap_or(i as u32 + 1);

            info.videos.push(PlaylistVideo {
                index,
                video_id: video_id.to_owned(),
                title,
                duration,
            });
        }
    }

    if info.video_count == 0 {
        info.video_count = info.videos.len() as u32;
    }

    info
}

/// Degraded tier: recover video ids from watch hrefs scoped to this
/// playlist. Titles, durations, and owner are unavailable here, which is
/// how callers detect the degraded result.
fn parse_markup_fallback(playlist_id: &str, html: &str) -> PlaylistInfo {
    let pattern = format!(
        r"/watch\?v=([a-zA-Z0-9_-]{{11}})(?:&amp;|&)list={}",
        regex::escape(playlist_id)
    );
    // Playlist ids are validated upstream; escape keeps this infallible.
    let href_regex = Regex::new(&pattern).expect("fallback href pattern");

    let mut seen = HashSet::new();
    let mut videos = Vec::new();
    for caps in href_regex.captures_iter(html) {
        let id = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if seen.insert(id.to_owned()) {
            videos.push(PlaylistVideo {
                index: videos.len() as u32 + 1,
                video_id: id.to_owned(),
                title: String::new(),
                duration: None,
            });
        }
    }

    let title = capture_group_1_owned(&PAGE_TITLE_REGEX, html)
        .map(|t| t.replace(" - YouTube", "").trim().to_owned())
        .unwrap_or_default();

    PlaylistInfo {
        playlist_id: playlist_id.to_owned(),
        title,
        video_count: videos.len() as u32,
        videos,
        ..PlaylistInfo::default()
    }
}

// ---------------------------------------------------------------------------
// Playlist config files: a scraped playlist saved as JSON and re-used as a
// batch input when live scraping is blocked.

#[derive(Debug, Serialize, Deserialize)]
struct PlaylistConfig {
    channel: ChannelSection,
    videos: Vec<PlaylistVideo>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ChannelSection {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    playlist_id: String,
    #[serde(default)]
    playlist_name: String,
}

/// Load a playlist from a JSON config file.
pub async fn load_playlist_config(path: &Path) -> PlaylistInfo {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            return PlaylistInfo::failed("", format!("config file not readable: {e}"));
        }
    };

    let config: PlaylistConfig = match serde_json::from_str(&raw) {
        Ok(config) => config,
        Err(e) => return PlaylistInfo::failed("", format!("invalid config JSON: {e}")),
    };

    let videos: Vec<PlaylistVideo> = config
        .videos
        .into_iter()
        .filter(|v| !v.video_id.is_empty())
        .collect();

    let channel_handle = config
        .channel
        .url
        .split_once("/@")
        .map(|(_, handle)| handle.split('/').next().unwrap_or(handle).to_owned());

    PlaylistInfo {
        playlist_id: config.channel.playlist_id,
        title: config.channel.playlist_name,
        channel_name: config.channel.name,
        channel_handle,
        channel_url: (!config.channel.url.is_empty()).then_some(config.channel.url),
        video_count: videos.len() as u32,
        videos,
        error: None,
    }
}

/// Save a playlist as a JSON config file, creating parent directories.
pub async fn save_playlist_config(info: &PlaylistInfo, path: &Path) -> std::io::Result<()> {
    let config = PlaylistConfig {
        channel: ChannelSection {
            id: info.channel_handle.clone().unwrap_or_default(),
            name: info.channel_name.clone(),
            url: info.channel_url.clone().unwrap_or_default(),
            playlist_id: info.playlist_id.clone(),
            playlist_name: info.title.clone(),
        },
        videos: info.videos.clone(),
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(&config)?;
    tokio::fs::write(path, json).await
}
