//! Discovery through plain HTTP scraping of the channel page. Cheapest
//! strategy and the last rung of the auto chain. Results are always marked
//! with an advisory error: the channel page only renders a subset of
//! content without JavaScript, so data recovered here is best-effort.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::DiscoveryError;
use crate::playlist::{INITIAL_DATA_REGEX, INITIAL_DATA_WINDOW_REGEX};
use crate::session::WebSession;
use crate::utils::{capture_group_1_owned, parse_magnitude, renderer_text};

use super::{
    ChannelDiscovery, ChannelRef, DiscoveryLimits, DiscoveryStrategy, PlaylistItem, Strategy,
    VideoItem,
};

const ADVISORY: &str =
    "scraping recovers partial data only; prefer the api or browser strategy";

static WATCH_HREF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/watch\?v=([a-zA-Z0-9_-]{11})").unwrap());
static LIST_HREF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&](?:amp;)?list=(PL[a-zA-Z0-9_-]+)").unwrap());

pub struct ScrapingStrategy {
    session: WebSession,
}

impl ScrapingStrategy {
    pub fn new(session: WebSession) -> Self {
        Self { session }
    }

    async fn run(
        &self,
        channel: &ChannelRef,
        limits: &DiscoveryLimits,
    ) -> Result<ChannelDiscovery, DiscoveryError> {
        let url = channel.url();
        let response = self.session.get(&url).send().await?;
        let html = response.error_for_status()?.text().await?;

        if html.contains("action=\"https://consent.youtube.com") {
            return Err(DiscoveryError::ConsentBlocked);
        }

        let mut result = parse_channel_html(channel, &html, limits);
        if result.channel_name.is_empty() && result.videos.is_empty() {
            return Err(DiscoveryError::MissingData(
                "channel page carried no recognizable data".to_owned(),
            ));
        }

        debug!(
            channel = %result.channel_name,
            videos = result.videos.len(),
            "scraping discovery complete (partial)"
        );
        result.error = Some(ADVISORY.to_owned());
        Ok(result)
    }
}

fn parse_channel_html(
    channel: &ChannelRef,
    html: &str,
    limits: &DiscoveryLimits,
) -> ChannelDiscovery {
    let mut result = ChannelDiscovery::empty(Strategy::Scraping, channel);

    let blob = capture_group_1_owned(&INITIAL_DATA_REGEX, html)
        .or_else(|| capture_group_1_owned(&INITIAL_DATA_WINDOW_REGEX, html));
    if let Some(blob) = blob
        && let Ok(data) = serde_json::from_str::<Value>(&blob)
        && let Some(header) = data
            .get("header")
            .and_then(|h| h.get("c4TabbedHeaderRenderer"))
    {
        result.channel_name = header
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        if let Some(id) = header.get("channelId").and_then(Value::as_str) {
            result.channel_id = Some(id.to_owned());
        }
        if let Some(subs) = header.get("subscriberCountText").and_then(renderer_text) {
            result.subscriber_count = parse_magnitude(subs);
        }
    }

    // Statically rendered hrefs still expose some recent content.
    let mut seen = HashSet::new();
    for caps in WATCH_HREF_REGEX.captures_iter(html) {
        if result.videos.len() >= limits.max_videos {
            break;
        }
        let id = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if seen.insert(id.to_owned()) {
            result.videos.push(VideoItem {
                video_id: id.to_owned(),
                title: String::new(),
            });
        }
    }

    let mut seen_lists = HashSet::new();
    for caps in LIST_HREF_REGEX.captures_iter(html) {
        if result.playlists.len() >= limits.max_playlists {
            break;
        }
        let id = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if seen_lists.insert(id.to_owned()) {
            result.playlists.push(PlaylistItem {
                playlist_id: id.to_owned(),
                title: String::new(),
                video_count: None,
            });
        }
    }

    result.video_count = result.videos.len() as u64;
    result
}

#[async_trait]
impl DiscoveryStrategy for ScrapingStrategy {
    fn strategy(&self) -> Strategy {
        Strategy::Scraping
    }

    async fn discover(&self, channel: &ChannelRef, limits: &DiscoveryLimits) -> ChannelDiscovery {
        match self.run(channel, limits).await {
            Ok(result) => result,
            Err(e) => ChannelDiscovery::failed(Strategy::Scraping, channel, e.to_string()),
        }
    }
}
