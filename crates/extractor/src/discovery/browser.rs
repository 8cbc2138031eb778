//! Discovery through a real headless browser. Slowest strategy, but the
//! only one that survives consent walls and fully dynamic channel pages.
//! A missing Chrome/Chromium binary is reported as a failed discovery, not
//! a crash, so the auto chain can continue.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::DiscoveryError;
use crate::utils::parse_magnitude;

use super::{
    ChannelDiscovery, ChannelRef, DiscoveryLimits, DiscoveryStrategy, PlaylistItem, Strategy,
    VideoItem,
};

// Channel pages hydrate asynchronously after load.
const PAGE_SETTLE: Duration = Duration::from_secs(2);
const SCROLL_PAUSE: Duration = Duration::from_secs(1);
const SCROLL_ROUNDS: usize = 3;

const CHANNEL_INFO_JS: &str = r#"
(() => {
    const text = (sel) => {
        const el = document.querySelector(sel);
        return el ? el.textContent.trim() : '';
    };
    const name = text('yt-dynamic-text-view-model h1')
        || text('ytd-channel-name #text')
        || text('#channel-name #text');
    const meta = Array.from(
        document.querySelectorAll('yt-content-metadata-view-model span, #subscriber-count')
    ).map(el => el.textContent.trim());
    const subscribers = meta.find(t => t.toLowerCase().includes('subscriber')) || '';
    const handle = meta.find(t => t.startsWith('@')) || '';
    const canonical = document.querySelector('link[rel="canonical"]');
    return { name, subscribers, handle, canonical: canonical ? canonical.href : '' };
})()
"#;

const PLAYLISTS_JS: &str = r#"
(() => {
    const seen = new Set();
    const out = [];
    for (const a of document.querySelectorAll('a[href*="list="]')) {
        const match = a.href.match(/[?&]list=([a-zA-Z0-9_-]+)/);
        if (!match || seen.has(match[1])) continue;
        const title = a.textContent.trim() || (a.title || '').trim();
        if (!title) continue;
        seen.add(match[1]);
        out.push({ id: match[1], title });
    }
    return out;
})()
"#;

const VIDEOS_JS: &str = r#"
(() => {
    const seen = new Set();
    const out = [];
    for (const a of document.querySelectorAll('a[href*="watch?v="]')) {
        const match = a.href.match(/[?&]v=([a-zA-Z0-9_-]{11})/);
        if (!match || seen.has(match[1])) continue;
        const title = (a.title || a.textContent || '').trim();
        if (!title) continue;
        seen.add(match[1]);
        out.push({ id: match[1], title });
    }
    return out;
})()
"#;

#[derive(Debug, Deserialize)]
struct ChannelInfoJs {
    #[serde(default)]
    name: String,
    #[serde(default)]
    subscribers: String,
    #[serde(default)]
    handle: String,
    #[serde(default)]
    canonical: String,
}

#[derive(Debug, Deserialize)]
struct LinkItemJs {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Default)]
pub struct BrowserStrategy;

impl BrowserStrategy {
    pub fn new() -> Self {
        Self
    }

    async fn run(
        &self,
        channel: &ChannelRef,
        limits: &DiscoveryLimits,
    ) -> Result<ChannelDiscovery, DiscoveryError> {
        let config = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(DiscoveryError::Browser)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DiscoveryError::Browser(e.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.scrape(&browser, channel, limits).await;

        if let Err(e) = browser.close().await {
            warn!(error = %e, "browser did not close cleanly");
        }
        let _ = handler_task.await;

        result
    }

    async fn scrape(
        &self,
        browser: &Browser,
        channel: &ChannelRef,
        limits: &DiscoveryLimits,
    ) -> Result<ChannelDiscovery, DiscoveryError> {
        let base_url = channel.url();
        let page = browser
            .new_page(&base_url)
            .await
            .map_err(|e| DiscoveryError::Browser(e.to_string()))?;
        tokio::time::sleep(PAGE_SETTLE).await;

        let info: ChannelInfoJs = eval(&page, CHANNEL_INFO_JS).await?;
        if info.name.is_empty() {
            return Err(DiscoveryError::MissingData(
                "channel name not present after page load".to_owned(),
            ));
        }

        let mut result = ChannelDiscovery::empty(Strategy::Browser, channel);
        result.channel_name = info.name;
        result.subscriber_count = parse_magnitude(&info.subscribers);
        if let Some(handle) = info.handle.strip_prefix('@') {
            result.channel_handle = Some(handle.to_owned());
        }
        if let Some(id) = info.canonical.rsplit("/channel/").next()
            && info.canonical.contains("/channel/")
        {
            result.channel_id = Some(id.to_owned());
        }

        goto(&page, &format!("{base_url}/playlists")).await?;
        tokio::time::sleep(PAGE_SETTLE).await;
        let playlists: Vec<LinkItemJs> = eval(&page, PLAYLISTS_JS).await?;
        result.playlists = playlists
            .into_iter()
            .take(limits.max_playlists)
            .map(|p| PlaylistItem {
                playlist_id: p.id,
                title: p.title,
                video_count: None,
            })
            .collect();

        goto(&page, &format!("{base_url}/videos")).await?;
        tokio::time::sleep(PAGE_SETTLE).await;
        for _ in 0..SCROLL_ROUNDS {
            let _ = page
                .evaluate("window.scrollTo(0, document.documentElement.scrollHeight)")
                .await;
            tokio::time::sleep(SCROLL_PAUSE).await;
        }
        let videos: Vec<LinkItemJs> = eval(&page, VIDEOS_JS).await?;
        result.videos = videos
            .into_iter()
            .take(limits.max_videos)
            .map(|v| VideoItem {
                video_id: v.id,
                title: v.title,
            })
            .collect();
        result.video_count = result.videos.len() as u64;

        debug!(
            channel = %result.channel_name,
            playlists = result.playlists.len(),
            videos = result.videos.len(),
            "browser discovery complete"
        );
        Ok(result)
    }
}

async fn goto(page: &Page, url: &str) -> Result<(), DiscoveryError> {
    page.goto(url)
        .await
        .map(|_| ())
        .map_err(|e| DiscoveryError::Browser(e.to_string()))
}

async fn eval<T: serde::de::DeserializeOwned>(
    page: &Page,
    js: &str,
) -> Result<T, DiscoveryError> {
    page.evaluate(js)
        .await
        .map_err(|e| DiscoveryError::Browser(e.to_string()))?
        .into_value()
        .map_err(|e| DiscoveryError::Browser(format!("unexpected script result: {e}")))
}

#[async_trait]
impl DiscoveryStrategy for BrowserStrategy {
    fn strategy(&self) -> Strategy {
        Strategy::Browser
    }

    async fn discover(&self, channel: &ChannelRef, limits: &DiscoveryLimits) -> ChannelDiscovery {
        match self.run(channel, limits).await {
            Ok(result) => result,
            Err(e) => ChannelDiscovery::failed(Strategy::Browser, channel, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore]
    async fn live_browser_discovery() {
        let channel = ChannelRef::parse("@YouTube").unwrap();
        let result = BrowserStrategy::new()
            .discover(&channel, &DiscoveryLimits::default())
            .await;
        println!("{result:#?}");
    }
}
