//! Discovery through the YouTube Data API v3. The most reliable strategy,
//! gated on the caller supplying an API key.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::DiscoveryError;
use crate::session::WebSession;

use super::{
    ChannelDiscovery, ChannelRef, DiscoveryLimits, DiscoveryStrategy, PlaylistItem, Strategy,
    VideoItem,
};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
// The API caps maxResults at 50 per page regardless of what we ask for.
const API_PAGE_CAP: usize = 50;

pub struct ApiStrategy {
    session: WebSession,
    key: String,
}

impl ApiStrategy {
    pub fn new(session: WebSession, key: String) -> Self {
        Self { session, key }
    }

    async fn run(
        &self,
        channel: &ChannelRef,
        limits: &DiscoveryLimits,
    ) -> Result<ChannelDiscovery, DiscoveryError> {
        let selector = match (&channel.id, &channel.handle) {
            (Some(id), _) => format!("id={}", urlencoding::encode(id)),
            (None, Some(handle)) => format!("forHandle=%40{}", urlencoding::encode(handle)),
            (None, None) => {
                return Err(DiscoveryError::Api("channel reference is empty".to_owned()));
            }
        };

        let url = format!(
            "{API_BASE}/channels?part=snippet,statistics,contentDetails&{selector}&key={}",
            self.key
        );
        let channels: ListResponse<ChannelResource> = self.fetch(&url).await?;
        let resource = channels
            .items
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::Api("channel not found".to_owned()))?;

        let mut result = ChannelDiscovery::empty(Strategy::Api, channel);
        result.channel_id = Some(resource.id.clone());
        result.channel_name = resource.snippet.title;
        if let Some(custom) = resource.snippet.custom_url {
            result.channel_handle = Some(custom.trim_start_matches('@').to_owned());
        }
        result.subscriber_count = resource
            .statistics
            .subscriber_count
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        result.video_count = resource
            .statistics
            .video_count
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        result.playlists = self.fetch_playlists(&resource.id, limits).await?;

        let uploads = resource
            .content_details
            .and_then(|c| c.related_playlists)
            .and_then(|r| r.uploads);
        if let Some(uploads) = uploads {
            result.videos = self.fetch_uploads(&uploads, limits).await?;
        }

        debug!(
            channel = %result.channel_name,
            playlists = result.playlists.len(),
            videos = result.videos.len(),
            "api discovery complete"
        );
        Ok(result)
    }

    async fn fetch_playlists(
        &self,
        channel_id: &str,
        limits: &DiscoveryLimits,
    ) -> Result<Vec<PlaylistItem>, DiscoveryError> {
        let url = format!(
            "{API_BASE}/playlists?part=snippet,contentDetails&channelId={channel_id}&maxResults={}&key={}",
            limits.max_playlists.min(API_PAGE_CAP),
            self.key
        );
        let response: ListResponse<PlaylistResource> = self.fetch(&url).await?;
        Ok(response
            .items
            .into_iter()
            .take(limits.max_playlists)
            .map(|p| PlaylistItem {
                playlist_id: p.id,
                title: p.snippet.title,
                video_count: p.content_details.and_then(|c| c.item_count),
            })
            .collect())
    }

    /// Recent videos come from the channel's synthetic "uploads" playlist.
    async fn fetch_uploads(
        &self,
        uploads_playlist: &str,
        limits: &DiscoveryLimits,
    ) -> Result<Vec<VideoItem>, DiscoveryError> {
        let url = format!(
            "{API_BASE}/playlistItems?part=snippet&playlistId={uploads_playlist}&maxResults={}&key={}",
            limits.max_videos.min(API_PAGE_CAP),
            self.key
        );
        let response: ListResponse<PlaylistItemResource> = self.fetch(&url).await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.snippet.resource_id?.video_id?;
                Some(VideoItem {
                    video_id,
                    title: item.snippet.title,
                })
            })
            .take(limits.max_videos)
            .collect())
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, DiscoveryError> {
        let response = self.session.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Quota and key problems arrive as a structured error envelope.
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("http status {status}"));
            return Err(DiscoveryError::Api(message));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl DiscoveryStrategy for ApiStrategy {
    fn strategy(&self) -> Strategy {
        Strategy::Api
    }

    async fn discover(&self, channel: &ChannelRef, limits: &DiscoveryLimits) -> ChannelDiscovery {
        match self.run(channel, limits).await {
            Ok(result) => result,
            Err(e) => ChannelDiscovery::failed(Strategy::Api, channel, e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResource {
    id: String,
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    custom_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    subscriber_count: Option<String>,
    video_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistResource {
    id: String,
    snippet: PlaylistSnippet,
    content_details: Option<PlaylistContentDetails>,
}

#[derive(Debug, Deserialize)]
struct PlaylistSnippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    item_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemResource {
    snippet: ItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSnippet {
    #[serde(default)]
    title: String,
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_response_parses() {
        let body = r#"{
            "items": [{
                "id": "UCabcdefghijklmnopqrstuv",
                "snippet": {"title": "Some Creator", "customUrl": "@somecreator"},
                "statistics": {"subscriberCount": "125000", "videoCount": "321"},
                "contentDetails": {"relatedPlaylists": {"uploads": "UUabcdefghijklmnopqrstuv"}}
            }]
        }"#;
        let parsed: ListResponse<ChannelResource> = serde_json::from_str(body).unwrap();
        let item = &parsed.items[0];
        assert_eq!(item.snippet.title, "Some Creator");
        assert_eq!(item.statistics.subscriber_count.as_deref(), Some("125000"));
        assert_eq!(
            item.content_details
                .as_ref()
                .and_then(|c| c.related_playlists.as_ref())
                .and_then(|r| r.uploads.as_deref()),
            Some("UUabcdefghijklmnopqrstuv")
        );
    }

    #[test]
    fn error_envelope_parses() {
        let body = r#"{"error": {"code": 403, "message": "quotaExceeded"}}"#;
        let parsed: ErrorEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "quotaExceeded");
    }

    #[test]
    fn missing_statistics_defaults() {
        let body = r#"{"items": [{"id": "UCx", "snippet": {"title": "t"}}]}"#;
        let parsed: ListResponse<ChannelResource> = serde_json::from_str(body).unwrap();
        assert!(parsed.items[0].statistics.subscriber_count.is_none());
    }
}
