//! Channel discovery: enumerate a channel's playlists and recent videos.
//!
//! Three interchangeable strategies with different reliability/cost
//! trade-offs: the metadata API (reliable, needs a key), a real browser
//! (slow, survives consent walls and dynamic markup), and plain HTTP
//! scraping (cheap, least reliable). Auto mode chains them in that order
//! and stops at the first strategy that succeeds.

mod api;
#[cfg(feature = "browser")]
mod browser;
mod scraping;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::InvalidReference;
use crate::locator::{ContentKind, ContentRef};
use crate::session::WebSession;

pub use api::ApiStrategy;
#[cfg(feature = "browser")]
pub use browser::BrowserStrategy;
pub use scraping::ScrapingStrategy;

/// A concrete discovery mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Api,
    Browser,
    Scraping,
}

/// What the caller asked for: one specific strategy, or the auto chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMethod {
    #[default]
    Auto,
    Api,
    Browser,
    Scraping,
}

/// A channel reference usable by every strategy: at least one of handle or
/// id is always populated.
#[derive(Debug, Clone)]
pub struct ChannelRef {
    pub handle: Option<String>,
    pub id: Option<String>,
}

impl ChannelRef {
    /// Accepts URLs, `@handle`, bare handles, and bare `UC..` ids.
    pub fn parse(input: &str) -> Result<Self, InvalidReference> {
        match ContentRef::parse(input) {
            Ok(r) if r.kind == ContentKind::Channel => Ok(Self {
                handle: r.channel_handle,
                id: r.channel_id,
            }),
            Ok(_) => Err(InvalidReference(input.to_owned())),
            // A plain word is taken as a handle written without the @.
            Err(_) if !input.trim().is_empty() && !input.contains('/') && !input.contains(' ') => {
                Ok(Self {
                    handle: Some(input.trim().trim_start_matches('@').to_owned()),
                    id: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn url(&self) -> String {
        if let Some(handle) = &self.handle {
            format!("https://www.youtube.com/@{handle}")
        } else {
            format!(
                "https://www.youtube.com/channel/{}",
                self.id.as_deref().unwrap_or_default()
            )
        }
    }
}

/// Per-run caps on how much a strategy enumerates.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryLimits {
    pub max_videos: usize,
    pub max_playlists: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            max_videos: 50,
            max_playlists: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoItem {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub playlist_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_count: Option<u64>,
}

/// Everything discovery learned about a channel. Failures live in `error`;
/// a populated result with an error set means the data is advisory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDiscovery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_handle: Option<String>,
    #[serde(default)]
    pub channel_name: String,
    pub channel_url: String,
    #[serde(default)]
    pub subscriber_count: u64,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub playlists: Vec<PlaylistItem>,
    #[serde(default)]
    pub videos: Vec<VideoItem>,
    pub strategy_used: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelDiscovery {
    pub(crate) fn empty(strategy: Strategy, channel: &ChannelRef) -> Self {
        Self {
            channel_id: channel.id.clone(),
            channel_handle: channel.handle.clone(),
            channel_name: String::new(),
            channel_url: channel.url(),
            subscriber_count: 0,
            video_count: 0,
            playlists: Vec::new(),
            videos: Vec::new(),
            strategy_used: strategy,
            error: None,
        }
    }

    pub(crate) fn failed(strategy: Strategy, channel: &ChannelRef, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::empty(strategy, channel)
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Seam between the discoverer and the concrete mechanisms; lets the auto
/// chain be tested with scripted strategies.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Never fails at the call boundary; problems surface through
    /// `ChannelDiscovery::error`.
    async fn discover(&self, channel: &ChannelRef, limits: &DiscoveryLimits) -> ChannelDiscovery;
}

pub struct ChannelDiscoverer {
    session: WebSession,
    api_key: Option<String>,
}

impl ChannelDiscoverer {
    pub fn new(session: WebSession, api_key: Option<String>) -> Self {
        Self { session, api_key }
    }

    /// Run discovery. An explicitly named strategy runs exactly that
    /// strategy and its result, error included, is returned as-is; only
    /// `Auto` chains through fallbacks. An explicit strategy whose
    /// precondition fails (api without a key, browser compiled out)
    /// reports a failed result attributed to that strategy.
    pub async fn discover(
        &self,
        input: &str,
        method: DiscoveryMethod,
        limits: &DiscoveryLimits,
    ) -> Result<ChannelDiscovery, InvalidReference> {
        let channel = ChannelRef::parse(input)?;

        let result = match method {
            DiscoveryMethod::Auto => {
                let strategies = self.auto_chain();
                run_chain(&strategies, &channel, limits).await
            }
            DiscoveryMethod::Api => match &self.api_key {
                Some(key) => {
                    ApiStrategy::new(self.session.clone(), key.clone())
                        .discover(&channel, limits)
                        .await
                }
                None => ChannelDiscovery::failed(
                    Strategy::Api,
                    &channel,
                    "api strategy requires an API key (set YOUTUBE_API_KEY)".to_owned(),
                ),
            },
            #[cfg(feature = "browser")]
            DiscoveryMethod::Browser => {
                BrowserStrategy::new().discover(&channel, limits).await
            }
            #[cfg(not(feature = "browser"))]
            DiscoveryMethod::Browser => ChannelDiscovery::failed(
                Strategy::Browser,
                &channel,
                "browser support is not compiled into this build".to_owned(),
            ),
            DiscoveryMethod::Scraping => {
                ScrapingStrategy::new(self.session.clone())
                    .discover(&channel, limits)
                    .await
            }
        };

        Ok(result)
    }

    /// Auto order: api (only with a key), browser, scraping.
    fn auto_chain(&self) -> Vec<Box<dyn DiscoveryStrategy>> {
        let mut chain: Vec<Box<dyn DiscoveryStrategy>> = Vec::new();

        if let Some(key) = &self.api_key {
            chain.push(Box::new(ApiStrategy::new(self.session.clone(), key.clone())));
        }
        #[cfg(feature = "browser")]
        chain.push(Box::new(BrowserStrategy::new()));
        chain.push(Box::new(ScrapingStrategy::new(self.session.clone())));

        chain
    }
}

/// Run strategies in order; the first error-free result wins. When every
/// strategy fails the last failed result is returned so the caller sees
/// the most-capable strategy's error.
async fn run_chain(
    strategies: &[Box<dyn DiscoveryStrategy>],
    channel: &ChannelRef,
    limits: &DiscoveryLimits,
) -> ChannelDiscovery {
    let mut last = None;

    for strategy in strategies {
        let result = strategy.discover(channel, limits).await;
        if result.succeeded() {
            info!(strategy = ?result.strategy_used, channel = %channel.url(), "discovery succeeded");
            return result;
        }
        warn!(
            strategy = ?result.strategy_used,
            error = result.error.as_deref().unwrap_or_default(),
            "discovery strategy failed, trying next"
        );
        last = Some(result);
    }

    last.unwrap_or_else(|| {
        ChannelDiscovery::failed(
            Strategy::Scraping,
            channel,
            "no discovery strategy available".to_owned(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        strategy: Strategy,
        error: Option<&'static str>,
        name: &'static str,
    }

    #[async_trait]
    impl DiscoveryStrategy for Scripted {
        fn strategy(&self) -> Strategy {
            self.strategy
        }

        async fn discover(
            &self,
            channel: &ChannelRef,
            _limits: &DiscoveryLimits,
        ) -> ChannelDiscovery {
            let mut result = ChannelDiscovery::empty(self.strategy, channel);
            result.channel_name = self.name.to_owned();
            result.error = self.error.map(ToOwned::to_owned);
            result
        }
    }

    fn channel() -> ChannelRef {
        ChannelRef::parse("@SomeCreator").unwrap()
    }

    #[tokio::test]
    async fn chain_stops_at_first_success() {
        let strategies: Vec<Box<dyn DiscoveryStrategy>> = vec![
            Box::new(Scripted {
                strategy: Strategy::Api,
                error: Some("quota exceeded"),
                name: "from-api",
            }),
            Box::new(Scripted {
                strategy: Strategy::Browser,
                error: None,
                name: "from-browser",
            }),
            Box::new(Scripted {
                strategy: Strategy::Scraping,
                error: None,
                name: "from-scraping",
            }),
        ];

        let result = run_chain(&strategies, &channel(), &DiscoveryLimits::default()).await;
        assert!(result.succeeded());
        assert_eq!(result.strategy_used, Strategy::Browser);
        assert_eq!(result.channel_name, "from-browser");
    }

    #[tokio::test]
    async fn all_failures_return_the_last_result() {
        let strategies: Vec<Box<dyn DiscoveryStrategy>> = vec![
            Box::new(Scripted {
                strategy: Strategy::Browser,
                error: Some("no chrome"),
                name: "",
            }),
            Box::new(Scripted {
                strategy: Strategy::Scraping,
                error: Some("consent wall"),
                name: "",
            }),
        ];

        let result = run_chain(&strategies, &channel(), &DiscoveryLimits::default()).await;
        assert!(!result.succeeded());
        assert_eq!(result.strategy_used, Strategy::Scraping);
        assert_eq!(result.error.as_deref(), Some("consent wall"));
    }

    #[tokio::test]
    async fn explicit_api_without_key_fails_as_api() {
        let session = WebSession::new(false).unwrap();
        let discoverer = ChannelDiscoverer::new(session, None);
        let result = discoverer
            .discover(
                "@SomeCreator",
                DiscoveryMethod::Api,
                &DiscoveryLimits::default(),
            )
            .await
            .unwrap();
        // The requested strategy owns the failure; no fallback runs.
        assert_eq!(result.strategy_used, Strategy::Api);
        assert!(result.error.as_deref().unwrap().contains("API key"));
        assert!(result.videos.is_empty());
    }

    #[test]
    fn channel_ref_accepts_common_shapes() {
        let by_handle = ChannelRef::parse("@SomeCreator").unwrap();
        assert_eq!(by_handle.handle.as_deref(), Some("SomeCreator"));

        let bare = ChannelRef::parse("SomeCreator").unwrap();
        assert_eq!(bare.handle.as_deref(), Some("SomeCreator"));

        let by_url = ChannelRef::parse("https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv")
            .unwrap();
        assert_eq!(by_url.id.as_deref(), Some("UCabcdefghijklmnopqrstuv"));
        assert!(by_url.url().contains("/channel/UC"));
    }

    #[test]
    fn video_urls_are_not_channels() {
        assert!(ChannelRef::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_err());
    }
}
