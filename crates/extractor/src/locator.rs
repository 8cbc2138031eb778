//! Parse arbitrary user input (URLs, handles, bare ids) into a typed
//! YouTube reference. Pure string work, no network.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::InvalidReference;
use crate::utils::capture_group_1_owned;

static SHORT_LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtu\.be/([a-zA-Z0-9_-]{11})").unwrap());
static HANDLE_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/@([^/?]+)").unwrap());
static CHANNEL_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/channel/([^/?]+)").unwrap());
static CUSTOM_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/c/([^/?]+)").unwrap());
static USER_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/user/([^/?]+)").unwrap());
static BARE_CHANNEL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[a-zA-Z0-9_-]{22}$").unwrap());
static VIDEO_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Video,
    Playlist,
    Channel,
}

/// A located piece of YouTube content. `kind` is always derivable from
/// which id fields are populated; a video opened from within a playlist
/// keeps `playlist_id` populated for context propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub video_id: Option<String>,
    pub playlist_id: Option<String>,
    pub channel_id: Option<String>,
    pub channel_handle: Option<String>,
}

impl ContentRef {
    fn video(video_id: String, playlist_id: Option<String>) -> Self {
        Self {
            kind: ContentKind::Video,
            video_id: Some(video_id),
            playlist_id,
            channel_id: None,
            channel_handle: None,
        }
    }

    fn playlist(playlist_id: String) -> Self {
        Self {
            kind: ContentKind::Playlist,
            video_id: None,
            playlist_id: Some(playlist_id),
            channel_id: None,
            channel_handle: None,
        }
    }

    fn channel(channel_id: Option<String>, channel_handle: Option<String>) -> Self {
        Self {
            kind: ContentKind::Channel,
            video_id: None,
            playlist_id: None,
            channel_id,
            channel_handle,
        }
    }

    /// Parse any supported input shape:
    ///
    /// - watch URLs (`youtube.com/watch?v=..`, any query-parameter order)
    /// - short links (`youtu.be/..`), with or without a playlist context
    /// - playlist URLs (`youtube.com/playlist?list=..`)
    /// - channel URLs (`/@handle`, `/channel/UC..`, `/c/name`, `/user/name`)
    /// - bare handles (`@name`) and bare channel ids (`UC` + 22 chars)
    pub fn parse(input: &str) -> Result<Self, InvalidReference> {
        let input = input.trim();

        if let Some(handle) = input.strip_prefix('@') {
            if !handle.is_empty() && !handle.contains('/') {
                return Ok(Self::channel(None, Some(handle.to_owned())));
            }
        }
        if BARE_CHANNEL_ID_REGEX.is_match(input) {
            return Ok(Self::channel(Some(input.to_owned()), None));
        }

        let lower = input.to_lowercase();
        if !lower.contains("youtube.com") && !lower.contains("youtu.be") {
            return Err(InvalidReference(input.to_owned()));
        }

        if let Some(video_id) = capture_group_1_owned(&SHORT_LINK_REGEX, input) {
            let playlist_id = query_param(input, "list");
            return Ok(Self::video(video_id, playlist_id));
        }

        let parsed = parse_lenient(input).ok_or_else(|| InvalidReference(input.to_owned()))?;
        let path = parsed.path().to_owned();
        let video_id = url_query(&parsed, "v").filter(|v| VIDEO_ID_REGEX.is_match(v));
        let playlist_id = url_query(&parsed, "list");

        if path.contains("/playlist") {
            if let Some(list) = playlist_id {
                return Ok(Self::playlist(list));
            }
        } else if path.contains("/watch") {
            if let Some(v) = video_id {
                return Ok(Self::video(v, playlist_id));
            }
        } else if let Some(handle) = capture_group_1_owned(&HANDLE_PATH_REGEX, &path) {
            return Ok(Self::channel(None, Some(handle)));
        } else if let Some(id) = capture_group_1_owned(&CHANNEL_PATH_REGEX, &path) {
            return Ok(Self::channel(Some(id), None));
        } else if let Some(name) = capture_group_1_owned(&CUSTOM_PATH_REGEX, &path) {
            return Ok(Self::channel(None, Some(name)));
        } else if let Some(name) = capture_group_1_owned(&USER_PATH_REGEX, &path) {
            return Ok(Self::channel(None, Some(name)));
        }

        // Embed and other path shapes still carry a usable video id.
        if let Some(v) = url_query(&parsed, "v").filter(|v| VIDEO_ID_REGEX.is_match(v)) {
            return Ok(Self::video(v, url_query(&parsed, "list")));
        }

        Err(InvalidReference(input.to_owned()))
    }

    pub fn watch_url(&self) -> Option<String> {
        self.video_id
            .as_deref()
            .map(|id| format!("https://www.youtube.com/watch?v={id}"))
    }

    pub fn playlist_url(&self) -> Option<String> {
        self.playlist_id
            .as_deref()
            .map(|id| format!("https://www.youtube.com/playlist?list={id}"))
    }

    pub fn channel_url(&self) -> Option<String> {
        if let Some(handle) = self.channel_handle.as_deref() {
            Some(format!("https://www.youtube.com/@{handle}"))
        } else {
            self.channel_id
                .as_deref()
                .map(|id| format!("https://www.youtube.com/channel/{id}"))
        }
    }
}

fn parse_lenient(input: &str) -> Option<Url> {
    if input.contains("://") {
        Url::parse(input).ok()
    } else {
        Url::parse(&format!("https://{input}")).ok()
    }
}

fn url_query(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn query_param(input: &str, key: &str) -> Option<String> {
    parse_lenient(input).and_then(|u| url_query(&u, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_url_variants_are_equivalent() {
        let a = ContentRef::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        let b = ContentRef::parse("youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        let c = ContentRef::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.kind, ContentKind::Video);
        assert_eq!(a.video_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(a.playlist_id, None);
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let a = ContentRef::parse(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabc123&index=4",
        )
        .unwrap();
        let b = ContentRef::parse(
            "https://www.youtube.com/watch?index=4&list=PLabc123&v=dQw4w9WgXcQ",
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn video_in_playlist_keeps_both_ids() {
        let r =
            ContentRef::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabc123").unwrap();
        assert_eq!(r.kind, ContentKind::Video);
        assert_eq!(r.video_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(r.playlist_id.as_deref(), Some("PLabc123"));
    }

    #[test]
    fn short_link_with_playlist_context() {
        let r = ContentRef::parse("https://youtu.be/dQw4w9WgXcQ?list=PLabc123").unwrap();
        assert_eq!(r.kind, ContentKind::Video);
        assert_eq!(r.playlist_id.as_deref(), Some("PLabc123"));
    }

    #[test]
    fn playlist_url() {
        let r = ContentRef::parse("https://www.youtube.com/playlist?list=PLabc123").unwrap();
        assert_eq!(r.kind, ContentKind::Playlist);
        assert_eq!(r.playlist_id.as_deref(), Some("PLabc123"));
        assert_eq!(r.video_id, None);
    }

    #[test]
    fn channel_shapes() {
        let by_handle = ContentRef::parse("https://www.youtube.com/@SomeCreator").unwrap();
        assert_eq!(by_handle.kind, ContentKind::Channel);
        assert_eq!(by_handle.channel_handle.as_deref(), Some("SomeCreator"));

        let by_id =
            ContentRef::parse("https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv").unwrap();
        assert_eq!(by_id.channel_id.as_deref(), Some("UCabcdefghijklmnopqrstuv"));

        let legacy_custom = ContentRef::parse("https://www.youtube.com/c/SomeName").unwrap();
        assert_eq!(legacy_custom.channel_handle.as_deref(), Some("SomeName"));

        let legacy_user = ContentRef::parse("https://www.youtube.com/user/SomeUser").unwrap();
        assert_eq!(legacy_user.channel_handle.as_deref(), Some("SomeUser"));
    }

    #[test]
    fn bare_handles_and_ids() {
        let handle = ContentRef::parse("@SomeCreator").unwrap();
        assert_eq!(handle.kind, ContentKind::Channel);
        assert_eq!(handle.channel_handle.as_deref(), Some("SomeCreator"));

        let id = ContentRef::parse("UCabcdefghijklmnopqrstuv").unwrap();
        assert_eq!(id.channel_id.as_deref(), Some("UCabcdefghijklmnopqrstuv"));
    }

    #[test]
    fn malformed_inputs_never_partially_parse() {
        for input in [
            "",
            "not a url at all",
            "https://vimeo.com/12345",
            "https://www.youtube.com/",
            "UCtooshort",
        ] {
            assert!(ContentRef::parse(input).is_err(), "accepted: {input}");
        }
    }

    #[test]
    fn canonical_urls_round_trip() {
        let r =
            ContentRef::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabc123").unwrap();
        assert_eq!(
            r.watch_url().unwrap(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            r.playlist_url().unwrap(),
            "https://www.youtube.com/playlist?list=PLabc123"
        );

        let c = ContentRef::parse("@SomeCreator").unwrap();
        assert_eq!(
            c.channel_url().unwrap(),
            "https://www.youtube.com/@SomeCreator"
        );
    }
}
