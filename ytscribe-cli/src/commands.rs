use std::path::Path;

use tracing::{info, warn};
use ytscribe_extractor::{
    BatchMode, BatchRunner, ChannelDiscoverer, ContentKind, ContentRef, DiscoveryLimits,
    DiscoveryMethod, OutputManager, PlaylistInfo, PlaylistResolver, PlaylistVideo, RatePolicy,
    TranscriptExtractor, TranscriptWriter, WebSession,
    playlist::{load_playlist_config, save_playlist_config},
    report::{REPORT_FILE, load_report, save_report},
};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

pub struct CommandExecutor {
    config: AppConfig,
    session: WebSession,
}

impl CommandExecutor {
    pub fn new(config: AppConfig) -> Result<Self> {
        let session = WebSession::new(config.insecure)?;
        Ok(Self { config, session })
    }

    /// Extract from a video URL/id or a playlist URL.
    pub async fn extract(
        &self,
        url: &str,
        retry: bool,
        json: bool,
        save_config: Option<&Path>,
    ) -> Result<()> {
        let content = parse_reference(url)?;
        match content.kind {
            ContentKind::Video => {
                // A video opened from a playlist page extracts as a single
                // video; pass the playlist URL to process the whole list.
                let video_id = content.video_id.as_deref().unwrap_or_default();
                self.extract_single(video_id, json).await
            }
            ContentKind::Playlist => {
                let playlist_id = content.playlist_id.as_deref().unwrap_or_default();
                let resolver = PlaylistResolver::new(self.session.clone());
                let playlist = resolver.resolve(playlist_id).await;
                if let Some(error) = &playlist.error {
                    return Err(CliError::Other(error.clone()));
                }
                if let Some(path) = save_config {
                    save_playlist_config(&playlist, path).await?;
                    info!(path = %path.display(), "playlist config saved");
                }
                self.run_batch(playlist, retry).await
            }
            ContentKind::Channel => Err(CliError::Other(
                "that looks like a channel; use the discover command".to_owned(),
            )),
        }
    }

    async fn extract_single(&self, video_id: &str, json: bool) -> Result<()> {
        let extractor = TranscriptExtractor::new(self.session.clone(), &self.config.language);
        let transcript = extractor.extract(video_id, None).await?;

        let manager = OutputManager::new(&self.config.output_dir);
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let video = PlaylistVideo {
            index: 1,
            video_id: video_id.to_owned(),
            title: video_id.to_owned(),
            duration: None,
        };
        let path = manager
            .save_transcript_markdown(&self.config.output_dir, &video, &transcript)
            .await?;
        if json {
            manager
                .save_transcript_json(&self.config.output_dir, &video, &transcript)
                .await?;
        }

        println!(
            "Extracted {} segments ({} chars, language {}) -> {}",
            transcript.segment_count(),
            transcript.full_text.len(),
            transcript.language,
            path.display()
        );
        Ok(())
    }

    pub async fn languages(&self, url: &str) -> Result<()> {
        let content = parse_reference(url)?;
        let Some(video_id) = content.video_id.as_deref() else {
            return Err(CliError::Other("a video URL or id is required".to_owned()));
        };

        let extractor = TranscriptExtractor::new(self.session.clone(), &self.config.language);
        let languages = extractor.list_languages(video_id).await?;
        if languages.is_empty() {
            println!("No transcripts available for {video_id}");
            return Ok(());
        }
        println!("Available transcript languages for {video_id}:");
        for lang in languages {
            let generated = if lang.is_generated { " (auto-generated)" } else { "" };
            println!("  {:<8} {}{}", lang.language_code, lang.language, generated);
        }
        Ok(())
    }

    pub async fn discover(
        &self,
        channel: &str,
        method: DiscoveryMethod,
        limits: DiscoveryLimits,
        save: Option<&Path>,
    ) -> Result<()> {
        let discoverer = ChannelDiscoverer::new(self.session.clone(), self.config.api_key.clone());
        let result = discoverer.discover(channel, method, &limits).await?;

        println!("Channel:     {}", result.channel_name);
        if let Some(handle) = &result.channel_handle {
            println!("Handle:      @{handle}");
        }
        if let Some(id) = &result.channel_id {
            println!("Channel ID:  {id}");
        }
        println!("URL:         {}", result.channel_url);
        if result.subscriber_count > 0 {
            println!("Subscribers: {}", result.subscriber_count);
        }
        println!("Strategy:    {:?}", result.strategy_used);

        if !result.playlists.is_empty() {
            println!("\nPlaylists ({}):", result.playlists.len());
            for playlist in &result.playlists {
                let count = playlist
                    .video_count
                    .map(|c| format!(" [{c} videos]"))
                    .unwrap_or_default();
                println!("  {}  {}{count}", playlist.playlist_id, playlist.title);
            }
        }
        if !result.videos.is_empty() {
            println!("\nRecent videos ({}):", result.videos.len());
            for video in &result.videos {
                println!("  {}  {}", video.video_id, video.title);
            }
        }
        if let Some(error) = &result.error {
            warn!("{error}");
        }

        if let Some(path) = save {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, serde_json::to_vec_pretty(&result).map_err(std::io::Error::from)?)
                .await?;
            println!("\nSaved discovery result to {}", path.display());
        }
        Ok(())
    }

    pub async fn batch(&self, config_file: &Path, retry: bool) -> Result<()> {
        let playlist = load_playlist_config(config_file).await;
        if let Some(error) = &playlist.error {
            return Err(CliError::Other(error.clone()));
        }
        self.run_batch(playlist, retry).await
    }

    pub fn list_configs(&self) -> Result<()> {
        let dir = &self.config.configs_dir;
        if !dir.is_dir() {
            println!("No configs directory at {}", dir.display());
            return Ok(());
        }
        let mut found = false;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                println!("{}", path.display());
                found = true;
            }
        }
        if !found {
            println!("No playlist configs in {}", dir.display());
        }
        Ok(())
    }

    async fn run_batch(&self, playlist: PlaylistInfo, retry: bool) -> Result<()> {
        if playlist.videos.is_empty() {
            println!("Playlist '{}' has no accessible videos", playlist.title);
            return Ok(());
        }

        let channel = if playlist.channel_name.is_empty() {
            "unknown_channel"
        } else {
            playlist.channel_name.as_str()
        };
        let manager = OutputManager::new(&self.config.output_dir);
        let dir = manager.playlist_dir(channel, &playlist.title).await?;

        let prior = load_report(&dir).await;
        let mode = if retry {
            if prior.is_none() {
                println!("No prior report in {}, nothing to retry", dir.display());
                return Ok(());
            }
            BatchMode::RetryFailed
        } else {
            BatchMode::SkipExisting
        };

        println!(
            "Processing {} videos from '{}' ({})",
            playlist.videos.len(),
            playlist.title,
            playlist.playlist_id
        );

        let extractor = TranscriptExtractor::new(self.session.clone(), &self.config.language);
        let policy = RatePolicy {
            base_delay: std::time::Duration::from_secs(self.config.base_delay_secs),
            ..RatePolicy::default()
        };
        let sink = TranscriptWriter::new(OutputManager::new(&self.config.output_dir), dir.clone());

        let report = BatchRunner::new(&extractor)
            .with_policy(policy)
            .run(&playlist, prior.as_ref(), mode, &sink)
            .await;

        manager.save_playlist_info(&dir, &playlist).await?;
        save_report(&report, &dir).await?;

        println!(
            "\nDone: {} extracted, {} failed, {} skipped",
            report.successful.len(),
            report.failed.len(),
            report.skipped.len()
        );
        if report.ip_blocked {
            println!(
                "YouTube blocked this network mid-run; wait a while, then re-run with --retry"
            );
        }
        println!("Report: {}", dir.join(REPORT_FILE).display());
        Ok(())
    }
}

/// `ContentRef::parse` plus the CLI convenience of accepting a bare
/// 11-character video id.
fn parse_reference(input: &str) -> Result<ContentRef> {
    match ContentRef::parse(input) {
        Ok(content) => Ok(content),
        Err(e) => {
            let input = input.trim();
            if input.len() == 11
                && input
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                Ok(ContentRef::parse(&format!(
                    "https://www.youtube.com/watch?v={input}"
                ))?)
            } else {
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_video_ids_are_accepted() {
        let content = parse_reference("dQw4w9WgXcQ").unwrap();
        assert_eq!(content.kind, ContentKind::Video);
        assert_eq!(content.video_id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn urls_still_parse_normally() {
        let content = parse_reference("https://www.youtube.com/playlist?list=PLabc123").unwrap();
        assert_eq!(content.kind, ContentKind::Playlist);
    }
}
