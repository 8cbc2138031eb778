//! Output layout and rendering: one directory per channel, one per
//! playlist, numbered markdown transcripts inside.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::batch::TranscriptSink;
use crate::playlist::{PlaylistInfo, PlaylistVideo};
use crate::transcript::TranscriptResult;

const MAX_FILENAME_LEN: usize = 100;
const MAX_FOLDER_LEN: usize = 50;
const WRAP_COLUMN: usize = 80;

pub const PLAYLIST_INFO_FILE: &str = "_playlist_info.json";

/// Strip characters that are unsafe in filenames on any mainstream
/// filesystem, collapse runs of whitespace, and cap the length.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();

    let mut out = String::with_capacity(cleaned.len());
    let mut last_space = true;
    for c in cleaned.trim().chars() {
        if c == ' ' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }

    let mut out = out.trim().to_owned();
    if out.len() > MAX_FILENAME_LEN {
        // Truncate on a char boundary.
        let cut = (0..=MAX_FILENAME_LEN)
            .rev()
            .find(|i| out.is_char_boundary(*i))
            .unwrap_or(0);
        out.truncate(cut);
        out = out.trim_end().to_owned();
    }

    if out.is_empty() {
        "untitled".to_owned()
    } else {
        out
    }
}

/// Folder names are shorter and lowercase, with spaces as underscores.
pub fn sanitize_folder_name(name: &str) -> String {
    let mut out: String = sanitize_filename(name)
        .to_lowercase()
        .replace(' ', "_");
    if out.len() > MAX_FOLDER_LEN {
        let cut = (0..=MAX_FOLDER_LEN)
            .rev()
            .find(|i| out.is_char_boundary(*i))
            .unwrap_or(0);
        out.truncate(cut);
        out = out.trim_end_matches('_').to_owned();
    }
    if out.is_empty() {
        "untitled".to_owned()
    } else {
        out
    }
}

fn wrap_text(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / width);
    let mut line_len = 0;
    for word in text.split_whitespace() {
        if line_len == 0 {
            out.push_str(word);
            line_len = word.len();
        } else if line_len + 1 + word.len() > width {
            out.push('\n');
            out.push_str(word);
            line_len = word.len();
        } else {
            out.push(' ');
            out.push_str(word);
            line_len += 1 + word.len();
        }
    }
    out
}

pub struct OutputManager {
    base_dir: PathBuf,
}

impl OutputManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub async fn channel_dir(&self, channel_name: &str) -> std::io::Result<PathBuf> {
        let dir = self.base_dir.join(sanitize_folder_name(channel_name));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub async fn playlist_dir(
        &self,
        channel_name: &str,
        playlist_title: &str,
    ) -> std::io::Result<PathBuf> {
        let dir = self
            .base_dir
            .join(sanitize_folder_name(channel_name))
            .join(sanitize_folder_name(playlist_title));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Write a transcript as `NN_Title.md` with a metadata header and the
    /// text wrapped at 80 columns.
    pub async fn save_transcript_markdown(
        &self,
        dir: &Path,
        video: &PlaylistVideo,
        transcript: &TranscriptResult,
    ) -> std::io::Result<PathBuf> {
        let name = format!(
            "{:02}_{}.md",
            video.index,
            sanitize_filename(&video.title)
        );
        let path = dir.join(name);

        let minutes = (transcript.total_duration() / 60.0).round() as u64;
        let mut doc = String::new();
        doc.push_str(&format!("# {}\n\n", video.title));
        doc.push_str(&format!("**Video ID:** {}\n", transcript.video_id));
        doc.push_str(&format!(
            "**URL:** https://www.youtube.com/watch?v={}\n",
            transcript.video_id
        ));
        doc.push_str(&format!("**Language:** {}\n", transcript.language));
        if minutes > 0 {
            doc.push_str(&format!("**Duration:** ~{minutes} min\n"));
        }
        doc.push_str(&format!(
            "**Extracted:** {}\n",
            Utc::now().format("%Y-%m-%d %H:%M UTC")
        ));
        doc.push_str("\n---\n\n");
        doc.push_str(&wrap_text(&transcript.full_text, WRAP_COLUMN));
        doc.push('\n');

        tokio::fs::write(&path, doc).await?;
        debug!(path = %path.display(), "transcript saved");
        Ok(path)
    }

    /// Raw segments as JSON, for callers that post-process timing data.
    pub async fn save_transcript_json(
        &self,
        dir: &Path,
        video: &PlaylistVideo,
        transcript: &TranscriptResult,
    ) -> std::io::Result<PathBuf> {
        let name = format!(
            "{:02}_{}.json",
            video.index,
            sanitize_filename(&video.title)
        );
        let path = dir.join(name);
        let json = serde_json::to_vec_pretty(transcript)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    pub async fn save_playlist_info(
        &self,
        dir: &Path,
        playlist: &PlaylistInfo,
    ) -> std::io::Result<PathBuf> {
        let path = dir.join(PLAYLIST_INFO_FILE);
        let json = serde_json::to_vec_pretty(playlist)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

/// The sink a batch run writes through: markdown transcripts into a fixed
/// playlist directory.
pub struct TranscriptWriter {
    manager: OutputManager,
    dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(manager: OutputManager, dir: PathBuf) -> Self {
        Self { manager, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl TranscriptSink for TranscriptWriter {
    async fn persist(
        &self,
        video: &PlaylistVideo,
        transcript: &TranscriptResult,
    ) -> std::io::Result<PathBuf> {
        self.manager
            .save_transcript_markdown(&self.dir, video, transcript)
            .await
    }
}
