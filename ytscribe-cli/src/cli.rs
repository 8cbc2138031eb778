use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ytscribe_extractor::DiscoveryMethod;

#[derive(Parser)]
#[command(
    name = "ytscribe",
    about = "Discover YouTube channels and extract transcripts in bulk",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output directory for transcripts
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Preferred transcript language code
    #[arg(short, long, global = true)]
    pub language: Option<String>,

    /// Base delay between batch requests, in seconds
    #[arg(long, global = true)]
    pub delay: Option<u64>,

    /// Disable TLS certificate verification (restricted networks only)
    #[arg(long, global = true)]
    pub insecure: bool,

    /// YouTube Data API key, enables the api discovery strategy
    #[arg(long, global = true, env = "YOUTUBE_API_KEY")]
    pub api_key: Option<String>,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract transcripts from a video or playlist URL
    Extract {
        /// Video URL, playlist URL, or video id
        url: String,

        /// Re-attempt only previously failed videos of this playlist
        #[arg(long)]
        retry: bool,

        /// Also write raw segments as JSON next to the markdown
        #[arg(long)]
        json: bool,

        /// Save the resolved playlist as a reusable config file
        #[arg(long)]
        save_config: Option<PathBuf>,
    },

    /// List available transcript languages for a video
    Languages {
        /// Video URL or id
        url: String,
    },

    /// Discover a channel's playlists and recent videos
    Discover {
        /// Channel URL, @handle, or channel id
        channel: String,

        #[arg(long, value_enum, default_value_t = StrategyArg::Auto)]
        strategy: StrategyArg,

        #[arg(long, default_value_t = 50)]
        max_videos: usize,

        #[arg(long, default_value_t = 20)]
        max_playlists: usize,

        /// Save the discovery result as JSON to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Run a batch from a saved playlist config file
    Batch {
        /// Playlist config JSON, as written by `extract --save-config`
        config_file: PathBuf,

        /// Re-attempt only previously failed videos
        #[arg(long)]
        retry: bool,
    },

    /// List saved playlist config files
    Configs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Auto,
    Api,
    Browser,
    Scraping,
}

impl From<StrategyArg> for DiscoveryMethod {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Auto => DiscoveryMethod::Auto,
            StrategyArg::Api => DiscoveryMethod::Api,
            StrategyArg::Browser => DiscoveryMethod::Browser,
            StrategyArg::Scraping => DiscoveryMethod::Scraping,
        }
    }
}
