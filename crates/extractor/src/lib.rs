//! Discovery and extraction of transcripts and metadata from YouTube.
//!
//! YouTube is a hostile source: it rate-limits, serves consent
//! interstitials, and blocks IPs that fetch too eagerly. Everything in this
//! crate is built around that reality: failures are classified into a
//! closed taxonomy, batches throttle themselves adaptively, and progress is
//! persisted so interrupted runs can resume.

pub mod batch;
pub mod discovery;
pub mod error;
pub mod locator;
pub mod output;
pub mod playlist;
pub mod report;
pub mod session;
pub mod transcript;
pub mod utils;

pub use batch::{BatchMode, BatchRunner, RatePolicy, TranscriptSink};
pub use discovery::{
    ChannelDiscoverer, ChannelDiscovery, ChannelRef, DiscoveryLimits, DiscoveryMethod, Strategy,
};
pub use error::{InvalidReference, TranscriptError, TranscriptErrorKind};
pub use locator::{ContentKind, ContentRef};
pub use output::{OutputManager, TranscriptWriter};
pub use playlist::{PlaylistInfo, PlaylistResolver, PlaylistVideo};
pub use report::{ExtractionReport, SkipReason};
pub use session::WebSession;
pub use transcript::{TranscriptExtractor, TranscriptResult, TranscriptSource};
