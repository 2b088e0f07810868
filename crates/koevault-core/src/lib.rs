//! Koevault - Character voice-asset catalog downloader.
//!
//! This crate resolves a character's voice assets (solo songs, profile
//! voices, card episode voices) from a remote master database, downloads
//! them concurrently under a global rate limit, and writes a
//! `path|transcript` manifest alongside the audio files. Catalog metadata
//! is cached on disk with a fixed time-to-live so repeated runs do not
//! re-fetch the remote database.
//!
//! # Example
//!
//! ```rust,ignore
//! use koevault::{ContentMode, Session, Settings};
//!
//! #[tokio::main]
//! async fn main() -> koevault::Result<()> {
//!     let session = Session::new(Settings::default())?;
//!
//!     // Download every solo song and voice clip of character 21.
//!     let summary = session.run(21, ContentMode::All, 800).await?;
//!     println!(
//!         "{} of {} assets downloaded",
//!         summary.succeeded, summary.planned
//!     );
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod manifest;
pub mod net;
pub mod progress;
pub mod session;

// Re-export commonly used types
pub use cache::MetadataCache;
pub use catalog::{
    AssetDescriptor, CatalogResolver, Category, CharacterEntry, ContentMode,
};
pub use config::{DownloadConfig, Settings};
pub use download::{DownloadOutcome, DownloadResult, DownloadScheduler, RateLimiter};
pub use error::{KoevaultError, Result};
pub use manifest::{ManifestWriter, rewrite_manifest};
pub use net::{AssetSource, HttpClient, JsonSource};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use session::{CategoryTally, Session, SessionSummary};
