//! Centralized configuration for koevault.
//!
//! Compile-time constants for network, cache and download behavior, the
//! remote endpoint bases, and the per-run [`Settings`] surface.

use std::path::PathBuf;
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    /// Total request timeout for small JSON fetches (master database,
    /// scenario assets).
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    /// Connect timeout for asset downloads. Downloads carry no total
    /// timeout so a large audio body is never killed mid-stream.
    pub const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Attempts for one catalog fetch, transport failures only.
    pub const MAX_FETCH_ATTEMPTS: u32 = 5;
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const USER_AGENT: &'static str = "koevault/0.1";
}

/// Metadata cache configuration.
pub struct CacheConfig;

impl CacheConfig {
    /// Fixed time-to-live for every cached catalog payload.
    pub const METADATA_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
    /// Upper bound on entries held by the in-process memory tier.
    pub const MEMORY_MAX_CAPACITY: u64 = 256;
    pub const CACHE_DIR_NAME: &'static str = "koevault";
    pub const CACHE_FILE_NAME: &'static str = "metadata-cache.db";
}

/// Download session configuration.
pub struct DownloadConfig;

impl DownloadConfig {
    /// Minimum spacing between outbound requests across all workers.
    pub const DEFAULT_WAIT_TIME: Duration = Duration::from_millis(300);
    pub const DEFAULT_WORKERS: usize = 5;
    pub const DEFAULT_MAX_CARD_COUNT: usize = 800;
    pub const MANIFEST_FILE_NAME: &'static str = "manifest.list";
    pub const DATASET_DIR_PREFIX: &'static str = "dataset_";
    pub const DEFAULT_OUTPUT_DIR: &'static str = "./output";
    /// Language code stamped into rewritten training manifests.
    pub const DEFAULT_LANGUAGE: &'static str = "ja";
}

/// Remote endpoint bases. Only these two hosts are ever contacted.
pub struct Endpoints;

impl Endpoints {
    pub const MASTER_DB_BASE: &'static str =
        "https://sekai-world.github.io/sekai-master-db-diff";
    pub const ASSET_BASE: &'static str = "https://storage.sekai.best/sekai-jp-assets";
}

/// Per-run settings consumed by a download session.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory under which `dataset_{character_id}/` is created.
    pub output_root: PathBuf,
    /// Override for the cache database path; `None` uses the platform
    /// cache directory.
    pub cache_path: Option<PathBuf>,
    pub wait_time: Duration,
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DownloadConfig::DEFAULT_OUTPUT_DIR),
            cache_path: None,
            wait_time: DownloadConfig::DEFAULT_WAIT_TIME,
            workers: DownloadConfig::DEFAULT_WORKERS,
        }
    }
}

impl Settings {
    /// Resolve the cache database path, falling back to the platform cache
    /// directory and finally to a dotfile beside the output root.
    pub fn resolved_cache_path(&self) -> PathBuf {
        if let Some(path) = &self.cache_path {
            return path.clone();
        }
        let dir = dirs::cache_dir()
            .map(|d| d.join(CacheConfig::CACHE_DIR_NAME))
            .unwrap_or_else(|| self.output_root.join(".cache"));
        dir.join(CacheConfig::CACHE_FILE_NAME)
    }
}
