//! One download session end to end: resolve, download, summarize.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::MetadataCache;
use crate::catalog::{AssetDescriptor, CatalogResolver, Category, CharacterEntry, ContentMode};
use crate::config::{DownloadConfig, Settings};
use crate::download::{DownloadOutcome, DownloadScheduler, RateLimiter};
use crate::manifest::ManifestWriter;
use crate::net::{AssetSource, HttpClient, JsonSource, RetryConfig};
use crate::progress::ProgressTracker;
use crate::{KoevaultError, Result};

/// Attempt accounting for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryTally {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Final accounting of one session run.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_written: u64,
    pub solo: CategoryTally,
    pub profile: CategoryTally,
    pub card: CategoryTally,
    pub manifest_path: PathBuf,
    /// One `url: reason` entry per failed download.
    pub failures: Vec<String>,
}

/// A configured download session for one output root.
///
/// Holds the resolver, scheduler and progress state; [`Session::run`]
/// executes one character fetch. The session is `Send + Sync` so a caller
/// can poll [`Session::progress`] from another task while a run is in
/// flight.
pub struct Session {
    resolver: CatalogResolver,
    scheduler: DownloadScheduler,
    progress: Arc<ProgressTracker>,
    settings: Settings,
    id: Uuid,
}

impl Session {
    /// Create a session talking to the real remote endpoints.
    pub fn new(settings: Settings) -> Result<Self> {
        let http = Arc::new(HttpClient::new()?);
        Self::with_sources(http.clone(), http, settings)
    }

    /// Create a session over explicit sources. This is the seam used by
    /// tests; [`Session::new`] routes both sources to one HTTP client.
    pub fn with_sources(
        json_source: Arc<dyn JsonSource>,
        asset_source: Arc<dyn AssetSource>,
        settings: Settings,
    ) -> Result<Self> {
        let cache = Arc::new(MetadataCache::open(settings.resolved_cache_path())?);
        // Catalog fetch retries pace themselves with the same wait the
        // download workers use.
        let resolver = CatalogResolver::new(json_source, cache, settings.output_root.clone())
            .with_retry(RetryConfig::new().with_delay(settings.wait_time));
        let rate_limiter = Arc::new(RateLimiter::new(settings.wait_time));
        let scheduler = DownloadScheduler::new(asset_source, rate_limiter, settings.workers);

        Ok(Self {
            resolver,
            scheduler,
            progress: Arc::new(ProgressTracker::new()),
            settings,
            id: Uuid::new_v4(),
        })
    }

    /// Progress counters shared with the running session.
    pub fn progress(&self) -> Arc<ProgressTracker> {
        self.progress.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Characters available in the master database.
    pub async fn list_characters(&self) -> Result<Vec<CharacterEntry>> {
        self.resolver.list_characters().await
    }

    /// Fetch all assets of `character_id` covered by `mode`.
    ///
    /// Resolution failures abort the run before any download starts.
    /// Download failures do not: every descriptor is attempted once and the
    /// summary reports how many made it.
    pub async fn run(
        &self,
        character_id: i64,
        mode: ContentMode,
        max_card_count: usize,
    ) -> Result<SessionSummary> {
        info!(
            "Session {} fetching character {} (mode {})",
            self.id, character_id, mode
        );

        let descriptors = self
            .resolver
            .resolve(character_id, mode, max_card_count)
            .await?;
        self.progress.set_totals(
            count_category(&descriptors, Category::Solo),
            count_category(&descriptors, Category::Profile),
            count_category(&descriptors, Category::Card),
        );

        let dataset_dir = self.resolver.dataset_dir(character_id);
        std::fs::create_dir_all(&dataset_dir)
            .map_err(|e| KoevaultError::io_with_path(e, &dataset_dir))?;
        let manifest = ManifestWriter::open(dataset_dir.join(DownloadConfig::MANIFEST_FILE_NAME))?;

        let results = self
            .scheduler
            .run(descriptors, &manifest, &self.progress)
            .await;

        let mut summary = SessionSummary {
            planned: results.len(),
            succeeded: 0,
            failed: 0,
            bytes_written: 0,
            solo: CategoryTally::default(),
            profile: CategoryTally::default(),
            card: CategoryTally::default(),
            manifest_path: manifest.path().to_path_buf(),
            failures: Vec::new(),
        };
        for result in &results {
            let tally = match result.descriptor.category {
                Category::Solo => &mut summary.solo,
                Category::Profile => &mut summary.profile,
                Category::Card => &mut summary.card,
            };
            tally.attempted += 1;
            match &result.outcome {
                DownloadOutcome::Completed { bytes } => {
                    tally.succeeded += 1;
                    summary.succeeded += 1;
                    summary.bytes_written += bytes;
                }
                DownloadOutcome::Failed { reason } => {
                    tally.failed += 1;
                    summary.failed += 1;
                    summary
                        .failures
                        .push(format!("{}: {}", result.descriptor.remote_url, reason));
                }
            }
        }

        if summary.failed > 0 {
            warn!(
                "Session {} finished with {} of {} downloads failed",
                self.id, summary.failed, summary.planned
            );
        } else {
            info!(
                "Session {} finished: {} assets, {} bytes",
                self.id, summary.succeeded, summary.bytes_written
            );
        }
        Ok(summary)
    }
}

fn count_category(descriptors: &[AssetDescriptor], category: Category) -> usize {
    descriptors.iter().filter(|d| d.category == category).count()
}
