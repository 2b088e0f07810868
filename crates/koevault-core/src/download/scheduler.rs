//! Concurrent download execution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{stream, StreamExt};
use tracing::{debug, warn};

use crate::catalog::AssetDescriptor;
use crate::config::NetworkConfig;
use crate::download::rate_limit::RateLimiter;
use crate::manifest::ManifestWriter;
use crate::net::AssetSource;
use crate::progress::ProgressTracker;
use crate::{KoevaultError, Result};

/// What happened to one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The asset is on disk under its final name and in the manifest.
    Completed { bytes: u64 },
    Failed { reason: String },
}

/// Terminal result for one descriptor. A run yields exactly one result per
/// descriptor it was given.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub descriptor: AssetDescriptor,
    pub outcome: DownloadOutcome,
}

impl DownloadResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Completed { .. })
    }
}

/// Runs a bounded pool of download workers over a descriptor sequence.
///
/// Items are independent: a failure is recorded and the run moves on, with
/// no retry. Downloads land in a `.part` file renamed into place on
/// success, so a final-named file is always complete.
pub struct DownloadScheduler {
    source: Arc<dyn AssetSource>,
    rate_limiter: Arc<RateLimiter>,
    workers: usize,
}

impl DownloadScheduler {
    pub fn new(source: Arc<dyn AssetSource>, rate_limiter: Arc<RateLimiter>, workers: usize) -> Self {
        Self {
            source,
            rate_limiter,
            workers,
        }
    }

    /// Download every descriptor, recording successes in `manifest` and
    /// all attempts in `progress`. Results arrive in completion order.
    pub async fn run(
        &self,
        descriptors: Vec<AssetDescriptor>,
        manifest: &ManifestWriter,
        progress: &ProgressTracker,
    ) -> Vec<DownloadResult> {
        stream::iter(descriptors)
            .map(|descriptor| self.download_one(descriptor, manifest, progress))
            .buffer_unordered(self.workers.max(1))
            .collect()
            .await
    }

    async fn download_one(
        &self,
        descriptor: AssetDescriptor,
        manifest: &ManifestWriter,
        progress: &ProgressTracker,
    ) -> DownloadResult {
        self.rate_limiter.acquire().await;
        debug!("Downloading {}", descriptor.remote_url);

        let fetched = self.fetch_to_destination(&descriptor).await;
        progress.record_attempt(descriptor.category);

        let outcome = match fetched {
            Ok(bytes) => {
                debug!(
                    "Downloaded {} ({} bytes)",
                    descriptor.destination_path.display(),
                    bytes
                );
                match manifest.record(&descriptor.destination_path, &descriptor.transcript) {
                    Ok(()) => DownloadOutcome::Completed { bytes },
                    Err(e) => {
                        warn!(
                            "Downloaded {} but could not record it in the manifest: {}",
                            descriptor.destination_path.display(),
                            e
                        );
                        DownloadOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Failed to download {}: {}", descriptor.remote_url, e);
                DownloadOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        DownloadResult {
            descriptor,
            outcome,
        }
    }

    /// Fetch into a temp file next to the destination, then rename into
    /// place. The temp file is removed on any failure.
    async fn fetch_to_destination(&self, descriptor: &AssetDescriptor) -> Result<u64> {
        let dest = &descriptor.destination_path;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| KoevaultError::io_with_path(e, parent))?;
        }

        let temp_path = temp_download_path(dest);
        match self.source.fetch_to(&descriptor.remote_url, &temp_path).await {
            Ok(bytes) => match std::fs::rename(&temp_path, dest) {
                Ok(()) => Ok(bytes),
                Err(e) => {
                    let _ = std::fs::remove_file(&temp_path);
                    Err(KoevaultError::io_with_path(e, dest))
                }
            },
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

fn temp_download_path(dest: &Path) -> PathBuf {
    let mut path = dest.as_os_str().to_os_string();
    path.push(NetworkConfig::DOWNLOAD_TEMP_SUFFIX);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Asset source that writes a fixed payload, failing for chosen urls.
    #[derive(Default)]
    struct StubAssets {
        fail_urls: HashSet<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl StubAssets {
        fn failing(urls: &[&str]) -> Self {
            Self {
                fail_urls: urls.iter().map(|u| u.to_string()).collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl AssetSource for StubAssets {
        async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_urls.contains(url) {
                return Err(KoevaultError::DownloadFailed {
                    url: url.to_string(),
                    message: "stub failure".to_string(),
                });
            }
            std::fs::write(dest, b"audio")
                .map_err(|e| KoevaultError::io_with_path(e, dest))?;
            Ok(5)
        }
    }

    fn descriptor(root: &Path, name: &str, category: Category) -> AssetDescriptor {
        AssetDescriptor {
            id: name.to_string(),
            remote_url: format!("https://assets.test/{}", name),
            transcript: format!("text for {}", name),
            destination_path: root.join("dataset_21").join(name),
            category,
        }
    }

    fn create_scheduler(source: StubAssets, workers: usize) -> DownloadScheduler {
        DownloadScheduler::new(
            Arc::new(source),
            Arc::new(RateLimiter::new(Duration::ZERO)),
            workers,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_downloads_everything_and_records_manifest() {
        let temp = TempDir::new().unwrap();
        let scheduler = create_scheduler(StubAssets::default(), 3);
        let manifest = ManifestWriter::open(temp.path().join("manifest.list")).unwrap();
        let progress = ProgressTracker::new();

        let descriptors = vec![
            descriptor(temp.path(), "S001.wav", Category::Solo),
            descriptor(temp.path(), "P001.wav", Category::Profile),
            descriptor(temp.path(), "C0001.wav", Category::Card),
        ];
        let expected_paths: Vec<PathBuf> =
            descriptors.iter().map(|d| d.destination_path.clone()).collect();

        let results = scheduler.run(descriptors, &manifest, &progress).await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(DownloadResult::is_success));
        for path in &expected_paths {
            assert!(path.is_file());
            assert!(!temp_download_path(path).exists());
        }

        let content = std::fs::read_to_string(manifest.path()).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains("S001.wav|text for S001.wav"));

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.overall.attempted, 1);
        assert_eq!(snapshot.profile.attempted, 1);
        assert_eq!(snapshot.card.attempted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_isolated() {
        let temp = TempDir::new().unwrap();
        let scheduler =
            create_scheduler(StubAssets::failing(&["https://assets.test/C0002.wav"]), 2);
        let manifest = ManifestWriter::open(temp.path().join("manifest.list")).unwrap();
        let progress = ProgressTracker::new();

        let descriptors = vec![
            descriptor(temp.path(), "C0001.wav", Category::Card),
            descriptor(temp.path(), "C0002.wav", Category::Card),
            descriptor(temp.path(), "C0003.wav", Category::Card),
        ];
        let failed_dest = descriptors[1].destination_path.clone();

        let results = scheduler.run(descriptors, &manifest, &progress).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 2);

        let failure = results.iter().find(|r| !r.is_success()).unwrap();
        assert_eq!(failure.descriptor.id, "C0002.wav");
        assert!(matches!(&failure.outcome, DownloadOutcome::Failed { reason } if reason.contains("stub failure")));

        // Neither the final file nor a temp file is left behind.
        assert!(!failed_dest.exists());
        assert!(!temp_download_path(&failed_dest).exists());

        // Successes are in the manifest; every attempt is counted.
        let content = std::fs::read_to_string(manifest.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(progress.snapshot().card.attempted, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_result_per_descriptor() {
        let temp = TempDir::new().unwrap();
        let scheduler =
            create_scheduler(StubAssets::failing(&["https://assets.test/C0007.wav"]), 4);
        let manifest = ManifestWriter::open(temp.path().join("manifest.list")).unwrap();
        let progress = ProgressTracker::new();

        let descriptors: Vec<AssetDescriptor> = (1..=10)
            .map(|i| descriptor(temp.path(), &format!("C{:04}.wav", i), Category::Card))
            .collect();

        let results = scheduler.run(descriptors, &manifest, &progress).await;

        assert_eq!(results.len(), 10);
        let mut ids: Vec<&str> = results.iter().map(|r| r.descriptor.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);

        // The one failure is attempted and reported but kept out of the
        // manifest.
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 9);
        let content = std::fs::read_to_string(manifest.path()).unwrap();
        assert_eq!(content.lines().count(), 9);
        assert_eq!(progress.snapshot().card.attempted, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_pool_is_bounded() {
        let temp = TempDir::new().unwrap();
        let source = Arc::new(StubAssets::default());
        let scheduler = DownloadScheduler::new(
            source.clone(),
            Arc::new(RateLimiter::new(Duration::ZERO)),
            2,
        );
        let manifest = ManifestWriter::open(temp.path().join("manifest.list")).unwrap();
        let progress = ProgressTracker::new();

        let descriptors: Vec<AssetDescriptor> = (1..=6)
            .map(|i| descriptor(temp.path(), &format!("P{:03}.wav", i), Category::Profile))
            .collect();

        scheduler.run(descriptors, &manifest, &progress).await;

        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_run_yields_no_results() {
        let temp = TempDir::new().unwrap();
        let scheduler = create_scheduler(StubAssets::default(), 5);
        let manifest = ManifestWriter::open(temp.path().join("manifest.list")).unwrap();
        let progress = ProgressTracker::new();

        let results = scheduler.run(Vec::new(), &manifest, &progress).await;

        assert!(results.is_empty());
        assert_eq!(std::fs::read_to_string(manifest.path()).unwrap(), "");
    }
}
