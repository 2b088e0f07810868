//! Disk-backed metadata cache with a fixed time-to-live.
//!
//! A SQLite store keyed by `(namespace, key)` holding an opaque payload and
//! the RFC3339 time it was fetched, with an in-process memory tier in front
//! of it. An entry is valid iff it is younger than
//! [`CacheConfig::METADATA_TTL`]; expired entries are treated as absent and
//! overwritten by the next fetch. An unreadable database file or row is a
//! cache miss, never a fatal error. Expired entries are never served as a
//! fallback when a refresh fetch fails; the failure propagates.

use crate::config::CacheConfig;
use crate::{KoevaultError, Result};
use chrono::{DateTime, Utc};
use mini_moka::sync::Cache;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Disk-backed key→(value, fetched_at) store.
///
/// Thread-safe via an internal mutex on the connection. One instance owns
/// the database file for its lifetime; the connection is flushed and closed
/// on drop.
pub struct MetadataCache {
    /// Database connection (wrapped for thread safety).
    conn: Arc<Mutex<Connection>>,
    /// In-memory tier so one process never re-reads SQLite for a key.
    memory: Cache<String, Arc<Vec<u8>>>,
    db_path: PathBuf,
}

impl MetadataCache {
    /// Open (or create) the cache database at `db_path`.
    ///
    /// Creates parent directories and the schema as needed. A corrupt
    /// database file is deleted and recreated, which is a full cache miss.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KoevaultError::Io {
                message: format!("Failed to create cache directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = match Self::open_connection(db_path) {
            Ok(conn) => conn,
            Err(e) => {
                warn!(
                    "Cache database {} unreadable ({}), recreating",
                    db_path.display(),
                    e
                );
                Self::remove_database_files(db_path);
                Self::open_connection(db_path)?
            }
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            memory: Cache::builder()
                .time_to_live(CacheConfig::METADATA_TTL)
                .max_capacity(CacheConfig::MEMORY_MAX_CAPACITY)
                .build(),
            db_path: db_path.to_path_buf(),
        })
    }

    fn open_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| KoevaultError::Database {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        // WAL for concurrent reads; also the first statement to touch a
        // corrupt file, so corruption surfaces here rather than mid-run.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| KoevaultError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                fetched_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )
        .map_err(|e| KoevaultError::Database {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })?;

        Ok(conn)
    }

    /// Remove the database and its WAL sidecar files, best effort.
    fn remove_database_files(db_path: &Path) {
        let _ = std::fs::remove_file(db_path);
        for suffix in ["-wal", "-shm"] {
            let _ = std::fs::remove_file(PathBuf::from(format!(
                "{}{}",
                db_path.display(),
                suffix
            )));
        }
    }

    /// Look up a valid (non-expired) entry.
    ///
    /// Read failures are logged and reported as a miss; the caller refetches
    /// and overwrites, so a damaged entry heals itself.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        let memory_key = format!("{}/{}", namespace, key);
        if let Some(value) = self.memory.get(&memory_key) {
            debug!("Cache hit (memory) for {}", memory_key);
            return Some(value.as_ref().clone());
        }

        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to lock cache database: {}", e);
                return None;
            }
        };

        let cutoff = (Utc::now()
            - chrono::Duration::from_std(CacheConfig::METADATA_TTL).unwrap_or_default())
        .to_rfc3339();

        let row: std::result::Result<Option<Vec<u8>>, rusqlite::Error> = conn
            .query_row(
                r#"
                SELECT value FROM cache_entries
                WHERE namespace = ?1 AND key = ?2 AND fetched_at > ?3
                "#,
                params![namespace, key, cutoff],
                |row| row.get(0),
            )
            .optional();

        match row {
            Ok(Some(value)) => {
                debug!("Cache hit (disk) for {}", memory_key);
                self.memory.insert(memory_key, Arc::new(value.clone()));
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "Failed to read cache entry {} from {}: {}",
                    memory_key,
                    self.db_path.display(),
                    e
                );
                None
            }
        }
    }

    /// Store a value fetched now.
    pub fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        self.set_with_fetched_at(namespace, key, value, Utc::now())?;
        self.memory
            .insert(format!("{}/{}", namespace, key), Arc::new(value.to_vec()));
        Ok(())
    }

    /// Store a value with an explicit fetch time.
    ///
    /// Bypasses the memory tier so a backdated entry is subject to the disk
    /// validity check on the next read.
    pub fn set_with_fetched_at(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| KoevaultError::Database {
            message: format!("Failed to lock cache database: {}", e),
            source: None,
        })?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO cache_entries (namespace, key, value, fetched_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![namespace, key, value, fetched_at.to_rfc3339()],
        )
        .map_err(|e| KoevaultError::Database {
            message: format!("Failed to write cache entry: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    /// Return the cached value for `(namespace, key)` if a valid entry
    /// exists, otherwise run `fetch_fn`, store its result, and return it.
    ///
    /// A fetch failure propagates even when an expired entry is still on
    /// disk; stale data is never served past its TTL. A cache write failure
    /// after a successful fetch is logged and swallowed, since the fetched
    /// value is already in hand.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        fetch_fn: F,
    ) -> Result<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if let Some(bytes) = self.get(namespace, key) {
            match serde_json::from_slice(&bytes) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "Corrupt cache payload for {}/{} ({}), refetching",
                        namespace, key, e
                    );
                }
            }
        }

        let value = fetch_fn().await?;

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(e) = self.set(namespace, key, &bytes) {
                    warn!("Failed to cache {}/{}: {}", namespace, key, e);
                }
            }
            Err(e) => warn!("Failed to serialize {}/{} for cache: {}", namespace, key, e),
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn create_test_cache() -> (TempDir, MetadataCache) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test-cache.db");
        let cache = MetadataCache::open(&db_path).unwrap();
        (temp_dir, cache)
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - chrono::Duration::days(days)
    }

    #[test]
    fn test_set_and_get() {
        let (_temp, cache) = create_test_cache();

        cache.set("master", "musics", b"[1,2,3]").unwrap();

        let value = cache.get("master", "musics");
        assert_eq!(value.as_deref(), Some(b"[1,2,3]".as_slice()));
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let (_temp, cache) = create_test_cache();

        cache
            .set_with_fetched_at("master", "musics", b"old", days_ago(31))
            .unwrap();

        assert!(cache.get("master", "musics").is_none());
    }

    #[test]
    fn test_entry_within_ttl_is_served() {
        let (_temp, cache) = create_test_cache();

        cache
            .set_with_fetched_at("master", "musics", b"recent", days_ago(29))
            .unwrap();

        assert_eq!(
            cache.get("master", "musics").as_deref(),
            Some(b"recent".as_slice())
        );
    }

    #[test]
    fn test_namespace_isolation() {
        let (_temp, cache) = create_test_cache();

        cache.set("master", "shared", b"a").unwrap();
        cache.set("catalog", "shared", b"b").unwrap();

        assert_eq!(cache.get("master", "shared").as_deref(), Some(b"a".as_slice()));
        assert_eq!(cache.get("catalog", "shared").as_deref(), Some(b"b".as_slice()));
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test-cache.db");

        {
            let cache = MetadataCache::open(&db_path).unwrap();
            cache.set("master", "musics", b"kept").unwrap();
        }

        let cache = MetadataCache::open(&db_path).unwrap();
        assert_eq!(
            cache.get("master", "musics").as_deref(),
            Some(b"kept".as_slice())
        );
    }

    #[test]
    fn test_corrupt_database_recreated() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test-cache.db");
        std::fs::write(&db_path, b"this is not a sqlite database").unwrap();

        let cache = MetadataCache::open(&db_path).unwrap();
        assert!(cache.get("master", "musics").is_none());

        // The recreated store is fully usable.
        cache.set("master", "musics", b"fresh").unwrap();
        assert_eq!(
            cache.get("master", "musics").as_deref(),
            Some(b"fresh".as_slice())
        );
    }

    #[tokio::test]
    async fn test_get_or_fetch_fetches_at_most_once() {
        let (_temp, cache) = create_test_cache();
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let value: Vec<u32> = cache
                .get_or_fetch("master", "musics", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_refetches_expired() {
        let (_temp, cache) = create_test_cache();

        let stale = serde_json::to_vec(&vec![9u32]).unwrap();
        cache
            .set_with_fetched_at("master", "musics", &stale, days_ago(31))
            .unwrap();

        let calls = AtomicU32::new(0);
        let value: Vec<u32> = cache
            .get_or_fetch("master", "musics", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1])
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(value, vec![1]);
    }

    #[tokio::test]
    async fn test_fetch_failure_never_serves_stale() {
        let (_temp, cache) = create_test_cache();

        let stale = serde_json::to_vec(&vec![9u32]).unwrap();
        cache
            .set_with_fetched_at("master", "musics", &stale, days_ago(31))
            .unwrap();

        let result: Result<Vec<u32>> = cache
            .get_or_fetch("master", "musics", || async {
                Err(KoevaultError::Network {
                    message: "connection refused".into(),
                    cause: None,
                })
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_a_miss() {
        let (_temp, cache) = create_test_cache();

        cache.set("master", "musics", b"{not json").unwrap();

        let calls = AtomicU32::new(0);
        let value: Vec<u32> = cache
            .get_or_fetch("master", "musics", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![7])
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(value, vec![7]);

        // The refetch overwrote the damaged entry.
        let healed: Vec<u32> = cache
            .get_or_fetch("master", "musics", || async {
                Err(KoevaultError::Other("should not fetch".into()))
            })
            .await
            .unwrap();
        assert_eq!(healed, vec![7]);
    }
}
