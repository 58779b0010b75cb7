//! Checksum Store - 文件内容摘要 (乐观并发控制)
//!
//! Maps a path to the SHA-256 of its last-known-good content. File tools
//! record a digest after a successful read or write and verify it before
//! mutating a file, so an edit never lands on content the caller has not seen.
//!
//! The map lock is only held for a map read or write. Hashing and file I/O
//! happen outside it.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use super::ToolError;

/// Hex SHA-256 of `content`
pub fn digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// 摘要存储, one per workspace session
#[derive(Debug, Default)]
pub struct ChecksumStore {
    digests: Mutex<HashMap<PathBuf, String>>,
    /// Serializes writers of the same path; entries live while a guard or waiter does
    path_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

/// Per-path write guard from [`ChecksumStore::lock_path`]
#[must_use]
pub struct PathGuard<'a> {
    store: &'a ChecksumStore,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.store.path_locks();
        // only the map still refers to it: nobody holds or waits for this path
        if locks
            .get(&self.path)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.path);
        }
    }
}

impl ChecksumStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn path_locks(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>> {
        self.path_locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn digests(&self) -> MutexGuard<'_, HashMap<PathBuf, String>> {
        self.digests.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the digest of content just read from or written to `path`
    pub fn record(&self, path: &Path, content: &[u8]) -> String {
        let hex = digest(content);
        self.digests().insert(path.to_path_buf(), hex.clone());
        debug!(path = %path.display(), digest = %&hex[..12], "checksum recorded");
        hex
    }

    pub fn get(&self, path: &Path) -> Option<String> {
        self.digests().get(path).cloned()
    }

    /// Compare `current` on-disk content against the stored digest.
    /// No stored digest means unknown, which passes.
    pub fn verify(&self, path: &Path, current: &[u8]) -> Result<(), ToolError> {
        let Some(expected) = self.get(path) else {
            return Ok(());
        };
        if digest(current) == expected {
            Ok(())
        } else {
            debug!(path = %path.display(), "stale content detected");
            Err(ToolError::StaleContent {
                path: path.to_path_buf(),
            })
        }
    }

    /// Explicit reset, the only way the whole store is emptied
    pub fn clear(&self) {
        self.digests().clear();
    }

    pub fn len(&self) -> usize {
        self.digests().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exclusive guard for a verify-write-record sequence on `path`
    pub async fn lock_path(&self, path: &Path) -> PathGuard<'_> {
        let lock = self
            .path_locks()
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        PathGuard {
            store: self,
            path: path.to_path_buf(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn locked_paths(&self) -> usize {
        self.path_locks().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_digest_is_hex_sha256() {
        assert_eq!(
            digest(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_verify_unknown_path_passes() {
        let store = ChecksumStore::new();
        assert!(store.verify(Path::new("/tmp/unknown"), b"anything").is_ok());
    }

    #[test]
    fn test_verify_detects_change() {
        let store = ChecksumStore::new();
        let path = Path::new("/work/a.txt");
        store.record(path, b"v1");

        assert!(store.verify(path, b"v1").is_ok());
        let err = store.verify(path, b"v2").unwrap_err();
        assert!(matches!(err, ToolError::StaleContent { path: p } if p == path));
    }

    #[test]
    fn test_record_replaces_and_clear_resets() {
        let store = ChecksumStore::new();
        let path = Path::new("/work/a.txt");
        store.record(path, b"v1");
        store.record(path, b"v2");
        assert_eq!(store.get(path), Some(digest(b"v2")));
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_same_path_writers_serialize() {
        let store = Arc::new(ChecksumStore::new());
        let path = PathBuf::from("/work/a.txt");

        let guard = store.lock_path(&path).await;
        let contender = {
            let store = store.clone();
            let path = path.clone();
            tokio::spawn(async move {
                let _guard = store.lock_path(&path).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();

        // other paths are independent
        let _a = store.lock_path(Path::new("/work/a.txt")).await;
        let _b = store.lock_path(Path::new("/work/b.txt")).await;
    }

    #[tokio::test]
    async fn test_path_locks_released_after_last_guard() {
        let store = Arc::new(ChecksumStore::new());
        let path = PathBuf::from("/work/a.txt");

        let guard = store.lock_path(&path).await;
        let waiter = {
            let store = store.clone();
            let path = path.clone();
            tokio::spawn(async move {
                let _guard = store.lock_path(&path).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // the waiter keeps the entry alive
        drop(guard);
        assert_eq!(store.locked_paths(), 1);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.locked_paths(), 0);

        for i in 0..50 {
            let _guard = store.lock_path(&PathBuf::from(format!("/work/{}.txt", i))).await;
        }
        assert_eq!(store.locked_paths(), 0);
    }
}
