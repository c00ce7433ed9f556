// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact store: ephemeral, handle-addressed byte storage on the local
// filesystem with reader leases.
//
// Each artifact lives in `<storage_dir>/<handle>.bin`.  Writes go to a
// `.part` file first and are renamed into place, so a handle is never
// visible before its bytes are complete.  The in-memory index is the source
// of truth; files without an index entry are leftovers from an earlier
// process and are purged on open.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pexel_core::error::{PexelError, Result};
use pexel_core::{Artifact, ArtifactHandle, MediaType, ServiceConfig};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::digest;
use crate::expiry::ExpiryScheduler;

const DATA_EXTENSION: &str = "bin";
const PARTIAL_EXTENSION: &str = "part";

/// Per-artifact options for [`ArtifactStore::put`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Overrides the configured default TTL.  Must be at least 1.
    pub ttl_seconds: Option<u64>,
    pub file_name: Option<String>,
}

impl PutOptions {
    pub fn ttl(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds: Some(ttl_seconds),
            file_name: None,
        }
    }

    pub fn named(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// Snapshot of store occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub artifacts: usize,
    pub bytes_in_use: u64,
    pub capacity_bytes: u64,
    pub active_readers: usize,
}

/// Outcome of a removal attempt made on behalf of the expiry scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    Deleted,
    /// No such artifact (already deleted by hand).
    Absent,
    /// The artifact was extended and is not due any more.
    NotDue,
    /// Still leased by this many readers.
    Deferred(usize),
}

struct Entry {
    artifact: Artifact,
    path: PathBuf,
    readers: Arc<AtomicUsize>,
    /// Discarded while leased: invisible to new readers, removed by the next
    /// sweep once the last lease is gone.
    doomed: bool,
}

impl Entry {
    fn readable_at(&self, now: DateTime<Utc>) -> bool {
        !self.doomed && now < self.artifact.expires_at()
    }

    fn active_readers(&self) -> usize {
        self.readers.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct Index {
    entries: HashMap<ArtifactHandle, Entry>,
    /// Bytes reserved by completed and in-flight writes.
    used_bytes: u64,
}

/// Ephemeral artifact storage.
///
/// Shared as `Arc<ArtifactStore>`; every method takes `&self`.  The index
/// lock is never held across an `.await`.
pub struct ArtifactStore {
    root: PathBuf,
    capacity_bytes: u64,
    default_ttl_secs: u64,
    index: RwLock<Index>,
    scheduler: Arc<ExpiryScheduler>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("root", &self.root)
            .field("capacity_bytes", &self.capacity_bytes)
            .field("default_ttl_secs", &self.default_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl ArtifactStore {
    /// Create the storage directory if needed and purge anything a previous
    /// process left behind.
    #[instrument(skip_all, fields(dir = %config.storage_dir.display()))]
    pub async fn open(
        config: &ServiceConfig,
        scheduler: Arc<ExpiryScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.storage_dir).await?;
        let stale = purge_directory(&config.storage_dir).await?;
        if stale > 0 {
            info!(stale, "Removed leftover artifacts from a previous run");
        }

        Ok(Arc::new(Self {
            root: config.storage_dir.clone(),
            capacity_bytes: config.store_capacity_bytes,
            default_ttl_secs: config.default_ttl_secs,
            index: RwLock::new(Index::default()),
            scheduler,
            clock,
        }))
    }

    pub fn scheduler(&self) -> &Arc<ExpiryScheduler> {
        &self.scheduler
    }

    // -- Writing --------------------------------------------------------------

    /// Store `bytes` under a fresh handle and schedule its expiry.
    ///
    /// Fails with [`PexelError::StorageFull`] when the configured capacity
    /// or the backing filesystem rejects the write.  Nothing is left behind
    /// on failure.
    #[instrument(skip(self, bytes, options), fields(size = bytes.len(), media_type = %media_type))]
    pub async fn put(
        &self,
        bytes: &[u8],
        media_type: MediaType,
        options: PutOptions,
    ) -> Result<Artifact> {
        let ttl_seconds = options.ttl_seconds.unwrap_or(self.default_ttl_secs);
        if ttl_seconds == 0 {
            return Err(PexelError::invalid("ttl_seconds", "must be at least 1"));
        }

        let size = bytes.len() as u64;
        self.reserve(size)?;

        let handle = ArtifactHandle::new();
        let path = self.data_path(handle);
        let partial = self.root.join(format!("{handle}.{PARTIAL_EXTENSION}"));

        if let Err(err) = write_atomically(&partial, &path, bytes).await {
            self.release(size);
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(storage_error(err));
        }

        let artifact = Artifact {
            handle,
            created_at: self.clock.now(),
            ttl_seconds,
            media_type,
            size_bytes: size,
            file_name: options.file_name,
            digest: digest::hash_bytes(bytes),
        };
        let expires_at = artifact.expires_at();

        self.index.write().entries.insert(
            handle,
            Entry {
                artifact: artifact.clone(),
                path,
                readers: Arc::new(AtomicUsize::new(0)),
                doomed: false,
            },
        );
        self.scheduler.schedule(handle, expires_at);

        debug!(%handle, ttl_seconds, "Artifact stored");
        Ok(artifact)
    }

    fn reserve(&self, size: u64) -> Result<()> {
        let mut index = self.index.write();
        let wanted = index.used_bytes.saturating_add(size);
        if wanted > self.capacity_bytes {
            warn!(
                size,
                used = index.used_bytes,
                capacity = self.capacity_bytes,
                "Store capacity exceeded"
            );
            return Err(PexelError::StorageFull(format!(
                "{size} bytes requested, {} of {} bytes in use",
                index.used_bytes, self.capacity_bytes
            )));
        }
        index.used_bytes = wanted;
        Ok(())
    }

    fn release(&self, size: u64) {
        let mut index = self.index.write();
        index.used_bytes = index.used_bytes.saturating_sub(size);
    }

    // -- Reading --------------------------------------------------------------

    /// Lease an artifact for reading.
    ///
    /// The artifact cannot be deleted while the returned lease is alive.
    /// Unknown, expired and discarded handles all fail with
    /// [`PexelError::NotFound`].
    pub fn get(&self, handle: ArtifactHandle) -> Result<ArtifactLease> {
        let now = self.clock.now();
        let index = self.index.read();
        let entry = index
            .entries
            .get(&handle)
            .filter(|entry| entry.readable_at(now))
            .ok_or_else(|| PexelError::NotFound(handle.to_string()))?;

        // Incremented under the index lock so a concurrent removal, which
        // checks the count under the write lock, cannot miss it.
        entry.readers.fetch_add(1, Ordering::AcqRel);
        Ok(ArtifactLease {
            artifact: entry.artifact.clone(),
            path: entry.path.clone(),
            _guard: ReaderGuard {
                readers: Arc::clone(&entry.readers),
            },
        })
    }

    /// Whether `handle` names a readable artifact.
    pub fn exists(&self, handle: ArtifactHandle) -> bool {
        let now = self.clock.now();
        self.index
            .read()
            .entries
            .get(&handle)
            .is_some_and(|entry| entry.readable_at(now))
    }

    /// Metadata of a readable artifact, without taking a lease.
    pub fn metadata(&self, handle: ArtifactHandle) -> Result<Artifact> {
        let now = self.clock.now();
        self.index
            .read()
            .entries
            .get(&handle)
            .filter(|entry| entry.readable_at(now))
            .map(|entry| entry.artifact.clone())
            .ok_or_else(|| PexelError::NotFound(handle.to_string()))
    }

    // -- Removal --------------------------------------------------------------

    /// Delete an artifact now.
    ///
    /// Returns `false` when the handle is unknown or the artifact is still
    /// leased.  A leased artifact is hidden from new readers at once and
    /// rescheduled, so the next sweep after its last lease is dropped
    /// removes it.
    #[instrument(skip(self), fields(%handle))]
    pub async fn delete(&self, handle: ArtifactHandle) -> Result<bool> {
        let removed = {
            let mut index = self.index.write();
            take_if_unleased(&mut index, handle)
        };
        match removed {
            Ok(entry) => {
                self.scheduler.cancel(handle);
                remove_file(&entry.path).await?;
                debug!("Artifact deleted");
                Ok(true)
            }
            Err(Removal::Deferred(readers)) => {
                self.doom(handle);
                debug!(readers, "Delete deferred by active readers");
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }

    /// Remove an artifact that is no longer wanted.
    ///
    /// Like [`ArtifactStore::delete`], but a leased artifact whose removal
    /// was deferred also counts as removed.
    #[instrument(skip(self), fields(%handle))]
    pub async fn discard(&self, handle: ArtifactHandle) -> Result<bool> {
        if self.delete(handle).await? {
            return Ok(true);
        }
        Ok(self
            .index
            .read()
            .entries
            .get(&handle)
            .is_some_and(|entry| entry.doomed))
    }

    fn doom(&self, handle: ArtifactHandle) {
        let known = match self.index.write().entries.get_mut(&handle) {
            Some(entry) => {
                entry.doomed = true;
                true
            }
            None => false,
        };
        if known {
            self.scheduler.reschedule(handle, self.clock.now());
        }
    }

    /// Give a readable artifact a new TTL counted from now.
    #[instrument(skip(self), fields(%handle))]
    pub fn extend(&self, handle: ArtifactHandle, ttl_seconds: u64) -> Result<Artifact> {
        if ttl_seconds == 0 {
            return Err(PexelError::invalid("ttl_seconds", "must be at least 1"));
        }
        let now = self.clock.now();
        let artifact = {
            let mut index = self.index.write();
            let entry = index
                .entries
                .get_mut(&handle)
                .filter(|entry| entry.readable_at(now))
                .ok_or_else(|| PexelError::NotFound(handle.to_string()))?;
            // Whole seconds, rounded up so the artifact lives at least
            // `ttl_seconds` from now.
            let elapsed_ms = (now - entry.artifact.created_at).num_milliseconds().max(0) as u64;
            entry.artifact.ttl_seconds = elapsed_ms.div_ceil(1000).saturating_add(ttl_seconds);
            entry.artifact.clone()
        };
        self.scheduler.reschedule(handle, artifact.expires_at());
        debug!(expires_at = %artifact.expires_at(), "Artifact TTL extended");
        Ok(artifact)
    }

    /// Called by the expiry sweep: delete `handle` if it is due and unleased.
    pub(crate) async fn remove_expired(&self, handle: ArtifactHandle) -> Result<Removal> {
        let now = self.clock.now();
        let removed = {
            let mut index = self.index.write();
            match index.entries.get(&handle) {
                None => return Ok(Removal::Absent),
                Some(entry) if entry.readable_at(now) => return Ok(Removal::NotDue),
                Some(_) => take_if_unleased(&mut index, handle),
            }
        };
        match removed {
            Ok(entry) => {
                remove_file(&entry.path).await?;
                Ok(Removal::Deleted)
            }
            Err(outcome) => Ok(outcome),
        }
    }

    /// Best-effort removal of every unleased artifact.  Leased artifacts are
    /// left in place and reported.
    #[instrument(skip(self))]
    pub async fn purge(&self) -> usize {
        let (victims, leased) = {
            let mut index = self.index.write();
            let handles: Vec<ArtifactHandle> = index.entries.keys().copied().collect();
            let mut victims = Vec::new();
            let mut leased = 0;
            for handle in handles {
                match take_if_unleased(&mut index, handle) {
                    Ok(entry) => victims.push(entry),
                    Err(_) => leased += 1,
                }
            }
            (victims, leased)
        };

        let mut removed = 0;
        for entry in victims {
            match remove_file(&entry.path).await {
                Ok(()) => removed += 1,
                Err(err) => warn!(
                    handle = %entry.artifact.handle,
                    error = %err,
                    "Failed to remove artifact during purge"
                ),
            }
        }
        if leased > 0 {
            warn!(leased, "Artifacts still leased during purge; left in place");
        }
        info!(removed, "Store purged");
        removed
    }

    pub fn stats(&self) -> StoreStats {
        let index = self.index.read();
        StoreStats {
            artifacts: index.entries.len(),
            bytes_in_use: index.used_bytes,
            capacity_bytes: self.capacity_bytes,
            active_readers: index.entries.values().map(Entry::active_readers).sum(),
        }
    }

    fn data_path(&self, handle: ArtifactHandle) -> PathBuf {
        self.root.join(format!("{handle}.{DATA_EXTENSION}"))
    }
}

/// Unlink an entry from the index when nobody holds a lease on it.
fn take_if_unleased(
    index: &mut Index,
    handle: ArtifactHandle,
) -> std::result::Result<Entry, Removal> {
    let readers = match index.entries.get(&handle) {
        None => return Err(Removal::Absent),
        Some(entry) => entry.active_readers(),
    };
    if readers > 0 {
        return Err(Removal::Deferred(readers));
    }
    let entry = index.entries.remove(&handle).ok_or(Removal::Absent)?;
    index.used_bytes = index.used_bytes.saturating_sub(entry.artifact.size_bytes);
    Ok(entry)
}

async fn write_atomically(partial: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(partial).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(partial, target).await
}

async fn remove_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(PexelError::Io(err)),
    }
}

/// Remove artifact and partial files from `dir`; other files are left alone.
async fn purge_directory(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let ours = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == DATA_EXTENSION || ext == PARTIAL_EXTENSION);
        if ours {
            remove_file(&path).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Capacity-type failures become `StorageFull`; anything else stays `Io`.
fn storage_error(err: std::io::Error) -> PexelError {
    match err.kind() {
        ErrorKind::StorageFull | ErrorKind::QuotaExceeded | ErrorKind::FileTooLarge => {
            PexelError::StorageFull(err.to_string())
        }
        _ => PexelError::Io(err),
    }
}

// ---------------------------------------------------------------------------
// Leases
// ---------------------------------------------------------------------------

struct ReaderGuard {
    readers: Arc<AtomicUsize>,
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.readers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A read lease on one artifact.
///
/// While any lease is alive the artifact's file is not removed.  The lease
/// is released when dropped, including on error paths and cancelled tasks.
pub struct ArtifactLease {
    artifact: Artifact,
    path: PathBuf,
    _guard: ReaderGuard,
}

impl std::fmt::Debug for ArtifactLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactLease")
            .field("handle", &self.artifact.handle)
            .field("path", &self.path)
            .finish()
    }
}

impl ArtifactLease {
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn handle(&self) -> ArtifactHandle {
        self.artifact.handle
    }

    /// Read the whole artifact into memory.
    pub async fn read_all(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    /// Open the artifact for streaming.  Keep the lease alive until the
    /// stream is finished.
    pub async fn open_file(&self) -> Result<tokio::fs::File> {
        Ok(tokio::fs::File::open(&self.path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::DeferralPolicy;
    use crate::clock::ManualClock;
    use chrono::TimeDelta;

    struct Fixture {
        _dir: tempfile::TempDir,
        clock: Arc<ManualClock>,
        store: Arc<ArtifactStore>,
    }

    async fn fixture(capacity: u64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            storage_dir: dir.path().to_path_buf(),
            store_capacity_bytes: capacity,
            max_upload_bytes: capacity,
            default_ttl_secs: 60,
            ..ServiceConfig::default()
        };
        let clock = Arc::new(ManualClock::default());
        let scheduler = Arc::new(ExpiryScheduler::new(
            DeferralPolicy::default(),
            clock.clone(),
        ));
        let store = ArtifactStore::open(&config, scheduler, clock.clone())
            .await
            .unwrap();
        Fixture {
            _dir: dir,
            clock,
            store,
        }
    }

    #[tokio::test]
    async fn put_then_get_returns_same_bytes() {
        let fx = fixture(1024).await;
        let artifact = fx
            .store
            .put(b"%PDF-1.7 body", MediaType::Pdf, PutOptions::default())
            .await
            .unwrap();

        assert_eq!(artifact.ttl_seconds, 60);
        assert_eq!(artifact.size_bytes, 13);
        assert_eq!(artifact.digest, digest::hash_bytes(b"%PDF-1.7 body"));
        assert!(fx.store.exists(artifact.handle));

        let lease = fx.store.get(artifact.handle).unwrap();
        assert_eq!(lease.read_all().await.unwrap(), b"%PDF-1.7 body");
        assert_eq!(fx.store.stats().active_readers, 1);
        drop(lease);
        assert_eq!(fx.store.stats().active_readers, 0);
    }

    #[tokio::test]
    async fn handles_are_distinct() {
        let fx = fixture(1024).await;
        let a = fx.store.put(b"a", MediaType::Pdf, PutOptions::default()).await.unwrap();
        let b = fx.store.put(b"a", MediaType::Pdf, PutOptions::default()).await.unwrap();
        assert_ne!(a.handle, b.handle);
    }

    #[tokio::test]
    async fn expired_artifact_is_not_found() {
        let fx = fixture(1024).await;
        let artifact = fx
            .store
            .put(b"x", MediaType::Png, PutOptions::ttl(10))
            .await
            .unwrap();

        fx.clock.advance(TimeDelta::seconds(9));
        assert!(fx.store.get(artifact.handle).is_ok());

        fx.clock.advance(TimeDelta::seconds(1));
        let err = fx.store.get(artifact.handle).unwrap_err();
        assert!(matches!(err, PexelError::NotFound(_)));
        assert!(!fx.store.exists(artifact.handle));
    }

    #[tokio::test]
    async fn unknown_handle_is_not_found() {
        let fx = fixture(1024).await;
        assert!(matches!(
            fx.store.get(ArtifactHandle::new()),
            Err(PexelError::NotFound(_))
        ));
        assert!(!fx.store.delete(ArtifactHandle::new()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_while_leased_is_deferred_to_the_sweep() {
        let fx = fixture(1024).await;
        let artifact = fx.store.put(b"data", MediaType::Pdf, PutOptions::default()).await.unwrap();

        let lease = fx.store.get(artifact.handle).unwrap();
        assert!(!fx.store.delete(artifact.handle).await.unwrap());
        assert!(matches!(fx.store.get(artifact.handle), Err(PexelError::NotFound(_))));
        assert_eq!(lease.read_all().await.unwrap(), b"data");

        // Due now, but the reader still holds it.
        let report = fx.store.scheduler().sweep(&fx.store).await;
        assert_eq!(report.deleted, 0);
        assert_eq!(fx.store.stats().artifacts, 1);

        drop(lease);
        fx.clock.advance(TimeDelta::seconds(5));
        let report = fx.store.scheduler().sweep(&fx.store).await;
        assert_eq!(report.deleted, 1);
        assert_eq!(fx.store.stats().bytes_in_use, 0);
        assert_eq!(fx.store.scheduler().pending(), 0);
    }

    #[tokio::test]
    async fn unleased_delete_is_immediate() {
        let fx = fixture(1024).await;
        let artifact = fx.store.put(b"data", MediaType::Pdf, PutOptions::default()).await.unwrap();
        assert!(fx.store.delete(artifact.handle).await.unwrap());
        assert!(!fx.store.exists(artifact.handle));
        assert_eq!(fx.store.stats().bytes_in_use, 0);
        assert_eq!(fx.store.scheduler().pending(), 0);
    }

    #[tokio::test]
    async fn capacity_limit_yields_storage_full() {
        let fx = fixture(10).await;
        fx.store.put(&[0; 6], MediaType::Pdf, PutOptions::default()).await.unwrap();
        let err = fx
            .store
            .put(&[0; 6], MediaType::Pdf, PutOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STORAGE_FULL");
        assert_eq!(fx.store.stats().artifacts, 1);
        assert_eq!(fx.store.stats().bytes_in_use, 6);
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let fx = fixture(10).await;
        let err = fx
            .store
            .put(b"x", MediaType::Pdf, PutOptions::ttl(0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn discard_hides_leased_artifact() {
        let fx = fixture(1024).await;
        let artifact = fx.store.put(b"input", MediaType::Pdf, PutOptions::default()).await.unwrap();

        let lease = fx.store.get(artifact.handle).unwrap();
        assert!(fx.store.discard(artifact.handle).await.unwrap());
        assert!(!fx.store.exists(artifact.handle));
        // The existing lease still reads the full content.
        assert_eq!(lease.read_all().await.unwrap(), b"input");
        drop(lease);

        let report = fx.store.scheduler().sweep(&fx.store).await;
        assert_eq!(report.deleted, 1);
        assert_eq!(fx.store.stats().artifacts, 0);
    }

    #[tokio::test]
    async fn extend_pushes_expiry_out() {
        let fx = fixture(1024).await;
        let artifact = fx.store.put(b"x", MediaType::Pdf, PutOptions::ttl(10)).await.unwrap();

        fx.clock.advance(TimeDelta::seconds(8));
        let extended = fx.store.extend(artifact.handle, 30).unwrap();
        assert_eq!(extended.ttl_seconds, 38);

        fx.clock.advance(TimeDelta::seconds(20));
        assert!(fx.store.exists(artifact.handle));
        let report = fx.store.scheduler().sweep(&fx.store).await;
        assert_eq!(report.deleted, 0);

        fx.clock.advance(TimeDelta::seconds(10));
        let report = fx.store.scheduler().sweep(&fx.store).await;
        assert_eq!(report.deleted, 1);
    }

    #[tokio::test]
    async fn extend_mid_second_never_shortens_the_new_ttl() {
        let fx = fixture(1024).await;
        let artifact = fx.store.put(b"x", MediaType::Pdf, PutOptions::ttl(10)).await.unwrap();

        fx.clock.advance(TimeDelta::milliseconds(8_900));
        let now = fx.clock.now();
        let extended = fx.store.extend(artifact.handle, 30).unwrap();
        assert_eq!(extended.ttl_seconds, 39);
        assert!(extended.expires_at() >= now + TimeDelta::seconds(30));

        fx.clock.advance(TimeDelta::seconds(30));
        assert!(fx.store.exists(artifact.handle));
    }

    #[tokio::test]
    async fn open_purges_leftover_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stale.bin"), b"old").unwrap();
        std::fs::write(dir.path().join("torn.part"), b"half").unwrap();
        std::fs::write(dir.path().join("README"), b"keep").unwrap();

        let config = ServiceConfig {
            storage_dir: dir.path().to_path_buf(),
            ..ServiceConfig::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let scheduler = Arc::new(ExpiryScheduler::new(DeferralPolicy::default(), clock.clone()));
        ArtifactStore::open(&config, scheduler, clock).await.unwrap();

        assert!(!dir.path().join("stale.bin").exists());
        assert!(!dir.path().join("torn.part").exists());
        assert!(dir.path().join("README").exists());
    }

    #[tokio::test]
    async fn purge_keeps_leased_artifacts() {
        let fx = fixture(1024).await;
        let kept = fx.store.put(b"kept", MediaType::Pdf, PutOptions::default()).await.unwrap();
        fx.store.put(b"gone", MediaType::Pdf, PutOptions::default()).await.unwrap();

        let lease = fx.store.get(kept.handle).unwrap();
        assert_eq!(fx.store.purge().await, 1);
        assert_eq!(fx.store.stats().artifacts, 1);
        assert_eq!(lease.read_all().await.unwrap(), b"kept");
    }
}
