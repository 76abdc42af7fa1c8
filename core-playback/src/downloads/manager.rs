//! # Download Manager
//!
//! Runs cancellable downloads with bounded parallelism and keeps the durable
//! completion record.
//!
//! Every request becomes one spawned worker, tracked in a map keyed by track
//! id together with its [`CancellationToken`]. Workers wait on a shared
//! semaphore, so at most `max_parallel` transfer at once and the rest sit in
//! QUEUED. A worker checks its token while waiting for a permit and between
//! chunks; on cancellation or failure it deletes its partial file before the
//! task leaves the active set.
//!
//! Completed downloads leave the active set and live on in the completion
//! record. Failed and cancelled tasks never stop the manager itself.

use crate::downloads::config::{DownloadConfig, FALLBACK_EXTENSION};
use crate::downloads::progress::{DownloadProgress, DownloadSubscription, ProgressThrottle};
use crate::downloads::record::{DownloadRecordStore, DownloadRecords};
use crate::downloads::task::{DownloadFailure, DownloadStatus, DownloadTask, FailureKind};
use crate::error::{PlaybackError, Result};
use crate::resolver::StreamResolver;
use bridge_traits::{BridgeError, FileSystemAccess, HttpClient};
use core_async::io::AsyncWriteExt;
use core_async::sync::{broadcast, CancellationToken, Mutex as AsyncMutex, Semaphore};
use core_async::task::{self, JoinHandle};
use core_library::{Track, TrackId};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::logging::{redact_url, strip_path};
use futures::future::{select, Either};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

const PROGRESS_CHANNEL_CAPACITY: usize = 128;

/// Offline download orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: DownloadConfig,
    http: Arc<dyn HttpClient>,
    fs: Arc<dyn FileSystemAccess>,
    resolver: StreamResolver,
    records: Arc<dyn DownloadRecordStore>,
    events: Option<EventBus>,
    permits: Arc<Semaphore>,
    active: Mutex<HashMap<TrackId, ActiveDownload>>,
    completed: Mutex<DownloadRecords>,
    /// Serializes record writes so the file always reflects the newest map
    record_lock: AsyncMutex<()>,
    directory: Mutex<Option<PathBuf>>,
    progress_tx: broadcast::Sender<DownloadProgress>,
    seq: AtomicU64,
}

struct ActiveDownload {
    task: DownloadTask,
    cancel: CancellationToken,
    /// Resolves to the status the task ended in
    worker: Option<JoinHandle<DownloadStatus>>,
}

/// How a worker run ended, short of success.
enum Interrupted {
    Cancelled,
    Failed(DownloadFailure),
}

impl From<DownloadFailure> for Interrupted {
    fn from(failure: DownloadFailure) -> Self {
        Interrupted::Failed(failure)
    }
}

fn classify(error: &BridgeError) -> FailureKind {
    match error {
        BridgeError::Io(_) => FailureKind::Io,
        _ => FailureKind::Network,
    }
}

fn bridge_failure(context: &str, error: &BridgeError) -> DownloadFailure {
    DownloadFailure {
        kind: classify(error),
        message: format!("{context}: {error}"),
    }
}

impl DownloadManager {
    pub fn new(
        config: DownloadConfig,
        http: Arc<dyn HttpClient>,
        fs: Arc<dyn FileSystemAccess>,
        resolver: StreamResolver,
        records: Arc<dyn DownloadRecordStore>,
        events: Option<EventBus>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(config.max_parallel)),
                config,
                http,
                fs,
                resolver,
                records,
                events,
                active: Mutex::new(HashMap::new()),
                completed: Mutex::new(DownloadRecords::new()),
                record_lock: AsyncMutex::new(()),
                directory: Mutex::new(None),
                progress_tx,
                seq: AtomicU64::new(0),
            }),
        })
    }

    /// Loads the completion record and reconciles it with the disk.
    ///
    /// Records whose file is gone are dropped. Leftover partial files from a
    /// previous run are deleted, since no worker can own them yet. A file the
    /// record points at is never treated as leftover.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let inner = &self.inner;
        let dir = inner.download_dir().await?;

        let loaded = inner.records.load().await?;
        let total = loaded.len();
        let mut kept = DownloadRecords::new();
        for (track_id, path) in loaded {
            match inner.fs.exists(&path).await {
                Ok(true) => {
                    kept.insert(track_id, path);
                }
                Ok(false) => {
                    warn!(track_id = %track_id, file = strip_path(&path.to_string_lossy()), "Downloaded file missing, dropping record");
                }
                Err(e) => {
                    warn!(track_id = %track_id, error = %e, "Could not check downloaded file, keeping record");
                    kept.insert(track_id, path);
                }
            }
        }
        let dropped = total - kept.len();
        *inner.completed.lock() = kept;
        if dropped > 0 {
            inner.persist().await?;
        }

        let mut orphans = 0usize;
        for entry in inner.fs.list_directory(&dir).await? {
            let is_partial = entry
                .file_name()
                .map(|name| name.to_string_lossy().ends_with(&inner.config.partial_suffix))
                .unwrap_or(false);
            if !is_partial || inner.is_recorded_file(&entry) {
                continue;
            }
            match inner.fs.delete_file(&entry).await {
                Ok(()) => orphans += 1,
                Err(e) => warn!(error = %e, "Failed to delete orphaned partial file"),
            }
        }

        info!(
            downloads = total - dropped,
            dropped_records = dropped,
            orphaned_partials = orphans,
            "Download manager initialized"
        );
        Ok(())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Starts (or retries) a download.
    ///
    /// - already in flight: returns the existing task untouched
    /// - already downloaded: returns a completed task
    /// - previously failed or cancelled: starts a new attempt from zero
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub fn request(&self, track: &Track) -> Result<DownloadTask> {
        let Some(remote_id) = track.remote_id() else {
            return Err(PlaybackError::InvalidRequest(format!(
                "{} is not a remote track",
                track.id
            )));
        };

        if let Some(path) = self.inner.completed.lock().get(&track.id) {
            debug!("Track already downloaded");
            return Ok(DownloadTask::completed(track.id.clone(), path.clone()));
        }

        let task = {
            let mut active = self.inner.active.lock();
            let attempt = match active.get(&track.id) {
                Some(existing) if existing.task.status.is_in_flight() => {
                    debug!(status = %existing.task.status, "Download already in flight");
                    return Ok(existing.task.clone());
                }
                Some(existing) => existing.task.attempt + 1,
                None => 1,
            };

            let task = DownloadTask::queued(track.id.clone(), attempt);
            let cancel = CancellationToken::new();
            let worker = task::spawn(run_worker(
                self.inner.clone(),
                track.id.clone(),
                remote_id.to_string(),
                cancel.clone(),
            ));
            active.insert(
                track.id.clone(),
                ActiveDownload {
                    task: task.clone(),
                    cancel,
                    worker: Some(worker),
                },
            );
            task
        };

        info!(attempt = task.attempt, "Download queued");
        self.inner.emit(DownloadEvent::Queued {
            track_id: track.id.to_string(),
        });
        self.inner.publish(&task);
        Ok(task)
    }

    /// Cancels a download and waits until the worker has cleaned up.
    ///
    /// Returns the status the task ended in. That is CANCELLED unless the
    /// worker had already finished its transfer, in which case it reports
    /// COMPLETED (or FAILED if the record could not be saved). A failed or
    /// cancelled task is simply dismissed from the active set.
    #[instrument(skip(self))]
    pub async fn cancel(&self, track_id: &TrackId) -> Result<DownloadStatus> {
        let worker = {
            let mut active = self.inner.active.lock();
            let Some(entry) = active.get_mut(track_id) else {
                return Err(PlaybackError::InvalidRequest(format!(
                    "no active download for {track_id}"
                )));
            };

            if entry.task.status.is_in_flight() {
                entry.cancel.cancel();
                entry.worker.take()
            } else {
                let status = entry.task.status;
                active.remove(track_id);
                debug!(status = %status, "Dismissed finished download");
                return Ok(DownloadStatus::Cancelled);
            }
        };

        let Some(worker) = worker else {
            return Ok(DownloadStatus::Cancelled);
        };
        match worker.await {
            Ok(status) => {
                if status != DownloadStatus::Cancelled {
                    debug!(status = %status, "Download finished before the cancel took effect");
                }
                Ok(status)
            }
            Err(e) => {
                error!(error = %e, "Download worker ended abnormally");
                Ok(DownloadStatus::Cancelled)
            }
        }
    }

    /// Removes a completed download.
    ///
    /// The record is dropped before the file; if the file cannot be deleted
    /// the record is put back so it never points at a half-deleted state.
    #[instrument(skip(self))]
    pub async fn delete(&self, track_id: &TrackId) -> Result<()> {
        let inner = &self.inner;
        let Some(path) = inner.completed.lock().remove(track_id) else {
            return Err(PlaybackError::NotDownloaded(track_id.to_string()));
        };

        if let Err(e) = inner.persist().await {
            inner.completed.lock().insert(track_id.clone(), path);
            return Err(e);
        }

        match inner.fs.delete_file(&path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!("Downloaded file already gone");
            }
            Err(e) => {
                warn!(error = %e, "Deleting downloaded file failed, restoring record");
                inner.completed.lock().insert(track_id.clone(), path);
                if let Err(persist_error) = inner.persist().await {
                    error!(error = %persist_error, "Restoring download record failed");
                }
                return Err(PlaybackError::DownloadIo {
                    track_id: track_id.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        info!("Download deleted");
        inner.emit(DownloadEvent::Deleted {
            track_id: track_id.to_string(),
        });
        Ok(())
    }

    /// Cancels every in-flight download and waits for the workers.
    pub async fn shutdown(&self) {
        let workers: Vec<JoinHandle<DownloadStatus>> = {
            let mut active = self.inner.active.lock();
            active
                .values_mut()
                .filter(|entry| entry.task.status.is_in_flight())
                .filter_map(|entry| {
                    entry.cancel.cancel();
                    entry.worker.take()
                })
                .collect()
        };
        let count = workers.len();
        for worker in workers {
            let _ = worker.await;
        }
        info!(cancelled = count, "Download manager shut down");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Queued, downloading and failed tasks, ordered by track id.
    pub fn list_active(&self) -> Vec<DownloadTask> {
        let mut tasks: Vec<DownloadTask> = self
            .inner
            .active
            .lock()
            .values()
            .map(|entry| entry.task.clone())
            .collect();
        tasks.sort_by(|a, b| a.track_id.cmp(&b.track_id));
        tasks
    }

    /// Current task for a track, including completed downloads.
    pub fn task(&self, track_id: &TrackId) -> Option<DownloadTask> {
        if let Some(entry) = self.inner.active.lock().get(track_id) {
            return Some(entry.task.clone());
        }
        self.local_path(track_id)
            .map(|path| DownloadTask::completed(track_id.clone(), path))
    }

    pub fn downloaded(&self) -> DownloadRecords {
        self.inner.completed.lock().clone()
    }

    pub fn local_path(&self, track_id: &TrackId) -> Option<PathBuf> {
        self.inner.completed.lock().get(track_id).cloned()
    }

    pub fn is_downloaded(&self, track_id: &TrackId) -> bool {
        self.inner.completed.lock().contains_key(track_id)
    }

    /// The track pointed at its offline copy when one exists.
    pub fn downloaded_track(&self, track: &Track) -> Track {
        match self.local_path(&track.id) {
            Some(path) => track.with_downloaded_file(path),
            None => track.clone(),
        }
    }

    pub fn subscribe(&self) -> DownloadSubscription {
        DownloadSubscription::new(self.inner.progress_tx.subscribe())
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Runs one download to its end and returns the status it finished in.
async fn run_worker(
    inner: Arc<Inner>,
    track_id: TrackId,
    remote_id: String,
    cancel: CancellationToken,
) -> DownloadStatus {
    let part_path = match inner.download_dir().await {
        Ok(dir) => dir.join(format!("{}{}", track_id.file_stem(), inner.config.partial_suffix)),
        Err(e) => {
            inner.finish_failed(&track_id, DownloadFailure::io(e.to_string()), None).await;
            return DownloadStatus::Failed;
        }
    };

    match transfer(&inner, &track_id, &remote_id, &cancel, &part_path).await {
        Ok(final_path) => inner.finish_completed(&track_id, final_path).await,
        Err(Interrupted::Cancelled) => {
            inner.finish_cancelled(&track_id, &part_path).await;
            DownloadStatus::Cancelled
        }
        Err(Interrupted::Failed(failure)) => {
            inner.finish_failed(&track_id, failure, Some(&part_path)).await;
            DownloadStatus::Failed
        }
    }
}

async fn transfer(
    inner: &Inner,
    track_id: &TrackId,
    remote_id: &str,
    cancel: &CancellationToken,
    part_path: &Path,
) -> std::result::Result<PathBuf, Interrupted> {
    // Wait for a slot, giving up immediately on cancellation.
    let permit = {
        let acquire = pin!(inner.permits.clone().acquire_owned());
        let cancelled = pin!(cancel.cancelled());
        match select(acquire, cancelled).await {
            Either::Left((Ok(permit), _)) => permit,
            Either::Left((Err(_), _)) => {
                return Err(DownloadFailure::io("download pool closed").into());
            }
            Either::Right(_) => return Err(Interrupted::Cancelled),
        }
    };

    if let Some(task) = inner.update(track_id, |task| task.status = DownloadStatus::Downloading) {
        inner.publish(&task);
    }
    inner.emit(DownloadEvent::Started {
        track_id: track_id.to_string(),
    });
    debug!(track_id = %track_id, "Download started");

    let url = {
        let resolve = pin!(inner.resolver.resolve(remote_id, inner.config.resolve_deadline));
        let cancelled = pin!(cancel.cancelled());
        match select(resolve, cancelled).await {
            Either::Left((resolution, _)) => resolution
                .into_result(remote_id, inner.config.resolve_deadline)
                .map_err(|e| DownloadFailure::network(e.to_string()))?,
            Either::Right(_) => return Err(Interrupted::Cancelled),
        }
    };
    debug!(track_id = %track_id, url = redact_url(&url), "Fetching");

    let mut stream = inner
        .http
        .download_stream(&url)
        .await
        .map_err(|e| bridge_failure("request failed", &e))?;
    let total = stream.content_length.unwrap_or(0);
    if let Some(task) = inner.update(track_id, |task| task.set_progress(0, total)) {
        inner.publish(&task);
    }

    let mut writer = inner
        .fs
        .open_write_stream(part_path)
        .await
        .map_err(|e| DownloadFailure::io(format!("open partial file: {e}")))?;

    let mut throttle = ProgressThrottle::new(inner.config.progress_interval);
    let mut bytes: u64 = 0;
    loop {
        let next = {
            let chunk = pin!(stream.chunks.next());
            let cancelled = pin!(cancel.cancelled());
            match select(chunk, cancelled).await {
                Either::Left((next, _)) => next,
                Either::Right(_) => return Err(Interrupted::Cancelled),
            }
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.map_err(|e| bridge_failure("transfer interrupted", &e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadFailure::io(format!("write partial file: {e}")))?;
        bytes += chunk.len() as u64;

        if throttle.ready() {
            let task = inner.update(track_id, |task| task.set_progress(bytes, total));
            if let Some(task) = task {
                let (speed, eta) = throttle.rate(task.bytes_downloaded, task.total_bytes);
                inner.publish_with_rate(&task, speed, eta);
                inner.emit(DownloadEvent::Progress {
                    track_id: track_id.to_string(),
                    bytes_downloaded: task.bytes_downloaded,
                    total_bytes: task.total_bytes,
                });
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(Interrupted::Cancelled);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadFailure::io(format!("flush partial file: {e}")))?;
    writer
        .shutdown()
        .await
        .map_err(|e| DownloadFailure::io(format!("close partial file: {e}")))?;
    drop(writer);

    if total > 0 && bytes < total {
        return Err(DownloadFailure::network(format!(
            "connection closed after {bytes} of {total} bytes"
        ))
        .into());
    }
    inner.update(track_id, |task| task.set_progress(bytes, total));

    let final_path =
        part_path.with_file_name(final_file_name(track_id, &url, &inner.config.partial_suffix));
    inner
        .fs
        .rename(part_path, &final_path)
        .await
        .map_err(|e| DownloadFailure::io(format!("finalize file: {e}")))?;

    drop(permit);
    Ok(final_path)
}

/// Name of the finished file. It never carries the partial suffix, so
/// startup cleanup cannot mistake it for a leftover.
fn final_file_name(track_id: &TrackId, url: &str, partial_suffix: &str) -> String {
    let stem = track_id.file_stem();
    let name = format!("{stem}.{}", extension_for(url));
    if name.ends_with(partial_suffix) {
        format!("{stem}.{FALLBACK_EXTENSION}")
    } else {
        name
    }
}

/// File extension taken from the URL path, `audio` when there is none.
fn extension_for(url: &str) -> String {
    let path = redact_url(url);
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => FALLBACK_EXTENSION.to_string(),
    }
}

impl Inner {
    async fn download_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = self.directory.lock().clone() {
            return Ok(dir);
        }
        let dir = self
            .fs
            .get_data_directory()
            .await?
            .join(&self.config.directory);
        self.fs.create_dir_all(&dir).await?;
        *self.directory.lock() = Some(dir.clone());
        Ok(dir)
    }

    fn is_recorded_file(&self, path: &Path) -> bool {
        self.completed.lock().values().any(|recorded| recorded == path)
    }

    async fn persist(&self) -> Result<()> {
        let _guard = self.record_lock.lock().await;
        let snapshot = self.completed.lock().clone();
        self.records.save(&snapshot).await
    }

    /// Applies `f` to the active task and returns the updated copy.
    fn update(&self, track_id: &TrackId, f: impl FnOnce(&mut DownloadTask)) -> Option<DownloadTask> {
        let mut active = self.active.lock();
        let entry = active.get_mut(track_id)?;
        f(&mut entry.task);
        Some(entry.task.clone())
    }

    async fn finish_completed(&self, track_id: &TrackId, path: PathBuf) -> DownloadStatus {
        self.completed.lock().insert(track_id.clone(), path.clone());
        if let Err(e) = self.persist().await {
            error!(track_id = %track_id, error = %e, "Saving download record failed");
            self.completed.lock().remove(track_id);
            if let Err(e) = self.fs.delete_file(&path).await {
                warn!(error = %e, "Removing unrecorded download failed");
            }
            let failure = DownloadFailure::io(format!("record completion: {e}"));
            self.finish_failed(track_id, failure, None).await;
            return DownloadStatus::Failed;
        }

        let task = self.active.lock().remove(track_id).map(|entry| {
            let mut task = entry.task;
            task.status = DownloadStatus::Completed;
            task.local_path = Some(path.clone());
            task.failure = None;
            task
        });

        info!(track_id = %track_id, file = strip_path(&path.to_string_lossy()), "Download completed");
        if let Some(task) = task {
            self.publish(&task);
        }
        self.emit(DownloadEvent::Completed {
            track_id: track_id.to_string(),
            path: path.to_string_lossy().into_owned(),
        });
        DownloadStatus::Completed
    }

    async fn finish_cancelled(&self, track_id: &TrackId, part_path: &Path) {
        self.remove_partial(part_path).await;

        let task = self.active.lock().remove(track_id).map(|entry| {
            let mut task = entry.task;
            task.status = DownloadStatus::Cancelled;
            task
        });

        info!(track_id = %track_id, "Download cancelled");
        if let Some(task) = task {
            self.publish(&task);
        }
        self.emit(DownloadEvent::Cancelled {
            track_id: track_id.to_string(),
        });
    }

    async fn finish_failed(
        &self,
        track_id: &TrackId,
        failure: DownloadFailure,
        part_path: Option<&Path>,
    ) {
        if let Some(part_path) = part_path {
            self.remove_partial(part_path).await;
        }

        warn!(
            track_id = %track_id,
            kind = failure.kind.as_str(),
            error = %failure.message,
            "Download failed"
        );
        let task = self.update(track_id, |task| {
            task.status = DownloadStatus::Failed;
            task.failure = Some(failure.clone());
        });
        if let Some(task) = task {
            self.publish(&task);
        }
        self.emit(DownloadEvent::Failed {
            track_id: track_id.to_string(),
            kind: failure.kind.as_str().to_string(),
            message: failure.message,
        });
    }

    async fn remove_partial(&self, part_path: &Path) {
        match self.fs.delete_file(part_path).await {
            Ok(()) => debug!("Partial file removed"),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(error = %e, "Failed to remove partial file"),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, task: &DownloadTask) {
        let _ = self
            .progress_tx
            .send(DownloadProgress::from_task(task, self.next_seq()));
    }

    fn publish_with_rate(
        &self,
        task: &DownloadTask,
        speed: Option<f64>,
        eta: Option<core_async::time::Duration>,
    ) {
        let mut progress = DownloadProgress::from_task(task, self.next_seq());
        progress.bytes_per_second = speed;
        progress.eta = eta;
        let _ = self.progress_tx.send(progress);
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Download(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_url() {
        assert_eq!(extension_for("https://cdn.example/a/b/track.MP3?sig=1"), "mp3");
        assert_eq!(extension_for("https://cdn.example/stream/42"), "audio");
        assert_eq!(extension_for("https://cdn.example/videoplayback?id=.webm"), "audio");
        assert_eq!(extension_for("https://cdn.example/a.toolongext"), "audio");
    }

    #[test]
    fn test_final_name_never_takes_partial_suffix() {
        let id = TrackId::remote("p");
        assert_eq!(
            final_file_name(&id, "https://cdn.example/p.part", ".part"),
            "remote_3Ap.audio"
        );
        assert_eq!(
            final_file_name(&id, "https://cdn.example/p.PART?sig=1", ".part"),
            "remote_3Ap.audio"
        );
        assert_eq!(
            final_file_name(&id, "https://cdn.example/p.ogg", ".part"),
            "remote_3Ap.ogg"
        );
    }

    #[test]
    fn test_bridge_errors_classified() {
        let io = BridgeError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(classify(&io), FailureKind::Io);
        assert_eq!(
            classify(&BridgeError::Network("reset".into())),
            FailureKind::Network
        );
    }
}
