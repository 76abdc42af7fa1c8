//! In-memory bridge fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    AdapterEvent, BridgeError, ByteStream, CatalogClient, FileMetadata, FileSystemAccess,
    HttpClient, HttpRequest, HttpResponse, MediaSessionSink, NowPlaying, PlaybackAdapter,
    PlaybackRequest,
};
use bytes::Bytes;
use core_async::io::AsyncWrite;
use core_async::sync::{broadcast, watch};
use core_async::time::{sleep, timeout, Duration};
use core_library::Track;
use core_playback::{PlaybackState, TransportHandle};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

pub const DATA_DIR: &str = "/data";

pub fn remote_track(id: &str) -> Track {
    Track::remote(id, format!("Song {id}"), "Artist").with_duration_ms(180_000)
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Waits for a published transport state matching `predicate`.
pub async fn wait_for_state(
    handle: &TransportHandle,
    predicate: impl FnMut(&PlaybackState) -> bool,
) -> PlaybackState {
    let mut rx = handle.subscribe();
    let state = timeout(Duration::from_secs(30), rx.wait_for(predicate))
        .await
        .expect("state not reached in time")
        .expect("transport stopped");
    state.clone()
}

// ============================================================================
// File system
// ============================================================================

type Files = Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>;

#[derive(Default)]
pub struct MemoryFileSystem {
    files: Files,
    dirs: Mutex<BTreeSet<PathBuf>>,
    undeletable: Mutex<HashSet<PathBuf>>,
    fail_writes: AtomicBool,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_file(&self, path: impl Into<PathBuf>, data: &[u8]) {
        self.files.lock().insert(path.into(), data.to_vec());
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.lock().contains_key(path.as_ref())
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }

    /// Makes every later delete of `path` fail with a permission error.
    pub fn refuse_delete(&self, path: impl Into<PathBuf>) {
        self.undeletable.lock().insert(path.into());
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> bridge_traits::error::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full").into());
        }
        Ok(())
    }
}

fn not_found(path: &Path) -> BridgeError {
    io::Error::new(io::ErrorKind::NotFound, path.display().to_string()).into()
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_data_directory(&self) -> bridge_traits::error::Result<PathBuf> {
        Ok(PathBuf::from(DATA_DIR))
    }

    async fn exists(&self, path: &Path) -> bridge_traits::error::Result<bool> {
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    async fn metadata(&self, path: &Path) -> bridge_traits::error::Result<FileMetadata> {
        if self.dirs.lock().contains(path) {
            return Ok(FileMetadata {
                size: 0,
                modified_at: None,
                is_directory: true,
            });
        }
        let size = self
            .files
            .lock()
            .get(path)
            .map(|data| data.len() as u64)
            .ok_or_else(|| not_found(path))?;
        Ok(FileMetadata {
            size,
            modified_at: None,
            is_directory: false,
        })
    }

    async fn create_dir_all(&self, path: &Path) -> bridge_traits::error::Result<()> {
        self.dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> bridge_traits::error::Result<Bytes> {
        self.files
            .lock()
            .get(path)
            .map(|data| Bytes::from(data.clone()))
            .ok_or_else(|| not_found(path))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> bridge_traits::error::Result<()> {
        self.check_writable()?;
        self.files.lock().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> bridge_traits::error::Result<()> {
        if self.undeletable.lock().contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "file locked").into());
        }
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn rename(&self, from: &Path, to: &Path) -> bridge_traits::error::Result<()> {
        let mut files = self.files.lock();
        let data = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> bridge_traits::error::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .lock()
            .keys()
            .filter(|file| file.parent() == Some(path))
            .cloned()
            .collect())
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> bridge_traits::error::Result<Box<dyn AsyncWrite + Send + Unpin>> {
        self.check_writable()?;
        self.files.lock().insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            files: self.files.clone(),
        }))
    }
}

struct MemoryWriter {
    path: PathBuf,
    files: Files,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.files
            .lock()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeBody {
    pub chunks: Vec<Bytes>,
    pub content_length: Option<u64>,
    /// Chunk index at which the connection drops
    pub fail_at: Option<usize>,
}

impl FakeBody {
    pub fn sized(chunks: usize, chunk_size: usize) -> Self {
        let chunks: Vec<Bytes> = (0..chunks)
            .map(|i| Bytes::from(vec![i as u8; chunk_size]))
            .collect();
        let total = chunks.iter().map(|c| c.len() as u64).sum();
        Self {
            chunks,
            content_length: Some(total),
            fail_at: None,
        }
    }

    pub fn with_content_length(mut self, length: Option<u64>) -> Self {
        self.content_length = length;
        self
    }

    pub fn failing_at(mut self, chunk: usize) -> Self {
        self.fail_at = Some(chunk);
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.chunks.iter().flat_map(|c| c.iter().copied()).collect()
    }
}

/// Serves registered bodies chunk by chunk.
///
/// After the first chunk every stream waits for the gate to be open, which
/// lets tests freeze transfers part way through.
pub struct FakeHttp {
    bodies: Mutex<HashMap<String, FakeBody>>,
    gate: watch::Sender<bool>,
    requests: AtomicUsize,
}

impl FakeHttp {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            bodies: Mutex::new(HashMap::new()),
            gate,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn serve(&self, url: impl Into<String>, body: FakeBody) {
        self.bodies.lock().insert(url.into(), body);
    }

    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, _request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
        Err(BridgeError::NotAvailable("execute".to_string()))
    }

    async fn download_stream(&self, url: &str) -> bridge_traits::error::Result<ByteStream> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| BridgeError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })?;

        let content_length = body.content_length;
        let gate = self.gate.subscribe();
        let chunks = futures::stream::unfold((0usize, body, gate), |(i, body, mut gate)| async move {
            if i >= body.chunks.len() {
                return None;
            }
            if i > 0 {
                let _ = gate.wait_for(|open| *open).await;
            }
            if body.fail_at == Some(i) {
                let end = body.chunks.len();
                return Some((
                    Err(BridgeError::Network("connection reset".to_string())),
                    (end, body, gate),
                ));
            }
            let chunk = body.chunks[i].clone();
            Some((Ok(chunk), (i + 1, body, gate)))
        })
        .boxed();

        Ok(ByteStream::new(content_length, chunks))
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Clone)]
enum Route {
    Delay(Duration),
    Fail(String),
    Url(String),
}

/// Resolves `id` to `https://cdn.test/{id}.mp3` unless told otherwise.
#[derive(Default)]
pub struct FakeCatalog {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_for(remote_id: &str) -> String {
        format!("https://cdn.test/{remote_id}.mp3")
    }

    pub fn delay(&self, remote_id: &str, delay: Duration) {
        self.routes
            .lock()
            .insert(remote_id.to_string(), Route::Delay(delay));
    }

    /// Resolves `remote_id` to `url` instead of the default.
    pub fn redirect(&self, remote_id: &str, url: &str) {
        self.routes
            .lock()
            .insert(remote_id.to_string(), Route::Url(url.to_string()));
    }

    pub fn fail(&self, remote_id: &str, reason: &str) {
        self.routes
            .lock()
            .insert(remote_id.to_string(), Route::Fail(reason.to_string()));
    }

    pub fn clear(&self, remote_id: &str) {
        self.routes.lock().remove(remote_id);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn resolve_url(&self, remote_id: &str) -> bridge_traits::error::Result<String> {
        self.calls.lock().push(remote_id.to_string());
        let route = self.routes.lock().get(remote_id).cloned();
        match route {
            Some(Route::Delay(delay)) => {
                sleep(delay).await;
                Ok(Self::url_for(remote_id))
            }
            Some(Route::Fail(reason)) => Err(BridgeError::OperationFailed(reason)),
            Some(Route::Url(url)) => Ok(url),
            None => Ok(Self::url_for(remote_id)),
        }
    }
}

// ============================================================================
// Playback engine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    Load(PlaybackRequest),
    Play,
    Pause,
    Seek(Duration),
    Stop,
}

/// Host engine stand-in that records every call.
///
/// With auto-ready on (the default), each load is answered with a
/// `Ready` event as a real engine would once buffered.
pub struct RecordingAdapter {
    calls: Mutex<Vec<AdapterCall>>,
    events: broadcast::Sender<AdapterEvent>,
    auto_ready: AtomicBool,
    fail_loads: AtomicBool,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            calls: Mutex::new(Vec::new()),
            events,
            auto_ready: AtomicBool::new(true),
            fail_loads: AtomicBool::new(false),
        }
    }

    pub fn set_auto_ready(&self, enabled: bool) {
        self.auto_ready.store(enabled, Ordering::SeqCst);
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn emit(&self, event: AdapterEvent) {
        let _ = self.events.send(event);
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().clone()
    }

    pub fn loads(&self) -> Vec<PlaybackRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                AdapterCall::Load(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &AdapterCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }
}

#[async_trait]
impl PlaybackAdapter for RecordingAdapter {
    async fn load(&self, request: PlaybackRequest) -> bridge_traits::error::Result<()> {
        self.calls.lock().push(AdapterCall::Load(request));
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("unsupported source".to_string()));
        }
        if self.auto_ready.load(Ordering::SeqCst) {
            self.emit(AdapterEvent::Ready {
                duration: Some(Duration::from_secs(180)),
            });
        }
        Ok(())
    }

    async fn play(&self) -> bridge_traits::error::Result<()> {
        self.calls.lock().push(AdapterCall::Play);
        Ok(())
    }

    async fn pause(&self) -> bridge_traits::error::Result<()> {
        self.calls.lock().push(AdapterCall::Pause);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> bridge_traits::error::Result<()> {
        self.calls.lock().push(AdapterCall::Seek(position));
        Ok(())
    }

    async fn stop(&self) -> bridge_traits::error::Result<()> {
        self.calls.lock().push(AdapterCall::Stop);
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<AdapterEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// Media session
// ============================================================================

/// Records what the host session was told; `None` marks a clear.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<Option<NowPlaying>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<Option<NowPlaying>> {
        self.updates.lock().clone()
    }

    pub fn last(&self) -> Option<Option<NowPlaying>> {
        self.updates.lock().last().cloned()
    }
}

#[async_trait]
impl MediaSessionSink for RecordingSink {
    async fn update_now_playing(&self, now_playing: NowPlaying) -> bridge_traits::error::Result<()> {
        self.updates.lock().push(Some(now_playing));
        Ok(())
    }

    async fn clear(&self) -> bridge_traits::error::Result<()> {
        self.updates.lock().push(None);
        Ok(())
    }
}
