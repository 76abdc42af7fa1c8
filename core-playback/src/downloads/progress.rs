//! Download progress notifications.
//!
//! Byte progress is throttled per task by [`ProgressThrottle`]; status
//! changes are always sent. Subscribers only care about the newest value per
//! task, so [`DownloadSubscription`] coalesces whatever it has fallen behind
//! on instead of treating a lagged channel as an error.

use crate::downloads::task::{DownloadFailure, DownloadStatus, DownloadTask};
use core_async::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use core_async::time::{Duration, Instant};
use core_library::TrackId;
use std::collections::HashMap;

/// One progress notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub track_id: TrackId,
    pub status: DownloadStatus,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
    /// Manager-wide, strictly increasing
    pub seq: u64,
    pub bytes_per_second: Option<f64>,
    pub eta: Option<Duration>,
    pub failure: Option<DownloadFailure>,
}

impl DownloadProgress {
    pub fn from_task(task: &DownloadTask, seq: u64) -> Self {
        Self {
            track_id: task.track_id.clone(),
            status: task.status,
            bytes_downloaded: task.bytes_downloaded,
            total_bytes: task.total_bytes,
            seq,
            bytes_per_second: None,
            eta: None,
            failure: task.failure.clone(),
        }
    }

    pub fn fraction(&self) -> Option<f64> {
        (self.total_bytes > 0).then(|| self.bytes_downloaded as f64 / self.total_bytes as f64)
    }
}

/// Per-task emission limiter plus transfer-rate estimate.
#[derive(Debug)]
pub(crate) struct ProgressThrottle {
    interval: Duration,
    started: Instant,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            started: Instant::now(),
            last_emit: None,
        }
    }

    /// `true` when enough time has passed since the last emitted update.
    pub(crate) fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    /// Average rate since the transfer started, and the time left at that rate.
    pub(crate) fn rate(&self, bytes: u64, total: u64) -> (Option<f64>, Option<Duration>) {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed <= 0.0 || bytes == 0 {
            return (None, None);
        }
        let speed = bytes as f64 / elapsed;
        let eta = (total > bytes).then(|| Duration::from_secs_f64((total - bytes) as f64 / speed));
        (Some(speed), eta)
    }
}

/// Receiver side of the progress feed.
pub struct DownloadSubscription {
    rx: broadcast::Receiver<DownloadProgress>,
    latest: HashMap<TrackId, DownloadProgress>,
}

impl DownloadSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<DownloadProgress>) -> Self {
        Self {
            rx,
            latest: HashMap::new(),
        }
    }

    /// Next update, or `None` once the manager is gone. Updates missed while
    /// lagging are skipped; the next one received supersedes them.
    pub async fn recv(&mut self) -> Option<DownloadProgress> {
        loop {
            match self.rx.recv().await {
                Ok(progress) => {
                    self.remember(&progress);
                    return Some(progress);
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Takes everything already buffered and returns the newest update per
    /// task, ordered by track id.
    pub fn drain(&mut self) -> Vec<DownloadProgress> {
        let mut fresh: HashMap<TrackId, DownloadProgress> = HashMap::new();
        loop {
            match self.rx.try_recv() {
                Ok(progress) => {
                    self.remember(&progress);
                    fresh.insert(progress.track_id.clone(), progress);
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        let mut updates: Vec<DownloadProgress> = fresh.into_values().collect();
        updates.sort_by(|a, b| a.track_id.cmp(&b.track_id));
        updates
    }

    /// Newest update seen so far for a task.
    pub fn latest(&self, track_id: &TrackId) -> Option<&DownloadProgress> {
        self.latest.get(track_id)
    }

    fn remember(&mut self, progress: &DownloadProgress) {
        let newer = self
            .latest
            .get(&progress.track_id)
            .map_or(true, |seen| seen.seq < progress.seq);
        if newer {
            self.latest
                .insert(progress.track_id.clone(), progress.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: &str, bytes: u64, seq: u64) -> DownloadProgress {
        let mut task = DownloadTask::queued(TrackId::remote(id), 1);
        task.status = DownloadStatus::Downloading;
        task.set_progress(bytes, 1000);
        DownloadProgress::from_task(&task, seq)
    }

    #[tokio::test]
    async fn test_drain_coalesces_to_latest() {
        let (tx, rx) = broadcast::channel(16);
        let mut subscription = DownloadSubscription::new(rx);

        tx.send(update("a", 100, 1)).unwrap();
        tx.send(update("b", 50, 2)).unwrap();
        tx.send(update("a", 300, 3)).unwrap();

        let updates = subscription.drain();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].bytes_downloaded, 300);
        assert_eq!(updates[1].bytes_downloaded, 50);
        assert_eq!(
            subscription.latest(&TrackId::remote("a")).unwrap().seq,
            3
        );
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_going() {
        let (tx, rx) = broadcast::channel(2);
        let mut subscription = DownloadSubscription::new(rx);

        for seq in 1..=5 {
            tx.send(update("a", seq * 100, seq)).unwrap();
        }

        let progress = subscription.recv().await.unwrap();
        assert!(progress.seq >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_limits_rate() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(250));
        assert!(throttle.ready());
        assert!(!throttle.ready());

        core_async::time::sleep(Duration::from_millis(260)).await;
        assert!(throttle.ready());

        let (speed, eta) = throttle.rate(500, 1000);
        assert!(speed.unwrap() > 0.0);
        assert!(eta.is_some());
    }
}
