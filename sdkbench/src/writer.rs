//! Asynchronous results sink.
//!
//! Workers must never wait on disk, so metrics go through a bounded queue: a full queue drops
//! the metric (and counts it) instead of applying backpressure to the load generator. A single
//! task drains the queue and appends one JSON object per line, flushing each line.
use crate::error::WriterError;
use async_channel::{bounded, Receiver, Sender, TrySendError};
use sdkbench_core::{
    sampled_sequence, ExecutionMetric, WRITER_LOG_BATCH, WRITER_LOG_INTERVAL, WRITER_POLL_TIMEOUT,
};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Default)]
struct WriterStats {
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Counts reported once the writer has been shut down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    pub written: u64,
    pub dropped: u64,
    pub failed: u64,
    /// The writer did not drain within the join timeout and was aborted.
    pub timed_out: bool,
}

/// Cloneable, non-blocking submission side of a [`MetricsWriter`].
#[derive(Clone)]
pub struct MetricsSender {
    tx: Sender<ExecutionMetric>,
    stats: Arc<WriterStats>,
}

impl MetricsSender {
    /// Enqueue without waiting. Returns `false` if the metric was dropped.
    pub fn submit(&self, metric: ExecutionMetric) -> bool {
        let (metric, reason) = match self.tx.try_send(metric) {
            Ok(()) => return true,
            Err(TrySendError::Full(metric)) => (metric, "queue full"),
            Err(TrySendError::Closed(metric)) => (metric, "writer stopped"),
        };

        let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        #[cfg(feature = "metrics")]
        metrics::counter!("sdkbench_dropped_metrics", "sdk_type" => metric.sdk_type().as_str())
            .increment(1);
        if sampled_sequence(dropped) {
            warn!(
                "Dropping result #{} ({reason}); {dropped} dropped so far",
                metric.sequence_number()
            );
        }
        false
    }
}

pub struct MetricsWriter {
    sender: MetricsSender,
    rx: Receiver<ExecutionMetric>,
    task: JoinHandle<()>,
}

impl MetricsWriter {
    /// Create (truncate) `path`, creating parent directories, and start the writer task.
    ///
    /// Failing to open the file is fatal: nothing of the phase could be persisted.
    pub async fn create(path: &Path, capacity: usize) -> Result<Self, WriterError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| WriterError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let file = tokio::fs::File::create(path)
            .await
            .map_err(|source| WriterError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Metrics writer started for {}", path.display());
        Ok(Self::spawn(file, capacity))
    }

    /// Start a writer over an arbitrary sink.
    pub fn spawn<W>(sink: W, capacity: usize) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = bounded(capacity.max(1));
        let stats = Arc::new(WriterStats::default());
        let task = tokio::spawn(write_loop(rx.clone(), sink, stats.clone()));

        Self {
            sender: MetricsSender { tx, stats },
            rx,
            task,
        }
    }

    pub fn sender(&self) -> MetricsSender {
        self.sender.clone()
    }

    pub fn submit(&self, metric: ExecutionMetric) -> bool {
        self.sender.submit(metric)
    }

    /// Stop accepting metrics. Already queued metrics are still written.
    pub fn stop(&self) {
        if self.sender.tx.close() {
            info!(
                "Stopping metrics writer ({} queued, {} written)",
                self.queue_len(),
                self.written_count()
            );
        }
    }

    /// Stop, then wait up to `timeout` for the queue to drain.
    pub async fn finish(mut self, timeout: Duration) -> WriterReport {
        self.stop();

        let timed_out = match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) => false,
            Ok(Err(err)) => {
                error!("Metrics writer task failed: {err}");
                false
            }
            Err(_) => {
                warn!(
                    "Metrics writer did not drain within {}, aborting with {} queued",
                    humantime::format_duration(timeout),
                    self.queue_len()
                );
                self.task.abort();
                true
            }
        };

        WriterReport {
            written: self.written_count(),
            dropped: self.dropped_count(),
            failed: self.failed_count(),
            timed_out,
        }
    }

    pub fn written_count(&self) -> u64 {
        self.sender.stats.written.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.sender.stats.dropped.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.sender.stats.failed.load(Ordering::Relaxed)
    }

    pub fn queue_len(&self) -> usize {
        self.rx.len()
    }
}

async fn write_loop<W>(rx: Receiver<ExecutionMetric>, mut sink: W, stats: Arc<WriterStats>)
where
    W: AsyncWrite + Unpin,
{
    let mut last_log = Instant::now();
    let mut since_log = 0u64;

    loop {
        let metric = match tokio::time::timeout(WRITER_POLL_TIMEOUT, rx.recv()).await {
            Ok(Ok(metric)) => metric,
            // Closed and empty: everything submitted has been handled.
            Ok(Err(_)) => break,
            Err(_) => {
                if stats.written.load(Ordering::Relaxed) > 0 {
                    trace!("Metrics writer idle ({} queued)", rx.len());
                }
                continue;
            }
        };

        if let Err(err) = write_line(&mut sink, &metric).await {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                "Failed to write result #{}: {err}",
                metric.sequence_number()
            );
            continue;
        }

        let count = stats.written.fetch_add(1, Ordering::Relaxed) + 1;
        since_log += 1;
        if count <= 10 {
            debug!("Wrote result #{count}");
        }

        let elapsed = last_log.elapsed();
        if count % WRITER_LOG_BATCH == 0 || elapsed >= WRITER_LOG_INTERVAL {
            info!(
                "Metrics writer: {count} written, {} queued, {:.2} results/sec",
                rx.len(),
                since_log as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
            );
            last_log = Instant::now();
            since_log = 0;
        }
    }

    if let Err(err) = sink.shutdown().await {
        error!("Failed to close results sink: {err}");
    }

    info!(
        "Metrics writer completed: {} written, {} dropped, {} failed",
        stats.written.load(Ordering::Relaxed),
        stats.dropped.load(Ordering::Relaxed),
        stats.failed.load(Ordering::Relaxed)
    );
}

async fn write_line<W>(sink: &mut W, metric: &ExecutionMetric) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(metric)?;
    line.push(b'\n');
    sink.write_all(&line).await?;
    // Flushed per line so a crash loses at most the record in flight.
    sink.flush().await
}
