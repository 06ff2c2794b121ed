use crate::analytics::AnalyticsStore;
use crate::error::PersistError;
use chronochat_types::{RequestLog, SessionRecord, UsageIncrement};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One write destined for the analytics store
#[derive(Debug, Clone)]
pub enum AnalyticsEvent {
    Usage(UsageIncrement),
    Request(RequestLog),
    Session(SessionRecord),
}

impl AnalyticsEvent {
    fn kind(&self) -> &'static str {
        match self {
            AnalyticsEvent::Usage(_) => "usage",
            AnalyticsEvent::Request(_) => "request",
            AnalyticsEvent::Session(_) => "session",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsWriterConfig {
    /// Bounded queue size; events beyond it are dropped
    pub capacity: usize,
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Bound on a single store write; expiry counts as a transient failure
    pub op_timeout: Duration,
}

impl Default for AnalyticsWriterConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_attempts: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            op_timeout: Duration::from_secs(5),
        }
    }
}

/// Background writer that keeps analytics off the request path
///
/// `enqueue` never blocks. Usage increments carry an idempotency key, so
/// retrying a write whose outcome is unknown cannot double count.
pub struct AnalyticsWriter {
    tx: mpsc::Sender<AnalyticsEvent>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AnalyticsWriter {
    pub fn start(store: Arc<dyn AnalyticsStore>, config: AnalyticsWriterConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(run_worker(store, config, rx, shutdown.clone()));

        Self {
            tx,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue an event; false when it was dropped
    pub fn enqueue(&self, event: AnalyticsEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                error!(kind = event.kind(), "Analytics queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                error!(kind = event.kind(), "Analytics writer stopped, dropping event");
                false
            }
        }
    }

    /// Stop accepting events and wait until the queue is drained
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Analytics worker panicked");
            }
        }
    }
}

async fn run_worker(
    store: Arc<dyn AnalyticsStore>,
    config: AnalyticsWriterConfig,
    mut rx: mpsc::Receiver<AnalyticsEvent>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => deliver(store.as_ref(), &config, event).await,
                None => break,
            },
            _ = shutdown.cancelled() => {
                rx.close();
                let mut drained = 0usize;
                while let Some(event) = rx.recv().await {
                    deliver(store.as_ref(), &config, event).await;
                    drained += 1;
                }
                info!(drained, "Analytics writer drained");
                break;
            }
        }
    }
}

async fn deliver(store: &dyn AnalyticsStore, config: &AnalyticsWriterConfig, event: AnalyticsEvent) {
    let mut backoff = config.base_backoff;
    for attempt in 1..=config.max_attempts.max(1) {
        let written = match tokio::time::timeout(config.op_timeout, write(store, &event)).await {
            Ok(result) => result,
            Err(_) => Err(PersistError::Timeout(format!("analytics {} write", event.kind()))),
        };
        match written {
            Ok(()) => return,
            Err(e) if attempt < config.max_attempts && e.is_transient() => {
                warn!(kind = event.kind(), attempt, error = %e, "Analytics write failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.max_backoff);
            }
            Err(e) => {
                error!(kind = event.kind(), attempt, error = %e, "Analytics write abandoned");
                return;
            }
        }
    }
}

async fn write(store: &dyn AnalyticsStore, event: &AnalyticsEvent) -> Result<(), PersistError> {
    match event {
        AnalyticsEvent::Usage(increment) => {
            let applied = store.increment_usage(increment).await?;
            if !applied {
                debug!(key = %increment.idempotency_key, "Duplicate usage increment ignored");
            }
            Ok(())
        }
        AnalyticsEvent::Request(log) => store.record_request(log).await,
        AnalyticsEvent::Session(session) => store.touch_session(session).await,
    }
}
