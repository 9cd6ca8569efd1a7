//! Buffered decision logger: batches, periodic flush, bounded retry (§4.10).

use crate::entry::DecisionLogEntry;
use crate::sink::DecisionSink;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, warn};

/// Batching, flush, and retry knobs for the decision logger (§4.10).
#[derive(Debug, Clone)]
pub struct DecisionLoggerConfig {
    pub enabled: bool,
    pub audit_enabled: bool,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub deny_only: bool,
    pub include_subject_snapshot: bool,
}

impl Default for DecisionLoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            audit_enabled: false,
            batch_size: 100,
            flush_interval_ms: 5000,
            deny_only: false,
            include_subject_snapshot: false,
        }
    }
}

/// Lifecycle states from §4.10: `Idle -> Running -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoggerState {
    Idle = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl From<u8> for LoggerState {
    fn from(v: u8) -> Self {
        match v {
            1 => LoggerState::Running,
            2 => LoggerState::Draining,
            3 => LoggerState::Stopped,
            _ => LoggerState::Idle,
        }
    }
}

const MAX_FLUSH_RETRIES: u32 = 3;

/// Buffers decision log entries and flushes them to a primary sink (and, when
/// `audit_enabled`, a parallel compliance sink) on a periodic `tokio` task.
pub struct DecisionLogger {
    config: Mutex<DecisionLoggerConfig>,
    sink: Arc<dyn DecisionSink>,
    audit_sink: Option<Arc<dyn DecisionSink>>,
    buffer: AsyncMutex<Vec<DecisionLogEntry>>,
    state: AtomicU8,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl DecisionLogger {
    pub fn new(
        config: DecisionLoggerConfig,
        sink: Arc<dyn DecisionSink>,
        audit_sink: Option<Arc<dyn DecisionSink>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(config),
            sink,
            audit_sink,
            buffer: AsyncMutex::new(Vec::new()),
            state: AtomicU8::new(LoggerState::Idle as u8),
            flush_task: Mutex::new(None),
        })
    }

    pub fn state(&self) -> LoggerState {
        LoggerState::from(self.state.load(Ordering::SeqCst))
    }

    fn config_snapshot(&self) -> DecisionLoggerConfig {
        self.config.lock().expect("decision logger config lock poisoned").clone()
    }

    pub fn set_config(&self, config: DecisionLoggerConfig) {
        *self.config.lock().expect("decision logger config lock poisoned") = config;
    }

    /// Start the periodic flusher. A no-op if already running.
    pub fn start(self: &Arc<Self>) {
        if self.state() == LoggerState::Running {
            return;
        }
        self.state.store(LoggerState::Running as u8, Ordering::SeqCst);
        let this = self.clone();
        let interval_ms = self.config_snapshot().flush_interval_ms;
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(interval_ms.max(1)));
            loop {
                ticker.tick().await;
                if this.state() != LoggerState::Running {
                    break;
                }
                this.flush_once().await;
            }
        });
        *self.flush_task.lock().expect("decision logger task lock poisoned") = Some(handle);
    }

    /// Buffer one decision. Fire-and-forget from the caller's perspective (§4.9 step
    /// 7): drops silently when disabled, and drops allows when `deny_only` is set.
    pub async fn record(&self, entry: DecisionLogEntry) {
        let config = self.config_snapshot();
        if !config.enabled {
            return;
        }
        if config.deny_only && entry.decision.allowed {
            return;
        }
        let entry = if config.include_subject_snapshot { entry } else { strip_snapshot(entry) };
        let mut buffer = self.buffer.lock().await;
        buffer.push(entry);
        if buffer.len() >= config.batch_size {
            let batch = std::mem::take(&mut *buffer);
            drop(buffer);
            self.flush_batch(batch).await;
        }
    }

    /// Drain the buffer and flush it now, regardless of `batch_size`.
    pub async fn flush_once(&self) {
        let batch = {
            let mut buffer = self.buffer.lock().await;
            if buffer.is_empty() {
                return;
            }
            std::mem::take(&mut *buffer)
        };
        self.flush_batch(batch).await;
    }

    async fn flush_batch(&self, batch: Vec<DecisionLogEntry>) {
        if batch.is_empty() {
            return;
        }
        let mut attempt = 0;
        let mut pending = batch;
        loop {
            match self.sink.write_batch(&pending).await {
                Ok(()) => {
                    if self.config_snapshot().audit_enabled {
                        if let Some(audit) = &self.audit_sink {
                            if let Err(e) = audit.write_batch(&pending).await {
                                warn!(error = %e, "audit sink flush failed; primary sink already succeeded");
                            }
                        }
                    }
                    return;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_FLUSH_RETRIES {
                        error!(error = %e, batch_size = pending.len(), "decision log flush exhausted retries, dropping batch");
                        return;
                    }
                    warn!(error = %e, attempt, "decision log flush failed, retrying");
                }
            }
        }
    }

    /// Drain the buffer, stop the periodic flusher, and move to `Stopped`. Final:
    /// calling `start()` again after `shutdown()` is not supported.
    pub async fn shutdown(self: &Arc<Self>) {
        self.state.store(LoggerState::Draining as u8, Ordering::SeqCst);
        if let Some(handle) = self.flush_task.lock().expect("decision logger task lock poisoned").take() {
            handle.abort();
        }
        self.flush_once().await;
        self.state.store(LoggerState::Stopped as u8, Ordering::SeqCst);
    }
}

fn strip_snapshot(mut entry: DecisionLogEntry) -> DecisionLogEntry {
    entry.subject_snapshot = None;
    entry
}
