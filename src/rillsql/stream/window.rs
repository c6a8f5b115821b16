//! Time-window operator.
//!
//! Buffers incoming records and flushes them as [`WindowBatchSet`]s when a
//! trigger fires. Triggering is a periodic ticker in processing-time mode
//! (per-tuple for sliding windows, plus a gap timeout for session windows)
//! and watermark-driven in event-time mode. The eviction core is shared:
//! `WindowState::scan` decides which buffered records enter the result and
//! which survive for the next trigger.

use crate::rillsql::sql::ast::{WindowKind, WindowSpec};
use crate::rillsql::sql::execution::types::{StreamData, StreamRecord, WindowBatchSet};
use crate::rillsql::stream::barrier::BarrierHandler;
use crate::rillsql::stream::config::StreamConfig;
use crate::rillsql::stream::context::StreamContext;
use crate::rillsql::stream::envelope::StreamEnvelope;
use crate::rillsql::stream::error::{StreamError, StreamResult};
use crate::rillsql::stream::operator::broadcast;
use crate::rillsql::stream::watermark::WatermarkGenerator;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant};

/// What drives window triggering.
#[derive(Debug, Clone)]
pub enum TriggerMode {
    /// Wall-clock tickers; record timestamps are arrival times.
    ProcessingTime,
    /// Watermark-driven; records carry event timestamps and may arrive out
    /// of order within the tolerance.
    EventTime {
        late_tolerance_ms: i64,
        streams: Vec<String>,
    },
}

impl TriggerMode {
    fn is_event_time(&self) -> bool {
        matches!(self, TriggerMode::EventTime { .. })
    }
}

/// Buffer plus trigger bookkeeping, separated from the channel plumbing so
/// eviction is testable without a running clock.
#[derive(Debug)]
pub struct WindowState {
    spec: WindowSpec,
    event_time: bool,
    drift_warn_ms: i64,
    buffer: Vec<Arc<StreamRecord>>,
    last_trigger_ms: Option<i64>,
}

impl WindowState {
    pub fn new(spec: WindowSpec, event_time: bool, drift_warn_ms: i64) -> Self {
        WindowState {
            spec,
            event_time,
            drift_warn_ms,
            buffer: Vec::new(),
            last_trigger_ms: None,
        }
    }

    pub fn ingest(&mut self, record: Arc<StreamRecord>) {
        self.buffer.push(record);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffered_timestamps(&self) -> Vec<i64> {
        self.buffer.iter().map(|r| r.timestamp).collect()
    }

    fn first_buffered_ts(&self) -> Option<i64> {
        self.buffer.first().map(|r| r.timestamp)
    }

    /// Record a trigger without scanning. Used when a session ticker fires
    /// for a buffer that belongs entirely to the next session.
    fn mark_trigger(&mut self, trigger_ms: i64) {
        self.last_trigger_ms = Some(trigger_ms);
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.last_trigger_ms = None;
    }

    /// Jitter compensation between consecutive triggers. Unbounded on the
    /// first trigger so the initial window keeps everything; afterwards the
    /// drift beyond the expected hop interval in processing time, zero in
    /// event time and for per-tuple triggering.
    fn cal_delta(&self, trigger_ms: i64) -> i64 {
        match self.last_trigger_ms {
            None => i64::MAX / 2,
            Some(last) => {
                if !self.event_time && self.spec.kind == WindowKind::Hopping {
                    let delta = (trigger_ms - last) - self.spec.interval();
                    if delta > self.drift_warn_ms {
                        log::warn!(
                            "window trigger drifted {}ms past the expected interval",
                            delta
                        );
                    }
                    delta
                } else {
                    0
                }
            }
        }
    }

    /// Flush the window at `trigger_ms`.
    ///
    /// Records with `ts <= trigger_ms` enter the result. Hopping and
    /// sliding windows retain records still inside the window length (plus
    /// jitter delta); the other kinds only keep early arrivals belonging to
    /// the next window. An empty result triggers nothing, but the trigger
    /// time is still recorded so the next delta measures from this tick,
    /// not from the last non-empty one.
    pub fn scan(&mut self, trigger_ms: i64) -> Option<WindowBatchSet> {
        let delta = self.cal_delta(trigger_ms);
        self.last_trigger_ms = Some(trigger_ms);

        let mut result = WindowBatchSet::new();
        let mut survivors = Vec::with_capacity(self.buffer.len());
        let mut emitted = 0usize;
        for record in self.buffer.drain(..) {
            let ts = record.timestamp;
            if ts <= trigger_ms {
                emitted += 1;
                result.add_record(record.clone());
            }
            let keep = match self.spec.kind {
                WindowKind::Hopping | WindowKind::Sliding => {
                    trigger_ms - ts <= self.spec.length_ms + delta
                }
                _ => ts > trigger_ms,
            };
            if keep {
                survivors.push(record);
            }
        }
        self.buffer = survivors;

        if emitted == 0 {
            return None;
        }
        if self.event_time {
            result.sort_by_timestamp();
        }
        log::debug!(
            "window scan at {} emitted {} records, {} buffered",
            trigger_ms,
            emitted,
            self.buffer.len()
        );
        Some(result)
    }
}

/// The running window stage: channels, barrier handling, and the trigger
/// loop around a [`WindowState`].
pub struct WindowOperator {
    name: String,
    spec: WindowSpec,
    mode: TriggerMode,
    barrier: Arc<dyn BarrierHandler>,
    drift_warn_ms: i64,
    input_tx: mpsc::Sender<StreamEnvelope>,
    input_rx: Option<mpsc::Receiver<StreamEnvelope>>,
    outputs: HashMap<String, mpsc::Sender<StreamEnvelope>>,
}

impl WindowOperator {
    /// Validates the window spec up front; an unsupported kind or a
    /// non-positive duration never reaches a running task.
    pub fn new(
        name: impl Into<String>,
        spec: WindowSpec,
        mode: TriggerMode,
        barrier: Arc<dyn BarrierHandler>,
        config: &StreamConfig,
    ) -> StreamResult<Self> {
        if spec.kind == WindowKind::None {
            return Err(StreamError::InvalidWindow {
                reason: "window kind must be tumbling, hopping, sliding, or session".to_string(),
            });
        }
        if spec.length_ms <= 0 {
            return Err(StreamError::InvalidWindow {
                reason: format!("window length must be positive, got {}", spec.length_ms),
            });
        }
        let (input_tx, input_rx) = mpsc::channel(config.channel_capacity.max(1));
        Ok(WindowOperator {
            name: name.into(),
            spec,
            mode,
            barrier,
            drift_warn_ms: config.drift_warn_ms,
            input_tx,
            input_rx: Some(input_rx),
            outputs: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> mpsc::Sender<StreamEnvelope> {
        self.input_tx.clone()
    }

    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        output: mpsc::Sender<StreamEnvelope>,
    ) -> StreamResult<()> {
        let name = name.into();
        if self.outputs.contains_key(&name) {
            return Err(StreamError::DuplicateOutput {
                operator: self.name.clone(),
                name,
            });
        }
        self.outputs.insert(name, output);
        Ok(())
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Spawn the trigger loop. Window state lives inside the single spawned
    /// task, so it needs no locking.
    pub fn start(&mut self, ctx: &StreamContext) -> StreamResult<JoinHandle<()>> {
        if self.outputs.is_empty() {
            return Err(StreamError::NoOutputs {
                operator: self.name.clone(),
            });
        }
        let input_rx = self.input_rx.take().ok_or_else(|| StreamError::AlreadyStarted {
            operator: self.name.clone(),
        })?;

        let ctx = ctx.child(&self.name);
        let loop_ctx = WindowLoop {
            name: self.name.clone(),
            spec: self.spec.clone(),
            barrier: self.barrier.clone(),
            outputs: self.outputs.clone(),
            state: WindowState::new(self.spec.clone(), self.mode.is_event_time(), self.drift_warn_ms),
        };
        log::info!("window operator {} started ({:?})", self.name, self.spec.kind);
        let handle = match self.mode.clone() {
            TriggerMode::ProcessingTime => {
                tokio::spawn(loop_ctx.run_processing_time(ctx, input_rx))
            }
            TriggerMode::EventTime {
                late_tolerance_ms,
                streams,
            } => tokio::spawn(loop_ctx.run_event_time(ctx, input_rx, late_tolerance_ms, streams)),
        };
        Ok(handle)
    }
}

struct WindowLoop {
    name: String,
    spec: WindowSpec,
    barrier: Arc<dyn BarrierHandler>,
    outputs: HashMap<String, mpsc::Sender<StreamEnvelope>>,
    state: WindowState,
}

impl WindowLoop {
    async fn run_processing_time(mut self, ctx: StreamContext, mut rx: mpsc::Receiver<StreamEnvelope>) {
        // Sliding windows trigger per tuple and need no ticker.
        let tick_every = match self.spec.kind {
            WindowKind::Tumbling | WindowKind::Session => Some(self.spec.length_ms),
            WindowKind::Hopping => Some(self.spec.interval()),
            _ => None,
        };
        let mut ticker = tick_every.map(|ms| {
            let period = Duration::from_millis(ms as u64);
            // First tick one full period out, not immediately.
            interval_at(Instant::now() + period, period)
        });
        let mut session_deadline: Option<Instant> = None;

        loop {
            // Biased order makes trigger precedence deterministic inside one
            // scheduling quantum: cancellation, then the ticker, then the
            // session timeout, then input.
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    log::info!("window operator {} cancelled", self.name);
                    return;
                }
                _ = tick(&mut ticker), if ticker.is_some() => {
                    let trigger_ms = now_ms();
                    if self.spec.kind == WindowKind::Session && self.session_tick_skips(trigger_ms) {
                        self.state.mark_trigger(trigger_ms);
                    } else {
                        self.flush(trigger_ms).await;
                    }
                }
                _ = maybe_sleep(session_deadline), if session_deadline.is_some() => {
                    // Session gap expired: flush early and drop all state.
                    self.flush(now_ms()).await;
                    self.state.clear();
                    session_deadline = None;
                }
                received = rx.recv() => {
                    let envelope = match received {
                        Some(envelope) => envelope,
                        None => return,
                    };
                    if !envelope.processed && self.barrier.process(&envelope, &ctx).await {
                        continue;
                    }
                    match envelope.data {
                        StreamData::Record(record) => {
                            let ts = record.timestamp;
                            self.state.ingest(record);
                            match self.spec.kind {
                                WindowKind::Sliding => self.flush(ts).await,
                                WindowKind::Session => {
                                    let timeout = Duration::from_millis(self.spec.interval() as u64);
                                    session_deadline = Some(Instant::now() + timeout);
                                }
                                _ => {}
                            }
                        }
                        StreamData::Error(_) => broadcast(&self.name, &self.outputs, envelope.data).await,
                        other => log::warn!(
                            "window operator {}: dropping unexpected {} payload",
                            self.name,
                            other.shape_name()
                        ),
                    }
                }
            }
        }
    }

    async fn run_event_time(
        mut self,
        ctx: StreamContext,
        mut rx: mpsc::Receiver<StreamEnvelope>,
        late_tolerance_ms: i64,
        streams: Vec<String>,
    ) {
        let mut watermark = WatermarkGenerator::new(self.spec.clone(), late_tolerance_ms, streams);
        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    log::info!("window operator {} cancelled", self.name);
                    return;
                }
                received = rx.recv() => {
                    let envelope = match received {
                        Some(envelope) => envelope,
                        None => return,
                    };
                    if !envelope.processed && self.barrier.process(&envelope, &ctx).await {
                        continue;
                    }
                    match envelope.data {
                        StreamData::Record(record) => {
                            watermark.observe(&record.emitter, record.timestamp);
                            self.state.ingest(record);
                            if watermark.advance().is_some() {
                                let buffered = self.state.buffered_timestamps();
                                for trigger_ms in watermark.triggers(&buffered) {
                                    self.flush(trigger_ms).await;
                                }
                            }
                        }
                        StreamData::Error(_) => broadcast(&self.name, &self.outputs, envelope.data).await,
                        other => log::warn!(
                            "window operator {}: dropping unexpected {} payload",
                            self.name,
                            other.shape_name()
                        ),
                    }
                }
            }
        }
    }

    /// A session ticker fires for nothing when the previous trigger predates
    /// the first buffered record: that buffer belongs entirely to the new
    /// session and must wait for its own boundary.
    fn session_tick_skips(&self, _trigger_ms: i64) -> bool {
        match (self.state.last_trigger_ms, self.state.first_buffered_ts()) {
            (_, None) => true,
            (None, Some(_)) => true,
            (Some(last), Some(first)) => last < first,
        }
    }

    async fn flush(&mut self, trigger_ms: i64) {
        if let Some(batches) = self.state.scan(trigger_ms) {
            broadcast(&self.name, &self.outputs, StreamData::Window(batches)).await;
        }
    }
}

async fn tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn maybe_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
