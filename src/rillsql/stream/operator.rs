//! The generic unary operator: runs a transformation as a concurrent stage.
//!
//! A [`UnaryOperator`] owns a bounded input channel and a set of named
//! output channels. Starting it spawns `concurrency` workers sharing the
//! input plus a supervisor that waits for them (or cancellation) without
//! blocking the caller. Every received envelope is offered to the barrier
//! handler first; surviving payloads go through the transformation and the
//! result is broadcast to every output.
//!
//! With concurrency 1 output order mirrors input order; above 1 relative
//! ordering across workers is not guaranteed - an explicit throughput
//! tradeoff.

use crate::rillsql::sql::error::SqlResult;
use crate::rillsql::sql::execution::types::StreamData;
use crate::rillsql::stream::barrier::BarrierHandler;
use crate::rillsql::stream::config::StreamConfig;
use crate::rillsql::stream::context::StreamContext;
use crate::rillsql::stream::envelope::StreamEnvelope;
use crate::rillsql::stream::error::{StreamError, StreamResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// A unary transformation: one payload in, at most one payload out.
///
/// `Ok(None)` drops the item, `Err` is logged at the operator boundary and
/// never broadcast, `Ok(Some(data))` fans out to every output.
#[async_trait]
pub trait StreamFunction: Send + Sync {
    async fn apply(&self, ctx: &StreamContext, data: StreamData) -> SqlResult<Option<StreamData>>;
}

/// The execution wrapper turning a [`StreamFunction`] into a running stage.
pub struct UnaryOperator {
    name: String,
    concurrency: usize,
    op: Arc<dyn StreamFunction>,
    barrier: Arc<dyn BarrierHandler>,
    input_tx: mpsc::Sender<StreamEnvelope>,
    input_rx: Option<mpsc::Receiver<StreamEnvelope>>,
    outputs: HashMap<String, mpsc::Sender<StreamEnvelope>>,
    cancelled: Arc<StdMutex<bool>>,
}

impl UnaryOperator {
    /// Build an operator around a transformation and a barrier handler.
    ///
    /// Concurrency and channel capacity come from `config`; concurrency is
    /// clamped to a minimum of 1.
    pub fn new(
        name: impl Into<String>,
        op: Arc<dyn StreamFunction>,
        barrier: Arc<dyn BarrierHandler>,
        config: &StreamConfig,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::channel(config.channel_capacity.max(1));
        UnaryOperator {
            name: name.into(),
            concurrency: config.concurrency.max(1),
            op,
            barrier,
            input_tx,
            input_rx: Some(input_rx),
            outputs: HashMap::new(),
            cancelled: Arc::new(StdMutex::new(false)),
        }
    }

    /// Override the worker count for this operator.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A sender feeding this operator's input channel.
    pub fn input(&self) -> mpsc::Sender<StreamEnvelope> {
        self.input_tx.clone()
    }

    /// Register a named downstream channel. Duplicate names are rejected so
    /// miswired topologies surface at build time.
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

    /// Number of registered outputs; used for pre-start validation.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// True once a worker has observed cancellation.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap()
    }

    /// Spawn the worker pool and its supervisor.
    ///
    /// Fails before spawning anything when no outputs are registered or the
    /// operator is already running. The returned handle resolves when the
    /// supervisor exits; callers need not await it.
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
        let shared_rx = Arc::new(Mutex::new(input_rx));
        let outputs = Arc::new(self.outputs.clone());
        log::info!("unary operator {} started with {} workers", self.name, self.concurrency);

        let mut workers = Vec::with_capacity(self.concurrency);
        for _ in 0..self.concurrency {
            workers.push(tokio::spawn(worker_loop(
                self.name.clone(),
                ctx.clone(),
                shared_rx.clone(),
                outputs.clone(),
                self.op.clone(),
                self.barrier.clone(),
                self.cancelled.clone(),
            )));
        }

        let name = self.name.clone();
        let supervisor = tokio::spawn(async move {
            tokio::select! {
                _ = futures::future::join_all(workers) => {
                    log::info!("unary operator {} finished", name);
                }
                _ = ctx.cancelled() => {
                    log::info!("unary operator {} cancelled", name);
                }
            }
        });
        Ok(supervisor)
    }
}

async fn worker_loop(
    name: String,
    ctx: StreamContext,
    shared_rx: Arc<Mutex<mpsc::Receiver<StreamEnvelope>>>,
    outputs: Arc<HashMap<String, mpsc::Sender<StreamEnvelope>>>,
    op: Arc<dyn StreamFunction>,
    barrier: Arc<dyn BarrierHandler>,
    cancelled: Arc<StdMutex<bool>>,
) {
    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                *cancelled.lock().unwrap() = true;
                log::debug!("worker of operator {} observed cancellation", name);
                return;
            }
            received = recv_shared(&shared_rx) => {
                let envelope = match received {
                    Some(envelope) => envelope,
                    // Input closed: upstream is gone, wind down cleanly.
                    None => return,
                };
                if !envelope.processed && barrier.process(&envelope, &ctx).await {
                    continue;
                }
                match op.apply(&ctx, envelope.data).await {
                    Ok(None) => {}
                    Ok(Some(data)) => broadcast(&name, &outputs, data).await,
                    Err(e) => log::error!("operator {}: transformation failed: {}", name, e),
                }
            }
        }
    }
}

async fn recv_shared(
    shared_rx: &Arc<Mutex<mpsc::Receiver<StreamEnvelope>>>,
) -> Option<StreamEnvelope> {
    shared_rx.lock().await.recv().await
}

/// Fan a result out to every output, wrapped in a fresh envelope tagged
/// with the origin operator. Bounded sends apply backpressure; a closed
/// output is logged and skipped.
pub(crate) async fn broadcast(
    origin: &str,
    outputs: &HashMap<String, mpsc::Sender<StreamEnvelope>>,
    data: StreamData,
) {
    for (target, tx) in outputs {
        let envelope = StreamEnvelope::new(data.clone(), origin);
        if tx.send(envelope).await.is_err() {
            log::warn!("operator {}: output channel '{}' is closed", origin, target);
        }
    }
}
