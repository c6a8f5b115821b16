//! Execution context: operator identity and cancellation.
//!
//! Every operator derives a context from its parent. Cancellation is a
//! `watch` channel: the topology flips it once, every worker observes it at
//! its next select point. There is no forced preemption; a worker inside a
//! transformation finishes that call before noticing.

use tokio::sync::watch;

/// Per-operator execution context.
#[derive(Debug, Clone)]
pub struct StreamContext {
    operator: String,
    cancel: watch::Receiver<bool>,
}

impl StreamContext {
    /// A root context plus the sender that cancels the whole tree.
    pub fn root(operator: impl Into<String>) -> (watch::Sender<bool>, StreamContext) {
        let (tx, rx) = watch::channel(false);
        (
            tx,
            StreamContext {
                operator: operator.into(),
                cancel: rx,
            },
        )
    }

    /// Derive a child context sharing this context's cancellation signal.
    pub fn child(&self, operator: impl Into<String>) -> StreamContext {
        StreamContext {
            operator: operator.into(),
            cancel: self.cancel.clone(),
        }
    }

    /// The owning operator's name.
    pub fn operator_name(&self) -> &str {
        &self.operator
    }

    /// Non-blocking cancellation check.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once the context is cancelled. A dropped sender counts as
    /// cancellation so orphaned operators wind down.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
