//! Checkpoint barrier interception.
//!
//! The barrier handler is a strategy object consulted per envelope before
//! any business logic runs. Its alignment protocol lives in the checkpoint
//! subsystem; the operator only needs to know whether the envelope was
//! fully handled. Handlers are injected at construction, with
//! [`NoopBarrierHandler`] standing in when checkpointing is off, so
//! operator behavior never depends on setter ordering.

use crate::rillsql::stream::context::StreamContext;
use crate::rillsql::stream::envelope::StreamEnvelope;
use async_trait::async_trait;

/// Inspects envelopes ahead of the operator's transformation.
#[async_trait]
pub trait BarrierHandler: Send + Sync {
    /// Returns `true` when the envelope was fully consumed (a barrier, or
    /// an item held back for alignment) and must not reach the
    /// transformation.
    async fn process(&self, envelope: &StreamEnvelope, ctx: &StreamContext) -> bool;
}

/// The no-checkpointing handler: every envelope flows through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBarrierHandler;

#[async_trait]
impl BarrierHandler for NoopBarrierHandler {
    async fn process(&self, _envelope: &StreamEnvelope, _ctx: &StreamContext) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rillsql::sql::execution::types::StreamData;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_noop_handler_never_consumes() {
        let handler = NoopBarrierHandler;
        let (_tx, ctx) = StreamContext::root("test");
        let envelope = StreamEnvelope::new(StreamData::record("s", HashMap::new(), 0), "s");
        assert!(!handler.process(&envelope, &ctx).await);
    }
}
