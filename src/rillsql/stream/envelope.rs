//! The transport envelope carried on every inter-operator channel.

use crate::rillsql::sql::execution::types::StreamData;

/// One item on an operator channel: the payload, its origin, and the
/// barrier-handling flag.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEnvelope {
    /// The payload
    pub data: StreamData,
    /// Name of the operator that broadcast this envelope
    pub channel: String,
    /// Set once barrier handling has inspected the envelope; a processed
    /// envelope is never handed to the barrier handler again
    pub processed: bool,
}

impl StreamEnvelope {
    /// A fresh, unprocessed envelope tagged with its origin operator.
    pub fn new(data: StreamData, channel: impl Into<String>) -> Self {
        StreamEnvelope {
            data,
            channel: channel.into(),
            processed: false,
        }
    }
}
