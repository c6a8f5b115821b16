//! Dataflow runtime errors: channel wiring, lifecycle and window setup.
//!
//! These are the fail-fast errors returned from construction and start
//! calls, before any task is spawned. They convert into [`SqlError`] at the
//! SQL boundary.

use crate::rillsql::sql::error::SqlError;
use thiserror::Error;

/// Errors raised by the stream runtime (operators, windows, topology).
#[derive(Debug, Error)]
pub enum StreamError {
    /// Starting an operator with nothing wired downstream.
    #[error("operator '{operator}' has no output channels")]
    NoOutputs {
        /// Operator name
        operator: String,
    },

    /// Registering two outputs under the same name.
    #[error("operator '{operator}' already has an output named '{name}'")]
    DuplicateOutput {
        /// Operator name
        operator: String,
        /// The duplicated output name
        name: String,
    },

    /// Starting an operator twice.
    #[error("operator '{operator}' is already running")]
    AlreadyStarted {
        /// Operator name
        operator: String,
    },

    /// An invalid window specification.
    #[error("invalid window configuration: {reason}")]
    InvalidWindow {
        /// What is wrong with the specification
        reason: String,
    },

    /// Wiring referenced an operator the topology does not know.
    #[error("unknown operator '{name}' in topology")]
    UnknownOperator {
        /// The missing operator name
        name: String,
    },

    /// Adding two operators under the same name.
    #[error("topology already contains an operator named '{name}'")]
    DuplicateOperator {
        /// The duplicated operator name
        name: String,
    },
}

impl From<StreamError> for SqlError {
    fn from(err: StreamError) -> Self {
        match &err {
            StreamError::NoOutputs { operator }
            | StreamError::DuplicateOutput { operator, .. }
            | StreamError::AlreadyStarted { operator } => {
                SqlError::stream_error(operator.clone(), err.to_string())
            }
            StreamError::InvalidWindow { .. } => SqlError::window_error(err.to_string(), None),
            StreamError::UnknownOperator { .. } | StreamError::DuplicateOperator { .. } => {
                SqlError::configuration_error(err.to_string())
            }
        }
    }
}

/// Result type for stream runtime operations.
pub type StreamResult<T> = Result<T, StreamError>;
