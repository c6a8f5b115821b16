//! The concurrent stream runtime.
//!
//! Operators are tokio tasks wired together by bounded mpsc channels
//! carrying [`StreamEnvelope`]s. The unary operator runs any
//! transformation as a worker pool with barrier interception and fan-out
//! broadcast; the window operator buffers and flushes time windows; the
//! topology assembles, starts, and cancels a whole operator tree.
//!
//! [`StreamEnvelope`]: envelope::StreamEnvelope

pub mod barrier;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod operator;
pub mod topology;
pub mod watermark;
pub mod window;

// Re-export main API
pub use barrier::{BarrierHandler, NoopBarrierHandler};
pub use config::StreamConfig;
pub use context::StreamContext;
pub use envelope::StreamEnvelope;
pub use error::{StreamError, StreamResult};
pub use operator::{StreamFunction, UnaryOperator};
pub use topology::Topology;
pub use watermark::WatermarkGenerator;
pub use window::{TriggerMode, WindowOperator, WindowState};
