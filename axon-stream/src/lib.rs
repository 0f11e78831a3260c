#![deny(missing_docs)]
//! # axon-stream — the streaming coordinator
//!
//! Glues the pieces together for one request: build a context, run the
//! configured reasoning workflow, then stream the downstream model's
//! completion — all interleaved on a single ordered event channel that
//! ends with exactly one `done`.

pub mod coordinator;
pub mod error;
pub mod workflows;

pub use coordinator::StreamingCoordinator;
pub use error::GatewayError;
pub use workflows::{
    WorkflowRegistry, conditional_validation, parallel_retrieval, sequential_basic,
};
