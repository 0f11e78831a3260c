//! Coordinator entry errors.

use axon_pipeline::PipelineError;
use axon_types::RequestError;
use thiserror::Error;

/// Errors returned synchronously by
/// [`crate::StreamingCoordinator::process_request`]. Everything that
/// happens after the event channel is handed out is reported on the
/// channel instead.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request failed ingress validation.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The workflow is unknown or does not compile.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
