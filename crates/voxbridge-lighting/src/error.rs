//! Error types for the light subsystem.

use thiserror::Error;

/// Errors raised while setting up light computation.
#[derive(Debug, Error)]
pub enum LightError {
    #[error("failed to spawn light worker thread")]
    SpawnWorker(#[source] std::io::Error),
}
