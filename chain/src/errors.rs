// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use thiserror::Error;

/// The error returned by every stage
#[derive(Debug, Error)]
pub enum ChainError {
    /// A stage failed
    #[error("{stage}: {source}")]
    Stage {
        /// name of the stage that failed
        stage: &'static str,
        /// what went wrong
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A stage failed and closing what was already established failed too
    #[error("{source} (cleanup failed: {cleanup})")]
    CleanupFailed {
        /// the original failure
        #[source]
        source: Box<ChainError>,
        /// the failure of the cleanup
        cleanup: Box<ChainError>,
    },

    /// The deadline of the request passed
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The request was cancelled
    #[error("Request cancelled")]
    Cancelled,

    /// The caller is not allowed to use this endpoint
    #[error("Peer {0} is not authorized")]
    Unauthorized(String),

    /// The request did not carry a connection id
    #[error("Request has no connection id")]
    MissingConnectionId,

    /// A chain was built with two stages with the same name
    #[error("Duplicate stage: {0}")]
    DuplicateStage(String),
}

impl ChainError {
    /// Wrap the failure of a stage
    pub fn stage<E>(stage: &'static str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ChainError::Stage {
            stage,
            source: Box::new(error),
        }
    }

    /// Attach the outcome of a cleanup to this error. A successful cleanup leaves the
    /// error unchanged.
    #[must_use]
    pub fn with_cleanup(self, cleanup: Result<(), ChainError>) -> Self {
        match cleanup {
            Ok(()) => self,
            Err(cleanup) => ChainError::CleanupFailed {
                source: Box::new(self),
                cleanup: Box::new(cleanup),
            },
        }
    }

    /// The original failure, looking through cleanup failures
    #[must_use]
    pub fn primary(&self) -> &ChainError {
        match self {
            ChainError::CleanupFailed { source, .. } => source.primary(),
            other => other,
        }
    }

    /// The name of the stage that originally failed, if any
    #[must_use]
    pub fn failed_stage(&self) -> Option<&'static str> {
        match self.primary() {
            ChainError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
