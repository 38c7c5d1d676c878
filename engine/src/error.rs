// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the assessment engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic-concurrency conflict on a write. The hosting runtime is
    /// expected to re-queue the reconciliation.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("state store error: {0}")]
    Store(String),

    #[error("cluster read failed: {0}")]
    ClusterRead(String),

    #[error("profile {0:?} not found")]
    ProfileNotFound(String),

    #[error("profile resolution failed: {0}")]
    ProfileResolution(String),

    #[error("invalid schedule {expression:?}: {reason}")]
    InvalidSchedule { expression: String, reason: String },

    /// Every selected validator failed and none produced a finding.
    #[error("assessment produced no findings: {0}")]
    AllValidatorsFailed(String),

    /// The reconcile deadline expired before the fan-out finished.
    #[error("assessment cancelled: {0}")]
    Cancelled(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the hosting runtime should retry with backoff. Conflicts and
    /// store/cluster I/O are transient; everything else needs a spec change
    /// or is already reflected in the resource status.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Conflict(_) | EngineError::Store(_) | EngineError::ClusterRead(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
