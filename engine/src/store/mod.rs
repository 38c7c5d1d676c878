// SPDX-License-Identifier: Apache-2.0
//! State store seam.
//!
//! All durable state (requests, profile overrides, snapshots) lives behind
//! [`StateStore`]. Writes go through the backend's optimistic concurrency
//! protocol; conflicts surface as [`EngineError::Conflict`] and the hosting
//! runtime re-queues.
//!
//! Snapshots deliberately have no update operation: they are created once
//! and only ever listed or deleted, which enforces their immutability at
//! the interface.

use async_trait::async_trait;

use api::{AssessmentProfile, AssessmentSnapshot, ClusterAssessment};

use crate::error::Result;

pub mod kube;
pub mod memory;

pub use self::kube::KubeStore;
pub use self::memory::MemoryStore;

#[allow(unused_imports)]
use crate::error::EngineError;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_assessment(&self, name: &str) -> Result<Option<ClusterAssessment>>;

    /// Writes the assessment's status subresource. Returns the stored object
    /// so follow-up writes in the same reconciliation do not conflict.
    async fn update_assessment_status(
        &self,
        assessment: &ClusterAssessment,
    ) -> Result<ClusterAssessment>;

    /// Removes one annotation from the assessment, returning the updated
    /// object. Removing an absent annotation is not an error.
    async fn remove_assessment_annotation(
        &self,
        name: &str,
        key: &str,
    ) -> Result<ClusterAssessment>;

    async fn get_profile(&self, name: &str) -> Result<Option<AssessmentProfile>>;

    async fn update_profile_status(&self, profile: &AssessmentProfile) -> Result<()>;

    /// Snapshots carrying the assessment-name label for the given request.
    async fn list_snapshots(&self, assessment_name: &str) -> Result<Vec<AssessmentSnapshot>>;

    /// Creates a snapshot; fails with [`EngineError::AlreadyExists`] on a
    /// name collision.
    async fn create_snapshot(&self, snapshot: &AssessmentSnapshot) -> Result<()>;

    async fn delete_snapshot(&self, name: &str) -> Result<()>;
}
