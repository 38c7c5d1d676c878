// SPDX-License-Identifier: Apache-2.0
//! In-memory state store for tests.
//!
//! Mirrors the API server's behavior closely enough for the control loops:
//! names are unique per kind, status writes check resourceVersion and fail
//! with a conflict on mismatch, and label selection works for snapshots.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::ResourceExt;
use tokio::sync::RwLock;

use api::{AssessmentProfile, AssessmentSnapshot, ClusterAssessment, LABEL_ASSESSMENT_NAME};

use crate::error::{EngineError, Result};
use crate::store::StateStore;

#[derive(Default)]
struct Shelves {
    assessments: BTreeMap<String, ClusterAssessment>,
    profiles: BTreeMap<String, AssessmentProfile>,
    snapshots: BTreeMap<String, AssessmentSnapshot>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Shelves>,
}

fn next_version(current: Option<&String>) -> String {
    let n: u64 = current.and_then(|v| v.parse().ok()).unwrap_or(0);
    (n + 1).to_string()
}

fn version_conflict(stored: &Option<String>, incoming: &Option<String>) -> bool {
    match (stored, incoming) {
        (Some(a), Some(b)) => a != b,
        // An object read from this store always carries a version; a missing
        // incoming version means the caller built the object by hand.
        _ => false,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or replaces an assessment, bumping its resourceVersion the way
    /// an external spec edit would.
    pub async fn put_assessment(&self, mut assessment: ClusterAssessment) {
        let mut inner = self.inner.write().await;
        let name = assessment.name_any();
        let current = inner
            .assessments
            .get(&name)
            .and_then(|a| a.metadata.resource_version.clone());
        assessment.metadata.resource_version = Some(next_version(current.as_ref()));
        inner.assessments.insert(name, assessment);
    }

    pub async fn put_profile(&self, mut profile: AssessmentProfile) {
        let mut inner = self.inner.write().await;
        let name = profile.name_any();
        let current = inner
            .profiles
            .get(&name)
            .and_then(|p| p.metadata.resource_version.clone());
        profile.metadata.resource_version = Some(next_version(current.as_ref()));
        inner.profiles.insert(name, profile);
    }

    pub async fn delete_assessment(&self, name: &str) {
        self.inner.write().await.assessments.remove(name);
    }

    pub async fn get_snapshot(&self, name: &str) -> Option<AssessmentSnapshot> {
        self.inner.read().await.snapshots.get(name).cloned()
    }

    pub async fn snapshot_count(&self) -> usize {
        self.inner.read().await.snapshots.len()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_assessment(&self, name: &str) -> Result<Option<ClusterAssessment>> {
        Ok(self.inner.read().await.assessments.get(name).cloned())
    }

    async fn update_assessment_status(
        &self,
        assessment: &ClusterAssessment,
    ) -> Result<ClusterAssessment> {
        let mut inner = self.inner.write().await;
        let name = assessment.name_any();
        let stored = inner
            .assessments
            .get_mut(&name)
            .ok_or_else(|| EngineError::NotFound(format!("clusterassessment {name:?}")))?;
        if version_conflict(
            &stored.metadata.resource_version,
            &assessment.metadata.resource_version,
        ) {
            return Err(EngineError::Conflict(format!(
                "clusterassessment {name:?} was modified concurrently"
            )));
        }
        stored.status = assessment.status.clone();
        stored.metadata.resource_version =
            Some(next_version(stored.metadata.resource_version.as_ref()));
        Ok(stored.clone())
    }

    async fn remove_assessment_annotation(
        &self,
        name: &str,
        key: &str,
    ) -> Result<ClusterAssessment> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .assessments
            .get_mut(name)
            .ok_or_else(|| EngineError::NotFound(format!("clusterassessment {name:?}")))?;
        if let Some(annotations) = stored.metadata.annotations.as_mut() {
            if annotations.remove(key).is_some() {
                stored.metadata.resource_version =
                    Some(next_version(stored.metadata.resource_version.as_ref()));
            }
        }
        Ok(stored.clone())
    }

    async fn get_profile(&self, name: &str) -> Result<Option<AssessmentProfile>> {
        Ok(self.inner.read().await.profiles.get(name).cloned())
    }

    async fn update_profile_status(&self, profile: &AssessmentProfile) -> Result<()> {
        let mut inner = self.inner.write().await;
        let name = profile.name_any();
        let stored = inner
            .profiles
            .get_mut(&name)
            .ok_or_else(|| EngineError::NotFound(format!("assessmentprofile {name:?}")))?;
        if version_conflict(
            &stored.metadata.resource_version,
            &profile.metadata.resource_version,
        ) {
            return Err(EngineError::Conflict(format!(
                "assessmentprofile {name:?} was modified concurrently"
            )));
        }
        stored.status = profile.status.clone();
        stored.metadata.resource_version =
            Some(next_version(stored.metadata.resource_version.as_ref()));
        Ok(())
    }

    async fn list_snapshots(&self, assessment_name: &str) -> Result<Vec<AssessmentSnapshot>> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .values()
            .filter(|snapshot| {
                snapshot
                    .metadata
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.get(LABEL_ASSESSMENT_NAME))
                    .is_some_and(|value| value == assessment_name)
            })
            .cloned()
            .collect())
    }

    async fn create_snapshot(&self, snapshot: &AssessmentSnapshot) -> Result<()> {
        let mut inner = self.inner.write().await;
        let name = snapshot.name_any();
        if inner.snapshots.contains_key(&name) {
            return Err(EngineError::AlreadyExists(format!(
                "assessmentsnapshot {name:?}"
            )));
        }
        let mut stored = snapshot.clone();
        stored.metadata.resource_version = Some("1".to_string());
        inner.snapshots.insert(name, stored);
        Ok(())
    }

    async fn delete_snapshot(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .snapshots
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("assessmentsnapshot {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::ClusterAssessmentSpec;

    fn assessment(name: &str) -> ClusterAssessment {
        ClusterAssessment::new(name, ClusterAssessmentSpec::default())
    }

    #[tokio::test]
    async fn status_update_detects_concurrent_modification() {
        let store = MemoryStore::new();
        store.put_assessment(assessment("audit")).await;

        let stale = store.get_assessment("audit").await.unwrap().unwrap();
        // A spec edit lands between our read and our write.
        store.put_assessment(assessment("audit")).await;

        let err = store.update_assessment_status(&stale).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[tokio::test]
    async fn chained_status_updates_do_not_conflict() {
        let store = MemoryStore::new();
        store.put_assessment(assessment("audit")).await;

        let first = store.get_assessment("audit").await.unwrap().unwrap();
        let second = store.update_assessment_status(&first).await.unwrap();
        store.update_assessment_status(&second).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_snapshot_creation_is_rejected() {
        let store = MemoryStore::new();
        let snapshot = AssessmentSnapshot::new("audit-20260101-000000", Default::default());
        store.create_snapshot(&snapshot).await.unwrap();
        let err = store.create_snapshot(&snapshot).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn removing_absent_annotation_is_a_no_op() {
        let store = MemoryStore::new();
        store.put_assessment(assessment("audit")).await;
        let updated = store
            .remove_assessment_annotation("audit", "assessment.openshift.io/trigger")
            .await
            .unwrap();
        assert!(updated
            .metadata
            .annotations
            .as_ref()
            .map_or(true, |a| a.is_empty()));
    }
}
