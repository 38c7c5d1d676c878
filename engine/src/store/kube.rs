// SPDX-License-Identifier: Apache-2.0
//! API-server-backed state store.
//!
//! Status writes use merge patches against the status subresource, and
//! annotation removal uses a merge patch with an explicit null so the write
//! stays idempotent. Snapshot creation is the usual two-step: create the
//! object, then patch its status subresource.

use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::ResourceExt;
use serde_json::json;

use api::{AssessmentProfile, AssessmentSnapshot, ClusterAssessment, LABEL_ASSESSMENT_NAME};

use crate::error::{EngineError, Result};
use crate::store::StateStore;

pub struct KubeStore {
    assessments: Api<ClusterAssessment>,
    profiles: Api<AssessmentProfile>,
    snapshots: Api<AssessmentSnapshot>,
}

impl KubeStore {
    pub fn new(client: kube::Client) -> Self {
        Self {
            assessments: Api::all(client.clone()),
            profiles: Api::all(client.clone()),
            snapshots: Api::all(client),
        }
    }
}

fn map_err(context: &str, err: kube::Error) -> EngineError {
    match err {
        kube::Error::Api(ref response) if response.code == 404 => {
            EngineError::NotFound(format!("{context}: {err}"))
        }
        kube::Error::Api(ref response)
            if response.code == 409 && response.reason == "AlreadyExists" =>
        {
            EngineError::AlreadyExists(format!("{context}: {err}"))
        }
        kube::Error::Api(ref response) if response.code == 409 => {
            EngineError::Conflict(format!("{context}: {err}"))
        }
        other => EngineError::Store(format!("{context}: {other}")),
    }
}

#[async_trait]
impl StateStore for KubeStore {
    async fn get_assessment(&self, name: &str) -> Result<Option<ClusterAssessment>> {
        self.assessments
            .get_opt(name)
            .await
            .map_err(|e| map_err("getting clusterassessment", e))
    }

    async fn update_assessment_status(
        &self,
        assessment: &ClusterAssessment,
    ) -> Result<ClusterAssessment> {
        let name = assessment.name_any();
        let patch = json!({ "status": assessment.status });
        self.assessments
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_err("updating clusterassessment status", e))
    }

    async fn remove_assessment_annotation(
        &self,
        name: &str,
        key: &str,
    ) -> Result<ClusterAssessment> {
        // Merge-patch null deletes the key; absent keys are left alone.
        let patch = json!({ "metadata": { "annotations": { key: null } } });
        self.assessments
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_err("removing assessment annotation", e))
    }

    async fn get_profile(&self, name: &str) -> Result<Option<AssessmentProfile>> {
        self.profiles
            .get_opt(name)
            .await
            .map_err(|e| map_err("getting assessmentprofile", e))
    }

    async fn update_profile_status(&self, profile: &AssessmentProfile) -> Result<()> {
        let name = profile.name_any();
        let patch = json!({ "status": profile.status });
        self.profiles
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map(|_| ())
            .map_err(|e| map_err("updating assessmentprofile status", e))
    }

    async fn list_snapshots(&self, assessment_name: &str) -> Result<Vec<AssessmentSnapshot>> {
        let params =
            ListParams::default().labels(&format!("{LABEL_ASSESSMENT_NAME}={assessment_name}"));
        let list = self
            .snapshots
            .list(&params)
            .await
            .map_err(|e| map_err("listing assessmentsnapshots", e))?;
        Ok(list.items)
    }

    async fn create_snapshot(&self, snapshot: &AssessmentSnapshot) -> Result<()> {
        let created = self
            .snapshots
            .create(&PostParams::default(), snapshot)
            .await
            .map_err(|e| map_err("creating assessmentsnapshot", e))?;

        // Status is a subresource; the create above ignores it.
        let patch = json!({ "status": snapshot.status });
        self.snapshots
            .patch_status(
                &created.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
            .map(|_| ())
            .map_err(|e| map_err("writing assessmentsnapshot status", e))
    }

    async fn delete_snapshot(&self, name: &str) -> Result<()> {
        self.snapshots
            .delete(name, &Default::default())
            .await
            .map(|_| ())
            .map_err(|e| map_err("deleting assessmentsnapshot", e))
    }
}
