// SPDX-License-Identifier: Apache-2.0
//! AssessmentSnapshot: immutable point-in-time record of one completed run.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::assessment::{AssessmentSummary, ClusterInfo, Finding, FindingStatus};

/// AssessmentSnapshot captures one completed run in compact form for
/// historical tracking and trend analysis. Snapshots are created once and
/// never updated; the history manager prunes the oldest past the
/// assessment's history limit.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "assessment.openshift.io",
    version = "v1alpha1",
    kind = "AssessmentSnapshot",
    plural = "assessmentsnapshots",
    shortname = "as",
    status = "AssessmentSnapshotStatus",
    printcolumn = r#"{"name":"Assessment","type":"string","jsonPath":".spec.assessmentName"}"#,
    printcolumn = r#"{"name":"Score","type":"integer","jsonPath":".status.summary.score"}"#,
    printcolumn = r#"{"name":"Pass","type":"integer","jsonPath":".status.summary.passCount"}"#,
    printcolumn = r#"{"name":"Warn","type":"integer","jsonPath":".status.summary.warnCount"}"#,
    printcolumn = r#"{"name":"Fail","type":"integer","jsonPath":".status.summary.failCount"}"#,
    printcolumn = r#"{"name":"Run Time","type":"date","jsonPath":".status.runTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSnapshotSpec {
    /// Source ClusterAssessment.
    pub assessment_name: String,

    /// Profile name used for this run.
    pub profile: String,
}

/// Snapshot payload, captured at assessment completion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSnapshotStatus {
    /// When the run completed.
    pub run_time: DateTime<Utc>,

    pub summary: AssessmentSummary,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_info: Option<ClusterInfo>,

    /// Compact findings; long prose fields are dropped to keep snapshots
    /// small in etcd.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<FindingSnapshot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<DeltaSummary>,

    /// Name of the preceding snapshot, for chain traversal.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub previous_snapshot_name: String,
}

/// Compact form of a finding: identity fields only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindingSnapshot {
    pub id: String,
    pub validator: String,
    pub category: String,
    pub status: FindingStatus,
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl From<&Finding> for FindingSnapshot {
    fn from(finding: &Finding) -> Self {
        Self {
            id: finding.id.clone(),
            validator: finding.validator.clone(),
            category: finding.category.clone(),
            status: finding.status,
            title: finding.title.clone(),
            resource: finding.resource.clone(),
            namespace: finding.namespace.clone(),
        }
    }
}

/// Four-way classification of finding changes between two consecutive runs,
/// plus the score change. A finding ID appears in at most one of the four
/// lists; each list is sorted for deterministic output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeltaSummary {
    /// IDs present in this run but not the previous.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_findings: Vec<String>,

    /// IDs from the previous run no longer present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolved_findings: Vec<String>,

    /// IDs whose status worsened (e.g. WARN -> FAIL).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regression_findings: Vec<String>,

    /// IDs whose status improved (e.g. FAIL -> WARN or PASS).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub improved_findings: Vec<String>,

    /// Score change from the previous run; positive means improved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_delta: Option<i32>,
}

impl DeltaSummary {
    pub fn is_empty(&self) -> bool {
        self.new_findings.is_empty()
            && self.resolved_findings.is_empty()
            && self.regression_findings.is_empty()
            && self.improved_findings.is_empty()
            && self.score_delta.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn crd_is_cluster_scoped_with_shortname() {
        let crd = AssessmentSnapshot::crd();
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(crd.spec.names.short_names, Some(vec!["as".to_string()]));
    }

    #[test]
    fn compacting_preserves_identity_fields() {
        let finding = Finding {
            category: "Storage".to_string(),
            resource: "pvc/data".to_string(),
            namespace: "db".to_string(),
            description: "long prose that must not survive compaction".to_string(),
            impact: "dropped".to_string(),
            recommendation: "dropped".to_string(),
            ..Finding::new("storage", "storage-3", FindingStatus::Fail, "No default class")
        };
        let compact = FindingSnapshot::from(&finding);
        assert_eq!(compact.id, finding.id);
        assert_eq!(compact.validator, finding.validator);
        assert_eq!(compact.category, finding.category);
        assert_eq!(compact.status, finding.status);
        assert_eq!(compact.title, finding.title);
        assert_eq!(compact.resource, finding.resource);
        assert_eq!(compact.namespace, finding.namespace);
        let json = serde_json::to_string(&compact).unwrap();
        assert!(!json.contains("prose"));
    }

    #[test]
    fn empty_delta_serializes_to_empty_object() {
        let delta = DeltaSummary::default();
        assert!(delta.is_empty());
        assert_eq!(serde_json::to_string(&delta).unwrap(), "{}");
    }
}
