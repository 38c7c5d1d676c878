// SPDX-License-Identifier: Apache-2.0
//! Resource types for the cluster assessment operator
//!
//! Three cluster-scoped custom resources make up the public surface:
//! - [`ClusterAssessment`]: a request to assess the cluster, with results
//!   written back to its status
//! - [`AssessmentProfile`]: a user-defined profile overriding a built-in
//!   baseline
//! - [`AssessmentSnapshot`]: an immutable point-in-time record of one
//!   completed run, used for history and trend deltas
//!
//! Everything here is pure data plus small invariant helpers (severity
//! ranking, summary tallying, finding compaction). The engine crate holds
//! all behavior.

pub mod assessment;
pub mod profile;
pub mod snapshot;

pub use assessment::{
    AssessmentPhase, AssessmentSummary, ClusterAssessment, ClusterAssessmentSpec,
    ClusterAssessmentStatus, ClusterInfo, ConfigMapStorageSpec, Finding, FindingStatus,
    GitStorageSpec, RemediationCommand, RemediationGuidance, RemediationSafety,
    ReportStorageSpec, SuppressionRule,
};
pub use profile::{
    AssessmentProfile, AssessmentProfileSpec, AssessmentProfileStatus, ThresholdOverrides,
};
pub use snapshot::{
    AssessmentSnapshot, AssessmentSnapshotSpec, AssessmentSnapshotStatus, DeltaSummary,
    FindingSnapshot,
};

/// API group shared by all three resources.
pub const API_GROUP: &str = "assessment.openshift.io";

/// Label linking a snapshot to the assessment that produced it.
pub const LABEL_ASSESSMENT_NAME: &str = "assessment.openshift.io/name";

/// Standard app labels stamped on every snapshot for discovery.
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_APP_NAME: &str = "app.kubernetes.io/name";

/// Value for the managed-by / app-name labels.
pub const OPERATOR_NAME: &str = "assessment-operator";

/// Annotation that forces a run on the next reconciliation when set to
/// [`TRIGGER_RUN`]. The reconciler removes it upon reading it.
pub const ANNOTATION_TRIGGER: &str = "assessment.openshift.io/trigger";
pub const TRIGGER_RUN: &str = "run";
