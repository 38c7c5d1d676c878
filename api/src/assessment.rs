// SPDX-License-Identifier: Apache-2.0
//! ClusterAssessment: the assessment request resource and its result types.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ClusterAssessment requests a read-only assessment of cluster
/// configuration. Results (findings, summary, delta) are written back to
/// the status by the reconciler.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "assessment.openshift.io",
    version = "v1alpha1",
    kind = "ClusterAssessment",
    plural = "clusterassessments",
    shortname = "ca",
    status = "ClusterAssessmentStatus",
    printcolumn = r#"{"name":"Profile","type":"string","jsonPath":".spec.profile"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Pass","type":"integer","jsonPath":".status.summary.passCount"}"#,
    printcolumn = r#"{"name":"Warn","type":"integer","jsonPath":".status.summary.warnCount"}"#,
    printcolumn = r#"{"name":"Fail","type":"integer","jsonPath":".status.summary.failCount"}"#,
    printcolumn = r#"{"name":"Last Run","type":"date","jsonPath":".status.lastRunTime"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAssessmentSpec {
    /// Cron schedule for periodic assessments. Empty means a single run
    /// triggered on resource creation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schedule: String,

    /// Baseline profile: a built-in name ("production", "development") or
    /// the name of an AssessmentProfile resource. Empty means "production".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile: String,

    /// Validators to run, in order. Empty means all registered validators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<String>,

    /// Pauses scheduled runs when true. Manual triggers still run.
    #[serde(default)]
    pub suspend: bool,

    /// Drops findings below this severity. Absent means no filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_severity: Option<FindingStatus>,

    /// Maximum number of snapshots retained for this assessment. Oldest
    /// snapshots are pruned past the limit. 0 disables history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u32>,

    /// Finding IDs excluded from score calculation. Suppressed findings are
    /// still collected and reported, marked as suppressed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressions: Vec<SuppressionRule>,

    /// Report storage configuration, consumed by external exporters only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_storage: Option<ReportStorageSpec>,
}

pub const DEFAULT_HISTORY_LIMIT: u32 = 90;

impl ClusterAssessmentSpec {
    /// History limit with the default applied.
    pub fn effective_history_limit(&self) -> u32 {
        self.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}

/// Suppresses a specific finding ID from scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuppressionRule {
    /// ID of the finding to suppress.
    #[serde(rename = "findingID")]
    pub finding_id: String,

    /// Why this finding is suppressed.
    pub reason: String,

    /// Optional expiry; past this time the rule has no effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Where rendered reports go. The core never interprets this block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportStorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapStorageSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitStorageSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapStorageSpec {
    #[serde(default)]
    pub enabled: bool,

    /// ConfigMap name; defaults to `<assessment-name>-report`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Comma-separated report formats, e.g. "json,html".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitStorageSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Target branch; defaults to "main".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Secret holding git credentials ('username'/'password' or 'token').
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_ref: String,

    /// Namespace of the credentials secret; required with secretRef since
    /// the assessment resource is cluster-scoped.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_namespace: String,
}

/// Observed state of a ClusterAssessment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAssessmentStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<AssessmentPhase>,

    /// When the last run completed. Not advanced on failure, so failed runs
    /// retry on the next reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_time: Option<DateTime<Utc>>,

    /// Next scheduled run; only populated for scheduled assessments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_info: Option<ClusterInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<AssessmentSummary>,

    /// Full findings from the most recent run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,

    /// Changes relative to the previous run, when history is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<crate::snapshot::DeltaSummary>,

    /// Number of snapshots currently retained for this assessment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_count: Option<u32>,

    /// Human-readable detail about the current phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Lifecycle phase of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AssessmentPhase {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for AssessmentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssessmentPhase::Pending => write!(f, "Pending"),
            AssessmentPhase::Running => write!(f, "Running"),
            AssessmentPhase::Completed => write!(f, "Completed"),
            AssessmentPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Metadata about the assessed cluster, captured once per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    #[serde(rename = "clusterID", default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_version: String,

    /// Infrastructure platform (AWS, Azure, vSphere, ...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform: String,

    /// Configured update channel.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel: String,

    #[serde(default)]
    pub node_count: u32,

    #[serde(default)]
    pub control_plane_nodes: u32,

    #[serde(default)]
    pub worker_nodes: u32,
}

/// Aggregate view of one run's findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSummary {
    pub total_checks: u32,
    pub pass_count: u32,
    pub warn_count: u32,
    pub fail_count: u32,
    pub info_count: u32,

    /// Overall health score (0-100). Absent when no scoreable finding was
    /// produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,

    /// Profile the run actually used, after resolution.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile_used: String,
}

impl AssessmentSummary {
    /// Counts every finding, including suppressed and INFO ones. Score and
    /// profile are left for the caller.
    pub fn tally(findings: &[Finding]) -> Self {
        let mut summary = Self {
            total_checks: findings.len() as u32,
            ..Self::default()
        };
        for finding in findings {
            match finding.status {
                FindingStatus::Pass => summary.pass_count += 1,
                FindingStatus::Warn => summary.warn_count += 1,
                FindingStatus::Fail => summary.fail_count += 1,
                FindingStatus::Info => summary.info_count += 1,
            }
        }
        summary
    }
}

/// Severity of a single finding.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingStatus {
    Pass,
    Warn,
    Fail,
    #[default]
    Info,
}

impl FindingStatus {
    /// Numeric severity used by both the minimum-severity filter and the
    /// delta regression/improvement classification. Higher is worse.
    pub fn severity_rank(self) -> u8 {
        match self {
            FindingStatus::Info => 0,
            FindingStatus::Pass => 1,
            FindingStatus::Warn => 2,
            FindingStatus::Fail => 3,
        }
    }
}

impl std::fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FindingStatus::Pass => write!(f, "PASS"),
            FindingStatus::Warn => write!(f, "WARN"),
            FindingStatus::Fail => write!(f, "FAIL"),
            FindingStatus::Info => write!(f, "INFO"),
        }
    }
}

/// A single check result emitted by a validator.
///
/// `(validator, id)` is the finding's stable identity: the same ID from the
/// same validator describes the same check across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,

    /// Validator that produced this finding.
    pub validator: String,

    /// Groups related findings (e.g. "Security", "Networking").
    pub category: String,

    /// Kubernetes resource involved, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    pub status: FindingStatus,

    pub title: String,

    /// What was checked and what was found.
    #[serde(default)]
    pub description: String,

    /// Why this matters for reliability, security, or supportability.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub impact: String,

    /// Advisory improvement guidance; never executed by the operator.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recommendation: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<RemediationGuidance>,

    /// Matched by a suppression rule; excluded from score calculation.
    #[serde(default)]
    pub suppressed: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suppression_reason: String,
}

impl Finding {
    /// Minimal constructor; optional fields via struct update syntax.
    pub fn new(validator: &str, id: &str, status: FindingStatus, title: &str) -> Self {
        Self {
            id: id.to_string(),
            validator: validator.to_string(),
            status,
            title: title.to_string(),
            ..Self::default()
        }
    }
}

/// Risk level of applying a remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RemediationSafety {
    /// Safe to apply directly.
    SafeApply,
    /// Should be reviewed before applying.
    RequiresReview,
    /// May cause service disruption.
    Destructive,
}

/// Structured, advisory-only remediation steps for a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemediationGuidance {
    pub safety: RemediationSafety,

    /// Ordered command steps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<RemediationCommand>,

    #[serde(
        rename = "documentationURL",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub documentation_url: String,

    /// What changes when the remediation is applied.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub estimated_impact: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemediationCommand {
    pub command: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Potentially dangerous; the user should confirm before executing.
    #[serde(default)]
    pub requires_confirmation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn crd_generates_valid_yaml() {
        let crd = ClusterAssessment::crd();
        let yaml = serde_yaml::to_string(&crd).expect("CRD should serialize to YAML");
        assert!(yaml.contains("assessment.openshift.io"));
        assert!(yaml.contains("ClusterAssessment"));
        assert!(yaml.contains("clusterassessments"));
    }

    #[test]
    fn crd_is_cluster_scoped_with_shortname() {
        let crd = ClusterAssessment::crd();
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(crd.spec.names.short_names, Some(vec!["ca".to_string()]));
    }

    #[test]
    fn finding_status_wire_values_are_uppercase() {
        assert_eq!(
            serde_json::to_string(&FindingStatus::Pass).unwrap(),
            r#""PASS""#
        );
        assert_eq!(
            serde_json::to_string(&FindingStatus::Warn).unwrap(),
            r#""WARN""#
        );
        assert_eq!(
            serde_json::to_string(&FindingStatus::Fail).unwrap(),
            r#""FAIL""#
        );
        assert_eq!(
            serde_json::to_string(&FindingStatus::Info).unwrap(),
            r#""INFO""#
        );
    }

    #[test]
    fn phase_wire_values_are_capitalized() {
        for (phase, wire) in [
            (AssessmentPhase::Pending, r#""Pending""#),
            (AssessmentPhase::Running, r#""Running""#),
            (AssessmentPhase::Completed, r#""Completed""#),
            (AssessmentPhase::Failed, r#""Failed""#),
        ] {
            assert_eq!(serde_json::to_string(&phase).unwrap(), wire);
        }
    }

    #[test]
    fn remediation_safety_wire_values_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&RemediationSafety::SafeApply).unwrap(),
            r#""safe-apply""#
        );
        assert_eq!(
            serde_json::to_string(&RemediationSafety::RequiresReview).unwrap(),
            r#""requires-review""#
        );
        assert_eq!(
            serde_json::to_string(&RemediationSafety::Destructive).unwrap(),
            r#""destructive""#
        );
    }

    #[test]
    fn severity_rank_orders_info_pass_warn_fail() {
        assert!(FindingStatus::Info.severity_rank() < FindingStatus::Pass.severity_rank());
        assert!(FindingStatus::Pass.severity_rank() < FindingStatus::Warn.severity_rank());
        assert!(FindingStatus::Warn.severity_rank() < FindingStatus::Fail.severity_rank());
    }

    #[test]
    fn suppression_rule_uses_finding_id_wire_name() {
        let rule = SuppressionRule {
            finding_id: "rbac-1".to_string(),
            reason: "accepted risk".to_string(),
            expires_at: None,
        };
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains(r#""findingID":"rbac-1""#));
        assert!(!json.contains("expiresAt"));
    }

    #[test]
    fn summary_tally_counts_by_status() {
        let findings = vec![
            Finding::new("a", "a-1", FindingStatus::Pass, "ok"),
            Finding::new("a", "a-2", FindingStatus::Fail, "bad"),
            Finding::new("b", "b-1", FindingStatus::Warn, "meh"),
            Finding::new("b", "b-2", FindingStatus::Info, "fyi"),
            Finding {
                suppressed: true,
                ..Finding::new("b", "b-3", FindingStatus::Fail, "muted")
            },
        ];
        let summary = AssessmentSummary::tally(&findings);
        assert_eq!(summary.total_checks, 5);
        assert_eq!(summary.pass_count, 1);
        assert_eq!(summary.warn_count, 1);
        assert_eq!(summary.fail_count, 2);
        assert_eq!(summary.info_count, 1);
    }

    #[test]
    fn spec_defaults_deserialize_from_empty_object() {
        let spec: ClusterAssessmentSpec = serde_json::from_str("{}").unwrap();
        assert!(spec.schedule.is_empty());
        assert!(spec.profile.is_empty());
        assert!(spec.validators.is_empty());
        assert!(!spec.suspend);
        assert_eq!(spec.min_severity, None);
        assert_eq!(spec.effective_history_limit(), DEFAULT_HISTORY_LIMIT);
        assert!(spec.suppressions.is_empty());
    }

    #[test]
    fn history_limit_zero_is_preserved() {
        let spec: ClusterAssessmentSpec = serde_json::from_str(r#"{"historyLimit":0}"#).unwrap();
        assert_eq!(spec.effective_history_limit(), 0);
    }

    #[test]
    fn finding_roundtrip_preserves_identity() {
        let finding = Finding {
            category: "Security".to_string(),
            resource: "role/foo".to_string(),
            namespace: "apps".to_string(),
            description: "something".to_string(),
            ..Finding::new("rbacaudit", "rbacaudit-1", FindingStatus::Warn, "RBAC")
        };
        let json = serde_json::to_string(&finding).unwrap();
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, finding);
    }
}
