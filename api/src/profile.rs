// SPDX-License-Identifier: Apache-2.0
//! AssessmentProfile: user-defined profile overriding a built-in baseline.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// AssessmentProfile customizes a built-in profile by field-wise
/// replacement. Unset threshold fields inherit from the base profile.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "assessment.openshift.io",
    version = "v1alpha1",
    kind = "AssessmentProfile",
    plural = "assessmentprofiles",
    shortname = "ap",
    status = "AssessmentProfileStatus",
    printcolumn = r#"{"name":"BasedOn","type":"string","jsonPath":".spec.basedOn"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Validators","type":"integer","jsonPath":".status.resolvedValidatorCount"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentProfileSpec {
    /// What this profile is for.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Built-in profile to inherit defaults from: "production" or
    /// "development". Empty means "production".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub based_on: String,

    /// Threshold values replacing the base profile's. Unset fields inherit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ThresholdOverrides>,

    /// If non-empty, only these validators run. Takes precedence over
    /// disabledValidators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_validators: Vec<String>,

    /// Validators to skip. Ignored when enabledValidators is set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_validators: Vec<String>,

    /// Specific check IDs to drop across all validators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_checks: Vec<String>,
}

/// Per-field threshold replacements. `None` means "inherit from base".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_control_plane_nodes: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_worker_nodes: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pods_per_node: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cluster_admin_bindings: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_network_policy: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_resource_quotas: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_limit_ranges: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_days_without_update: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_privileged_containers: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_default_storage_class: Option<bool>,
}

/// Validation outcome for an AssessmentProfile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentProfileStatus {
    /// Whether the profile validated and is usable.
    #[serde(default)]
    pub ready: bool,

    /// Validation detail or error.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// How many validators will run with this profile.
    #[serde(default)]
    pub resolved_validator_count: u32,
}
