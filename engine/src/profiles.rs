// SPDX-License-Identifier: Apache-2.0
//! Built-in profiles and the profile resolver.
//!
//! A profile name resolves to an effective [`Profile`]: built-ins resolve
//! directly, anything else looks up an [`AssessmentProfile`] override and
//! merges it onto its base. Override threshold fields are nullable —
//! absent means "inherit from base", present means "replace".

use std::sync::Arc;

use api::{AssessmentProfile, ThresholdOverrides};

use crate::error::{EngineError, Result};
use crate::registry::Registry;
use crate::store::StateStore;

pub const PROFILE_PRODUCTION: &str = "production";
pub const PROFILE_DEVELOPMENT: &str = "development";

/// Threshold values validators judge the cluster against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thresholds {
    pub min_control_plane_nodes: u32,
    pub min_worker_nodes: u32,
    pub max_pods_per_node: u32,
    pub max_cluster_admin_bindings: u32,
    pub require_network_policy: bool,
    pub require_resource_quotas: bool,
    pub require_limit_ranges: bool,
    pub max_days_without_update: u32,
    pub allow_privileged_containers: bool,
    pub require_default_storage_class: bool,
}

/// Effective profile used during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub description: String,
    pub thresholds: Thresholds,
    /// 0-10 knob validators use to shade WARN/INFO boundaries.
    pub strictness: u8,
    /// If non-empty, only these validators run.
    pub enabled_validators: Vec<String>,
    /// Removed from the selection after enabled/requested filtering.
    pub disabled_validators: Vec<String>,
    /// Finding IDs dropped after execution.
    pub disabled_checks: Vec<String>,
}

pub fn production() -> Profile {
    Profile {
        name: PROFILE_PRODUCTION.to_string(),
        description: "Baseline for production clusters: HA topology, restricted RBAC, \
                      and namespace guardrails required"
            .to_string(),
        thresholds: Thresholds {
            min_control_plane_nodes: 3,
            min_worker_nodes: 3,
            max_pods_per_node: 110,
            max_cluster_admin_bindings: 5,
            require_network_policy: true,
            require_resource_quotas: true,
            require_limit_ranges: true,
            max_days_without_update: 90,
            allow_privileged_containers: false,
            require_default_storage_class: true,
        },
        strictness: 7,
        enabled_validators: Vec::new(),
        disabled_validators: Vec::new(),
        disabled_checks: Vec::new(),
    }
}

pub fn development() -> Profile {
    Profile {
        name: PROFILE_DEVELOPMENT.to_string(),
        description: "Relaxed baseline for development and lab clusters".to_string(),
        thresholds: Thresholds {
            min_control_plane_nodes: 1,
            min_worker_nodes: 1,
            max_pods_per_node: 250,
            max_cluster_admin_bindings: 20,
            require_network_policy: false,
            require_resource_quotas: false,
            require_limit_ranges: false,
            max_days_without_update: 180,
            allow_privileged_containers: true,
            require_default_storage_class: false,
        },
        strictness: 3,
        enabled_validators: Vec::new(),
        disabled_validators: Vec::new(),
        disabled_checks: Vec::new(),
    }
}

/// Looks up a compiled-in profile by name.
pub fn builtin(name: &str) -> Option<Profile> {
    match name {
        PROFILE_PRODUCTION => Some(production()),
        PROFILE_DEVELOPMENT => Some(development()),
        _ => None,
    }
}

pub fn is_builtin(name: &str) -> bool {
    name == PROFILE_PRODUCTION || name == PROFILE_DEVELOPMENT
}

/// Resolves profile names against built-ins and stored overrides.
pub struct Resolver {
    store: Arc<dyn StateStore>,
}

impl Resolver {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Returns the effective profile for a name. Empty names mean
    /// "production". Overrides inherit from their base one level deep:
    /// `basedOn` may only name a built-in.
    pub async fn resolve(&self, name: &str) -> Result<Profile> {
        let name = if name.is_empty() { PROFILE_PRODUCTION } else { name };

        if let Some(profile) = builtin(name) {
            return Ok(profile);
        }

        let Some(custom) = self.store.get_profile(name).await? else {
            return Err(EngineError::ProfileNotFound(name.to_string()));
        };
        merge_override(&custom)
    }
}

/// Applies an override onto its base profile.
fn merge_override(custom: &AssessmentProfile) -> Result<Profile> {
    use kube::ResourceExt;

    let spec = &custom.spec;
    let base_name = if spec.based_on.is_empty() {
        PROFILE_PRODUCTION
    } else {
        spec.based_on.as_str()
    };
    let Some(mut profile) = builtin(base_name) else {
        return Err(EngineError::ProfileResolution(format!(
            "profile {:?} is based on unknown built-in {base_name:?}",
            custom.name_any()
        )));
    };

    profile.name = custom.name_any();
    if !spec.description.is_empty() {
        profile.description = spec.description.clone();
    }
    if let Some(overrides) = &spec.thresholds {
        apply_thresholds(&mut profile.thresholds, overrides);
    }
    if !spec.enabled_validators.is_empty() {
        profile.enabled_validators = spec.enabled_validators.clone();
    }
    profile.disabled_validators = spec.disabled_validators.clone();
    for check in &spec.disabled_checks {
        if !profile.disabled_checks.contains(check) {
            profile.disabled_checks.push(check.clone());
        }
    }
    Ok(profile)
}

fn apply_thresholds(base: &mut Thresholds, overrides: &ThresholdOverrides) {
    if let Some(v) = overrides.min_control_plane_nodes {
        base.min_control_plane_nodes = v;
    }
    if let Some(v) = overrides.min_worker_nodes {
        base.min_worker_nodes = v;
    }
    if let Some(v) = overrides.max_pods_per_node {
        base.max_pods_per_node = v;
    }
    if let Some(v) = overrides.max_cluster_admin_bindings {
        base.max_cluster_admin_bindings = v;
    }
    if let Some(v) = overrides.require_network_policy {
        base.require_network_policy = v;
    }
    if let Some(v) = overrides.require_resource_quotas {
        base.require_resource_quotas = v;
    }
    if let Some(v) = overrides.require_limit_ranges {
        base.require_limit_ranges = v;
    }
    if let Some(v) = overrides.max_days_without_update {
        base.max_days_without_update = v;
    }
    if let Some(v) = overrides.allow_privileged_containers {
        base.allow_privileged_containers = v;
    }
    if let Some(v) = overrides.require_default_storage_class {
        base.require_default_storage_class = v;
    }
}

/// Validates an override against the built-in set and the registry.
/// Returns (ready, message, resolved validator count).
pub fn validate_override(profile: &AssessmentProfile, registry: &Registry) -> (bool, String, u32) {
    let spec = &profile.spec;

    let based_on = if spec.based_on.is_empty() {
        PROFILE_PRODUCTION
    } else {
        spec.based_on.as_str()
    };
    if !is_builtin(based_on) {
        return (
            false,
            format!("invalid basedOn value {based_on:?}: must be \"production\" or \"development\""),
            0,
        );
    }

    for name in &spec.enabled_validators {
        if !registry.contains(name) {
            return (false, format!("unknown validator {name:?} in enabledValidators"), 0);
        }
    }
    for name in &spec.disabled_validators {
        if !registry.contains(name) {
            return (false, format!("unknown validator {name:?} in disabledValidators"), 0);
        }
    }

    let count = if !spec.enabled_validators.is_empty() {
        spec.enabled_validators.len() as u32
    } else {
        registry
            .names()
            .iter()
            .filter(|name| !spec.disabled_validators.contains(name))
            .count() as u32
    };

    (true, "Profile is valid".to_string(), count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::AssessmentProfileSpec;

    use crate::store::MemoryStore;

    fn override_profile(name: &str, spec: AssessmentProfileSpec) -> AssessmentProfile {
        AssessmentProfile::new(name, spec)
    }

    #[test]
    fn builtin_values_match_the_baselines() {
        let prod = production();
        assert_eq!(prod.thresholds.min_control_plane_nodes, 3);
        assert_eq!(prod.thresholds.max_cluster_admin_bindings, 5);
        assert!(prod.thresholds.require_network_policy);
        assert!(!prod.thresholds.allow_privileged_containers);
        assert_eq!(prod.strictness, 7);

        let dev = development();
        assert_eq!(dev.thresholds.min_worker_nodes, 1);
        assert_eq!(dev.thresholds.max_days_without_update, 180);
        assert!(dev.thresholds.allow_privileged_containers);
        assert_eq!(dev.strictness, 3);
    }

    #[tokio::test]
    async fn empty_name_resolves_to_production() {
        let resolver = Resolver::new(Arc::new(MemoryStore::new()));
        let profile = resolver.resolve("").await.unwrap();
        assert_eq!(profile.name, PROFILE_PRODUCTION);
    }

    #[tokio::test]
    async fn unknown_profile_is_a_not_found_error() {
        let resolver = Resolver::new(Arc::new(MemoryStore::new()));
        let err = resolver.resolve("nonexistent").await.unwrap_err();
        assert!(matches!(err, EngineError::ProfileNotFound(_)));
    }

    #[tokio::test]
    async fn override_inherits_unset_thresholds() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_profile(override_profile(
                "strict-rbac",
                AssessmentProfileSpec {
                    based_on: PROFILE_PRODUCTION.to_string(),
                    thresholds: Some(api::ThresholdOverrides {
                        max_cluster_admin_bindings: Some(2),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ))
            .await;

        let resolver = Resolver::new(store);
        let profile = resolver.resolve("strict-rbac").await.unwrap();
        assert_eq!(profile.name, "strict-rbac");
        assert_eq!(profile.thresholds.max_cluster_admin_bindings, 2);
        // Inherited from production.
        assert!(profile.thresholds.require_network_policy);
        assert!(!profile.thresholds.allow_privileged_containers);
    }

    #[tokio::test]
    async fn disabled_checks_union_preserves_first_occurrence() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_profile(override_profile(
                "quiet",
                AssessmentProfileSpec {
                    disabled_checks: vec![
                        "rbac-1".to_string(),
                        "net-1".to_string(),
                        "rbac-1".to_string(),
                    ],
                    ..Default::default()
                },
            ))
            .await;

        let resolver = Resolver::new(store);
        let profile = resolver.resolve("quiet").await.unwrap();
        assert_eq!(profile.disabled_checks, vec!["rbac-1", "net-1"]);
    }

    #[tokio::test]
    async fn resolution_is_idempotent_for_overrides() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_profile(override_profile(
                "repeat",
                AssessmentProfileSpec {
                    based_on: PROFILE_DEVELOPMENT.to_string(),
                    ..Default::default()
                },
            ))
            .await;

        let resolver = Resolver::new(store);
        let first = resolver.resolve("repeat").await.unwrap();
        let second = resolver.resolve(&first.name).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn validate_rejects_unknown_based_on() {
        let registry = Registry::new();
        let profile = override_profile(
            "broken",
            AssessmentProfileSpec {
                based_on: "staging".to_string(),
                ..Default::default()
            },
        );
        let (ready, message, count) = validate_override(&profile, &registry);
        assert!(!ready);
        assert!(message.contains("staging"));
        assert_eq!(count, 0);
    }

    #[test]
    fn validate_rejects_unregistered_validator_names() {
        let registry = Registry::new();
        let profile = override_profile(
            "broken",
            AssessmentProfileSpec {
                enabled_validators: vec!["ghost".to_string()],
                ..Default::default()
            },
        );
        let (ready, message, _) = validate_override(&profile, &registry);
        assert!(!ready);
        assert!(message.contains("ghost"));
    }

    #[test]
    fn validate_counts_enabled_or_remaining_validators() {
        use crate::registry::{RunContext, Validator};
        use api::Finding;
        use async_trait::async_trait;

        struct Noop(&'static str);

        #[async_trait]
        impl Validator for Noop {
            fn name(&self) -> &str {
                self.0
            }
            fn description(&self) -> &str {
                ""
            }
            fn category(&self) -> &str {
                "Test"
            }
            async fn validate(
                &self,
                _ctx: &RunContext,
                _cluster: &dyn crate::cluster::ClusterReader,
                _profile: &Profile,
            ) -> crate::error::Result<Vec<Finding>> {
                Ok(Vec::new())
            }
        }

        let mut registry = Registry::new();
        registry.register(Arc::new(Noop("a")));
        registry.register(Arc::new(Noop("b")));
        registry.register(Arc::new(Noop("c")));

        let enabled = override_profile(
            "subset",
            AssessmentProfileSpec {
                enabled_validators: vec!["a".to_string(), "b".to_string()],
                ..Default::default()
            },
        );
        assert_eq!(validate_override(&enabled, &registry), (true, "Profile is valid".to_string(), 2));

        let disabled = override_profile(
            "minus-one",
            AssessmentProfileSpec {
                disabled_validators: vec!["c".to_string()],
                ..Default::default()
            },
        );
        assert_eq!(validate_override(&disabled, &registry), (true, "Profile is valid".to_string(), 2));
    }
}
