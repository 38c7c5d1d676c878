// SPDX-License-Identifier: Apache-2.0
//! Profile override resolution and validation scenarios.

use api::{
    AssessmentProfile, AssessmentProfileSpec, ClusterAssessment, ClusterAssessmentSpec,
    FindingStatus, ThresholdOverrides,
};
use engine::{EngineError, StateStore};
use integration::{Harness, ProfileProbe, StaticValidator};

fn override_profile(name: &str, spec: AssessmentProfileSpec) -> AssessmentProfile {
    AssessmentProfile::new(name, spec)
}

#[tokio::test]
async fn override_inherits_base_thresholds_end_to_end() {
    let probe = ProfileProbe::new();
    let harness = Harness::new(vec![probe.clone()]);

    harness
        .store
        .put_profile(override_profile(
            "strict-rbac",
            AssessmentProfileSpec {
                based_on: "production".to_string(),
                thresholds: Some(ThresholdOverrides {
                    max_cluster_admin_bindings: Some(2),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ))
        .await;
    harness
        .seed(ClusterAssessment::new(
            "audit",
            ClusterAssessmentSpec {
                profile: "strict-rbac".to_string(),
                ..Default::default()
            },
        ))
        .await;

    harness.reconcile("audit").await.unwrap();

    let seen = probe.seen.lock().unwrap().clone().expect("validator ran");
    assert_eq!(seen.name, "strict-rbac");
    assert_eq!(seen.thresholds.max_cluster_admin_bindings, 2);
    // Inherited from the production base.
    assert!(seen.thresholds.require_network_policy);
    assert!(!seen.thresholds.allow_privileged_containers);
    assert_eq!(seen.strictness, 7);

    let summary = harness
        .assessment("audit")
        .await
        .status
        .unwrap()
        .summary
        .unwrap();
    assert_eq!(summary.profile_used, "strict-rbac");
}

#[tokio::test]
async fn profile_reconciler_publishes_readiness() {
    let harness = Harness::new(vec![
        StaticValidator::single("alpha", "a-1", FindingStatus::Pass),
        StaticValidator::single("beta", "b-1", FindingStatus::Pass),
        StaticValidator::single("gamma", "g-1", FindingStatus::Pass),
    ]);

    harness
        .store
        .put_profile(override_profile(
            "subset",
            AssessmentProfileSpec {
                enabled_validators: vec!["alpha".to_string(), "beta".to_string()],
                ..Default::default()
            },
        ))
        .await;

    harness.profiles.reconcile("subset").await.unwrap();

    let profile = harness
        .store
        .get_profile("subset")
        .await
        .unwrap()
        .unwrap();
    let status = profile.status.unwrap();
    assert!(status.ready);
    assert_eq!(status.message, "Profile is valid");
    assert_eq!(status.resolved_validator_count, 2);
}

#[tokio::test]
async fn invalid_override_is_marked_not_ready() {
    let harness = Harness::new(vec![StaticValidator::single(
        "alpha",
        "a-1",
        FindingStatus::Pass,
    )]);

    harness
        .store
        .put_profile(override_profile(
            "broken",
            AssessmentProfileSpec {
                disabled_validators: vec!["ghost".to_string()],
                ..Default::default()
            },
        ))
        .await;

    harness.profiles.reconcile("broken").await.unwrap();

    let status = harness
        .store
        .get_profile("broken")
        .await
        .unwrap()
        .unwrap()
        .status
        .unwrap();
    assert!(!status.ready);
    assert!(status.message.contains("ghost"));
    assert_eq!(status.resolved_validator_count, 0);
}

#[tokio::test]
async fn disabled_validator_count_subtracts_from_registry() {
    let harness = Harness::new(vec![
        StaticValidator::single("alpha", "a-1", FindingStatus::Pass),
        StaticValidator::single("beta", "b-1", FindingStatus::Pass),
        StaticValidator::single("gamma", "g-1", FindingStatus::Pass),
    ]);

    harness
        .store
        .put_profile(override_profile(
            "minus-one",
            AssessmentProfileSpec {
                disabled_validators: vec!["gamma".to_string()],
                ..Default::default()
            },
        ))
        .await;

    harness.profiles.reconcile("minus-one").await.unwrap();

    let status = harness
        .store
        .get_profile("minus-one")
        .await
        .unwrap()
        .unwrap()
        .status
        .unwrap();
    assert!(status.ready);
    assert_eq!(status.resolved_validator_count, 2);
}

#[tokio::test]
async fn override_with_unknown_base_fails_referencing_assessments() {
    let harness = Harness::new(vec![StaticValidator::single(
        "alpha",
        "a-1",
        FindingStatus::Pass,
    )]);

    harness
        .store
        .put_profile(override_profile(
            "orphan",
            AssessmentProfileSpec {
                based_on: "staging".to_string(),
                ..Default::default()
            },
        ))
        .await;
    harness
        .seed(ClusterAssessment::new(
            "audit",
            ClusterAssessmentSpec {
                profile: "orphan".to_string(),
                ..Default::default()
            },
        ))
        .await;

    let err = harness.reconcile("audit").await.unwrap_err();
    assert!(matches!(err, EngineError::ProfileResolution(_)));

    let status = harness.assessment("audit").await.status.unwrap();
    assert_eq!(status.phase, Some(api::AssessmentPhase::Failed));
    assert!(status.message.unwrap().contains("staging"));
}

#[tokio::test]
async fn override_restricts_the_validator_selection() {
    let probe = ProfileProbe::new();
    let harness = Harness::new(vec![
        probe.clone(),
        StaticValidator::single("noisy", "n-1", FindingStatus::Warn),
    ]);

    harness
        .store
        .put_profile(override_profile(
            "focused",
            AssessmentProfileSpec {
                enabled_validators: vec!["profileprobe".to_string()],
                ..Default::default()
            },
        ))
        .await;
    harness
        .seed(ClusterAssessment::new(
            "audit",
            ClusterAssessmentSpec {
                profile: "focused".to_string(),
                ..Default::default()
            },
        ))
        .await;

    harness.reconcile("audit").await.unwrap();

    let status = harness.assessment("audit").await.status.unwrap();
    let validators: Vec<&str> = status.findings.iter().map(|f| f.validator.as_str()).collect();
    assert_eq!(validators, vec!["profileprobe"]);
}
