// SPDX-License-Identifier: Apache-2.0
//! Shared harness for end-to-end assessment tests.
//!
//! Wires a [`MemoryStore`], a [`FixedClock`], and a caller-supplied
//! validator set into real reconcilers, so tests drive full
//! reconciliation ticks without a cluster.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use kube::api::GroupVersionKind;
use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::{ClusterAssessment, ClusterInfo, Finding, FindingStatus};
use engine::cluster::ClusterReader;
use engine::store::MemoryStore;
use engine::{
    AssessmentReconciler, FixedClock, Profile, ProfileReconciler, Reconciliation, Registry, Result,
    RunContext, StateStore, Validator,
};

/// Enable tracing output in tests; filtering follows RUST_LOG.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .try_init();
}

/// A deterministic instant tests can anchor schedules on.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Cluster view fake: fixed cluster info, no resources.
pub struct TestCluster {
    pub info: ClusterInfo,
}

impl Default for TestCluster {
    fn default() -> Self {
        Self {
            info: ClusterInfo {
                cluster_id: "test-cluster-id".to_string(),
                cluster_version: "4.17.3".to_string(),
                platform: "AWS".to_string(),
                channel: "stable-4.17".to_string(),
                node_count: 6,
                control_plane_nodes: 3,
                worker_nodes: 3,
            },
        }
    }
}

#[async_trait]
impl ClusterReader for TestCluster {
    async fn cluster_info(&self) -> Result<ClusterInfo> {
        Ok(self.info.clone())
    }
    async fn list(&self, _gvk: &GroupVersionKind) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
    async fn get(
        &self,
        _gvk: &GroupVersionKind,
        _namespace: Option<&str>,
        _name: &str,
    ) -> Result<Option<Value>> {
        Ok(None)
    }
}

/// Validator emitting the same findings on every run.
pub struct StaticValidator {
    name: String,
    category: String,
    findings: Vec<Finding>,
}

impl StaticValidator {
    pub fn new(name: &str, findings: Vec<Finding>) -> Arc<dyn Validator> {
        Arc::new(Self {
            name: name.to_string(),
            category: "Test".to_string(),
            findings,
        })
    }

    pub fn single(name: &str, id: &str, status: FindingStatus) -> Arc<dyn Validator> {
        Self::new(name, vec![Finding::new(name, id, status, id)])
    }
}

#[async_trait]
impl Validator for StaticValidator {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "emits fixed findings"
    }
    fn category(&self) -> &str {
        &self.category
    }
    async fn validate(
        &self,
        _ctx: &RunContext,
        _cluster: &dyn ClusterReader,
        _profile: &Profile,
    ) -> Result<Vec<Finding>> {
        Ok(self.findings.clone())
    }
}

/// Validator that returns a different finding set on each successive run,
/// repeating the last set when the script runs out.
pub struct SequenceValidator {
    name: String,
    runs: Mutex<Vec<Vec<Finding>>>,
    position: Mutex<usize>,
}

impl SequenceValidator {
    pub fn new(name: &str, runs: Vec<Vec<Finding>>) -> Arc<dyn Validator> {
        Arc::new(Self {
            name: name.to_string(),
            runs: Mutex::new(runs),
            position: Mutex::new(0),
        })
    }
}

#[async_trait]
impl Validator for SequenceValidator {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "scripted findings per run"
    }
    fn category(&self) -> &str {
        "Test"
    }
    async fn validate(
        &self,
        _ctx: &RunContext,
        _cluster: &dyn ClusterReader,
        _profile: &Profile,
    ) -> Result<Vec<Finding>> {
        let runs = self.runs.lock().expect("runs lock");
        let mut position = self.position.lock().expect("position lock");
        let index = (*position).min(runs.len().saturating_sub(1));
        *position += 1;
        Ok(runs.get(index).cloned().unwrap_or_default())
    }
}

/// Validator that always errors.
pub struct FailingValidator {
    name: String,
    message: String,
}

impl FailingValidator {
    pub fn new(name: &str, message: &str) -> Arc<dyn Validator> {
        Arc::new(Self {
            name: name.to_string(),
            message: message.to_string(),
        })
    }
}

#[async_trait]
impl Validator for FailingValidator {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "always fails"
    }
    fn category(&self) -> &str {
        "Test"
    }
    async fn validate(
        &self,
        _ctx: &RunContext,
        _cluster: &dyn ClusterReader,
        _profile: &Profile,
    ) -> Result<Vec<Finding>> {
        Err(engine::EngineError::ClusterRead(self.message.clone()))
    }
}

/// Validator that records the resolved profile it was handed.
pub struct ProfileProbe {
    pub seen: Mutex<Option<Profile>>,
}

impl ProfileProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { seen: Mutex::new(None) })
    }
}

#[async_trait]
impl Validator for ProfileProbe {
    fn name(&self) -> &str {
        "profileprobe"
    }
    fn description(&self) -> &str {
        "captures the effective profile"
    }
    fn category(&self) -> &str {
        "Test"
    }
    async fn validate(
        &self,
        _ctx: &RunContext,
        _cluster: &dyn ClusterReader,
        profile: &Profile,
    ) -> Result<Vec<Finding>> {
        *self.seen.lock().expect("probe lock") = Some(profile.clone());
        Ok(vec![Finding::new("profileprobe", "probe-1", FindingStatus::Pass, "probe")])
    }
}

/// Full engine wiring over in-memory state.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub registry: Arc<Registry>,
    pub assessments: AssessmentReconciler,
    pub profiles: ProfileReconciler,
}

impl Harness {
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> Self {
        setup_test_logging();

        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(epoch()));
        let mut registry = Registry::new();
        for validator in validators {
            registry.register(validator);
        }
        let registry = Arc::new(registry);

        let assessments = AssessmentReconciler::new(
            store.clone(),
            Arc::new(TestCluster::default()),
            registry.clone(),
        )
        .with_clock(clock.clone());
        let profiles = ProfileReconciler::new(store.clone(), registry.clone());

        Self { store, clock, registry, assessments, profiles }
    }

    pub async fn seed(&self, assessment: ClusterAssessment) {
        self.store.put_assessment(assessment).await;
    }

    pub async fn reconcile(&self, name: &str) -> Result<Reconciliation> {
        self.assessments.reconcile(name).await
    }

    pub async fn assessment(&self, name: &str) -> ClusterAssessment {
        self.store
            .get_assessment(name)
            .await
            .expect("store read")
            .expect("assessment exists")
    }

    /// Re-runs an already-completed assessment by stamping the manual
    /// trigger annotation and reconciling.
    pub async fn trigger_rerun(&self, name: &str) -> Result<Reconciliation> {
        let mut assessment = self.assessment(name).await;
        assessment
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(api::ANNOTATION_TRIGGER.to_string(), api::TRIGGER_RUN.to_string());
        self.store.put_assessment(assessment).await;
        self.reconcile(name).await
    }
}
