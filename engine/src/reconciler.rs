// SPDX-License-Identifier: Apache-2.0
//! Level-triggered control loops.
//!
//! [`AssessmentReconciler`] drives a request through Pending -> Running ->
//! Completed/Failed. Every wake-up re-reads current state and recomputes the
//! next action, so duplicate or re-ordered deliveries for the same
//! generation converge on the same result. The reconciler owns no timers:
//! schedules are implemented by returning a requeue duration to the hosting
//! runtime, which also guarantees at most one in-flight reconciliation per
//! request name.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kube::ResourceExt;
use tracing::{debug, info, warn};

use api::{
    AssessmentPhase, ClusterAssessment, ClusterAssessmentStatus, ANNOTATION_TRIGGER, TRIGGER_RUN,
};

use crate::clock::{Clock, SystemClock};
use crate::cluster::ClusterReader;
use crate::error::{EngineError, Result};
use crate::history::SnapshotManager;
use crate::hooks::{CompletedRun, Hooks};
use crate::orchestrator::Orchestrator;
use crate::profiles::Resolver;
use crate::registry::{Registry, RunContext};
use crate::schedule;
use crate::store::StateStore;

/// Instruction back to the hosting runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub requeue_after: Option<Duration>,
}

impl Reconciliation {
    pub fn idle() -> Self {
        Self { requeue_after: None }
    }

    pub fn after(duration: Duration) -> Self {
        Self { requeue_after: Some(duration) }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Deadline applied to the validator fan-out. None leaves cancellation
    /// to the hosting runtime's own per-reconcile timeout.
    pub run_timeout: Option<chrono::Duration>,

    /// Floor for requeue durations so imminent schedules do not busy-loop.
    pub min_requeue: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            run_timeout: None,
            min_requeue: Duration::from_secs(1),
        }
    }
}

/// Control loop for ClusterAssessment resources.
pub struct AssessmentReconciler {
    store: Arc<dyn StateStore>,
    cluster: Arc<dyn ClusterReader>,
    resolver: Resolver,
    orchestrator: Orchestrator,
    history: SnapshotManager,
    hooks: Hooks,
    clock: Arc<dyn Clock>,
    config: ReconcilerConfig,
}

impl AssessmentReconciler {
    pub fn new(
        store: Arc<dyn StateStore>,
        cluster: Arc<dyn ClusterReader>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            resolver: Resolver::new(store.clone()),
            orchestrator: Orchestrator::new(registry),
            history: SnapshotManager::new(store.clone()),
            store,
            cluster,
            hooks: Hooks::new(),
            clock: Arc::new(SystemClock),
            config: ReconcilerConfig::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// One reconciliation tick for the named request.
    pub async fn reconcile(&self, name: &str) -> Result<Reconciliation> {
        let Some(assessment) = self.store.get_assessment(name).await? else {
            debug!(assessment = %name, "request gone, nothing to do");
            return Ok(Reconciliation::idle());
        };
        let now = self.clock.now();

        // Manual trigger beats every other consideration. Consuming the
        // annotation before running keeps the trigger idempotent.
        let triggered = assessment
            .annotations()
            .get(ANNOTATION_TRIGGER)
            .is_some_and(|value| value == TRIGGER_RUN);
        if triggered {
            info!(assessment = %name, "manual re-run trigger");
            let assessment = self
                .store
                .remove_assessment_annotation(name, ANNOTATION_TRIGGER)
                .await?;
            return self.execute(assessment, now).await;
        }

        if assessment.spec.schedule.is_empty() {
            // One-shot: run once, then idle forever.
            if last_run(&assessment).is_none() {
                return self.execute(assessment, now).await;
            }
            return Ok(Reconciliation::idle());
        }

        self.tick_scheduled(assessment, now).await
    }

    /// Decision logic for requests with a cron schedule.
    async fn tick_scheduled(
        &self,
        mut assessment: ClusterAssessment,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation> {
        let name = assessment.name_any();
        let published_next = assessment.status.as_ref().and_then(|s| s.next_run_time);

        let next = match published_next {
            Some(next) => next,
            None => {
                // First sighting of this schedule: publish the next tick.
                // nextRunTime stays visible while suspended so operators can
                // see what clearing `suspend` will do.
                let after = last_run(&assessment).map_or(now, |last| last.max(now));
                let Some(next) = self.next_run_or_fail(&mut assessment, after).await? else {
                    return Ok(Reconciliation::idle());
                };
                let status = status_mut(&mut assessment);
                status.next_run_time = Some(next);
                if status.phase.is_none() {
                    status.phase = Some(AssessmentPhase::Pending);
                    status.message = Some(format!("Scheduled; next run at {next}"));
                }
                self.store.update_assessment_status(&assessment).await?;
                return Ok(self.requeue_until(now, next));
            }
        };

        if now < next {
            return Ok(self.requeue_until(now, next));
        }

        if assessment.spec.suspend {
            // The tick fired while suspended: skip it and roll forward.
            // Missed runs are never backfilled.
            debug!(assessment = %name, "schedule suspended, skipping run");
            let Some(new_next) = self.next_run_or_fail(&mut assessment, now).await? else {
                return Ok(Reconciliation::idle());
            };
            status_mut(&mut assessment).next_run_time = Some(new_next);
            self.store.update_assessment_status(&assessment).await?;
            return Ok(self.requeue_until(now, new_next));
        }

        self.execute(assessment, now).await
    }

    /// Runs the assessment and writes the terminal status.
    async fn execute(
        &self,
        mut assessment: ClusterAssessment,
        started_at: DateTime<Utc>,
    ) -> Result<Reconciliation> {
        let name = assessment.name_any();
        info!(assessment = %name, profile = %assessment.spec.profile, "starting assessment run");

        {
            let status = status_mut(&mut assessment);
            status.phase = Some(AssessmentPhase::Running);
            status.message = Some("Assessment run in progress".to_string());
        }
        assessment = self.store.update_assessment_status(&assessment).await?;

        let profile = match self.resolver.resolve(&assessment.spec.profile).await {
            Ok(profile) => profile,
            Err(e) => {
                self.fail(&mut assessment, format!("profile resolution failed: {e}"))
                    .await;
                return Err(e);
            }
        };

        let ctx = match self.config.run_timeout {
            Some(timeout) => RunContext::with_deadline(self.clock.clone(), started_at + timeout),
            None => RunContext::new(self.clock.clone()),
        };
        let outcome = match self
            .orchestrator
            .run(&ctx, self.cluster.as_ref(), &assessment.spec, &profile)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail(&mut assessment, format!("assessment run failed: {e}"))
                    .await;
                return Err(e);
            }
        };

        if outcome.cancelled {
            // Keep the partial findings visible, but the run did not
            // complete: lastRunTime stays put so the retry runs again.
            {
                let status = status_mut(&mut assessment);
                status.findings = outcome.findings;
                status.summary = Some(outcome.summary);
                status.phase = Some(AssessmentPhase::Failed);
                status.message = Some("Run cancelled before all validators completed".to_string());
            }
            if let Err(e) = self.store.update_assessment_status(&assessment).await {
                warn!(assessment = %name, error = %e, "failed to record cancellation");
            }
            return Err(EngineError::Cancelled(name));
        }

        let run_time = self.clock.now();
        let cluster_info = match self.cluster.cluster_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(assessment = %name, error = %e, "cluster info unavailable");
                None
            }
        };

        {
            let status = status_mut(&mut assessment);
            status.findings = outcome.findings;
            status.summary = Some(outcome.summary);
            status.cluster_info = cluster_info;
            status.last_run_time = Some(run_time);
        }

        // History is best-effort: a snapshot failure downgrades to a log
        // line, never to a Failed phase.
        let (delta, snapshot_count) = if assessment.spec.effective_history_limit() > 0 {
            match self.history.record_run(&assessment, run_time).await {
                Ok(recorded) => recorded,
                Err(e) => {
                    warn!(assessment = %name, error = %e, "snapshot recording failed");
                    let current = assessment
                        .status
                        .as_ref()
                        .and_then(|s| s.snapshot_count)
                        .unwrap_or(0);
                    (None, current)
                }
            }
        } else {
            (None, 0)
        };

        let next_run = if assessment.spec.schedule.is_empty() {
            None
        } else {
            match self.next_run_or_fail(&mut assessment, run_time).await? {
                Some(next) => Some(next),
                None => return Ok(Reconciliation::idle()),
            }
        };

        {
            let status = status_mut(&mut assessment);
            status.delta = delta.clone();
            status.snapshot_count = Some(snapshot_count);
            status.next_run_time = next_run;
            status.phase = Some(AssessmentPhase::Completed);
            let summary = status.summary.clone().unwrap_or_default();
            status.message = Some(format!(
                "Assessment completed: {} checks, {} failing",
                summary.total_checks, summary.fail_count
            ));
        }
        assessment = self.store.update_assessment_status(&assessment).await?;

        let status = assessment.status.clone().unwrap_or_default();
        let summary = status.summary.clone().unwrap_or_default();
        info!(
            assessment = %name,
            total = summary.total_checks,
            fail = summary.fail_count,
            score = summary.score,
            "assessment run completed"
        );

        let run = CompletedRun {
            assessment_name: name,
            profile: summary.profile_used.clone(),
            summary,
            findings: status.findings,
            delta,
            cluster_info: status.cluster_info,
            run_time,
            duration: (self.clock.now() - started_at).to_std().unwrap_or_default(),
        };
        self.hooks.run_completed(&run).await;

        match next_run {
            Some(next) => Ok(self.requeue_until(run_time, next)),
            None => Ok(Reconciliation::idle()),
        }
    }

    /// Computes the next cron tick after `after`. A malformed expression
    /// (or one with no future occurrence) marks the request Failed and
    /// yields None; scheduling stays parked until the spec changes.
    async fn next_run_or_fail(
        &self,
        assessment: &mut ClusterAssessment,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        match schedule::next_run(&assessment.spec.schedule, after) {
            Ok(Some(next)) => Ok(Some(next)),
            Ok(None) => {
                self.fail(
                    assessment,
                    format!("schedule {:?} has no future run", assessment.spec.schedule),
                )
                .await;
                Ok(None)
            }
            Err(e) => {
                self.fail(assessment, e.to_string()).await;
                Ok(None)
            }
        }
    }

    /// Marks the request Failed. `lastRunTime` is deliberately untouched so
    /// the next tick retries immediately.
    async fn fail(&self, assessment: &mut ClusterAssessment, message: String) {
        let name = assessment.name_any();
        warn!(assessment = %name, reason = %message, "marking assessment failed");
        let status = status_mut(assessment);
        status.phase = Some(AssessmentPhase::Failed);
        status.message = Some(message);
        if let Err(e) = self.store.update_assessment_status(assessment).await {
            warn!(assessment = %name, error = %e, "failed to write failure status");
        }
    }

    fn requeue_until(&self, now: DateTime<Utc>, next: DateTime<Utc>) -> Reconciliation {
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        Reconciliation::after(wait.max(self.config.min_requeue))
    }
}

/// Control loop for AssessmentProfile overrides: validate and publish
/// readiness.
pub struct ProfileReconciler {
    store: Arc<dyn StateStore>,
    registry: Arc<Registry>,
}

impl ProfileReconciler {
    pub fn new(store: Arc<dyn StateStore>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    pub async fn reconcile(&self, name: &str) -> Result<Reconciliation> {
        let Some(mut profile) = self.store.get_profile(name).await? else {
            return Ok(Reconciliation::idle());
        };

        let (ready, message, count) = crate::profiles::validate_override(&profile, &self.registry);

        let current = profile.status.clone().unwrap_or_default();
        if current.ready != ready
            || current.message != message
            || current.resolved_validator_count != count
        {
            profile.status = Some(api::AssessmentProfileStatus {
                ready,
                message: message.clone(),
                resolved_validator_count: count,
            });
            self.store.update_profile_status(&profile).await?;
            info!(profile = %name, ready, validators = count, "profile status updated");
        }

        Ok(Reconciliation::idle())
    }
}

fn status_mut(assessment: &mut ClusterAssessment) -> &mut ClusterAssessmentStatus {
    assessment.status.get_or_insert_with(Default::default)
}

fn last_run(assessment: &ClusterAssessment) -> Option<DateTime<Utc>> {
    assessment.status.as_ref().and_then(|s| s.last_run_time)
}
