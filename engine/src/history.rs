// SPDX-License-Identifier: Apache-2.0
//! Snapshot history and delta computation.
//!
//! After every completed run the manager stores a compact snapshot, computes
//! the delta against the immediately previous one, and prunes overflow.
//! Snapshots reference their predecessor by name only; nothing else ever
//! mutates them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kube::ResourceExt;
use tracing::{info, warn};

use api::{
    AssessmentSnapshot, AssessmentSnapshotSpec, AssessmentSnapshotStatus, ClusterAssessment,
    DeltaSummary, FindingSnapshot, FindingStatus, LABEL_APP_NAME, LABEL_ASSESSMENT_NAME,
    LABEL_MANAGED_BY, OPERATOR_NAME,
};

use crate::error::{EngineError, Result};
use crate::store::StateStore;

/// How many suffixed names to try when a snapshot name collides before
/// giving up. Collisions require two runs in the same second, which the
/// per-request concurrency guarantee rules out; the suffix is a safety net.
const MAX_NAME_ATTEMPTS: u32 = 10;

pub struct SnapshotManager {
    store: Arc<dyn StateStore>,
}

impl SnapshotManager {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Persists a snapshot of a completed run, returning the delta against
    /// the previous snapshot (None for the first run) and the retained
    /// snapshot count after pruning.
    pub async fn record_run(
        &self,
        assessment: &ClusterAssessment,
        run_time: DateTime<Utc>,
    ) -> Result<(Option<DeltaSummary>, u32)> {
        let name = assessment.name_any();
        let status = assessment.status.clone().unwrap_or_default();
        let summary = status.summary.clone().unwrap_or_default();

        let compact: Vec<FindingSnapshot> =
            status.findings.iter().map(FindingSnapshot::from).collect();

        let previous = self.latest(&name).await?;
        let previous_name = previous.as_ref().map(|p| p.name_any()).unwrap_or_default();
        let delta = previous
            .as_ref()
            .map(|prev| compute_delta(&compact, summary.score, prev));

        let snapshot_status = AssessmentSnapshotStatus {
            run_time,
            summary: summary.clone(),
            cluster_info: status.cluster_info.clone(),
            findings: compact,
            delta: delta.clone(),
            previous_snapshot_name: previous_name,
        };
        let spec = AssessmentSnapshotSpec {
            assessment_name: name.clone(),
            profile: summary.profile_used.clone(),
        };

        let snapshot_name = self
            .create_with_unique_name(&name, &spec, &snapshot_status, run_time)
            .await?;

        let limit = assessment.spec.effective_history_limit();
        let count = self.prune(&name, limit).await?;
        info!(
            assessment = %name,
            snapshot = %snapshot_name,
            delta = delta.is_some(),
            retained = count,
            "recorded assessment snapshot"
        );
        Ok((delta, count))
    }

    /// Snapshots for an assessment, most recent first. `limit` 0 means all.
    pub async fn history(
        &self,
        assessment_name: &str,
        limit: usize,
    ) -> Result<Vec<AssessmentSnapshot>> {
        let mut snapshots = self.store.list_snapshots(assessment_name).await?;
        snapshots.sort_by_key(|s| std::cmp::Reverse(run_time_of(s)));
        if limit > 0 && snapshots.len() > limit {
            snapshots.truncate(limit);
        }
        Ok(snapshots)
    }

    /// Deletes the oldest snapshots past the limit. Individual delete
    /// failures are logged and skipped. Returns the retained count.
    pub async fn prune(&self, assessment_name: &str, limit: u32) -> Result<u32> {
        let mut snapshots = self.store.list_snapshots(assessment_name).await?;
        let count = snapshots.len() as u32;
        if count <= limit {
            return Ok(count);
        }

        snapshots.sort_by_key(run_time_of);
        let mut deleted = 0u32;
        for snapshot in snapshots.iter().take((count - limit) as usize) {
            let name = snapshot.name_any();
            match self.store.delete_snapshot(&name).await {
                Ok(()) => {
                    info!(snapshot = %name, "pruned old snapshot");
                    deleted += 1;
                }
                Err(e) => warn!(snapshot = %name, error = %e, "failed to prune snapshot"),
            }
        }
        Ok(count - deleted)
    }

    async fn latest(&self, assessment_name: &str) -> Result<Option<AssessmentSnapshot>> {
        Ok(self.history(assessment_name, 1).await?.into_iter().next())
    }

    async fn create_with_unique_name(
        &self,
        assessment_name: &str,
        spec: &AssessmentSnapshotSpec,
        status: &AssessmentSnapshotStatus,
        run_time: DateTime<Utc>,
    ) -> Result<String> {
        let base = format!("{assessment_name}-{}", run_time.format("%Y%m%d-%H%M%S"));
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}-{}", attempt + 1)
            };
            let mut snapshot = AssessmentSnapshot::new(&candidate, spec.clone());
            snapshot.metadata.labels = Some(BTreeMap::from([
                (LABEL_ASSESSMENT_NAME.to_string(), assessment_name.to_string()),
                (LABEL_MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
                (LABEL_APP_NAME.to_string(), OPERATOR_NAME.to_string()),
            ]));
            snapshot.status = Some(status.clone());

            match self.store.create_snapshot(&snapshot).await {
                Ok(()) => return Ok(candidate),
                Err(EngineError::AlreadyExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(EngineError::AlreadyExists(format!(
            "snapshot name {base:?} exhausted {MAX_NAME_ATTEMPTS} suffixes"
        )))
    }
}

fn run_time_of(snapshot: &AssessmentSnapshot) -> DateTime<Utc> {
    snapshot
        .status
        .as_ref()
        .map(|s| s.run_time)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Classifies finding changes between the current run and the previous
/// snapshot. The four lists are disjoint by construction and sorted for
/// deterministic output.
pub fn compute_delta(
    current: &[FindingSnapshot],
    current_score: Option<i32>,
    previous: &AssessmentSnapshot,
) -> DeltaSummary {
    let current_map: BTreeMap<&str, FindingStatus> =
        current.iter().map(|f| (f.id.as_str(), f.status)).collect();

    let empty = Vec::new();
    let previous_findings = previous
        .status
        .as_ref()
        .map(|s| &s.findings)
        .unwrap_or(&empty);
    let previous_map: BTreeMap<&str, FindingStatus> = previous_findings
        .iter()
        .map(|f| (f.id.as_str(), f.status))
        .collect();

    let mut delta = DeltaSummary::default();

    for (id, current_status) in &current_map {
        match previous_map.get(id) {
            None => delta.new_findings.push((*id).to_string()),
            Some(previous_status) if previous_status != current_status => {
                if current_status.severity_rank() > previous_status.severity_rank() {
                    delta.regression_findings.push((*id).to_string());
                } else {
                    delta.improved_findings.push((*id).to_string());
                }
            }
            Some(_) => {}
        }
    }
    for id in previous_map.keys() {
        if !current_map.contains_key(id) {
            delta.resolved_findings.push((*id).to_string());
        }
    }

    let previous_score = previous.status.as_ref().and_then(|s| s.summary.score);
    if let (Some(current), Some(previous)) = (current_score, previous_score) {
        delta.score_delta = Some(current - previous);
    }

    delta.new_findings.sort();
    delta.resolved_findings.sort();
    delta.regression_findings.sort();
    delta.improved_findings.sort();
    delta
}
