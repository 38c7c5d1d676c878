// SPDX-License-Identifier: Apache-2.0
//! Validator fan-out and finding aggregation.
//!
//! Validators run strictly sequentially in a deterministic order: findings
//! land in one slice ordered by (validator order, emission order), and the
//! shared cluster reader is not worth parallelizing for the expected
//! validator counts. A failing validator becomes a synthetic FAIL finding
//! and the run continues; the run as a whole fails only when every selected
//! validator failed and none produced a finding.

use std::sync::Arc;

use tracing::{debug, warn};

use api::{AssessmentSummary, ClusterAssessmentSpec, Finding, FindingStatus, SuppressionRule};

use crate::cluster::ClusterReader;
use crate::error::{EngineError, Result};
use crate::profiles::Profile;
use crate::registry::{Registry, RunContext, Validator};

/// Category used for findings the orchestrator itself emits.
const ORCHESTRATION_CATEGORY: &str = "Orchestration";

/// Result of one fan-out.
#[derive(Debug)]
pub struct RunOutcome {
    /// Filtered, suppression-annotated findings in execution order.
    pub findings: Vec<Finding>,
    /// Counts over all findings; score over non-suppressed ones.
    pub summary: AssessmentSummary,
    /// The deadline expired before every validator ran.
    pub cancelled: bool,
}

pub struct Orchestrator {
    registry: Arc<Registry>,
}

impl Orchestrator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Runs the selected validators against the cluster view and aggregates
    /// their findings into a scored summary.
    pub async fn run(
        &self,
        ctx: &RunContext,
        cluster: &dyn ClusterReader,
        spec: &ClusterAssessmentSpec,
        profile: &Profile,
    ) -> Result<RunOutcome> {
        let (selected, mut findings) = self.select(spec, profile);
        debug!(
            validators = selected.len(),
            profile = %profile.name,
            "starting validator fan-out"
        );

        let mut cancelled = false;
        let mut failed = 0usize;
        for validator in &selected {
            if ctx.cancelled() {
                warn!(validator = validator.name(), "deadline reached, stopping fan-out");
                findings.push(cancellation_finding());
                cancelled = true;
                break;
            }
            match validator.validate(ctx, cluster, profile).await {
                Ok(emitted) => {
                    debug!(validator = validator.name(), findings = emitted.len(), "validator done");
                    findings.extend(emitted);
                }
                Err(e) => {
                    warn!(validator = validator.name(), error = %e, "validator failed");
                    findings.push(error_finding(validator.as_ref(), &e));
                    failed += 1;
                }
            }
        }

        if !selected.is_empty() && failed == selected.len() {
            return Err(EngineError::AllValidatorsFailed(format!(
                "all {} selected validators failed",
                selected.len()
            )));
        }

        // Profile-level check suppression drops findings outright.
        if !profile.disabled_checks.is_empty() {
            findings.retain(|finding| !profile.disabled_checks.contains(&finding.id));
        }

        if let Some(min) = spec.min_severity {
            let floor = min.severity_rank();
            findings.retain(|finding| finding.status.severity_rank() >= floor);
        }

        annotate_suppressions(&mut findings, &spec.suppressions, ctx);

        let mut summary = AssessmentSummary::tally(&findings);
        summary.score = compute_score(&findings);
        summary.profile_used = profile.name.clone();

        Ok(RunOutcome { findings, summary, cancelled })
    }

    /// Applies the selection rules: the request's explicit list wins, then
    /// the profile's enabled list, then every registered validator; the
    /// profile's disabled list is subtracted afterwards. Unknown requested
    /// names become warning findings so typos surface in the report.
    fn select(
        &self,
        spec: &ClusterAssessmentSpec,
        profile: &Profile,
    ) -> (Vec<Arc<dyn Validator>>, Vec<Finding>) {
        let mut warnings = Vec::new();

        let candidates: Vec<Arc<dyn Validator>> = if !spec.validators.is_empty() {
            spec.validators
                .iter()
                .filter_map(|name| match self.registry.get(name) {
                    Some(validator) => Some(validator),
                    None => {
                        warn!(validator = %name, "requested validator is not registered");
                        warnings.push(unknown_validator_finding(name));
                        None
                    }
                })
                .collect()
        } else if !profile.enabled_validators.is_empty() {
            profile
                .enabled_validators
                .iter()
                .filter_map(|name| self.registry.get(name))
                .collect()
        } else {
            self.registry.all()
        };

        let selected = candidates
            .into_iter()
            .filter(|validator| {
                !profile
                    .disabled_validators
                    .iter()
                    .any(|name| name == validator.name())
            })
            .collect();

        (selected, warnings)
    }
}

fn error_finding(validator: &dyn Validator, error: &EngineError) -> Finding {
    Finding {
        category: validator.category().to_string(),
        description: format!("Validator did not complete: {error}"),
        ..Finding::new(
            validator.name(),
            &format!("{}-error", validator.name()),
            FindingStatus::Fail,
            "Validator error",
        )
    }
}

fn unknown_validator_finding(name: &str) -> Finding {
    Finding {
        category: ORCHESTRATION_CATEGORY.to_string(),
        description: format!(
            "Validator {name:?} was requested but is not registered; it was skipped."
        ),
        ..Finding::new(name, &format!("{name}-unknown"), FindingStatus::Warn, "Unknown validator")
    }
}

fn cancellation_finding() -> Finding {
    Finding {
        category: ORCHESTRATION_CATEGORY.to_string(),
        description: "The run deadline expired before all validators completed; results are partial."
            .to_string(),
        ..Finding::new(
            "orchestrator",
            "assessment-cancelled",
            FindingStatus::Fail,
            "Assessment cancelled",
        )
    }
}

/// Marks findings matched by an unexpired suppression rule. Suppressed
/// findings stay in the output; scoring skips them.
fn annotate_suppressions(findings: &mut [Finding], rules: &[SuppressionRule], ctx: &RunContext) {
    if rules.is_empty() {
        return;
    }
    let now = ctx.now();
    for finding in findings.iter_mut() {
        let rule = rules.iter().find(|rule| {
            rule.finding_id == finding.id && rule.expires_at.map_or(true, |expiry| expiry > now)
        });
        if let Some(rule) = rule {
            finding.suppressed = true;
            finding.suppression_reason = rule.reason.clone();
        }
    }
}

/// Health score over non-suppressed findings:
/// `round(100 * (pass + 0.5*warn) / (pass + warn + fail))`.
/// INFO findings never enter the calculation; with no PASS/WARN/FAIL the
/// score is omitted.
pub fn compute_score(findings: &[Finding]) -> Option<i32> {
    let mut pass = 0u32;
    let mut warn = 0u32;
    let mut fail = 0u32;
    for finding in findings.iter().filter(|f| !f.suppressed) {
        match finding.status {
            FindingStatus::Pass => pass += 1,
            FindingStatus::Warn => warn += 1,
            FindingStatus::Fail => fail += 1,
            FindingStatus::Info => {}
        }
    }
    let denominator = pass + warn + fail;
    if denominator == 0 {
        return None;
    }
    let score = 100.0 * (f64::from(pass) + 0.5 * f64::from(warn)) / f64::from(denominator);
    Some(score.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_weights_warnings_at_half() {
        let findings = vec![
            Finding::new("a", "a-1", FindingStatus::Pass, ""),
            Finding::new("a", "a-2", FindingStatus::Warn, ""),
            Finding::new("a", "a-3", FindingStatus::Fail, ""),
        ];
        assert_eq!(compute_score(&findings), Some(50));
    }

    #[test]
    fn score_ignores_info_and_suppressed() {
        let findings = vec![
            Finding::new("a", "a-1", FindingStatus::Pass, ""),
            Finding::new("a", "a-2", FindingStatus::Info, ""),
            Finding {
                suppressed: true,
                ..Finding::new("a", "a-3", FindingStatus::Fail, "")
            },
        ];
        assert_eq!(compute_score(&findings), Some(100));
    }

    #[test]
    fn score_is_omitted_without_scoreable_findings() {
        assert_eq!(compute_score(&[]), None);
        let info_only = vec![Finding::new("a", "a-1", FindingStatus::Info, "")];
        assert_eq!(compute_score(&info_only), None);
        let all_suppressed = vec![Finding {
            suppressed: true,
            ..Finding::new("a", "a-1", FindingStatus::Fail, "")
        }];
        assert_eq!(compute_score(&all_suppressed), None);
    }

    #[test]
    fn score_is_monotone_in_pass_count() {
        let mut findings = vec![
            Finding::new("a", "f-1", FindingStatus::Fail, ""),
            Finding::new("a", "f-2", FindingStatus::Fail, ""),
        ];
        let mut last = compute_score(&findings).unwrap();
        for i in 0..10 {
            findings.push(Finding::new("a", &format!("p-{i}"), FindingStatus::Pass, ""));
            let score = compute_score(&findings).unwrap();
            assert!(score >= last, "score dropped after adding a pass");
            last = score;
        }
        assert!((0..=100).contains(&last));
    }
}
