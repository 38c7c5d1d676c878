// SPDX-License-Identifier: Apache-2.0
//! Post-completion collaborator hooks.
//!
//! After every Completed transition the reconciler invokes, in order: the
//! metrics sinks, the report renderers, and the artifact exporters (fed the
//! rendered artifacts). Hook failures are logged and never alter the
//! assessment's phase. Implementations live outside the core.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use api::{AssessmentSummary, ClusterInfo, DeltaSummary, Finding, FindingStatus};

use crate::error::Result;

/// Everything a collaborator needs to know about one completed run.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub assessment_name: String,
    pub profile: String,
    pub summary: AssessmentSummary,
    pub findings: Vec<Finding>,
    pub delta: Option<DeltaSummary>,
    pub cluster_info: Option<ClusterInfo>,
    pub run_time: DateTime<Utc>,
    pub duration: Duration,
}

/// Per-status finding counts for one grouping key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pass: u32,
    pub warn: u32,
    pub fail: u32,
    pub info: u32,
}

impl StatusCounts {
    fn record(&mut self, status: FindingStatus) {
        match status {
            FindingStatus::Pass => self.pass += 1,
            FindingStatus::Warn => self.warn += 1,
            FindingStatus::Fail => self.fail += 1,
            FindingStatus::Info => self.info += 1,
        }
    }
}

impl CompletedRun {
    /// Finding counts grouped by validator, for per-validator metrics.
    pub fn counts_by_validator(&self) -> BTreeMap<String, StatusCounts> {
        let mut counts: BTreeMap<String, StatusCounts> = BTreeMap::new();
        for finding in &self.findings {
            counts
                .entry(finding.validator.clone())
                .or_default()
                .record(finding.status);
        }
        counts
    }

    /// Finding counts grouped by category.
    pub fn counts_by_category(&self) -> BTreeMap<String, StatusCounts> {
        let mut counts: BTreeMap<String, StatusCounts> = BTreeMap::new();
        for finding in &self.findings {
            counts
                .entry(finding.category.clone())
                .or_default()
                .record(finding.status);
        }
        counts
    }
}

/// One rendered report, e.g. `{format: "json", content: ...}`.
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    pub format: String,
    pub content: Vec<u8>,
}

#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record_run(&self, run: &CompletedRun) -> Result<()>;
}

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, run: &CompletedRun) -> Result<Vec<ReportArtifact>>;
}

#[async_trait]
pub trait ArtifactExporter: Send + Sync {
    async fn export(&self, run: &CompletedRun, artifacts: &[ReportArtifact]) -> Result<()>;
}

/// Registered collaborators, invoked after every Completed transition.
#[derive(Default, Clone)]
pub struct Hooks {
    metrics: Vec<Arc<dyn MetricsSink>>,
    renderers: Vec<Arc<dyn ReportRenderer>>,
    exporters: Vec<Arc<dyn ArtifactExporter>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics.push(sink);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn ArtifactExporter>) -> Self {
        self.exporters.push(exporter);
        self
    }

    /// Fans the completed run out to all collaborators. Failures are logged
    /// and do not stop the remaining hooks.
    pub async fn run_completed(&self, run: &CompletedRun) {
        for sink in &self.metrics {
            if let Err(e) = sink.record_run(run).await {
                warn!(assessment = %run.assessment_name, error = %e, "metrics sink failed");
            }
        }

        let mut artifacts = Vec::new();
        for renderer in &self.renderers {
            match renderer.render(run).await {
                Ok(rendered) => artifacts.extend(rendered),
                Err(e) => {
                    warn!(assessment = %run.assessment_name, error = %e, "report renderer failed")
                }
            }
        }

        for exporter in &self.exporters {
            if let Err(e) = exporter.export(run, &artifacts).await {
                warn!(assessment = %run.assessment_name, error = %e, "artifact exporter failed");
            }
        }
    }
}
