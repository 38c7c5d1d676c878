// SPDX-License-Identifier: Apache-2.0
//! Validator contract and registry.
//!
//! Validators are opaque probes: they read cluster state through the
//! [`ClusterReader`] seam and emit findings. They never mutate anything and
//! never cache state between invocations. The registry is an explicit value
//! constructed at startup and shared by reference; tests build their own.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use api::Finding;

use crate::clock::Clock;
use crate::cluster::ClusterReader;
use crate::error::Result;
use crate::profiles::Profile;

/// Per-run context handed to each validator: a clock and the reconcile
/// deadline. Validators should check [`RunContext::cancelled`] between
/// expensive reads and return early with whatever they gathered.
#[derive(Clone)]
pub struct RunContext {
    clock: Arc<dyn Clock>,
    deadline: Option<DateTime<Utc>>,
}

impl RunContext {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, deadline: None }
    }

    pub fn with_deadline(clock: Arc<dyn Clock>, deadline: DateTime<Utc>) -> Self {
        Self { clock, deadline: Some(deadline) }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn cancelled(&self) -> bool {
        match self.deadline {
            Some(deadline) => self.now() >= deadline,
            None => false,
        }
    }
}

/// A single assessment probe.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Stable name; also the registry key and the `validator` field on every
    /// finding this probe emits.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Category stamped on this validator's findings (e.g. "Security").
    fn category(&self) -> &str;

    /// Runs the probe against the cluster view. Reads are the only permitted
    /// I/O. Finding IDs must be stable across runs for the same check.
    async fn validate(
        &self,
        ctx: &RunContext,
        cluster: &dyn ClusterReader,
        profile: &Profile,
    ) -> Result<Vec<Finding>>;
}

/// Name-keyed set of validators. Iteration order is lexicographic by name.
#[derive(Default)]
pub struct Registry {
    validators: BTreeMap<String, Arc<dyn Validator>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a validator under its name. Duplicate names overwrite with
    /// a warning (last wins).
    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        let name = validator.name().to_string();
        if self.validators.insert(name.clone(), validator).is_some() {
            warn!(validator = %name, "validator re-registered, previous registration replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Validator>> {
        self.validators.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.validators.keys().cloned().collect()
    }

    /// All validators in lexicographic name order.
    pub fn all(&self) -> Vec<Arc<dyn Validator>> {
        self.validators.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
