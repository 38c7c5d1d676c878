// SPDX-License-Identifier: Apache-2.0
//! Read-only view of the audited cluster.
//!
//! Validators need resources well beyond what typed clients cover (Routes,
//! operator CRs, platform config), so the seam is schema-less: reads are
//! keyed by group/version/kind and return raw JSON. The hosting runtime
//! satisfies this trait; [`KubeClusterReader`] is the production
//! implementation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::ResourceExt;
use serde_json::Value;
use tracing::warn;

use api::ClusterInfo;

use crate::error::{EngineError, Result};

#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// Cluster metadata snapshot for the status block.
    async fn cluster_info(&self) -> Result<ClusterInfo>;

    /// Lists all objects of the given kind as raw JSON.
    async fn list(&self, gvk: &GroupVersionKind) -> Result<Vec<Value>>;

    /// Fetches one object, or None if it does not exist.
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>>;
}

const CONTROL_PLANE_LABELS: [&str; 2] = [
    "node-role.kubernetes.io/control-plane",
    "node-role.kubernetes.io/master",
];

/// [`ClusterReader`] backed by a live API server connection.
#[derive(Clone)]
pub struct KubeClusterReader {
    client: kube::Client,
}

impl KubeClusterReader {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, gvk: &GroupVersionKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = ApiResource::from_gvk(gvk);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }

    async fn version_info(&self, info: &mut ClusterInfo) -> Result<()> {
        let gvk = GroupVersionKind::gvk("config.openshift.io", "v1", "ClusterVersion");
        if let Some(version) = self.get(&gvk, None, "version").await? {
            if let Some(id) = version.pointer("/spec/clusterID").and_then(Value::as_str) {
                info.cluster_id = id.to_string();
            }
            if let Some(channel) = version.pointer("/spec/channel").and_then(Value::as_str) {
                info.channel = channel.to_string();
            }
            if let Some(desired) = version
                .pointer("/status/desired/version")
                .and_then(Value::as_str)
            {
                info.cluster_version = desired.to_string();
            }
        }
        Ok(())
    }

    async fn platform_info(&self, info: &mut ClusterInfo) -> Result<()> {
        let gvk = GroupVersionKind::gvk("config.openshift.io", "v1", "Infrastructure");
        if let Some(infra) = self.get(&gvk, None, "cluster").await? {
            if let Some(platform) = infra
                .pointer("/status/platformStatus/type")
                .and_then(Value::as_str)
            {
                info.platform = platform.to_string();
            }
        }
        Ok(())
    }

    async fn node_counts(&self, info: &mut ClusterInfo) -> Result<()> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| EngineError::ClusterRead(format!("listing nodes: {e}")))?;

        info.node_count = list.items.len() as u32;
        info.control_plane_nodes = list
            .items
            .iter()
            .filter(|node| {
                let labels = node.labels();
                CONTROL_PLANE_LABELS
                    .iter()
                    .any(|key| labels.contains_key(*key))
            })
            .count() as u32;
        info.worker_nodes = info.node_count - info.control_plane_nodes;
        Ok(())
    }
}

#[async_trait]
impl ClusterReader for KubeClusterReader {
    async fn cluster_info(&self) -> Result<ClusterInfo> {
        let mut info = ClusterInfo::default();
        self.node_counts(&mut info).await?;
        // Version and platform config may be absent on plain Kubernetes.
        if let Err(e) = self.version_info(&mut info).await {
            warn!(error = %e, "cluster version unavailable");
        }
        if let Err(e) = self.platform_info(&mut info).await {
            warn!(error = %e, "infrastructure config unavailable");
        }
        Ok(info)
    }

    async fn list(&self, gvk: &GroupVersionKind) -> Result<Vec<Value>> {
        let api = self.dynamic_api(gvk, None);
        let list = api.list(&ListParams::default()).await.map_err(|e| {
            EngineError::ClusterRead(format!("listing {}/{} {}: {e}", gvk.group, gvk.version, gvk.kind))
        })?;
        list.items
            .into_iter()
            .map(|obj| serde_json::to_value(obj).map_err(EngineError::from))
            .collect()
    }

    async fn get(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>> {
        let api = self.dynamic_api(gvk, namespace);
        match api.get_opt(name).await {
            Ok(Some(obj)) => Ok(Some(serde_json::to_value(obj)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(EngineError::ClusterRead(format!(
                "getting {}/{} {} {name:?}: {e}",
                gvk.group, gvk.version, gvk.kind
            ))),
        }
    }
}
