//! The cluster API seam.
//!
//! The scaling loop needs exactly four operations from the cluster: count
//! pods by selector, read per-pod usage, patch a deployment's replicas, and
//! (for observability) read deployment status. [`ClusterApi`] is that narrow
//! surface; [`HttpClusterClient`] implements it against the Kubernetes REST
//! API, and tests drive the loop with a recording fake.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{CrucibleError, Result};

/// Observed usage of one pod. `cpu` and `memory` are resource quantity
/// strings as the metrics API reports them (e.g. `"250m"`, `"120Mi"`).
#[derive(Debug, Clone)]
pub struct PodUsage {
    pub name: String,
    pub cpu: String,
    pub memory: String,
}

#[derive(Debug, Clone)]
pub struct DeploymentStatus {
    pub replicas: u32,
    pub ready_replicas: u32,
}

#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Number of live pods matching the label selector.
    async fn pod_count(&self, selector: &str) -> Result<usize>;

    /// Per-pod CPU/memory usage for pods matching the selector. May fail
    /// independently of `pod_count` (metrics server is optional).
    async fn pod_usage(&self, selector: &str) -> Result<Vec<PodUsage>>;

    /// Set the deployment's desired replica count.
    async fn patch_replicas(&self, deployment: &str, replicas: u32) -> Result<()>;

    async fn deployment_status(&self, deployment: &str) -> Result<DeploymentStatus>;
}

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Kubernetes REST client covering the [`ClusterApi`] surface: core pods
/// list, `metrics.k8s.io` pod metrics, and the `apps/v1` scale subresource.
pub struct HttpClusterClient {
    http: reqwest::Client,
    base_url: String,
    namespace: String,
    token: Option<String>,
}

impl HttpClusterClient {
    pub fn new(base_url: String, namespace: String, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            namespace,
            token,
        })
    }

    /// Build a client from the pod's mounted service account: API server at
    /// `kubernetes.default.svc`, namespace, bearer token, and cluster CA.
    pub fn in_cluster() -> Result<Self> {
        let token = std::fs::read_to_string(format!("{SERVICE_ACCOUNT_DIR}/token"))?;
        let namespace = std::fs::read_to_string(format!("{SERVICE_ACCOUNT_DIR}/namespace"))?;
        let ca = std::fs::read(format!("{SERVICE_ACCOUNT_DIR}/ca.crt"))?;

        let http = reqwest::Client::builder()
            .add_root_certificate(
                reqwest::Certificate::from_pem(&ca)
                    .map_err(|e| CrucibleError::Cluster(format!("invalid cluster CA: {e}")))?,
            )
            .build()?;

        Ok(Self {
            http,
            base_url: "https://kubernetes.default.svc".to_string(),
            namespace: namespace.trim().to_string(),
            token: Some(token.trim().to_string()),
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json(&self, url: String) -> Result<Value> {
        let response = self.authorized(self.http.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(CrucibleError::Cluster(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ClusterApi for HttpClusterClient {
    async fn pod_count(&self, selector: &str) -> Result<usize> {
        let url = format!(
            "{}/api/v1/namespaces/{}/pods?labelSelector={}",
            self.base_url, self.namespace, selector
        );
        let body = self.get_json(url).await?;
        Ok(body["items"].as_array().map(Vec::len).unwrap_or(0))
    }

    async fn pod_usage(&self, selector: &str) -> Result<Vec<PodUsage>> {
        let url = format!(
            "{}/apis/metrics.k8s.io/v1beta1/namespaces/{}/pods?labelSelector={}",
            self.base_url, self.namespace, selector
        );
        let body = self.get_json(url).await?;

        let items = body["items"].as_array().cloned().unwrap_or_default();
        let usage = items
            .iter()
            .filter_map(|item| {
                let name = item["metadata"]["name"].as_str()?.to_string();
                // Worker pods run a single container.
                let container_usage = &item["containers"].as_array()?.first()?["usage"];
                Some(PodUsage {
                    name,
                    cpu: container_usage["cpu"].as_str().unwrap_or("0").to_string(),
                    memory: container_usage["memory"].as_str().unwrap_or("0").to_string(),
                })
            })
            .collect();

        Ok(usage)
    }

    async fn patch_replicas(&self, deployment: &str, replicas: u32) -> Result<()> {
        let url = format!(
            "{}/apis/apps/v1/namespaces/{}/deployments/{}/scale",
            self.base_url, self.namespace, deployment
        );
        let response = self
            .authorized(self.http.patch(&url))
            .header("Content-Type", "application/merge-patch+json")
            .json(&json!({ "spec": { "replicas": replicas } }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CrucibleError::Cluster(format!(
                "scale patch for {} returned {}",
                deployment,
                response.status()
            )));
        }
        Ok(())
    }

    async fn deployment_status(&self, deployment: &str) -> Result<DeploymentStatus> {
        let url = format!(
            "{}/apis/apps/v1/namespaces/{}/deployments/{}",
            self.base_url, self.namespace, deployment
        );
        let body = self.get_json(url).await?;
        Ok(DeploymentStatus {
            replicas: body["status"]["replicas"].as_u64().unwrap_or(0) as u32,
            ready_replicas: body["status"]["readyReplicas"].as_u64().unwrap_or(0) as u32,
        })
    }
}
